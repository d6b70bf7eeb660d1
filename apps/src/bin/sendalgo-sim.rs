// Copyright (C) 2024, Cloudflare, Inc.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
//     * Redistributions of source code must retain the above copyright notice,
//       this list of conditions and the following disclaimer.
//
//     * Redistributions in binary form must reproduce the above copyright
//       notice, this list of conditions and the following disclaimer in the
//       documentation and/or other materials provided with the distribution.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS
// IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO,
// THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR
// PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR
// CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL,
// EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO,
// PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE, DATA, OR
// PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF
// LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING
// NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE OF THIS
// SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use sendalgo_apps::args::*;

use sendalgo_apps::sim;

const USAGE: &str = "Usage:
  sendalgo-sim [options]
  sendalgo-sim -h | --help

Options:
  --bitrate BYTES           Target bitrate in bytes per second [default: 100000].
  --packet-size BYTES       Size of every simulated packet [default: 1200].
  --rtt MILLIS              Round trip time of the simulated path [default: 40].
  --estimated-rtt MILLIS    RTT the window is sized for, defaults to --rtt.
  --duration SECS           How long to simulate [default: 10].
  --loss-every N            Drop every Nth packet, 0 for no loss [default: 0].
  --bucket-capacity BYTES   Burst allowance, defaults to one congestion window.
  --retarget-at SECS        When the receiver asks for a new bitrate.
  --retarget-bitrate BYTES  The bitrate the receiver asks for.
  --cc-algorithm NAME       Congestion control algorithm [default: fixrate].
  --no-pacing               Disable pacing.
  -h --help                 Show this screen.
";

fn main() {
    env_logger::builder().format_timestamp_nanos().init();

    // Parse CLI parameters.
    let docopt = docopt::Docopt::new(USAGE).unwrap();
    let args = SimArgs::with_docopt(&docopt);

    match sim::run(&args) {
        Ok(report) => println!("{report}"),

        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        },
    }
}
