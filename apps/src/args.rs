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

use std::time::Duration;

pub trait Args {
    fn with_docopt(docopt: &docopt::Docopt) -> Self;
}

/// Bitrate used when the command line does not set one, in bytes per
/// second.
pub const DEFAULT_BITRATE: u64 = 100_000;

/// Contains the arguments for a simulated send session.
pub struct SimArgs {
    pub bitrate: u64,
    pub packet_size: usize,
    pub rtt: Duration,
    pub estimated_rtt: Option<Duration>,
    pub duration: Duration,
    pub loss_every: u64,
    pub bucket_capacity: Option<usize>,
    pub retarget_at: Option<Duration>,
    pub retarget_bitrate: u64,
    pub cc_algorithm: String,
    pub no_pacing: bool,
}

/// Creates a new `SimArgs` structure using the provided [`Docopt`].
///
/// The `Docopt` usage String needs to include the following:
///
/// --bitrate BYTES             Target bitrate in bytes per second.
/// --packet-size BYTES         Size of every simulated packet.
/// --rtt MILLIS                Round trip time of the simulated path.
/// --estimated-rtt MILLIS      RTT the congestion window is sized for.
/// --duration SECS             How long to simulate.
/// --loss-every N              Drop every Nth packet, 0 for no loss.
/// --bucket-capacity BYTES     Burst allowance of the leaky bucket.
/// --retarget-at SECS          When the receiver asks for a new bitrate.
/// --retarget-bitrate BYTES    The bitrate the receiver asks for.
/// --cc-algorithm NAME         Congestion control algorithm.
/// --no-pacing                 Disable pacing.
///
/// [`Docopt`]: https://docs.rs/docopt/1.1.0/docopt/
impl Args for SimArgs {
    fn with_docopt(docopt: &docopt::Docopt) -> Self {
        let args = docopt.parse().unwrap_or_else(|e| e.exit());

        let bitrate = if args.get_str("--bitrate") != "" {
            args.get_str("--bitrate").parse::<u64>().unwrap()
        } else {
            DEFAULT_BITRATE
        };

        let packet_size = args.get_str("--packet-size");
        let packet_size = packet_size.parse::<usize>().unwrap();

        let rtt = args.get_str("--rtt");
        let rtt = Duration::from_millis(rtt.parse::<u64>().unwrap());

        let estimated_rtt = if args.get_str("--estimated-rtt") != "" {
            let millis = args.get_str("--estimated-rtt");
            Some(Duration::from_millis(millis.parse::<u64>().unwrap()))
        } else {
            None
        };

        let duration = args.get_str("--duration");
        let duration = Duration::from_secs(duration.parse::<u64>().unwrap());

        let loss_every = args.get_str("--loss-every");
        let loss_every = loss_every.parse::<u64>().unwrap();

        let bucket_capacity = if args.get_str("--bucket-capacity") != "" {
            let bytes = args.get_str("--bucket-capacity");
            Some(bytes.parse::<usize>().unwrap())
        } else {
            None
        };

        let retarget_at = if args.get_str("--retarget-at") != "" {
            let secs = args.get_str("--retarget-at");
            Some(Duration::from_secs(secs.parse::<u64>().unwrap()))
        } else {
            None
        };

        let retarget_bitrate = if args.get_str("--retarget-bitrate") != "" {
            args.get_str("--retarget-bitrate").parse::<u64>().unwrap()
        } else {
            bitrate
        };

        let cc_algorithm = args.get_str("--cc-algorithm").to_string();

        let no_pacing = args.get_bool("--no-pacing");

        SimArgs {
            bitrate,
            packet_size,
            rtt,
            estimated_rtt,
            duration,
            loss_every,
            bucket_capacity,
            retarget_at,
            retarget_bitrate,
            cc_algorithm,
            no_pacing,
        }
    }
}

impl Default for SimArgs {
    fn default() -> Self {
        SimArgs {
            bitrate: DEFAULT_BITRATE,
            packet_size: 1200,
            rtt: Duration::from_millis(40),
            estimated_rtt: None,
            duration: Duration::from_secs(10),
            loss_every: 0,
            bucket_capacity: None,
            retarget_at: None,
            retarget_bitrate: DEFAULT_BITRATE,
            cc_algorithm: "fixrate".to_string(),
            no_pacing: false,
        }
    }
}
