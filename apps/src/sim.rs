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

//! Drives a sender over a simulated path.
//!
//! The path has a fixed round trip time and never queues: every packet is
//! acknowledged exactly one RTT after it was sent, unless it is one of the
//! packets the loss pattern drops, in which case the loss is detected one
//! RTT after the send instead. Time comes from a [`ManualClock`], so a
//! simulation of minutes finishes instantly and always gives the same
//! result.

use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;

use sendalgo::Bandwidth;
use sendalgo::Clock;
use sendalgo::CongestionFeedback;
use sendalgo::ManualClock;
use sendalgo::SendAlgorithm;
use sendalgo::SendStats;
use sendalgo::SentPacket;
use sendalgo::SentPacketsMap;
use sendalgo::Sender;
use sendalgo::INFINITE_DELAY;

use crate::args::SimArgs;

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of a simulation run.
#[derive(Debug)]
pub struct SimReport {
    pub elapsed: Duration,

    pub sent_packets: u64,

    pub sent_bytes: usize,

    pub lost_packets: u64,

    /// Average rate over the whole run.
    pub achieved: Bandwidth,

    /// The sender's own estimate at the end of the run.
    pub estimate: Bandwidth,

    pub stats: SendStats,
}

impl std::fmt::Display for SimReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(
            f,
            "sent {} packets ({} bytes) in {:?}, lost {}",
            self.sent_packets, self.sent_bytes, self.elapsed, self.lost_packets
        )?;

        writeln!(
            f,
            "achieved {:?}, estimate {:?}",
            self.achieved, self.estimate
        )?;

        write!(
            f,
            "acked {} packets ({} bytes)",
            self.stats.acked_packets, self.stats.acked_bytes
        )
    }
}

/// Creates the sender configuration described by `args`.
pub fn make_config(args: &SimArgs) -> sendalgo::Result<sendalgo::Config> {
    let bitrate = Bandwidth::from_bytes_per_second(args.bitrate);

    let mut config = sendalgo::Config::new(bitrate)?;

    config.set_cc_algorithm_name(&args.cc_algorithm)?;
    config.set_max_packet_size(args.packet_size)?;

    // Without a separate estimate the window is sized for the path.
    config.set_estimated_rtt(args.estimated_rtt.unwrap_or(args.rtt))?;

    if let Some(capacity) = args.bucket_capacity {
        config.set_bucket_capacity(capacity)?;
    }

    config.enable_pacing(!args.no_pacing);
    config.set_trace_id("sim");

    Ok(config)
}

/// Runs a simulation for `args.duration` and reports what was sent.
pub fn run(args: &SimArgs) -> sendalgo::Result<SimReport> {
    let clock = ManualClock::default();
    let start = clock.now();
    let deadline = start + args.duration;

    let config = make_config(args)?;
    let mut sender = Sender::from_config(&config, &clock)?;

    let mut sent_packets = SentPacketsMap::new();

    // Ack or loss notifications in arrival order.
    let mut arrivals: VecDeque<(Instant, u64, bool)> = VecDeque::new();

    let mut retarget_at = args.retarget_at.map(|at| start + at);
    let mut next_report = start + REPORT_INTERVAL;

    let mut pkt_num = 0;
    let mut sent_bytes = 0;
    let mut lost_packets = 0;

    while clock.now() < deadline {
        let now = clock.now();

        while let Some(&(at, pn, lost)) = arrivals.front() {
            if at > now {
                break;
            }

            arrivals.pop_front();

            let Some(sent) = sent_packets.remove(&pn) else {
                continue;
            };

            if lost {
                lost_packets += 1;

                sender.on_incoming_loss(now);
                sender.on_packet_abandoned(pn, sent.bytes);
            } else {
                let rtt = now.saturating_duration_since(sent.time_sent);
                sender.on_incoming_ack(pn, sent.bytes, rtt);
            }
        }

        if matches!(retarget_at, Some(at) if at <= now) {
            retarget_at = None;

            let feedback = CongestionFeedback::FixRate {
                bitrate: Bandwidth::from_bytes_per_second(
                    args.retarget_bitrate,
                ),
            };

            let sent_bandwidth = Bandwidth::from_bytes_and_time_delta(
                sent_bytes,
                now.saturating_duration_since(start),
            );

            info!(
                "{:?}: receiver asks for {:?}",
                now - start,
                Bandwidth::from_bytes_per_second(args.retarget_bitrate)
            );

            sender.on_congestion_feedback(
                &feedback,
                now,
                sent_bandwidth,
                &sent_packets,
            );
        }

        while next_report <= now {
            info!(
                "{:?}: sent={} in_flight={} {:?}",
                next_report - start,
                sent_bytes,
                sender.bytes_in_flight(),
                sender
            );

            next_report += REPORT_INTERVAL;
        }

        let delay = sender.time_until_send(now, false);

        if delay.is_zero() {
            sender.on_packet_sent(now, pkt_num, args.packet_size, false, true);

            sent_packets.insert(pkt_num, SentPacket {
                time_sent: now,
                bytes: args.packet_size,
                is_retransmission: false,
                has_retransmittable_data: true,
            });

            let lost =
                args.loss_every != 0 && (pkt_num + 1) % args.loss_every == 0;

            arrivals.push_back((now + args.rtt, pkt_num, lost));

            pkt_num += 1;
            sent_bytes += args.packet_size;

            continue;
        }

        // Sleep until whatever happens first.
        let mut wake_up = deadline.min(next_report);

        if delay != INFINITE_DELAY {
            wake_up = wake_up.min(now + delay);
        }

        if let Some(&(at, ..)) = arrivals.front() {
            wake_up = wake_up.min(at);
        }

        if let Some(at) = retarget_at {
            wake_up = wake_up.min(at);
        }

        trace!("{:?}: sleeping for {:?}", now - start, wake_up - now);

        clock.advance_to(wake_up);
    }

    let elapsed = clock.now() - start;

    Ok(SimReport {
        elapsed,
        sent_packets: pkt_num,
        sent_bytes,
        lost_packets,
        achieved: Bandwidth::from_bytes_and_time_delta(sent_bytes, elapsed),
        estimate: sender.bandwidth_estimate(),
        stats: sender.stats(),
    })
}
