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

//! Fixed rate congestion control.
//!
//! Sends at a configured bitrate no matter what the network reports. Losses
//! are counted and acks only release bytes in flight. The only input that
//! changes the rate is a `FixRate` feedback frame from the receiver, which
//! carries a new target bitrate. This makes the sender a deterministic
//! baseline for testing pacing and for calibrating links.

use std::time::Duration;
use std::time::Instant;

use crate::bandwidth::Bandwidth;
use crate::bytes_in_flight::BytesInFlight;
use crate::clock::Clock;
use crate::feedback::CongestionFeedback;
use crate::feedback::SentPacketsMap;
use crate::leaky_bucket::LeakyBucket;
use crate::pacer::PacedSender;
use crate::Config;
use crate::Error;
use crate::Result;

use super::SendAlgorithm;
use super::SendStats;

/// Fixed rate sender. See the [module level docs](self).
pub struct FixRateSender {
    target_bitrate: Bandwidth,

    leaky_bucket: LeakyBucket,

    paced_sender: PacedSender,

    bytes_in_flight: BytesInFlight,

    estimated_rtt: Duration,

    max_packet_size: usize,

    // Whether the bucket capacity was configured, rather than following the
    // congestion window.
    fixed_bucket_capacity: bool,

    largest_sent_packet: Option<u64>,

    stats: SendStats,

    trace_id: String,
}

fn window_for(
    bitrate: Bandwidth, estimated_rtt: Duration, max_packet_size: usize,
) -> usize {
    let window = usize::try_from(bitrate.to_bytes_per_period(estimated_rtt))
        .unwrap_or(usize::MAX);

    // Never less than a packet, or nothing could ever be sent.
    window.max(max_packet_size)
}

impl FixRateSender {
    /// Creates a sender from `config`. The clock provides the starting time
    /// of the rate accounting.
    ///
    /// Fails with `Error::InvalidCapacity` if a configured bucket capacity
    /// cannot hold a maximum sized packet.
    pub fn new(config: &Config, clock: &dyn Clock) -> Result<Self> {
        if config.target_bitrate.is_zero() {
            return Err(Error::InvalidBitrate);
        }

        if config.estimated_rtt.is_zero() {
            return Err(Error::InvalidRtt);
        }

        if config.max_packet_size == 0 {
            return Err(Error::InvalidPacketSize);
        }

        let window = window_for(
            config.target_bitrate,
            config.estimated_rtt,
            config.max_packet_size,
        );

        let capacity = config.bucket_capacity.unwrap_or(window);
        if capacity < config.max_packet_size {
            return Err(Error::InvalidCapacity);
        }

        let now = clock.now();

        trace!(
            "{} fix rate sender bitrate={:?} cwnd={} bucket_capacity={}",
            config.trace_id,
            config.target_bitrate,
            window,
            capacity
        );

        Ok(FixRateSender {
            target_bitrate: config.target_bitrate,

            leaky_bucket: LeakyBucket::new(
                capacity,
                config.target_bitrate,
                now,
            )?,

            paced_sender: PacedSender::new(
                config.pacing,
                config.target_bitrate,
                window,
            )?,

            bytes_in_flight: BytesInFlight::default(),

            estimated_rtt: config.estimated_rtt,

            max_packet_size: config.max_packet_size,

            fixed_bucket_capacity: config.bucket_capacity.is_some(),

            largest_sent_packet: None,

            stats: SendStats::default(),

            trace_id: config.trace_id.clone(),
        })
    }

    /// Switches to a new target bitrate at `now`. Bytes already accounted for
    /// drain at the old rate up to `now`. A zero bitrate is ignored.
    pub fn set_target_bitrate(&mut self, now: Instant, bitrate: Bandwidth) {
        if bitrate.is_zero() {
            debug!("{} ignoring zero target bitrate", self.trace_id);
            return;
        }

        self.target_bitrate = bitrate;

        self.leaky_bucket.set_draining_rate(now, bitrate);
        self.paced_sender.update_rate(bitrate);

        let window = self.congestion_window();
        self.paced_sender.set_max_burst(window);

        if !self.fixed_bucket_capacity {
            self.leaky_bucket.set_capacity(window);
        }

        debug!("{} new target bitrate {:?}", self.trace_id, self);
    }

    fn was_sent(&self, packet_number: u64) -> bool {
        self.largest_sent_packet
            .is_some_and(|largest| packet_number <= largest)
    }
}

impl SendAlgorithm for FixRateSender {
    fn on_congestion_feedback(
        &mut self, feedback: &CongestionFeedback, receive_time: Instant,
        _sent_bandwidth: Bandwidth, _sent_packets: &SentPacketsMap,
    ) {
        self.stats.feedback_frames += 1;

        match feedback {
            CongestionFeedback::FixRate { bitrate } =>
                self.set_target_bitrate(receive_time, *bitrate),

            // Silently ignore feedback meant for other algorithms.
            _ => trace!(
                "{} ignoring {} congestion feedback",
                self.trace_id,
                feedback.kind()
            ),
        }
    }

    fn on_incoming_ack(
        &mut self, packet_number: u64, acked_bytes: usize, rtt: Duration,
    ) {
        if !self.was_sent(packet_number) {
            debug!(
                "{} ignoring ack for unsent packet {}",
                self.trace_id, packet_number
            );
            return;
        }

        self.bytes_in_flight.saturating_subtract(acked_bytes);
        self.paced_sender.on_incoming_ack();

        self.stats.acked_packets += 1;
        self.stats.acked_bytes =
            self.stats.acked_bytes.saturating_add(acked_bytes);

        trace!(
            "{} packet acked {} bytes={} rtt={:?} {:?}",
            self.trace_id,
            packet_number,
            acked_bytes,
            rtt,
            self
        );
    }

    fn on_incoming_loss(&mut self, loss_detected_time: Instant) {
        // The rate is fixed, a loss only stops an ongoing burst.
        self.paced_sender.on_incoming_loss();

        self.stats.loss_events += 1;

        debug!(
            "{} loss detected at {:?}, keeping bitrate {:?}",
            self.trace_id, loss_detected_time, self.target_bitrate
        );
    }

    fn on_packet_abandoned(
        &mut self, packet_number: u64, abandoned_bytes: usize,
    ) {
        if !self.was_sent(packet_number) {
            debug!(
                "{} ignoring abandon of unsent packet {}",
                self.trace_id, packet_number
            );
            return;
        }

        self.bytes_in_flight.saturating_subtract(abandoned_bytes);

        self.stats.abandoned_packets += 1;

        trace!(
            "{} packet abandoned {} bytes={} {:?}",
            self.trace_id,
            packet_number,
            abandoned_bytes,
            self
        );
    }

    fn on_packet_sent(
        &mut self, sent_time: Instant, packet_number: u64, bytes: usize,
        is_retransmission: bool, _has_retransmittable_data: bool,
    ) {
        match self.largest_sent_packet {
            Some(largest) if packet_number <= largest => debug!(
                "{} packet {} sent after {}",
                self.trace_id, packet_number, largest
            ),

            _ => self.largest_sent_packet = Some(packet_number),
        }

        // The bytes are on the wire whatever their packet number says, so
        // they are always accounted for.
        self.bytes_in_flight.add(bytes);
        self.paced_sender.on_packet_sent(sent_time, bytes);
        self.leaky_bucket.add(sent_time, bytes);

        self.stats.sent_packets += 1;
        self.stats.sent_bytes = self.stats.sent_bytes.saturating_add(bytes);

        if is_retransmission {
            self.stats.retransmitted_packets += 1;
        }

        trace!(
            "{} packet sent {} bytes={} {:?}",
            self.trace_id,
            packet_number,
            bytes,
            self
        );
    }

    fn time_until_send(
        &self, now: Instant, _is_retransmission: bool,
    ) -> Duration {
        let window_open = self.bytes_in_flight.get() < self.congestion_window();

        let pacing_delay = self.paced_sender.time_until_send(now, window_open);

        if !window_open {
            // We need an ack before we send more.
            return pacing_delay;
        }

        let bucket_delay = self
            .leaky_bucket
            .time_until_room(now, self.max_packet_size);

        pacing_delay.max(bucket_delay)
    }

    fn bandwidth_estimate(&self) -> Bandwidth {
        self.target_bitrate
    }

    fn congestion_window(&self) -> usize {
        window_for(self.target_bitrate, self.estimated_rtt, self.max_packet_size)
    }

    fn bytes_in_flight(&self) -> usize {
        self.bytes_in_flight.get()
    }

    fn stats(&self) -> SendStats {
        self.stats
    }
}

impl std::fmt::Debug for FixRateSender {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bitrate={:?} cwnd={} bytes_in_flight={} bucket_capacity={} \
             burst_tokens={}",
            self.target_bitrate,
            self.congestion_window(),
            self.bytes_in_flight.get(),
            self.leaky_bucket.capacity(),
            self.paced_sender.burst_tokens(),
        )
    }
}
