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

pub mod fix_rate;

use std::fmt::Debug;
use std::str::FromStr;
use std::time::Duration;
use std::time::Instant;

use crate::bandwidth::Bandwidth;
use crate::clock::Clock;
use crate::feedback::CongestionFeedback;
use crate::feedback::SentPacketsMap;
use crate::Config;
use crate::Error;
use crate::Result;

/// Available congestion control algorithms.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub enum CongestionControlAlgorithm {
    /// Fixed target bitrate, ignores congestion signals. `fixrate` in a
    /// string form.
    FixRate = 0,
}

impl FromStr for CongestionControlAlgorithm {
    type Err = Error;

    /// Converts a string to `CongestionControlAlgorithm`.
    ///
    /// If `name` is not valid, `Error::CongestionControl` is returned.
    fn from_str(name: &str) -> Result<Self> {
        match name {
            "fixrate" | "fix_rate" => Ok(CongestionControlAlgorithm::FixRate),

            _ => Err(Error::CongestionControl),
        }
    }
}

/// Counters kept by every sender, for diagnostics only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendStats {
    /// Packets reported through `on_packet_sent()`.
    pub sent_packets: usize,

    /// Bytes reported through `on_packet_sent()`.
    pub sent_bytes: usize,

    /// How many of the sent packets were retransmissions.
    pub retransmitted_packets: usize,

    /// Acks accepted through `on_incoming_ack()`.
    pub acked_packets: usize,

    /// Bytes acknowledged.
    pub acked_bytes: usize,

    /// Packets given up on through `on_packet_abandoned()`.
    pub abandoned_packets: usize,

    /// Loss signals received through `on_incoming_loss()`.
    pub loss_events: usize,

    /// Feedback frames received, whether acted on or not.
    pub feedback_frames: usize,
}

/// A congestion control strategy.
///
/// One instance exists per connection and is driven from that connection's
/// processing loop only. None of the methods block, allocate or fail.
#[enum_dispatch::enum_dispatch]
pub trait SendAlgorithm: Debug {
    /// Informs the algorithm of a congestion feedback frame received from the
    /// peer. `sent_bandwidth` is the rate the transport measured for its own
    /// sends and `sent_packets` the packets still tracked.
    fn on_congestion_feedback(
        &mut self, feedback: &CongestionFeedback, receive_time: Instant,
        sent_bandwidth: Bandwidth, sent_packets: &SentPacketsMap,
    );

    /// Informs that `packet_number` was acknowledged. `rtt` is the round
    /// trip sample for that packet. Acks may arrive out of order.
    fn on_incoming_ack(
        &mut self, packet_number: u64, acked_bytes: usize, rtt: Duration,
    );

    /// Informs that a loss was detected at `loss_detected_time`.
    fn on_incoming_loss(&mut self, loss_detected_time: Instant);

    /// Informs that `packet_number` will never be acknowledged, for example
    /// because it was declared lost and its data retransmitted elsewhere.
    /// Its bytes no longer count as in flight.
    fn on_packet_abandoned(&mut self, packet_number: u64, abandoned_bytes: usize);

    /// Inform that we sent `bytes` to the wire. Must be called exactly once
    /// for every packet sent, right after the write, whatever
    /// `time_until_send()` said before.
    fn on_packet_sent(
        &mut self, sent_time: Instant, packet_number: u64, bytes: usize,
        is_retransmission: bool, has_retransmittable_data: bool,
    );

    /// Returns how long the caller has to wait before sending the next packet.
    /// Zero means now. [`INFINITE_DELAY`] means not until an ack or feedback
    /// event arrives.
    ///
    /// Without intervening events, asking again at a later `now` never
    /// returns a later release time.
    ///
    /// [`INFINITE_DELAY`]: crate::INFINITE_DELAY
    fn time_until_send(&self, now: Instant, is_retransmission: bool)
        -> Duration;

    /// Returns the current estimate of the achievable sending rate. This is
    /// informational, send timing comes from `time_until_send()`.
    fn bandwidth_estimate(&self) -> Bandwidth;

    /// Returns the size of the current congestion window in bytes. Note, this
    /// is not the *available* window.
    fn congestion_window(&self) -> usize;

    /// Bytes sent and neither acknowledged nor abandoned.
    fn bytes_in_flight(&self) -> usize;

    /// Diagnostic counters.
    fn stats(&self) -> SendStats;
}

/// Any of the available congestion control algorithms, dispatched without a
/// heap allocation.
#[enum_dispatch::enum_dispatch(SendAlgorithm)]
#[derive(Debug)]
pub enum Sender {
    /// See [`fix_rate::FixRateSender`].
    FixRate(fix_rate::FixRateSender),
}

impl Sender {
    /// Creates the sender selected by `config`.
    pub fn from_config(config: &Config, clock: &dyn Clock) -> Result<Self> {
        match config.cc_algorithm {
            CongestionControlAlgorithm::FixRate =>
                Ok(fix_rate::FixRateSender::new(config, clock)?.into()),
        }
    }
}
