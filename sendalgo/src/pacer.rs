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
use std::time::Instant;

use crate::bandwidth::Bandwidth;
use crate::Error;
use crate::Result;
use crate::INFINITE_DELAY;

/// Upper bound on the pacing delay charged for a single send, so an absurd
/// byte count cannot push the release time past what [`Instant`] can hold.
const MAX_PACING_DELAY: Duration = Duration::from_secs(3600);

/// Spreads sends evenly at a configured rate.
///
/// Every byte sent pushes the ideal release time of the next packet out by
/// its transfer time at `rate`. Time the connection spends idle past that
/// release time turns into burst credit, which lets the sender catch up
/// with back-to-back packets, but never by more than `max_burst` bytes.
#[derive(Debug)]
pub struct PacedSender {
    /// Should this [`PacedSender`] be making any release decisions?
    enabled: bool,

    rate: Bandwidth,

    /// Bytes that may be sent without advancing the release time.
    burst_tokens: usize,

    /// Cap on `burst_tokens`, normally one congestion window.
    max_burst: usize,

    /// When can the next packet be sent. `None` until the first send.
    next_send_time: Option<Instant>,
}

impl PacedSender {
    /// Creates a pacer sending at `rate` that banks at most `max_burst`
    /// bytes of credit. A disabled pacer only enforces the congestion
    /// window.
    ///
    /// Fails with `Error::InvalidBitrate` if `rate` is zero.
    pub fn new(
        enabled: bool, rate: Bandwidth, max_burst: usize,
    ) -> Result<Self> {
        if rate.is_zero() {
            return Err(Error::InvalidBitrate);
        }

        Ok(PacedSender {
            enabled,
            rate,
            burst_tokens: 0,
            max_burst,
            next_send_time: None,
        })
    }

    /// Returns how long to wait before the next send. When the congestion
    /// window is closed the answer is [`INFINITE_DELAY`]: the caller should
    /// wait for an ack rather than a timer.
    pub fn time_until_send(
        &self, now: Instant, congestion_window_allows_send: bool,
    ) -> Duration {
        if !congestion_window_allows_send {
            return INFINITE_DELAY;
        }

        if !self.enabled {
            return Duration::ZERO;
        }

        match self.next_send_time {
            Some(next) => next.saturating_duration_since(now),

            None => Duration::ZERO,
        }
    }

    /// Inform that `bytes` were put on the wire at `now`.
    pub fn on_packet_sent(&mut self, now: Instant, bytes: usize) {
        if !self.enabled {
            return;
        }

        let anchor = match self.next_send_time {
            Some(next) if next < now => {
                // Sending later than scheduled. Bank the gap as credit, up
                // to one window.
                let idle_bytes = usize::try_from(
                    self.rate.to_bytes_per_period(now - next),
                )
                .unwrap_or(usize::MAX);

                self.burst_tokens = self
                    .burst_tokens
                    .saturating_add(idle_bytes)
                    .min(self.max_burst);

                now
            },

            Some(next) => next,

            None => now,
        };

        let paid = bytes.min(self.burst_tokens);
        self.burst_tokens -= paid;

        let delay = self
            .rate
            .transfer_time(bytes - paid)
            .min(MAX_PACING_DELAY);

        self.next_send_time = Some(anchor + delay);
    }

    /// Acks do not change the pacing schedule.
    pub fn on_incoming_ack(&mut self) {}

    /// Drops any banked credit, so a loss is never followed by a burst.
    pub fn on_incoming_loss(&mut self) {
        self.burst_tokens = 0;
    }

    /// Changes the pacing rate. Already scheduled release times are kept.
    /// A zero rate is ignored.
    pub fn update_rate(&mut self, rate: Bandwidth) {
        if rate.is_zero() {
            return;
        }

        self.rate = rate;
    }

    /// Changes the cap on banked credit, dropping any excess.
    pub fn set_max_burst(&mut self, max_burst: usize) {
        self.max_burst = max_burst;
        self.burst_tokens = self.burst_tokens.min(max_burst);
    }

    /// Bytes of credit currently banked.
    pub fn burst_tokens(&self) -> usize {
        self.burst_tokens
    }
}
