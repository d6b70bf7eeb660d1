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

//! Burst-bounded byte accounting against a steady draining rate.

use std::time::Duration;
use std::time::Instant;

use crate::bandwidth::Bandwidth;
use crate::Error;
use crate::Result;

/// Tracks bytes sent against a fixed budget.
///
/// Every byte put on the wire is added to the bucket, and the bucket drains
/// at `draining_rate`. The level never exceeds `capacity`, which bounds how
/// much data can be sent back to back before the rate takes over.
///
/// Queries are pure functions of the stored state and the time passed in,
/// so asking twice for the same `now` always gives the same answer and
/// later times never report a larger backlog.
#[derive(Debug, Clone)]
pub struct LeakyBucket {
    capacity: usize,

    /// Bytes pending as of `last_update`.
    level: usize,

    draining_rate: Bandwidth,

    /// Time up to which draining has been applied to `level`. Any time
    /// between this and the last call that was too short to drain a whole
    /// byte is carried over to the next update.
    last_update: Instant,
}

impl LeakyBucket {
    /// Creates an empty bucket.
    ///
    /// Fails with `Error::InvalidCapacity` if `capacity` is zero, and with
    /// `Error::InvalidBitrate` if `draining_rate` is zero.
    pub fn new(
        capacity: usize, draining_rate: Bandwidth, now: Instant,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity);
        }

        if draining_rate.is_zero() {
            return Err(Error::InvalidBitrate);
        }

        Ok(LeakyBucket {
            capacity,
            level: 0,
            draining_rate,
            last_update: now,
        })
    }

    /// Records `bytes` sent at `now`. The level saturates at the capacity.
    pub fn add(&mut self, now: Instant, bytes: usize) {
        self.drain(now);

        self.level = self.level.saturating_add(bytes).min(self.capacity);
    }

    /// Changes the draining rate. Bytes pending up to `now` drain at the old
    /// rate. A zero rate is ignored.
    pub fn set_draining_rate(&mut self, now: Instant, draining_rate: Bandwidth) {
        if draining_rate.is_zero() {
            return;
        }

        self.drain(now);

        if now > self.last_update {
            self.last_update = now;
        }

        self.draining_rate = draining_rate;
    }

    /// Changes the capacity, dropping any excess pending bytes. A zero
    /// capacity is ignored.
    pub fn set_capacity(&mut self, capacity: usize) {
        if capacity == 0 {
            return;
        }

        self.capacity = capacity;
        self.level = self.level.min(capacity);
    }

    /// Bytes still pending at `now`.
    pub fn bytes_pending(&self, now: Instant) -> usize {
        self.level.saturating_sub(self.drained_since_update(now))
    }

    /// Time until the bucket is completely drained, or zero if it already
    /// is.
    pub fn time_remaining(&self, now: Instant) -> Duration {
        self.time_until_level(now, 0)
    }

    /// Time until `bytes` more can be added without hitting the capacity.
    /// Requests larger than the capacity wait for an empty bucket.
    pub fn time_until_room(&self, now: Instant, bytes: usize) -> Duration {
        let target = self.capacity - bytes.min(self.capacity);

        self.time_until_level(now, target)
    }

    /// The configured steady-state rate.
    pub fn rate_limit(&self) -> Bandwidth {
        self.draining_rate
    }

    /// Maximum number of pending bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn time_until_level(&self, now: Instant, target: usize) -> Duration {
        let excess = self.level.saturating_sub(target);
        if excess == 0 {
            return Duration::ZERO;
        }

        let elapsed = now.saturating_duration_since(self.last_update);

        self.draining_rate
            .transfer_time(excess)
            .saturating_sub(elapsed)
    }

    fn drained_since_update(&self, now: Instant) -> usize {
        let elapsed = now.saturating_duration_since(self.last_update);

        usize::try_from(self.draining_rate.to_bytes_per_period(elapsed))
            .unwrap_or(usize::MAX)
    }

    fn drain(&mut self, now: Instant) {
        let drained = self.drained_since_update(now);
        if drained == 0 {
            return;
        }

        if drained >= self.level {
            // An empty bucket does not bank credit for the idle time.
            self.level = 0;
            self.last_update = now;
            return;
        }

        self.level -= drained;
        self.last_update += self.draining_rate.transfer_time(drained);
    }
}
