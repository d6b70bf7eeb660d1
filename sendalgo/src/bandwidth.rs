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

const NUM_MILLIS_PER_SECOND: u64 = 1000;
const NUM_MICROS_PER_MILLI: u64 = 1000;
const NUM_MICROS_PER_SECOND: u64 = NUM_MICROS_PER_MILLI * NUM_MILLIS_PER_SECOND;
const NUM_NANOS_PER_SECOND: u64 = 1000 * NUM_MICROS_PER_SECOND;

/// A sending rate.
///
/// Stored as bits per second. All conversions to and from byte counts and
/// durations go through 128-bit intermediates and saturate instead of
/// wrapping, so multi-gigabit rates over long periods stay well defined.
#[derive(PartialEq, PartialOrd, Eq, Ord, Clone, Copy, Hash)]
pub struct Bandwidth {
    bits_per_second: u64,
}

fn saturate_u64(v: u128) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

impl Bandwidth {
    /// The rate at which `bytes` were transferred over `time_delta`. A zero
    /// delta is treated as one nanosecond.
    pub const fn from_bytes_and_time_delta(
        bytes: usize, time_delta: Duration,
    ) -> Self {
        if bytes == 0 {
            return Bandwidth { bits_per_second: 0 };
        }

        let mut nanos = time_delta.as_nanos();
        if nanos == 0 {
            nanos = 1;
        }

        let num_nano_bits = 8 * bytes as u128 * NUM_NANOS_PER_SECOND as u128;
        if num_nano_bits < nanos {
            return Bandwidth { bits_per_second: 1 };
        }

        let bps = num_nano_bits / nanos;

        Bandwidth {
            bits_per_second: if bps > u64::MAX as u128 {
                u64::MAX
            } else {
                bps as u64
            },
        }
    }

    /// Creates a rate from bytes per second.
    pub const fn from_bytes_per_second(bytes_per_second: u64) -> Self {
        Bandwidth {
            bits_per_second: bytes_per_second.saturating_mul(8),
        }
    }

    /// Creates a rate from kilobits (1000 bits) per second.
    pub const fn from_kbits_per_second(k_bits_per_second: u64) -> Self {
        Bandwidth {
            bits_per_second: k_bits_per_second.saturating_mul(1_000),
        }
    }

    /// Creates a rate from megabits (10^6 bits) per second.
    pub const fn from_mbits_per_second(m_bits_per_second: u64) -> Self {
        Bandwidth::from_kbits_per_second(m_bits_per_second.saturating_mul(1_000))
    }

    /// Returns the rate in whole bytes per second.
    pub const fn to_bytes_per_second(self) -> u64 {
        self.bits_per_second / 8
    }

    /// The largest representable rate.
    pub const fn infinite() -> Self {
        Bandwidth {
            bits_per_second: u64::MAX,
        }
    }

    /// No bandwidth at all.
    pub const fn zero() -> Self {
        Bandwidth { bits_per_second: 0 }
    }

    /// Whether this is [`Bandwidth::zero()`].
    pub const fn is_zero(&self) -> bool {
        self.bits_per_second == 0
    }

    /// Time it takes to put `bytes` on the wire at this rate. A zero rate
    /// has no meaningful transfer time and returns zero.
    pub fn transfer_time(&self, bytes: usize) -> Duration {
        if self.bits_per_second == 0 {
            return Duration::ZERO;
        }

        let nanos = bytes as u128 * 8 * NUM_NANOS_PER_SECOND as u128 /
            self.bits_per_second as u128;

        Duration::from_nanos(saturate_u64(nanos))
    }

    /// Number of bytes that can be sent at this rate over `time_period`.
    pub fn to_bytes_per_period(self, time_period: Duration) -> u64 {
        let bytes = self.bits_per_second as u128 * time_period.as_nanos() /
            8 /
            NUM_NANOS_PER_SECOND as u128;

        saturate_u64(bytes)
    }
}

impl std::fmt::Debug for Bandwidth {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.bits_per_second {
            x if x < 1_000_000 => write!(f, "{:.2} Kbps", x as f64 / 1_000.),
            x if x < 1_000_000_000 => {
                write!(f, "{:.2} Mbps", x as f64 / 1_000_000.)
            },
            x => write!(f, "{:.2} Gbps", x as f64 / 1_000_000_000.),
        }
    }
}
