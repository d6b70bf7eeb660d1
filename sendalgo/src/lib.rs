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

//! 🚦 Send-side congestion control for packet based transports.
//!
//! sendalgo decides *when* a transport may put the next packet on the
//! wire. It owns no sockets and no timers: the transport asks
//! [`time_until_send()`] before every send, reports every packet it writes
//! with [`on_packet_sent()`], and forwards acks, losses and receiver
//! feedback as they arrive. Waiting is expressed as a returned
//! [`Duration`], so a single event loop can drive any number of
//! connections.
//!
//! [`time_until_send()`]: SendAlgorithm::time_until_send
//! [`on_packet_sent()`]: SendAlgorithm::on_packet_sent
//!
//! ## Configuring a sender
//!
//! Senders are created from a [`Config`], which carries the target bitrate
//! and the parameters derived from it:
//!
//! ```
//! # use std::time::Duration;
//! let mut config =
//!     sendalgo::Config::new(sendalgo::Bandwidth::from_mbits_per_second(8))?;
//! config.set_estimated_rtt(Duration::from_millis(20))?;
//! config.set_max_packet_size(1350)?;
//! # Ok::<(), sendalgo::Error>(())
//! ```
//!
//! The clock is passed in explicitly. Tests use [`ManualClock`] to step time
//! deterministically:
//!
//! ```
//! # use std::time::Duration;
//! use sendalgo::Clock;
//! use sendalgo::SendAlgorithm;
//!
//! let clock = sendalgo::ManualClock::default();
//! let bitrate = sendalgo::Bandwidth::from_bytes_per_second(1_000_000);
//! let config = sendalgo::Config::new(bitrate)?;
//! let mut sender = sendalgo::Sender::from_config(&config, &clock)?;
//!
//! let now = clock.now();
//! assert_eq!(sender.time_until_send(now, false), Duration::ZERO);
//!
//! sender.on_packet_sent(now, 1, 1000, false, true);
//! assert_eq!(sender.time_until_send(now, false), Duration::from_millis(1));
//! # Ok::<(), sendalgo::Error>(())
//! ```
//!
//! ## Errors
//!
//! Invalid parameters are rejected when the configuration is built or the
//! sender is created. After that no operation fails: malformed inputs such
//! as acks for packets that were never sent are logged and ignored, and
//! all arithmetic saturates.

#![allow(clippy::upper_case_acronyms)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate log;

use std::str::FromStr;
use std::time::Duration;

/// Returned by [`SendAlgorithm::time_until_send()`] when nothing can be sent
/// until an ack or feedback event opens the congestion window. Callers
/// should not arm a timer for it.
pub const INFINITE_DELAY: Duration = Duration::MAX;

/// The RTT estimate used to size fixed-rate congestion windows when none
/// is configured.
pub const DEFAULT_ESTIMATED_RTT: Duration = Duration::from_millis(10);

/// The default maximum packet size, in bytes.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1200;

/// Stores configuration shared between multiple senders.
#[derive(Clone, Debug)]
pub struct Config {
    cc_algorithm: CongestionControlAlgorithm,

    target_bitrate: Bandwidth,

    bucket_capacity: Option<usize>,

    estimated_rtt: Duration,

    max_packet_size: usize,

    pacing: bool,

    trace_id: String,
}

impl Config {
    /// Creates a config object with the given target bitrate.
    ///
    /// ## Examples:
    ///
    /// ```
    /// let bitrate = sendalgo::Bandwidth::from_kbits_per_second(800);
    /// let config = sendalgo::Config::new(bitrate)?;
    /// # Ok::<(), sendalgo::Error>(())
    /// ```
    pub fn new(target_bitrate: Bandwidth) -> Result<Config> {
        if target_bitrate.is_zero() {
            return Err(Error::InvalidBitrate);
        }

        Ok(Config {
            cc_algorithm: CongestionControlAlgorithm::FixRate,
            target_bitrate,
            bucket_capacity: None,
            estimated_rtt: DEFAULT_ESTIMATED_RTT,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            pacing: true,
            trace_id: String::new(),
        })
    }

    /// Sets the rate a fixed-rate sender transmits at.
    pub fn set_target_bitrate(&mut self, bitrate: Bandwidth) -> Result<()> {
        if bitrate.is_zero() {
            return Err(Error::InvalidBitrate);
        }

        self.target_bitrate = bitrate;

        Ok(())
    }

    /// Sets the congestion control algorithm used by string.
    ///
    /// The default value is `fixrate`. On error `Error::CongestionControl`
    /// will be returned.
    ///
    /// ## Examples:
    ///
    /// ```
    /// # let bitrate = sendalgo::Bandwidth::from_kbits_per_second(800);
    /// # let mut config = sendalgo::Config::new(bitrate)?;
    /// config.set_cc_algorithm_name("fixrate")?;
    /// # Ok::<(), sendalgo::Error>(())
    /// ```
    pub fn set_cc_algorithm_name(&mut self, name: &str) -> Result<()> {
        self.cc_algorithm = CongestionControlAlgorithm::from_str(name)?;

        Ok(())
    }

    /// Sets the congestion control algorithm used.
    ///
    /// The default value is `CongestionControlAlgorithm::FixRate`.
    pub fn set_cc_algorithm(&mut self, algo: CongestionControlAlgorithm) {
        self.cc_algorithm = algo;
    }

    /// Sets the leaky bucket capacity, in bytes. This bounds how much data
    /// can leave back to back.
    ///
    /// The default is one congestion window. The capacity must hold at least
    /// one maximum sized packet, which is checked when a sender is created.
    pub fn set_bucket_capacity(&mut self, bytes: usize) -> Result<()> {
        if bytes == 0 {
            return Err(Error::InvalidCapacity);
        }

        self.bucket_capacity = Some(bytes);

        Ok(())
    }

    /// Sets the RTT estimate the congestion window is derived from.
    ///
    /// The default value is 10 milliseconds.
    pub fn set_estimated_rtt(&mut self, rtt: Duration) -> Result<()> {
        if rtt.is_zero() {
            return Err(Error::InvalidRtt);
        }

        self.estimated_rtt = rtt;

        Ok(())
    }

    /// Sets the largest packet the transport sends, in bytes.
    ///
    /// The default value is `1200`.
    pub fn set_max_packet_size(&mut self, bytes: usize) -> Result<()> {
        if bytes == 0 {
            return Err(Error::InvalidPacketSize);
        }

        self.max_packet_size = bytes;

        Ok(())
    }

    /// Configures whether to enable pacing.
    ///
    /// The default value is `true`.
    pub fn enable_pacing(&mut self, v: bool) {
        self.pacing = v;
    }

    /// Sets the identifier prefixed to every log line of senders created
    /// from this config.
    pub fn set_trace_id(&mut self, trace_id: &str) {
        self.trace_id = trace_id.to_string();
    }
}

pub use crate::bandwidth::Bandwidth;

pub use crate::clock::Clock;
pub use crate::clock::ManualClock;
pub use crate::clock::MonotonicClock;

pub use crate::error::Error;
pub use crate::error::Result;

pub use crate::feedback::CongestionFeedback;
pub use crate::feedback::ReceivedPacket;
pub use crate::feedback::SentPacket;
pub use crate::feedback::SentPacketsMap;

pub use crate::leaky_bucket::LeakyBucket;

pub use crate::pacer::PacedSender;

pub use crate::sender::fix_rate::FixRateSender;
pub use crate::sender::CongestionControlAlgorithm;
pub use crate::sender::SendAlgorithm;
pub use crate::sender::SendStats;
pub use crate::sender::Sender;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod tests;

mod bandwidth;
mod bytes_in_flight;
mod clock;
mod error;
mod feedback;
mod leaky_bucket;
mod pacer;
mod sender;
