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

//! Inputs the transport hands to a sender besides plain acks and losses.

use std::collections::BTreeMap;
use std::time::Instant;

use smallvec::SmallVec;

use crate::bandwidth::Bandwidth;

/// What the transport remembers about a packet it has sent.
///
/// The transport owns these records. Senders only read them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SentPacket {
    /// When the packet was written to the wire.
    pub time_sent: Instant,

    /// Size of the packet, in bytes.
    pub bytes: usize,

    /// Whether the packet carries retransmitted data.
    pub is_retransmission: bool,

    /// Whether the packet carries data that must be retransmitted if lost.
    pub has_retransmittable_data: bool,
}

/// Sent packets keyed by packet number.
pub type SentPacketsMap = BTreeMap<u64, SentPacket>;

/// Receive time of a single packet, as reported by the peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceivedPacket {
    #[allow(missing_docs)]
    pub packet_number: u64,

    /// Receive time, translated to the sender's clock.
    pub time_received: Instant,
}

/// Congestion information reported by the receiver, separately from acks.
///
/// Each algorithm reads the kind it understands and ignores the others.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CongestionFeedback {
    /// Per-packet receive times, for delay based algorithms.
    #[allow(missing_docs)]
    InterArrival {
        accumulated_lost_packets: u16,
        received_packets: SmallVec<[ReceivedPacket; 8]>,
    },

    /// The rate the receiver wants a fixed-rate sender to use.
    #[allow(missing_docs)]
    FixRate { bitrate: Bandwidth },

    /// TCP style loss and receive window report.
    #[allow(missing_docs)]
    Tcp {
        accumulated_lost_packets: u16,
        receive_window: u64,
    },
}

impl CongestionFeedback {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CongestionFeedback::InterArrival { .. } => "inter_arrival",

            CongestionFeedback::FixRate { .. } => "fix_rate",

            CongestionFeedback::Tcp { .. } => "tcp",
        }
    }
}
