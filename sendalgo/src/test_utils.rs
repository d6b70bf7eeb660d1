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

use std::collections::VecDeque;
use std::ops::Deref;
use std::ops::DerefMut;
use std::time::Duration;
use std::time::Instant;

use crate::clock::Clock;
use crate::clock::ManualClock;
use crate::feedback::SentPacket;
use crate::feedback::SentPacketsMap;
use crate::Bandwidth;
use crate::Config;
use crate::SendAlgorithm;
use crate::Sender;
use crate::INFINITE_DELAY;

pub(crate) fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Drives a [`Sender`] the way a transport would, with a manual clock.
pub(crate) struct TestSender {
    sender: Sender,
    clock: ManualClock,
    pub(crate) next_pkt: u64,
    pub(crate) sent_packets: SentPacketsMap,
    // Every send as (time, bytes), in send order.
    pub(crate) send_log: Vec<(Instant, usize)>,
    // Acks scheduled to arrive, in arrival order.
    pending_acks: VecDeque<(Instant, u64)>,
}

impl TestSender {
    pub(crate) fn new(config: &Config) -> Self {
        let clock = ManualClock::default();
        let sender = Sender::from_config(config, &clock).unwrap();

        TestSender {
            sender,
            clock,
            next_pkt: 0,
            sent_packets: SentPacketsMap::new(),
            send_log: Vec::new(),
            pending_acks: VecDeque::new(),
        }
    }

    pub(crate) fn with_rate(bytes_per_second: u64) -> Self {
        let config =
            Config::new(Bandwidth::from_bytes_per_second(bytes_per_second))
                .unwrap();

        TestSender::new(&config)
    }

    pub(crate) fn time(&self) -> Instant {
        self.clock.now()
    }

    pub(crate) fn advance_time(&mut self, period: Duration) {
        self.clock.advance(period);
    }

    pub(crate) fn delay(&self) -> Duration {
        self.sender.time_until_send(self.time(), false)
    }

    pub(crate) fn send_packet(&mut self, bytes: usize) -> u64 {
        let pkt_num = self.next_pkt;
        let now = self.time();

        self.sender.on_packet_sent(now, pkt_num, bytes, false, true);

        self.sent_packets.insert(pkt_num, SentPacket {
            time_sent: now,
            bytes,
            is_retransmission: false,
            has_retransmittable_data: true,
        });

        self.send_log.push((now, bytes));
        self.next_pkt += 1;

        pkt_num
    }

    /// Sends a packet and schedules its ack to arrive `ack_delay` later.
    pub(crate) fn send_packet_acked_after(
        &mut self, bytes: usize, ack_delay: Duration,
    ) {
        let pkt_num = self.send_packet(bytes);
        self.pending_acks.push_back((self.time() + ack_delay, pkt_num));
    }

    pub(crate) fn ack_packet(&mut self, pkt_num: u64) {
        let sent = self.sent_packets.remove(&pkt_num).unwrap();
        let rtt = self.time().saturating_duration_since(sent.time_sent);

        self.sender.on_incoming_ack(pkt_num, sent.bytes, rtt);
    }

    /// Acks the `n` oldest outstanding packets.
    pub(crate) fn ack_n_packets(&mut self, n: usize) {
        for _ in 0..n {
            let pkt_num = *self.sent_packets.keys().next().unwrap();
            self.ack_packet(pkt_num);
        }
    }

    pub(crate) fn lose_packet(&mut self, pkt_num: u64) {
        let sent = self.sent_packets.remove(&pkt_num).unwrap();
        let now = self.time();

        self.sender.on_incoming_loss(now);
        self.sender.on_packet_abandoned(pkt_num, sent.bytes);
    }

    /// Delivers every scheduled ack that is due.
    pub(crate) fn deliver_acks(&mut self) {
        while let Some(&(at, pkt_num)) = self.pending_acks.front() {
            if at > self.time() {
                break;
            }

            self.pending_acks.pop_front();
            self.ack_packet(pkt_num);
        }
    }

    /// Keeps sending `bytes` sized packets until `deadline`, always waiting
    /// exactly as long as told. Returns the bytes sent.
    pub(crate) fn saturate_until(
        &mut self, deadline: Instant, bytes: usize, ack_delay: Duration,
    ) -> usize {
        let mut sent = 0;

        while self.time() < deadline {
            self.deliver_acks();

            let delay = self.delay();
            if delay.is_zero() {
                self.send_packet_acked_after(bytes, ack_delay);
                sent += bytes;
                continue;
            }

            let next_ack = self.pending_acks.front().map(|&(at, _)| at);
            let wake_up = match next_ack {
                Some(at) if delay == INFINITE_DELAY => at,

                None if delay == INFINITE_DELAY => deadline,

                Some(at) => (self.time() + delay).min(at),

                None => self.time() + delay,
            };

            self.clock.advance_to(wake_up.min(deadline));
        }

        sent
    }
}

impl Deref for TestSender {
    type Target = Sender;

    fn deref(&self) -> &Self::Target {
        &self.sender
    }
}

impl DerefMut for TestSender {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.sender
    }
}
