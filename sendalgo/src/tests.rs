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

use super::*;

use std::time::Duration;
use std::time::Instant;

use rstest::rstest;

use crate::test_utils::init;
use crate::test_utils::TestSender;

#[test]
fn cold_start() {
    init();

    let mut sender = TestSender::with_rate(1_000_000);

    assert_eq!(sender.delay(), Duration::ZERO);

    sender.send_packet(1_000);
    assert_eq!(sender.delay(), Duration::from_millis(1));

    sender.advance_time(Duration::from_micros(250));
    assert_eq!(sender.delay(), Duration::from_micros(750));

    sender.advance_time(Duration::from_micros(750));
    assert_eq!(sender.delay(), Duration::ZERO);
}

#[test]
fn burst_after_idle_is_bounded_by_window() {
    init();

    let mut sender = TestSender::with_rate(1_000_000);
    let cwnd = sender.congestion_window();
    assert_eq!(cwnd, 10_000);

    sender.send_packet(1_000);
    sender.advance_time(Duration::from_millis(5));
    sender.ack_n_packets(1);

    sender.advance_time(Duration::from_secs(10));

    let mut burst = 0;
    while sender.delay().is_zero() {
        sender.send_packet(1_000);
        burst += 1_000;
        assert!(burst <= cwnd);
    }

    // The bucket keeps room for one full sized packet, so the burst stops
    // one packet short of the window.
    assert_eq!(burst, 9_000);
    assert_eq!(sender.bytes_in_flight(), 9_000);

    // From here on sends are spaced at the target rate again.
    let delay = sender.delay();
    assert!(delay > Duration::ZERO);
    assert!(delay <= Duration::from_micros(1_200));
}

#[test]
fn loss_does_not_change_the_rate() {
    init();

    let mut sender = TestSender::with_rate(1_000_000);
    let estimate = sender.bandwidth_estimate();
    let cwnd = sender.congestion_window();

    let lost = sender.send_packet(1_000);
    sender.advance_time(Duration::from_millis(1));
    sender.send_packet(1_000);

    sender.advance_time(Duration::from_millis(20));
    sender.lose_packet(lost);

    assert_eq!(sender.bandwidth_estimate(), estimate);
    assert_eq!(sender.congestion_window(), cwnd);
    assert_eq!(sender.bytes_in_flight(), 1_000);
    assert_eq!(sender.stats().loss_events, 1);
    assert_eq!(sender.stats().abandoned_packets, 1);
}

#[test]
fn loss_stops_catch_up_burst() {
    init();

    let mut sender = TestSender::with_rate(1_000_000);

    sender.send_packet(1_000);
    sender.advance_time(Duration::from_millis(5));
    sender.ack_n_packets(1);

    // Sending 7ms after the scheduled release banks credit for a burst.
    sender.advance_time(Duration::from_millis(3));
    let pkt = sender.send_packet(1_000);

    let now = sender.time();
    sender.on_incoming_loss(now);
    sender.on_packet_abandoned(pkt, 1_000);

    sender.send_packet(1_000);
    assert_eq!(sender.delay(), Duration::from_millis(1));
}

#[rstest]
fn estimate_ignores_acks_and_losses(
    #[values(1_000, 100_000, 12_500_000)] bytes_per_second: u64,
    #[values(1, 10, 100)] events: usize,
) {
    init();

    let mut sender = TestSender::with_rate(bytes_per_second);
    let estimate = sender.bandwidth_estimate();
    assert_eq!(
        estimate,
        Bandwidth::from_bytes_per_second(bytes_per_second)
    );

    for i in 0..events {
        sender.send_packet(1_000);
        sender.advance_time(Duration::from_millis(3));

        if i % 3 == 0 {
            let pkt = *sender.sent_packets.keys().next().unwrap();
            sender.lose_packet(pkt);
        } else {
            sender.ack_n_packets(1);
        }

        assert_eq!(sender.bandwidth_estimate(), estimate);
    }
}

#[rstest]
fn long_run_rate_is_bounded(
    #[values(100_000, 1_000_000, 12_500_000)] bytes_per_second: u64,
    #[values(500, 1_200)] packet_size: usize,
) {
    init();

    let mut config =
        Config::new(Bandwidth::from_bytes_per_second(bytes_per_second))
            .unwrap();
    config.set_max_packet_size(packet_size).unwrap();

    let mut sender = TestSender::new(&config);

    let period = Duration::from_secs(1);
    let deadline = sender.time() + period;

    let sent = sender.saturate_until(
        deadline,
        packet_size,
        Duration::from_millis(5),
    ) as u64;

    let budget = bytes_per_second + packet_size as u64;
    assert!(sent <= budget, "sent {sent} bytes, budget {budget}");
    assert!(
        sent * 100 >= bytes_per_second * 95,
        "sent {sent} bytes at {bytes_per_second} B/s"
    );
}

#[test]
fn time_until_send_is_monotone() {
    init();

    let mut sender = TestSender::with_rate(1_000_000);
    let start = sender.time();

    // Ignore the pacer and push a small backlog.
    for _ in 0..5 {
        sender.send_packet(1_000);
    }

    let mut previous_delay = sender.delay();
    let mut previous_release = start + previous_delay;

    for us in (0..8_000).step_by(137) {
        let now = start + Duration::from_micros(us);
        let delay = sender.time_until_send(now, false);

        assert!(delay <= previous_delay);
        assert!(now + delay <= previous_release.max(now));

        previous_delay = delay;
        previous_release = now + delay;
    }

    assert_eq!(previous_delay, Duration::ZERO);
}

#[test]
fn queries_are_idempotent() {
    let mut sender = TestSender::with_rate(1_000_000);

    sender.send_packet(1_000);
    sender.send_packet(1_000);
    sender.advance_time(Duration::from_micros(300));

    let first = sender.delay();
    assert_eq!(sender.delay(), first);
    assert_eq!(sender.delay(), first);
    assert_eq!(first, Duration::from_micros(1_700));
}

#[test]
fn closed_window_needs_ack() {
    init();

    let mut sender = TestSender::with_rate(1_000_000);

    for _ in 0..10 {
        sender.send_packet(1_000);
    }

    sender.advance_time(Duration::from_secs(1));
    assert_eq!(sender.delay(), INFINITE_DELAY);

    sender.ack_n_packets(1);
    assert_eq!(sender.delay(), Duration::ZERO);
}

#[test]
fn fix_rate_feedback_retargets() {
    init();

    let mut sender = TestSender::with_rate(1_000_000);
    let now = sender.time();

    sender.on_congestion_feedback(
        &CongestionFeedback::FixRate {
            bitrate: Bandwidth::from_bytes_per_second(500_000),
        },
        now,
        Bandwidth::zero(),
        &SentPacketsMap::new(),
    );

    assert_eq!(
        sender.bandwidth_estimate(),
        Bandwidth::from_bytes_per_second(500_000)
    );
    assert_eq!(sender.congestion_window(), 5_000);

    sender.send_packet(1_000);
    assert_eq!(sender.delay(), Duration::from_millis(2));
}

#[rstest]
#[case::tcp(CongestionFeedback::Tcp {
    accumulated_lost_packets: 12,
    receive_window: 65_535,
})]
#[case::inter_arrival(CongestionFeedback::InterArrival {
    accumulated_lost_packets: 3,
    received_packets: smallvec::smallvec![],
})]
#[case::zero_bitrate(CongestionFeedback::FixRate {
    bitrate: Bandwidth::zero(),
})]
fn other_feedback_is_ignored(#[case] feedback: CongestionFeedback) {
    init();

    let mut sender = TestSender::with_rate(1_000_000);
    let now = sender.time();

    sender.on_congestion_feedback(
        &feedback,
        now,
        Bandwidth::zero(),
        &SentPacketsMap::new(),
    );

    assert_eq!(
        sender.bandwidth_estimate(),
        Bandwidth::from_bytes_per_second(1_000_000)
    );
    assert_eq!(sender.congestion_window(), 10_000);
    assert_eq!(sender.stats().feedback_frames, 1);
}

#[test]
fn feedback_keeps_configured_bucket_capacity() {
    let mut config =
        Config::new(Bandwidth::from_bytes_per_second(1_000_000)).unwrap();
    config.set_bucket_capacity(4_000).unwrap();
    config.set_max_packet_size(1_000).unwrap();
    config.enable_pacing(false);

    let mut sender = TestSender::new(&config);
    let now = sender.time();

    sender.on_congestion_feedback(
        &CongestionFeedback::FixRate {
            bitrate: Bandwidth::from_bytes_per_second(2_000_000),
        },
        now,
        Bandwidth::zero(),
        &SentPacketsMap::new(),
    );

    assert_eq!(sender.congestion_window(), 20_000);

    let mut burst = 0;
    while sender.delay().is_zero() {
        sender.send_packet(1_000);
        burst += 1_000;
    }

    assert_eq!(burst, 4_000);
    assert_eq!(sender.delay(), Duration::from_micros(500));
}

#[test]
fn config_errors() {
    assert_eq!(
        Config::new(Bandwidth::zero()).err(),
        Some(Error::InvalidBitrate)
    );

    let mut config = Config::new(Bandwidth::from_kbits_per_second(800)).unwrap();

    assert_eq!(
        config.set_target_bitrate(Bandwidth::zero()),
        Err(Error::InvalidBitrate)
    );
    assert_eq!(
        config.set_estimated_rtt(Duration::ZERO),
        Err(Error::InvalidRtt)
    );
    assert_eq!(config.set_max_packet_size(0), Err(Error::InvalidPacketSize));
    assert_eq!(config.set_bucket_capacity(0), Err(Error::InvalidCapacity));
    assert_eq!(
        config.set_cc_algorithm_name("reno"),
        Err(Error::CongestionControl)
    );

    assert_eq!(config.set_cc_algorithm_name("fixrate"), Ok(()));
}

#[test]
fn sender_as_trait_object() {
    let clock = ManualClock::default();
    let config =
        Config::new(Bandwidth::from_bytes_per_second(1_000_000)).unwrap();

    let mut sender: Box<dyn SendAlgorithm> =
        Box::new(FixRateSender::new(&config, &clock).unwrap());

    let now = clock.now();
    sender.on_packet_sent(now, 0, 1_000, false, true);
    assert_eq!(sender.time_until_send(now, false), Duration::from_millis(1));

    clock.advance(Duration::from_millis(1));
    assert_eq!(sender.time_until_send(clock.now(), false), Duration::ZERO);
}

#[test]
fn monotonic_clock_drives_a_sender() {
    let clock = MonotonicClock;
    let config =
        Config::new(Bandwidth::from_bytes_per_second(1_000_000)).unwrap();

    let sender = Sender::from_config(&config, &clock).unwrap();

    assert_eq!(sender.time_until_send(Instant::now(), false), Duration::ZERO);
}

#[rstest]
#[case::hundred_gbps(Bandwidth::from_mbits_per_second(100_000))]
#[case::infinite(Bandwidth::infinite())]
fn very_high_rates_do_not_overflow(#[case] bitrate: Bandwidth) {
    init();

    let mut config = Config::new(bitrate).unwrap();
    config.set_estimated_rtt(Duration::from_secs(60)).unwrap();

    let mut sender = TestSender::new(&config);
    assert!(sender.congestion_window() >= 1_200);

    for _ in 0..100 {
        let delay = sender.delay();
        assert!(delay < Duration::from_micros(1));

        sender.advance_time(delay);
        sender.send_packet(1_200);
    }

    assert_eq!(sender.bytes_in_flight(), 120_000);
    assert_eq!(sender.bandwidth_estimate(), bitrate);
}

#[test]
fn acked_bytes_leave_flight() {
    init();

    let mut sender = TestSender::with_rate(1_000_000);

    sender.send_packet(1_000);
    sender.advance_time(Duration::from_millis(5));
    sender.send_packet(1_000);
    assert_eq!(sender.bytes_in_flight(), 2_000);

    sender.advance_time(Duration::from_millis(100));
    sender.ack_n_packets(2);

    assert_eq!(sender.bytes_in_flight(), 0);

    let stats = sender.stats();
    assert_eq!(stats.sent_bytes, 2_000);
    assert_eq!(stats.acked_packets, 2);
    assert_eq!(stats.acked_bytes, 2_000);
}

#[test]
fn earlier_times_are_handled_conservatively() {
    init();

    let mut sender = TestSender::with_rate(1_000_000);
    let start = sender.time();

    sender.advance_time(Duration::from_secs(1));
    let later = sender.time();

    sender.send_packet(1_000);
    sender.send_packet(1_000);
    assert_eq!(sender.delay(), Duration::from_millis(2));

    // Asking about an earlier time never makes the wait shorter.
    let delay = sender.time_until_send(start, false);
    assert_eq!(delay, Duration::from_millis(1_002));

    // A send stamped before the previous ones is still accounted for.
    let pkt_num = sender.next_pkt;
    sender.on_packet_sent(start, pkt_num, 1_000, false, true);
    sender.next_pkt += 1;

    assert_eq!(sender.bytes_in_flight(), 3_000);
    assert_eq!(sender.delay(), Duration::from_millis(3));
    assert_eq!(
        sender.time_until_send(later + Duration::from_millis(1), false),
        Duration::from_millis(2)
    );
    assert_eq!(
        sender.time_until_send(later + Duration::from_millis(3), false),
        Duration::ZERO
    );
}

#[rstest]
fn sliding_window_rate_is_bounded(
    #[values(100_000, 1_000_000, 12_500_000)] bytes_per_second: u64,
    #[values(500, 1_200)] packet_size: usize,
    #[values(20, 250)] window_ms: u64,
) {
    init();

    let bitrate = Bandwidth::from_bytes_per_second(bytes_per_second);

    let mut config = Config::new(bitrate).unwrap();
    config.set_max_packet_size(packet_size).unwrap();

    let mut sender = TestSender::new(&config);

    let deadline = sender.time() + Duration::from_secs(1);
    sender.saturate_until(deadline, packet_size, Duration::from_millis(5));

    let window = Duration::from_millis(window_ms);
    let budget = bitrate.to_bytes_per_period(window) + packet_size as u64;

    let log = &sender.send_log;
    let mut end = 0;
    let mut in_window = 0;

    for (i, &(start, _)) in log.iter().enumerate() {
        if start + window > deadline {
            break;
        }

        while end < log.len() && log[end].0 < start + window {
            in_window += log[end].1 as u64;
            end += 1;
        }

        assert!(
            in_window <= budget,
            "{in_window} bytes in {window:?} from send {i}, budget {budget}"
        );

        in_window -= log[i].1 as u64;
    }
}
