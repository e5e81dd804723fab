//! A discrete-event harness standing in for the unreliable channel and the clock: it
//!  owns one sending and one receiving endpoint, a seeded random model of loss,
//!  corruption and delay, and the single pending alarm of the sending endpoint.
//!
//! Everything is deterministic per seed, so end-to-end tests can drive adversarial
//!  channel behavior and still assert exact outcomes.

use crate::config::ArqConfig;
use crate::harness::{ReceiverHarness, SenderHarness};
use crate::packet::{Message, Packet, Payload, PAYLOAD_LEN};
use crate::receive_window::{ReceiveWindow, ReceiveWindowStats};
use crate::send_window::{SendWindow, SendWindowStats};
use anyhow::bail;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Fault model of the simulated channel. Applied independently per transmitted unit,
///  in both directions.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// probability that a unit disappears in transit
    pub loss_rate: f64,
    /// probability that a single field of a unit is mutated in transit
    pub corruption_rate: f64,
    /// fixed transit time of a unit that makes it across
    pub transit_delay: f64,
    /// additional uniformly distributed delay, `[0, delay_jitter)` - this is what makes
    ///  units overtake each other
    pub delay_jitter: f64,
}

impl ChannelConfig {
    /// a channel that delivers everything, unmodified, in constant time
    pub fn reliable() -> ChannelConfig {
        ChannelConfig {
            loss_rate: 0.0,
            corruption_rate: 0.0,
            transit_delay: 1.0,
            delay_jitter: 0.0,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.loss_rate) {
            bail!("loss rate must be a probability, got {}", self.loss_rate);
        }
        if !(0.0..=1.0).contains(&self.corruption_rate) {
            bail!("corruption rate must be a probability, got {}", self.corruption_rate);
        }
        if !self.transit_delay.is_finite() || self.transit_delay < 0.0 {
            bail!("transit delay must be finite and non-negative");
        }
        if !self.delay_jitter.is_finite() || self.delay_jitter < 0.0 {
            bail!("delay jitter must be finite and non-negative");
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChannelStats {
    pub units_lost: u64,
    pub units_corrupted: u64,
}

#[derive(Debug)]
enum Event {
    /// the application submits a message at the sending endpoint
    Submit(Message),
    /// a data unit arrives at the receiving endpoint
    DataArrival(Packet),
    /// an ack unit arrives back at the sending endpoint
    AckArrival(Packet),
    /// the sending endpoint's alarm expires
    Alarm,
}

/// queue key: simulated time plus an insertion counter to break ties deterministically
type EventKey = (OrderedFloat<f64>, u64);

/// Action collectors: the endpoints emit into these during an entry point, the
///  simulation turns the emissions into future events afterwards.
#[derive(Default)]
struct SenderActions {
    transmitted: Vec<Packet>,
    timer_ops: Vec<TimerOp>,
}

enum TimerOp {
    Start(Duration),
    Stop,
}

impl SenderHarness for SenderActions {
    fn transmit(&mut self, packet: &Packet) {
        self.transmitted.push(*packet);
    }

    fn start_timer(&mut self, duration: Duration) {
        self.timer_ops.push(TimerOp::Start(duration));
    }

    fn stop_timer(&mut self) {
        self.timer_ops.push(TimerOp::Stop);
    }
}

#[derive(Default)]
struct ReceiverActions {
    transmitted: Vec<Packet>,
    delivered: Vec<Payload>,
}

impl ReceiverHarness for ReceiverActions {
    fn transmit(&mut self, packet: &Packet) {
        self.transmitted.push(*packet);
    }

    fn deliver(&mut self, payload: &Payload) {
        self.delivered.push(*payload);
    }
}

pub struct Simulation {
    config: Arc<ArqConfig>,
    channel: ChannelConfig,
    rng: StdRng,

    clock: f64,
    queue: BTreeMap<EventKey, Event>,
    next_event_id: u64,
    /// the sending endpoint's single pending alarm, if any
    alarm: Option<EventKey>,

    sender: SendWindow,
    receiver: ReceiveWindow,

    /// payloads accepted into the send window, in submission order
    accepted: Vec<Payload>,
    /// payloads handed to the application sink, in delivery order
    delivered: Vec<Payload>,
    channel_stats: ChannelStats,
}

impl Simulation {
    /// NB: both configs are expected to be validated by the caller
    pub fn new(config: Arc<ArqConfig>, channel: ChannelConfig, seed: u64) -> Simulation {
        Simulation {
            sender: SendWindow::new(config.clone()),
            receiver: ReceiveWindow::new(config.clone()),
            config,
            channel,
            rng: StdRng::seed_from_u64(seed),
            clock: 0.0,
            queue: BTreeMap::default(),
            next_event_id: 0,
            alarm: None,
            accepted: Vec::new(),
            delivered: Vec::new(),
            channel_stats: ChannelStats::default(),
        }
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn accepted(&self) -> &[Payload] {
        &self.accepted
    }

    pub fn delivered(&self) -> &[Payload] {
        &self.delivered
    }

    pub fn sender_stats(&self) -> &SendWindowStats {
        self.sender.stats()
    }

    pub fn receiver_stats(&self) -> &ReceiveWindowStats {
        self.receiver.stats()
    }

    pub fn channel_stats(&self) -> &ChannelStats {
        &self.channel_stats
    }

    /// schedules an application submission at the given simulated time
    pub fn submit_at(&mut self, time: f64, message: Message) {
        self.schedule(time, Event::Submit(message));
    }

    /// Processes events in simulated-time order until the queue drains. Bails if the
    ///  session has not settled within `max_events`, which in practice means the
    ///  protocol livelocked.
    ///
    /// Returns the number of events processed.
    pub fn run(&mut self, max_events: usize) -> anyhow::Result<usize> {
        let mut processed = 0;

        while let Some((key, event)) = self.queue.pop_first() {
            if processed >= max_events {
                bail!("simulation did not settle within {} events", max_events);
            }
            processed += 1;
            self.clock = key.0.into_inner();
            trace!("t={:.3}: {:?}", self.clock, event);

            match event {
                Event::Submit(message) => {
                    let mut actions = SenderActions::default();
                    if self.sender.on_message(message, &mut actions) {
                        self.accepted.push(message.data);
                    }
                    self.apply_sender_actions(actions);
                }
                Event::AckArrival(packet) => {
                    let mut actions = SenderActions::default();
                    self.sender.on_ack(&packet, &mut actions);
                    self.apply_sender_actions(actions);
                }
                Event::Alarm => {
                    self.alarm = None;
                    let mut actions = SenderActions::default();
                    self.sender.on_timeout(&mut actions);
                    self.apply_sender_actions(actions);
                }
                Event::DataArrival(packet) => {
                    let mut actions = ReceiverActions::default();
                    self.receiver.on_packet(&packet, &mut actions);
                    for packet in actions.transmitted {
                        self.transmit_through_channel(packet, false);
                    }
                    self.delivered.extend(actions.delivered);
                }
            }

            assert!(
                self.sender.in_flight() <= self.config.window_size as u64,
                "send window over-committed: {} units in flight",
                self.sender.in_flight()
            );
        }

        debug!(
            "simulation settled after {} events at t={:.3}",
            processed, self.clock
        );
        Ok(processed)
    }

    fn schedule(&mut self, at: f64, event: Event) -> EventKey {
        let key = (OrderedFloat(at), self.next_event_id);
        self.next_event_id += 1;
        self.queue.insert(key, event);
        key
    }

    fn apply_sender_actions(&mut self, actions: SenderActions) {
        for packet in actions.transmitted {
            self.transmit_through_channel(packet, true);
        }
        for op in actions.timer_ops {
            match op {
                TimerOp::Start(duration) => {
                    if let Some(key) = self.alarm.take() {
                        warn!("alarm started while one is already pending - replacing it");
                        self.queue.remove(&key);
                    }
                    let key = self.schedule(self.clock + duration.as_secs_f64(), Event::Alarm);
                    self.alarm = Some(key);
                }
                TimerOp::Stop => {
                    // idempotent: stopping with no alarm pending is a no-op
                    if let Some(key) = self.alarm.take() {
                        self.queue.remove(&key);
                    }
                }
            }
        }
    }

    fn transmit_through_channel(&mut self, mut packet: Packet, toward_receiver: bool) {
        if self.channel.loss_rate > 0.0 && self.rng.gen_bool(self.channel.loss_rate) {
            trace!("channel drops unit (seq {}, ack {})", packet.seqnum, packet.acknum);
            self.channel_stats.units_lost += 1;
            return;
        }

        if self.channel.corruption_rate > 0.0 && self.rng.gen_bool(self.channel.corruption_rate) {
            self.mutate_in_transit(&mut packet);
            self.channel_stats.units_corrupted += 1;
        }

        let jitter = if self.channel.delay_jitter > 0.0 {
            self.rng.gen_range(0.0..self.channel.delay_jitter)
        } else {
            0.0
        };
        let at = self.clock + self.channel.transit_delay + jitter;

        if toward_receiver {
            self.schedule(at, Event::DataArrival(packet));
        } else {
            self.schedule(at, Event::AckArrival(packet));
        }
    }

    /// mutates a single field, leaving the checksum stale
    fn mutate_in_transit(&mut self, packet: &mut Packet) {
        match self.rng.gen_range(0..3) {
            0 => packet.seqnum = packet.seqnum.wrapping_add(1),
            1 => packet.acknum = packet.acknum.wrapping_add(1),
            _ => {
                let idx = self.rng.gen_range(0..PAYLOAD_LEN);
                packet.payload[idx] = packet.payload[idx].wrapping_add(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn tagged_payload(tag: u8) -> Payload {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[0] = tag;
        payload
    }

    fn submit_spaced(sim: &mut Simulation, count: u8, spacing: f64) {
        for tag in 0..count {
            sim.submit_at(spacing * tag as f64, Message::new(tagged_payload(tag)));
        }
    }

    #[rstest]
    fn test_clean_channel_delivers_without_any_retransmission() {
        let config = Arc::new(ArqConfig::default_classroom());
        let mut sim = Simulation::new(config, ChannelConfig::reliable(), 0);
        submit_spaced(&mut sim, 20, 1.0);

        sim.run(10_000).unwrap();

        let expected: Vec<_> = (0..20).map(tagged_payload).collect();
        assert_eq!(sim.delivered(), expected.as_slice());
        assert_eq!(sim.sender_stats().accepted, 20);
        assert_eq!(sim.sender_stats().window_full_drops, 0);
        // every ack outruns the alarm, so the alarm never fires
        assert_eq!(sim.sender_stats().timeouts, 0);
        assert_eq!(sim.sender_stats().packets_resent, 0);
        assert_eq!(sim.receiver_stats().duplicates, 0);
    }

    #[rstest]
    #[case::seed_1(1)]
    #[case::seed_2(2)]
    #[case::seed_3(3)]
    fn test_reordering_channel_still_delivers_in_order(#[case] seed: u64) {
        let config = Arc::new(ArqConfig::default_classroom());
        let channel = ChannelConfig {
            loss_rate: 0.0,
            corruption_rate: 0.0,
            transit_delay: 1.0,
            delay_jitter: 10.0,
        };
        let mut sim = Simulation::new(config, channel, seed);
        submit_spaced(&mut sim, 20, 2.0);

        sim.run(100_000).unwrap();

        assert_eq!(sim.delivered(), sim.accepted());
        assert_eq!(sim.receiver_stats().delivered, sim.sender_stats().accepted);
    }

    #[rstest]
    #[case::seed_1(1)]
    #[case::seed_2(2)]
    #[case::seed_3(3)]
    #[case::seed_4(4)]
    #[case::seed_5(5)]
    fn test_adversarial_channel_delivers_exactly_once_in_order(#[case] seed: u64) {
        let config = Arc::new(ArqConfig::default_classroom());
        let channel = ChannelConfig {
            loss_rate: 0.25,
            corruption_rate: 0.15,
            transit_delay: 1.0,
            delay_jitter: 4.0,
        };
        let mut sim = Simulation::new(config.clone(), channel, seed);
        // spaced wider than the retransmission timeout so backpressure drops stay rare
        submit_spaced(&mut sim, 20, 20.0);

        sim.run(200_000).unwrap();

        // exactly once, in order: the sink saw precisely what the send window accepted
        assert_eq!(sim.delivered(), sim.accepted());
        assert_eq!(
            sim.accepted().len() as u64 + sim.sender_stats().window_full_drops,
            20
        );
        // the fault model actually did something in these runs
        assert!(sim.channel_stats().units_lost + sim.channel_stats().units_corrupted > 0);
        assert!(sim.sender_stats().packets_resent > 0);
    }

    #[rstest]
    fn test_stopping_an_inactive_alarm_is_a_no_op() {
        let config = Arc::new(ArqConfig::default_classroom());
        let mut sim = Simulation::new(config, ChannelConfig::reliable(), 0);

        sim.apply_sender_actions(SenderActions {
            transmitted: Vec::new(),
            timer_ops: vec![TimerOp::Stop],
        });
        assert!(sim.alarm.is_none());
        assert!(sim.queue.is_empty());
    }

    #[rstest]
    #[case::negative_loss(-0.1, 0.0, 1.0, 0.0)]
    #[case::loss_above_one(1.1, 0.0, 1.0, 0.0)]
    #[case::corruption_above_one(0.0, 2.0, 1.0, 0.0)]
    #[case::negative_delay(0.0, 0.0, -1.0, 0.0)]
    #[case::infinite_jitter(0.0, 0.0, 1.0, f64::INFINITY)]
    fn test_channel_config_validation_rejects(
        #[case] loss_rate: f64,
        #[case] corruption_rate: f64,
        #[case] transit_delay: f64,
        #[case] delay_jitter: f64,
    ) {
        let channel = ChannelConfig {
            loss_rate,
            corruption_rate,
            transit_delay,
            delay_jitter,
        };
        assert!(channel.validate().is_err());
    }

    #[rstest]
    fn test_channel_config_validation_accepts_reliable() {
        assert!(ChannelConfig::reliable().validate().is_ok());
    }
}
