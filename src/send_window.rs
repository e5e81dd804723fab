use crate::config::ArqConfig;
use crate::harness::SenderHarness;
use crate::packet::{Message, Packet};
use std::sync::Arc;
use tracing::{debug, trace};

/// One slot of the send window: the buffered unit for retransmission plus its
///  bookkeeping flags. A populated slot is always a unit in `[base, next_seq)`.
struct SendSlot {
    packet: Packet,
    acked: bool,
    /// The endpoint's single pending alarm is accounted to the slots it covers. The
    ///  invariant is that an alarm is pending iff at least one in-flight slot carries
    ///  this flag - see [SendWindow::on_ack] for how the flags are kept consistent
    ///  when the alarm is cancelled.
    timer_armed: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SendWindowStats {
    pub accepted: u64,
    /// submissions dropped because the window was full - backpressure by dropping, the
    ///  caller gets no buffering guarantee
    pub window_full_drops: u64,
    pub acks_received: u64,
    pub duplicate_acks: u64,
    pub packets_resent: u64,
    pub timeouts: u64,
}

/// The sending endpoint's sliding-window state machine: which units are in flight, which
///  are acknowledged, and when to retransmit.
///
/// Sequence numbers are kept as unbounded logical counters internally and wrapped to the
///  configured modulus only where they cross the wire, so distinct in-flight units can
///  never alias inside this struct.
pub struct SendWindow {
    config: Arc<ArqConfig>,
    /// oldest unacknowledged logical sequence number, monotonically non-decreasing
    base: u64,
    /// next logical sequence number to assign; `next_seq - base <= window_size` always
    next_seq: u64,
    slots: Vec<Option<SendSlot>>,
    stats: SendWindowStats,
}

impl SendWindow {
    pub fn new(config: Arc<ArqConfig>) -> SendWindow {
        let slots = (0..config.window_size).map(|_| None).collect();
        SendWindow {
            config,
            base: 0,
            next_seq: 0,
            slots,
            stats: SendWindowStats::default(),
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// number of units submitted but not yet slid over by [Self::base]
    pub fn in_flight(&self) -> u64 {
        self.next_seq - self.base
    }

    pub fn stats(&self) -> &SendWindowStats {
        &self.stats
    }

    fn slot_index(&self, seq: u64) -> usize {
        (seq % self.config.window_size as u64) as usize
    }

    fn wire_seq(&self, seq: u64) -> i32 {
        (seq % self.config.seq_space as u64) as i32
    }

    fn timer_running(&self) -> bool {
        (self.base..self.next_seq).any(|seq| {
            self.slots[self.slot_index(seq)]
                .as_ref()
                .is_some_and(|slot| slot.timer_armed)
        })
    }

    /// Submission of an application message. If the window has room, the message becomes
    ///  the next in-flight unit and goes out on the channel immediately; if not, it is
    ///  dropped and counted, *not* queued.
    ///
    /// Returns whether the message was accepted.
    pub fn on_message(&mut self, message: Message, harness: &mut impl SenderHarness) -> bool {
        if self.in_flight() >= self.config.window_size as u64 {
            debug!(
                "send window [{}, {}) is full - dropping submission",
                self.base, self.next_seq
            );
            self.stats.window_full_drops += 1;
            return false;
        }

        let packet = Packet::data(self.wire_seq(self.next_seq), message.data);
        trace!(
            "sending unit #{} as wire seq {}",
            self.next_seq,
            packet.seqnum
        );
        harness.transmit(&packet);

        let timer_armed = !self.timer_running();
        if timer_armed {
            harness.start_timer(self.config.retransmit_timeout);
        }

        let idx = self.slot_index(self.next_seq);
        self.slots[idx] = Some(SendSlot {
            packet,
            acked: false,
            timer_armed,
        });
        self.next_seq += 1;
        self.stats.accepted += 1;
        true
    }

    /// Arrival of an acknowledgment unit from the channel. Corrupted acks are discarded
    ///  silently - indistinguishable from a lost ack, the timeout machinery recovers.
    ///
    /// A valid ack inside `[base, next_seq)` is recorded per unit; `base` only slides
    ///  over a contiguous acknowledged run, which is what makes this Selective Repeat
    ///  rather than Go-Back-N.
    pub fn on_ack(&mut self, packet: &Packet, harness: &mut impl SenderHarness) {
        if packet.is_corrupted() {
            debug!("corrupted ack - ignoring");
            return;
        }

        let acked_seq = match (self.base..self.next_seq).find(|&seq| self.wire_seq(seq) == packet.acknum) {
            Some(seq) => seq,
            None => {
                trace!(
                    "ack {} does not match any unit in [{}, {}) - ignoring",
                    packet.acknum, self.base, self.next_seq
                );
                return;
            }
        };

        let idx = self.slot_index(acked_seq);
        let slot = self.slots[idx]
            .as_mut()
            .expect("all units in [base, next_seq) have a populated slot");
        if slot.acked {
            trace!("duplicate ack for unit #{}", acked_seq);
            self.stats.duplicate_acks += 1;
            return;
        }

        slot.acked = true;
        let covered_by_alarm = slot.timer_armed;
        self.stats.acks_received += 1;

        if covered_by_alarm {
            // The alarm is a single shared resource: cancelling it leaves *no* slot with
            //  a live timer, so all flags are cleared and the alarm is rearmed below if
            //  units are still outstanding. This keeps the invariant that unacknowledged
            //  in-flight units always have a pending alarm.
            harness.stop_timer();
            self.clear_timer_flags();
        }

        // slide base over the maximal contiguous acknowledged run, freeing the slots
        while self.base < self.next_seq {
            let idx = self.slot_index(self.base);
            match &self.slots[idx] {
                Some(slot) if slot.acked => {
                    self.slots[idx] = None;
                    self.base += 1;
                }
                _ => break,
            }
        }
        debug!(
            "ack for unit #{} - send window is now [{}, {})",
            acked_seq, self.base, self.next_seq
        );

        if self.base < self.next_seq && !self.timer_running() {
            harness.start_timer(self.config.retransmit_timeout);
            let idx = self.slot_index(self.base);
            self.slots[idx]
                .as_mut()
                .expect("base slot is populated while base < next_seq")
                .timer_armed = true;
        }
    }

    /// Expiry of the endpoint's single alarm. The alarm approximates independent
    ///  per-unit timers, so expiry retransmits the *entire* unacknowledged subset of the
    ///  window and rearms one shared alarm covering all of it.
    pub fn on_timeout(&mut self, harness: &mut impl SenderHarness) {
        self.stats.timeouts += 1;
        debug!(
            "retransmission timeout - resending unacked units in [{}, {})",
            self.base, self.next_seq
        );

        let mut any_resent = false;
        for seq in self.base..self.next_seq {
            let idx = self.slot_index(seq);
            let slot = self.slots[idx]
                .as_mut()
                .expect("all units in [base, next_seq) have a populated slot");
            if slot.acked {
                continue;
            }
            trace!("retransmitting unit #{} as wire seq {}", seq, slot.packet.seqnum);
            harness.transmit(&slot.packet);
            slot.timer_armed = true;
            self.stats.packets_resent += 1;
            any_resent = true;
        }

        if any_resent {
            harness.start_timer(self.config.retransmit_timeout);
        }
    }

    fn clear_timer_flags(&mut self) {
        for seq in self.base..self.next_seq {
            let idx = self.slot_index(seq);
            if let Some(slot) = self.slots[idx].as_mut() {
                slot.timer_armed = false;
            }
        }
    }
}
