use crate::config::ArqConfig;
use crate::harness::ReceiverHarness;
use crate::packet::{Packet, Payload};
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReceiveWindowStats {
    /// units accepted into the reorder buffer for the first time
    pub accepted: u64,
    /// in-window arrivals whose slot was already filled - retransmissions of units whose
    ///  ack got lost
    pub duplicates: u64,
    pub corrupted: u64,
    pub out_of_window: u64,
    pub delivered: u64,
}

/// The receiving endpoint: a reorder buffer of not-yet-delivered units plus the pump
///  that drains contiguous runs to the application in order.
///
/// Whatever the channel does within its contract - drop, corrupt, delay, reorder - the
///  application sink sees every payload exactly once, in submission order, with no gaps.
pub struct ReceiveWindow {
    config: Arc<ArqConfig>,
    /// lowest logical sequence number not yet delivered to the application,
    ///  monotonically non-decreasing
    base: u64,
    /// slot per window position; `Some` means received but not yet delivered
    slots: Vec<Option<Payload>>,
    stats: ReceiveWindowStats,
}

impl ReceiveWindow {
    pub fn new(config: Arc<ArqConfig>) -> ReceiveWindow {
        let slots = (0..config.window_size).map(|_| None).collect();
        ReceiveWindow {
            config,
            base: 0,
            slots,
            stats: ReceiveWindowStats::default(),
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn stats(&self) -> &ReceiveWindowStats {
        &self.stats
    }

    fn slot_index(&self, seq: u64) -> usize {
        (seq % self.config.window_size as u64) as usize
    }

    fn wire_seq(&self, seq: u64) -> i32 {
        (seq % self.config.seq_space as u64) as i32
    }

    /// maps a wire sequence number to its logical position in `[base, base + window_size)`,
    ///  if it has one - the sequence-space invariant guarantees the mapping is unambiguous
    fn window_position(&self, wire_seq: i32) -> Option<u64> {
        (self.base..self.base + self.config.window_size as u64)
            .find(|&seq| self.wire_seq(seq) == wire_seq)
    }

    /// the wire sequence number of the last unit delivered in order - what gets
    ///  re-acknowledged when an arrival cannot be accepted
    fn last_in_order_ack(&self) -> i32 {
        if self.base == 0 {
            (self.config.seq_space - 1) as i32
        } else {
            self.wire_seq(self.base - 1)
        }
    }

    /// Arrival of a unit from the channel. Acceptable units are buffered (idempotently)
    ///  and acknowledged by echoing their sequence number; corrupted or out-of-window
    ///  units are discarded and answered with an ack for the last in-order position,
    ///  which re-signals the sender's outstanding state without acknowledging anything
    ///  new. Either way, the drain pump then delivers the maximal contiguous prefix.
    pub fn on_packet(&mut self, packet: &Packet, harness: &mut impl ReceiverHarness) {
        let position = if packet.is_corrupted() {
            warn!("corrupted unit arrived - discarding");
            self.stats.corrupted += 1;
            None
        } else {
            let position = self.window_position(packet.seqnum);
            if position.is_none() {
                debug!(
                    "unit with wire seq {} is outside the receive window at base #{} - discarding",
                    packet.seqnum, self.base
                );
                self.stats.out_of_window += 1;
            }
            position
        };

        match position {
            Some(seq) => {
                let idx = self.slot_index(seq);
                if self.slots[idx].is_none() {
                    trace!("buffering unit #{} (wire seq {})", seq, packet.seqnum);
                    self.slots[idx] = Some(packet.payload);
                    self.stats.accepted += 1;
                } else {
                    trace!("duplicate of buffered unit #{} - re-acking only", seq);
                    self.stats.duplicates += 1;
                }
                harness.transmit(&Packet::ack(packet.seqnum));
            }
            None => {
                harness.transmit(&Packet::ack(self.last_in_order_ack()));
            }
        }

        self.drain(harness);
    }

    /// delivers buffered units to the application while the one at `base` is present
    fn drain(&mut self, harness: &mut impl ReceiverHarness) {
        loop {
            let idx = self.slot_index(self.base);
            let Some(payload) = self.slots[idx].take() else {
                break;
            };
            trace!("delivering unit #{} to the application", self.base);
            harness.deliver(&payload);
            self.stats.delivered += 1;
            self.base += 1;
        }
    }
}
