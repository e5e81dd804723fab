use crate::packet::{Packet, Payload};
#[cfg(test)] use mockall::automock;
use std::time::Duration;

/// The collaborators a sending endpoint requires from its environment: an unreliable
///  channel and a single-alarm timer. Introduced as a trait to facilitate mocking the
///  channel/clock side away for testing.
///
/// The timer is one pending alarm per endpoint, not a per-unit timer service. Starting
///  it while an alarm is already pending is not a defined input; stopping it while no
///  alarm is pending is an idempotent no-op.
#[cfg_attr(test, automock)]
pub trait SenderHarness {
    /// Hand a unit to the unreliable channel. Fire and forget, no delivery guarantee.
    fn transmit(&mut self, packet: &Packet);

    fn start_timer(&mut self, duration: Duration);

    fn stop_timer(&mut self);
}

/// The collaborators a receiving endpoint requires: the return channel for acks and the
///  application sink for reassembled in-order payloads.
#[cfg_attr(test, automock)]
pub trait ReceiverHarness {
    /// Hand a unit to the unreliable channel. Fire and forget, no delivery guarantee.
    fn transmit(&mut self, packet: &Packet);

    /// Hand a reconstructed in-order payload to the application. Called at most once per
    ///  logical sequence number, ever.
    fn deliver(&mut self, payload: &Payload);
}
