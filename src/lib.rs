//! A Selective Repeat ARQ core: the sliding-window arbitration logic two endpoints need
//!  to turn a point-to-point channel that loses, corrupts, delays and reorders units
//!  into an exactly-once, in-order byte stream.
//!
//! ## Design goals
//!
//! * The core is the protocol state machine, nothing else: the channel, the clock and
//!   the application source/sink are collaborators behind the [harness] traits. This
//!   keeps the state machines synchronous, single-threaded and fully deterministic -
//!   the environment invokes the entry points one at a time, in simulated-time order,
//!   and every entry point runs to completion.
//! * Per-unit acknowledgment: only unacknowledged units are retransmitted, and an ack
//!   that arrives out of order is recorded rather than discarded. The sender's `base`
//!   slides only over contiguous acknowledged runs - the property that distinguishes
//!   Selective Repeat from Go-Back-N.
//! * Every anomaly degrades to "wait for a retransmission". Corruption, duplicates and
//!   out-of-window arrivals are counted and absorbed, never surfaced as hard failures;
//!   the per-slot acked/received flags make every handler idempotent, which is what
//!   makes resend-on-timeout a safe universal recovery strategy.
//! * Endpoints are plain values constructed from a shared [config::ArqConfig] - no
//!   global state, multiple sessions coexist freely.
//! * Simplex scope: one endpoint sends application data, the other only acknowledges.
//!   Congestion control, flow control beyond the fixed window, and cryptographic
//!   integrity are out of scope.
//!
//! ## Wire format
//!
//! All numbers big-endian, fixed width, 32 bytes per unit:
//!
//! ```ascii
//! 0:  seqnum   (i32) - wire sequence number in [0, seq_space), or -1 for pure acks
//! 4:  acknum   (i32) - acknowledged wire sequence number, or -1 for data units
//! 8:  checksum (i32) - seqnum + acknum + sum of unsigned payload bytes
//! 12: payload  (20 bytes, opaque)
//! ```
//!
//! Sequence numbers wrap at the configured modulus; the modulus must exceed the window
//!  size so a stale and a fresh unit can never be confused within one window span.
//!
//! ## The single-alarm approximation
//!
//! The environment offers one pending alarm per endpoint, not a per-unit timer service.
//!  Independent per-unit timeouts are approximated by retransmitting the entire
//!  unacknowledged subset on every expiry and rearming the one shared alarm. A
//!  production design would keep a priority queue of per-unit deadlines instead.

pub mod config;
pub mod harness;
pub mod packet;
pub mod receive_window;
pub mod send_window;
pub mod sim;
