use anyhow::bail;
use std::time::Duration;

/// Session-level protocol constants, negotiated at configuration time and never
///  renegotiated at runtime. Both endpoints of a session must share one instance.
#[derive(Debug)]
pub struct ArqConfig {
    /// Maximum number of outstanding unacknowledged units at the sender, and the number
    ///  of units the receiver is prepared to buffer ahead of the next in-order one.
    ///
    /// This is also the slot count of both endpoints' buffers: slots are addressed by
    ///  `logical sequence number % window_size`, which keeps addressing and buffering
    ///  aligned regardless of the sequence modulus.
    pub window_size: u32,

    /// The modulus that wire sequence numbers wrap around.
    ///
    /// This must be at least `window_size + 1`: with fewer distinct values, a stale
    ///  retransmission and a fresh unit become indistinguishable under the modulus. That
    ///  makes the bound a correctness precondition, not a tuning knob, and [Self::validate]
    ///  rejects configurations that violate it.
    pub seq_space: u32,

    /// Duration of the single retransmission alarm per endpoint.
    pub retransmit_timeout: Duration,
}

impl ArqConfig {
    /// The classic classroom parameterization: window of 6, sequence space of 7, and a
    ///  timeout well above one round trip.
    pub fn default_classroom() -> ArqConfig {
        ArqConfig {
            window_size: 6,
            seq_space: 7,
            retransmit_timeout: Duration::from_secs(16),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window_size == 0 {
            bail!("window size must be at least 1");
        }
        if self.seq_space < self.window_size + 1 {
            bail!(
                "sequence space {} is too small for window size {}: sequence numbers of in-flight units would alias",
                self.seq_space,
                self.window_size
            );
        }
        if self.retransmit_timeout.is_zero() {
            bail!("retransmission timeout must be non-zero");
        }
        Ok(())
    }
}
