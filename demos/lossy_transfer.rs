use srarq::config::ArqConfig;
use srarq::packet::{Message, PAYLOAD_LEN};
use srarq::sim::{ChannelConfig, Simulation};
use std::sync::Arc;
use tracing::{info, Level};

fn init_logging() {
    tracing_subscriber::fmt()
        // .with_max_level(Level::TRACE)
        .with_max_level(Level::DEBUG)
        .try_init()
        .ok();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Arc::new(ArqConfig::default_classroom());
    config.validate()?;

    let channel = ChannelConfig {
        loss_rate: 0.2,
        corruption_rate: 0.1,
        transit_delay: 1.0,
        delay_jitter: 6.0,
    };
    channel.validate()?;

    let mut sim = Simulation::new(config, channel, 42);

    for tag in 0..20u8 {
        let mut data = [0u8; PAYLOAD_LEN];
        data[0] = tag;
        sim.submit_at(20.0 * tag as f64, Message::new(data));
    }

    let events = sim.run(100_000)?;

    info!(
        "session settled after {} events at t={:.1}",
        events,
        sim.clock()
    );
    info!("sender:   {:?}", sim.sender_stats());
    info!("receiver: {:?}", sim.receiver_stats());
    info!("channel:  {:?}", sim.channel_stats());
    info!(
        "{} of {} accepted payloads delivered in order",
        sim.delivered().len(),
        sim.accepted().len()
    );

    Ok(())
}
