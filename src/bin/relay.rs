use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use zipkin_relay::Config;
use zipkin_relay::ElasticIndex;
use zipkin_relay::FileQueue;
use zipkin_relay::HttpCollector;
use zipkin_relay::RelayConsumer;
use zipkin_relay::Result;
use zipkin_relay::SpanIndex;


/// Drain queued span batches into the collector and the search index.
#[derive(Debug, Parser)]
#[command(name = "relay")]
struct Args {
    /// Directory holding the durable queue files.
    #[arg(long, default_value = "/var/lib/zipkin-relay")]
    queue_dir: String,

    /// Milliseconds to sleep between poll iterations.
    #[arg(long)]
    interval: Option<u64>,

    /// Poll iterations between buffer flushes.
    #[arg(long)]
    frequency: Option<u32>,
}


fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(interval) = args.interval {
        config.relay_interval_ms = interval;
    }
    if let Some(frequency) = args.frequency {
        config.relay_frequency = frequency;
    }

    if let Err(error) = run(&config, &args.queue_dir) {
        tracing::error!("relay failed to start: {}", error);
        exit(1);
    }
}

fn run(config: &Config, queue_dir: &str) -> Result<()> {
    let queue = Arc::new(FileQueue::new(queue_dir)?);
    let collector = Box::new(HttpCollector::new(config)?);
    let index: Option<Box<dyn SpanIndex>> = if config.index_url.is_empty() {
        None
    } else {
        Some(Box::new(ElasticIndex::new(config)?))
    };

    let mut relay = RelayConsumer::new(config, queue, collector, index)?;
    tracing::info!(
        queue = %config.queue_name,
        frequency = config.relay_frequency,
        interval_ms = config.relay_interval_ms,
        "relay consumer started"
    );
    relay.run();
    Ok(())
}
