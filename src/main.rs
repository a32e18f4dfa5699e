//! LivePulse server - Binary Entry Point

use std::sync::Arc;

use tracing::info;

use live_pulse::logging::init_logging;
use live_pulse::server::serve;
use live_pulse::{Config, JsonlStore, LivePulse, LivePulseResult, StoreConfig, NAME, VERSION};

#[tokio::main]
async fn main() -> LivePulseResult<()> {
    init_logging();

    let config = Config::from_env();
    config.validate()?;
    info!(
        name = NAME,
        version = VERSION,
        port = config.server.port,
        workers = config.worker.count,
        queue_size = config.worker.event_queue_size,
        "starting"
    );

    let store = Arc::new(JsonlStore::open(StoreConfig::new(&config.storage.data_dir))?);
    let pipeline = LivePulse::build(&config, Some(store))?;

    serve(pipeline, &config).await
}
