use std::env;
use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};

use failover_pool::prelude::*;
use failover_pool::utils::tracing::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let settings = Settings::new().wrap_err("Failed to load settings")?;
    init_tracing(settings.log_format)?;

    let registry = Arc::new(EndpointRegistry::from_servers(&settings.servers));
    let connector = TcpConnector::new(settings.connect_timeout).with_nodelay(settings.nodelay);
    let selector = FailoverSelector::new(registry, connector, MemoryFailureStore::new())
        .with_options(settings.options.clone());

    let Some(probe_interval) = settings.probe_interval else {
        let stream = selector.connect().await?;
        info!("Connected to {}", stream.peer_addr()?);
        return Ok(());
    };

    // Only an explicit config file can be watched.
    let mut reloads = match env::var("FAILOVER_CONFIG") {
        Ok(path) => Some(Settings::watch_config(path)?),
        Err(_) => None,
    };

    let mut ticker = tokio::time::interval(probe_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => probe(&selector).await,
            Some(new_settings) = next_reload(&mut reloads) => {
                info!("Reloaded selector options: {:?}", new_settings.options);
                selector.apply(new_settings.options);
            }
        }
    }
}

async fn probe<S: FailureStore>(selector: &FailoverSelector<TcpConnector, S>) {
    match selector.connect().await {
        Ok(stream) => match stream.peer_addr() {
            Ok(peer) => info!("Probe connected to {}", peer),
            Err(e) => error!("Probe connected but lost the peer: {}", e),
        },
        Err(e) => error!("Probe failed: {}", e),
    }
}

async fn next_reload<W>(
    reloads: &mut Option<(W, UnboundedReceiver<Settings>)>,
) -> Option<Settings> {
    match reloads {
        Some((_, rx)) => rx.recv().await,
        None => std::future::pending().await,
    }
}
