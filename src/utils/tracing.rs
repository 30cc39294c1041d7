use color_eyre::eyre::Result;
use serde::Deserialize;

use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    #[serde(rename = "pretty")]
    Pretty,
    #[serde(rename = "compact")]
    Compact,
}

pub fn init_tracing(format: LogFormat) -> Result<()> {
    // RUST_LOG wins; otherwise log this crate at info.
    let filter_layer: EnvFilter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("failover_pool=info"))?;

    let fmt_layer = match format {
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()?;

    Ok(())
}
