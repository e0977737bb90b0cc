//! `siteforge gateway` — start the HTTP/WebSocket gateway.

use anyhow::Context;
use siteforge_config::AppConfig;

pub async fn run(port: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("failed to load configuration")?;
    if let Some(port) = port {
        config.gateway.port = port;
    }

    tracing::debug!(?config, "Loaded configuration");

    siteforge_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))
        .context("gateway exited with an error")
}
