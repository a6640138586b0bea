use anyhow::Context;
use gateway_core::config_registry::ConfigRegistry;
use gateway_core::{Gateway, GatewaySettings, Metrics};
use tracing::info;

mod handlers;
mod server;
mod sse;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gateway_core::telemetry::init();

    let settings = GatewaySettings::from_env();
    let config_paths = config_paths_from_env()?;
    let registry = ConfigRegistry::load(config_paths).context("loading gateway configuration")?;
    let metrics = Metrics::default()
        .register(prometheus::default_registry())
        .context("registering metrics")?;

    let gateway = Gateway::new(registry, settings.clone(), metrics);
    info!(targets = gateway.config_registry.all_targets().len(), "gateway starting");

    server::start_server(gateway, settings.listen_addr.clone()).await
}

/// Configuration files come from `GATEWAY_CONFIG_PATHS`, a comma-separated
/// list; at least one path is required to start (§1.3, §6 "Exit codes").
fn config_paths_from_env() -> anyhow::Result<Vec<std::path::PathBuf>> {
    let raw = std::env::var("GATEWAY_CONFIG_PATHS")
        .context("GATEWAY_CONFIG_PATHS must list at least one configuration file")?;
    let paths: Vec<std::path::PathBuf> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(std::path::PathBuf::from)
        .collect();
    if paths.is_empty() {
        anyhow::bail!("GATEWAY_CONFIG_PATHS was set but contained no paths");
    }
    Ok(paths)
}
