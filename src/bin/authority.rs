//! board-authority - membership and rank authority.

use boardd::authority::{AuthorityService, MembershipRegistry};
use boardd::config::{AuthorityConfig, AuthorityFile};
use boardd::network::{Endpoint, EndpointKind};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    boardd::init_tracing();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "authority.toml".to_string());

    // The authority runs fine on defaults.
    let config = if Path::new(&config_path).exists() {
        AuthorityFile::load(&config_path)
            .map_err(|e| {
                error!(path = %config_path, error = %e, "Failed to load config");
                e
            })?
            .authority
    } else {
        info!(path = %config_path, "No config file, using defaults");
        AuthorityConfig::default()
    };

    info!(
        listen = %config.listen,
        heartbeat_timeout = ?config.heartbeat_timeout(),
        base_rank = config.base_rank,
        "Starting board-authority"
    );

    boardd::http::spawn_metrics(config.metrics_port);

    let registry = Arc::new(MembershipRegistry::new(
        config.base_rank,
        config.heartbeat_timeout(),
    ));
    let service = AuthorityService::new(registry);
    service.spawn_pruner(config.prune_interval());

    let endpoint = Endpoint::bind(EndpointKind::Authority, config.listen).await?;
    service.run(endpoint).await;

    Ok(())
}
