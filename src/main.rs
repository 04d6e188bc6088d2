//! boardd - bulletin-board server node.

use boardd::config::Config;
use boardd::{Node, NodeServer};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    boardd::init_tracing();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "boardd.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    let node = Node::from_config(&config).await?;
    info!(
        node = %node.name(),
        authority = %config.authority.address,
        data_dir = %config.node.data_dir.display(),
        "Starting boardd"
    );

    // metrics_port = 0 disables the HTTP endpoint.
    boardd::http::spawn_metrics(config.node.metrics_port);

    let server = NodeServer::bind(node, &config.listen).await?;
    server.start_background();
    server.run().await;

    Ok(())
}
