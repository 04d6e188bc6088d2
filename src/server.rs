//! Server node runtime: the three inbound endpoints and the background tasks.

use crate::config::ListenConfig;
use crate::handlers::Dispatcher;
use crate::handlers::peer::{handle_replication, handle_sync};
use crate::network::{Endpoint, EndpointKind, Inbound};
use crate::state::Node;
use crate::sync::{berkeley, election, heartbeat};
use crate::telemetry::spans;
use board_proto::ProtocolError;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, info, warn};

const INBOUND_CAPACITY: usize = 256;

/// A server node with its endpoints bound.
pub struct NodeServer {
    node: Arc<Node>,
    client: Endpoint,
    sync: Endpoint,
    replication: Endpoint,
}

impl NodeServer {
    pub async fn bind(node: Arc<Node>, listen: &ListenConfig) -> std::io::Result<Self> {
        Ok(Self {
            client: Endpoint::bind(EndpointKind::Client, listen.client).await?,
            sync: Endpoint::bind(EndpointKind::Sync, listen.sync).await?,
            replication: Endpoint::bind(EndpointKind::Replication, listen.replication).await?,
            node,
        })
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Bound addresses as `(client, sync, replication)`.
    pub fn local_addrs(&self) -> std::io::Result<(SocketAddr, SocketAddr, SocketAddr)> {
        Ok((
            self.client.local_addr()?,
            self.sync.local_addr()?,
            self.replication.local_addr()?,
        ))
    }

    /// Start the store reload task, then, after the startup delay, register
    /// with the authority and start heartbeat, clock sync and the election
    /// monitor.
    pub fn start_background(&self) {
        let node = Arc::clone(&self.node);
        Arc::clone(node.store()).spawn_reload(node.timing().reload_interval());

        let span = spans::node(node.name());
        tokio::spawn(
            async move {
                tokio::time::sleep(node.timing().startup_delay()).await;
                heartbeat::register(&node).await;

                tokio::spawn(election::monitor(Arc::clone(&node)).in_current_span());
                tokio::spawn(heartbeat::run(Arc::clone(&node)).in_current_span());
                tokio::spawn(berkeley::run(node).in_current_span());
            }
            .instrument(span),
        );
    }

    /// Serve all three endpoints until every listener is gone.
    pub async fn run(self) {
        let node = self.node;
        let dispatcher = Dispatcher::new(Arc::clone(&node));
        let mut client = self.client.spawn(INBOUND_CAPACITY);
        let mut sync = self.sync.spawn(INBOUND_CAPACITY);
        let mut replication = self.replication.spawn(INBOUND_CAPACITY);
        info!(node = %node.name(), "Serving requests");

        loop {
            tokio::select! {
                Some(request) = client.recv() => {
                    let result = dispatcher.handle(&request.payload).await;
                    respond(EndpointKind::Client, request, result).await;
                }
                Some(request) = sync.recv() => {
                    let result = handle_sync(&node, &request.payload).await;
                    respond(EndpointKind::Sync, request, result).await;
                }
                Some(request) = replication.recv() => {
                    let result = handle_replication(&node, &request.payload).await;
                    respond(EndpointKind::Replication, request, result).await;
                }
                else => break,
            }
        }
        info!("All endpoints closed");
    }
}

async fn respond(kind: EndpointKind, request: Inbound, result: Result<Option<Bytes>, ProtocolError>) {
    match result {
        Ok(reply) => request.respond(reply),
        Err(e) => {
            warn!(endpoint = %kind, error = %e, "Failed to build reply");
            tokio::time::sleep(Duration::from_millis(100)).await;
            request.respond(None);
        }
    }
}
