//! TCP [`PeerLink`] with one pooled connection per (peer, endpoint).

use super::client::RequestClient;
use super::directory::PeerDirectory;
use super::traits::{PeerEndpoint, PeerLink};
use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct TcpPeerLink {
    directory: Arc<PeerDirectory>,
    pool: DashMap<(String, PeerEndpoint), Arc<RequestClient>>,
}

impl TcpPeerLink {
    pub fn new(directory: Arc<PeerDirectory>) -> Self {
        Self {
            directory,
            pool: DashMap::new(),
        }
    }

    fn client(&self, peer: &str, endpoint: PeerEndpoint) -> Arc<RequestClient> {
        let addr = self.directory.address(peer, endpoint);
        let key = (peer.to_string(), endpoint);
        if let Some(client) = self.pool.get(&key)
            && client.addr() == addr
        {
            return Arc::clone(&client);
        }
        // New peer, or its address changed since the connection was pooled.
        let client = Arc::new(RequestClient::new(addr));
        self.pool.insert(key, Arc::clone(&client));
        client
    }
}

#[async_trait]
impl PeerLink for TcpPeerLink {
    async fn call(
        &self,
        peer: &str,
        endpoint: PeerEndpoint,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, TransportError> {
        let client = self.client(peer, endpoint);
        client.call(payload, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeerOverride;
    use crate::network::{Endpoint, EndpointKind};

    #[tokio::test]
    async fn calls_overridden_address() {
        let endpoint = Endpoint::bind(EndpointKind::Replication, "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = endpoint.local_addr().unwrap().to_string();
        let mut rx = endpoint.spawn(4);
        tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                req.respond(Some(Bytes::from_static(b"ack")));
            }
        });

        let directory = Arc::new(PeerDirectory::new(1, 1));
        directory.set_override(
            "server-b",
            PeerOverride {
                sync: addr.clone(),
                replication: addr,
            },
        );
        let link = TcpPeerLink::new(directory);
        for _ in 0..2 {
            let reply = link
                .call(
                    "server-b",
                    PeerEndpoint::Replication,
                    Bytes::from_static(b"x"),
                    Duration::from_secs(2),
                )
                .await
                .unwrap();
            assert_eq!(reply.as_ref(), b"ack");
        }
        assert_eq!(link.pool.len(), 1);
    }
}
