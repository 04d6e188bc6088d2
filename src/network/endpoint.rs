//! Inbound request/reply endpoints.
//!
//! An [`Endpoint`] accepts TCP connections and spawns one task per
//! connection. Each task reads length-delimited frames, hands them to the
//! owner through a bounded channel as [`Inbound`] requests, and writes back
//! whatever reply the owner produces. Requests on one connection strictly
//! alternate with replies.

use board_proto::frame_codec;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::fmt;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

/// Role of an endpoint, used for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Client,
    Sync,
    Replication,
    Authority,
}

impl EndpointKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Sync => "sync",
            Self::Replication => "replication",
            Self::Authority => "authority",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request waiting for its reply.
#[derive(Debug)]
pub struct Inbound {
    pub payload: Bytes,
    reply: oneshot::Sender<Option<Bytes>>,
}

impl Inbound {
    pub fn new(payload: Bytes) -> (Self, oneshot::Receiver<Option<Bytes>>) {
        let (reply, rx) = oneshot::channel();
        (Self { payload, reply }, rx)
    }

    /// Send the reply. `None` leaves the request unanswered.
    pub fn respond(self, reply: Option<Bytes>) {
        // The connection may already be gone.
        let _ = self.reply.send(reply);
    }
}

/// A bound request/reply listener.
pub struct Endpoint {
    kind: EndpointKind,
    listener: TcpListener,
}

impl Endpoint {
    pub async fn bind(kind: EndpointKind, addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(endpoint = %kind, addr = %listener.local_addr()?, "Endpoint bound");
        Ok(Self { kind, listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Start accepting; requests arrive on the returned channel.
    pub fn spawn(self, capacity: usize) -> mpsc::Receiver<Inbound> {
        let (tx, rx) = mpsc::channel(capacity);
        tokio::spawn(self.accept_loop(tx));
        rx
    }

    async fn accept_loop(self, tx: mpsc::Sender<Inbound>) {
        let kind = self.kind;
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(endpoint = %kind, %addr, "Connection accepted");
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, tx).await {
                            warn!(endpoint = %kind, %addr, error = %e, "Connection error");
                        }
                        debug!(endpoint = %kind, %addr, "Connection closed");
                    });
                }
                Err(e) => {
                    error!(endpoint = %kind, error = %e, "Failed to accept connection");
                }
            }
            if tx.is_closed() {
                break;
            }
        }
    }
}

async fn serve_connection(stream: TcpStream, tx: mpsc::Sender<Inbound>) -> std::io::Result<()> {
    stream.set_nodelay(true)?;
    let mut framed = Framed::new(stream, frame_codec());

    while let Some(frame) = framed.next().await {
        let (inbound, reply_rx) = Inbound::new(frame?.freeze());
        if tx.send(inbound).await.is_err() {
            // Owner stopped.
            return Ok(());
        }
        match reply_rx.await {
            Ok(Some(reply)) => framed.send(reply).await?,
            Ok(None) | Err(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replies_follow_requests() {
        let endpoint = Endpoint::bind(EndpointKind::Client, "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = endpoint.local_addr().unwrap();
        let mut rx = endpoint.spawn(8);

        tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                if req.payload.as_ref() == b"drop" {
                    req.respond(None);
                } else {
                    let mut echo = b"re:".to_vec();
                    echo.extend_from_slice(&req.payload);
                    req.respond(Some(Bytes::from(echo)));
                }
            }
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = Framed::new(stream, frame_codec());

        client.send(Bytes::from_static(b"one")).await.unwrap();
        let reply = client.next().await.unwrap().unwrap();
        assert_eq!(reply.as_ref(), b"re:one");

        // An unanswered request keeps the connection usable.
        client.send(Bytes::from_static(b"drop")).await.unwrap();
        client.send(Bytes::from_static(b"two")).await.unwrap();
        let reply = client.next().await.unwrap().unwrap();
        assert_eq!(reply.as_ref(), b"re:two");
    }
}
