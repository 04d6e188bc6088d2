//! Test request/reply client.

use board_proto::{Reply, Request, WireFormat, frame_codec};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// One framed connection to a request/reply endpoint.
pub struct TestClient {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, frame_codec()),
        })
    }

    /// Send one raw frame.
    pub async fn send_raw(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        self.framed.send(Bytes::copy_from_slice(payload)).await?;
        Ok(())
    }

    /// Receive one raw frame, waiting at most `dur`.
    pub async fn recv_raw_timeout(&mut self, dur: Duration) -> anyhow::Result<Bytes> {
        match timeout(dur, self.framed.next()).await? {
            Some(frame) => Ok(frame?.freeze()),
            None => anyhow::bail!("connection closed"),
        }
    }

    /// Send `request` in `format` and decode the reply in the same format.
    pub async fn call(&mut self, format: WireFormat, request: &Request) -> anyhow::Result<Reply> {
        self.send_raw(&format.encode(request)?).await?;
        let raw = self.recv_raw_timeout(Duration::from_secs(5)).await?;
        Ok(format.decode(&raw)?)
    }
}
