//! Outbound request/reply client with a single pooled connection.

use crate::error::TransportError;
use board_proto::frame_codec;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::debug;

type Conn = Framed<TcpStream, LengthDelimitedCodec>;

/// Calls one remote endpoint, one request at a time.
///
/// The connection is opened lazily and dropped after any failure, so the
/// next call starts from a fresh socket.
pub struct RequestClient {
    addr: String,
    conn: Mutex<Option<Conn>>,
}

impl RequestClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            conn: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send `payload` and wait for one reply frame, all within `timeout`.
    ///
    /// The bound includes waiting behind other callers of this client.
    pub async fn call(&self, payload: Bytes, timeout: Duration) -> Result<Bytes, TransportError> {
        let attempt = async {
            let mut slot = self.conn.lock().await;
            // Taken while in flight: a dropped exchange leaves the slot empty.
            let mut conn = match slot.take() {
                Some(conn) => conn,
                None => connect(&self.addr).await?,
            };
            let reply = exchange(&mut conn, payload).await?;
            *slot = Some(conn);
            Ok::<_, TransportError>(reply)
        };
        let result = match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        };
        if let Err(e) = &result {
            debug!(addr = %self.addr, error = %e, "Discarding connection");
        }
        result
    }
}

async fn connect(addr: &str) -> Result<Conn, TransportError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| TransportError::Connect {
            addr: addr.to_string(),
            source,
        })?;
    stream.set_nodelay(true)?;
    Ok(Framed::new(stream, frame_codec()))
}

async fn exchange(conn: &mut Conn, payload: Bytes) -> Result<Bytes, TransportError> {
    conn.send(payload).await?;
    match conn.next().await {
        Some(Ok(frame)) => Ok(frame.freeze()),
        Some(Err(e)) => Err(e.into()),
        None => Err(TransportError::Closed),
    }
}
