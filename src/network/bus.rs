//! [`FanoutBus`] implementations.
//!
//! - [`LocalBus`]: in-process, over a broadcast channel.
//! - [`TcpBus`]: an external relay speaking [`BusFrame`]s inside
//!   length-delimited frames.

use super::traits::{BusSubscription, FanoutBus};
use crate::error::TransportError;
use async_trait::async_trait;
use board_proto::{BusFrame, Publication, frame_codec};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info, warn};

const SUBSCRIPTION_BUFFER: usize = 256;
const PUBLISH_QUEUE: usize = 256;

// ============================================================================
// LocalBus
// ============================================================================

/// In-process bus. Clones share the same topic space.
#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<Publication>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl FanoutBus for LocalBus {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        // No subscribers is not an error.
        let _ = self.tx.send(Publication::new(topic, payload));
        Ok(())
    }

    async fn subscribe(&self, topics: &[&str]) -> Result<BusSubscription, TransportError> {
        let topics: HashSet<String> = topics.iter().map(|t| t.to_string()).collect();
        let mut source = self.tx.subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(publication) => {
                        if topics.contains(&publication.topic) && tx.send(publication).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Bus subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(BusSubscription::new(rx))
    }
}

// ============================================================================
// TcpBus
// ============================================================================

type Conn = Framed<TcpStream, LengthDelimitedCodec>;

/// Client of an external relay with separate publish and subscribe addresses.
///
/// Publishing never waits on the relay: frames go to a bounded queue that a
/// background task drains, and frames that do not fit are dropped.
pub struct TcpBus {
    publish_addr: String,
    subscribe_addr: String,
    queue: OnceLock<mpsc::Sender<Bytes>>,
    send_timeout: Duration,
    reconnect_delay: Duration,
}

impl TcpBus {
    pub fn new(publish_addr: impl Into<String>, subscribe_addr: impl Into<String>) -> Self {
        Self {
            publish_addr: publish_addr.into(),
            subscribe_addr: subscribe_addr.into(),
            queue: OnceLock::new(),
            send_timeout: Duration::from_secs(2),
            reconnect_delay: Duration::from_secs(1),
        }
    }

    /// Bound on connecting to the relay and writing one frame.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
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

    async fn open_subscription(addr: &str, topics: &[String]) -> Result<Conn, TransportError> {
        let mut conn = Self::connect(addr).await?;
        for topic in topics {
            conn.send(BusFrame::Subscribe(topic.clone()).to_bytes()?)
                .await?;
        }
        Ok(conn)
    }

    /// Queue feeding the publisher task, started on first use.
    fn queue(&self) -> &mpsc::Sender<Bytes> {
        self.queue.get_or_init(|| {
            let (tx, rx) = mpsc::channel(PUBLISH_QUEUE);
            tokio::spawn(drain_publications(
                self.publish_addr.clone(),
                rx,
                self.send_timeout,
            ));
            tx
        })
    }
}

async fn deliver(addr: &str, slot: &mut Option<Conn>, frame: Bytes) -> Result<(), TransportError> {
    if slot.is_none() {
        *slot = Some(TcpBus::connect(addr).await?);
    }
    let conn = slot.as_mut().ok_or(TransportError::Closed)?;
    conn.send(frame).await?;
    Ok(())
}

/// Write queued frames to the relay, one at a time, each within `timeout`.
async fn drain_publications(addr: String, mut queue: mpsc::Receiver<Bytes>, timeout: Duration) {
    let mut slot: Option<Conn> = None;
    while let Some(frame) = queue.recv().await {
        let result = match tokio::time::timeout(timeout, deliver(&addr, &mut slot, frame)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        };
        if let Err(e) = result {
            warn!(%addr, error = %e, "Bus publish failed, dropping connection");
            slot = None;
        }
    }
}

#[async_trait]
impl FanoutBus for TcpBus {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        let frame = BusFrame::Publish(Publication::new(topic, payload)).to_bytes()?;
        match self.queue().try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(topic, "Bus publish queue full, dropping publication");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TransportError::Closed),
        }
    }

    async fn subscribe(&self, topics: &[&str]) -> Result<BusSubscription, TransportError> {
        let topics: Vec<String> = topics.iter().map(|t| t.to_string()).collect();
        let addr = self.subscribe_addr.clone();
        let delay = self.reconnect_delay;
        // First connection is synchronous so the caller sees a bad address.
        let mut conn = Self::open_subscription(&addr, &topics).await?;
        info!(%addr, ?topics, "Subscribed to bus");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(async move {
            loop {
                while let Some(frame) = conn.next().await {
                    let publication = match frame
                        .map_err(TransportError::from)
                        .and_then(|f| BusFrame::decode(f.freeze()).map_err(Into::into))
                    {
                        Ok(BusFrame::Publish(publication)) => publication,
                        Ok(other) => {
                            debug!(?other, "Ignoring non-publication bus frame");
                            continue;
                        }
                        Err(e) => {
                            warn!(error = %e, "Bus stream error");
                            break;
                        }
                    };
                    if tx.send(publication).await.is_err() {
                        return;
                    }
                }

                // Relay went away: resubscribe until it is back.
                loop {
                    if tx.is_closed() {
                        return;
                    }
                    tokio::time::sleep(delay).await;
                    match Self::open_subscription(&addr, &topics).await {
                        Ok(fresh) => {
                            info!(%addr, "Resubscribed to bus");
                            conn = fresh;
                            break;
                        }
                        Err(e) => debug!(%addr, error = %e, "Bus reconnect failed"),
                    }
                }
            }
        });

        Ok(BusSubscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn local_bus_delivers_exact_topics() {
        let bus = LocalBus::default();
        let mut sub = bus.subscribe(&["geral"]).await.unwrap();

        bus.publish("geral2", Bytes::from_static(b"no")).await.unwrap();
        bus.publish("geral", Bytes::from_static(b"yes")).await.unwrap();

        let got = sub.recv().await.unwrap();
        assert_eq!(got.topic, "geral");
        assert_eq!(got.payload.as_ref(), b"yes");
    }

    #[tokio::test]
    async fn local_bus_publish_without_subscribers() {
        let bus = LocalBus::new(4);
        assert!(bus.publish("servers", Bytes::new()).await.is_ok());
    }

    #[tokio::test]
    async fn tcp_bus_speaks_relay_frames() {
        let relay = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = relay.local_addr().unwrap().to_string();
        let bus = TcpBus::new(addr.clone(), addr);

        // Subscriber side of the relay: expect a subscribe, push one publication.
        let relay_task = tokio::spawn(async move {
            let (stream, _) = relay.accept().await.unwrap();
            let mut conn = Framed::new(stream, frame_codec());
            let first = conn.next().await.unwrap().unwrap();
            assert_eq!(
                BusFrame::decode(first.freeze()).unwrap(),
                BusFrame::Subscribe("servers".into())
            );
            let frame = BusFrame::Publish(Publication::new("servers", &b"hello"[..]));
            conn.send(frame.to_bytes().unwrap()).await.unwrap();

            // Publisher side.
            let (stream, _) = relay.accept().await.unwrap();
            let mut conn = Framed::new(stream, frame_codec());
            let published = conn.next().await.unwrap().unwrap();
            BusFrame::decode(published.freeze()).unwrap()
        });

        let mut sub = bus.subscribe(&["servers"]).await.unwrap();
        let got = sub.recv().await.unwrap();
        assert_eq!(got.payload.as_ref(), b"hello");

        bus.publish("geral", Bytes::from_static(b"hi")).await.unwrap();
        let published = relay_task.await.unwrap();
        assert_eq!(
            published,
            BusFrame::Publish(Publication::new("geral", &b"hi"[..]))
        );
    }

    #[tokio::test]
    async fn stalled_relay_does_not_block_publishers() {
        let relay = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = relay.local_addr().unwrap().to_string();
        let bus = TcpBus::new(addr.clone(), addr).with_send_timeout(Duration::from_millis(200));

        let payload = Bytes::from(vec![0u8; 1024 * 1024]);
        let published = tokio::time::timeout(Duration::from_secs(2), async {
            for _ in 0..16 {
                bus.publish("geral", payload.clone()).await.unwrap();
            }
        })
        .await;
        assert!(published.is_ok(), "publish waited on the relay");

        // Accept without ever reading; the stalled write is abandoned and
        // the publisher dials again.
        let (_stalled, _) = relay.accept().await.unwrap();
        let again = tokio::time::timeout(Duration::from_secs(5), relay.accept()).await;
        assert!(again.is_ok(), "publisher never reconnected");
    }
}
