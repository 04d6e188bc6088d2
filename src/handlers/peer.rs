//! Server-to-server endpoints: clock/election queries and replication.

use crate::network::PeerEndpoint;
use crate::state::{Node, unix_now};
use crate::sync::{election, replication};
use crate::telemetry::spans;
use board_proto::{ProtocolError, Reply, ReplicationAck, WireFormat, decode_request, status};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{Instrument, debug};

/// Answer a `clock` or `election` request from another server.
///
/// An `election` challenge is acknowledged immediately and this node starts
/// its own election in the background.
pub async fn handle_sync(node: &Arc<Node>, payload: &[u8]) -> Result<Option<Bytes>, ProtocolError> {
    let Some((format, request)) = decode_request(payload).into_parts() else {
        debug!(len = payload.len(), "Dropping undecodable sync request");
        return Ok(None);
    };
    node.clock().observe(request.clock());

    let service = request.service().unwrap_or(status::UNKNOWN);
    let reply = Reply::new(service, node.clock().tick(), unix_now());
    let reply = spans::peer_request(PeerEndpoint::Sync.as_str(), service).in_scope(|| {
        match service {
            "clock" => reply.with_time(node.offset().adjusted_now()),
            "election" => {
                let from = request.data.as_ref().and_then(|d| d.user.as_deref());
                debug!(from = ?from, "Election challenge received");
                election::spawn_election(Arc::clone(node));
                reply.with_election(status::ELECTION_OK)
            }
            _ => reply
                .with_status(status::ERROR)
                .with_message(status::UNRECOGNIZED_SERVICE),
        }
    });

    Ok(Some(Bytes::from(format.encode(&reply)?)))
}

/// Apply a replicated mutation pushed by another server.
pub async fn handle_replication(
    node: &Arc<Node>,
    payload: &[u8],
) -> Result<Option<Bytes>, ProtocolError> {
    let Some((format, request)) = decode_request(payload).into_parts() else {
        return Ok(Some(Bytes::from(
            WireFormat::Binary.encode(&ReplicationAck::ignored())?,
        )));
    };
    let service = request.service().unwrap_or(status::UNKNOWN);
    let ack = replication::apply(node, &request)
        .instrument(spans::peer_request(
            PeerEndpoint::Replication.as_str(),
            service,
        ))
        .await;
    Ok(Some(Bytes::from(format.encode(&ack)?)))
}
