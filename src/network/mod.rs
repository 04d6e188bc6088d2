//! Network module.
//!
//! Inbound endpoints, the outbound request client, and the three seams the
//! node talks through: the membership authority, peer nodes, and the bus.

mod authority;
mod bus;
mod client;
mod directory;
mod endpoint;
mod peer;
mod traits;

pub use authority::AuthorityClient;
pub use bus::{LocalBus, TcpBus};
pub use client::RequestClient;
pub use directory::PeerDirectory;
pub use endpoint::{Endpoint, EndpointKind, Inbound};
pub use peer::TcpPeerLink;
pub use traits::{BusSubscription, FanoutBus, HeartbeatStatus, Membership, PeerEndpoint, PeerLink};
