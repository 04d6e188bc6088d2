//! Sync Module - cluster coordination.
//!
//! Everything a server node does with its peers and the membership
//! authority besides answering clients: registration and heartbeats, the
//! Bully election, Berkeley clock synchronization, and replication.

pub mod berkeley;
pub mod election;
pub mod heartbeat;
pub mod replication;

pub use berkeley::SyncOutcome;
pub use election::{ElectionCoordinator, ElectionOutcome, ElectionPhase};
