//! The membership and rank authority.
//!
//! A standalone node that hands out election ranks, tracks heartbeats and
//! forgets servers that go quiet. It keeps nothing on disk; a restart
//! starts numbering from the base rank again.

mod registry;
mod service;

pub use registry::MembershipRegistry;
pub use service::AuthorityService;
