//! Integration test common infrastructure.
//!
//! Provides a framed request/reply client and an in-process cluster of real
//! TCP endpoints on ephemeral ports.

#![allow(dead_code)]

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::TestCluster;
