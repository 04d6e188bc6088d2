//! Bully election.
//!
//! A node asks every higher-ranked live peer, in rank order, whether it is
//! alive. Any `OK` means a stronger node exists and will announce itself; silence from all
//! of them makes this node the coordinator, which it announces on the
//! `servers` topic. Announcements are applied last-write-wins.

use crate::network::PeerEndpoint;
use crate::state::{Node, unix_now};
use crate::telemetry::spans;
use board_proto::{
    Announcement, Reply, Request, RequestData, SERVERS_TOPIC, WireFormat, decode_any, status,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{Instrument, debug, info, warn};

/// Rank that makes a node coordinator at startup.
pub const BASE_RANK: u64 = 1;

/// Where this node stands in the election protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionPhase {
    Idle,
    ElectionInProgress,
    Coordinator,
    Follower,
}

/// Result of one election run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionOutcome {
    /// No higher-ranked peer answered; this node announced itself.
    Won,
    /// A higher-ranked peer answered and is expected to announce.
    Deferred { to: String },
    /// Own rank is not known yet.
    NoRank,
    /// Another run is already in progress.
    AlreadyRunning,
    /// The membership list could not be fetched.
    MembershipUnavailable,
}

impl ElectionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Won => "won",
            Self::Deferred { .. } => "deferred",
            Self::NoRank => "no_rank",
            Self::AlreadyRunning => "already_running",
            Self::MembershipUnavailable => "membership_unavailable",
        }
    }
}

#[derive(Debug)]
struct ElectionState {
    phase: ElectionPhase,
    coordinator: Option<String>,
    own_rank: Option<u64>,
}

/// Election state of one node and the algorithm that drives it.
#[derive(Debug)]
pub struct ElectionCoordinator {
    name: String,
    state: Mutex<ElectionState>,
}

impl ElectionCoordinator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ElectionState {
                phase: ElectionPhase::Idle,
                coordinator: None,
                own_rank: None,
            }),
        }
    }

    pub fn phase(&self) -> ElectionPhase {
        self.state.lock().phase
    }

    pub fn coordinator(&self) -> Option<String> {
        self.state.lock().coordinator.clone()
    }

    pub fn own_rank(&self) -> Option<u64> {
        self.state.lock().own_rank
    }

    pub fn is_coordinator(&self) -> bool {
        self.state.lock().coordinator.as_deref() == Some(self.name.as_str())
    }

    /// Record the rank assigned by the authority.
    ///
    /// The first node in the cluster assumes it is coordinator until told
    /// otherwise.
    pub fn set_rank(&self, rank: u64) {
        let mut state = self.state.lock();
        state.own_rank = Some(rank);
        if rank == BASE_RANK && state.coordinator.is_none() {
            state.coordinator = Some(self.name.clone());
        }
    }

    /// Apply a coordinator announcement. The latest one always wins.
    pub fn on_announcement(&self, coordinator: &str) {
        let mut state = self.state.lock();
        if state.coordinator.as_deref() != Some(coordinator) {
            info!(coordinator, "New coordinator announced");
        }
        state.coordinator = Some(coordinator.to_string());
        state.phase = if coordinator == self.name {
            ElectionPhase::Coordinator
        } else {
            ElectionPhase::Follower
        };
    }

    /// Move to `ElectionInProgress` unless a run is already active.
    fn begin(&self) -> Result<u64, ElectionOutcome> {
        let mut state = self.state.lock();
        let Some(rank) = state.own_rank else {
            return Err(ElectionOutcome::NoRank);
        };
        if state.phase == ElectionPhase::ElectionInProgress {
            return Err(ElectionOutcome::AlreadyRunning);
        }
        state.phase = ElectionPhase::ElectionInProgress;
        Ok(rank)
    }

    fn finish(&self, phase: ElectionPhase, coordinator: Option<String>) {
        let mut state = self.state.lock();
        state.phase = phase;
        if coordinator.is_some() {
            state.coordinator = coordinator;
        }
    }

    /// Run one election for `node`.
    pub async fn run(&self, node: &Node) -> ElectionOutcome {
        let rank = match self.begin() {
            Ok(rank) => rank,
            Err(outcome) => {
                debug!(outcome = outcome.as_str(), "Election not started");
                crate::metrics::record_election(outcome.as_str());
                return outcome;
            }
        };

        let outcome = self
            .contest(node, rank)
            .instrument(spans::election(&self.name, rank))
            .await;
        crate::metrics::record_election(outcome.as_str());
        outcome
    }

    async fn contest(&self, node: &Node, rank: u64) -> ElectionOutcome {
        let members = match node.membership().list().await {
            Ok(members) => members,
            Err(e) => {
                warn!(error = %e, "Election aborted: membership unavailable");
                self.finish(ElectionPhase::Idle, None);
                return ElectionOutcome::MembershipUnavailable;
            }
        };

        let higher: Vec<_> = members
            .into_iter()
            .filter(|m| m.rank > rank && m.name != self.name)
            .collect();
        info!(candidates = higher.len(), "Election started");

        // Every higher peer is challenged; the strongest one that answered
        // is the one expected to announce.
        let mut strongest: Option<(u64, String)> = None;
        for peer in higher {
            if self.challenge(node, &peer.name).await
                && strongest.as_ref().is_none_or(|(best, _)| peer.rank > *best)
            {
                strongest = Some((peer.rank, peer.name));
            }
        }

        if let Some((_, to)) = strongest {
            info!(peer = %to, "Higher-ranked peer answered, deferring");
            self.finish(ElectionPhase::Follower, None);
            return ElectionOutcome::Deferred { to };
        }

        self.finish(ElectionPhase::Coordinator, Some(self.name.clone()));
        info!("Won election, announcing");
        self.announce(node).await;
        ElectionOutcome::Won
    }

    /// Send `election` to one peer; true if it answered `OK` in time.
    async fn challenge(&self, node: &Node, peer: &str) -> bool {
        let data = RequestData::default()
            .with_user(&self.name)
            .with_timestamp(unix_now())
            .with_clock(node.clock().tick());
        let payload = match WireFormat::Binary.encode(&Request::new(Announcement::ELECTION, data)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode election request");
                return false;
            }
        };

        let raw = match node
            .peers()
            .call(
                peer,
                PeerEndpoint::Sync,
                Bytes::from(payload),
                node.timing().peer_timeout(),
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                debug!(peer, error = %e, "No election answer");
                return false;
            }
        };

        match decode_any::<Reply>(&raw) {
            Ok((_, reply)) => {
                node.clock().update(reply.data.clock);
                reply.data.election.as_deref() == Some(status::ELECTION_OK)
            }
            Err(e) => {
                debug!(peer, error = %e, "Undecodable election answer");
                false
            }
        }
    }

    async fn announce(&self, node: &Node) {
        let announcement = Announcement::election(&self.name, unix_now(), node.clock().tick());
        let payload = match WireFormat::Binary.encode(&announcement) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode announcement");
                return;
            }
        };
        if let Err(e) = node.bus().publish(SERVERS_TOPIC, Bytes::from(payload)).await {
            warn!(error = %e, "Failed to publish coordinator announcement");
        }
    }
}

/// Start an election in the background.
pub fn spawn_election(node: Arc<Node>) {
    tokio::spawn(async move {
        node.election().run(&node).await;
    });
}

/// Follow coordinator announcements for the lifetime of the process.
pub async fn monitor(node: Arc<Node>) {
    loop {
        let mut subscription = match node.bus().subscribe(&[SERVERS_TOPIC]).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(error = %e, "Cannot subscribe to announcements, retrying");
                tokio::time::sleep(node.timing().heartbeat_interval()).await;
                continue;
            }
        };

        while let Some(publication) = subscription.recv().await {
            match decode_any::<Announcement>(&publication.payload) {
                Ok((_, announcement)) => {
                    node.clock().observe(announcement.data.clock);
                    if let Some(coordinator) = announcement.coordinator() {
                        node.election().on_announcement(coordinator);
                    }
                }
                Err(e) => debug!(error = %e, "Ignoring undecodable announcement"),
            }
        }
        warn!("Announcement subscription ended, resubscribing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::FanoutBus;
    use crate::testing::TestCluster;

    #[test]
    fn rank_one_starts_as_coordinator() {
        let election = ElectionCoordinator::new("a");
        election.set_rank(1);
        assert!(election.is_coordinator());
        assert_eq!(election.phase(), ElectionPhase::Idle);

        let other = ElectionCoordinator::new("b");
        other.set_rank(2);
        assert_eq!(other.coordinator(), None);
    }

    #[test]
    fn announcements_are_last_write_wins() {
        let election = ElectionCoordinator::new("a");
        election.on_announcement("c");
        assert_eq!(election.phase(), ElectionPhase::Follower);
        // A stale announcement still overrides.
        election.on_announcement("b");
        assert_eq!(election.coordinator().as_deref(), Some("b"));
        election.on_announcement("a");
        assert_eq!(election.phase(), ElectionPhase::Coordinator);
    }

    #[tokio::test]
    async fn election_without_rank_is_skipped() {
        let cluster = TestCluster::new();
        let node = cluster.node("a").await;
        assert_eq!(node.election().run(&node).await, ElectionOutcome::NoRank);
    }

    #[tokio::test]
    async fn highest_live_node_wins_and_announces() {
        let cluster = TestCluster::new();
        cluster.register("a");
        let node = cluster.joined("b").await;
        let mut sub = cluster.bus.subscribe(&[SERVERS_TOPIC]).await.unwrap();

        assert_eq!(node.election().run(&node).await, ElectionOutcome::Won);
        assert!(node.election().is_coordinator());

        let publication = sub.recv().await.unwrap();
        let (_, ann): (_, Announcement) = decode_any(&publication.payload).unwrap();
        assert_eq!(ann.coordinator(), Some("b"));
    }

    #[tokio::test]
    async fn unreachable_higher_peer_is_ignored() {
        let cluster = TestCluster::new();
        let node = cluster.joined("a").await;
        // Listed, but no node behind it.
        cluster.register("c");
        assert_eq!(node.election().run(&node).await, ElectionOutcome::Won);
    }

    #[tokio::test]
    async fn live_higher_peer_makes_node_defer() {
        let cluster = TestCluster::new();
        let a = cluster.joined("a").await;
        let _b = cluster.joined("b").await;

        let outcome = a.election().run(&a).await;
        assert_eq!(outcome, ElectionOutcome::Deferred { to: "b".into() });
        assert_eq!(a.election().phase(), ElectionPhase::Follower);
    }

    #[tokio::test]
    async fn every_higher_peer_is_challenged() {
        let cluster = TestCluster::new();
        let a = cluster.joined("a").await;
        let _b = cluster.joined("b").await;
        let _c = cluster.joined("c").await;

        let outcome = a.election().run(&a).await;
        assert_eq!(outcome, ElectionOutcome::Deferred { to: "c".into() });
        assert!(cluster.challengers_of("b").contains(&"a".to_string()));
        assert!(cluster.challengers_of("c").contains(&"a".to_string()));
    }

    #[tokio::test]
    async fn membership_outage_aborts_election() {
        let cluster = TestCluster::new();
        let node = cluster.joined("a").await;
        cluster.membership.set_down(true);
        assert_eq!(
            node.election().run(&node).await,
            ElectionOutcome::MembershipUnavailable
        );
        assert_eq!(node.election().phase(), ElectionPhase::Idle);
    }
}
