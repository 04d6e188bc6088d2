//! Rank assignment and liveness tracking.

use board_proto::ServerEntry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Copy)]
struct ServerRecord {
    rank: u64,
    last_heartbeat: Instant,
}

#[derive(Debug)]
struct Inner {
    servers: HashMap<String, ServerRecord>,
    next_rank: u64,
}

/// Live servers and their ranks.
///
/// Ranks start at the base rank and only ever grow; a pruned name that
/// registers again gets a fresh rank. All state sits behind one lock so
/// `list` always sees a consistent snapshot.
#[derive(Debug)]
pub struct MembershipRegistry {
    inner: Mutex<Inner>,
    timeout: Duration,
}

impl MembershipRegistry {
    pub fn new(base_rank: u64, timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                servers: HashMap::new(),
                next_rank: base_rank,
            }),
            timeout,
        }
    }

    /// Rank of `name`, allocating the next one on first contact. Refreshes
    /// the heartbeat either way.
    pub fn rank(&self, name: &str) -> u64 {
        self.rank_at(name, Instant::now())
    }

    pub fn rank_at(&self, name: &str, now: Instant) -> u64 {
        let mut inner = self.inner.lock();
        if let Some(record) = inner.servers.get_mut(name) {
            record.last_heartbeat = now;
            return record.rank;
        }

        let rank = inner.next_rank;
        inner.next_rank += 1;
        inner.servers.insert(
            name.to_string(),
            ServerRecord {
                rank,
                last_heartbeat: now,
            },
        );
        let count = inner.servers.len();
        drop(inner);

        crate::metrics::set_membership_servers(count);
        info!(server = %name, rank, "Assigned rank");
        rank
    }

    /// Refresh `name`. Returns `false` if the name is not (or no longer) known.
    pub fn heartbeat(&self, name: &str) -> bool {
        self.heartbeat_at(name, Instant::now())
    }

    pub fn heartbeat_at(&self, name: &str, now: Instant) -> bool {
        match self.inner.lock().servers.get_mut(name) {
            Some(record) => {
                record.last_heartbeat = now;
                true
            }
            None => false,
        }
    }

    /// Live servers ordered by rank.
    pub fn list(&self) -> Vec<ServerEntry> {
        let mut list: Vec<ServerEntry> = self
            .inner
            .lock()
            .servers
            .iter()
            .map(|(name, record)| ServerEntry {
                name: name.clone(),
                rank: record.rank,
            })
            .collect();
        list.sort_by_key(|entry| entry.rank);
        list
    }

    /// Drop every server idle for longer than the timeout as of `now`.
    /// Returns the dropped names.
    pub fn prune_at(&self, now: Instant) -> Vec<String> {
        let mut inner = self.inner.lock();
        let timeout = self.timeout;
        let expired: Vec<String> = inner
            .servers
            .iter()
            .filter(|(_, record)| now.saturating_duration_since(record.last_heartbeat) > timeout)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &expired {
            inner.servers.remove(name);
        }
        let count = inner.servers.len();
        drop(inner);

        if !expired.is_empty() {
            crate::metrics::set_membership_servers(count);
        }
        expired
    }

    pub fn prune(&self) -> Vec<String> {
        self.prune_at(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MembershipRegistry {
        MembershipRegistry::new(1, Duration::from_secs(30))
    }

    #[test]
    fn ranks_follow_first_contact_order() {
        let registry = registry();
        assert_eq!(registry.rank("A"), 1);
        assert_eq!(registry.rank("B"), 2);
        assert_eq!(registry.rank("A"), 1);

        let list = registry.list();
        assert_eq!(list.len(), 2);
        assert_eq!((list[0].name.as_str(), list[0].rank), ("A", 1));
        assert_eq!((list[1].name.as_str(), list[1].rank), ("B", 2));
    }

    #[test]
    fn idle_servers_are_pruned_and_never_reuse_ranks() {
        let registry = registry();
        let start = Instant::now();
        registry.rank_at("A", start);
        registry.rank_at("B", start);
        registry.heartbeat_at("B", start + Duration::from_secs(25));

        let pruned = registry.prune_at(start + Duration::from_secs(31));
        assert_eq!(pruned, vec!["A".to_string()]);
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.rank("A"), 3);
    }

    #[test]
    fn heartbeat_from_unknown_name_is_rejected() {
        let registry = registry();
        assert!(!registry.heartbeat("ghost"));
        assert!(registry.is_empty());
        registry.rank("ghost");
        assert!(registry.heartbeat("ghost"));
    }

    #[test]
    fn boundary_age_is_still_live() {
        let registry = registry();
        let start = Instant::now();
        registry.rank_at("A", start);
        assert!(registry.prune_at(start + Duration::from_secs(30)).is_empty());
    }
}
