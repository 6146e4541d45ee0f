use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

/// Live mapping from user id to the one connection currently tracked for that
/// user. Last connect wins: registering again replaces the previous entry.
///
/// Cheap to clone; all clones share the same map. Build one at startup and
/// hand it to the dispatcher and the message pipeline.
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    users: Arc<DashMap<Uuid, Uuid>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `user_id` to `conn_id`, returning the connection it replaced.
    pub fn register(&self, user_id: Uuid, conn_id: Uuid) -> Option<Uuid> {
        self.users.insert(user_id, conn_id)
    }

    pub fn lookup(&self, user_id: Uuid) -> Option<Uuid> {
        self.users.get(&user_id).map(|entry| *entry.value())
    }

    /// Drop the mapping for `user_id`. Absent users are fine.
    pub fn unregister(&self, user_id: Uuid) -> Option<Uuid> {
        self.users.remove(&user_id).map(|(_, conn_id)| conn_id)
    }

    /// Drop the mapping only if it still points at `conn_id`. Used on
    /// disconnect so a stale connection cannot evict a newer one.
    pub fn release(&self, user_id: Uuid, conn_id: Uuid) -> bool {
        self.users
            .remove_if(&user_id, |_, current| *current == conn_id)
            .is_some()
    }

    /// Registered user ids, sorted.
    pub fn snapshot(&self) -> Vec<Uuid> {
        let mut users: Vec<Uuid> = self.users.iter().map(|entry| *entry.key()).collect();
        users.sort_unstable();
        users
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.users.contains_key(&user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
