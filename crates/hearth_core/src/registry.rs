//! Authoritative map of connected players.

use crate::player::Player;
use crate::session::CloseCallback;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Connected players keyed by UUID.
///
/// Clones share the same map. Readers run concurrently; inserts and removals
/// take the write lock and exclude everyone else.
#[derive(Clone, Default)]
pub struct PlayerRegistry {
    players: Arc<RwLock<HashMap<Uuid, Arc<Player>>>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `player` under its UUID, returning any player it replaced.
    pub async fn insert(&self, player: Arc<Player>) -> Option<Arc<Player>> {
        self.players.write().await.insert(player.uuid(), player)
    }

    /// Removes the player with `uuid`. Removing an absent player is a no-op.
    pub async fn remove(&self, uuid: &Uuid) -> Option<Arc<Player>> {
        self.players.write().await.remove(uuid)
    }

    /// Looks up a player by UUID.
    ///
    /// # Returns
    ///
    /// A shared handle to the player, or `None` if it is not registered.
    pub async fn get(&self, uuid: &Uuid) -> Option<Arc<Player>> {
        self.players.read().await.get(uuid).cloned()
    }

    /// Point-in-time copy of the connected players. Later joins and leaves
    /// are not reflected in it.
    pub async fn list(&self) -> Vec<Arc<Player>> {
        self.players.read().await.values().cloned().collect()
    }

    /// Number of registered players.
    pub async fn len(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.players.read().await.is_empty()
    }

    /// Session-close callback that drops the player from this registry.
    pub fn remove_on_close(&self) -> CloseCallback {
        let registry = self.clone();
        Box::new(move |uuid| {
            Box::pin(async move {
                registry.remove(&uuid).await;
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ClientData, IdentityData};
    use crate::player::{self, PlayerInit};
    use crate::session::{BasicSessions, SessionFactory};
    use crate::transport::memory;
    use crate::types::BlockPos;

    fn player(name: &str) -> Arc<Player> {
        let identity = IdentityData {
            identity: Uuid::new_v4().to_string(),
            display_name: name.to_string(),
            xuid: String::new(),
        };
        let (conn, _client) = memory::pair("memory:test", identity, ClientData::default());
        let init = PlayerInit::from_connection(conn.clone()).unwrap();
        let session = BasicSessions.create(conn, 8);
        Arc::new(player::create(init, BlockPos::default(), session))
    }

    #[tokio::test]
    async fn test_insert_lookup_remove() {
        let registry = PlayerRegistry::new();
        let steve = player("Steve");

        assert!(registry.insert(steve.clone()).await.is_none());
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get(&steve.uuid()).await.unwrap().name(), "Steve");

        assert!(registry.remove(&steve.uuid()).await.is_some());
        assert!(registry.get(&steve.uuid()).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let registry = PlayerRegistry::new();
        registry.insert(player("Steve")).await;

        assert!(registry.remove(&Uuid::new_v4()).await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_same_uuid_is_stored_once() {
        let registry = PlayerRegistry::new();
        let steve = player("Steve");

        registry.insert(steve.clone()).await;
        let replaced = registry.insert(steve.clone()).await;

        assert!(replaced.is_some());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_is_a_snapshot() {
        let registry = PlayerRegistry::new();
        registry.insert(player("Steve")).await;

        let snapshot = registry.list().await;
        registry.insert(player("Alex")).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_on_close_callback() {
        let registry = PlayerRegistry::new();
        let steve = player("Steve");
        registry.insert(steve.clone()).await;

        (registry.remove_on_close())(steve.uuid()).await;

        assert!(registry.is_empty().await);
    }
}
