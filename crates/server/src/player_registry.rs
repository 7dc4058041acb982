//! Shared player registry.
//!
//! Tracks connected players by uuid, mirrors each one into the world's
//! entity table (so chunk unloading and sleep skipping see them) and
//! broadcasts join/leave events.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;
use uuid::Uuid;
use voxelcraft_engine::world::World;
use voxelcraft_engine::world::entity::{Entity, EntityId};

/// Information about a connected player, stored in the registry.
#[derive(Clone, Debug)]
pub struct PlayerInfo {
    pub uuid: Uuid,
    pub name: String,
    pub entity: EntityId,
}

/// Lifecycle events broadcast to subscribers.
#[derive(Clone, Debug)]
pub enum PlayerEvent {
    Joined { uuid: Uuid, name: String },
    Left { uuid: Uuid, name: String },
}

/// Thread-safe registry of all connected players.
///
/// Uses `std::sync::RwLock` because every operation is brief (no awaits while
/// the lock is held) and the access pattern is read-heavy.
pub struct PlayerRegistry {
    players: RwLock<HashMap<Uuid, PlayerInfo>>,
    event_tx: broadcast::Sender<PlayerEvent>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            players: RwLock::new(HashMap::new()),
            event_tx,
        }
    }

    /// Spawn a player entity at `(x, y, z)` and register it. Names are
    /// unique; joining under a taken name returns `None`.
    pub fn join(&self, world: &mut World, name: &str, x: f64, y: f64, z: f64) -> Option<Uuid> {
        if self.find(name).is_some() {
            return None;
        }
        let entity = world.spawn_entity(Entity::player(name, x, y, z));
        let uuid = Uuid::new_v4();
        self.players.write().expect("player registry poisoned").insert(
            uuid,
            PlayerInfo {
                uuid,
                name: name.to_string(),
                entity,
            },
        );
        tracing::info!("{} joined at ({:.1}, {:.1}, {:.1})", name, x, y, z);
        // Best-effort: if no subscribers yet, the send fails silently.
        let _ = self.event_tx.send(PlayerEvent::Joined {
            uuid,
            name: name.to_string(),
        });
        Some(uuid)
    }

    /// Remove a player and its entity.
    pub fn leave(&self, world: &mut World, uuid: Uuid) -> bool {
        let info = self
            .players
            .write()
            .expect("player registry poisoned")
            .remove(&uuid);
        let Some(info) = info else {
            return false;
        };
        world.remove_entity(info.entity);
        tracing::info!("{} left", info.name);
        let _ = self.event_tx.send(PlayerEvent::Left {
            uuid,
            name: info.name,
        });
        true
    }

    /// Teleport a player.
    pub fn move_to(&self, world: &mut World, uuid: Uuid, x: f64, y: f64, z: f64) -> bool {
        match self.get(uuid) {
            Some(info) => world.move_entity(info.entity, x, y, z),
            None => false,
        }
    }

    pub fn set_sleeping(&self, world: &mut World, uuid: Uuid, sleeping: bool) -> bool {
        match self.get(uuid) {
            Some(info) => world.set_sleeping(info.entity, sleeping),
            None => false,
        }
    }

    pub fn get(&self, uuid: Uuid) -> Option<PlayerInfo> {
        self.players
            .read()
            .expect("player registry poisoned")
            .get(&uuid)
            .cloned()
    }

    /// Look a player up by name, ignoring case.
    pub fn find(&self, name: &str) -> Option<PlayerInfo> {
        self.players
            .read()
            .expect("player registry poisoned")
            .values()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Snapshot of all currently registered players.
    pub fn snapshot(&self) -> Vec<PlayerInfo> {
        self.players
            .read()
            .expect("player registry poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn player_count(&self) -> usize {
        self.players.read().expect("player registry poisoned").len()
    }

    /// Subscribe to player lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.event_tx.subscribe()
    }
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
