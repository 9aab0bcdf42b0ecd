//! Player registry shared by every connection handler
//!
//! This module holds the only shared mutable state of the server: the mapping
//! from display name to the connection that claimed it. It provides:
//! - Atomic check-then-insert on join, so two handlers can never both win a name
//! - Identity-checked removal on leave, so only the owning connection frees a name
//! - A snapshot of live handles for shutdown
//!
//! Each operation takes the lock once, touches the map, and releases it. No
//! network I/O happens while the lock is held.

use crate::connection::ConnectionHandle;
use log::info;
use shared::JoinError;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// A joined player
///
/// The name is the identity key; the connection handle records which
/// connection owns that name right now.
#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub connection: ConnectionHandle,
    pub score: u32,
}

impl Player {
    /// Creates a player with a zero score.
    pub fn new(name: String, connection: ConnectionHandle) -> Self {
        Self {
            name,
            connection,
            score: 0,
        }
    }
}

/// Concurrency-safe mapping of player names to their connections
///
/// Constructed once per server and shared through an `Arc`, so independent
/// servers (and tests) never observe each other's players.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Mutex<HashMap<String, Player>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` for `connection` if nobody holds it
    ///
    /// Returns `JoinError::NameTaken` without touching the map when the name is
    /// already registered, including by the same connection.
    pub async fn join(&self, name: &str, connection: &ConnectionHandle) -> Result<(), JoinError> {
        let mut players = self.players.lock().await;
        if players.contains_key(name) {
            return Err(JoinError::NameTaken);
        }

        players.insert(
            name.to_string(),
            Player::new(name.to_string(), connection.clone()),
        );
        info!(
            "Player '{}' joined from {} (connection {})",
            name,
            connection.peer(),
            connection.id()
        );
        Ok(())
    }

    /// Removes `name` only if it is still owned by `connection`
    ///
    /// Returns true if an entry was removed. A stale or rejected connection
    /// calling this for a name it does not own leaves the live entry alone.
    pub async fn leave(&self, name: &str, connection: &ConnectionHandle) -> bool {
        let mut players = self.players.lock().await;
        let owned = players
            .get(name)
            .is_some_and(|player| player.connection == *connection);

        if owned {
            players.remove(name);
            info!("Player '{}' left (connection {})", name, connection.id());
        }
        owned
    }

    /// Adds `points` to the score of `name` if `connection` owns it
    pub async fn add_score(&self, name: &str, connection: &ConnectionHandle, points: u32) -> Option<u32> {
        let mut players = self.players.lock().await;
        let player = players
            .get_mut(name)
            .filter(|player| player.connection == *connection)?;
        player.score = player.score.saturating_add(points);
        Some(player.score)
    }

    /// Returns the connection handles of every registered player
    pub async fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.players
            .lock()
            .await
            .values()
            .map(|player| player.connection.clone())
            .collect()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.players.lock().await.contains_key(name)
    }

    pub async fn score(&self, name: &str) -> Option<u32> {
        self.players.lock().await.get(name).map(|player| player.score)
    }

    /// Returns the number of registered players
    pub async fn len(&self) -> usize {
        self.players.lock().await.len()
    }

    /// Returns true if no players are registered
    pub async fn is_empty(&self) -> bool {
        self.players.lock().await.is_empty()
    }
}
