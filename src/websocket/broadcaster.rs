use actix::Addr;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::game::GameId;
use crate::models::{GameSnapshot, GameSocketMessage, ServerMessage};
use crate::service::Notifier;
use crate::websocket::handler::GameSocket;

/// Fan-out of game updates to the sockets watching each game.
#[derive(Default)]
pub struct Broadcaster {
    /// Connection ids subscribed to each game
    topics: Mutex<HashMap<GameId, Vec<String>>>,
    sessions: Mutex<HashMap<String, Addr<GameSocket>>>,
}

impl Broadcaster {
    pub fn subscribe(&self, game_id: GameId, connection_id: &str, addr: Addr<GameSocket>) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection_id.to_string(), addr);
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let subscribers = topics.entry(game_id).or_default();
        if !subscribers.iter().any(|id| id == connection_id) {
            subscribers.push(connection_id.to_string());
        }
        info!(
            "Connection {} watching game {} ({} watchers)",
            connection_id,
            game_id,
            subscribers.len()
        );
    }

    pub fn unsubscribe(&self, game_id: GameId, connection_id: &str) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(connection_id);
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(subscribers) = topics.get_mut(&game_id) {
            subscribers.retain(|id| id != connection_id);
            if subscribers.is_empty() {
                info!("No more watchers for game {}", game_id);
                topics.remove(&game_id);
            }
        }
    }

    pub fn subscriber_count(&self, game_id: GameId) -> usize {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&game_id)
            .map_or(0, Vec::len)
    }

    /// Send `message` to every socket watching `game_id`. Returns how many
    /// sockets it was handed to.
    pub fn broadcast(&self, game_id: GameId, message: &ServerMessage) -> Result<usize, String> {
        // Scope the locks to minimize lock time
        let recipients: Vec<Addr<GameSocket>> = {
            let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(connection_ids) = topics.get(&game_id) else {
                return Ok(0);
            };
            let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            connection_ids
                .iter()
                .filter_map(|id| {
                    let addr = sessions.get(id);
                    if addr.is_none() {
                        warn!("Session not found for connection ID: {}", id);
                    }
                    addr.cloned()
                })
                .collect()
        };

        // Serialize the message once
        let text = serde_json::to_string(message).map_err(|e| e.to_string())?;
        for addr in &recipients {
            addr.do_send(GameSocketMessage(text.clone()));
        }
        Ok(recipients.len())
    }
}

impl Notifier for Broadcaster {
    fn publish(&self, snapshot: &GameSnapshot) -> Result<(), String> {
        let sent = self.broadcast(snapshot.id, &ServerMessage::game_update(snapshot))?;
        info!("Broadcast game {} to {} watcher(s)", snapshot.id, sent);
        Ok(())
    }
}
