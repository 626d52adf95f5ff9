use std::sync::Arc;

use crate::game::{ChessRules, RatingEngine};
use crate::service::GameService;
use crate::store::{GameStore, MemoryStore};
use crate::websocket::Broadcaster;

/// Application state shared between connections
pub struct AppState {
    pub service: GameService,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    /// State backed by the in-memory store.
    pub fn new(k_factor: i32) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), k_factor)
    }

    pub fn with_store(store: Arc<dyn GameStore>, k_factor: i32) -> Self {
        let broadcaster = Arc::new(Broadcaster::default());
        let service = GameService::new(
            store,
            Arc::new(ChessRules),
            RatingEngine::new(k_factor),
            broadcaster.clone(),
        );
        Self {
            service,
            broadcaster,
        }
    }
}
