use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::GameStore;
use crate::error::{GameError, Result};
use crate::game::{GameId, PlayerId, PlayerRating};
use crate::models::GameRecord;

/// In-process store. Games and ratings share one lock so a finished game
/// and its rating changes land together.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    games: HashMap<GameId, GameRecord>,
    ratings: HashMap<PlayerId, PlayerRating>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.inner
            .lock()
            .map_err(|_| GameError::StoreUnavailable("memory store lock poisoned".to_string()))
    }
}

impl GameStore for MemoryStore {
    fn insert_game(&self, record: &GameRecord) -> Result<()> {
        let mut tables = self.tables()?;
        if tables.games.contains_key(&record.id) {
            return Err(GameError::StoreUnavailable(format!(
                "game {} already exists",
                record.id
            )));
        }
        tables.games.insert(record.id, record.clone());
        debug!("Inserted game {}", record.id);
        Ok(())
    }

    fn load_game(&self, id: GameId) -> Result<Option<GameRecord>> {
        Ok(self.tables()?.games.get(&id).cloned())
    }

    fn save_game(&self, record: &GameRecord, ratings: &[(PlayerId, PlayerRating)]) -> Result<()> {
        let mut tables = self.tables()?;
        tables.games.insert(record.id, record.clone());
        for (player, rating) in ratings {
            tables.ratings.insert(player.clone(), rating.clone());
        }
        debug!("Saved game {} with {} rating(s)", record.id, ratings.len());
        Ok(())
    }

    fn games_for_player(&self, player: &PlayerId) -> Result<Vec<GameRecord>> {
        let tables = self.tables()?;
        let mut games: Vec<GameRecord> = tables
            .games
            .values()
            .filter(|g| g.involves(player))
            .cloned()
            .collect();
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(games)
    }

    fn load_rating(&self, player: &PlayerId) -> Result<PlayerRating> {
        Ok(self
            .tables()?
            .ratings
            .get(player)
            .cloned()
            .unwrap_or_default())
    }
}
