//! Persistence collaborator for games and ratings.

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::game::{GameId, PlayerId, PlayerRating};
use crate::models::GameRecord;

/// Durable storage the service reads from and writes to.
///
/// Implementations report their own failures as
/// `GameError::StoreUnavailable`; callers never retry.
pub trait GameStore: Send + Sync {
    /// Store a brand new game. Fails if the id is already taken.
    fn insert_game(&self, record: &GameRecord) -> Result<()>;

    fn load_game(&self, id: GameId) -> Result<Option<GameRecord>>;

    /// Replace a game and, in the same write, any ratings it changed.
    fn save_game(&self, record: &GameRecord, ratings: &[(PlayerId, PlayerRating)]) -> Result<()>;

    /// Every game `player` sits in, newest first.
    fn games_for_player(&self, player: &PlayerId) -> Result<Vec<GameRecord>>;

    /// The player's rating, or a fresh default rating for unknown players.
    fn load_rating(&self, player: &PlayerId) -> Result<PlayerRating>;
}
