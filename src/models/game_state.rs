use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{GameError, Result};
use crate::game::{
    BoardState, Color, GameId, GameResult, GameSession, Move, PlayerId, Position, RulesOracle,
    Seats, SessionParts,
};

/// Persisted form of a game.
///
/// The board is stored as its starting FEN plus the move list and is always
/// rebuilt by replaying the moves; `fen` is kept for readers that only want
/// to display the position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: GameId,
    pub white_player: Option<PlayerId>,
    pub black_player: Option<PlayerId>,
    pub starting_fen: String,
    pub moves: Vec<Move>,
    pub fen: String,
    pub result: GameResult,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl GameRecord {
    pub fn from_session(session: &GameSession) -> Self {
        let seats = session.seats();
        let board = session.board();
        Self {
            id: session.id(),
            white_player: seats.player(Color::White).cloned(),
            black_player: seats.player(Color::Black).cloned(),
            starting_fen: board.starting_position().to_string(),
            moves: board.history().to_vec(),
            fen: board.fen(),
            result: session.result(),
            created_at: session.created_at(),
            started_at: session.started_at(),
            finished_at: session.finished_at(),
        }
    }

    /// Rebuild the live session by replaying the stored moves.
    pub fn into_session(self, oracle: Arc<dyn RulesOracle>) -> Result<GameSession> {
        let start: Position = self.starting_fen.parse().map_err(|e| {
            GameError::CorruptState(format!("game {} has bad starting FEN: {e}", self.id))
        })?;
        let board = BoardState::reconstruct_from(oracle, &self.moves, start)?;
        Ok(GameSession::from_parts(SessionParts {
            id: self.id,
            seats: Seats::from_players(self.white_player, self.black_player),
            board,
            result: self.result,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }))
    }

    pub fn involves(&self, player: &PlayerId) -> bool {
        self.white_player.as_ref() == Some(player) || self.black_player.as_ref() == Some(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{ChessRules, SeatPreference};

    #[test]
    fn test_record_roundtrip_replays_moves() {
        let oracle: Arc<dyn RulesOracle> = Arc::new(ChessRules);
        let mut session = GameSession::new(BoardState::new(oracle.clone()));
        let alice = PlayerId::new("alice").unwrap();
        session.assign_seat(alice.clone(), SeatPreference::White).unwrap();
        session.submit_move(&alice, "e2e4".parse().unwrap()).unwrap();

        let record = GameRecord::from_session(&session);
        assert_eq!(record.moves.len(), 1);
        assert!(record.involves(&alice));

        let json = serde_json::to_string(&record).unwrap();
        let restored: GameRecord = serde_json::from_str(&json).unwrap();
        let rebuilt = restored.clone().into_session(oracle).unwrap();
        assert_eq!(rebuilt.board().position(), session.board().position());
        assert_eq!(GameRecord::from_session(&rebuilt), restored);
    }

    #[test]
    fn test_unreplayable_record_is_corrupt() {
        let oracle: Arc<dyn RulesOracle> = Arc::new(ChessRules);
        let session = GameSession::new(BoardState::new(oracle.clone()));
        let mut record = GameRecord::from_session(&session);
        record.moves.push("e2e5".parse().unwrap());
        assert!(matches!(
            record.into_session(oracle),
            Err(GameError::CorruptState(_))
        ));
    }
}
