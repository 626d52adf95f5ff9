use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use super::position::Position;
use super::rules::{DrawReason, RulesOracle, TerminalStatus};
use super::types::{Color, Move, Piece, Square};
use crate::error::{GameError, Result};

/// Draws a player may claim but which do not end the game on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    ThreefoldRepetition,
    FiftyMoves,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveResult {
    Accepted(Move),
    Rejected,
}

/// One game's position plus the moves that produced it.
///
/// `position` is only ever changed by `apply_move`, so it always equals the
/// starting position with `history` replayed on top.
#[derive(Clone)]
pub struct BoardState {
    oracle: Arc<dyn RulesOracle>,
    start: Position,
    position: Position,
    history: Vec<Move>,
    seen: HashMap<String, u32>,
}

impl std::fmt::Debug for BoardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardState")
            .field("fen", &self.position.to_string())
            .field("history", &self.history)
            .finish()
    }
}

impl BoardState {
    pub fn new(oracle: Arc<dyn RulesOracle>) -> Self {
        Self::from_position(oracle, Position::starting())
    }

    pub fn from_position(oracle: Arc<dyn RulesOracle>, start: Position) -> Self {
        let mut seen = HashMap::new();
        seen.insert(start.repetition_key(), 1);
        Self {
            oracle,
            position: start.clone(),
            start,
            history: Vec::new(),
            seen,
        }
    }

    /// Rebuild a board by replaying `history` from `start`.
    ///
    /// A move that the oracle refuses means the stored history is corrupt.
    pub fn reconstruct_from(
        oracle: Arc<dyn RulesOracle>,
        history: &[Move],
        start: Position,
    ) -> Result<Self> {
        let mut board = Self::from_position(oracle, start);
        for (ply, mv) in history.iter().enumerate() {
            if let MoveResult::Rejected = board.apply_move(*mv)? {
                return Err(GameError::CorruptState(format!(
                    "move {mv} at ply {} cannot be replayed",
                    ply + 1
                )));
            }
        }
        Ok(board)
    }

    /// Apply `mv` if the oracle accepts it. Illegal moves leave the board
    /// untouched and come back as `Rejected`.
    pub fn apply_move(&mut self, mv: Move) -> Result<MoveResult> {
        let next = self
            .oracle
            .apply(&self.position, &mv)
            .map_err(|e| GameError::CorruptState(e.to_string()))?;

        match next {
            Some(next) => {
                *self.seen.entry(next.repetition_key()).or_insert(0) += 1;
                self.position = next;
                self.history.push(mv);
                debug!("Applied {} -> {}", mv, self.position);
                Ok(MoveResult::Accepted(mv))
            }
            None => Ok(MoveResult::Rejected),
        }
    }

    pub fn is_terminal(&self) -> Result<TerminalStatus> {
        let status = self
            .oracle
            .status(&self.position)
            .map_err(|e| GameError::CorruptState(e.to_string()))?;
        if status.is_terminal() {
            return Ok(status);
        }

        if self.position.halfmove_clock >= 150 {
            return Ok(TerminalStatus::DrawOther(DrawReason::SeventyFiveMoves));
        }
        if self.repetitions() >= 5 {
            return Ok(TerminalStatus::DrawOther(DrawReason::FivefoldRepetition));
        }
        Ok(TerminalStatus::None)
    }

    pub fn can_claim(&self, claim: ClaimKind) -> bool {
        match claim {
            ClaimKind::ThreefoldRepetition => self.repetitions() >= 3,
            ClaimKind::FiftyMoves => self.position.halfmove_clock >= 100,
        }
    }

    /// How many times the current position has occurred.
    pub fn repetitions(&self) -> u32 {
        self.seen
            .get(&self.position.repetition_key())
            .copied()
            .unwrap_or(0)
    }

    pub fn occupant(&self, square: Square) -> Option<Piece> {
        self.position.piece_at(square)
    }

    pub fn side_to_move(&self) -> Color {
        self.position.side_to_move
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn starting_position(&self) -> &Position {
        &self.start
    }

    pub fn history(&self) -> &[Move] {
        &self.history
    }

    pub fn fen(&self) -> String {
        self.position.to_string()
    }

    pub fn legal_moves_from(&self, square: Square) -> Result<Vec<Move>> {
        let moves = self
            .oracle
            .legal_moves(&self.position)
            .map_err(|e| GameError::CorruptState(e.to_string()))?;
        Ok(moves.into_iter().filter(|m| m.from == square).collect())
    }
}
