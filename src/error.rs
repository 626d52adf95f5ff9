use std::fmt;

use thiserror::Error;

/// Why a seated (or would-be) player may not act on a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    GameFinished,
    NotAPlayer,
    NotYourPiece,
    NotYourTurn,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Denial::GameFinished => "game is already over",
            Denial::NotAPlayer => "you are not playing in this game",
            Denial::NotYourPiece => "that piece is not yours",
            Denial::NotYourTurn => "not your turn",
        };
        f.write_str(reason)
    }
}

/// Errors surfaced at the boundary of the game core.
///
/// Illegal moves and full games are not errors: they come back as
/// `MoveOutcome::Illegal` and `SeatAssignment::Full`.
#[derive(Debug, Error)]
pub enum GameError {
    /// Square, move or player identifiers outside their valid domain.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("permission denied: {0}")]
    PermissionDenied(Denial),

    #[error("game not found: {0}")]
    NotFound(String),

    /// The persistence collaborator failed. Never retried by the core.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Persisted state that cannot be replayed into a legal game.
    #[error("corrupt game state: {0}")]
    CorruptState(String),
}

pub type Result<T, E = GameError> = std::result::Result<T, E>;
