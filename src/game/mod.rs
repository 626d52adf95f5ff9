//! Game-state and rating core: positions, the rules oracle, boards, game
//! sessions and Elo ratings. Nothing in here knows about HTTP or storage.

pub mod board;
pub mod position;
pub mod rating;
pub mod rules;
pub mod session;
pub mod types;

pub use board::{BoardState, ClaimKind, MoveResult};
pub use position::{FenError, Position, MAX_COUNTER, STARTING_FEN};
pub use rating::{PlayerRating, RatingChange, RatingEngine, DEFAULT_K_FACTOR, DEFAULT_RATING};
pub use rules::{ChessRules, DrawReason, OracleError, RulesOracle, TerminalStatus};
pub use session::{
    ClaimOutcome, GameId, GameResult, GameSession, MoveOutcome, Phase, PlayerId, ResultStatus,
    SeatAssignment, SeatPreference, Seats, SessionParts, Termination,
};
pub use types::{CastlingRights, Color, Move, Piece, PieceKind, Square};
