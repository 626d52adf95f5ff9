use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::board::{BoardState, ClaimKind, MoveResult};
use super::rules::TerminalStatus;
use super::types::{Color, Move};
use crate::error::{Denial, GameError, Result};

/// Unique identifier for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(Uuid);

impl GameId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GameId {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| GameError::MalformedInput(format!("invalid game id: {s:?}")))
    }
}

/// Opaque player identity handed to us by whoever authenticated the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(String);

impl PlayerId {
    pub const MAX_LEN: usize = 150;

    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.len() > Self::MAX_LEN || id.chars().any(char::is_control) {
            return Err(GameError::MalformedInput(format!("invalid player id: {id:?}")));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlayerId {
    type Error = GameError;

    fn try_from(id: String) -> Result<Self> {
        Self::new(id)
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatPreference {
    #[default]
    White,
    Black,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatAssignment {
    Assigned(Color),
    Full,
}

/// Who sits where. Seats only ever fill up; nobody is moved once seated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seats {
    Empty,
    One { color: Color, player: PlayerId },
    Full { white: PlayerId, black: PlayerId },
}

impl Seats {
    pub fn from_players(white: Option<PlayerId>, black: Option<PlayerId>) -> Self {
        match (white, black) {
            (None, None) => Seats::Empty,
            (Some(player), None) => Seats::One {
                color: Color::White,
                player,
            },
            (None, Some(player)) => Seats::One {
                color: Color::Black,
                player,
            },
            (Some(white), Some(black)) => Seats::Full { white, black },
        }
    }

    pub fn player(&self, color: Color) -> Option<&PlayerId> {
        match (self, color) {
            (Seats::One { color: seated, player }, c) if *seated == c => Some(player),
            (Seats::Full { white, .. }, Color::White) => Some(white),
            (Seats::Full { black, .. }, Color::Black) => Some(black),
            _ => None,
        }
    }

    pub fn holds(&self, player: &PlayerId, color: Color) -> bool {
        self.player(color) == Some(player)
    }

    pub fn is_seated(&self, player: &PlayerId) -> bool {
        self.holds(player, Color::White) || self.holds(player, Color::Black)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Zero or one seat filled.
    Open,
    /// Both seats filled, game in progress.
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    InProgress,
    WhiteWins,
    BlackWins,
    Draw,
}

impl ResultStatus {
    pub fn win_for(color: Color) -> Self {
        match color {
            Color::White => ResultStatus::WhiteWins,
            Color::Black => ResultStatus::BlackWins,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Normal,
    Abandoned,
    RulesInfraction,
    TimeForfeit,
    Unterminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub status: ResultStatus,
    pub termination: Termination,
}

impl GameResult {
    pub fn in_progress() -> Self {
        Self {
            status: ResultStatus::InProgress,
            termination: Termination::Unterminated,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != ResultStatus::InProgress
    }

    fn from_terminal(status: TerminalStatus) -> Option<Self> {
        let status = match status {
            TerminalStatus::None => return None,
            TerminalStatus::Checkmate(winner) => ResultStatus::win_for(winner),
            TerminalStatus::Stalemate | TerminalStatus::DrawOther(_) => ResultStatus::Draw,
        };
        Some(Self {
            status,
            termination: Termination::Normal,
        })
    }
}

impl Default for GameResult {
    fn default() -> Self {
        Self::in_progress()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Illegal,
    Applied(Move),
    AppliedAndFinished(Move, GameResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Accepted(GameResult),
    Rejected,
}

/// One game: two seats, the board, and the result.
#[derive(Debug, Clone)]
pub struct GameSession {
    id: GameId,
    seats: Seats,
    board: BoardState,
    result: GameResult,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// Stored fields a session is rebuilt from.
pub struct SessionParts {
    pub id: GameId,
    pub seats: Seats,
    pub board: BoardState,
    pub result: GameResult,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl GameSession {
    pub fn new(board: BoardState) -> Self {
        Self {
            id: GameId::new(),
            seats: Seats::Empty,
            board,
            result: GameResult::in_progress(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn from_parts(parts: SessionParts) -> Self {
        Self {
            id: parts.id,
            seats: parts.seats,
            board: parts.board,
            result: parts.result,
            created_at: parts.created_at,
            started_at: parts.started_at,
            finished_at: parts.finished_at,
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn seats(&self) -> &Seats {
        &self.seats
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn result(&self) -> GameResult {
        self.result
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn phase(&self) -> Phase {
        if self.result.is_terminal() {
            Phase::Finished
        } else if matches!(self.seats, Seats::Full { .. }) {
            Phase::Active
        } else {
            Phase::Open
        }
    }

    /// Finished, both seats filled by two different players.
    pub fn is_rated(&self) -> bool {
        match &self.seats {
            Seats::Full { white, black } => self.result.is_terminal() && white != black,
            _ => false,
        }
    }

    /// Seat `player`. The first player chooses (or lets chance choose); the
    /// second takes whatever is left. The same player may take both seats.
    pub fn assign_seat(
        &mut self,
        player: PlayerId,
        preference: SeatPreference,
    ) -> Result<SeatAssignment> {
        // A full game stays full whatever its phase
        if matches!(self.seats, Seats::Full { .. }) {
            info!("Cannot seat {} in game {}: game is full", player, self.id);
            return Ok(SeatAssignment::Full);
        }
        if self.phase() == Phase::Finished {
            return Err(GameError::PermissionDenied(Denial::GameFinished));
        }

        let seats = std::mem::replace(&mut self.seats, Seats::Empty);
        let (seats, assignment) = match seats {
            Seats::Full { .. } => (seats, SeatAssignment::Full),
            Seats::One {
                color,
                player: seated,
            } => {
                let color_taken = color.opposite();
                let seats = match color_taken {
                    Color::White => Seats::Full {
                        white: player.clone(),
                        black: seated,
                    },
                    Color::Black => Seats::Full {
                        white: seated,
                        black: player.clone(),
                    },
                };
                (seats, SeatAssignment::Assigned(color_taken))
            }
            Seats::Empty => {
                let color = match preference {
                    SeatPreference::White => Color::White,
                    SeatPreference::Black => Color::Black,
                    SeatPreference::Random => {
                        if rand::random::<bool>() {
                            Color::Black
                        } else {
                            Color::White
                        }
                    }
                };
                (
                    Seats::One {
                        color,
                        player: player.clone(),
                    },
                    SeatAssignment::Assigned(color),
                )
            }
        };
        self.seats = seats;

        if let SeatAssignment::Assigned(color) = assignment {
            info!("Player {} seated as {} in game {}", player, color, self.id);
            if self.phase() == Phase::Active && self.started_at.is_none() {
                self.started_at = Some(Utc::now());
            }
        }
        Ok(assignment)
    }

    /// Move a piece on behalf of `player`.
    pub fn submit_move(&mut self, player: &PlayerId, mv: Move) -> Result<MoveOutcome> {
        if self.phase() == Phase::Finished {
            return Err(GameError::PermissionDenied(Denial::GameFinished));
        }
        if !self.seats.is_seated(player) {
            return Err(GameError::PermissionDenied(Denial::NotAPlayer));
        }

        // No piece to own, so nothing to deny
        let Some(piece) = self.board.occupant(mv.from) else {
            return Ok(MoveOutcome::Illegal);
        };
        if !self.seats.holds(player, piece.color) {
            return Err(GameError::PermissionDenied(Denial::NotYourPiece));
        }
        if piece.color != self.board.side_to_move() {
            return Err(GameError::PermissionDenied(Denial::NotYourTurn));
        }

        let mv = match self.board.apply_move(mv)? {
            MoveResult::Accepted(mv) => mv,
            MoveResult::Rejected => {
                warn!("Illegal move {} in game {}", mv, self.id);
                return Ok(MoveOutcome::Illegal);
            }
        };
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }

        match GameResult::from_terminal(self.board.is_terminal()?) {
            Some(result) => {
                self.finish(result);
                Ok(MoveOutcome::AppliedAndFinished(mv, result))
            }
            None => Ok(MoveOutcome::Applied(mv)),
        }
    }

    /// `player` concedes. A player holding both seats resigns for the side
    /// to move.
    pub fn resign(&mut self, player: &PlayerId) -> Result<GameResult> {
        let color = self.acting_color(player)?;
        let result = GameResult {
            status: ResultStatus::win_for(color.opposite()),
            termination: Termination::Normal,
        };
        self.finish(result);
        Ok(result)
    }

    pub fn claim_draw(&mut self, player: &PlayerId, claim: ClaimKind) -> Result<ClaimOutcome> {
        self.acting_color(player)?;
        if !self.board.can_claim(claim) {
            info!("Rejected {:?} claim by {} in game {}", claim, player, self.id);
            return Ok(ClaimOutcome::Rejected);
        }
        let result = GameResult {
            status: ResultStatus::Draw,
            termination: Termination::Normal,
        };
        self.finish(result);
        Ok(ClaimOutcome::Accepted(result))
    }

    /// `player` walks away. With an opponent seated they lose; otherwise the
    /// game is closed as a draw.
    pub fn abandon(&mut self, player: &PlayerId) -> Result<GameResult> {
        let color = self.acting_color(player)?;
        let status = match self.phase() {
            Phase::Active => ResultStatus::win_for(color.opposite()),
            _ => ResultStatus::Draw,
        };
        let result = GameResult {
            status,
            termination: Termination::Abandoned,
        };
        self.finish(result);
        Ok(result)
    }

    /// The color `player` acts for in an unfinished game.
    fn acting_color(&self, player: &PlayerId) -> Result<Color> {
        if self.phase() == Phase::Finished {
            return Err(GameError::PermissionDenied(Denial::GameFinished));
        }
        let to_move = self.board.side_to_move();
        if self.seats.holds(player, to_move) {
            Ok(to_move)
        } else if self.seats.holds(player, to_move.opposite()) {
            Ok(to_move.opposite())
        } else {
            Err(GameError::PermissionDenied(Denial::NotAPlayer))
        }
    }

    fn finish(&mut self, result: GameResult) {
        info!(
            "Game {} finished: {:?} ({:?})",
            self.id, result.status, result.termination
        );
        self.result = result;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rules::ChessRules;
    use std::sync::Arc;

    fn player(id: &str) -> PlayerId {
        PlayerId::new(id).unwrap()
    }

    fn mv(uci: &str) -> Move {
        uci.parse().unwrap()
    }

    fn active_game() -> GameSession {
        let mut session = GameSession::new(BoardState::new(Arc::new(ChessRules)));
        session
            .assign_seat(player("alice"), SeatPreference::White)
            .unwrap();
        session
            .assign_seat(player("bob"), SeatPreference::White)
            .unwrap();
        session
    }

    #[test]
    fn test_seat_assignment_flow() {
        let mut session = GameSession::new(BoardState::new(Arc::new(ChessRules)));
        assert_eq!(session.phase(), Phase::Open);

        let first = session
            .assign_seat(player("alice"), SeatPreference::Black)
            .unwrap();
        assert_eq!(first, SeatAssignment::Assigned(Color::Black));
        assert_eq!(session.phase(), Phase::Open);
        assert!(session.started_at().is_none());

        // Preference is ignored once a seat is taken
        let second = session
            .assign_seat(player("bob"), SeatPreference::Black)
            .unwrap();
        assert_eq!(second, SeatAssignment::Assigned(Color::White));
        assert_eq!(session.phase(), Phase::Active);
        assert!(session.started_at().is_some());
    }

    #[test]
    fn test_full_game_rejects_seats_without_mutation() {
        let mut session = active_game();
        let seats = session.seats().clone();
        for _ in 0..3 {
            let outcome = session
                .assign_seat(player("carol"), SeatPreference::Random)
                .unwrap();
            assert_eq!(outcome, SeatAssignment::Full);
            assert_eq!(session.seats(), &seats);
        }
    }

    #[test]
    fn test_random_preference_picks_a_color() {
        let mut session = GameSession::new(BoardState::new(Arc::new(ChessRules)));
        let outcome = session
            .assign_seat(player("alice"), SeatPreference::Random)
            .unwrap();
        let SeatAssignment::Assigned(color) = outcome else {
            panic!("expected a seat");
        };
        assert_eq!(session.seats().player(color), Some(&player("alice")));
        assert_eq!(session.seats().player(color.opposite()), None);
    }

    #[test]
    fn test_self_play_takes_both_seats() {
        let mut session = GameSession::new(BoardState::new(Arc::new(ChessRules)));
        let me = player("solo");
        session.assign_seat(me.clone(), SeatPreference::White).unwrap();
        session.assign_seat(me.clone(), SeatPreference::White).unwrap();
        assert_eq!(session.phase(), Phase::Active);

        assert_eq!(session.submit_move(&me, mv("e2e4")).unwrap(), MoveOutcome::Applied(mv("e2e4")));
        assert_eq!(session.submit_move(&me, mv("e7e5")).unwrap(), MoveOutcome::Applied(mv("e7e5")));
    }

    #[test]
    fn test_fools_mate_finishes_game() {
        let mut session = active_game();
        let (white, black) = (player("alice"), player("bob"));
        session.submit_move(&white, mv("f2f3")).unwrap();
        session.submit_move(&black, mv("e7e5")).unwrap();
        session.submit_move(&white, mv("g2g4")).unwrap();
        let outcome = session.submit_move(&black, mv("d8h4")).unwrap();

        let expected = GameResult {
            status: ResultStatus::BlackWins,
            termination: Termination::Normal,
        };
        assert_eq!(outcome, MoveOutcome::AppliedAndFinished(mv("d8h4"), expected));
        assert_eq!(session.phase(), Phase::Finished);
        assert!(session.finished_at().is_some());
        assert!(session.is_rated());

        let late = session.submit_move(&white, mv("e2e4"));
        assert!(matches!(
            late,
            Err(GameError::PermissionDenied(Denial::GameFinished))
        ));
    }

    #[test]
    fn test_moving_opponent_piece_is_denied() {
        let mut session = active_game();
        let before = session.board().fen();
        let result = session.submit_move(&player("alice"), mv("e7e5"));
        assert!(matches!(
            result,
            Err(GameError::PermissionDenied(Denial::NotYourPiece))
        ));
        assert_eq!(session.board().fen(), before);
    }

    #[test]
    fn test_moving_out_of_turn_is_denied() {
        let mut session = active_game();
        session.submit_move(&player("alice"), mv("e2e4")).unwrap();
        let result = session.submit_move(&player("alice"), mv("d2d4"));
        assert!(matches!(
            result,
            Err(GameError::PermissionDenied(Denial::NotYourTurn))
        ));
    }

    #[test]
    fn test_strangers_cannot_move() {
        let mut session = active_game();
        let result = session.submit_move(&player("mallory"), mv("e2e4"));
        assert!(matches!(
            result,
            Err(GameError::PermissionDenied(Denial::NotAPlayer))
        ));
    }

    #[test]
    fn test_illegal_and_empty_square_moves() {
        let mut session = active_game();
        let white = player("alice");
        assert_eq!(session.submit_move(&white, mv("e2e6")).unwrap(), MoveOutcome::Illegal);
        assert_eq!(session.submit_move(&white, mv("e4e5")).unwrap(), MoveOutcome::Illegal);
        assert!(session.board().history().is_empty());
        assert_eq!(session.board().position().halfmove_clock, 0);
    }

    #[test]
    fn test_first_move_starts_open_game() {
        let mut session = GameSession::new(BoardState::new(Arc::new(ChessRules)));
        let white = player("alice");
        session.assign_seat(white.clone(), SeatPreference::White).unwrap();
        session.submit_move(&white, mv("e2e4")).unwrap();
        assert_eq!(session.phase(), Phase::Open);
        assert!(session.started_at().is_some());
    }

    #[test]
    fn test_resign() {
        let mut session = active_game();
        let result = session.resign(&player("bob")).unwrap();
        assert_eq!(result.status, ResultStatus::WhiteWins);
        assert_eq!(result.termination, Termination::Normal);
        assert!(matches!(
            session.resign(&player("alice")),
            Err(GameError::PermissionDenied(Denial::GameFinished))
        ));
        assert_eq!(
            session.assign_seat(player("carol"), SeatPreference::White).unwrap(),
            SeatAssignment::Full
        );
    }

    #[test]
    fn test_claim_draw() {
        let mut session = active_game();
        let (white, black) = (player("alice"), player("bob"));
        assert_eq!(
            session.claim_draw(&white, ClaimKind::ThreefoldRepetition).unwrap(),
            ClaimOutcome::Rejected
        );
        for _ in 0..2 {
            session.submit_move(&white, mv("g1f3")).unwrap();
            session.submit_move(&black, mv("g8f6")).unwrap();
            session.submit_move(&white, mv("f3g1")).unwrap();
            session.submit_move(&black, mv("f6g8")).unwrap();
        }
        let outcome = session
            .claim_draw(&black, ClaimKind::ThreefoldRepetition)
            .unwrap();
        assert!(matches!(outcome, ClaimOutcome::Accepted(r) if r.status == ResultStatus::Draw));
        assert_eq!(session.phase(), Phase::Finished);
    }

    #[test]
    fn test_abandon() {
        let mut session = active_game();
        let result = session.abandon(&player("alice")).unwrap();
        assert_eq!(result.status, ResultStatus::BlackWins);
        assert_eq!(result.termination, Termination::Abandoned);
        assert!(session.is_rated());

        let mut open = GameSession::new(BoardState::new(Arc::new(ChessRules)));
        open.assign_seat(player("alice"), SeatPreference::White).unwrap();
        let result = open.abandon(&player("alice")).unwrap();
        assert_eq!(result.status, ResultStatus::Draw);
        assert!(!open.is_rated());
        assert!(matches!(
            open.assign_seat(player("bob"), SeatPreference::White),
            Err(GameError::PermissionDenied(Denial::GameFinished))
        ));
    }

    #[test]
    fn test_player_id_validation() {
        assert!(PlayerId::new("").is_err());
        assert!(PlayerId::new("a\nb").is_err());
        assert!(PlayerId::new("x".repeat(151)).is_err());
        assert_eq!(PlayerId::new("alice").unwrap().as_str(), "alice");
    }
}
