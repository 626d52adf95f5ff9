use actix::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::{
    ClaimKind, Color, GameId, GameResult, GameSession, Move, Phase, PlayerId, RatingChange,
    ResultStatus, SeatPreference,
};

/// Body of `POST /games`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateGameRequest {
    pub player_id: PlayerId,
    #[serde(default = "random_seat")]
    pub preferred_color: SeatPreference,
    /// Start from this position instead of the standard one.
    #[serde(default)]
    pub fen: Option<String>,
}

fn random_seat() -> SeatPreference {
    SeatPreference::Random
}

/// Body of `PUT /games/{id}/join`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JoinRequest {
    pub player_id: PlayerId,
    #[serde(default)]
    pub preferred_color: SeatPreference,
}

/// Body of `PUT /games/{id}/move`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MoveRequest {
    pub player_id: PlayerId,
    pub from_square: String,
    pub to_square: String,
    #[serde(default)]
    pub promote_to: Option<String>,
}

impl MoveRequest {
    /// UCI text for the requested move, e.g. `e7e8q`.
    pub fn uci(&self) -> String {
        let mut uci = format!("{}{}", self.from_square.trim(), self.to_square.trim());
        if let Some(piece) = &self.promote_to {
            uci.push_str(&piece.trim().to_lowercase());
        }
        uci
    }
}

/// Body of the resign and abandon endpoints
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlayerRequest {
    pub player_id: PlayerId,
}

/// Body of `PUT /games/{id}/claim`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClaimRequest {
    pub player_id: PlayerId,
    pub claim: ClaimKind,
}

/// Query of `GET /games/{id}/moves`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MovesQuery {
    pub square: String,
}

/// Everything an observer needs to draw a game.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GameSnapshot {
    pub id: GameId,
    pub white_player: Option<PlayerId>,
    pub black_player: Option<PlayerId>,
    pub fen: String,
    pub moves: Vec<Move>,
    pub side_to_move: Color,
    pub status: String,
    pub result: GameResult,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&GameSession> for GameSnapshot {
    fn from(session: &GameSession) -> Self {
        let board = session.board();
        Self {
            id: session.id(),
            white_player: session.seats().player(Color::White).cloned(),
            black_player: session.seats().player(Color::Black).cloned(),
            fen: board.fen(),
            moves: board.history().to_vec(),
            side_to_move: board.side_to_move(),
            status: game_status(session),
            result: session.result(),
            created_at: session.created_at(),
            started_at: session.started_at(),
            finished_at: session.finished_at(),
        }
    }
}

/// Get the game status as a string
pub fn game_status(session: &GameSession) -> String {
    match session.result().status {
        ResultStatus::WhiteWins => "white_wins".to_string(),
        ResultStatus::BlackWins => "black_wins".to_string(),
        ResultStatus::Draw => "draw".to_string(),
        ResultStatus::InProgress => match (session.phase(), session.board().side_to_move()) {
            (Phase::Open, _) => "waiting".to_string(),
            (_, Color::White) => "white_turn".to_string(),
            (_, Color::Black) => "black_turn".to_string(),
        },
    }
}

/// Response to create and join
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SeatResponse {
    pub color: Color,
    pub game: GameSnapshot,
}

/// Response to moves, resignations, claims and abandonment
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GameUpdateResponse {
    pub game: GameSnapshot,
    pub rating_change: Option<RatingChange>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AvailableMovesResponse {
    pub square: String,
    pub available_moves: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Last move information
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LastMove {
    pub from: String,
    pub to: String,
}

impl From<&Move> for LastMove {
    fn from(mv: &Move) -> Self {
        Self {
            from: mv.from.to_string(),
            to: mv.to.to_string(),
        }
    }
}

/// Message pushed to websocket subscribers
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerMessage {
    pub message_type: String,
    pub game_id: Option<String>,
    pub game: Option<GameSnapshot>,
    pub last_move: Option<LastMove>,
    pub error: Option<String>,
}

impl ServerMessage {
    pub fn game_update(snapshot: &GameSnapshot) -> Self {
        Self {
            message_type: "game_update".to_string(),
            game_id: Some(snapshot.id.to_string()),
            game: Some(snapshot.clone()),
            last_move: snapshot.moves.last().map(LastMove::from),
            error: None,
        }
    }

    pub fn error(game_id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            message_type: "error".to_string(),
            game_id,
            game: None,
            last_move: None,
            error: Some(error.into()),
        }
    }
}

/// Message type for WebSocket communication
#[derive(Message)]
#[rtype(result = "()")]
pub struct GameSocketMessage(pub String);
