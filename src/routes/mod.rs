use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use log::warn;

use crate::error::GameError;
use crate::game::{ClaimOutcome, GameId, Move, MoveOutcome, PlayerId, SeatAssignment, Square};
use crate::models::{
    AppState, AvailableMovesResponse, ClaimRequest, CreateGameRequest, ErrorResponse,
    GameUpdateResponse, JoinRequest, MoveRequest, MovesQuery, PlayerRequest, SeatResponse,
};
use crate::service::GameUpdate;

impl ResponseError for GameError {
    fn status_code(&self) -> StatusCode {
        match self {
            GameError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            GameError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GameError::CorruptState(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            detail: self.to_string(),
        })
    }
}

type HandlerResult = Result<HttpResponse, GameError>;

fn detail(status: StatusCode, detail: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        detail: detail.into(),
    })
}

fn updated<T>(update: GameUpdate<T>) -> HttpResponse {
    HttpResponse::Ok().json(GameUpdateResponse {
        game: update.snapshot,
        rating_change: update.rating_change,
    })
}

/// HTTP handler for the index page
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Chess Arena")
}

pub async fn create_game(
    state: web::Data<AppState>,
    body: web::Json<CreateGameRequest>,
) -> HandlerResult {
    let request = body.into_inner();
    let created = state.service.create_game(
        request.player_id,
        request.preferred_color,
        request.fen.as_deref(),
    )?;
    Ok(HttpResponse::Created().json(SeatResponse {
        color: created.value,
        game: created.snapshot,
    }))
}

pub async fn get_game(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    let id: GameId = path.parse()?;
    Ok(HttpResponse::Ok().json(state.service.game(id)?))
}

pub async fn join_game(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<JoinRequest>,
) -> HandlerResult {
    let id: GameId = path.parse()?;
    let request = body.into_inner();
    let update = state
        .service
        .join_game(id, request.player_id, request.preferred_color)?;
    Ok(match update.value {
        SeatAssignment::Assigned(color) => HttpResponse::Ok().json(SeatResponse {
            color,
            game: update.snapshot,
        }),
        SeatAssignment::Full => {
            warn!("Cannot join game {}: game is full", id);
            detail(StatusCode::CONFLICT, "Game is full.")
        }
    })
}

pub async fn make_move(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<MoveRequest>,
) -> HandlerResult {
    let id: GameId = path.parse()?;
    let mv: Move = body.uci().parse()?;
    let update = state.service.submit_move(id, &body.player_id, mv)?;
    Ok(match update.value {
        MoveOutcome::Illegal => {
            warn!("Rejected move {} in game {}", mv, id);
            detail(StatusCode::BAD_REQUEST, format!("{mv} is not a valid move."))
        }
        MoveOutcome::Applied(_) | MoveOutcome::AppliedAndFinished(..) => updated(update),
    })
}

pub async fn resign(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<PlayerRequest>,
) -> HandlerResult {
    let id: GameId = path.parse()?;
    Ok(updated(state.service.resign(id, &body.player_id)?))
}

pub async fn claim_draw(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ClaimRequest>,
) -> HandlerResult {
    let id: GameId = path.parse()?;
    let update = state.service.claim_draw(id, &body.player_id, body.claim)?;
    Ok(match update.value {
        ClaimOutcome::Accepted(_) => updated(update),
        ClaimOutcome::Rejected => {
            warn!("Rejected {:?} claim in game {}", body.claim, id);
            detail(StatusCode::BAD_REQUEST, "The draw claim does not hold.")
        }
    })
}

pub async fn abandon(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<PlayerRequest>,
) -> HandlerResult {
    let id: GameId = path.parse()?;
    Ok(updated(state.service.abandon(id, &body.player_id)?))
}

pub async fn available_moves(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<MovesQuery>,
) -> HandlerResult {
    let id: GameId = path.parse()?;
    let square: Square = query.square.parse()?;
    let moves = state.service.legal_moves(id, square)?;
    Ok(HttpResponse::Ok().json(AvailableMovesResponse {
        square: square.to_string(),
        available_moves: moves.iter().map(Move::to_string).collect(),
    }))
}

pub async fn unfinished_games(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HandlerResult {
    let player = PlayerId::new(path.into_inner())?;
    Ok(HttpResponse::Ok().json(state.service.unfinished_games(&player)?))
}

pub async fn player_rating(state: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    let player = PlayerId::new(path.into_inner())?;
    Ok(HttpResponse::Ok().json(state.service.rating(&player)?))
}

/// Configure the HTTP routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/games").route(web::post().to(create_game)))
        .service(web::resource("/games/{id}").route(web::get().to(get_game)))
        .service(web::resource("/games/{id}/join").route(web::put().to(join_game)))
        .service(web::resource("/games/{id}/move").route(web::put().to(make_move)))
        .service(web::resource("/games/{id}/resign").route(web::put().to(resign)))
        .service(web::resource("/games/{id}/claim").route(web::put().to(claim_draw)))
        .service(web::resource("/games/{id}/abandon").route(web::put().to(abandon)))
        .service(web::resource("/games/{id}/moves").route(web::get().to(available_moves)))
        .service(web::resource("/players/{id}/games").route(web::get().to(unfinished_games)))
        .service(web::resource("/players/{id}/rating").route(web::get().to(player_rating)))
        .service(web::resource("/ws/{id}").route(web::get().to(crate::websocket::ws_index)));
}
