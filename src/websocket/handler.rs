use actix::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{info, warn};
use serde::Deserialize;
use uuid::Uuid;

use crate::game::GameId;
use crate::models::{AppState, GameSocketMessage, ServerMessage};

/// Message a watcher may send us
#[derive(Deserialize, Debug)]
struct ClientMessage {
    message_type: String,
}

/// WebSocket connection watching one game
pub struct GameSocket {
    pub id: String,
    pub game_id: GameId,
    pub app_state: web::Data<AppState>,
}

impl Actor for GameSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.app_state
            .broadcaster
            .subscribe(self.game_id, &self.id, ctx.address());
        info!("WebSocket connection started: {}", self.id);
        self.send_snapshot(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.app_state.broadcaster.unsubscribe(self.game_id, &self.id);
        info!("WebSocket connection closed: {}", self.id);
        Running::Stop
    }
}

impl Handler<GameSocketMessage> for GameSocket {
    type Result = ();

    fn handle(&mut self, msg: GameSocketMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

// WebSocket message handler
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for GameSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Text(text)) => {
                match serde_json::from_str::<ClientMessage>(text.as_ref()) {
                    Ok(client_msg) => self.handle_message(client_msg, ctx),
                    Err(e) => {
                        warn!("Error parsing client message: {}", e);
                        self.send(ctx, &ServerMessage::error(
                            Some(self.game_id.to_string()),
                            format!("Invalid message format: {e}"),
                        ));
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                warn!("Binary messages are not supported");
                self.send(ctx, &ServerMessage::error(None, "Binary messages are not supported"));
            }
            Ok(ws::Message::Close(reason)) => {
                info!("Connection closed: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            _ => {
                ctx.stop();
            }
        }
    }
}

impl GameSocket {
    fn handle_message(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match msg.message_type.as_str() {
            // Re-send the current state to everyone watching
            "update" => match self.app_state.service.game(self.game_id) {
                Ok(snapshot) => {
                    let message = ServerMessage::game_update(&snapshot);
                    if let Err(e) = self.app_state.broadcaster.broadcast(self.game_id, &message) {
                        warn!("Failed to broadcast game {}: {}", self.game_id, e);
                    }
                }
                Err(e) => {
                    self.send(ctx, &ServerMessage::error(Some(self.game_id.to_string()), e.to_string()));
                }
            },
            "sync" => self.send_snapshot(ctx),
            other => {
                warn!("Unknown message type: {}", other);
                self.send(ctx, &ServerMessage::error(
                    Some(self.game_id.to_string()),
                    format!("Unknown message type: {other}"),
                ));
            }
        }
    }

    fn send_snapshot(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let message = match self.app_state.service.game(self.game_id) {
            Ok(snapshot) => ServerMessage::game_update(&snapshot),
            Err(e) => ServerMessage::error(Some(self.game_id.to_string()), e.to_string()),
        };
        self.send(ctx, &message);
    }

    fn send(&self, ctx: &mut ws::WebsocketContext<Self>, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(text) => ctx.text(text),
            Err(e) => warn!("Error serializing message: {}", e),
        }
    }
}

/// WebSocket connection handler for `/ws/{id}`
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let game_id: GameId = path.into_inner().parse()?;
    // Refuse to watch games that do not exist
    app_state.service.game(game_id)?;

    let id = Uuid::new_v4().to_string();
    info!("New WebSocket connection {} for game {}", id, game_id);

    let socket = GameSocket {
        id,
        game_id,
        app_state: app_state.clone(),
    };
    ws::start(socket, &req, stream)
}
