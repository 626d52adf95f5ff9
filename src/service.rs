//! Game lifecycle on top of the store.
//!
//! Every mutating call runs load → rebuild → mutate → save while holding
//! that game's lock, so calls on the same game are serialized and calls on
//! different games never wait on each other. Observers are told about a
//! change only after it has been saved.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{GameError, Result};
use crate::game::{
    BoardState, ClaimKind, ClaimOutcome, Color, GameId, GameResult, GameSession, Move,
    MoveOutcome, PlayerId, PlayerRating, Position, RatingChange, RatingEngine, RulesOracle,
    SeatAssignment, SeatPreference, Square,
};
use crate::models::{GameRecord, GameSnapshot};
use crate::store::GameStore;

/// Receives a game's snapshot after every committed change.
pub trait Notifier: Send + Sync {
    fn publish(&self, snapshot: &GameSnapshot) -> std::result::Result<(), String>;
}

/// Notifier for setups without observers.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn publish(&self, _snapshot: &GameSnapshot) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// The result of a mutating call plus the state it left behind.
#[derive(Debug, Clone)]
pub struct GameUpdate<T> {
    pub value: T,
    pub snapshot: GameSnapshot,
    pub rating_change: Option<RatingChange>,
}

pub struct GameService {
    store: Arc<dyn GameStore>,
    oracle: Arc<dyn RulesOracle>,
    ratings: RatingEngine,
    notifier: Arc<dyn Notifier>,
    locks: Mutex<HashMap<GameId, Arc<Mutex<()>>>>,
}

impl GameService {
    pub fn new(
        store: Arc<dyn GameStore>,
        oracle: Arc<dyn RulesOracle>,
        ratings: RatingEngine,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            oracle,
            ratings,
            notifier,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Open a new game and seat its creator.
    pub fn create_game(
        &self,
        player: PlayerId,
        preference: SeatPreference,
        starting_fen: Option<&str>,
    ) -> Result<GameUpdate<Color>> {
        let start = match starting_fen {
            Some(fen) => {
                let position: Position = fen
                    .parse()
                    .map_err(|e| GameError::MalformedInput(format!("invalid FEN: {e}")))?;
                // Make sure the rules library can play from here
                self.oracle
                    .legal_moves(&position)
                    .map_err(|e| GameError::MalformedInput(e.to_string()))?;
                position
            }
            None => Position::starting(),
        };

        let board = BoardState::from_position(self.oracle.clone(), start);
        // A game has to have something left to play
        let status = board.is_terminal()?;
        if status.is_terminal() {
            return Err(GameError::MalformedInput(format!(
                "starting position is already over: {status:?}"
            )));
        }
        let mut session = GameSession::new(board);
        let color = match session.assign_seat(player, preference)? {
            SeatAssignment::Assigned(color) => color,
            SeatAssignment::Full => {
                return Err(GameError::CorruptState(format!(
                    "new game {} reported full",
                    session.id()
                )))
            }
        };

        self.store.insert_game(&GameRecord::from_session(&session))?;
        info!("Created game {}", session.id());

        let snapshot = GameSnapshot::from(&session);
        self.notify(&snapshot);
        Ok(GameUpdate {
            value: color,
            snapshot,
            rating_change: None,
        })
    }

    pub fn join_game(
        &self,
        id: GameId,
        player: PlayerId,
        preference: SeatPreference,
    ) -> Result<GameUpdate<SeatAssignment>> {
        self.mutate(id, |session| session.assign_seat(player, preference))
    }

    pub fn submit_move(
        &self,
        id: GameId,
        player: &PlayerId,
        mv: Move,
    ) -> Result<GameUpdate<MoveOutcome>> {
        self.mutate(id, |session| session.submit_move(player, mv))
    }

    pub fn resign(&self, id: GameId, player: &PlayerId) -> Result<GameUpdate<GameResult>> {
        self.mutate(id, |session| session.resign(player))
    }

    pub fn claim_draw(
        &self,
        id: GameId,
        player: &PlayerId,
        claim: ClaimKind,
    ) -> Result<GameUpdate<ClaimOutcome>> {
        self.mutate(id, |session| session.claim_draw(player, claim))
    }

    pub fn abandon(&self, id: GameId, player: &PlayerId) -> Result<GameUpdate<GameResult>> {
        self.mutate(id, |session| session.abandon(player))
    }

    pub fn game(&self, id: GameId) -> Result<GameSnapshot> {
        let session = self.load(id)?;
        Ok(GameSnapshot::from(&session))
    }

    /// Legal moves for the piece on `square`.
    pub fn legal_moves(&self, id: GameId, square: Square) -> Result<Vec<Move>> {
        let session = self.load(id)?;
        session.board().legal_moves_from(square)
    }

    /// Games `player` is seated in that have not finished, newest first.
    pub fn unfinished_games(&self, player: &PlayerId) -> Result<Vec<GameSnapshot>> {
        self.store
            .games_for_player(player)?
            .into_iter()
            .filter(|record| !record.result.is_terminal())
            .map(|record| {
                let session = record.into_session(self.oracle.clone())?;
                Ok(GameSnapshot::from(&session))
            })
            .collect()
    }

    pub fn rating(&self, player: &PlayerId) -> Result<PlayerRating> {
        self.store.load_rating(player)
    }

    fn load(&self, id: GameId) -> Result<GameSession> {
        let record = self
            .store
            .load_game(id)?
            .ok_or_else(|| GameError::NotFound(id.to_string()))?;
        record.into_session(self.oracle.clone())
    }

    fn lock_for(&self, id: GameId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id).or_default().clone()
    }

    /// Drop the lock entry of a game that is gone or can no longer change.
    fn forget_lock(&self, id: GameId) {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn mutate<T>(
        &self,
        id: GameId,
        op: impl FnOnce(&mut GameSession) -> Result<T>,
    ) -> Result<GameUpdate<T>> {
        let lock = self.lock_for(id);
        // State is reloaded from the store, so a poisoned lock is still usable
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("Locked game {}", id);

        let mut session = match self.load(id) {
            Ok(session) => session,
            Err(e) => {
                if matches!(e, GameError::NotFound(_)) {
                    self.forget_lock(id);
                }
                return Err(e);
            }
        };
        let before = GameRecord::from_session(&session);
        if before.result.is_terminal() {
            // Finished games never change again, so their lock can go
            self.forget_lock(id);
        }
        let value = op(&mut session)?;
        let after = GameRecord::from_session(&session);

        let changed = before != after;
        let finished_now = !before.result.is_terminal() && after.result.is_terminal();

        let mut rating_change = None;
        if changed {
            let mut updated = Vec::new();
            if finished_now {
                if let Some((change, ratings)) = self.rate(&session)? {
                    rating_change = Some(change);
                    updated = ratings;
                }
            }
            self.store.save_game(&after, &updated)?;
        }
        if finished_now {
            self.forget_lock(id);
        }

        // Published under the game lock so observers see commits in order
        let snapshot = GameSnapshot::from(&session);
        if changed {
            self.notify(&snapshot);
        }
        drop(guard);
        debug!("Released game {}", id);

        Ok(GameUpdate {
            value,
            snapshot,
            rating_change,
        })
    }

    fn rate(
        &self,
        session: &GameSession,
    ) -> Result<Option<(RatingChange, Vec<(PlayerId, PlayerRating)>)>> {
        if !session.is_rated() {
            info!("Game {} is not rated", session.id());
            return Ok(None);
        }
        let seats = session.seats();
        let (Some(white_id), Some(black_id)) =
            (seats.player(Color::White), seats.player(Color::Black))
        else {
            return Ok(None);
        };

        let mut white = self.store.load_rating(white_id)?;
        let mut black = self.store.load_rating(black_id)?;
        Ok(self
            .ratings
            .update_from_result(session, &mut white, &mut black)
            .map(|change| {
                (
                    change,
                    vec![(white_id.clone(), white), (black_id.clone(), black)],
                )
            }))
    }

    fn notify(&self, snapshot: &GameSnapshot) {
        if let Err(e) = self.notifier.publish(snapshot) {
            warn!("Failed to notify observers of game {}: {}", snapshot.id, e);
        }
    }
}
