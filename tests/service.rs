use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use chess_arena::error::{Denial, GameError, Result};
use chess_arena::game::{
    ChessRules, ClaimKind, ClaimOutcome, Color, GameId, Move, MoveOutcome, PlayerId,
    PlayerRating, RatingEngine, ResultStatus, SeatAssignment, SeatPreference, Termination,
};
use chess_arena::models::{GameRecord, GameSnapshot};
use chess_arena::service::{GameService, Notifier};
use chess_arena::store::{GameStore, MemoryStore};

/// Memory store whose writes can be switched off.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    down: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(GameError::StoreUnavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

impl GameStore for FlakyStore {
    fn insert_game(&self, record: &GameRecord) -> Result<()> {
        self.check()?;
        self.inner.insert_game(record)
    }

    fn load_game(&self, id: GameId) -> Result<Option<GameRecord>> {
        self.inner.load_game(id)
    }

    fn save_game(&self, record: &GameRecord, ratings: &[(PlayerId, PlayerRating)]) -> Result<()> {
        self.check()?;
        self.inner.save_game(record, ratings)
    }

    fn games_for_player(&self, player: &PlayerId) -> Result<Vec<GameRecord>> {
        self.inner.games_for_player(player)
    }

    fn load_rating(&self, player: &PlayerId) -> Result<PlayerRating> {
        self.inner.load_rating(player)
    }
}

/// Records every published snapshot, or fails every publish.
#[derive(Default)]
struct RecordingNotifier {
    published: Mutex<Vec<GameSnapshot>>,
    fail: bool,
}

impl Notifier for RecordingNotifier {
    fn publish(&self, snapshot: &GameSnapshot) -> std::result::Result<(), String> {
        if self.fail {
            return Err("socket closed".to_string());
        }
        self.published.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

impl RecordingNotifier {
    fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

fn player(id: &str) -> PlayerId {
    PlayerId::new(id).unwrap()
}

fn mv(uci: &str) -> Move {
    uci.parse().unwrap()
}

fn setup(store: Arc<dyn GameStore>, notifier: Arc<RecordingNotifier>) -> GameService {
    GameService::new(store, Arc::new(ChessRules), RatingEngine::default(), notifier)
}

/// alice plays white, bob plays black.
fn start_game(service: &GameService) -> GameId {
    let id = service
        .create_game(player("alice"), SeatPreference::White, None)
        .unwrap()
        .snapshot
        .id;
    let joined = service
        .join_game(id, player("bob"), SeatPreference::White)
        .unwrap();
    assert_eq!(joined.value, SeatAssignment::Assigned(Color::Black));
    id
}

#[test]
fn test_fools_mate_rates_both_players() {
    let notifier = Arc::new(RecordingNotifier::default());
    let service = setup(Arc::new(MemoryStore::new()), notifier.clone());
    let id = start_game(&service);

    let (alice, bob) = (player("alice"), player("bob"));
    for (who, uci) in [(&alice, "f2f3"), (&bob, "e7e5"), (&alice, "g2g4")] {
        let update = service.submit_move(id, who, mv(uci)).unwrap();
        assert_eq!(update.value, MoveOutcome::Applied(mv(uci)));
        assert!(update.rating_change.is_none());
    }

    let update = service.submit_move(id, &bob, mv("d8h4")).unwrap();
    let MoveOutcome::AppliedAndFinished(_, result) = update.value else {
        panic!("expected checkmate, got {:?}", update.value);
    };
    assert_eq!(result.status, ResultStatus::BlackWins);
    assert_eq!(result.termination, Termination::Normal);
    assert_eq!(update.snapshot.status, "black_wins");

    let change = update.rating_change.unwrap();
    assert_eq!((change.white_before, change.white_after), (1200, 1184));
    assert_eq!((change.black_before, change.black_after), (1200, 1216));

    let bob_rating = service.rating(&bob).unwrap();
    assert_eq!(bob_rating.rating, 1216);
    assert_eq!(bob_rating.previous_rating, 1200);
    assert_eq!(bob_rating.wins, 1);
    assert_eq!(service.rating(&alice).unwrap().losses, 1);

    // create, join, four moves
    assert_eq!(notifier.count(), 6);

    // Finished games accept nothing more
    let err = service.submit_move(id, &alice, mv("e2e4")).unwrap_err();
    assert!(matches!(err, GameError::PermissionDenied(Denial::GameFinished)));
    assert!(service.unfinished_games(&alice).unwrap().is_empty());
}

#[test]
fn test_third_player_gets_full() {
    let notifier = Arc::new(RecordingNotifier::default());
    let service = setup(Arc::new(MemoryStore::new()), notifier.clone());
    let id = start_game(&service);
    let published = notifier.count();

    let update = service
        .join_game(id, player("carol"), SeatPreference::Black)
        .unwrap();
    assert_eq!(update.value, SeatAssignment::Full);
    // Nothing changed, so nobody is told
    assert_eq!(notifier.count(), published);
}

#[test]
fn test_rejected_claim_changes_nothing() {
    let notifier = Arc::new(RecordingNotifier::default());
    let service = setup(Arc::new(MemoryStore::new()), notifier.clone());
    let id = start_game(&service);

    let update = service
        .claim_draw(id, &player("alice"), ClaimKind::FiftyMoves)
        .unwrap();
    assert_eq!(update.value, ClaimOutcome::Rejected);
    assert!(!update.snapshot.result.is_terminal());
}

#[test]
fn test_threefold_claim_draws_and_rates() {
    let service = setup(
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
    );
    let id = start_game(&service);
    let (alice, bob) = (player("alice"), player("bob"));

    for _ in 0..2 {
        for (who, uci) in [
            (&alice, "g1f3"),
            (&bob, "g8f6"),
            (&alice, "f3g1"),
            (&bob, "f6g8"),
        ] {
            service.submit_move(id, who, mv(uci)).unwrap();
        }
    }

    let update = service
        .claim_draw(id, &alice, ClaimKind::ThreefoldRepetition)
        .unwrap();
    let ClaimOutcome::Accepted(result) = update.value else {
        panic!("claim should hold");
    };
    assert_eq!(result.status, ResultStatus::Draw);
    let change = update.rating_change.unwrap();
    assert_eq!(change.white_after, 1200);
    assert_eq!(service.rating(&bob).unwrap().draws, 1);
}

#[test]
fn test_store_failure_is_not_notified() {
    let store = Arc::new(FlakyStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let service = setup(store.clone(), notifier.clone());
    let id = start_game(&service);
    let published = notifier.count();

    store.down.store(true, Ordering::SeqCst);
    let err = service
        .submit_move(id, &player("alice"), mv("e2e4"))
        .unwrap_err();
    assert!(matches!(err, GameError::StoreUnavailable(_)));
    assert_eq!(notifier.count(), published);

    // The failed move left no trace
    store.down.store(false, Ordering::SeqCst);
    assert!(service.game(id).unwrap().moves.is_empty());
    assert!(matches!(
        service.submit_move(id, &player("alice"), mv("e2e4")).unwrap().value,
        MoveOutcome::Applied(_)
    ));
}

#[test]
fn test_notifier_failure_keeps_the_change() {
    let notifier = Arc::new(RecordingNotifier {
        fail: true,
        ..Default::default()
    });
    let service = setup(Arc::new(MemoryStore::new()), notifier);
    let id = start_game(&service);

    service
        .submit_move(id, &player("alice"), mv("d2d4"))
        .unwrap();
    assert_eq!(service.game(id).unwrap().moves, vec![mv("d2d4")]);
}

#[test]
fn test_corrupt_history_is_reported() {
    let store = Arc::new(MemoryStore::new());
    let service = setup(store.clone(), Arc::new(RecordingNotifier::default()));
    let id = start_game(&service);

    let mut record = store.load_game(id).unwrap().unwrap();
    record.moves = vec![mv("e2e4"), mv("e2e4")];
    store.save_game(&record, &[]).unwrap();

    assert!(matches!(service.game(id), Err(GameError::CorruptState(_))));
    assert!(matches!(
        service.submit_move(id, &player("bob"), mv("e7e5")),
        Err(GameError::CorruptState(_))
    ));
}

#[test]
fn test_same_game_moves_are_serialized() {
    let service = Arc::new(setup(
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
    ));
    let id = start_game(&service);

    let applied: usize = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                scope.spawn(move || {
                    match service.submit_move(id, &player("alice"), mv("e2e4")) {
                        Ok(update) => matches!(update.value, MoveOutcome::Applied(_)),
                        Err(_) => false,
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|applied| *applied)
            .count()
    });

    assert_eq!(applied, 1);
    assert_eq!(service.game(id).unwrap().moves.len(), 1);
}

#[test]
fn test_independent_games_run_in_parallel() {
    let service = Arc::new(setup(
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
    ));
    let ids: Vec<GameId> = (0..6).map(|_| start_game(&service)).collect();

    thread::scope(|scope| {
        for id in &ids {
            let service = service.clone();
            scope.spawn(move || {
                let (alice, bob) = (player("alice"), player("bob"));
                for (who, uci) in [(&alice, "e2e4"), (&bob, "e7e5"), (&alice, "g1f3")] {
                    service.submit_move(*id, who, mv(uci)).unwrap();
                }
            });
        }
    });

    for id in ids {
        let snapshot = service.game(id).unwrap();
        assert_eq!(snapshot.moves.len(), 3);
        assert_eq!(snapshot.status, "black_turn");
    }
    assert_eq!(service.unfinished_games(&player("bob")).unwrap().len(), 6);
}

#[test]
fn test_watchers_see_commits_in_order() {
    let notifier = Arc::new(RecordingNotifier::default());
    let service = Arc::new(setup(Arc::new(MemoryStore::new()), notifier.clone()));
    // Self-play, so any thread may move for either side
    let id = service
        .create_game(player("alice"), SeatPreference::White, None)
        .unwrap()
        .snapshot
        .id;
    service
        .join_game(id, player("alice"), SeatPreference::White)
        .unwrap();

    thread::scope(|scope| {
        for _ in 0..4 {
            let service = service.clone();
            scope.spawn(move || {
                for _ in 0..10 {
                    for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
                        let _ = service.submit_move(id, &player("alice"), mv(uci));
                    }
                }
            });
        }
    });

    let published = notifier.published.lock().unwrap();
    let lengths: Vec<usize> = published.iter().map(|s| s.moves.len()).collect();
    assert!(
        lengths.windows(2).all(|w| w[0] < w[1] || (w[0] == 0 && w[1] == 0)),
        "snapshots published out of order: {lengths:?}"
    );
    // Knights shuffling back and forth end in fivefold repetition
    assert_eq!(published.last().unwrap().result.status, ResultStatus::Draw);
}
