//! Elo ratings.
//!
//! See <https://en.wikipedia.org/wiki/Elo_rating_system#Mathematical_details>.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use super::session::{GameSession, ResultStatus};

pub const DEFAULT_RATING: i32 = 1200;
pub const DEFAULT_K_FACTOR: i32 = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRating {
    pub rating: i32,
    /// Rating before the most recent update.
    pub previous_rating: i32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for PlayerRating {
    fn default() -> Self {
        Self {
            rating: DEFAULT_RATING,
            previous_rating: DEFAULT_RATING,
            wins: 0,
            losses: 0,
            draws: 0,
            updated_at: None,
        }
    }
}

impl PlayerRating {
    fn record(&mut self, score: f64, new_rating: i32, at: DateTime<Utc>) {
        if score == 1.0 {
            self.wins += 1;
        } else if score == 0.0 {
            self.losses += 1;
        } else {
            self.draws += 1;
        }
        self.previous_rating = self.rating;
        self.rating = new_rating;
        self.updated_at = Some(at);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChange {
    pub white_before: i32,
    pub white_after: i32,
    pub black_before: i32,
    pub black_after: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingEngine {
    pub k_factor: i32,
}

impl Default for RatingEngine {
    fn default() -> Self {
        Self {
            k_factor: DEFAULT_K_FACTOR,
        }
    }
}

impl RatingEngine {
    pub fn new(k_factor: i32) -> Self {
        Self { k_factor }
    }

    /// Expected score rounded to two decimals: 100 points below the
    /// opponent gives 0.35993... which becomes 0.36.
    pub fn expected_score(player_rating: i32, opponent_rating: i32) -> f64 {
        let exponent = f64::from(opponent_rating - player_rating) / 400.0;
        let expected = 1.0 / (1.0 + 10f64.powf(exponent));
        (expected * 100.0).round() / 100.0
    }

    /// `score` is 1, 0.5 or 0. Halves round away from zero.
    pub fn new_rating(score: f64, rating: i32, opponent_rating: i32, k_factor: i32) -> i32 {
        let expected = Self::expected_score(rating, opponent_rating);
        (f64::from(rating) + f64::from(k_factor) * (score - expected)).round() as i32
    }

    /// Update both players from a finished session.
    ///
    /// Both new ratings come from the ratings as they stood before the game,
    /// so the order of the two updates does not matter. Unrated games
    /// (unfinished, self-play, abandoned before both seats filled) change
    /// nothing and return `None`.
    pub fn update_from_result(
        &self,
        session: &GameSession,
        white: &mut PlayerRating,
        black: &mut PlayerRating,
    ) -> Option<RatingChange> {
        if !session.is_rated() {
            return None;
        }
        let (white_score, black_score) = match session.result().status {
            ResultStatus::WhiteWins => (1.0, 0.0),
            ResultStatus::BlackWins => (0.0, 1.0),
            ResultStatus::Draw => (0.5, 0.5),
            ResultStatus::InProgress => return None,
        };

        let white_before = white.rating;
        let black_before = black.rating;
        let white_after = Self::new_rating(white_score, white_before, black_before, self.k_factor);
        let black_after = Self::new_rating(black_score, black_before, white_before, self.k_factor);

        let now = Utc::now();
        white.record(white_score, white_after, now);
        black.record(black_score, black_after, now);

        info!(
            "Game {} rated: white {} -> {}, black {} -> {}",
            session.id(),
            white_before,
            white_after,
            black_before,
            black_after
        );
        Some(RatingChange {
            white_before,
            white_after,
            black_before,
            black_after,
        })
    }
}
