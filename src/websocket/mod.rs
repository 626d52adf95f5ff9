//! Notification channel: websocket watchers keyed by game id.

pub mod broadcaster;
pub mod handler;

pub use broadcaster::Broadcaster;
pub use handler::{ws_index, GameSocket};
