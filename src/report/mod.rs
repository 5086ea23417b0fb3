//! Report module - selection summaries, leaderboards and JSON export

pub mod export;
pub mod leaderboard;
pub mod summary;

pub use export::*;
pub use leaderboard::*;
pub use summary::*;
