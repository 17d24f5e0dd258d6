//! Pure scoring and ranking. Nothing in here performs I/O or fails.

pub mod engine;
pub mod leaderboard;

pub use engine::{score_match, score_predictions, MatchPrediction, PredictionTally, ScoreBreakdown, Sign};
pub use leaderboard::{
    build_standings, compare_players, generate_leaderboard, LeaderboardEntry, PlayerStanding, PoolStandings,
};
