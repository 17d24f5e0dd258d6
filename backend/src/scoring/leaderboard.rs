use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

use super::engine::{score_match, PredictionTally};
use crate::models::{Match, Prediction, RuleSet, SnapshotEntry};

/// A user's aggregate before ranking
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStanding {
    pub user_id: Uuid,
    pub total_points: Decimal,
    pub exact_count: u32,
    pub sign_count: u32,
    pub premium_points: Option<Decimal>,
}

impl PlayerStanding {
    pub fn new(user_id: Uuid, total_points: Decimal, exact_count: u32, sign_count: u32) -> Self {
        Self {
            user_id,
            total_points,
            exact_count,
            sign_count,
            premium_points: None,
        }
    }

    fn from_tally(user_id: Uuid, tally: &PredictionTally) -> Self {
        let has_premium = tally.scores.iter().any(|s| s.premium);
        Self {
            user_id,
            total_points: tally.total_points,
            exact_count: tally.exact_count,
            sign_count: tally.sign_count,
            premium_points: has_premium.then_some(tally.premium_points),
        }
    }
}

/// Ranked leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub total_points: Decimal,
    pub exact_count: u32,
    pub sign_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_points: Option<Decimal>,
    pub rank: u32,
}

impl From<&LeaderboardEntry> for SnapshotEntry {
    fn from(entry: &LeaderboardEntry) -> Self {
        SnapshotEntry {
            user_id: entry.user_id,
            rank: entry.rank,
            points: entry.total_points,
            exact_count: entry.exact_count,
            sign_count: entry.sign_count,
        }
    }
}

/// Better player first: points, exact hits, sign hits, premium points.
///
/// Missing premium points count as zero, which keeps this a strict weak
/// ordering (treating "absent" as equal to everything would not be
/// transitive).
pub fn compare_players(a: &PlayerStanding, b: &PlayerStanding) -> Ordering {
    b.total_points
        .cmp(&a.total_points)
        .then_with(|| b.exact_count.cmp(&a.exact_count))
        .then_with(|| b.sign_count.cmp(&a.sign_count))
        .then_with(|| {
            let pa = a.premium_points.unwrap_or(Decimal::ZERO);
            let pb = b.premium_points.unwrap_or(Decimal::ZERO);
            pb.cmp(&pa)
        })
}

/// Sort and assign competition ranks ("1, 1, 3").
///
/// Tied players share the rank of the first player in their block; the next
/// distinct player gets its 1-based index. Within a tie block rows are listed
/// by user id so repeated runs produce identical output.
pub fn generate_leaderboard(mut players: Vec<PlayerStanding>) -> Vec<LeaderboardEntry> {
    players.sort_by(|a, b| compare_players(a, b).then_with(|| a.user_id.cmp(&b.user_id)));

    let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(players.len());
    for (index, player) in players.iter().enumerate() {
        let rank = match (index.checked_sub(1).map(|i| &players[i]), entries.last()) {
            (Some(prev), Some(prev_entry)) if compare_players(prev, player) == Ordering::Equal => {
                prev_entry.rank
            }
            _ => index as u32 + 1,
        };

        entries.push(LeaderboardEntry {
            user_id: player.user_id,
            total_points: player.total_points,
            exact_count: player.exact_count,
            sign_count: player.sign_count,
            premium_points: player.premium_points,
            rank,
        });
    }

    entries
}

/// Per-user standings for a pool plus the number of predictions considered
#[derive(Debug, Clone, Default)]
pub struct PoolStandings {
    pub players: Vec<PlayerStanding>,
    pub total_predictions: u64,
}

/// Aggregate raw predictions into per-user standings.
///
/// A prediction whose match has a final result is scored fresh with `rules`.
/// Otherwise the upstream `awarded_points`/`is_exact` values are used as-is
/// (they already include any premium multiplier); a prediction with neither
/// contributes zero points but still counts toward the user and the total.
pub fn build_standings(predictions: &[Prediction], matches: &[Match], rules: &RuleSet) -> PoolStandings {
    let by_match: HashMap<Uuid, &Match> = matches.iter().map(|m| (m.id, m)).collect();
    let mut tallies: HashMap<Uuid, PredictionTally> = HashMap::new();

    for prediction in predictions {
        let tally = tallies.entry(prediction.user_id).or_default();
        let fixture = by_match.get(&prediction.match_id);
        let premium = fixture.map(|m| m.is_premium).unwrap_or(false);

        match fixture.and_then(|m| m.result()) {
            Some(result) => {
                let breakdown = score_match(&prediction.score(), &result, rules);
                tally.record(breakdown, premium, rules);
            }
            None => record_upstream(tally, prediction, premium),
        }
    }

    let players = tallies
        .iter()
        .map(|(user_id, tally)| PlayerStanding::from_tally(*user_id, tally))
        .collect();

    PoolStandings {
        players,
        total_predictions: predictions.len() as u64,
    }
}

fn record_upstream(tally: &mut PredictionTally, prediction: &Prediction, premium: bool) {
    use super::engine::{PointsBreakdown, ScoreBreakdown, ScoredMatch};

    let points = i64::from(prediction.awarded_points.unwrap_or(0));
    let exact = prediction.is_exact.unwrap_or(false);
    let breakdown = ScoreBreakdown {
        exact_score: exact,
        correct_sign: points > 0,
        correct_diff: false,
        points,
        breakdown: PointsBreakdown::default(),
    };

    let points = Decimal::from(points);
    tally.total_points += points;
    if premium {
        tally.premium_points += points;
    }
    if exact {
        tally.exact_count += 1;
    } else if breakdown.correct_sign {
        tally.sign_count += 1;
    }
    tally.scores.push(ScoredMatch {
        breakdown,
        premium,
        points,
    });
}
