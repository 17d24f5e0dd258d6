use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{RuleSet, Score};

/// 1/X/2 outcome of a scoreline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sign {
    #[serde(rename = "1")]
    HomeWin,
    #[serde(rename = "X")]
    Draw,
    #[serde(rename = "2")]
    AwayWin,
}

impl Sign {
    pub fn of(score: &Score) -> Self {
        match score.goal_diff() {
            d if d > 0 => Sign::HomeWin,
            d if d < 0 => Sign::AwayWin,
            _ => Sign::Draw,
        }
    }
}

/// Points per component; only the awarded components are non-zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsBreakdown {
    pub exact: i64,
    pub sign: i64,
    pub diff: i64,
}

/// Result of scoring one prediction against one result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub exact_score: bool,
    pub correct_sign: bool,
    pub correct_diff: bool,
    pub points: i64,
    pub breakdown: PointsBreakdown,
}

/// Score a single prediction.
///
/// An exact hit awards `exact_score` alone. Otherwise a matching sign awards
/// `correct_sign`, and `goal_diff_bonus` is added only on top of a matching
/// sign with an identical home-minus-away differential.
///
/// Total over all inputs; negative scores are taken as given.
pub fn score_match(prediction: &Score, result: &Score, rules: &RuleSet) -> ScoreBreakdown {
    if prediction == result {
        return ScoreBreakdown {
            exact_score: true,
            correct_sign: true,
            correct_diff: true,
            points: i64::from(rules.exact_score),
            breakdown: PointsBreakdown {
                exact: i64::from(rules.exact_score),
                ..PointsBreakdown::default()
            },
        };
    }

    let correct_sign = Sign::of(prediction) == Sign::of(result);
    let correct_diff = correct_sign && prediction.goal_diff() == result.goal_diff();

    let breakdown = PointsBreakdown {
        exact: 0,
        sign: if correct_sign { i64::from(rules.correct_sign) } else { 0 },
        diff: if correct_diff { i64::from(rules.goal_diff_bonus) } else { 0 },
    };

    ScoreBreakdown {
        exact_score: false,
        correct_sign,
        correct_diff,
        points: breakdown.sign + breakdown.diff,
        breakdown,
    }
}

/// A prediction paired with its final result
#[derive(Debug, Clone, Copy)]
pub struct MatchPrediction {
    pub prediction: Score,
    pub result: Score,
    pub premium: bool,
}

/// Per-match outcome inside a tally
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredMatch {
    pub breakdown: ScoreBreakdown,
    pub premium: bool,
    /// Points after the premium multiplier
    pub points: Decimal,
}

/// Aggregate of a user's scored predictions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionTally {
    pub total_points: Decimal,
    pub exact_count: u32,
    /// Correct sign without an exact hit
    pub sign_count: u32,
    /// Diff bonus awarded (never on an exact hit)
    pub diff_count: u32,
    /// Points earned on premium matches, after the multiplier
    pub premium_points: Decimal,
    pub scores: Vec<ScoredMatch>,
}

impl PredictionTally {
    /// Fold one scored match into the tally
    pub fn record(&mut self, breakdown: ScoreBreakdown, premium: bool, rules: &RuleSet) {
        let base = Decimal::from(breakdown.points);
        let points = if premium {
            base * rules.effective_multiplier()
        } else {
            base
        };

        self.total_points += points;
        if premium {
            self.premium_points += points;
        }
        if breakdown.exact_score {
            self.exact_count += 1;
        } else {
            if breakdown.correct_sign {
                self.sign_count += 1;
            }
            if breakdown.correct_diff {
                self.diff_count += 1;
            }
        }

        self.scores.push(ScoredMatch {
            breakdown,
            premium,
            points,
        });
    }
}

/// Score a list of predictions and sum them, applying the premium multiplier per match
pub fn score_predictions(predictions: &[MatchPrediction], rules: &RuleSet) -> PredictionTally {
    let mut tally = PredictionTally::default();
    for p in predictions {
        tally.record(score_match(&p.prediction, &p.result, rules), p.premium, rules);
    }
    tally
}
