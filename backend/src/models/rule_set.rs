use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Point values a pool awards per match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub exact_score: i32,
    pub correct_sign: i32,
    pub goal_diff_bonus: i32,
    /// Applied to a premium match's points after per-match scoring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium_multiplier: Option<Decimal>,
}

impl RuleSet {
    pub fn new(exact_score: i32, correct_sign: i32, goal_diff_bonus: i32) -> Self {
        Self {
            exact_score,
            correct_sign,
            goal_diff_bonus,
            premium_multiplier: None,
        }
    }

    pub fn with_premium_multiplier(mut self, multiplier: Decimal) -> Self {
        self.premium_multiplier = Some(multiplier);
        self
    }

    /// Point values are non-negative; a multiplier is at least one
    pub fn validate(&self) -> AppResult<()> {
        let fields = [
            ("exactScore", self.exact_score),
            ("correctSign", self.correct_sign),
            ("goalDiffBonus", self.goal_diff_bonus),
        ];
        for (name, value) in fields {
            if value < 0 {
                return Err(AppError::Validation(format!(
                    "Rule set {} must be non-negative, got {}",
                    name, value
                )));
            }
        }

        if let Some(multiplier) = self.premium_multiplier {
            if multiplier < Decimal::ONE {
                return Err(AppError::Validation(format!(
                    "Rule set premiumMultiplier must be at least 1, got {}",
                    multiplier
                )));
            }
        }

        Ok(())
    }

    /// Multiplier applied to premium matches (1 when unset)
    pub fn effective_multiplier(&self) -> Decimal {
        self.premium_multiplier.unwrap_or(Decimal::ONE)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(5, 3, 1)
    }
}

/// Rule set as persisted on the pool row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum RuleSetDocument {
    #[serde(rename = "1")]
    V1(RuleSet),
}

impl RuleSetDocument {
    /// Parse and validate the JSON stored with a pool
    pub fn parse(value: &serde_json::Value) -> AppResult<RuleSet> {
        let document: RuleSetDocument = serde_json::from_value(value.clone())
            .map_err(|e| AppError::Validation(format!("Malformed rule set: {}", e)))?;

        let rules = match document {
            RuleSetDocument::V1(rules) => rules,
        };
        rules.validate()?;
        Ok(rules)
    }

    pub fn to_value(rules: &RuleSet) -> AppResult<serde_json::Value> {
        Ok(serde_json::to_value(RuleSetDocument::V1(rules.clone()))?)
    }
}
