//! Pure merge of plugin payloads into a risk score.
//!
//! Factors missing because their plugin failed are neutral: they are left out of both the
//! weighted sum and the weight total, so the score stays on the same 0-100 scale whether one
//! or every data source answered. Reduced coverage is reported through
//! [`confidence`] instead of inflating the score.

mod config;
pub(crate) mod rules;

pub use config::{FactorWeights, RiskThresholds, ScoringConfig, ThresholdError};

use super::domain::{CustomerProfile, MarketInsight, RiskFactor, RiskLevel};
use super::plugins::PluginPayload;

const INSIGHTS_KEPT: usize = 3;
const FACTOR_RECOMMENDATIONS_KEPT: usize = 5;

/// Result of merging the available payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    pub factors: Vec<RiskFactor>,
    pub market_insights: Vec<MarketInsight>,
    pub recommendations: Vec<String>,
}

/// Stateless calculator applying the rubric configuration.
#[derive(Debug, Clone)]
pub struct RiskCalculator {
    config: ScoringConfig,
}

impl RiskCalculator {
    pub fn new(config: ScoringConfig) -> Result<Self, ThresholdError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Merges successful payloads; `None` when they yield no factors at all.
    pub fn compute(
        &self,
        profile: &CustomerProfile,
        payloads: &[PluginPayload],
    ) -> Option<RiskAssessment> {
        let mut factors = Vec::new();
        let mut market_insights = Vec::new();

        for payload in payloads {
            match payload {
                PluginPayload::CreditBureau(report) => {
                    factors.extend(rules::bureau_factors(report, profile, &self.config));
                }
                PluginPayload::MarketResearch(intelligence) => {
                    factors.extend(rules::market_factors(intelligence, &self.config));
                    market_insights.extend(rules::ranked_insights(intelligence));
                }
            }
        }

        factors.sort_by(rules::factor_order);

        let total_weight: f64 = factors.iter().map(|factor| factor.weight).sum();
        if factors.is_empty() || total_weight <= 0.0 {
            return None;
        }

        let weighted: f64 = factors
            .iter()
            .map(|factor| factor.weight * factor.contribution)
            .sum();
        let overall_score = round_to_hundredths(weighted / total_weight);
        let risk_level = self.config.thresholds.classify(overall_score);

        market_insights.sort_by(rules::insight_order);
        market_insights.truncate(INSIGHTS_KEPT);

        let recommendations = recommendations(risk_level, &factors);

        Some(RiskAssessment {
            overall_score,
            risk_level,
            factors,
            market_insights,
            recommendations,
        })
    }
}

/// Share of attempted data sources that returned data.
pub fn confidence(succeeded: usize, attempted: usize) -> f64 {
    if attempted == 0 {
        0.0
    } else {
        succeeded as f64 / attempted as f64
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn level_guidance(level: RiskLevel) -> &'static [&'static str] {
    match level {
        RiskLevel::Critical => &[
            "Strongly recommend denial of credit application",
            "Require co-signer or secured collateral",
            "Manual review required for any credit decisions",
        ],
        RiskLevel::High => &[
            "Consider denial or approve with strict conditions",
            "Lower credit limits significantly below requested amount",
            "Require additional income verification",
        ],
        RiskLevel::Medium => &[
            "Approve with standard to conservative terms",
            "Implement regular account monitoring",
        ],
        RiskLevel::Low => &[
            "Eligible for standard or premium credit products",
            "Consider competitive rates and higher credit limits",
        ],
    }
}

fn recommendations(level: RiskLevel, factors: &[RiskFactor]) -> Vec<String> {
    let mut out: Vec<String> = level_guidance(level)
        .iter()
        .map(|line| line.to_string())
        .collect();

    let mut from_factors: Vec<&str> = Vec::new();
    for factor in factors {
        let line = factor.recommendation.as_str();
        if !line.is_empty() && !from_factors.contains(&line) && !out.iter().any(|o| o == line) {
            from_factors.push(line);
        }
        if from_factors.len() == FACTOR_RECOMMENDATIONS_KEPT {
            break;
        }
    }

    out.extend(from_factors.into_iter().map(str::to_string));
    out
}

#[cfg(test)]
pub(crate) fn calculator() -> RiskCalculator {
    RiskCalculator::new(ScoringConfig::default()).expect("default scoring config is valid")
}
