use serde::{Deserialize, Serialize};

use super::domain::{FactorKind, RiskEvaluation, RiskLevel};

/// Credit outcome attached to every persisted evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreditDecision {
    Approved,
    Conditional { conditions: Vec<String> },
    ManualReview { reasons: Vec<String> },
    Denied { reasons: Vec<String> },
    FraudAlert { indicators: Vec<String> },
}

impl CreditDecision {
    pub const fn label(&self) -> &'static str {
        match self {
            CreditDecision::Approved => "approved",
            CreditDecision::Conditional { .. } => "conditional",
            CreditDecision::ManualReview { .. } => "manual_review",
            CreditDecision::Denied { .. } => "denied",
            CreditDecision::FraudAlert { .. } => "fraud_alert",
        }
    }

    pub fn summary(&self) -> String {
        match self {
            CreditDecision::Approved => "approved".to_string(),
            CreditDecision::Conditional { conditions } => {
                if conditions.is_empty() {
                    "conditional approval".to_string()
                } else {
                    format!("conditional approval: {}", conditions.join("; "))
                }
            }
            CreditDecision::ManualReview { reasons } => {
                if reasons.is_empty() {
                    "requires manual review".to_string()
                } else {
                    format!("manual review required: {}", reasons.join("; "))
                }
            }
            CreditDecision::Denied { reasons } => {
                format!("denied: {}", reasons.join("; "))
            }
            CreditDecision::FraudAlert { indicators } => {
                format!("flagged for fraud review: {}", indicators.join("; "))
            }
        }
    }
}

/// Maps a finished evaluation to a [`CreditDecision`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    /// Evaluations with less data coverage than this go to manual review.
    pub min_confidence: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
        }
    }
}

impl DecisionPolicy {
    pub fn decide(&self, evaluation: &RiskEvaluation) -> CreditDecision {
        let fraud_indicators: Vec<String> = evaluation
            .factors
            .iter()
            .filter(|factor| factor.kind == FactorKind::MarketFraudTrend)
            .filter(|factor| factor.severity >= RiskLevel::High)
            .map(|factor| factor.description.clone())
            .collect();

        if !fraud_indicators.is_empty() && evaluation.risk_level >= RiskLevel::High {
            return CreditDecision::FraudAlert {
                indicators: fraud_indicators,
            };
        }

        match evaluation.risk_level {
            RiskLevel::Critical => CreditDecision::Denied {
                reasons: elevated_descriptions(evaluation, RiskLevel::High)
                    .into_iter()
                    .chain(std::iter::once(format!(
                        "overall risk score {:.2} is critical",
                        evaluation.overall_score
                    )))
                    .collect(),
            },
            _ if evaluation.confidence < self.min_confidence => CreditDecision::ManualReview {
                reasons: vec![format!(
                    "only {:.0}% of data sources responded",
                    evaluation.confidence * 100.0
                )],
            },
            RiskLevel::High => CreditDecision::ManualReview {
                reasons: elevated_descriptions(evaluation, RiskLevel::High),
            },
            RiskLevel::Medium => {
                let mut conditions: Vec<String> = Vec::new();
                for factor in &evaluation.factors {
                    if factor.severity >= RiskLevel::Medium
                        && !conditions.contains(&factor.recommendation)
                    {
                        conditions.push(factor.recommendation.clone());
                    }
                }
                CreditDecision::Conditional { conditions }
            }
            RiskLevel::Low => CreditDecision::Approved,
        }
    }
}

fn elevated_descriptions(evaluation: &RiskEvaluation, floor: RiskLevel) -> Vec<String> {
    evaluation
        .factors
        .iter()
        .filter(|factor| factor.severity >= floor)
        .map(|factor| factor.description.clone())
        .collect()
}
