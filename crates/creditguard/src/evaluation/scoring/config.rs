use serde::{Deserialize, Serialize};

use crate::evaluation::domain::{FactorKind, RiskLevel};

/// Rubric configuration: fixed per-kind weights and the level thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: FactorWeights,
    pub thresholds: RiskThresholds,
    pub model_version: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            thresholds: RiskThresholds::default(),
            model_version: "1.0.0".to_string(),
        }
    }
}

impl ScoringConfig {
    /// Thresholds are checked on construction; weights are public and checked here.
    pub fn validate(&self) -> Result<(), ThresholdError> {
        self.weights.validate()
    }
}

/// Weight carried by each factor kind, independent of which plugin produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub credit_score: f64,
    pub debt_to_income: f64,
    pub payment_history: f64,
    pub credit_utilization: f64,
    pub credit_inquiries: f64,
    pub market_fraud_trend: f64,
    pub economic_conditions: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            credit_score: 0.35,
            debt_to_income: 0.25,
            payment_history: 0.20,
            credit_utilization: 0.10,
            credit_inquiries: 0.05,
            market_fraud_trend: 0.10,
            economic_conditions: 0.05,
        }
    }
}

impl FactorWeights {
    pub fn weight(&self, kind: FactorKind) -> f64 {
        match kind {
            FactorKind::CreditScore => self.credit_score,
            FactorKind::DebtToIncome => self.debt_to_income,
            FactorKind::PaymentHistory => self.payment_history,
            FactorKind::CreditUtilization => self.credit_utilization,
            FactorKind::CreditInquiries => self.credit_inquiries,
            FactorKind::MarketFraudTrend => self.market_fraud_trend,
            FactorKind::EconomicConditions => self.economic_conditions,
        }
    }

    fn validate(&self) -> Result<(), ThresholdError> {
        for (name, weight) in [
            ("credit_score", self.credit_score),
            ("debt_to_income", self.debt_to_income),
            ("payment_history", self.payment_history),
            ("credit_utilization", self.credit_utilization),
            ("credit_inquiries", self.credit_inquiries),
            ("market_fraud_trend", self.market_fraud_trend),
            ("economic_conditions", self.economic_conditions),
        ] {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(ThresholdError::InvalidWeight { factor: name, weight });
            }
        }
        Ok(())
    }
}

/// Lower bounds of the Medium, High, and Critical bands on the 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct RiskThresholds {
    medium: f64,
    high: f64,
    critical: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 25.0,
            high: 50.0,
            critical: 75.0,
        }
    }
}

impl RiskThresholds {
    pub fn new(medium: f64, high: f64, critical: f64) -> Result<Self, ThresholdError> {
        let bounds = [medium, high, critical];
        if bounds
            .iter()
            .any(|bound| !bound.is_finite() || *bound <= 0.0 || *bound > 100.0)
        {
            return Err(ThresholdError::OutOfRange);
        }
        if !(medium < high && high < critical) {
            return Err(ThresholdError::NotIncreasing {
                medium,
                high,
                critical,
            });
        }
        Ok(Self {
            medium,
            high,
            critical,
        })
    }

    /// Parses `"medium,high,critical"`.
    pub fn parse(raw: &str) -> Result<Self, ThresholdError> {
        let values = raw
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ThresholdError::Malformed(raw.to_string()))?;

        match values.as_slice() {
            [medium, high, critical] => Self::new(*medium, *high, *critical),
            _ => Err(ThresholdError::Malformed(raw.to_string())),
        }
    }

    pub fn classify(&self, score: f64) -> RiskLevel {
        if score >= self.critical {
            RiskLevel::Critical
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl TryFrom<[f64; 3]> for RiskThresholds {
    type Error = ThresholdError;

    fn try_from(value: [f64; 3]) -> Result<Self, Self::Error> {
        Self::new(value[0], value[1], value[2])
    }
}

impl From<RiskThresholds> for [f64; 3] {
    fn from(value: RiskThresholds) -> Self {
        [value.medium, value.high, value.critical]
    }
}

/// Rejected scoring configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("thresholds must be finite and within (0, 100]")]
    OutOfRange,
    #[error("thresholds must increase strictly (got {medium}, {high}, {critical})")]
    NotIncreasing {
        medium: f64,
        high: f64,
        critical: f64,
    },
    #[error("expected three comma separated numbers, got '{0}'")]
    Malformed(String),
    #[error("weight for {factor} must be positive (got {weight})")]
    InvalidWeight { factor: &'static str, weight: f64 },
}
