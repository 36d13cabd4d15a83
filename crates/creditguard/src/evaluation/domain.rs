use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for customers held by the external profile store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned to a completed evaluation record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvaluationId(pub String);

impl fmt::Display for EvaluationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only snapshot of a customer as held by the profile store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: CustomerId,
    pub full_name: String,
    pub annual_income: u32,
    pub employment: EmploymentInfo,
    pub credit_history: CreditHistory,
    #[serde(default)]
    pub requested_limit: Option<u32>,
}

impl CustomerProfile {
    pub fn monthly_income(&self) -> f64 {
        f64::from(self.annual_income) / 12.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmploymentInfo {
    pub occupation: String,
    #[serde(default)]
    pub employer: Option<String>,
    pub years_employed: f32,
}

/// Credit data recorded on the customer file, independent of any bureau pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditHistory {
    #[serde(default)]
    pub reported_credit_score: Option<u16>,
    pub monthly_debt_payments: u32,
    #[serde(default)]
    pub open_accounts: u16,
    #[serde(default)]
    pub delinquent_accounts: u16,
}

/// Ordered risk grades shared by factors, insights, and overall evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Credit bureau payment-history rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentHistory {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Structured credit report returned by the bureau plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BureauReport {
    pub credit_score: u16,
    #[serde(default)]
    pub debt_to_income: Option<f64>,
    #[serde(default)]
    pub credit_utilization: Option<f64>,
    #[serde(default)]
    pub payment_history: Option<PaymentHistory>,
    #[serde(default)]
    pub delinquent_accounts: u16,
    #[serde(default)]
    pub total_accounts: u16,
    #[serde(default)]
    pub hard_inquiries_6m: Option<u16>,
}

impl BureauReport {
    /// Report carrying only the score and debt-to-income ratio.
    pub fn basic(credit_score: u16, debt_to_income: f64) -> Self {
        Self {
            credit_score,
            debt_to_income: Some(debt_to_income),
            credit_utilization: None,
            payment_history: None,
            delinquent_accounts: 0,
            total_accounts: 0,
            hard_inquiries_6m: None,
        }
    }

    pub fn delinquency_rate(&self) -> f64 {
        if self.total_accounts == 0 {
            0.0
        } else {
            f64::from(self.delinquent_accounts) / f64::from(self.total_accounts)
        }
    }
}

/// Market categories recognised by the research plugin, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    CardSkimming,
    IdentityTheft,
    SyntheticIdentity,
    AccountTakeover,
    OnlineFraud,
    EconomicHeadwinds,
}

impl InsightCategory {
    pub const ALL: [InsightCategory; 6] = [
        InsightCategory::CardSkimming,
        InsightCategory::IdentityTheft,
        InsightCategory::SyntheticIdentity,
        InsightCategory::AccountTakeover,
        InsightCategory::OnlineFraud,
        InsightCategory::EconomicHeadwinds,
    ];

    pub const fn is_fraud_trend(self) -> bool {
        !matches!(self, InsightCategory::EconomicHeadwinds)
    }

    pub const fn title(self) -> &'static str {
        match self {
            InsightCategory::CardSkimming => "Card Skimming Trend Alert",
            InsightCategory::IdentityTheft => "Identity Theft Trend Alert",
            InsightCategory::SyntheticIdentity => "Synthetic Identity Trend Alert",
            InsightCategory::AccountTakeover => "Account Takeover Trend Alert",
            InsightCategory::OnlineFraud => "Online Fraud Trend Alert",
            InsightCategory::EconomicHeadwinds => "Economic Headwinds",
        }
    }
}

/// One market signal distilled from search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInsight {
    pub category: InsightCategory,
    pub severity: RiskLevel,
    pub title: String,
    pub summary: String,
    pub confidence: f64,
    pub sources: Vec<String>,
}

/// Research payload: the query issued and the insights it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIntelligence {
    pub query: String,
    pub insights: Vec<MarketInsight>,
}

/// Factor kinds in calculation order; the order fixes factor sequencing in evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    CreditScore,
    DebtToIncome,
    PaymentHistory,
    CreditUtilization,
    CreditInquiries,
    MarketFraudTrend,
    EconomicConditions,
}

impl FactorKind {
    pub const fn name(self) -> &'static str {
        match self {
            FactorKind::CreditScore => "credit_score",
            FactorKind::DebtToIncome => "debt_to_income_ratio",
            FactorKind::PaymentHistory => "payment_history",
            FactorKind::CreditUtilization => "credit_utilization",
            FactorKind::CreditInquiries => "credit_inquiries",
            FactorKind::MarketFraudTrend => "market_fraud_trend",
            FactorKind::EconomicConditions => "economic_conditions",
        }
    }
}

/// Discrete contribution to an evaluation, allowing transparent audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub kind: FactorKind,
    pub name: String,
    pub weight: f64,
    /// Risk points on a 0-100 scale; higher is riskier.
    pub contribution: f64,
    pub severity: RiskLevel,
    pub description: String,
    pub recommendation: String,
}

/// Scored view of a customer produced by one orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEvaluation {
    pub customer_id: CustomerId,
    /// 0-100, higher is riskier.
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    /// Fraction of registered data sources that returned data.
    pub confidence: f64,
    pub factors: Vec<RiskFactor>,
    pub market_insights: Vec<MarketInsight>,
    pub recommendations: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
}
