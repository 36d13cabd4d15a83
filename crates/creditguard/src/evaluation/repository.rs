use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::CreditDecision;
use super::domain::{CustomerId, CustomerProfile, EvaluationId, RiskEvaluation};
use super::plugins::{PluginFailure, PluginKind};

/// Read-only source of customer profiles.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn get_profile(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<CustomerProfile>, StoreError>;
}

/// Append-only trail of completed evaluations.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn save(&self, record: EvaluationRecord) -> Result<(), StoreError>;

    /// Every record saved for the customer, oldest first.
    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<EvaluationRecord>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store did not respond within {after_ms}ms")]
    TimedOut { after_ms: u64 },
}

/// Immutable record written once per successful evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub evaluation_id: EvaluationId,
    pub customer_id: CustomerId,
    pub evaluation: RiskEvaluation,
    pub decision: CreditDecision,
    pub audit: AuditMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditMetadata {
    pub model_version: String,
    /// One entry per registered plugin, in registration order.
    pub plugins: Vec<PluginAudit>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginAudit {
    pub kind: PluginKind,
    pub status: PluginStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PluginStatus {
    Succeeded,
    Failed { failure: PluginFailure },
}

impl PluginStatus {
    pub fn succeeded(&self) -> bool {
        matches!(self, PluginStatus::Succeeded)
    }
}
