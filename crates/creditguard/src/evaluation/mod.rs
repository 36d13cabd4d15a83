//! Credit-risk evaluation: plugin fan-in, scoring, decisioning, and the record trail.
//!
//! [`OrchestrationEngine`] resolves a customer profile, polls every registered
//! [`DataSourcePlugin`] concurrently under per-plugin and global time budgets, merges the
//! payloads that arrived through [`RiskCalculator`], applies [`DecisionPolicy`], and hands one
//! immutable [`EvaluationRecord`] to the [`EvaluationStore`].

pub mod decision;
pub mod domain;
pub mod engine;
pub mod plugins;
pub mod repository;
pub mod router;
pub mod scoring;

#[cfg(test)]
mod tests;

pub use decision::{CreditDecision, DecisionPolicy};
pub use domain::{
    BureauReport, CreditHistory, CustomerId, CustomerProfile, EmploymentInfo, EvaluationId,
    FactorKind, InsightCategory, MarketInsight, MarketIntelligence, PaymentHistory, RiskEvaluation,
    RiskFactor, RiskLevel,
};
pub use engine::{
    EvaluationError, EvaluationOptions, EvaluationOutcome, EvaluationWarning, OrchestrationEngine,
    RegistrationError,
};
pub use plugins::{
    AudioSummary, BureauClient, CollaboratorError, CreditBureauPlugin, DataSourcePlugin,
    FetchContext, MarketResearchPlugin, MarketSearch, PluginFailure, PluginKind, PluginPayload,
    PluginResult, SearchHit, SearchQuery, SpeechSynthesizer, VoiceCommunicationPlugin,
    VoiceProfile,
};
pub use repository::{
    AuditMetadata, CustomerStore, EvaluationRecord, EvaluationStore, PluginAudit, PluginStatus,
    StoreError,
};
pub use router::{evaluation_router, EvaluationHistoryView, EvaluationView};
pub use scoring::{
    FactorWeights, RiskAssessment, RiskCalculator, RiskThresholds, ScoringConfig, ThresholdError,
};
