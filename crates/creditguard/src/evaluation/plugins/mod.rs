//! Data-source plugins queried by the orchestration engine.
//!
//! Fan-in plugins implement [`DataSourcePlugin`] and always answer with a [`PluginResult`];
//! upstream problems are reported as [`PluginFailure`] values rather than errors so a slow or
//! broken provider never aborts its siblings. The voice plugin is output-only and lives
//! outside the fan-in.

mod credit_bureau;
pub(crate) mod market_research;
pub(crate) mod voice;

pub use credit_bureau::{BureauClient, CreditBureauPlugin};
pub use market_research::{MarketResearchPlugin, MarketSearch, SearchHit, SearchQuery};
pub use voice::{AudioSummary, SpeechSynthesizer, VoiceCommunicationPlugin, VoiceProfile};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{BureauReport, CustomerId, CustomerProfile, MarketIntelligence};

/// Closed set of fan-in data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    CreditBureau,
    MarketResearch,
}

impl PluginKind {
    pub const fn label(self) -> &'static str {
        match self {
            PluginKind::CreditBureau => "credit_bureau",
            PluginKind::MarketResearch => "market_research",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inputs shared with every plugin for a single evaluation.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub profile: CustomerProfile,
    pub requested_at: DateTime<Utc>,
    /// Budget the engine will enforce for this fetch.
    pub timeout: Duration,
}

/// Data returned by a successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "data", rename_all = "snake_case")]
pub enum PluginPayload {
    CreditBureau(BureauReport),
    MarketResearch(MarketIntelligence),
}

impl PluginPayload {
    pub const fn kind(&self) -> PluginKind {
        match self {
            PluginPayload::CreditBureau(_) => PluginKind::CreditBureau,
            PluginPayload::MarketResearch(_) => PluginKind::MarketResearch,
        }
    }
}

/// Reasons a plugin produced no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum PluginFailure {
    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
    #[error("upstream error: {0}")]
    UpstreamError(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl PluginFailure {
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Outcome of one plugin invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginResult {
    Success(PluginPayload),
    Failure(PluginFailure),
}

impl From<Result<PluginPayload, PluginFailure>> for PluginResult {
    fn from(value: Result<PluginPayload, PluginFailure>) -> Self {
        match value {
            Ok(payload) => PluginResult::Success(payload),
            Err(failure) => PluginResult::Failure(failure),
        }
    }
}

/// Errors raised by the network clients wrapped by plugins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl From<CollaboratorError> for PluginFailure {
    fn from(value: CollaboratorError) -> Self {
        match value {
            CollaboratorError::Unavailable(detail) | CollaboratorError::Rejected(detail) => {
                PluginFailure::UpstreamError(detail)
            }
            CollaboratorError::Malformed(detail) => PluginFailure::InvalidResponse(detail),
        }
    }
}

/// Uniform contract for fan-in data providers.
#[async_trait]
pub trait DataSourcePlugin: Send + Sync {
    fn kind(&self) -> PluginKind;

    /// Per-plugin override of the engine's default fetch timeout.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn fetch(&self, customer_id: &CustomerId, context: &FetchContext) -> PluginResult;
}
