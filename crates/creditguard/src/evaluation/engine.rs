use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::decision::{CreditDecision, DecisionPolicy};
use super::domain::{CustomerId, CustomerProfile, EvaluationId, RiskEvaluation};
use super::plugins::{
    AudioSummary, DataSourcePlugin, FetchContext, PluginFailure, PluginKind, PluginPayload,
    PluginResult, VoiceCommunicationPlugin,
};
use super::repository::{
    AuditMetadata, CustomerStore, EvaluationRecord, EvaluationStore, PluginAudit, PluginStatus,
    StoreError,
};
use super::scoring::{self, RiskCalculator};
use crate::config::OrchestrationConfig;
use crate::time::{Clock, SystemClock};

/// Post-scoring work (persistence, voice) must finish this long after the evaluation deadline.
pub const COMPLETION_GRACE: Duration = Duration::from_millis(250);

/// Per-request switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationOptions {
    pub voice_summary: bool,
}

/// Successful evaluation plus anything that went wrong after scoring.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub evaluation_id: EvaluationId,
    pub evaluation: RiskEvaluation,
    pub decision: CreditDecision,
    pub plugins: Vec<PluginAudit>,
    pub audio: Option<AudioSummary>,
    pub warnings: Vec<EvaluationWarning>,
}

/// Non-fatal problems reported next to a returned evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationWarning {
    #[error("evaluation record was not persisted: {0}")]
    Persistence(StoreError),
    #[error("voice summary failed: {0}")]
    VoiceRendering(PluginFailure),
    #[error("voice summary requested but no voice plugin is configured")]
    VoiceUnavailable,
}

/// Failures that prevent an evaluation from being produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("customer {0} not found")]
    NotFound(CustomerId),
    #[error("no data source returned usable data ({} failed)", .failures.len())]
    InsufficientData { failures: Vec<PluginAudit> },
    #[error("evaluation deadline elapsed after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    #[error("customer store failed: {0}")]
    CustomerStore(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("a {0} plugin is already registered")]
    DuplicateKind(PluginKind),
}

struct FanOut {
    audits: Vec<PluginAudit>,
    payloads: Vec<PluginPayload>,
    deadline_elapsed: bool,
}

/// Coordinates the fan-in plugins, scoring, decisioning, and persistence for one customer.
pub struct OrchestrationEngine<C, E> {
    customers: Arc<C>,
    evaluations: Arc<E>,
    plugins: Vec<Arc<dyn DataSourcePlugin>>,
    voice: Option<VoiceCommunicationPlugin>,
    calculator: RiskCalculator,
    policy: DecisionPolicy,
    config: OrchestrationConfig,
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
}

impl<C, E> OrchestrationEngine<C, E>
where
    C: CustomerStore + 'static,
    E: EvaluationStore + 'static,
{
    pub fn new(
        customers: Arc<C>,
        evaluations: Arc<E>,
        calculator: RiskCalculator,
        policy: DecisionPolicy,
        config: OrchestrationConfig,
    ) -> Self {
        Self {
            customers,
            evaluations,
            plugins: Vec::new(),
            voice: None,
            calculator,
            policy,
            config,
            clock: Arc::new(SystemClock),
            sequence: AtomicU64::new(1),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_voice(mut self, voice: VoiceCommunicationPlugin) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Adds a fan-in plugin; each kind may be registered once.
    pub fn register_plugin(
        &mut self,
        plugin: Arc<dyn DataSourcePlugin>,
    ) -> Result<(), RegistrationError> {
        let kind = plugin.kind();
        if self.plugins.iter().any(|existing| existing.kind() == kind) {
            return Err(RegistrationError::DuplicateKind(kind));
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// Registered kinds in registration order.
    pub fn plugin_kinds(&self) -> Vec<PluginKind> {
        self.plugins.iter().map(|plugin| plugin.kind()).collect()
    }

    pub fn has_voice(&self) -> bool {
        self.voice.is_some()
    }

    /// Stored evaluations for the customer, oldest first, under the persistence budget.
    pub async fn history(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<EvaluationRecord>, StoreError> {
        let budget = self.config.persistence_timeout;
        match timeout(budget, self.evaluations.list_for_customer(customer_id)).await {
            Ok(Ok(records)) => {
                debug!(%customer_id, records = records.len(), "evaluation history loaded");
                Ok(records)
            }
            Ok(Err(err)) => {
                warn!(%customer_id, error = %err, "evaluation history unavailable");
                Err(err)
            }
            Err(_) => {
                warn!(%customer_id, "evaluation history lookup timed out");
                Err(StoreError::TimedOut {
                    after_ms: millis(budget),
                })
            }
        }
    }

    pub async fn evaluate(
        &self,
        customer_id: &CustomerId,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        self.evaluate_with(customer_id, EvaluationOptions::default())
            .await
    }

    pub async fn evaluate_with(
        &self,
        customer_id: &CustomerId,
        options: EvaluationOptions,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        let started = Instant::now();
        let deadline = started + self.config.evaluation_timeout;
        info!(%customer_id, plugins = self.plugins.len(), "evaluation started");

        let profile = match timeout_at(deadline, self.customers.get_profile(customer_id)).await {
            Ok(Ok(Some(profile))) => profile,
            Ok(Ok(None)) => return Err(EvaluationError::NotFound(customer_id.clone())),
            Ok(Err(err)) => {
                warn!(%customer_id, error = %err, "customer lookup failed");
                return Err(EvaluationError::CustomerStore(err));
            }
            Err(_) => {
                warn!(%customer_id, "evaluation deadline elapsed during customer lookup");
                return Err(EvaluationError::Timeout {
                    elapsed_ms: millis(started.elapsed()),
                });
            }
        };

        let requested_at = self.clock.now();
        let fan_out = self
            .fan_out(customer_id, &profile, requested_at, deadline)
            .await;

        if fan_out.payloads.is_empty() {
            if fan_out.deadline_elapsed {
                warn!(
                    %customer_id,
                    "evaluation deadline elapsed before any data source answered"
                );
                return Err(EvaluationError::Timeout {
                    elapsed_ms: millis(started.elapsed()),
                });
            }
            warn!(%customer_id, "every data source failed");
            return Err(EvaluationError::InsufficientData {
                failures: fan_out.audits,
            });
        }

        let assessment = self
            .calculator
            .compute(&profile, &fan_out.payloads)
            .ok_or_else(|| EvaluationError::InsufficientData {
                failures: fan_out.audits.clone(),
            })?;

        let evaluation = RiskEvaluation {
            customer_id: customer_id.clone(),
            overall_score: assessment.overall_score,
            risk_level: assessment.risk_level,
            confidence: scoring::confidence(fan_out.payloads.len(), self.plugins.len()),
            factors: assessment.factors,
            market_insights: assessment.market_insights,
            recommendations: assessment.recommendations,
            evaluated_at: requested_at,
        };
        let decision = self.policy.decide(&evaluation);
        let evaluation_id = self.next_evaluation_id(customer_id);

        let record = EvaluationRecord {
            evaluation_id: evaluation_id.clone(),
            customer_id: customer_id.clone(),
            evaluation: evaluation.clone(),
            decision: decision.clone(),
            audit: AuditMetadata {
                model_version: self.calculator.config().model_version.clone(),
                plugins: fan_out.audits.clone(),
                recorded_at: self.clock.now(),
            },
        };

        let finish_by = deadline + COMPLETION_GRACE;
        let mut warnings = Vec::new();
        if let Err(err) = self.persist(record, finish_by).await {
            warn!(%customer_id, %evaluation_id, error = %err, "evaluation record not persisted");
            warnings.push(EvaluationWarning::Persistence(err));
        }

        let audio = if options.voice_summary {
            match self.render_voice(&evaluation, &decision, finish_by).await {
                Ok(audio) => Some(audio),
                Err(warning) => {
                    warn!(%customer_id, %evaluation_id, %warning, "voice summary skipped");
                    warnings.push(warning);
                    None
                }
            }
        } else {
            None
        };

        info!(
            %customer_id,
            %evaluation_id,
            score = evaluation.overall_score,
            level = evaluation.risk_level.label(),
            confidence = evaluation.confidence,
            decision = decision.label(),
            elapsed_ms = millis(started.elapsed()),
            "evaluation completed"
        );

        Ok(EvaluationOutcome {
            evaluation_id,
            evaluation,
            decision,
            plugins: fan_out.audits,
            audio,
            warnings,
        })
    }

    /// Polls every plugin on the current task until all answer or the deadline passes.
    /// Plugins still running at the deadline are dropped and recorded as timed out.
    async fn fan_out(
        &self,
        customer_id: &CustomerId,
        profile: &CustomerProfile,
        requested_at: DateTime<Utc>,
        deadline: Instant,
    ) -> FanOut {
        let fan_out_started = Instant::now();
        let mut pending: FuturesUnordered<_> = self
            .plugins
            .iter()
            .enumerate()
            .map(|(index, plugin)| {
                let budget = plugin.timeout().unwrap_or(self.config.plugin_timeout);
                let context = FetchContext {
                    profile: profile.clone(),
                    requested_at,
                    timeout: budget,
                };
                let plugin = Arc::clone(plugin);
                let customer_id = customer_id.clone();
                async move {
                    let result = match timeout(budget, plugin.fetch(&customer_id, &context)).await
                    {
                        Ok(result) => result,
                        Err(_) => PluginResult::Failure(PluginFailure::timeout(budget)),
                    };
                    (index, result)
                }
            })
            .collect();

        let mut results: Vec<Option<PluginResult>> = vec![None; self.plugins.len()];
        let mut deadline_elapsed = false;
        loop {
            match timeout_at(deadline, pending.next()).await {
                Ok(Some((index, result))) => results[index] = Some(result),
                Ok(None) => break,
                Err(_) => {
                    deadline_elapsed = true;
                    break;
                }
            }
        }
        drop(pending);

        let cut_off = fan_out_started.elapsed();
        let mut audits = Vec::with_capacity(results.len());
        let mut payloads = Vec::new();
        for (plugin, result) in self.plugins.iter().zip(results) {
            let kind = plugin.kind();
            let status = match result {
                Some(PluginResult::Success(payload)) if payload.kind() == kind => {
                    debug!(%customer_id, plugin = %kind, "data source answered");
                    payloads.push(payload);
                    PluginStatus::Succeeded
                }
                Some(PluginResult::Success(payload)) => {
                    let failure = PluginFailure::InvalidResponse(format!(
                        "{kind} plugin returned a {} payload",
                        payload.kind()
                    ));
                    warn!(%customer_id, plugin = %kind, %failure, "data source failed");
                    PluginStatus::Failed { failure }
                }
                Some(PluginResult::Failure(failure)) => {
                    warn!(%customer_id, plugin = %kind, %failure, "data source failed");
                    PluginStatus::Failed { failure }
                }
                None => {
                    let failure = PluginFailure::timeout(cut_off);
                    warn!(
                        %customer_id,
                        plugin = %kind,
                        %failure,
                        "data source cancelled at deadline"
                    );
                    PluginStatus::Failed { failure }
                }
            };
            audits.push(PluginAudit { kind, status });
        }

        FanOut {
            audits,
            payloads,
            deadline_elapsed,
        }
    }

    async fn persist(
        &self,
        record: EvaluationRecord,
        finish_by: Instant,
    ) -> Result<(), StoreError> {
        let started = Instant::now();
        let until = finish_by.min(started + self.config.persistence_timeout);
        match timeout_at(until, self.evaluations.save(record)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::TimedOut {
                after_ms: millis(started.elapsed()),
            }),
        }
    }

    async fn render_voice(
        &self,
        evaluation: &RiskEvaluation,
        decision: &CreditDecision,
        finish_by: Instant,
    ) -> Result<AudioSummary, EvaluationWarning> {
        let voice = self
            .voice
            .as_ref()
            .ok_or(EvaluationWarning::VoiceUnavailable)?;
        let started = Instant::now();
        let until = finish_by.min(started + self.config.voice_timeout);
        match timeout_at(until, voice.render_summary(evaluation, decision)).await {
            Ok(Ok(audio)) => Ok(audio),
            Ok(Err(failure)) => Err(EvaluationWarning::VoiceRendering(failure)),
            Err(_) => Err(EvaluationWarning::VoiceRendering(PluginFailure::timeout(
                started.elapsed(),
            ))),
        }
    }

    fn next_evaluation_id(&self, customer_id: &CustomerId) -> EvaluationId {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        EvaluationId(format!("eval-{customer_id}-{sequence:06}"))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
