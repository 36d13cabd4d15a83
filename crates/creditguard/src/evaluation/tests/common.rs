use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::OrchestrationConfig;
use crate::evaluation::decision::DecisionPolicy;
use crate::evaluation::domain::{
    BureauReport, CreditHistory, CustomerId, CustomerProfile, EmploymentInfo, InsightCategory,
    MarketInsight, MarketIntelligence, PaymentHistory, RiskLevel,
};
use crate::evaluation::engine::OrchestrationEngine;
use crate::evaluation::plugins::{
    BureauClient, CollaboratorError, DataSourcePlugin, FetchContext, MarketSearch, PluginFailure,
    PluginKind, PluginPayload, PluginResult, SearchHit, SearchQuery, SpeechSynthesizer,
};
use crate::evaluation::repository::{CustomerStore, EvaluationRecord, EvaluationStore, StoreError};
use crate::evaluation::scoring;
use crate::time::FixedClock;

pub(super) fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn customer_id() -> CustomerId {
    CustomerId("cust-001".to_string())
}

pub(super) fn profile() -> CustomerProfile {
    CustomerProfile {
        customer_id: customer_id(),
        full_name: "Dana Whitfield".to_string(),
        annual_income: 84_000,
        employment: EmploymentInfo {
            occupation: "nurse".to_string(),
            employer: Some("Mercy General".to_string()),
            years_employed: 6.5,
        },
        credit_history: CreditHistory {
            reported_credit_score: Some(742),
            monthly_debt_payments: 1_400,
            open_accounts: 5,
            delinquent_accounts: 0,
        },
        requested_limit: Some(12_000),
    }
}

pub(super) fn bureau_payload(score: u16, debt_to_income: f64) -> PluginPayload {
    PluginPayload::CreditBureau(BureauReport::basic(score, debt_to_income))
}

pub(super) fn insight(category: InsightCategory, severity: RiskLevel) -> MarketInsight {
    MarketInsight {
        category,
        severity,
        title: category.title().to_string(),
        summary: "3 matching report(s)".to_string(),
        confidence: 0.45,
        sources: vec!["Reuters".to_string()],
    }
}

pub(super) fn market_payload(insights: Vec<MarketInsight>) -> PluginPayload {
    PluginPayload::MarketResearch(MarketIntelligence {
        query: "credit card fraud trends 2025 nurse".to_string(),
        insights,
    })
}

/// Every fraud category rated High: the riskiest market payload the rubric can see.
/// Every category graded High.
pub(super) fn worst_market_payload() -> PluginPayload {
    market_payload(
        InsightCategory::ALL
            .into_iter()
            .map(|category| insight(category, RiskLevel::High))
            .collect(),
    )
}

/// Lowest score and every optional metric at its worst band.
pub(super) fn worst_bureau_payload() -> PluginPayload {
    PluginPayload::CreditBureau(BureauReport {
        credit_score: 300,
        debt_to_income: Some(0.9),
        credit_utilization: Some(1.0),
        payment_history: Some(PaymentHistory::Poor),
        delinquent_accounts: 6,
        total_accounts: 8,
        hard_inquiries_6m: Some(9),
    })
}

pub(super) fn hit(title: &str, description: &str, source: &str) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        description: description.to_string(),
        url: format!("https://news.example/{}", title.to_lowercase().replace(' ', "-")),
        source: source.to_string(),
    }
}

pub(super) fn fetch_context() -> FetchContext {
    FetchContext {
        profile: profile(),
        requested_at: fixed_time(),
        timeout: Duration::from_secs(2),
    }
}

/// Plugin answering with a canned result after an optional delay.
pub(super) struct StaticPlugin {
    kind: PluginKind,
    result: PluginResult,
    delay: Duration,
    calls: AtomicUsize,
}

impl StaticPlugin {
    pub(super) fn succeeding(payload: PluginPayload) -> Arc<Self> {
        Arc::new(Self {
            kind: payload.kind(),
            result: PluginResult::Success(payload),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub(super) fn failing(kind: PluginKind, failure: PluginFailure) -> Arc<Self> {
        Arc::new(Self {
            kind,
            result: PluginResult::Failure(failure),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub(super) fn slow(payload: PluginPayload, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind: payload.kind(),
            result: PluginResult::Success(payload),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    /// Reports `kind` while answering with a payload of another kind.
    pub(super) fn mislabeled(kind: PluginKind, payload: PluginPayload) -> Arc<Self> {
        Arc::new(Self {
            kind,
            result: PluginResult::Success(payload),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub(super) fn shared(plugin: &Arc<StaticPlugin>) -> Arc<dyn DataSourcePlugin> {
    plugin.clone()
}

#[async_trait]
impl DataSourcePlugin for StaticPlugin {
    fn kind(&self) -> PluginKind {
        self.kind
    }

    async fn fetch(&self, _customer_id: &CustomerId, _context: &FetchContext) -> PluginResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

#[derive(Default)]
pub(super) struct MemoryCustomers {
    profiles: Mutex<HashMap<CustomerId, CustomerProfile>>,
}

impl MemoryCustomers {
    pub(super) fn with(profile: CustomerProfile) -> Arc<Self> {
        let store = Self::default();
        store
            .profiles
            .lock()
            .expect("customer mutex poisoned")
            .insert(profile.customer_id.clone(), profile);
        Arc::new(store)
    }
}

#[async_trait]
impl CustomerStore for MemoryCustomers {
    async fn get_profile(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<CustomerProfile>, StoreError> {
        let profiles = self.profiles.lock().expect("customer mutex poisoned");
        Ok(profiles.get(customer_id).cloned())
    }
}

pub(super) struct UnavailableCustomers;

#[async_trait]
impl CustomerStore for UnavailableCustomers {
    async fn get_profile(
        &self,
        _customer_id: &CustomerId,
    ) -> Result<Option<CustomerProfile>, StoreError> {
        Err(StoreError::Unavailable("profile database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryEvaluations {
    records: Mutex<Vec<EvaluationRecord>>,
}

impl MemoryEvaluations {
    pub(super) fn records(&self) -> Vec<EvaluationRecord> {
        self.records
            .lock()
            .expect("evaluation mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl EvaluationStore for MemoryEvaluations {
    async fn save(&self, record: EvaluationRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .expect("evaluation mutex poisoned")
            .push(record);
        Ok(())
    }

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<EvaluationRecord>, StoreError> {
        Ok(self
            .records()
            .into_iter()
            .filter(|record| &record.customer_id == customer_id)
            .collect())
    }
}

pub(super) struct UnavailableEvaluations;

#[async_trait]
impl EvaluationStore for UnavailableEvaluations {
    async fn save(&self, _record: EvaluationRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("evaluation table offline".to_string()))
    }

    async fn list_for_customer(
        &self,
        _customer_id: &CustomerId,
    ) -> Result<Vec<EvaluationRecord>, StoreError> {
        Err(StoreError::Unavailable("evaluation table offline".to_string()))
    }
}

/// Accepts every write, but only after `delay`.
pub(super) struct SlowEvaluations {
    delay: Duration,
    pub(super) inner: MemoryEvaluations,
}

impl SlowEvaluations {
    pub(super) fn after(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            inner: MemoryEvaluations::default(),
        })
    }
}

#[async_trait]
impl EvaluationStore for SlowEvaluations {
    async fn save(&self, record: EvaluationRecord) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.save(record).await
    }

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<EvaluationRecord>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_for_customer(customer_id).await
    }
}

pub(super) struct StubBureau(pub(super) Result<BureauReport, CollaboratorError>);

#[async_trait]
impl BureauClient for StubBureau {
    async fn credit_report(
        &self,
        _customer_id: &CustomerId,
    ) -> Result<BureauReport, CollaboratorError> {
        self.0.clone()
    }
}

#[derive(Default)]
pub(super) struct StubSearch {
    pub(super) hits: Vec<SearchHit>,
    pub(super) queries: Mutex<Vec<SearchQuery>>,
}

#[async_trait]
impl MarketSearch for StubSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, CollaboratorError> {
        self.queries
            .lock()
            .expect("query mutex poisoned")
            .push(query.clone());
        Ok(self.hits.clone())
    }
}

/// Synthesizer returning the SSML bytes back as "audio".
pub(super) struct EchoSynthesizer;

#[async_trait]
impl SpeechSynthesizer for EchoSynthesizer {
    async fn synthesize(&self, ssml: &str) -> Result<Vec<u8>, CollaboratorError> {
        Ok(ssml.as_bytes().to_vec())
    }
}

pub(super) struct SlowSynthesizer(pub(super) Duration);

#[async_trait]
impl SpeechSynthesizer for SlowSynthesizer {
    async fn synthesize(&self, ssml: &str) -> Result<Vec<u8>, CollaboratorError> {
        tokio::time::sleep(self.0).await;
        Ok(ssml.as_bytes().to_vec())
    }
}

pub(super) struct SilentSynthesizer;

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn synthesize(&self, _ssml: &str) -> Result<Vec<u8>, CollaboratorError> {
        Ok(Vec::new())
    }
}

pub(super) fn orchestration_config() -> OrchestrationConfig {
    OrchestrationConfig {
        plugin_timeout: Duration::from_millis(200),
        evaluation_timeout: Duration::from_millis(500),
        persistence_timeout: Duration::from_millis(100),
        voice_timeout: Duration::from_millis(100),
    }
}

pub(super) fn engine_with<C, E>(
    customers: Arc<C>,
    evaluations: Arc<E>,
    plugins: Vec<Arc<dyn DataSourcePlugin>>,
) -> OrchestrationEngine<C, E>
where
    C: CustomerStore + 'static,
    E: EvaluationStore + 'static,
{
    engine_with_config(customers, evaluations, plugins, orchestration_config())
}

pub(super) fn engine_with_config<C, E>(
    customers: Arc<C>,
    evaluations: Arc<E>,
    plugins: Vec<Arc<dyn DataSourcePlugin>>,
    config: OrchestrationConfig,
) -> OrchestrationEngine<C, E>
where
    C: CustomerStore + 'static,
    E: EvaluationStore + 'static,
{
    let mut engine = OrchestrationEngine::new(
        customers,
        evaluations,
        scoring::calculator(),
        DecisionPolicy::default(),
        config,
    )
    .with_clock(Arc::new(FixedClock(fixed_time())));
    for plugin in plugins {
        engine.register_plugin(plugin).expect("unique plugin kinds");
    }
    engine
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
