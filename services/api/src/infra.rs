use async_trait::async_trait;
use creditguard::error::AppError;
use creditguard::evaluation::{
    BureauClient, BureauReport, CollaboratorError, CreditHistory, CustomerId, CustomerProfile,
    CustomerStore, EmploymentInfo, EvaluationRecord, EvaluationStore, MarketSearch,
    PaymentHistory, SearchHit, SearchQuery, SpeechSynthesizer, StoreError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCustomerStore {
    profiles: Arc<Mutex<HashMap<CustomerId, CustomerProfile>>>,
}

impl InMemoryCustomerStore {
    pub(crate) fn from_profiles(profiles: Vec<CustomerProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| (profile.customer_id.clone(), profile))
            .collect();
        Self {
            profiles: Arc::new(Mutex::new(profiles)),
        }
    }

    /// Reads a JSON array of profiles, or seeds the sandbox customers when no path is set.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let Some(path) = path else {
            return Ok(Self::from_profiles(sample_profiles()));
        };

        let raw = std::fs::read_to_string(path)?;
        let profiles: Vec<CustomerProfile> =
            serde_json::from_str(&raw).map_err(|source| AppError::Fixtures {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_profiles(profiles))
    }

    pub(crate) fn len(&self) -> usize {
        self.profiles.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    fn lookup(&self, customer_id: &CustomerId) -> Result<Option<CustomerProfile>, StoreError> {
        let guard = self
            .profiles
            .lock()
            .map_err(|_| StoreError::Unavailable("customer store mutex poisoned".to_string()))?;
        Ok(guard.get(customer_id).cloned())
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn get_profile(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<CustomerProfile>, StoreError> {
        self.lookup(customer_id)
    }
}

/// Append-only evaluation trail.
#[derive(Default, Clone)]
pub(crate) struct InMemoryEvaluationStore {
    records: Arc<Mutex<Vec<EvaluationRecord>>>,
}

impl InMemoryEvaluationStore {
    #[cfg(test)]
    pub(crate) fn records(&self) -> Vec<EvaluationRecord> {
        self.records
            .lock()
            .expect("evaluation store mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl EvaluationStore for InMemoryEvaluationStore {
    async fn save(&self, record: EvaluationRecord) -> Result<(), StoreError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("evaluation store mutex poisoned".to_string()))?;
        if guard
            .iter()
            .any(|existing| existing.evaluation_id == record.evaluation_id)
        {
            return Err(StoreError::Conflict);
        }
        guard.push(record);
        Ok(())
    }

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<EvaluationRecord>, StoreError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("evaluation store mutex poisoned".to_string()))?;
        Ok(guard
            .iter()
            .filter(|record| &record.customer_id == customer_id)
            .cloned()
            .collect())
    }
}

/// Bureau stand-in that answers from the credit history held on the customer file.
pub(crate) struct SandboxBureau {
    customers: InMemoryCustomerStore,
}

impl SandboxBureau {
    pub(crate) fn new(customers: InMemoryCustomerStore) -> Self {
        Self { customers }
    }
}

#[async_trait]
impl BureauClient for SandboxBureau {
    async fn credit_report(
        &self,
        customer_id: &CustomerId,
    ) -> Result<BureauReport, CollaboratorError> {
        let profile = self
            .customers
            .lookup(customer_id)
            .map_err(|err| CollaboratorError::Unavailable(err.to_string()))?
            .ok_or_else(|| {
                CollaboratorError::Rejected(format!("no bureau file for {customer_id}"))
            })?;
        sandbox_report(&profile.credit_history).ok_or_else(|| {
            CollaboratorError::Unavailable(format!("no reported score for {customer_id}"))
        })
    }
}

fn sandbox_report(history: &CreditHistory) -> Option<BureauReport> {
    let credit_score = history.reported_credit_score?;
    let payment_history = match history.delinquent_accounts {
        0 => PaymentHistory::Good,
        1 => PaymentHistory::Fair,
        _ => PaymentHistory::Poor,
    };

    Some(BureauReport {
        credit_score,
        debt_to_income: None,
        credit_utilization: None,
        payment_history: Some(payment_history),
        delinquent_accounts: history.delinquent_accounts,
        total_accounts: history.open_accounts.max(history.delinquent_accounts),
        hard_inquiries_6m: None,
    })
}

/// Canned headlines served in place of a live news search.
pub(crate) struct StaticMarketFeed {
    hits: Vec<SearchHit>,
}

impl Default for StaticMarketFeed {
    fn default() -> Self {
        let hits = [
            (
                "Regional lenders report steady delinquency rates",
                "Consumer credit delinquency rates held flat as unemployment stayed low",
                "Lending Desk",
            ),
            (
                "Card skimming incidents climb at fuel pumps",
                "Retail fraud investigators warn of a surge in skimming devices",
                "Payments Wire",
            ),
            (
                "Healthcare hiring remains strong",
                "Hospitals continue adding staff despite slower job growth elsewhere",
                "Labor Report",
            ),
        ]
        .into_iter()
        .map(|(title, description, source)| SearchHit {
            title: title.to_string(),
            description: description.to_string(),
            url: format!(
                "https://sandbox.news/{}",
                title.to_lowercase().replace(' ', "-")
            ),
            source: source.to_string(),
        })
        .collect();
        Self { hits }
    }
}

#[async_trait]
impl MarketSearch for StaticMarketFeed {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, CollaboratorError> {
        Ok(self.hits.iter().take(query.max_results).cloned().collect())
    }
}

/// Returns the SSML document itself as the audio body.
pub(crate) struct TranscriptSynthesizer;

#[async_trait]
impl SpeechSynthesizer for TranscriptSynthesizer {
    async fn synthesize(&self, ssml: &str) -> Result<Vec<u8>, CollaboratorError> {
        Ok(ssml.as_bytes().to_vec())
    }
}

pub(crate) fn sample_profiles() -> Vec<CustomerProfile> {
    vec![
        sample_profile("cust-001", "Avery Chen", 92_000, "registered nurse", 6.5, 720, 1_450, 5, 0),
        sample_profile("cust-002", "Jordan Patel", 48_000, "retail associate", 1.0, 610, 1_900, 6, 2),
        sample_profile("cust-003", "Riley Okafor", 135_000, "software engineer", 9.0, 790, 2_100, 8, 0),
    ]
}

#[allow(clippy::too_many_arguments)]
fn sample_profile(
    id: &str,
    full_name: &str,
    annual_income: u32,
    occupation: &str,
    years_employed: f32,
    reported_credit_score: u16,
    monthly_debt_payments: u32,
    open_accounts: u16,
    delinquent_accounts: u16,
) -> CustomerProfile {
    CustomerProfile {
        customer_id: CustomerId(id.to_string()),
        full_name: full_name.to_string(),
        annual_income,
        employment: EmploymentInfo {
            occupation: occupation.to_string(),
            employer: None,
            years_employed,
        },
        credit_history: CreditHistory {
            reported_credit_score: Some(reported_credit_score),
            monthly_debt_payments,
            open_accounts,
            delinquent_accounts,
        },
        requested_limit: None,
    }
}
