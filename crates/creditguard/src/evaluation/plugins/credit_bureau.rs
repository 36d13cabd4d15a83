use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{
    CollaboratorError, DataSourcePlugin, FetchContext, PluginFailure, PluginKind, PluginPayload,
    PluginResult,
};
use crate::evaluation::domain::{BureauReport, CustomerId};

const MIN_CREDIT_SCORE: u16 = 300;
const MAX_CREDIT_SCORE: u16 = 850;

/// Network client for the credit bureau.
#[async_trait]
pub trait BureauClient: Send + Sync {
    async fn credit_report(&self, customer_id: &CustomerId)
        -> Result<BureauReport, CollaboratorError>;
}

/// Fan-in plugin pulling and validating a bureau credit report.
pub struct CreditBureauPlugin<C> {
    client: Arc<C>,
}

impl<C> CreditBureauPlugin<C>
where
    C: BureauClient + 'static,
{
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C> DataSourcePlugin for CreditBureauPlugin<C>
where
    C: BureauClient + 'static,
{
    fn kind(&self) -> PluginKind {
        PluginKind::CreditBureau
    }

    async fn fetch(&self, customer_id: &CustomerId, _context: &FetchContext) -> PluginResult {
        let outcome = match self.client.credit_report(customer_id).await {
            Ok(report) => validate_report(&report).map(|()| PluginPayload::CreditBureau(report)),
            Err(err) => Err(PluginFailure::from(err)),
        };

        if let Err(failure) = &outcome {
            debug!(%customer_id, %failure, "credit bureau fetch rejected");
        }

        outcome.into()
    }
}

pub(crate) fn validate_report(report: &BureauReport) -> Result<(), PluginFailure> {
    if !(MIN_CREDIT_SCORE..=MAX_CREDIT_SCORE).contains(&report.credit_score) {
        return Err(PluginFailure::InvalidResponse(format!(
            "credit score {} outside {MIN_CREDIT_SCORE}-{MAX_CREDIT_SCORE}",
            report.credit_score
        )));
    }

    for (label, value) in [
        ("debt_to_income", report.debt_to_income),
        ("credit_utilization", report.credit_utilization),
    ] {
        if let Some(ratio) = value {
            if !ratio.is_finite() || ratio < 0.0 {
                return Err(PluginFailure::InvalidResponse(format!(
                    "{label} ratio {ratio} is not a non-negative number"
                )));
            }
        }
    }

    if report.delinquent_accounts > report.total_accounts {
        return Err(PluginFailure::InvalidResponse(format!(
            "{} delinquent accounts exceed {} total",
            report.delinquent_accounts, report.total_accounts
        )));
    }

    Ok(())
}
