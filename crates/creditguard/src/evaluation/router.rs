use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::decision::CreditDecision;
use super::domain::{CustomerId, EvaluationId, RiskEvaluation};
use super::engine::{EvaluationError, EvaluationOptions, EvaluationOutcome, OrchestrationEngine};
use super::plugins::AudioSummary;
use super::repository::{
    CustomerStore, EvaluationRecord, EvaluationStore, PluginAudit, StoreError,
};

/// Router exposing the evaluation RPC and the per-customer record trail.
pub fn evaluation_router<C, E>(engine: Arc<OrchestrationEngine<C, E>>) -> Router
where
    C: CustomerStore + 'static,
    E: EvaluationStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/customers/:customer_id/evaluations",
            post(evaluate_handler::<C, E>).get(history_handler::<C, E>),
        )
        .with_state(engine)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EvaluateParams {
    #[serde(default)]
    voice_summary: bool,
}

/// Response body for a completed evaluation.
#[derive(Debug, Serialize)]
pub struct EvaluationView {
    pub evaluation_id: EvaluationId,
    pub evaluation: RiskEvaluation,
    pub decision: CreditDecision,
    pub decision_summary: String,
    pub plugins: Vec<PluginAudit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_summary: Option<AudioSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<EvaluationOutcome> for EvaluationView {
    fn from(outcome: EvaluationOutcome) -> Self {
        Self {
            evaluation_id: outcome.evaluation_id,
            decision_summary: outcome.decision.summary(),
            evaluation: outcome.evaluation,
            decision: outcome.decision,
            plugins: outcome.plugins,
            voice_summary: outcome.audio,
            warnings: outcome
                .warnings
                .iter()
                .map(|warning| warning.to_string())
                .collect(),
        }
    }
}

pub(crate) async fn evaluate_handler<C, E>(
    State(engine): State<Arc<OrchestrationEngine<C, E>>>,
    Path(customer_id): Path<String>,
    Query(params): Query<EvaluateParams>,
) -> Response
where
    C: CustomerStore + 'static,
    E: EvaluationStore + 'static,
{
    let customer_id = CustomerId(customer_id);
    let options = EvaluationOptions {
        voice_summary: params.voice_summary,
    };

    match engine.evaluate_with(&customer_id, options).await {
        Ok(outcome) => (StatusCode::OK, axum::Json(EvaluationView::from(outcome))).into_response(),
        Err(err) => {
            let status = match &err {
                EvaluationError::NotFound(_) => StatusCode::NOT_FOUND,
                EvaluationError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                EvaluationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                EvaluationError::CustomerStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let mut payload = json!({
                "error": err.to_string(),
                "customer_id": customer_id.0,
            });
            if let EvaluationError::InsufficientData { failures } = &err {
                payload["plugins"] = json!(failures);
            }
            (status, axum::Json(payload)).into_response()
        }
    }
}

/// Response body for the stored evaluation trail.
#[derive(Debug, Serialize)]
pub struct EvaluationHistoryView {
    pub customer_id: CustomerId,
    pub evaluations: Vec<EvaluationRecord>,
}

pub(crate) async fn history_handler<C, E>(
    State(engine): State<Arc<OrchestrationEngine<C, E>>>,
    Path(customer_id): Path<String>,
) -> Response
where
    C: CustomerStore + 'static,
    E: EvaluationStore + 'static,
{
    let customer_id = CustomerId(customer_id);
    match engine.history(&customer_id).await {
        Ok(evaluations) => (
            StatusCode::OK,
            axum::Json(EvaluationHistoryView {
                customer_id,
                evaluations,
            }),
        )
            .into_response(),
        Err(err) => {
            let status = match &err {
                StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
                StoreError::Conflict => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let payload = json!({
                "error": err.to_string(),
                "customer_id": customer_id.0,
            });
            (status, axum::Json(payload)).into_response()
        }
    }
}
