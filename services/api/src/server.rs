use crate::infra::{
    AppState, InMemoryCustomerStore, InMemoryEvaluationStore, SandboxBureau, StaticMarketFeed,
    TranscriptSynthesizer,
};
use crate::routes::with_evaluation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use creditguard::config::{AppConfig, OrchestrationConfig};
use creditguard::error::AppError;
use creditguard::evaluation::{
    CreditBureauPlugin, DecisionPolicy, MarketResearchPlugin, OrchestrationEngine, RiskCalculator,
    ScoringConfig, VoiceCommunicationPlugin, VoiceProfile,
};
use creditguard::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) type SandboxEngine = OrchestrationEngine<InMemoryCustomerStore, InMemoryEvaluationStore>;

pub(crate) async fn run() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let customers = InMemoryCustomerStore::load(config.customer_fixtures.as_deref())?;
    let customer_count = customers.len();
    let engine = build_engine(
        customers,
        config.scoring.clone(),
        config.decision.clone(),
        config.orchestration,
    )?;
    let plugins: Vec<&str> = engine.plugin_kinds().iter().map(|kind| kind.label()).collect();
    info!(customers = customer_count, ?plugins, voice = engine.has_voice(), "engine assembled");

    let app = with_evaluation_routes(Arc::new(engine))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "credit risk orchestrator ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Wires the sandbox collaborators behind the bureau, market, and voice plugins.
pub(crate) fn build_engine(
    customers: InMemoryCustomerStore,
    scoring: ScoringConfig,
    decision: DecisionPolicy,
    orchestration: OrchestrationConfig,
) -> Result<SandboxEngine, AppError> {
    let calculator = RiskCalculator::new(scoring)?;
    let bureau = SandboxBureau::new(customers.clone());

    let mut engine = OrchestrationEngine::new(
        Arc::new(customers),
        Arc::new(InMemoryEvaluationStore::default()),
        calculator,
        decision,
        orchestration,
    )
    .with_voice(VoiceCommunicationPlugin::new(
        Arc::new(TranscriptSynthesizer),
        VoiceProfile::default(),
    ));

    engine.register_plugin(Arc::new(CreditBureauPlugin::new(Arc::new(bureau))))?;
    engine.register_plugin(Arc::new(MarketResearchPlugin::new(Arc::new(
        StaticMarketFeed::default(),
    ))))?;
    Ok(engine)
}
