use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use crate::config::OrchestrationConfig;
use crate::evaluation::decision::CreditDecision;
use crate::evaluation::domain::{CustomerId, EvaluationId, RiskLevel};
use crate::evaluation::engine::{
    EvaluationError, EvaluationOptions, EvaluationWarning, RegistrationError, COMPLETION_GRACE,
};
use crate::evaluation::plugins::{
    PluginFailure, PluginKind, VoiceCommunicationPlugin, VoiceProfile,
};
use crate::evaluation::repository::{PluginAudit, PluginStatus, StoreError};

fn upstream_down() -> PluginFailure {
    PluginFailure::UpstreamError("search provider returned 503".to_string())
}

#[tokio::test]
async fn partial_data_scores_with_reduced_confidence() {
    let evaluations = Arc::new(MemoryEvaluations::default());
    let bureau = StaticPlugin::succeeding(bureau_payload(750, 0.35));
    let market = StaticPlugin::failing(PluginKind::MarketResearch, upstream_down());
    let engine = engine_with(
        MemoryCustomers::with(profile()),
        evaluations.clone(),
        vec![shared(&bureau), shared(&market)],
    );

    let outcome = engine
        .evaluate(&customer_id())
        .await
        .expect("evaluation completes");

    assert_eq!(outcome.evaluation.overall_score, 20.42);
    assert_eq!(outcome.evaluation.risk_level, RiskLevel::Low);
    assert_eq!(outcome.evaluation.confidence, 0.5);
    assert_eq!(outcome.decision, CreditDecision::Approved);
    assert!(outcome.warnings.is_empty());
    assert_eq!(
        outcome.plugins,
        vec![
            PluginAudit {
                kind: PluginKind::CreditBureau,
                status: PluginStatus::Succeeded,
            },
            PluginAudit {
                kind: PluginKind::MarketResearch,
                status: PluginStatus::Failed {
                    failure: upstream_down(),
                },
            },
        ]
    );

    let records = evaluations.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].evaluation, outcome.evaluation);
    assert_eq!(records[0].audit.plugins, outcome.plugins);
    assert_eq!(records[0].audit.model_version, "1.0.0");
    assert_eq!(bureau.calls(), 1);
    assert_eq!(market.calls(), 1);
}

#[tokio::test]
async fn every_plugin_failing_is_insufficient_data() {
    let evaluations = Arc::new(MemoryEvaluations::default());
    let bureau = StaticPlugin::failing(
        PluginKind::CreditBureau,
        PluginFailure::InvalidResponse("credit score 910 outside 300-850".to_string()),
    );
    let market = StaticPlugin::failing(PluginKind::MarketResearch, upstream_down());
    let engine = engine_with(
        MemoryCustomers::with(profile()),
        evaluations.clone(),
        vec![shared(&bureau), shared(&market)],
    );

    match engine.evaluate(&customer_id()).await {
        Err(EvaluationError::InsufficientData { failures }) => {
            assert_eq!(failures.len(), 2);
            assert!(failures.iter().all(|audit| !audit.status.succeeded()));
        }
        other => panic!("expected insufficient data, got {other:?}"),
    }
    assert!(evaluations.records().is_empty());
}

#[tokio::test]
async fn engine_without_plugins_has_no_data() {
    let evaluations = Arc::new(MemoryEvaluations::default());
    let engine = engine_with(
        MemoryCustomers::with(profile()),
        evaluations.clone(),
        Vec::new(),
    );

    assert_eq!(
        engine.evaluate(&customer_id()).await.map(|_| ()),
        Err(EvaluationError::InsufficientData {
            failures: Vec::new()
        })
    );
    assert!(evaluations.records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_plugin_times_out_without_blocking_siblings() {
    let bureau = StaticPlugin::succeeding(bureau_payload(750, 0.35));
    let market = StaticPlugin::slow(market_payload(Vec::new()), Duration::from_secs(10));
    let engine = engine_with(
        MemoryCustomers::with(profile()),
        Arc::new(MemoryEvaluations::default()),
        vec![shared(&bureau), shared(&market)],
    );

    let started = tokio::time::Instant::now();
    let outcome = engine
        .evaluate(&customer_id())
        .await
        .expect("evaluation completes");

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(500));
    assert_eq!(outcome.evaluation.confidence, 0.5);
    assert_eq!(
        outcome.plugins[1].status,
        PluginStatus::Failed {
            failure: PluginFailure::Timeout { after_ms: 200 },
        }
    );
}

#[tokio::test(start_paused = true)]
async fn global_deadline_cuts_off_stragglers() {
    let config = OrchestrationConfig {
        plugin_timeout: Duration::from_secs(5),
        evaluation_timeout: Duration::from_millis(500),
        ..orchestration_config()
    };
    let bureau = StaticPlugin::slow(bureau_payload(700, 0.3), Duration::from_millis(100));
    let market = StaticPlugin::slow(market_payload(Vec::new()), Duration::from_secs(3));
    let engine = engine_with_config(
        MemoryCustomers::with(profile()),
        Arc::new(MemoryEvaluations::default()),
        vec![shared(&bureau), shared(&market)],
        config,
    );

    let started = tokio::time::Instant::now();
    let outcome = engine
        .evaluate(&customer_id())
        .await
        .expect("bureau answered before the deadline");

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(500) && elapsed < Duration::from_secs(3));
    assert!(outcome.plugins[0].status.succeeded());
    assert!(matches!(
        outcome.plugins[1].status,
        PluginStatus::Failed {
            failure: PluginFailure::Timeout { .. }
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn deadline_without_any_answer_is_a_timeout() {
    let config = OrchestrationConfig {
        plugin_timeout: Duration::from_secs(5),
        evaluation_timeout: Duration::from_millis(500),
        ..orchestration_config()
    };
    let evaluations = Arc::new(MemoryEvaluations::default());
    let bureau = StaticPlugin::slow(bureau_payload(700, 0.3), Duration::from_secs(2));
    let market = StaticPlugin::slow(market_payload(Vec::new()), Duration::from_secs(3));
    let engine = engine_with_config(
        MemoryCustomers::with(profile()),
        evaluations.clone(),
        vec![shared(&bureau), shared(&market)],
        config,
    );

    match engine.evaluate(&customer_id()).await {
        Err(EvaluationError::Timeout { elapsed_ms }) => {
            assert!((500..2_000).contains(&elapsed_ms), "elapsed {elapsed_ms}ms")
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(evaluations.records().is_empty());
}

#[tokio::test]
async fn persistence_failure_is_reported_as_warning() {
    let bureau = StaticPlugin::succeeding(bureau_payload(750, 0.35));
    let engine = engine_with(
        MemoryCustomers::with(profile()),
        Arc::new(UnavailableEvaluations),
        vec![shared(&bureau)],
    );

    let outcome = engine
        .evaluate(&customer_id())
        .await
        .expect("evaluation still returned");

    assert_eq!(outcome.evaluation.confidence, 1.0);
    assert_eq!(
        outcome.warnings,
        vec![EvaluationWarning::Persistence(StoreError::Unavailable(
            "evaluation table offline".to_string()
        ))]
    );
}

#[tokio::test(start_paused = true)]
async fn slow_store_and_voice_finish_within_deadline_grace() {
    let config = OrchestrationConfig {
        plugin_timeout: Duration::from_secs(5),
        evaluation_timeout: Duration::from_millis(500),
        persistence_timeout: Duration::from_secs(2),
        voice_timeout: Duration::from_secs(2),
    };
    let evaluations = SlowEvaluations::after(Duration::from_millis(950));
    let bureau = StaticPlugin::slow(bureau_payload(750, 0.35), Duration::from_millis(490));
    let engine = engine_with_config(
        MemoryCustomers::with(profile()),
        evaluations.clone(),
        vec![shared(&bureau)],
        config,
    )
    .with_voice(VoiceCommunicationPlugin::new(
        Arc::new(SlowSynthesizer(Duration::from_secs(1))),
        VoiceProfile::default(),
    ));

    let started = tokio::time::Instant::now();
    let outcome = engine
        .evaluate_with(
            &customer_id(),
            EvaluationOptions {
                voice_summary: true,
            },
        )
        .await
        .expect("scored before the deadline");

    let elapsed = started.elapsed();
    assert!(
        elapsed <= Duration::from_millis(500) + COMPLETION_GRACE,
        "elapsed {elapsed:?}"
    );
    assert!(outcome.audio.is_none());
    assert_eq!(
        outcome.warnings,
        vec![
            EvaluationWarning::Persistence(StoreError::TimedOut { after_ms: 260 }),
            EvaluationWarning::VoiceRendering(PluginFailure::Timeout { after_ms: 0 }),
        ]
    );
    assert!(evaluations.inner.records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn fast_store_keeps_its_own_budget_inside_the_grace() {
    let evaluations = SlowEvaluations::after(Duration::from_millis(150));
    let engine = engine_with(
        MemoryCustomers::with(profile()),
        evaluations.clone(),
        vec![shared(&StaticPlugin::succeeding(bureau_payload(750, 0.35)))],
    );

    let outcome = engine
        .evaluate(&customer_id())
        .await
        .expect("evaluation completes");

    assert_eq!(
        outcome.warnings,
        vec![EvaluationWarning::Persistence(StoreError::TimedOut {
            after_ms: 100
        })]
    );
}

#[tokio::test]
async fn history_returns_only_the_customers_records_in_order() {
    let evaluations = Arc::new(MemoryEvaluations::default());
    let engine = engine_with(
        MemoryCustomers::with(profile()),
        evaluations.clone(),
        vec![shared(&StaticPlugin::succeeding(bureau_payload(750, 0.35)))],
    );
    let first = engine.evaluate(&customer_id()).await.expect("first run");
    let second = engine.evaluate(&customer_id()).await.expect("second run");

    let history = engine.history(&customer_id()).await.expect("history");
    let ids: Vec<EvaluationId> = history
        .into_iter()
        .map(|record| record.evaluation_id)
        .collect();
    assert_eq!(ids, vec![first.evaluation_id, second.evaluation_id]);

    let other = engine
        .history(&CustomerId("cust-404".to_string()))
        .await
        .expect("history");
    assert!(other.is_empty());
}

#[tokio::test(start_paused = true)]
async fn history_lookup_is_bounded_by_the_persistence_budget() {
    let engine = engine_with(
        MemoryCustomers::with(profile()),
        SlowEvaluations::after(Duration::from_secs(5)),
        Vec::new(),
    );

    assert_eq!(
        engine.history(&customer_id()).await,
        Err(StoreError::TimedOut { after_ms: 100 })
    );
}

#[tokio::test]
async fn unknown_customer_is_not_found_and_skips_plugins() {
    let bureau = StaticPlugin::succeeding(bureau_payload(750, 0.35));
    let engine = engine_with(
        MemoryCustomers::with(profile()),
        Arc::new(MemoryEvaluations::default()),
        vec![shared(&bureau)],
    );
    let missing = CustomerId("cust-404".to_string());

    assert_eq!(
        engine.evaluate(&missing).await.map(|_| ()),
        Err(EvaluationError::NotFound(missing.clone()))
    );
    assert_eq!(bureau.calls(), 0);
}

#[tokio::test]
async fn customer_store_errors_surface() {
    let engine = engine_with(
        Arc::new(UnavailableCustomers),
        Arc::new(MemoryEvaluations::default()),
        vec![shared(&StaticPlugin::succeeding(bureau_payload(750, 0.35)))],
    );

    assert!(matches!(
        engine.evaluate(&customer_id()).await,
        Err(EvaluationError::CustomerStore(StoreError::Unavailable(_)))
    ));
}

#[test]
fn duplicate_plugin_kinds_are_rejected() {
    let mut engine = engine_with(
        MemoryCustomers::with(profile()),
        Arc::new(MemoryEvaluations::default()),
        vec![shared(&StaticPlugin::succeeding(bureau_payload(750, 0.35)))],
    );

    let result = engine.register_plugin(shared(&StaticPlugin::succeeding(bureau_payload(
        600, 0.4,
    ))));
    assert_eq!(
        result,
        Err(RegistrationError::DuplicateKind(PluginKind::CreditBureau))
    );
    assert_eq!(engine.plugin_kinds(), vec![PluginKind::CreditBureau]);
}

#[tokio::test]
async fn payload_of_another_kind_is_an_invalid_response() {
    let engine = engine_with(
        MemoryCustomers::with(profile()),
        Arc::new(MemoryEvaluations::default()),
        vec![
            shared(&StaticPlugin::succeeding(bureau_payload(750, 0.35))),
            shared(&StaticPlugin::mislabeled(
                PluginKind::MarketResearch,
                bureau_payload(300, 0.9),
            )),
        ],
    );

    let outcome = engine
        .evaluate(&customer_id())
        .await
        .expect("bureau answered");

    assert_eq!(outcome.evaluation.confidence, 0.5);
    assert_eq!(outcome.evaluation.overall_score, 20.42);
    assert_eq!(
        outcome.plugins[1].status,
        PluginStatus::Failed {
            failure: PluginFailure::InvalidResponse(
                "market_research plugin returned a credit_bureau payload".to_string()
            ),
        }
    );
}

#[tokio::test]
async fn identical_inputs_produce_identical_records() {
    let mut serialized = Vec::new();
    for _ in 0..2 {
        let evaluations = Arc::new(MemoryEvaluations::default());
        let engine = engine_with(
            MemoryCustomers::with(profile()),
            evaluations.clone(),
            vec![
                shared(&StaticPlugin::succeeding(bureau_payload(690, 0.38))),
                shared(&StaticPlugin::succeeding(worst_market_payload())),
            ],
        );
        engine
            .evaluate(&customer_id())
            .await
            .expect("evaluation completes");
        let records = evaluations.records();
        serialized.push(serde_json::to_string(&records).expect("records serialize"));
    }

    assert_eq!(serialized[0], serialized[1]);
}

#[tokio::test]
async fn evaluation_ids_follow_the_engine_sequence() {
    let engine = engine_with(
        MemoryCustomers::with(profile()),
        Arc::new(MemoryEvaluations::default()),
        vec![shared(&StaticPlugin::succeeding(bureau_payload(750, 0.35)))],
    );

    let first = engine.evaluate(&customer_id()).await.expect("first run");
    let second = engine.evaluate(&customer_id()).await.expect("second run");

    assert_eq!(
        first.evaluation_id,
        EvaluationId("eval-cust-001-000001".to_string())
    );
    assert_eq!(
        second.evaluation_id,
        EvaluationId("eval-cust-001-000002".to_string())
    );
}

#[tokio::test]
async fn voice_summary_is_rendered_on_request() {
    let engine = engine_with(
        MemoryCustomers::with(profile()),
        Arc::new(MemoryEvaluations::default()),
        vec![shared(&StaticPlugin::succeeding(bureau_payload(750, 0.35)))],
    )
    .with_voice(VoiceCommunicationPlugin::new(
        Arc::new(EchoSynthesizer),
        VoiceProfile::default(),
    ));

    let silent = engine.evaluate(&customer_id()).await.expect("evaluation");
    assert!(silent.audio.is_none());

    let narrated = engine
        .evaluate_with(
            &customer_id(),
            EvaluationOptions {
                voice_summary: true,
            },
        )
        .await
        .expect("evaluation");
    let audio = narrated.audio.expect("audio rendered");
    assert!(audio.transcript.contains("Decision: approved."));
    assert!(narrated.warnings.is_empty());
}

#[tokio::test]
async fn voice_problems_do_not_fail_the_evaluation() {
    let without_voice = engine_with(
        MemoryCustomers::with(profile()),
        Arc::new(MemoryEvaluations::default()),
        vec![shared(&StaticPlugin::succeeding(bureau_payload(750, 0.35)))],
    );
    let options = EvaluationOptions {
        voice_summary: true,
    };

    let outcome = without_voice
        .evaluate_with(&customer_id(), options)
        .await
        .expect("evaluation");
    assert_eq!(outcome.warnings, vec![EvaluationWarning::VoiceUnavailable]);

    let silent_voice = engine_with(
        MemoryCustomers::with(profile()),
        Arc::new(MemoryEvaluations::default()),
        vec![shared(&StaticPlugin::succeeding(bureau_payload(750, 0.35)))],
    )
    .with_voice(VoiceCommunicationPlugin::new(
        Arc::new(SilentSynthesizer),
        VoiceProfile::default(),
    ));

    let outcome = silent_voice
        .evaluate_with(&customer_id(), options)
        .await
        .expect("evaluation");
    assert!(outcome.audio.is_none());
    assert!(matches!(
        outcome.warnings.as_slice(),
        [EvaluationWarning::VoiceRendering(PluginFailure::InvalidResponse(_))]
    ));
}
