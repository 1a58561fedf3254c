// Integration tests for the model server cache and prediction flow

mod common;

use common::{artifact, registry, server, serving_config, MockBackends};
use futures::future::join_all;
use modelwatch::compute::{
    DefaultBackends, ModelArtifact, ModelFramework, ModelServer, PredictionRequest, ServerEvent,
    StaticRegistry,
};
use modelwatch::ModelwatchError;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_cache_never_exceeds_capacity() {
    let models = [("a", "v1"), ("b", "v1"), ("c", "v1"), ("d", "v1")];
    let (server, _log) = server(serving_config(2), registry(&models), MockBackends::new());

    for (id, _) in models.iter().cycle().take(12) {
        server.get_or_load_model(id, None).await.unwrap();
        assert!(server.resident_count() <= 2);
    }
    assert_eq!(server.resident_count(), 2);
}

#[tokio::test]
async fn test_least_recently_used_is_evicted() {
    let models = [("a", "v1"), ("b", "v1"), ("c", "v1")];
    let (server, log) = server(serving_config(2), registry(&models), MockBackends::new());

    server.get_or_load_model("a", None).await.unwrap();
    server.get_or_load_model("b", None).await.unwrap();
    server.get_or_load_model("a", None).await.unwrap();
    server.get_or_load_model("c", None).await.unwrap();

    assert!(server.is_resident("a", None));
    assert!(!server.is_resident("b", None));
    assert!(server.is_resident("c", None));
    assert_eq!(log.matching("unload:"), vec!["unload:b:v1".to_string()]);
}

#[tokio::test]
async fn test_eviction_happens_before_next_load() {
    let models = [("threat-classifier", "v1"), ("vuln-predictor", "v1")];
    let (server, log) = server(serving_config(1), registry(&models), MockBackends::new());

    server
        .predict(PredictionRequest::new("threat-classifier", json!([1.0, 2.0])).with_version("v1"))
        .await
        .unwrap();
    server
        .predict(PredictionRequest::new("vuln-predictor", json!([1.0, 2.0])).with_version("v1"))
        .await
        .unwrap();

    let lifecycle: Vec<String> = log
        .entries()
        .into_iter()
        .filter(|e| !e.starts_with("predict:"))
        .collect();
    assert_eq!(
        lifecycle,
        vec![
            "load:threat-classifier:v1",
            "unload:threat-classifier:v1",
            "load:vuln-predictor:v1",
        ]
    );
    assert_eq!(server.resident_count(), 1);
    assert_eq!(server.stats().evictions.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_concurrent_misses_share_one_load() {
    let backends = MockBackends::new().with_load_delay(Duration::from_millis(50));
    let (server, log) = server(serving_config(2), registry(&[("a", "v1")]), backends);

    let results = join_all((0..8).map(|_| server.get_or_load_model("a", None))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(log.matching("load:"), vec!["load:a:v1".to_string()]);
    assert_eq!(server.stats().loads.load(Ordering::Relaxed), 1);
    assert_eq!(server.resident_count(), 1);
}

#[tokio::test]
async fn test_batch_is_grouped_by_model() {
    let (server, _log) = server(
        serving_config(2),
        registry(&[("a", "v1"), ("b", "v1")]),
        MockBackends::new(),
    );

    let responses = server
        .batch_predict(vec![
            PredictionRequest::new("a", json!([1.0])),
            PredictionRequest::new("b", json!([2.0])),
            PredictionRequest::new("a", json!([3.0])),
        ])
        .await
        .unwrap();

    let ids: Vec<&str> = responses.iter().map(|r| r.model_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "a", "b"]);
    let outputs: Vec<serde_json::Value> = responses.iter().map(|r| r.predictions.clone()).collect();
    assert_eq!(outputs, vec![json!([1.0]), json!([3.0]), json!([2.0])]);
}

#[tokio::test]
async fn test_batch_stops_at_first_failure() {
    let backends = MockBackends::new().with_failing_load("broken");
    let (server, _log) = server(
        serving_config(2),
        registry(&[("a", "v1"), ("broken", "v1")]),
        backends,
    );

    let err = server
        .batch_predict(vec![
            PredictionRequest::new("a", json!([1.0])),
            PredictionRequest::new("broken", json!([1.0])),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, ModelwatchError::Load(_)));
    assert_eq!(server.stats().predictions.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_warmup_failure_keeps_model_resident() {
    let backends = MockBackends::new().with_failing_warmup();
    let (server, log) = server(serving_config(2), registry(&[("a", "v1")]), backends);

    let response = server
        .predict(PredictionRequest::new("a", json!([2.0, 3.0])))
        .await
        .unwrap();

    assert_eq!(response.predictions, json!([5.0]));
    assert!(server.is_resident("a", None));
    assert_eq!(log.matching("predict:").len(), 2);
}

#[tokio::test]
async fn test_failed_load_is_retried_on_next_request() {
    let backends = MockBackends::new().with_failing_load("broken");
    let (server, log) = server(serving_config(2), registry(&[("broken", "v1")]), backends);
    let mut events = server.subscribe();

    for _ in 0..2 {
        let err = server
            .predict(PredictionRequest::new("broken", json!([1.0])))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelwatchError::Load(_)));
    }

    assert_eq!(log.matching("load:").len(), 2);
    assert_eq!(server.resident_count(), 0);
    match events.recv().await.unwrap() {
        ServerEvent::PredictionError {
            model_id,
            version,
            error_type,
            ..
        } => {
            assert_eq!(model_id, "broken");
            assert_eq!(version, "latest");
            assert_eq!(error_type, "load");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_onnx_artifact_is_a_configuration_error() {
    let mut onnx: ModelArtifact = artifact("detector", "v1");
    onnx.metadata.framework = ModelFramework::Onnx;
    let server = ModelServer::new(
        serving_config(2),
        Arc::new(StaticRegistry::with_artifacts(vec![onnx])),
        Arc::new(DefaultBackends::new().unwrap()),
    );

    let err = server
        .predict(PredictionRequest::new("detector", json!([1.0])))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelwatchError::Configuration(_)));
    assert_eq!(server.resident_count(), 0);
}

#[tokio::test]
async fn test_unknown_version_is_load_error() {
    let (server, _log) = server(serving_config(2), registry(&[("a", "v1")]), MockBackends::new());

    let err = server
        .predict(PredictionRequest::new("a", json!([1.0])).with_version("v9"))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelwatchError::Load(_)));
}

#[tokio::test]
async fn test_stop_unloads_each_instance_once() {
    let (server, log) = server(
        serving_config(3),
        registry(&[("a", "v1"), ("b", "v1")]),
        MockBackends::new(),
    );
    server.get_or_load_model("a", None).await.unwrap();
    server.get_or_load_model("b", None).await.unwrap();
    let mut events = server.subscribe();

    server.stop().await;

    let mut unloads = log.matching("unload:");
    unloads.sort();
    assert_eq!(unloads, vec!["unload:a:v1", "unload:b:v1"]);
    assert_eq!(server.resident_count(), 0);
    assert!(!server.get_health().healthy);

    let mut evicted = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ServerEvent::ModelEvicted { .. }) {
            evicted += 1;
        }
    }
    assert_eq!(evicted, 2);
}

#[tokio::test(start_paused = true)]
async fn test_start_preloads_and_reports_health() {
    let mut config = serving_config(2);
    config.preload_models = vec!["a".to_string()];
    config.health_check_interval_seconds = 1;
    let (server, _log) = server(config, registry(&[("a", "v1")]), MockBackends::new());
    let mut events = server.subscribe();

    server.start().await;
    assert!(server.is_resident("a", None));

    assert!(matches!(
        events.recv().await.unwrap(),
        ServerEvent::ModelLoaded { ref model_id, .. } if model_id == "a"
    ));
    match events.recv().await.unwrap() {
        ServerEvent::HealthCheck(report) => {
            assert!(report.healthy);
            assert_eq!(report.resident_models, 1);
            assert_eq!(report.total_memory_usage, 1024);
        }
        other => panic!("unexpected event {:?}", other),
    }

    server.stop().await;
}
