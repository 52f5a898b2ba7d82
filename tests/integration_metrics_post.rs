use mockito::Matcher;
use s3_benchmark::{
    reporting::{self, KairosDbSink},
    BenchmarkConfig, BenchmarkResults, OperationKind, StatisticsSnapshot,
};
use std::time::Duration;

fn results() -> BenchmarkResults {
    let config = BenchmarkConfig {
        operation: OperationKind::Upload,
        threads: 2,
        size: 1024,
        ..BenchmarkConfig::default()
    };
    let snapshot = StatisticsSnapshot {
        count: 4,
        min: 5,
        max: 40,
        avg: 17.5,
        p95: 40,
        p99: 40,
        ops_per_second: 8.0,
        test_duration: Duration::from_millis(500),
    };
    BenchmarkResults::new(config, snapshot, 2, 0)
}

/// The six points of a run go out as one JSON POST.
#[tokio::test]
async fn posts_snapshot_as_one_batch() {
    let results = results();
    let ts = results.timestamp.timestamp_millis();
    let tags = serde_json::json!({
        "backend": "s3",
        "op": "UPLOAD",
        "size": "UPLOAD1024",
        "source": "s3pt",
        "threads": "T2"
    });
    let point = |name: &str, value: f64| {
        serde_json::json!({
            "name": format!("core.engineering.s3.{}", name),
            "timestamp": ts,
            "value": value,
            "tags": tags.clone()
        })
    };
    let expected = serde_json::Value::Array(vec![
        point("operation_time.avg", 17.5),
        point("operation_time.min", 5.0),
        point("operation_time.max", 40.0),
        point("operation_time.p99", 40.0),
        point("operation_time.p95", 40.0),
        point("ops", 8.0),
    ]);

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/datapoints")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(expected))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let delivered = reporting::report(&results, &results.config, KairosDbSink::new(&server.url())).await;

    assert!(delivered);
    mock.assert_async().await;
}

/// A rejected batch is logged and reported as undelivered; the run's
/// results are not touched.
#[tokio::test]
async fn server_error_is_not_fatal() {
    let results = results();
    let before = results.statistics.clone();

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/datapoints")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let delivered = reporting::report(&results, &results.config, KairosDbSink::new(&server.url())).await;

    assert!(!delivered);
    assert_eq!(results.statistics, before);
    mock.assert_async().await;
}

/// Nothing listening on the port: the request error is swallowed too.
#[tokio::test]
async fn unreachable_endpoint_is_not_fatal() {
    let results = results();
    let delivered = reporting::report(&results, &results.config, KairosDbSink::new("http://127.0.0.1:9")).await;
    assert!(!delivered);
}
