//! End-to-end scrapes against a fake Logstash monitoring API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request as HttpRequest, StatusCode, header};
use axum::routing::get;
use logstash_exporter::metrics::CONTENT_TYPE;
use logstash_exporter::{
    BuildInfo, DEFAULT_METRICS_PATH, DEFAULT_TIMEOUT, Endpoint, ExporterOptions, ExporterServer,
    LogstashExporter, ServerConfig,
};
use tokio::net::TcpListener;
use tower::ServiceExt;

const ROOT: &str = include_str!("fixtures/root.json");
const NODE_STATS_LEGACY: &str = include_str!("fixtures/node_stats_legacy.json");
const NODE_STATS_CURRENT: &str = include_str!("fixtures/node_stats_current.json");

const LOCAL: &str = r#"hostname="exporter-host",logstash_usage="sms""#;

async fn spawn_upstream(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn engine(node_stats: &'static str) -> Router {
    Router::new()
        .route("/", get(|| async { ROOT }))
        .route("/_node/stats", get(move || async move { node_stats }))
}

fn exporter(base: &str) -> LogstashExporter {
    LogstashExporter::new(ExporterOptions {
        namespace: "logstash".to_string(),
        usage: "sms".to_string(),
        hostname: "exporter-host".to_string(),
        endpoint: Endpoint::new(base, DEFAULT_TIMEOUT).unwrap(),
    })
    .unwrap()
}

fn line(name: &str, labels: &str, value: &str) -> String {
    format!("{name}{{{LOCAL}{labels}}} {value}\n")
}

#[tokio::test]
async fn test_legacy_engine_known_values() {
    let base = spawn_upstream(engine(NODE_STATS_LEGACY)).await;
    let exporter = exporter(&base);

    let scrape = exporter.scrape().await;
    assert!(scrape.outcome.up);
    assert!(scrape.outcome.error.is_none());

    let text = scrape.render().unwrap();
    assert!(text.contains(&line("logstash_node_stats_jvm_threads_count", "", "30")));
    assert!(text.contains(&line("logstash_node_stats_process_cpu_percent", "", "12")));
    assert!(text.contains(&line(
        "logstash_node_stats_pipeline_events_in_total",
        r#",pipeline="main""#,
        "100"
    )));
    assert!(text.contains(&line(
        "logstash_node_stats_process_cpu_total_seconds_total",
        "",
        "12.5"
    )));
    assert!(!text.contains("pipeline=\"beats\""));
}

#[tokio::test]
async fn test_current_engine_ignores_legacy_pipeline() {
    let base = spawn_upstream(engine(NODE_STATS_CURRENT)).await;
    let scrape = exporter(&base).scrape().await;
    let text = scrape.render().unwrap();

    assert!(text.contains(&line(
        "logstash_node_stats_pipeline_events_in_total",
        r#",pipeline="beats""#,
        "2500"
    )));
    assert!(text.contains(&line(
        "logstash_node_stats_pipeline_events_in_total",
        r#",pipeline="syslog""#,
        "40"
    )));
    assert!(!text.contains("pipeline=\"main\""));
    assert!(!text.contains(" 999\n"));
}

#[tokio::test]
async fn test_successful_scrape_bookkeeping() {
    let base = spawn_upstream(engine(NODE_STATS_CURRENT)).await;
    let scrape = exporter(&base).scrape().await;
    let text = scrape.render().unwrap();

    // up is labeled with the engine's own host
    assert!(text.contains("logstash_up{hostname=\"logstash-01\",logstash_usage=\"sms\"} 1\n"));
    assert!(text.contains(&line("logstash_exporter_scrapes_total", "", "1")));
    assert!(text.contains(&line("logstash_exporter_scrape_duration_seconds_count", "", "1")));
    assert!(text.contains(
        "logstash_instance_info{hostname=\"exporter-host\",http_address=\"127.0.0.1:9600\",\
         logstash_usage=\"sms\",version=\"6.8.12\"} 1\n"
    ));
    assert!(!text.contains("logstash_exporter_collector_failures_total{"));
    assert!(scrape.outcome.elapsed > Duration::ZERO);
}

#[tokio::test]
async fn test_root_failure_reports_down() {
    let app = Router::new()
        .route("/", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "oops") }))
        .route("/_node/stats", get(|| async { NODE_STATS_CURRENT }));
    let base = spawn_upstream(app).await;

    let scrape = exporter(&base).scrape().await;
    assert!(!scrape.outcome.up);
    assert!(scrape.samples.is_empty());

    let text = scrape.render().unwrap();
    assert!(text.contains(&line("logstash_up", "", "0")));
    assert!(text.contains(&line("logstash_exporter_scrapes_total", "", "1")));
    assert!(!text.contains("logstash_node_stats_"));
    assert!(!text.contains("logstash_exporter_scrape_duration_seconds_count{"));
}

#[tokio::test]
async fn test_root_non_object_reports_down() {
    let app = Router::new().route("/", get(|| async { "<html>maintenance</html>" }));
    let base = spawn_upstream(app).await;

    let scrape = exporter(&base).scrape().await;
    assert!(!scrape.outcome.up);
    assert!(matches!(
        scrape.outcome.error,
        Some(logstash_exporter::Error::Decode { .. })
    ));
}

#[tokio::test]
async fn test_node_stats_failure_degrades() {
    let app = Router::new()
        .route("/", get(|| async { ROOT }))
        .route("/_node/stats", get(|| async { r#"{"jvm":{}}"# }));
    let base = spawn_upstream(app).await;

    let scrape = exporter(&base).scrape().await;
    assert!(scrape.outcome.up);
    assert_eq!(scrape.samples.len(), 1);

    let text = scrape.render().unwrap();
    assert!(text.contains("logstash_instance_info{"));
    assert!(text.contains(
        "logstash_exporter_collector_failures_total{collector=\"node_stats\",\
         hostname=\"exporter-host\",logstash_usage=\"sms\"} 1\n"
    ));
    assert!(!text.contains("logstash_node_stats_"));
}

#[tokio::test]
async fn test_up_reflects_only_latest_outcome() {
    let healthy = Arc::new(AtomicUsize::new(1));
    let flag = Arc::clone(&healthy);
    let app = Router::new()
        .route(
            "/",
            get(move || {
                let flag = Arc::clone(&flag);
                async move {
                    if flag.load(Ordering::SeqCst) == 1 {
                        (StatusCode::OK, ROOT)
                    } else {
                        (StatusCode::SERVICE_UNAVAILABLE, "{}")
                    }
                }
            }),
        )
        .route("/_node/stats", get(|| async { NODE_STATS_CURRENT }));
    let base = spawn_upstream(app).await;
    let exporter = exporter(&base);

    assert!(exporter.scrape().await.outcome.up);
    healthy.store(0, Ordering::SeqCst);
    let text = exporter.scrape().await.render().unwrap();

    assert!(text.contains(&line("logstash_up", "", "0")));
    assert!(!text.contains("logstash_up{hostname=\"logstash-01\""));
    assert!(text.contains(&line("logstash_exporter_scrapes_total", "", "2")));
}

#[tokio::test]
async fn test_concurrent_scrapes_do_not_interleave() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handler = |body: &'static str| {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        move || {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                body
            }
        }
    };
    let app = Router::new()
        .route("/", get(handler(ROOT)))
        .route("/_node/stats", get(handler(NODE_STATS_CURRENT)));
    let base = spawn_upstream(app).await;
    let exporter = exporter(&base);

    let (first, second) = tokio::join!(exporter.scrape(), exporter.scrape());

    assert!(first.outcome.up && second.outcome.up);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(exporter.total_scrapes().await, 2);
    assert!(first.outcome.elapsed >= Duration::from_millis(100));
    assert!(second.outcome.elapsed >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_abandoned_scrape_is_not_counted() {
    let app = Router::new().route(
        "/",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            ROOT
        }),
    );
    let base = spawn_upstream(app).await;
    let exporter = exporter(&base);

    let abandoned = tokio::time::timeout(Duration::from_millis(100), exporter.scrape()).await;
    assert!(abandoned.is_err());

    // the lock is free again and nothing was counted
    assert_eq!(exporter.total_scrapes().await, 0);
}

#[tokio::test]
async fn test_metrics_route_end_to_end() {
    let base = spawn_upstream(engine(NODE_STATS_LEGACY)).await;
    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), DEFAULT_METRICS_PATH).unwrap();
    let server = ExporterServer::new(config, Arc::new(exporter(&base)), BuildInfo::from_env());

    let response = server
        .router()
        .oneshot(
            HttpRequest::builder()
                .uri(DEFAULT_METRICS_PATH)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], CONTENT_TYPE);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("# TYPE logstash_node_stats_jvm_threads_count gauge"));
    assert!(text.contains(&line("logstash_node_stats_jvm_threads_count", "", "30")));
}

#[tokio::test]
async fn test_server_serves_until_cancelled() {
    let base = spawn_upstream(engine(NODE_STATS_LEGACY)).await;
    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), DEFAULT_METRICS_PATH).unwrap();
    let server = Arc::new(ExporterServer::new(
        config,
        Arc::new(exporter(&base)),
        BuildInfo::from_env(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let running = Arc::clone(&server);
    let handle = tokio::spawn(async move { running.serve(listener).await });

    let health = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(health, "logstash-sms exporter is running");

    server.cancel_token().cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
