use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use prodguard::config::{Environment, RunConfigBuilder};
use prodguard::errors::RetryPolicy;
use prodguard::models::CategoryStatus;
use prodguard::monitor::{abort_pair, AbortSignal};
use prodguard::pipeline::{RunStatus, TestOrchestrator};
use prodguard::probes::access::{admin_endpoints, directory_listing, sensitive_files};
use prodguard::probes::attack::{injection_simulation, AttackClass};
use prodguard::probes::https::{https_redirect, security_headers, tls_certificate, waf_detection};
use prodguard::probes::rate_limit::{rate_limit_flood, rate_limit_headers};
use prodguard::probes::{Probe, ProbeContext, ProbeDetail};
use reqwest::Url;
use serde_json::json;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn serve(app: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}/", addr)).unwrap()
}

fn ctx(target: &Url) -> ProbeContext {
    let client = ProbeContext::build_client(TIMEOUT).unwrap();
    ProbeContext::new(target.clone(), client, AbortSignal::never())
}

/// Blocks anything carrying a query string and sends every security header.
async fn hardened_root(RawQuery(query): RawQuery) -> Response {
    if query.is_some_and(|q| !q.is_empty()) {
        return (StatusCode::FORBIDDEN, "request blocked").into_response();
    }
    (
        [
            (header::STRICT_TRANSPORT_SECURITY, "max-age=63072000"),
            (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
            (header::X_FRAME_OPTIONS, "DENY"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        "welcome",
    )
        .into_response()
}

fn hardened() -> Router {
    Router::new().route("/", get(hardened_root))
}

/// Reflects `q` unescaped and leaks SQL errors on quoted `id` values.
async fn vulnerable_root(Query(params): Query<HashMap<String, String>>) -> Response {
    if let Some(q) = params.get("q") {
        return Html(format!("<p>Results for {}</p>", q)).into_response();
    }
    if params.get("id").is_some_and(|id| id.contains('\'')) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "You have an error in your SQL syntax; check the manual for the right syntax",
        )
            .into_response();
    }
    "ok".into_response()
}

fn vulnerable() -> Router {
    Router::new()
        .route("/", get(vulnerable_root))
        .route("/admin", get(|| async { "admin console" }))
        .route("/.env", get(|| async { "DATABASE_URL=postgres://app:secret@db/app" }))
        .route("/.git/config", get(|| async { "" }))
        .route(
            "/static/",
            get(|| async { Html("<html><title>Index of /static</title><body>app.js</body></html>") }),
        )
}

async fn throttle_after_three(State(hits): State<Arc<AtomicU32>>) -> Response {
    if hits.fetch_add(1, Ordering::SeqCst) + 1 > 3 {
        return (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "30")], "slow down").into_response();
    }
    ([("x-ratelimit-limit", "3")], "ok").into_response()
}

#[tokio::test]
async fn test_redirect_to_https_is_enforced() {
    let app = Router::new().route(
        "/",
        get(|| async { (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "https://shop.example.test/")]) }),
    );
    let target = serve(app).await;

    let result = https_redirect(TIMEOUT).execute(&ctx(&target)).await;
    assert!(result.success, "{:?}", result);
    assert_eq!(
        result.detail,
        ProbeDetail::HttpsRedirect {
            status: Some(301),
            location: Some("https://shop.example.test/".into()),
            enforced: true,
        }
    );
}

#[tokio::test]
async fn test_plain_http_answer_fails_redirect_check() {
    let target = serve(hardened()).await;

    let result = https_redirect(TIMEOUT).execute(&ctx(&target)).await;
    assert!(!result.success);
    assert!(!result.is_execution_error());
    match result.detail {
        ProbeDetail::HttpsRedirect { status, enforced, .. } => {
            assert_eq!(status, Some(200));
            assert!(!enforced);
        }
        other => panic!("unexpected detail: {:?}", other),
    }
}

#[tokio::test]
async fn test_tls_check_fails_on_plain_http_target() {
    let target = serve(hardened()).await;

    let result = tls_certificate(TIMEOUT).execute(&ctx(&target)).await;
    assert!(!result.success);
    assert_eq!(
        result.detail,
        ProbeDetail::Certificate { valid: false, reason: Some("target is not served over TLS".into()) }
    );
}

#[tokio::test]
async fn test_security_headers_present_and_missing() {
    let good = serve(hardened()).await;
    let bad = serve(vulnerable()).await;

    let result = security_headers(TIMEOUT).execute(&ctx(&good)).await;
    assert!(result.success);

    let result = security_headers(TIMEOUT).execute(&ctx(&bad)).await;
    assert!(!result.success);
    match result.detail {
        ProbeDetail::SecurityHeaders { present, missing } => {
            assert!(present.is_empty());
            assert_eq!(missing.len(), 4);
        }
        other => panic!("unexpected detail: {:?}", other),
    }
}

#[tokio::test]
async fn test_waf_detected_when_attack_signature_is_blocked() {
    let target = serve(hardened()).await;

    let result = waf_detection(TIMEOUT).execute(&ctx(&target)).await;
    assert!(result.success);
    assert_eq!(result.blocked_attacks, Some(1));
    assert_eq!(result.detail, ProbeDetail::Waf { active: true, status: Some(403) });

    let open = serve(vulnerable()).await;
    let result = waf_detection(TIMEOUT).execute(&ctx(&open)).await;
    assert!(!result.success);
}

#[tokio::test]
async fn test_injection_against_vulnerable_server() {
    let target = serve(vulnerable()).await;
    let ctx = ctx(&target);

    let xss = injection_simulation(AttackClass::Xss, TIMEOUT).execute(&ctx).await;
    assert!(!xss.success);
    match &xss.detail {
        ProbeDetail::AttackSimulation { attempted, blocked, exploited, .. } => {
            assert_eq!(*attempted, 3);
            assert_eq!(*blocked, 0);
            assert_eq!(exploited.len(), 3);
        }
        other => panic!("unexpected detail: {:?}", other),
    }

    let sql = injection_simulation(AttackClass::SqlInjection, TIMEOUT).execute(&ctx).await;
    assert!(!sql.success);
    match &sql.detail {
        // the stacked-query payload carries no quote
        ProbeDetail::AttackSimulation { exploited, .. } => assert_eq!(exploited.len(), 3),
        other => panic!("unexpected detail: {:?}", other),
    }

    let traversal = injection_simulation(AttackClass::PathTraversal, TIMEOUT).execute(&ctx).await;
    assert!(traversal.success);
}

#[tokio::test]
async fn test_injection_blocked_by_hardened_server() {
    let target = serve(hardened()).await;
    let ctx = ctx(&target);

    for class in AttackClass::ALL {
        let result = injection_simulation(class, TIMEOUT).execute(&ctx).await;
        assert!(result.success, "{} should be blocked", class.probe_name());
        assert_eq!(result.blocked_attacks, Some(class.payloads().len() as u32));
    }
}

#[tokio::test]
async fn test_flood_observes_throttling() {
    let app = Router::new()
        .route("/", get(throttle_after_three))
        .with_state(Arc::new(AtomicU32::new(0)));
    let target = serve(app).await;

    let result = rate_limit_flood(TIMEOUT)
        .execute(&ctx(&target).with_rate_limit_budget(10))
        .await;
    assert!(result.success);
    assert_eq!(
        result.detail,
        ProbeDetail::RateLimit {
            requests_sent: 4,
            throttled_after: Some(4),
            retry_after: Some("30".into()),
            interrupted: false,
        }
    );
}

#[tokio::test]
async fn test_flood_without_throttling_fails_within_budget() {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                "ok"
            }
        }),
    );
    let target = serve(app).await;

    let result = rate_limit_flood(TIMEOUT)
        .execute(&ctx(&target).with_rate_limit_budget(5))
        .await;
    assert!(!result.success);
    assert!(!result.is_execution_error());
    assert_eq!(hits.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_flood_stops_on_abort() {
    let target = serve(hardened()).await;
    let (trigger, signal) = abort_pair();
    trigger.trigger();

    let client = ProbeContext::build_client(TIMEOUT).unwrap();
    let ctx = ProbeContext::new(target, client, signal);
    let result = rate_limit_flood(TIMEOUT).execute(&ctx).await;

    assert!(!result.success);
    assert!(result.is_execution_error());
    assert_eq!(
        result.error_message.as_deref(),
        Some("interrupted by emergency stop after 0 requests")
    );
    assert_eq!(ctx.ledger.issued(), 0);
}

#[tokio::test]
async fn test_aborted_scans_are_errors_not_passes() {
    let target = serve(hardened()).await;
    let (trigger, signal) = abort_pair();
    trigger.trigger();

    let client = ProbeContext::build_client(TIMEOUT).unwrap();
    let ctx = ProbeContext::new(target, client, signal);

    let admin = admin_endpoints(TIMEOUT).execute(&ctx).await;
    assert!(!admin.success);
    assert!(admin.is_execution_error());
    assert_eq!(
        admin.error_message.as_deref(),
        Some("interrupted by emergency stop after 0 of 7 paths")
    );

    let sql = injection_simulation(AttackClass::SqlInjection, TIMEOUT).execute(&ctx).await;
    assert!(!sql.success);
    assert!(sql.is_execution_error());
    assert_eq!(
        sql.error_message.as_deref(),
        Some("interrupted by emergency stop after 0 of 4 payloads")
    );
    assert_eq!(ctx.ledger.issued(), 0);
}

/// Answers every request with a body shorter than its Content-Length, then hangs up.
async fn serve_truncated_bodies() -> Url {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4096\r\n\r\nDATABASE_URL=")
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });
    Url::parse(&format!("http://{}/", addr)).unwrap()
}

#[tokio::test]
async fn test_unreadable_body_is_an_error() {
    let target = serve_truncated_bodies().await;

    let result = sensitive_files(TIMEOUT).execute(&ctx(&target)).await;
    assert!(!result.success);
    assert!(result.is_execution_error());
    assert!(result.error_message.unwrap().contains("reading body of /.env"));
}

#[tokio::test]
async fn test_rate_limit_headers_advertised() {
    let app = Router::new()
        .route("/", get(throttle_after_three))
        .with_state(Arc::new(AtomicU32::new(0)));
    let target = serve(app).await;
    let result = rate_limit_headers(TIMEOUT).execute(&ctx(&target)).await;
    assert!(result.success);
    match result.detail {
        ProbeDetail::RateLimitHeaders { present, missing } => {
            assert_eq!(present, vec!["x-ratelimit-limit".to_string()]);
            assert_eq!(missing.len(), 4);
        }
        other => panic!("unexpected detail: {:?}", other),
    }

    let bare = serve(vulnerable()).await;
    assert!(!rate_limit_headers(TIMEOUT).execute(&ctx(&bare)).await.success);
}

#[tokio::test]
async fn test_access_control_exposures() {
    let target = serve(vulnerable()).await;
    let ctx = ctx(&target);

    let admin = admin_endpoints(TIMEOUT).execute(&ctx).await;
    assert!(!admin.success);
    assert_eq!(
        admin.detail,
        ProbeDetail::AccessControl { checked: 7, exposed: vec!["/admin".into()] }
    );

    // an empty .git/config body does not count
    let sensitive = sensitive_files(TIMEOUT).execute(&ctx).await;
    assert_eq!(
        sensitive.detail,
        ProbeDetail::AccessControl { checked: 6, exposed: vec!["/.env".into()] }
    );

    let listing = directory_listing(TIMEOUT).execute(&ctx).await;
    assert_eq!(
        listing.detail,
        ProbeDetail::AccessControl { checked: 4, exposed: vec!["/static/".into()] }
    );
}

#[tokio::test]
async fn test_access_control_locked_down() {
    let target = serve(hardened()).await;
    let ctx = ctx(&target);

    assert!(admin_endpoints(TIMEOUT).execute(&ctx).await.success);
    assert!(sensitive_files(TIMEOUT).execute(&ctx).await.success);
    assert!(directory_listing(TIMEOUT).execute(&ctx).await.success);
}

#[tokio::test]
async fn test_builtin_run_against_hardened_server() {
    let target = serve(hardened()).await;
    let config = RunConfigBuilder::for_environment(Environment::Development)
        .target(target.as_str())
        .execution_order(["access-control", "attack-resistance"])
        .retry(RetryPolicy { max_retries: 0, retry_delay_ms: 1 })
        .build()
        .unwrap();

    let outcome = TestOrchestrator::builtin(config).unwrap().run().await;

    assert_eq!(outcome.status, RunStatus::Completed);
    assert!(outcome.success, "{:?}", outcome.errors);
    assert_eq!(outcome.summary.overall_security_score, 1.0);
    assert_eq!(outcome.summary.passed_tests, 2);

    let attack = outcome.result("attack-resistance").unwrap();
    assert_eq!(attack.metrics.attacks_blocked, 13);
    assert_eq!(attack.probe_results.len(), 4);
    assert_eq!(outcome.results[0].category_name, "access-control");
}

#[tokio::test]
async fn test_builtin_monitoring_through_control_plane() {
    let app = hardened()
        .route(
            "/cp/logs/DescribeLogGroups",
            post(|| async { Json(json!({ "log_groups": [{ "name": "edge-access" }] })) }),
        )
        .route("/cp/monitoring/DescribeAlarms", post(|| async { Json(json!({ "alarms": [] })) }))
        .route(
            "/cp/monitoring/GetResourceUtilization",
            post(|| async { Json(json!({ "utilization": 0.1 })) }),
        )
        .route(
            "/cp/billing/GetEstimatedCharges",
            post(|| async { Json(json!({ "amount_usd": 0.5 })) }),
        );
    let target = serve(app).await;
    let config = RunConfigBuilder::for_environment(Environment::Development)
        .target(target.as_str())
        .execution_order(["monitoring"])
        .control_plane(format!("{}cp", target), None)
        .build()
        .unwrap();

    let outcome = TestOrchestrator::builtin(config).unwrap().run().await;

    let monitoring = outcome.result("monitoring").unwrap();
    // access logging is critical, the missing alarm is not
    assert_eq!(monitoring.status, CategoryStatus::Passed);
    assert_eq!(monitoring.metrics.vulnerabilities_found, 1);
    assert_eq!(monitoring.metrics.security_score, 0.5);
    assert!(outcome.success);
}
