//! End-to-end gateway behaviour over real HTTP.

use std::time::Duration;

use serde_json::{json, Value};

mod common;

use common::{TestServer, ADMIN_IP};

const CLIENT_IP: &str = "203.0.113.5";

#[tokio::test]
async fn test_window_limit_rejects_31st_request_then_recovers() {
    let server = TestServer::start_with(|config| {
        config.rate_limit.max_requests = 30;
        config.rate_limit.window_ms = 60_000;
    })
    .await;

    // 31 requests spread over 40 seconds stay under the burst detector.
    for i in 0..30 {
        let res = server.get("/health", CLIENT_IP).send().await.unwrap();
        assert_eq!(res.status(), 200, "request {} rejected", i + 1);
        server.advance(Duration::from_millis(1_300));
    }

    let res = server.get("/health", CLIENT_IP).send().await.unwrap();
    assert_eq!(res.status(), 429);
    assert_eq!(res.headers()["retry-after"], "300");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "rate_limited");
    assert_eq!(body["retryAfter"], 300);

    // Still blocked long after the window itself rolled over.
    server.advance(Duration::from_secs(120));
    let res = server.get("/health", CLIENT_IP).send().await.unwrap();
    assert_eq!(res.status(), 429);

    server.advance(Duration::from_secs(181));
    let res = server.get("/health", CLIENT_IP).send().await.unwrap();
    assert_eq!(res.status(), 200);

    // Other clients were never affected.
    let res = server.get("/health", "198.51.100.1").send().await.unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_manual_block_expires() {
    let server = TestServer::start().await;
    let token = server.login().await;

    let res = server
        .post("/api/security/block", ADMIN_IP)
        .bearer_auth(&token)
        .json(&json!({ "ip": CLIENT_IP, "duration": 1000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = server.get("/health", CLIENT_IP).send().await.unwrap();
    assert_eq!(res.status(), 403);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["reason"], "blocked");

    let status = server.admin_get("/api/security/status", &token).await;
    assert_eq!(status["security"]["blockedIPs"], 1);
    assert_eq!(status["security"]["blockedIPList"], json!([CLIENT_IP]));

    server.advance(Duration::from_millis(1_100));
    let res = server.get("/health", CLIENT_IP).send().await.unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_unblock_lifts_block_immediately() {
    let server = TestServer::start().await;
    let token = server.login().await;

    server
        .post("/api/security/block", ADMIN_IP)
        .bearer_auth(&token)
        .json(&json!({ "ip": CLIENT_IP }))
        .send()
        .await
        .unwrap();
    assert_eq!(
        server.get("/health", CLIENT_IP).send().await.unwrap().status(),
        403
    );

    let res = server
        .post("/api/security/unblock", ADMIN_IP)
        .bearer_auth(&token)
        .json(&json!({ "ip": CLIENT_IP }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["wasBlocked"], true);
    assert_eq!(
        server.get("/health", CLIENT_IP).send().await.unwrap().status(),
        200
    );
}

#[tokio::test]
async fn test_block_validates_ip() {
    let server = TestServer::start().await;
    let token = server.login().await;

    let res = server
        .post("/api/security/block", ADMIN_IP)
        .bearer_auth(&token)
        .json(&json!({ "ip": "not-an-ip" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["field"], "ip");
}

#[tokio::test]
async fn test_status_turns_warning_after_rejections() {
    let server = TestServer::start().await;
    let token = server.login().await;

    let status = server.admin_get("/api/security/status", &token).await;
    assert_eq!(status["security"]["status"], "secure");

    for i in 0..8 {
        let res = server
            .get("/", &format!("198.51.100.{}", i + 10))
            .header("user-agent", "python-requests/2.31.0")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 403);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["reason"], "bad_bot");
    }

    let status = server.admin_get("/api/security/status", &token).await;
    assert_eq!(status["security"]["status"], "warning");
    assert_eq!(status["security"]["statusCodes"]["403"], 8);
}

#[tokio::test]
async fn test_threat_report_counts_patterns() {
    let server = TestServer::start().await;
    let token = server.login().await;

    server
        .get("/download?file=../../etc/passwd", "198.51.100.20")
        .send()
        .await
        .unwrap();
    server.get("/wp-admin/", "198.51.100.20").send().await.unwrap();
    server
        .get("/search?q=1%27%20UNION%20SELECT%20password%20FROM%20users", "198.51.100.21")
        .send()
        .await
        .unwrap();

    let report = server.admin_get("/api/security/threats", &token).await;
    let threats = &report["threats"];
    assert_eq!(threats["pathTraversal"], 1);
    assert_eq!(threats["sqlInjection"], 1);
    assert!(threats["probes"].as_u64().unwrap() >= 1);
    assert_eq!(threats["topIps"][0]["ip"], "198.51.100.20");
    assert_eq!(threats["topIps"][0]["count"], 2);
}

#[tokio::test]
async fn test_logs_are_most_recent_first() {
    let server = TestServer::start().await;
    let token = server.login().await;

    server.get("/first", "198.51.100.30").send().await.unwrap();
    server.get("/second", "198.51.100.31").send().await.unwrap();

    let logs = server.admin_get("/api/security/logs?limit=2", &token).await;
    let entries = logs["logs"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["path"], "/second");
    assert_eq!(entries[0]["statusCode"], 404);
    assert_eq!(entries[1]["path"], "/first");
    assert_eq!(entries[1]["ip"], "198.51.100.30");
    assert!(entries[0]["requestId"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let server = TestServer::start().await;
    let res = server.get("/nope", CLIENT_IP).send().await.unwrap();
    assert_eq!(res.status(), 404);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "error": "Not found" }));
}

#[tokio::test]
async fn test_good_crawler_passes() {
    let server = TestServer::start().await;
    let res = server
        .get("/health", "66.249.66.1")
        .header(
            "user-agent",
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
        )
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_public_config() {
    let server = TestServer::start().await;
    let body: Value = server
        .get("/api/config", CLIENT_IP)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["rateLimit"]["windowMs"], 60_000);
    assert_eq!(body["rateLimit"]["maxRequests"], 100);
    assert_eq!(body["maxFileSize"], 50 * 1024 * 1024);
}
