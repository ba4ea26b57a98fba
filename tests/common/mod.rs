//! Shared utilities for integration tests.
//!
//! Boots a real server on an ephemeral port with a manual clock, so tests can
//! move time forward without sleeping. Client IPs are simulated through
//! `X-Forwarded-For` (the test config trusts the proxy header).

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use trust_gateway::clock::ManualClock;
use trust_gateway::config::TrustConfig;
use trust_gateway::http::HttpServer;
use trust_gateway::lifecycle::{build_state, Shutdown};

pub const ADMIN_PASSWORD: &str = "integration-password";
pub const ADMIN_IP: &str = "192.0.2.200";
pub const BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

pub struct TestServer {
    pub addr: SocketAddr,
    pub clock: Arc<ManualClock>,
    pub client: reqwest::Client,
    pub shutdown: Shutdown,
    pub dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut TrustConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TrustConfig::default();
        config.server.trust_proxy = true;
        config.data_dir = dir.path().join("data");
        config.admin.password = ADMIN_PASSWORD.to_string();
        config.admin.session_secret = "integration-session-secret".to_string();
        configure(&mut config);

        let clock = Arc::new(ManualClock::new(1_709_985_600_000));
        let state = build_state(config, clock.clone()).await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let server = HttpServer::new(state);
        let server_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, server_shutdown).await;
        });

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .no_proxy()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            addr,
            clock,
            client,
            shutdown,
            dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn get(&self, path: &str, ip: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).header("x-forwarded-for", ip)
    }

    pub fn post(&self, path: &str, ip: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).header("x-forwarded-for", ip)
    }

    pub fn delete(&self, path: &str, ip: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).header("x-forwarded-for", ip)
    }

    pub async fn login(&self) -> String {
        let res = self
            .post("/api/auth/login", ADMIN_IP)
            .json(&json!({ "password": ADMIN_PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_get(&self, path: &str, token: &str) -> Value {
        let res = self
            .get(path, ADMIN_IP)
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200, "GET {} failed", path);
        res.json().await.unwrap()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
