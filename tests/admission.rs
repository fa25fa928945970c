//! Rate limiting against a live server.

use std::time::Duration;

use gatekeeper::config::RouteThrottleConfig;
use reqwest::StatusCode;
use serde_json::Value;

mod common;

use common::{spawn_gateway, test_config};

fn header(response: &reqwest::Response, name: &str) -> String {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn sixth_request_in_window_is_throttled() {
    let mut config = test_config();
    config.throttle.limit = 5;
    let gateway = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    for expected_remaining in (0..5).rev() {
        let response = client.get(gateway.url("/api/ping")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-ratelimit-limit"), "5");
        assert_eq!(
            header(&response, "x-ratelimit-remaining"),
            expected_remaining.to_string()
        );
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "pong");
    }

    let response = client.get(gateway.url("/api/ping")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("x-request-id"));
    let retry_after: u64 = header(&response, "retry-after").parse().unwrap();
    assert!((1..=60).contains(&retry_after));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["statusCode"], 429);
    assert_eq!(body["message"], "Too Many Requests");
    assert_eq!(body["path"], "/api/ping");
    assert_eq!(body["method"], "GET");
}

#[tokio::test]
async fn window_expiry_restores_quota() {
    let mut config = test_config();
    config.throttle.limit = 1;
    config.throttle.ttl_ms = 300;
    let gateway = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    assert_eq!(
        client.get(gateway.url("/api/ping")).send().await.unwrap().status(),
        StatusCode::OK
    );
    let throttled = client.get(gateway.url("/api/ping")).send().await.unwrap();
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&throttled, "retry-after"), "1");

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        client.get(gateway.url("/api/ping")).send().await.unwrap().status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn health_probe_is_never_throttled() {
    let mut config = test_config();
    config.throttle.limit = 1;
    let gateway = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    for _ in 0..5 {
        let response = client.get(gateway.url("/health")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }
}

#[tokio::test]
async fn forwarded_clients_are_counted_separately_when_trusted() {
    let mut config = test_config();
    config.throttle.limit = 1;
    config.throttle.trust_forwarded_for = true;
    let gateway = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    for client_ip in ["203.0.113.1", "203.0.113.2"] {
        let response = client
            .get(gateway.url("/api/ping"))
            .header("x-forwarded-for", format!("{client_ip}, 10.0.0.1"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "first request from {client_ip}");
    }

    let response = client
        .get(gateway.url("/api/ping"))
        .header("x-forwarded-for", "203.0.113.1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn forwarded_header_ignored_by_default() {
    let mut config = test_config();
    config.throttle.limit = 1;
    let gateway = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    let first = client
        .get(gateway.url("/api/ping"))
        .header("x-forwarded-for", "203.0.113.1")
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // Rotating the header does not buy a fresh quota.
    let second = client
        .get(gateway.url("/api/ping"))
        .header("x-forwarded-for", "203.0.113.2")
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn routes_have_independent_windows() {
    let mut config = test_config();
    config.throttle.limit = 1;
    config.throttle.routes.push(RouteThrottleConfig {
        path: "/api/echo".into(),
        skip: false,
        limit: Some(3),
        ttl_ms: None,
    });
    let gateway = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    assert_eq!(
        client.get(gateway.url("/api/ping")).send().await.unwrap().status(),
        StatusCode::OK
    );
    assert_eq!(
        client.get(gateway.url("/api/ping")).send().await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    for _ in 0..3 {
        let response = client.post(gateway.url("/api/echo")).body("hi").send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-ratelimit-limit"), "3");
    }
    assert_eq!(
        client.post(gateway.url("/api/echo")).body("hi").send().await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn concurrent_burst_admits_exactly_the_limit() {
    let mut config = test_config();
    config.throttle.limit = 10;
    let gateway = spawn_gateway(config).await;
    let client = reqwest::Client::new();

    let mut tasks = Vec::new();
    for _ in 0..25 {
        let client = client.clone();
        let url = gateway.url("/api/ping");
        tasks.push(tokio::spawn(async move {
            client.get(url).send().await.unwrap().status()
        }));
    }

    let mut admitted = 0;
    let mut throttled = 0;
    for task in tasks {
        match task.await.unwrap() {
            StatusCode::OK => admitted += 1,
            StatusCode::TOO_MANY_REQUESTS => throttled += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(admitted, 10);
    assert_eq!(throttled, 15);
}

#[tokio::test]
async fn reloaded_limit_applies_to_next_request() {
    let mut config = test_config();
    config.throttle.limit = 1;
    let gateway = spawn_gateway(config.clone()).await;
    let client = reqwest::Client::new();

    assert_eq!(
        client.get(gateway.url("/api/ping")).send().await.unwrap().status(),
        StatusCode::OK
    );
    assert_eq!(
        client.get(gateway.url("/api/ping")).send().await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    config.throttle.limit = 3;
    gateway.config_updates.send(config).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The existing window already holds two hits.
    let response = client.get(gateway.url("/api/ping")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-ratelimit-remaining"), "0");
}
