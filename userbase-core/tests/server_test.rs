//! End-to-end tests for the HTTP server
//!
//! Each test binds a real listener on an ephemeral port and talks to it over
//! TCP with reqwest and the fetch helper.
//!
//! Run with: cargo test --test server_test -- --nocapture

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};

use userbase_core::adapters::memory::{InMemoryUserCache, InMemoryUserRepository};
use userbase_core::server::{start_server, AppState, Router, ServerConfig, ServerHandle};
use userbase_core::{Fetcher, User, UserService};

async fn spawn_server() -> ServerHandle {
    spawn_server_on("127.0.0.1").await
}

async fn spawn_server_on(host: &str) -> ServerHandle {
    let users = UserService::new(
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemoryUserCache::new()),
    );
    let config = ServerConfig {
        host: host.to_string(),
        port: 0,
        ..ServerConfig::default()
    };
    let router = Router::new(
        AppState::new(Arc::new(users)),
        config.read_timeout,
        config.write_timeout,
    );
    start_server(&config, router).await.expect("server should start")
}

fn fetcher() -> Fetcher {
    Fetcher::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_health_over_tcp() {
    let server = spawn_server().await;
    assert_ne!(server.port(), 0);

    let body = fetcher()
        .fetch(&format!("{}/health", server.url()))
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status"], "ok");

    server.shutdown().await;
}

#[tokio::test]
async fn test_method_not_allowed_over_tcp() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    for method in [Method::PATCH, Method::OPTIONS] {
        let response = client
            .request(method.clone(), format!("{}/users", server.url()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{}", method);
        assert_eq!(response.text().await.unwrap(), "Method not allowed");
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_create_and_fetch_user_over_tcp() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/users", server.url()))
        .json(&serde_json::json!({ "name": "Ada", "email": "ada@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: User = response.json().await.unwrap();

    let body = fetcher()
        .fetch(&format!("{}/users?id={}", server.url(), created.id))
        .await
        .unwrap();
    let fetched: User = serde_json::from_slice(&body).unwrap();
    assert_eq!(fetched, created);

    let body = fetcher()
        .fetch_text(&format!("{}/users", server.url()))
        .await
        .unwrap();
    let list: Vec<User> = serde_json::from_str(&body).unwrap();
    assert_eq!(list, vec![created]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_fetch_reports_non_200() {
    let server = spawn_server().await;

    let err = fetcher()
        .fetch(&format!("{}/missing", server.url()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "unexpected status code: 404");

    let err = fetcher()
        .fetch(&format!("{}/users?id=7", server.url()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "unexpected status code: 404");

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let server = spawn_server().await;
    let url = format!("{}/health", server.url());
    server.shutdown().await;

    let err = fetcher().fetch(&url).await.unwrap_err();
    assert!(err.to_string().starts_with("failed to fetch data"));
}

#[tokio::test]
async fn test_server_binds_hostname() {
    let server = spawn_server_on("localhost").await;
    assert!(server.addr().ip().is_loopback());

    let body = fetcher()
        .fetch(&format!("{}/health", server.url()))
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status"], "ok");

    server.shutdown().await;
}
