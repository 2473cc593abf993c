//! Integration tests for the taskboard server

use reqwest::Method;
use serde_json::Value;
use taskboard::configuration::get_configuration;
use taskboard::startup::Application;

async fn spawn_app() -> String {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.application.port = 0;
    configuration.database.url = "sqlite::memory:".to_string();
    configuration.jwt.hash_cost = 4;

    let application = Application::build(configuration)
        .await
        .expect("Failed to build application.");
    let address = format!("http://127.0.0.1:{}", application.port());
    let _ = tokio::spawn(application.run_until_stopped());

    address
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app().await;

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["pool"]["max_size"], 5);
    assert_eq!(body["cache_entries"], 0);
}

#[tokio::test]
async fn schema_bootstrap_enrolls_one_handle() {
    let addr = spawn_app().await;

    let body: Value = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(body["pool"]["size"], 1);
    assert_eq!(body["pool"]["busy"], 0);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app().await;

    let response = reqwest::Client::new()
        .get(&format!("{}/does-not-exist", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn cors_preflight_allows_authorization_header() {
    let addr = spawn_app().await;

    let response = reqwest::Client::new()
        .request(Method::OPTIONS, &format!("{}/api/tasks", addr))
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "GET")
        .header("Access-Control-Request-Headers", "authorization")
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    let allowed = headers["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .to_lowercase();
    assert!(allowed.contains("authorization"));
    assert!(allowed.contains("content-type"));
}

#[tokio::test]
async fn cross_origin_rejection_is_readable_by_browser() {
    let addr = spawn_app().await;

    let response = reqwest::Client::new()
        .get(&format!("{}/api/tasks", addr))
        .header("Origin", "http://localhost:5173")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(401, response.status().as_u16());
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}
