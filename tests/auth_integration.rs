use serde_json::{json, Value};
use taskboard::configuration::get_configuration;
use taskboard::startup::Application;

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn me(&self, access_token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(&format!("{}/auth/me", &self.address));
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    /// Register `email` and log in, returning (access, refresh)
    async fn register_and_login(&self, email: &str) -> (String, String) {
        let credentials = json!({ "email": email, "password": "hunter22" });

        let response = self.post("/auth/register", &credentials).await;
        assert_eq!(201, response.status().as_u16());

        let response = self.post("/auth/login", &credentials).await;
        assert_eq!(200, response.status().as_u16());

        let body: Value = response.json().await.expect("Failed to parse response");
        (
            body["accessToken"].as_str().expect("accessToken").to_string(),
            body["refreshToken"].as_str().expect("refreshToken").to_string(),
        )
    }
}

async fn spawn_app() -> TestApp {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.application.port = 0;
    configuration.database.url = "sqlite::memory:".to_string();
    configuration.jwt.hash_cost = 4;

    let application = Application::build(configuration)
        .await
        .expect("Failed to build application.");
    let address = format!("http://127.0.0.1:{}", application.port());
    let _ = tokio::spawn(application.run_until_stopped());

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let body: Value = response.json().await.expect("Failed to parse response");
    body["error"].as_str().unwrap_or_default().to_string()
}

// --- Registration Tests ---

#[tokio::test]
async fn register_returns_201_for_valid_credentials() {
    let app = spawn_app().await;

    let response = app
        .post(
            "/auth/register",
            &json!({ "email": "ada@example.com", "password": "hunter22" }),
        )
        .await;

    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["message"], "User created");
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let app = spawn_app().await;
    let credentials = json!({ "email": "ada@example.com", "password": "hunter22" });

    app.post("/auth/register", &credentials).await;
    let response = app.post("/auth/register", &credentials).await;

    assert_eq!(400, response.status().as_u16());
    assert_eq!(error_message(response).await, "User already exists");
}

#[tokio::test]
async fn register_returns_400_when_data_is_invalid() {
    let app = spawn_app().await;
    let test_cases = vec![
        (json!({ "email": "not-an-email", "password": "pw" }), "invalid email"),
        (json!({ "email": "ada@example.com", "password": "" }), "empty password"),
        (json!({ "password": "pw" }), "missing email"),
        (json!({}), "empty body"),
    ];

    for (body, description) in test_cases {
        let response = app.post("/auth/register", &body).await;
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload had {}.",
            description
        );
    }
}

// --- Login Tests ---

#[tokio::test]
async fn login_failures_share_one_message() {
    let app = spawn_app().await;
    app.register_and_login("ada@example.com").await;

    let wrong_password = app
        .post(
            "/auth/login",
            &json!({ "email": "ada@example.com", "password": "wrong" }),
        )
        .await;
    assert_eq!(400, wrong_password.status().as_u16());
    assert_eq!(error_message(wrong_password).await, "Invalid email or password");

    let unknown = app
        .post(
            "/auth/login",
            &json!({ "email": "bob@example.com", "password": "hunter22" }),
        )
        .await;
    assert_eq!(400, unknown.status().as_u16());
    assert_eq!(error_message(unknown).await, "Invalid email or password");
}

#[tokio::test]
async fn email_is_case_sensitive() {
    let app = spawn_app().await;
    app.register_and_login("Ada@example.com").await;

    let response = app
        .post(
            "/auth/login",
            &json!({ "email": "ada@example.com", "password": "hunter22" }),
        )
        .await;

    assert_eq!(400, response.status().as_u16());
}

// --- Authorization Tests ---

#[tokio::test]
async fn me_returns_subject_of_access_token() {
    let app = spawn_app().await;
    let (access, _) = app.register_and_login("ada@example.com").await;

    let response = app.me(Some(&access)).await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], "ada@example.com");
    assert!(body["subjectId"].as_i64().is_some());
    assert!(body["expiresAt"].as_i64().is_some());
}

#[tokio::test]
async fn missing_authorization_header_returns_401() {
    let app = spawn_app().await;

    let response = app.me(None).await;

    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_message(response).await, "Missing Authorization header");
}

#[tokio::test]
async fn rejected_requests_still_carry_request_id() {
    let app = spawn_app().await;
    let (access, _) = app.register_and_login("ada@example.com").await;
    app.client
        .post(&format!("{}/auth/logout", &app.address))
        .bearer_auth(&access)
        .send()
        .await
        .expect("Failed to execute request.");

    for token in [None, Some("not-a-jwt"), Some(access.as_str())] {
        let response = app.me(token).await;
        assert_eq!(401, response.status().as_u16());
        assert!(
            response.headers().contains_key("x-request-id"),
            "401 for token {:?} had no request id",
            token
        );
    }
}

#[tokio::test]
async fn garbage_access_token_returns_401() {
    let app = spawn_app().await;

    let response = app.me(Some("not-a-jwt")).await;

    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_message(response).await, "Invalid or expired token");
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let app = spawn_app().await;
    let (_, refresh) = app.register_and_login("ada@example.com").await;

    let response = app.me(Some(&refresh)).await;

    assert_eq!(401, response.status().as_u16());
}

// --- Logout Tests ---

#[tokio::test]
async fn logout_revokes_access_token_before_expiry() {
    let app = spawn_app().await;
    let (access, refresh) = app.register_and_login("ada@example.com").await;
    assert_eq!(200, app.me(Some(&access)).await.status().as_u16());

    let response = app
        .client
        .post(&format!("{}/auth/logout", &app.address))
        .bearer_auth(&access)
        .json(&json!({ "refreshToken": refresh }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let response = app.me(Some(&access)).await;
    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_message(response).await, "Blacklisted token");
}

#[tokio::test]
async fn logout_without_credentials_still_succeeds() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(&format!("{}/auth/logout", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["message"], "Logged out");
}

// --- Refresh Tests ---

#[tokio::test]
async fn refresh_issues_working_access_token() {
    let app = spawn_app().await;
    let (_, refresh) = app.register_and_login("ada@example.com").await;

    let response = app
        .post("/auth/refresh", &json!({ "refreshToken": refresh }))
        .await;
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    let access = body["accessToken"].as_str().expect("accessToken");
    assert_eq!(200, app.me(Some(access)).await.status().as_u16());
}

#[tokio::test]
async fn refresh_after_logout_is_blacklisted() {
    let app = spawn_app().await;
    let (_, refresh) = app.register_and_login("ada@example.com").await;

    app.post("/auth/logout", &json!({ "refreshToken": refresh }))
        .await;
    let response = app
        .post("/auth/refresh", &json!({ "refreshToken": refresh }))
        .await;

    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_message(response).await, "Refresh token blacklisted");
}

#[tokio::test]
async fn tampered_refresh_token_is_revoked_on_first_use() {
    let app = spawn_app().await;
    let (_, refresh) = app.register_and_login("ada@example.com").await;
    let tampered = format!("{}X", refresh);

    let first = app
        .post("/auth/refresh", &json!({ "refreshToken": tampered }))
        .await;
    assert_eq!(401, first.status().as_u16());
    assert_eq!(error_message(first).await, "Invalid refresh token");

    let second = app
        .post("/auth/refresh", &json!({ "refreshToken": tampered }))
        .await;
    assert_eq!(401, second.status().as_u16());
    assert_eq!(error_message(second).await, "Refresh token blacklisted");

    // The untampered original is a different string and still works.
    let original = app
        .post("/auth/refresh", &json!({ "refreshToken": refresh }))
        .await;
    assert_eq!(200, original.status().as_u16());
}

#[tokio::test]
async fn refresh_without_token_returns_400() {
    let app = spawn_app().await;

    let response = app.post("/auth/refresh", &json!({})).await;

    assert_eq!(400, response.status().as_u16());
}
