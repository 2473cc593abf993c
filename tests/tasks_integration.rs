use serde_json::{json, Value};
use taskboard::configuration::get_configuration;
use taskboard::startup::{AppState, Application};
use taskboard::store::tasks::{self, NewTask, TaskPriority, TaskStatus};

pub struct TestApp {
    pub address: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

/// A logged-in subject
pub struct TestUser {
    pub id: i64,
    pub access_token: String,
}

impl TestApp {
    async fn login_as(&self, email: &str) -> TestUser {
        let credentials = json!({ "email": email, "password": "hunter22" });
        self.client
            .post(&format!("{}/auth/register", &self.address))
            .json(&credentials)
            .send()
            .await
            .expect("Failed to execute request.");
        let tokens: Value = self
            .client
            .post(&format!("{}/auth/login", &self.address))
            .json(&credentials)
            .send()
            .await
            .expect("Failed to execute request.")
            .json()
            .await
            .expect("Failed to parse response");
        let access_token = tokens["accessToken"].as_str().expect("accessToken").to_string();

        let me: Value = self
            .client
            .get(&format!("{}/auth/me", &self.address))
            .bearer_auth(&access_token)
            .send()
            .await
            .expect("Failed to execute request.")
            .json()
            .await
            .expect("Failed to parse response");

        TestUser {
            id: me["subjectId"].as_i64().expect("subjectId"),
            access_token,
        }
    }

    async fn list(&self, user: &TestUser, q: Option<&str>) -> Vec<Value> {
        let mut request = self
            .client
            .get(&format!("{}/api/tasks", &self.address))
            .bearer_auth(&user.access_token);
        if let Some(q) = q {
            request = request.query(&[("q", q)]);
        }
        let response = request.send().await.expect("Failed to execute request.");
        assert_eq!(200, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }

    async fn create(&self, user: &TestUser, body: Value) -> reqwest::Response {
        self.client
            .post(&format!("{}/api/tasks", &self.address))
            .bearer_auth(&user.access_token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn create_titled(&self, user: &TestUser, title: &str) -> i64 {
        let response = self.create(user, json!({ "title": title })).await;
        assert_eq!(201, response.status().as_u16());
        let body: Value = response.json().await.expect("Failed to parse response");
        body["id"].as_i64().expect("id")
    }

    async fn update(&self, user: &TestUser, id: i64, body: Value) -> reqwest::Response {
        self.client
            .put(&format!("{}/api/tasks/{}", &self.address, id))
            .bearer_auth(&user.access_token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn delete(&self, user: &TestUser, id: i64) -> reqwest::Response {
        self.client
            .delete(&format!("{}/api/tasks/{}", &self.address, id))
            .bearer_auth(&user.access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Write a task straight to the store, bypassing the HTTP layer and
    /// therefore the cache invalidation.
    async fn insert_behind_cache(&self, user: &TestUser, title: &str) {
        let lease = self.state.store.acquire().await.expect("Failed to lease handle");
        let mut conn = lease.lock().await;
        tasks::insert(
            &mut conn,
            user.id,
            &NewTask {
                title: title.to_string(),
                status: TaskStatus::Todo,
                priority: TaskPriority::Low,
                module: None,
            },
        )
        .await
        .expect("Failed to insert task");
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
    let state = application.state().clone();
    let _ = tokio::spawn(application.run_until_stopped());

    TestApp {
        address,
        state,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn tasks_require_access_token() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(&format!("{}/api/tasks", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn create_applies_defaults_and_ignores_client_owned_fields() {
    let app = spawn_app().await;
    let user = app.login_as("ada@example.com").await;

    let response = app
        .create(
            &user,
            json!({ "title": "Write docs", "module": "backend", "id": 999, "userId": 42 }),
        )
        .await;

    assert_eq!(201, response.status().as_u16());
    let task: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(task["title"], "Write docs");
    assert_eq!(task["status"], "todo");
    assert_eq!(task["priority"], "medium");
    assert_eq!(task["module"], "backend");
    assert_eq!(task["userId"], user.id);
    assert_ne!(task["id"], 999);
}

#[tokio::test]
async fn create_without_title_returns_400() {
    let app = spawn_app().await;
    let user = app.login_as("ada@example.com").await;

    for body in [json!({}), json!({ "title": "   " })] {
        let response = app.create(&user, body).await;
        assert_eq!(400, response.status().as_u16());
        let error: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(error["error"], "title required");
    }

    let response = app
        .create(&user, json!({ "title": "x", "status": "someday" }))
        .await;
    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn repeated_reads_are_served_from_cache() {
    let app = spawn_app().await;
    let user = app.login_as("ada@example.com").await;
    app.create_titled(&user, "First").await;

    assert_eq!(app.list(&user, None).await.len(), 1);
    app.insert_behind_cache(&user, "Sneaky").await;

    // Within the TTL the second read does not reach the store.
    assert_eq!(app.list(&user, None).await.len(), 1);
}

#[tokio::test]
async fn write_invalidates_cached_list() {
    let app = spawn_app().await;
    let user = app.login_as("ada@example.com").await;
    let first = app.create_titled(&user, "First").await;
    assert_eq!(app.list(&user, None).await.len(), 1);

    app.create_titled(&user, "Second").await;
    assert_eq!(app.list(&user, None).await.len(), 2);

    let response = app.update(&user, first, json!({ "status": "done" })).await;
    assert_eq!(200, response.status().as_u16());
    let listed = app.list(&user, None).await;
    assert_eq!(listed[0]["status"], "done");

    let response = app.delete(&user, first).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["ok"], true);
    assert_eq!(app.list(&user, None).await.len(), 1);
}

#[tokio::test]
async fn search_bypasses_cache() {
    let app = spawn_app().await;
    let user = app.login_as("ada@example.com").await;
    app.create_titled(&user, "Fix login bug").await;
    assert_eq!(app.list(&user, None).await.len(), 1);

    app.insert_behind_cache(&user, "Deploy release").await;

    let found = app.list(&user, Some("deploy")).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["title"], "Deploy release");

    // A blank query is a plain read.
    assert_eq!(app.list(&user, Some("  ")).await.len(), 1);
}

#[tokio::test]
async fn caches_are_per_subject() {
    let app = spawn_app().await;
    let ada = app.login_as("ada@example.com").await;
    let bob = app.login_as("bob@example.com").await;

    app.create_titled(&ada, "Ada's task").await;

    assert_eq!(app.list(&ada, None).await.len(), 1);
    assert!(app.list(&bob, None).await.is_empty());
}

#[tokio::test]
async fn foreign_and_missing_tasks_are_forbidden() {
    let app = spawn_app().await;
    let ada = app.login_as("ada@example.com").await;
    let bob = app.login_as("bob@example.com").await;
    let task = app.create_titled(&ada, "Private").await;

    let response = app.update(&bob, task, json!({ "title": "Mine now" })).await;
    assert_eq!(403, response.status().as_u16());
    let error: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(error["error"], "not allowed");

    assert_eq!(403, app.delete(&bob, task).await.status().as_u16());
    assert_eq!(403, app.delete(&ada, task + 1000).await.status().as_u16());

    let listed = app.list(&ada, None).await;
    assert_eq!(listed[0]["title"], "Private");
}

#[tokio::test]
async fn non_numeric_task_id_returns_400() {
    let app = spawn_app().await;
    let user = app.login_as("ada@example.com").await;

    let response = app
        .client
        .delete(&format!("{}/api/tasks/abc", &app.address))
        .bearer_auth(&user.access_token)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn revoked_access_token_cannot_read_tasks() {
    let app = spawn_app().await;
    let user = app.login_as("ada@example.com").await;

    app.client
        .post(&format!("{}/auth/logout", &app.address))
        .bearer_auth(&user.access_token)
        .send()
        .await
        .expect("Failed to execute request.");

    let response = app
        .client
        .get(&format!("{}/api/tasks", &app.address))
        .bearer_auth(&user.access_token)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());
}
