#![allow(dead_code)]

use std::net::SocketAddr;

use axum::extract::Path;
use axum::http::StatusCode as AxumStatus;
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use booksmartly::config::{Config, LlmConfig, RegistrationMode, SquareConfig, SquareEnvironment};

pub const PASSWORD: &str = "password123";
pub const SUPER_ADMIN_EMAIL: &str = "root@test.com";

/// A running test server instance with a dedicated test database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn register(&self, email: &str, password: &str, name: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/v1/auth/register"))
            .json(&json!({ "email": email, "password": password, "name": name }))
            .send()
            .await
            .expect("register request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn login(&self, email: &str, password: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/v1/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Register a user with the shared test password and return their access token.
    pub async fn signup(&self, email: &str) -> String {
        let name = email.split('@').next().unwrap_or(email);
        let (body, status) = self.register(email, PASSWORD, name).await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Log in again to pick up organization and role changes in the token.
    pub async fn relogin(&self, email: &str) -> String {
        let (body, status) = self.login(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn user_id(&self, token: &str) -> String {
        let (me, status) = self.get_auth("/api/v1/auth/me", token).await;
        assert_eq!(status, StatusCode::OK, "me failed: {me}");
        me["user"]["id"].as_str().unwrap().to_string()
    }

    /// Create an organization as `email`, returning it and a token that carries it.
    pub async fn create_organization(&self, email: &str, token: &str, name: &str) -> (Value, String) {
        let (body, status) = self
            .post_auth("/api/v1/organizations", token, &json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::OK, "create organization failed: {body}");
        (body["organization"].clone(), self.relogin(email).await)
    }

    /// Create an appointment for the token's user, asserting success.
    pub async fn create_appointment(&self, token: &str, body: &Value) -> Value {
        let (created, status) = self.post_auth("/api/v1/appointments", token, body).await;
        assert_eq!(status, StatusCode::OK, "create appointment failed: {created}");
        created
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// POST a raw text body, as the CSV import expects.
    pub async fn post_text(&self, path: &str, token: &str, text: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .header("content-type", "text/csv")
            .body(text.to_string())
            .send()
            .await
            .expect("post text request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

// ── Upstream stubs ──────────────────────────────────────────────

/// Asks for `getAppInfo` first, then answers once the function result is in.
async fn stub_completion(Json(body): Json<Value>) -> Json<Value> {
    let last_role = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["role"].as_str())
        .unwrap_or_default()
        .to_string();

    let message = if last_role == "function" {
        json!({ "role": "assistant", "content": "done" })
    } else {
        json!({
            "role": "assistant",
            "content": null,
            "function_call": { "name": "getAppInfo", "arguments": "{}" }
        })
    };
    Json(json!({ "choices": [{ "index": 0, "message": message }] }))
}

async fn stub_invoice(Path(id): Path<String>) -> (AxumStatus, Json<Value>) {
    if id == "missing" {
        return (
            AxumStatus::NOT_FOUND,
            Json(json!({ "errors": [{ "code": "NOT_FOUND", "detail": "Invoice not found" }] })),
        );
    }
    (
        AxumStatus::OK,
        Json(json!({
            "invoice": {
                "id": id,
                "version": 1,
                "status": "UNPAID",
                "payment_requests": [{ "computed_amount_money": { "amount": 5000, "currency": "USD" } }]
            }
        })),
    )
}

async fn stub_publish(Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "invoice": { "id": id, "version": 1, "status": "UNPAID" } }))
}

fn stub_router() -> Router {
    Router::new()
        .route("/v1/chat/completions", post(stub_completion))
        .route(
            "/v2/customers/search",
            post(|| async { Json(json!({ "customers": [] })) }),
        )
        .route(
            "/v2/customers",
            post(|| async { Json(json!({ "customer": { "id": "CUST1" } })) }),
        )
        .route(
            "/v2/orders",
            post(|| async { Json(json!({ "order": { "id": "ORDER1" } })) }),
        )
        .route(
            "/v2/invoices",
            post(|| async { Json(json!({ "invoice": { "id": "INV1", "version": 0, "status": "DRAFT" } })) }),
        )
        .route("/v2/invoices/{id}/publish", post(stub_publish))
        .route("/v2/invoices/{id}", get(stub_invoice))
}

/// Serve the LLM and Square stubs on a random local port.
async fn spawn_upstream() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, stub_router())
            .await
            .expect("Stub server failed");
    });
    addr
}

// ── App lifecycle ───────────────────────────────────────────────

/// Spawn a test app with a fresh temporary database.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Like [`spawn_app`], with a chance to adjust the config first.
pub async fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let db_name = format!("booksmartly_test_{}", Uuid::now_v7().to_string().replace('-', ""));

    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let upstream = spawn_upstream().await;

    let mut config = Config {
        database_url: test_url,
        jwt_secret: "test-jwt-secret-that-is-long-enough".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "http://localhost:0".to_string(),
        registration: RegistrationMode::Open,
        max_body_size: 1_048_576,
        log_level: "warn".to_string(),
        super_admin_email: Some(SUPER_ADMIN_EMAIL.to_string()),
        chat_rate_limit: 100,
        cors_origins: vec!["http://localhost:5173".to_string()],
        llm: Some(LlmConfig {
            api_key: "test-key".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: format!("http://{upstream}/v1"),
            max_retries: 0,
        }),
        square: Some(SquareConfig {
            access_token: "test-square-token".to_string(),
            environment: SquareEnvironment::Sandbox,
            location_id: "LOC1".to_string(),
            base_url: format!("http://{upstream}"),
        }),
    };
    configure(&mut config);

    let app = booksmartly::build_app(pool.clone(), config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        pool,
        client,
        db_name,
    }
}

/// Drop the test database after tests complete.
pub async fn cleanup(app: TestApp) {
    let db_name = app.db_name.clone();
    app.pool.close().await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}
