#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Every [`TestApp`] runs the real router against its own PostgreSQL schema,
//! so tests can count rows without seeing each other's data. Tests return
//! early when `DATABASE_URL` is not set.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{Value as JsonValue, json};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Connection, Executor, PgConnection};
use tower::ServiceExt;
use uuid::Uuid;

use prodata_kernel::config::Config;
use prodata_kernel::models::Account;
use prodata_kernel::models::account::CreateAccount;
use prodata_kernel::routes;
use prodata_kernel::state::AppState;
use prodata_test_utils::test_account;

pub const TEST_PASSWORD: &str = "test-password-123";

const TEST_JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// Test application wrapper using the real routes and state.
pub struct TestApp {
    router: Router,
    pub db: PgPool,
    pub state: AppState,
    database_url: String,
    schema: String,
}

impl TestApp {
    /// Build an app on a fresh schema, or `None` without a database.
    pub async fn try_new() -> Option<Self> {
        dotenvy::dotenv().ok();
        let database_url = std::env::var("DATABASE_URL").ok()?;
        Some(Self::new(database_url).await)
    }

    async fn new(database_url: String) -> Self {
        let schema = format!("test_{}", Uuid::now_v7().simple());

        let mut admin = PgConnection::connect(&database_url)
            .await
            .expect("Failed to connect to PostgreSQL");
        admin
            .execute(format!("CREATE SCHEMA \"{schema}\"").as_str())
            .await
            .expect("Failed to create test schema");
        admin.close().await.ok();

        let search_path = format!("SET search_path TO \"{schema}\"");
        let db = PgPoolOptions::new()
            .max_connections(5)
            .after_connect(move |conn, _meta| {
                let search_path = search_path.clone();
                Box::pin(async move {
                    conn.execute(search_path.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&database_url)
            .await
            .expect("Failed to create test pool");

        prodata_kernel::db::run_migrations(&db)
            .await
            .expect("Failed to run migrations");

        let config = Config {
            port: 0,
            database_url: database_url.clone(),
            database_max_connections: 5,
            jwt_secret: TEST_JWT_SECRET.to_string(),
            jwt_ttl_seconds: 3600,
            cors_allowed_origins: vec!["*".to_string()],
            report_max_page_size: 10_000,
            export_sample_size: 10,
            report_statement_timeout: "30s".to_string(),
        };

        let state = AppState::with_pool(db.clone(), &config);
        let router = routes::router(state.clone());

        Self {
            router,
            db,
            state,
            database_url,
            schema,
        }
    }

    /// Drop the schema created for this app.
    pub async fn cleanup(self) {
        self.db.close().await;
        if let Ok(mut conn) = PgConnection::connect(&self.database_url).await {
            conn.execute(format!("DROP SCHEMA \"{}\" CASCADE", self.schema).as_str())
                .await
                .ok();
            conn.close().await.ok();
        }
    }

    /// Send a request through the router.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send a request with an optional bearer token and JSON body.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.request(builder.body(body).unwrap()).await
    }

    /// Send a request and decode the JSON response body.
    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let response = self.send(method, uri, token, body).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    /// Create an administrator and return a bearer token for it.
    pub async fn admin_token(&self, username: &str) -> String {
        Account::upsert_admin(
            &self.db,
            username,
            TEST_PASSWORD,
            &format!("{username}@example.org"),
            username,
        )
        .await
        .expect("Failed to create admin");
        self.login(username, TEST_PASSWORD).await
    }

    /// Create an operator and return a bearer token for it.
    pub async fn operator_token(&self, username: &str) -> String {
        let input: CreateAccount =
            serde_json::from_value(test_account(username).with_password(TEST_PASSWORD).to_json())
                .unwrap();
        self.state
            .store()
            .create::<Account>(input, None)
            .await
            .expect("Failed to create operator");
        self.login(username, TEST_PASSWORD).await
    }

    /// Log in through the API and return the issued token.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .send_json(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// POST a body expecting 201 and return the created record's id.
    pub async fn create(&self, token: &str, uri: &str, body: JsonValue) -> Uuid {
        let (status, created) = self.send_json("POST", uri, Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "create {uri} failed: {created}");
        created["id"].as_str().unwrap().parse().unwrap()
    }
}

/// Collect a response body as JSON (`Null` when empty).
pub async fn body_json(response: Response) -> JsonValue {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}

/// Percent-encode a filter model for the `filters` query parameter.
pub fn encode_filters(filters: &JsonValue) -> String {
    let raw = filters.to_string();
    let mut out = String::with_capacity(raw.len() * 3);
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
