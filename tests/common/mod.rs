#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use restaurant_manager::{
    app_router,
    config::AppConfig,
    db::{self, DbConfig},
    AppState,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use tower_http::cors::CorsLayer;

pub const TEST_SECRET: &str = "k3Jd9sQw7LpZx2Vb6NcR4tYh8GfU1eAo5MiKj0WnXqSzTrPlDyBvCuHgEaFdIxOq";
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Full application over a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "development".to_string(),
        );

        // One connection: every pooled connection to `:memory:` is a separate database.
        let pool = db::establish_connection_with_config(&DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            sqlx_logging: false,
            ..Default::default()
        })
        .await
        .expect("in-memory database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = app_router(state.clone(), CorsLayer::permissive());

        Self { router, state }
    }

    /// Sends a request through the router and decodes the JSON body, if any.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, token).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body), token).await
    }

    /// Registers `username` and returns an access token for it.
    pub async fn signup(&self, username: &str) -> String {
        let (status, _) = self
            .post(
                "/auth/register",
                json!({ "username": username, "password": TEST_PASSWORD }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "registering {}", username);

        self.login(username).await["access_token"]
            .as_str()
            .expect("access token")
            .to_string()
    }

    /// Full token pair for an already registered user.
    pub async fn login(&self, username: &str) -> Value {
        let (status, body) = self
            .post(
                "/auth/token",
                json!({ "username": username, "password": TEST_PASSWORD }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login for {}", username);
        body
    }

    /// Creates a restaurant owned by the token holder and returns its id.
    pub async fn create_restaurant(
        &self,
        token: &str,
        name: &str,
        restaurant_type: &str,
        opened_at: &str,
    ) -> i64 {
        let (status, body) = self
            .post(
                "/api/v1/restaurants",
                json!({
                    "name": name,
                    "restaurant_type": restaurant_type,
                    "latitude": 38.72,
                    "longitude": -9.14,
                    "opened_at": opened_at,
                }),
                Some(token),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "creating {}: {}", name, body);
        body["data"]["id"].as_i64().expect("restaurant id")
    }

    pub async fn rate(&self, token: &str, restaurant_id: i64, score: i32) -> (StatusCode, Value) {
        self.post(
            &format!("/api/v1/rate/{}", restaurant_id),
            json!({ "score": score }),
            Some(token),
        )
        .await
    }

    pub async fn add_sale(
        &self,
        token: &str,
        restaurant_id: i64,
        income: &str,
        date: &str,
    ) -> (StatusCode, Value) {
        self.post(
            &format!("/api/v1/sales/{}", restaurant_id),
            json!({ "income": income, "expenditure": "100.00", "date": date }),
            Some(token),
        )
        .await
    }
}

/// Reads a decimal that serde rendered as a JSON string.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {}", other),
    }
}

/// Names of the restaurants in an enveloped list.
pub fn names(list: &Value) -> Vec<String> {
    let mut names: Vec<String> = list
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["name"].as_str().expect("name").to_string())
        .collect();
    names.sort();
    names
}
