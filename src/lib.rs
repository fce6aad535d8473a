//! Restaurant manager library
//!
//! Restaurants, ratings and sales behind a JSON API: a filterable listing
//! with derived metrics, one-rating-per-user upserts and owner-scoped reads.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod queries;
pub mod services;
pub mod tracing;

use axum::{
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};

use crate::auth::{AuthConfig, AuthRouterExt, AuthService};
use crate::handlers::{ratings, read_api, restaurants, sales};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires the auth service and domain services over one connection pool.
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let auth_cfg = AuthConfig::new(
            config.jwt_secret.clone(),
            config.auth_audience.clone(),
            config.auth_issuer.clone(),
            Duration::from_secs(config.jwt_expiration as u64),
            Duration::from_secs(config.refresh_token_expiration as u64),
        );
        Self {
            auth: Arc::new(AuthService::new(auth_cfg, db.clone())),
            services: handlers::AppServices::new(db.clone()),
            db,
            config,
        }
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn validation_errors_response_includes_metadata() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("meta-validation"),
            async { ApiResponse::<()>::validation_errors(vec!["missing".into()]) },
        )
        .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-validation"));
        assert_eq!(response.errors, Some(vec!["missing".to_string()]));
    }

    #[test]
    fn metadata_without_request_scope_has_no_id() {
        let response = ApiResponse::success(1);
        assert!(response.meta.expect("metadata expected").request_id.is_none());
    }
}

/// Web-layer routes, mounted under `/api/v1`. Every route needs a bearer token.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/restaurants",
            get(restaurants::home_listing).post(restaurants::create_restaurant),
        )
        .route(
            "/restaurants/:id",
            put(restaurants::update_restaurant).delete(restaurants::delete_restaurant),
        )
        .route("/rate", get(ratings::restaurants_to_rate))
        .route("/rate/:id", post(ratings::rate_restaurant))
        .route("/sales", get(sales::restaurant_sales))
        .route("/sales/:id", post(sales::add_sale))
        .with_auth()
}

/// Read API, mounted under `/api`. Only `all-restaurants` is public.
pub fn read_api_routes() -> Router<AppState> {
    let protected = Router::new()
        .route(
            "/my-restaurants",
            get(read_api::list_my_restaurants).post(read_api::create_my_restaurant),
        )
        .route("/my-restaurants/:id", get(read_api::get_my_restaurant))
        .route("/ratings", get(read_api::list_ratings))
        .route(
            "/ratings/:id",
            get(read_api::get_rating)
                .put(read_api::update_rating)
                .delete(read_api::delete_rating),
        )
        .route("/sales", get(read_api::list_my_sales))
        .with_auth();

    Router::new()
        .route("/all-restaurants", get(read_api::list_all_restaurants))
        .merge(protected)
}

/// CORS from configured origins; permissive only where the config allows it.
pub fn cors_layer(cfg: &config::AppConfig) -> anyhow::Result<CorsLayer> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any))
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        Ok(CorsLayer::permissive())
    } else {
        anyhow::bail!(
            "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
        )
    }
}

/// The complete application: routes plus the shared middleware stack.
pub fn app_router(state: AppState, cors: CorsLayer) -> Router {
    let auth_service = state.auth.clone();

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .nest("/api", read_api_routes())
        .nest("/auth", auth::auth_routes().with_state(auth_service.clone()))
        .nest("/health", health::health_routes(state.db.clone()))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            auth::inject_auth_service,
        ))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

pub mod prelude {
    pub use crate::auth::{AuthService, AuthUser};
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::queries::{Query, RestaurantFilter};
    pub use crate::services::*;
    pub use crate::{app_router, ApiResponse, AppState};
}
