/*!
 * # Authentication
 *
 * JWT access/refresh token pairs for registered users. Refresh tokens are
 * persisted and rotated: presenting one revokes it and issues a new pair.
 * Passwords are stored as argon2 hashes.
 */

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{DefaultBodyLimit, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{thread_rng, RngCore};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

// Entity modules
pub mod refresh_token;
pub mod user;

const ACCESS_TOKEN: &str = "access";
const REFRESH_TOKEN: &str = "refresh";

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // Subject (user ID)
    pub username: String,   // Login name at issue time
    pub jti: String,        // JWT ID
    pub iat: i64,           // Issued at time
    pub exp: i64,           // Expiration time
    pub nbf: i64,           // Not valid before time
    pub iss: String,        // Issuer
    pub aud: String,        // Audience
    pub token_type: String, // "access" or "refresh"
}

/// Authenticated user data extracted from the access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub token_id: String,
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
    pub refresh_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
        refresh_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
            refresh_token_expiration,
        }
    }
}

/// Hashes a password with argon2 and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AuthError::InternalError(format!("Salt encoding failed: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::InternalError(format!("Password hashing failed: {}", e)))
}

/// Checks a password against a stored argon2 hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Authentication service that handles registration, token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Creates an account. Usernames are unique.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> Result<user::Model, AuthError> {
        request
            .validate()
            .map_err(|e| AuthError::InvalidRequest(e.to_string()))?;

        let username = request.username.trim().to_string();
        let existing = user::Entity::find()
            .filter(user::Column::Username.eq(username.as_str()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let now = Utc::now();
        let created = user::ActiveModel {
            username: Set(username),
            password_hash: Set(hash_password(&request.password)?),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| match e.sql_err() {
            // Lost a race with a concurrent registration of the same name.
            Some(SqlErr::UniqueConstraintViolation(_)) => AuthError::UsernameTaken,
            _ => AuthError::from(e),
        })?;

        info!(user_id = created.id, "User registered");
        Ok(created)
    }

    /// Verifies credentials and issues a token pair.
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: LoginCredentials) -> Result<TokenPair, AuthError> {
        let account = user::Entity::find()
            .filter(user::Column::Username.eq(credentials.username.trim()))
            .one(&*self.db)
            .await?;

        match account {
            Some(account) if verify_password(&credentials.password, &account.password_hash) => {
                self.generate_token(&account).await
            }
            _ => {
                warn!("Rejected login attempt");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    fn claims_for(
        &self,
        account: &user::Model,
        jti: &str,
        now: DateTime<Utc>,
        exp: DateTime<Utc>,
        token_type: &str,
    ) -> Claims {
        Claims {
            sub: account.id.to_string(),
            username: account.username.clone(),
            jti: jti.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            token_type: token_type.to_string(),
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Generate an access/refresh pair and persist the refresh token id
    pub async fn generate_token(&self, account: &user::Model) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access_exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;
        let refresh_exp = now
            + ChronoDuration::from_std(self.config.refresh_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let access_jti = Uuid::new_v4().to_string();
        let refresh_jti = Uuid::new_v4().to_string();

        let access_token =
            self.sign(&self.claims_for(account, &access_jti, now, access_exp, ACCESS_TOKEN))?;
        let refresh_token =
            self.sign(&self.claims_for(account, &refresh_jti, now, refresh_exp, REFRESH_TOKEN))?;

        refresh_token::ActiveModel {
            user_id: Set(account.id),
            token_id: Set(refresh_jti),
            created_at: Set(now),
            expires_at: Set(refresh_exp),
            revoked: Set(false),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            refresh_expires_in: self.config.refresh_token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT and extract its claims. Signature, expiry, issuer and
    /// audience are all checked.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Validates an access token and builds the request identity.
    pub fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.validate_token(token)?;
        if claims.token_type != ACCESS_TOKEN {
            return Err(AuthError::InvalidToken);
        }
        let user_id = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthUser {
            user_id,
            username: claims.username,
            token_id: claims.jti,
        })
    }

    /// Exchanges a refresh token for a new pair and revokes the old one
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.validate_token(refresh_token)?;
        if claims.token_type != REFRESH_TOKEN {
            return Err(AuthError::InvalidToken);
        }
        let user_id: i32 = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;

        let stored = refresh_token::Entity::find()
            .filter(refresh_token::Column::TokenId.eq(claims.jti.as_str()))
            .filter(refresh_token::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if stored.revoked {
            warn!(user_id, "Revoked refresh token presented");
            return Err(AuthError::RevokedToken);
        }
        if stored.expires_at <= Utc::now() {
            return Err(AuthError::TokenExpired);
        }

        let account = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let mut revoked: refresh_token::ActiveModel = stored.into();
        revoked.revoked = Set(true);
        revoked.update(&*self.db).await?;
        debug!(user_id, jti = %claims.jti, "Refresh token rotated");

        self.generate_token(&account).await
    }
}

/// Token pair response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

/// Login credentials
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

/// Registration request
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Public account data returned on registration
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub id: i32,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for RegisteredUser {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            created_at: model.created_at,
        }
    }
}

/// Refresh token request
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Token has been revoked")]
    RevokedToken,
    #[error("Token creation failed: {0}")]
    TokenCreation(String),
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("User not found")]
    UserNotFound,
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<DbErr> for AuthError {
    fn from(err: DbErr) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::RevokedToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REVOKED_TOKEN",
                "Authentication token has been revoked".to_string(),
            ),
            Self::TokenCreation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                "Could not issue token".to_string(),
            ),
            Self::UsernameTaken => (
                StatusCode::CONFLICT,
                "AUTH_USERNAME_TAKEN",
                "Username already taken".to_string(),
            ),
            Self::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "AUTH_INVALID_REQUEST",
                msg.clone(),
            ),
            Self::UserNotFound => (
                StatusCode::NOT_FOUND,
                "AUTH_USER_NOT_FOUND",
                "User not found".to_string(),
            ),
            Self::DatabaseError(msg) => {
                tracing::error!(error = %msg, "Database error during authentication");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AUTH_DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            Self::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal authentication error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AUTH_INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Handlers take `AuthUser` directly; the auth middleware must have run.
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Makes the auth service reachable from `auth_middleware` on every request.
pub async fn inject_auth_service(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(auth_service);
    next.run(request).await
}

/// Authentication middleware that extracts and validates bearer tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication service not available",
            )
                .into_response();
        }
    };

    match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Extract authentication info from request headers
fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingAuth)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingAuth)?;

    auth_service.authenticate(token)
}

/// Authentication routes
pub fn auth_routes() -> axum::Router<Arc<AuthService>> {
    axum::Router::new()
        .route("/register", axum::routing::post(register_handler))
        .route("/token", axum::routing::post(login_handler))
        .route("/token/refresh", axum::routing::post(refresh_token_handler))
        .layer(DefaultBodyLimit::max(1024 * 64)) // 64KB limit
}

/// Registration handler
pub async fn register_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisteredUser>), AuthError> {
    let created = auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Login handler
pub async fn login_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<TokenPair>, AuthError> {
    let token_pair = auth_service.login(credentials).await?;
    Ok(Json(token_pair))
}

/// Refresh token handler
pub async fn refresh_token_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(refresh_request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let token_pair = auth_service
        .refresh_token(&refresh_request.refresh_token)
        .await?;
    Ok(Json(token_pair))
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }
}
