/*!
 * # Authentication and Authorization Module
 *
 * Back-office users (operators and admins) sign in with email and password
 * and receive a short-lived HS256 access token plus a refresh token.
 *
 * Routes opt in with [`AuthRouterExt`]: `with_auth` requires a valid
 * access token, `with_permission` additionally requires a permission
 * (admins hold every permission).
 */

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{user, UserRole},
    errors::ServiceError,
    services::users::UserService,
};

/// Permission names checked by [`permission_middleware`]
pub mod perm {
    pub const BOOKINGS_READ: &str = "bookings:read";
    pub const BOOKINGS_OPERATE: &str = "bookings:operate";
    pub const LOTS_MANAGE: &str = "lots:manage";
    pub const PRICING_MANAGE: &str = "pricing:manage";
    pub const SERVICES_MANAGE: &str = "services:manage";
    pub const PAYMENTS_REFUND: &str = "payments:refund";
    pub const USERS_MANAGE: &str = "users:manage";
    pub const HOLDS_MANAGE: &str = "holds:manage";

    pub const ALL: [&str; 8] = [
        BOOKINGS_READ,
        BOOKINGS_OPERATE,
        LOTS_MANAGE,
        PRICING_MANAGE,
        SERVICES_MANAGE,
        PAYMENTS_REFUND,
        USERS_MANAGE,
        HOLDS_MANAGE,
    ];
}

/// Permissions granted by a role
pub fn permissions_for(role: UserRole) -> Vec<String> {
    match role {
        UserRole::Admin => perm::ALL.iter().map(|p| p.to_string()).collect(),
        UserRole::Operator => vec![
            perm::BOOKINGS_READ.to_string(),
            perm::BOOKINGS_OPERATE.to_string(),
        ],
    }
}

const ACCESS_TOKEN: &str = "access";
const REFRESH_TOKEN: &str = "refresh";

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
    /// `access` or `refresh`
    pub token_use: String,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub token_id: String,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }
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

/// Issues and validates tokens
#[derive(Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    users: UserService,
}

impl AuthService {
    pub fn new(config: AuthConfig, users: UserService) -> Self {
        Self { config, users }
    }

    fn claims_for(
        &self,
        user: &user::Model,
        token_use: &str,
        lifetime: Duration,
    ) -> Result<Claims, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(lifetime)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;
        let access = token_use == ACCESS_TOKEN;

        Ok(Claims {
            sub: user.id.to_string(),
            name: access.then(|| user.name.clone()),
            email: access.then(|| user.email.clone()),
            roles: if access { vec![user.role.to_string()] } else { vec![] },
            permissions: if access { permissions_for(user.role) } else { vec![] },
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            token_use: token_use.to_string(),
        })
    }

    fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Access and refresh token for a user
    pub fn generate_token(&self, user: &user::Model) -> Result<TokenPair, AuthError> {
        let access = self.claims_for(user, ACCESS_TOKEN, self.config.access_token_expiration)?;
        let refresh =
            self.claims_for(user, REFRESH_TOKEN, self.config.refresh_token_expiration)?;

        Ok(TokenPair {
            access_token: self.encode(&access)?,
            refresh_token: self.encode(&refresh)?,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            refresh_expires_in: self.config.refresh_token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

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

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<TokenPair, AuthError> {
        let user = self
            .users
            .authenticate(&credentials.email, &credentials.password)
            .await
            .map_err(|e| match e {
                ServiceError::Unauthorized(_) => AuthError::InvalidCredentials,
                other => AuthError::InternalError(other.response_message()),
            })?;
        info!(user_id = %user.id, "User logged in");
        self.generate_token(&user)
    }

    /// New token pair from a refresh token; the user must still be active.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.validate_token(refresh_token)?;
        if claims.token_use != REFRESH_TOKEN {
            return Err(AuthError::InvalidToken);
        }
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let user = self.users.find(user_id).await.map_err(|e| match e {
            ServiceError::NotFound(_) => AuthError::UserNotFound,
            other => AuthError::InternalError(other.response_message()),
        })?;
        if !user.is_active {
            return Err(AuthError::InvalidCredentials);
        }
        self.generate_token(&user)
    }
}

/// Token pair response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

/// Login credentials
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
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

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Internal error: {0}")]
    InternalError(String),
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
            Self::TokenCreation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                "Could not issue token".to_string(),
            ),
            Self::UserNotFound => (
                StatusCode::UNAUTHORIZED,
                "AUTH_USER_NOT_FOUND",
                "User not found".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
            Self::InternalError(msg) => {
                warn!(error = %msg, "Authentication internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AUTH_INTERNAL_ERROR",
                    "Internal error".to_string(),
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

/// Permission middleware to check if a user has the required permission
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or(AuthError::MissingAuth)?;

    // admins hold every permission
    if user.is_admin() || user.has_permission(&required_permission) {
        return Ok(next.run(request).await);
    }

    debug!(user_id = %user.user_id, permission = %required_permission, "Permission denied");
    Err(AuthError::InsufficientPermissions)
}

/// Role middleware to check if a user has the required role
pub async fn role_middleware(
    State(required_role): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or(AuthError::MissingAuth)?;

    if !user.has_role(&required_role) {
        return Err(AuthError::InsufficientPermissions);
    }
    Ok(next.run(request).await)
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

fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AuthError::MissingAuth)?;

    let claims = auth_service.validate_token(token)?;
    if claims.token_use != ACCESS_TOKEN {
        return Err(AuthError::InvalidToken);
    }

    Ok(AuthUser {
        user_id: claims.sub,
        name: claims.name,
        email: claims.email,
        roles: claims.roles,
        permissions: claims.permissions,
        token_id: claims.jti,
    })
}

/// Authentication routes
pub fn auth_routes() -> axum::Router<Arc<AuthService>> {
    axum::Router::new()
        .route("/login", axum::routing::post(login_handler))
        .route("/refresh", axum::routing::post(refresh_token_handler))
        .layer(DefaultBodyLimit::max(1024 * 64))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginCredentials,
    responses(
        (status = 200, description = "Signed in", body = TokenPair),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<TokenPair>, AuthError> {
    auth_service.login(&credentials).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Invalid refresh token")
    ),
    tag = "auth"
)]
pub async fn refresh_token_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(refresh_request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    auth_service
        .refresh_token(&refresh_request.refresh_token)
        .await
        .map(Json)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
    fn with_role(self, role: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }

    fn with_role(self, role: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            role.to_string(),
            role_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SystemClock;
    use crate::db::DbPool;

    fn service() -> AuthService {
        let db = Arc::new(DbPool::Disconnected);
        AuthService::new(
            AuthConfig::new(
                "test-secret-that-is-long-enough-for-hs256-signing".into(),
                "airpark-api".into(),
                "airpark-auth".into(),
                Duration::from_secs(900),
                Duration::from_secs(3600),
            ),
            UserService::new(db, Arc::new(SystemClock)),
        )
    }

    fn user(role: UserRole) -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            email: "ops@airpark.test".into(),
            name: "Ops".into(),
            password_hash: String::new(),
            role,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn access_token_carries_role_permissions() {
        let service = service();
        let pair = service.generate_token(&user(UserRole::Operator)).unwrap();
        let claims = service.validate_token(&pair.access_token).unwrap();
        assert_eq!(claims.roles, vec!["operator"]);
        assert!(claims.permissions.contains(&perm::BOOKINGS_OPERATE.to_string()));
        assert!(!claims.permissions.contains(&perm::LOTS_MANAGE.to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", pair.refresh_token).parse().unwrap(),
        );
        assert!(matches!(
            extract_auth_from_headers(&headers, &service),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn tokens_from_another_issuer_are_rejected() {
        let service = service();
        let mut other = service.clone();
        other.config.jwt_issuer = "someone-else".into();
        let pair = other.generate_token(&user(UserRole::Admin)).unwrap();
        assert!(matches!(
            service.validate_token(&pair.access_token),
            Err(AuthError::InvalidToken)
        ));
    }
}
