use crate::{errors::ServiceError, PaginatedResponse};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

pub const SESSION_HEADER: &str = "x-session-id";
pub const SESSION_COOKIE: &str = "airpark_session";
const MAX_SESSION_ID_LEN: usize = 128;

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(crate::ApiResponse::success(data))).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Builds the list envelope from one page of results.
pub fn paginate<T>(items: Vec<T>, total: u64, page: u64, limit: u64) -> PaginatedResponse<T> {
    let total_pages = if total == 0 || limit == 0 {
        0
    } else {
        (total + limit - 1) / limit
    };
    PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    }
}

/// `?locale=` for endpoints that return display names
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocaleQuery {
    /// e.g. `is`; falls back to the default name
    pub locale: Option<String>,
}

/// `?include_inactive=true` on admin listings
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InactiveFilter {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Checkout session identifier, from the `x-session-id` header or the
/// `airpark_session` cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn valid_session_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_SESSION_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn session_from_parts(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .map(str::to_string);

    from_header.or_else(|| {
        parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .map(|(_, value)| value.trim().to_string())
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match session_from_parts(parts) {
            Some(id) if valid_session_id(&id) => Ok(SessionId(id)),
            Some(_) => Err(ServiceError::ValidationError(
                "session id must be 1-128 characters of letters, digits, '-' or '_'".to_string(),
            )),
            None => Err(ServiceError::ValidationError(format!(
                "missing {} header or {} cookie",
                SESSION_HEADER, SESSION_COOKIE
            ))),
        }
    }
}
