//! Custom Axum extractors.
//!
//! - `Requester`: the caller's requester id from the `X-Requester-Id` header
//! - `CorrelationId`: the id assigned by the correlation middleware
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(requester: Requester, correlation_id: CorrelationId) -> String {
//!     format!("{} / {}", requester.0, correlation_id.0)
//! }
//! ```

use crate::error::ApiError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use flashsale_core::RequesterId;
use uuid::Uuid;

/// Header carrying the authenticated principal, set by the surrounding gateway.
pub const REQUESTER_ID_HEADER: &str = "X-Requester-Id";

/// Requester id of the caller.
///
/// Rejects with `400 BAD_REQUEST` when the header is missing or not a UUID.
#[derive(Debug, Clone, Copy)]
pub struct Requester(pub RequesterId);

#[async_trait]
impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        requester_from_headers(&parts.headers).map(Self)
    }
}

fn requester_from_headers(headers: &HeaderMap) -> Result<RequesterId, ApiError> {
    let value = headers
        .get(REQUESTER_ID_HEADER)
        .ok_or_else(|| ApiError::bad_request(format!("Missing {REQUESTER_ID_HEADER} header")))?;

    value
        .to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .map(RequesterId::from_uuid)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid {REQUESTER_ID_HEADER} header")))
}

/// Correlation ID for request tracing.
///
/// Reads the id stored by the correlation middleware, or generates a fresh one
/// when the middleware is not installed.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = parts
            .extensions
            .get::<Uuid>()
            .copied()
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    #[test]
    fn test_requester_parsed_from_header() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(REQUESTER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());

        let requester = requester_from_headers(&headers).unwrap();
        assert_eq!(*requester.as_uuid(), id);
    }

    #[test]
    fn test_missing_requester_rejected() {
        let err = requester_from_headers(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_malformed_requester_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUESTER_ID_HEADER, HeaderValue::from_static("user-42"));
        let err = requester_from_headers(&headers).unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }
}
