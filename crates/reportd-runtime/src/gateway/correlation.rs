//! Correlation-id propagation.
//!
//! Every request gets a correlation id: echoed from the `x-correlation-id`
//! header when the client sent one, generated otherwise. The id rides on the
//! request extensions, on a tracing span wrapping the handler, and on the
//! response header.

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the correlation id in both directions.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// The request's correlation id, stored in request extensions.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

/// Per-request context handlers use to build canonical error responses.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub correlation_id: String,
    pub path: String,
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = parts
            .extensions
            .get::<CorrelationId>()
            .map(|c| c.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Self {
            correlation_id,
            path: parts.uri.path().to_string(),
        })
    }
}

/// Middleware attaching the correlation id to extensions, logs, and the
/// response.
pub async fn correlation_middleware(mut req: Request, next: Next) -> Response {
    let correlation_id = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut()
        .insert(CorrelationId(correlation_id.clone()));

    let span = tracing::info_span!(
        "request",
        correlation_id = %correlation_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, value);
    }

    response
}
