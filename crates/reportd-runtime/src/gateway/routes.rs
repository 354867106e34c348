use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use reportd_core::error::ReportdError;
use reportd_core::report::{ReportSpec, ReportState, ReportType};

use crate::store::ListFilters;

use super::correlation::RequestMeta;
use super::response::{ApiError, HealthBody, ListBody, ReportBody};
use super::server::AppState;

/// Maximum accepted length of the Idempotency-Key header value.
const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

pub(super) async fn submit_report(
    State(state): State<AppState>,
    meta: RequestMeta,
    headers: HeaderMap,
    payload: Result<Json<ReportSpec>, JsonRejection>,
) -> Result<(StatusCode, Json<ReportBody>), ApiError> {
    let Json(spec) =
        payload.map_err(|e| ApiError::new(&meta, StatusCode::BAD_REQUEST, e.body_text()))?;
    spec.validate().map_err(|e| ApiError::from_error(&meta, e))?;

    let key = idempotency_key(&headers).map_err(|e| ApiError::from_error(&meta, e))?;

    let submission = state
        .broker
        .resolve(&spec, key.as_deref())
        .await
        .map_err(|e| ApiError::from_error(&meta, e))?;

    let artifact = state
        .service
        .store()
        .find_artifact_meta(submission.report.id)
        .await
        .map_err(|e| ApiError::from_error(&meta, e))?;

    let status = if submission.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(ReportBody::new(submission.report, artifact))))
}

pub(super) async fn get_report(
    State(state): State<AppState>,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> Result<Json<ReportBody>, ApiError> {
    let id = parse_report_id(&id).map_err(|e| ApiError::from_error(&meta, e))?;
    let (report, artifact) = state
        .service
        .get(id)
        .await
        .map_err(|e| ApiError::from_error(&meta, e))?;

    Ok(Json(ReportBody::new(report, artifact)))
}

pub(super) async fn download_artifact(
    State(state): State<AppState>,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_report_id(&id).map_err(|e| ApiError::from_error(&meta, e))?;
    let artifact = state
        .service
        .artifact(id)
        .await
        .map_err(|e| ApiError::from_error(&meta, e))?;

    let disposition = format!("attachment; filename=\"report-{}\"", id);

    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.content,
    )
        .into_response())
}

/// Query parameters for tenant listings.
#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
    state: Option<String>,
    #[serde(rename = "type")]
    report_type: Option<String>,
    limit: Option<i64>,
    cursor: Option<String>,
}

pub(super) async fn list_reports(
    State(state): State<AppState>,
    meta: RequestMeta,
    Path(tenant): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<ListBody>, ApiError> {
    let Query(query) =
        query.map_err(|e| ApiError::new(&meta, StatusCode::BAD_REQUEST, e.body_text()))?;

    let filters = parse_filters(&query).map_err(|e| ApiError::from_error(&meta, e))?;
    let cursor = parse_cursor(query.cursor.as_deref()).map_err(|e| ApiError::from_error(&meta, e))?;

    let page = state
        .service
        .list(&tenant, filters, query.limit, cursor)
        .await
        .map_err(|e| ApiError::from_error(&meta, e))?;

    let reports = page
        .reports
        .into_iter()
        .map(|(report, artifact)| ReportBody::new(report, artifact))
        .collect();

    Ok(Json(ListBody {
        reports,
        next_cursor: page.next_cursor,
    }))
}

pub(super) async fn health(
    State(state): State<AppState>,
    meta: RequestMeta,
) -> Result<Json<HealthBody>, ApiError> {
    state.db.ping().await.map_err(|e| {
        tracing::warn!(correlation_id = %meta.correlation_id, error = %e, "health probe failed");
        ApiError::new(
            &meta,
            StatusCode::SERVICE_UNAVAILABLE,
            "store unavailable",
        )
    })?;

    Ok(Json(HealthBody {
        status: "healthy".to_string(),
    }))
}

pub(super) async fn not_found(meta: RequestMeta) -> ApiError {
    let path = meta.path.clone();
    ApiError::new(
        &meta,
        StatusCode::NOT_FOUND,
        format!("no route for {}", path),
    )
}

/// Extract and validate the Idempotency-Key header.
fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, ReportdError> {
    let Some(value) = headers.get("idempotency-key") else {
        return Ok(None);
    };

    let key = value.to_str().map_err(|_| {
        ReportdError::Validation("Idempotency-Key must be a valid header string".to_string())
    })?;

    if key.is_empty() {
        return Err(ReportdError::Validation(
            "Idempotency-Key must not be empty".to_string(),
        ));
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(ReportdError::Validation(format!(
            "Idempotency-Key must be at most {} characters",
            MAX_IDEMPOTENCY_KEY_LEN
        )));
    }

    Ok(Some(key.to_string()))
}

/// Report ids are opaque to clients; anything that is not a known id is a
/// 404, including strings that never were ids.
fn parse_report_id(raw: &str) -> Result<Uuid, ReportdError> {
    Uuid::parse_str(raw).map_err(|_| ReportdError::NotFound(format!("report {} not found", raw)))
}

fn parse_filters(query: &ListQuery) -> Result<ListFilters, ReportdError> {
    let state = query
        .state
        .as_deref()
        .map(|s| {
            s.parse::<ReportState>()
                .map_err(|e| ReportdError::Validation(e.to_string()))
        })
        .transpose()?;

    let report_type = query
        .report_type
        .as_deref()
        .map(|s| {
            s.parse::<ReportType>()
                .map_err(|e| ReportdError::Validation(e.to_string()))
        })
        .transpose()?;

    Ok(ListFilters { state, report_type })
}

fn parse_cursor(raw: Option<&str>) -> Result<Option<Uuid>, ReportdError> {
    raw.map(|c| {
        Uuid::parse_str(c).map_err(|_| ReportdError::Validation(format!("invalid cursor: {}", c)))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_idempotency_key_absent() {
        let headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers).unwrap(), None);
    }

    #[test]
    fn test_idempotency_key_present() {
        let mut headers = HeaderMap::new();
        headers.insert("idempotency-key", HeaderValue::from_static("submit-42"));
        assert_eq!(
            idempotency_key(&headers).unwrap().as_deref(),
            Some("submit-42")
        );
    }

    #[test]
    fn test_idempotency_key_rejects_empty() {
        let mut headers = HeaderMap::new();
        headers.insert("idempotency-key", HeaderValue::from_static(""));
        assert!(idempotency_key(&headers).is_err());
    }

    #[test]
    fn test_idempotency_key_rejects_oversized() {
        let mut headers = HeaderMap::new();
        let long = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        headers.insert("idempotency-key", HeaderValue::from_str(&long).unwrap());
        assert!(idempotency_key(&headers).is_err());

        let max = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN);
        headers.insert("idempotency-key", HeaderValue::from_str(&max).unwrap());
        assert!(idempotency_key(&headers).is_ok());
    }

    #[test]
    fn test_parse_report_id_maps_to_not_found() {
        let err = parse_report_id("not-a-uuid").unwrap_err();
        assert!(matches!(err, ReportdError::NotFound(_)));

        let id = Uuid::new_v4();
        assert_eq!(parse_report_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_parse_filters_strict_enums() {
        let query = ListQuery {
            state: Some("COMPLETED".to_string()),
            report_type: Some("USAGE_SUMMARY".to_string()),
            limit: None,
            cursor: None,
        };
        let filters = parse_filters(&query).unwrap();
        assert_eq!(filters.state, Some(ReportState::Completed));
        assert_eq!(filters.report_type, Some(ReportType::UsageSummary));

        let bad = ListQuery {
            state: Some("DONE".to_string()),
            report_type: None,
            limit: None,
            cursor: None,
        };
        assert!(matches!(
            parse_filters(&bad).unwrap_err(),
            ReportdError::Validation(_)
        ));
    }

    #[test]
    fn test_parse_cursor() {
        assert_eq!(parse_cursor(None).unwrap(), None);
        let id = Uuid::new_v4();
        assert_eq!(parse_cursor(Some(&id.to_string())).unwrap(), Some(id));
        assert!(matches!(
            parse_cursor(Some("zzz")).unwrap_err(),
            ReportdError::Validation(_)
        ));
    }
}
