use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reportd_core::error::ReportdError;
use reportd_core::report::{ArtifactMeta, Report, ReportParams, ReportState, ReportType};

use super::correlation::RequestMeta;

/// Wire representation of a report job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBody {
    pub id: Uuid,
    pub tenant: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub params: ReportParams,
    pub state: ReportState,
    pub attempts: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactBody>,
}

impl ReportBody {
    pub fn new(report: Report, artifact: Option<ArtifactMeta>) -> Self {
        Self {
            id: report.id,
            tenant: report.tenant_id,
            report_type: report.report_type,
            params: report.params,
            state: report.state,
            attempts: report.attempts,
            idempotency_key: report.idempotency_key,
            created_at: report.created_at,
            updated_at: report.updated_at,
            artifact: artifact.map(ArtifactBody::from),
        }
    }
}

/// Wire representation of artifact metadata (content is downloaded
/// separately).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactBody {
    pub id: Uuid,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl From<ArtifactMeta> for ArtifactBody {
    fn from(meta: ArtifactMeta) -> Self {
        Self {
            id: meta.id,
            content_type: meta.content_type,
            size_bytes: meta.size_bytes,
            checksum: meta.checksum,
            created_at: meta.created_at,
        }
    }
}

/// One page of a tenant listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBody {
    pub reports: Vec<ReportBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Uuid>,
}

/// Health probe response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
}

/// Canonical error response carrying status, timestamp, path, correlation
/// id, and message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub path: String,
    pub correlation_id: String,
}

impl ApiError {
    pub fn new(meta: &RequestMeta, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            path: meta.path.clone(),
            correlation_id: meta.correlation_id.clone(),
        }
    }

    /// Map a domain error onto the HTTP surface. Anything outside the
    /// expected taxonomy is a 500 and gets logged with its correlation id.
    pub fn from_error(meta: &RequestMeta, err: ReportdError) -> Self {
        let status = Self::status_for(&err);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(
                correlation_id = %meta.correlation_id,
                path = %meta.path,
                error = %err,
                "request failed"
            );
        }
        Self::new(meta, status, err.to_string())
    }

    fn status_for(err: &ReportdError) -> StatusCode {
        match err {
            ReportdError::Validation(_) => StatusCode::BAD_REQUEST,
            ReportdError::NotFound(_) => StatusCode::NOT_FOUND,
            ReportdError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "statusCode": self.status.as_u16(),
            "timestamp": Utc::now().to_rfc3339(),
            "path": self.path,
            "correlationId": self.correlation_id,
            "message": self.message,
        });

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use reportd_core::report::OutputFormat;

    fn meta() -> RequestMeta {
        RequestMeta {
            correlation_id: "corr-1".to_string(),
            path: "/reports".to_string(),
        }
    }

    fn sample_report() -> Report {
        Report {
            id: Uuid::new_v4(),
            tenant_id: "acme".to_string(),
            report_type: ReportType::UsageSummary,
            params: ReportParams {
                from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                to: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                format: OutputFormat::Csv,
            },
            state: ReportState::Pending,
            attempts: 0,
            idempotency_key: None,
            locked_at: None,
            locked_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_error_status_mapping() {
        let not_found = ReportdError::NotFound("x".into());
        assert_eq!(ApiError::status_for(&not_found), StatusCode::NOT_FOUND);

        let conflict = ReportdError::Conflict("x".into());
        assert_eq!(ApiError::status_for(&conflict), StatusCode::CONFLICT);

        let validation = ReportdError::Validation("x".into());
        assert_eq!(ApiError::status_for(&validation), StatusCode::BAD_REQUEST);

        let internal = ReportdError::Internal("x".into());
        assert_eq!(
            ApiError::status_for(&internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_report_body_uses_camel_case_and_wire_names() {
        let body = ReportBody::new(sample_report(), None);
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["tenant"], "acme");
        assert_eq!(value["type"], "USAGE_SUMMARY");
        assert_eq!(value["state"], "PENDING");
        assert_eq!(value["params"]["format"], "CSV");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
        // absent optionals are omitted, not null
        assert!(value.get("idempotencyKey").is_none());
        assert!(value.get("artifact").is_none());
    }

    #[test]
    fn test_report_body_includes_artifact_meta() {
        let report = sample_report();
        let meta = ArtifactMeta {
            id: Uuid::new_v4(),
            content_type: "text/csv".to_string(),
            size_bytes: 512,
            checksum: "deadbeef".to_string(),
            created_at: Utc::now(),
        };
        let body = ReportBody::new(report, Some(meta));
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["artifact"]["contentType"], "text/csv");
        assert_eq!(value["artifact"]["sizeBytes"], 512);
        assert_eq!(value["artifact"]["checksum"], "deadbeef");
    }

    #[test]
    fn test_list_body_omits_exhausted_cursor() {
        let body = ListBody {
            reports: Vec::new(),
            next_cursor: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("nextCursor").is_none());
    }
}
