use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error for strict parsing of the closed enum sets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// The kind of report a job produces. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    UsageSummary,
    BillingExport,
    AuditSnapshot,
}

impl ReportType {
    /// Database/wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsageSummary => "USAGE_SUMMARY",
            Self::BillingExport => "BILLING_EXPORT",
            Self::AuditSnapshot => "AUDIT_SNAPSHOT",
        }
    }
}

impl FromStr for ReportType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USAGE_SUMMARY" => Ok(Self::UsageSummary),
            "BILLING_EXPORT" => Ok(Self::BillingExport),
            "AUDIT_SNAPSHOT" => Ok(Self::AuditSnapshot),
            other => Err(UnknownVariant::new("report type", other)),
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of the produced artifact. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Json => "JSON",
        }
    }

    /// The MIME type is fully determined by the format.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Json => "application/json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CSV" => Ok(Self::Csv),
            "JSON" => Ok(Self::Json),
            other => Err(UnknownVariant::new("output format", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a report job. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportState {
    /// Waiting to be claimed by a worker.
    Pending,
    /// Claimed and leased to a worker.
    Running,
    /// Artifact exists; terminal.
    Completed,
    /// Attempts exhausted; terminal.
    Failed,
}

impl ReportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Terminal states are never transitioned out of.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl FromStr for ReportState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(UnknownVariant::new("report state", other)),
        }
    }
}

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_type_round_trip() {
        for ty in [
            ReportType::UsageSummary,
            ReportType::BillingExport,
            ReportType::AuditSnapshot,
        ] {
            assert_eq!(ty.as_str().parse::<ReportType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_report_type_rejects_unknown() {
        let err = "INVOICE_DUMP".parse::<ReportType>().unwrap_err();
        assert_eq!(err.value, "INVOICE_DUMP");
    }

    #[test]
    fn test_report_type_serde_uses_wire_names() {
        let json = serde_json::to_string(&ReportType::UsageSummary).unwrap();
        assert_eq!(json, r#""USAGE_SUMMARY""#);
        let ty: ReportType = serde_json::from_str(r#""BILLING_EXPORT""#).unwrap();
        assert_eq!(ty, ReportType::BillingExport);
    }

    #[test]
    fn test_format_content_type() {
        assert_eq!(OutputFormat::Csv.content_type(), "text/csv");
        assert_eq!(OutputFormat::Json.content_type(), "application/json");
    }

    #[test]
    fn test_format_rejects_lowercase() {
        assert!("csv".parse::<OutputFormat>().is_err());
        assert!(serde_json::from_str::<OutputFormat>(r#""csv""#).is_err());
    }

    #[test]
    fn test_state_terminality() {
        assert!(!ReportState::Pending.is_terminal());
        assert!(!ReportState::Running.is_terminal());
        assert!(ReportState::Completed.is_terminal());
        assert!(ReportState::Failed.is_terminal());
    }

    #[test]
    fn test_state_round_trip() {
        for state in [
            ReportState::Pending,
            ReportState::Running,
            ReportState::Completed,
            ReportState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<ReportState>().unwrap(), state);
        }
    }
}
