use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ReportdError, Result};

use super::state::{OutputFormat, ReportType};

/// Parameters of a report job: the date range to cover and the output
/// format. Unknown fields are rejected at the wire boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub format: OutputFormat,
}

impl ReportParams {
    pub fn validate(&self) -> Result<()> {
        if self.from > self.to {
            return Err(ReportdError::Validation(format!(
                "invalid date range: from {} is after to {}",
                self.from, self.to
            )));
        }
        Ok(())
    }
}

/// A report submission as received from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportSpec {
    pub tenant: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub params: ReportParams,
}

impl ReportSpec {
    pub fn validate(&self) -> Result<()> {
        if self.tenant.trim().is_empty() {
            return Err(ReportdError::Validation("tenant must not be empty".into()));
        }
        self.params.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_json() -> &'static str {
        r#"{
            "tenant": "acme",
            "type": "USAGE_SUMMARY",
            "params": {"from": "2024-01-01", "to": "2024-01-31", "format": "CSV"}
        }"#
    }

    #[test]
    fn test_spec_deserializes() {
        let spec: ReportSpec = serde_json::from_str(spec_json()).unwrap();
        assert_eq!(spec.tenant, "acme");
        assert_eq!(spec.report_type, ReportType::UsageSummary);
        assert_eq!(spec.params.format, OutputFormat::Csv);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_spec_rejects_unknown_fields() {
        let json = r#"{
            "tenant": "acme",
            "type": "USAGE_SUMMARY",
            "params": {"from": "2024-01-01", "to": "2024-01-31", "format": "CSV"},
            "priority": "high"
        }"#;
        assert!(serde_json::from_str::<ReportSpec>(json).is_err());
    }

    #[test]
    fn test_params_reject_unknown_fields() {
        let json = r#"{"from": "2024-01-01", "to": "2024-01-31", "format": "CSV", "tz": "UTC"}"#;
        assert!(serde_json::from_str::<ReportParams>(json).is_err());
    }

    #[test]
    fn test_params_reject_unknown_format() {
        let json = r#"{"from": "2024-01-01", "to": "2024-01-31", "format": "XML"}"#;
        assert!(serde_json::from_str::<ReportParams>(json).is_err());
    }

    #[test]
    fn test_inverted_date_range_fails_validation() {
        let params = ReportParams {
            from: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            format: OutputFormat::Json,
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_single_day_range_is_valid() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let params = ReportParams {
            from: day,
            to: day,
            format: OutputFormat::Csv,
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_blank_tenant_fails_validation() {
        let mut spec: ReportSpec = serde_json::from_str(spec_json()).unwrap();
        spec.tenant = "   ".to_string();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_params_serde_round_trip_preserves_equality() {
        let spec: ReportSpec = serde_json::from_str(spec_json()).unwrap();
        let value = serde_json::to_value(&spec.params).unwrap();
        let back: ReportParams = serde_json::from_value(value).unwrap();
        assert_eq!(back, spec.params);
    }
}
