//! Field-by-field request body validation.
//!
//! Request bodies arrive as untyped JSON and are walked field-by-field in
//! the order the contract lists them, returning the first violated rule
//! rather than accumulating every error — this mirrors the upstream
//! dynamic-JSON-validation behavior (validate, fail fast, no exception from
//! a missing-field access) in a statically-typed shape.

use serde::Deserialize;
use serde_json::Value;

const ONE_TIB: u64 = 1 << 40;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

fn field_err(field: &str, reason: &str) -> ValidationError {
    ValidationError(format!("{field}: {reason}"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatedUserReport {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    pub bytes_transferred: u64,
    #[serde(default)]
    pub tunnel_time_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ValidatedConnectionReport {
    pub server_id: String,
    pub start_utc_ms: i64,
    pub end_utc_ms: i64,
    pub user_reports: Vec<ValidatedUserReport>,
}

pub fn validate_connection_report(body: &Value) -> Result<ValidatedConnectionReport, ValidationError> {
    let server_id = require_string(body, "serverId")?;
    let start_utc_ms = require_number(body, "startUtcMs")?;
    let end_utc_ms = require_number(body, "endUtcMs")?;
    if start_utc_ms >= end_utc_ms {
        return Err(field_err("startUtcMs", "must be less than endUtcMs"));
    }

    let raw_reports = body
        .get("userReports")
        .and_then(Value::as_array)
        .ok_or_else(|| field_err("userReports", "must be a non-empty array"))?;
    if raw_reports.is_empty() {
        return Err(field_err("userReports", "must be a non-empty array"));
    }

    let mut user_reports = Vec::with_capacity(raw_reports.len());
    for (index, entry) in raw_reports.iter().enumerate() {
        user_reports.push(validate_user_report(entry, index)?);
    }

    Ok(ValidatedConnectionReport { server_id, start_utc_ms, end_utc_ms, user_reports })
}

fn validate_user_report(entry: &Value, index: usize) -> Result<ValidatedUserReport, ValidationError> {
    if !entry.is_object() {
        return Err(field_err(&format!("userReports[{index}]"), "must be an object"));
    }

    let user_id = match entry.get("userId") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(field_err(&format!("userReports[{index}].userId"), "must be a string")),
    };

    let countries = match entry.get("countries") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let Value::String(s) = item else {
                    return Err(field_err(
                        &format!("userReports[{index}].countries"),
                        "must be an array of strings",
                    ));
                };
                out.push(s.clone());
            }
            out
        },
        Some(_) => {
            return Err(field_err(&format!("userReports[{index}].countries"), "must be an array"))
        },
    };

    if user_id.is_none() && countries.is_empty() {
        return Err(field_err(
            &format!("userReports[{index}]"),
            "must contain at least one of userId, countries",
        ));
    }

    let bytes_transferred = entry
        .get("bytesTransferred")
        .and_then(Value::as_u64)
        .ok_or_else(|| field_err(&format!("userReports[{index}].bytesTransferred"), "must be a number"))?;
    if bytes_transferred > ONE_TIB {
        return Err(field_err(
            &format!("userReports[{index}].bytesTransferred"),
            "must be at most 1 TiB",
        ));
    }

    let tunnel_time_ms = match entry.get("tunnelTimeMs") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let n = v.as_u64().ok_or_else(|| {
                field_err(&format!("userReports[{index}].tunnelTimeMs"), "must be a number >= 0")
            })?;
            Some(n)
        },
    };

    Ok(ValidatedUserReport { user_id, countries, bytes_transferred, tunnel_time_ms })
}

#[derive(Debug, Clone)]
pub struct ValidatedFeatureReport {
    pub server_id: String,
    pub server_version: String,
    pub timestamp_utc_ms: i64,
    pub data_limit_enabled: bool,
    pub per_key_limit_count: Option<u64>,
}

pub fn validate_feature_report(body: &Value) -> Result<ValidatedFeatureReport, ValidationError> {
    let server_id = require_string(body, "serverId")?;
    let server_version = require_string(body, "serverVersion")?;
    let timestamp_utc_ms = require_number(body, "timestampUtcMs")?;

    let data_limit = body
        .get("dataLimit")
        .and_then(Value::as_object)
        .ok_or_else(|| field_err("dataLimit", "must be an object"))?;
    let data_limit_enabled = data_limit
        .get("enabled")
        .and_then(Value::as_bool)
        .ok_or_else(|| field_err("dataLimit.enabled", "must be a bool"))?;
    let per_key_limit_count = match data_limit.get("perKeyLimitCount") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let n = v
                .as_u64()
                .ok_or_else(|| field_err("dataLimit.perKeyLimitCount", "must be a number >= 0"))?;
            Some(n)
        },
    };

    Ok(ValidatedFeatureReport {
        server_id,
        server_version,
        timestamp_utc_ms,
        data_limit_enabled,
        per_key_limit_count,
    })
}

fn require_string(body: &Value, field: &str) -> Result<String, ValidationError> {
    body.get(field)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| field_err(field, "must be a string"))
}

fn require_number(body: &Value, field: &str) -> Result<i64, ValidationError> {
    body.get(field).and_then(Value::as_i64).ok_or_else(|| field_err(field, "must be a number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_connection_body() -> Value {
        serde_json::json!({
            "serverId": "s1",
            "startUtcMs": 0,
            "endUtcMs": 3_600_000,
            "userReports": [
                {"userId": "u1", "bytesTransferred": 100},
            ],
        })
    }

    #[test]
    fn accepts_well_formed_connection_report() {
        let report = validate_connection_report(&valid_connection_body()).unwrap();
        assert_eq!(report.server_id, "s1");
        assert_eq!(report.user_reports.len(), 1);
    }

    #[test]
    fn rejects_start_not_before_end() {
        let mut body = valid_connection_body();
        body["startUtcMs"] = serde_json::json!(3_600_000);
        body["endUtcMs"] = serde_json::json!(3_600_000);
        let err = validate_connection_report(&body).unwrap_err();
        assert!(err.0.contains("startUtcMs"));
    }

    #[test]
    fn rejects_empty_user_reports() {
        let mut body = valid_connection_body();
        body["userReports"] = serde_json::json!([]);
        let err = validate_connection_report(&body).unwrap_err();
        assert!(err.0.contains("userReports"));
    }

    #[test]
    fn rejects_bytes_transferred_over_one_tib() {
        let mut body = valid_connection_body();
        body["userReports"][0]["bytesTransferred"] = serde_json::json!(2u64 * (1u64 << 40));
        let err = validate_connection_report(&body).unwrap_err();
        assert!(err.0.contains("bytesTransferred"));
    }

    #[test]
    fn rejects_user_report_with_neither_user_id_nor_countries() {
        let mut body = valid_connection_body();
        body["userReports"][0] = serde_json::json!({"bytesTransferred": 5});
        let err = validate_connection_report(&body).unwrap_err();
        assert!(err.0.contains("userId, countries"));
    }

    #[test]
    fn rejects_feature_report_missing_data_limit_enabled() {
        let body = serde_json::json!({
            "serverId": "s1",
            "serverVersion": "1.0.0",
            "timestampUtcMs": 0,
            "dataLimit": {},
        });
        let err = validate_feature_report(&body).unwrap_err();
        assert!(err.0.contains("dataLimit.enabled"));
    }

    #[test]
    fn accepts_well_formed_feature_report() {
        let body = serde_json::json!({
            "serverId": "s1",
            "serverVersion": "1.0.0",
            "timestampUtcMs": 0,
            "dataLimit": {"enabled": true, "perKeyLimitCount": 1},
        });
        let report = validate_feature_report(&body).unwrap();
        assert_eq!(report.per_key_limit_count, Some(1));
    }
}
