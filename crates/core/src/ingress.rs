//! Validation of `process-video` requests.
//!
//! Bodies are checked field by field from raw JSON so that a wrong type
//! produces the same descriptive message as a wrong value, and nothing
//! downstream runs until the whole request is valid.

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::plan::{IntervalUnit, SamplingPlan};
use crate::source::validate_http_url;

/// A validated remote-extraction request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessVideoRequest {
    pub url: String,
    pub plan: SamplingPlan,
    pub credential: Option<String>,
}

impl ProcessVideoRequest {
    pub fn from_json(body: &Value) -> Result<Self, CoreError> {
        let obj = body.as_object().ok_or_else(|| {
            CoreError::Validation("Request body must be a JSON object".to_string())
        })?;

        let url = match obj.get("url") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                return Err(CoreError::Validation(
                    "URL is required and must be a string".to_string(),
                ))
            }
        };
        validate_http_url(&url)?;

        let interval = positive_number(obj, "interval")
            .ok_or_else(|| CoreError::Validation("Interval must be a positive number".into()))?;

        let start_time = match obj.get("startTime").and_then(Value::as_f64) {
            Some(s) if s.is_finite() && s >= 0.0 => s,
            _ => {
                return Err(CoreError::Validation(
                    "Start time must be a non-negative number".to_string(),
                ))
            }
        };

        let end_time = match obj.get("endTime") {
            None | Some(Value::Null) => None,
            Some(v) => match v.as_f64() {
                Some(e) if e.is_finite() && e > start_time => Some(e),
                _ => {
                    return Err(CoreError::Validation(
                        "End time must be greater than start time".to_string(),
                    ))
                }
            },
        };

        let unit = match obj.get("intervalUnit") {
            None | Some(Value::Null) => IntervalUnit::Seconds,
            Some(Value::String(s)) => IntervalUnit::parse(s)?,
            Some(_) => {
                return Err(CoreError::Validation(
                    "Interval unit must be a string".to_string(),
                ))
            }
        };

        let credential = optional_string(obj, "credential")?
            .or(optional_string(obj, "licenseKey")?)
            .filter(|c| !c.is_empty());

        Ok(Self {
            url,
            plan: SamplingPlan::new(start_time, end_time, interval, unit)?,
            credential,
        })
    }
}

fn positive_number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && *v > 0.0)
}

fn optional_string(obj: &Map<String, Value>, key: &str) -> Result<Option<String>, CoreError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(CoreError::Validation(format!("{key} must be a string"))),
    }
}
