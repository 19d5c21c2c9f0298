//! Measured results for one test of one order.
//!
//! `is_abnormal` is derived, never supplied: it is recomputed by [`compute_is_abnormal`] on
//! every value write.

use crate::lifecycle::{status_strings, ResultStatus};
use crate::models::test_catalog::NormalRange;
use crate::{LisError, LisResult};
use chrono::{DateTime, Utc};
use lis_uuid::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Number,
    Text,
    Boolean,
    Array,
    Object,
}

status_strings!(ValueType {
    Number => "number",
    Text => "text",
    Boolean => "boolean",
    Array => "array",
    Object => "object",
});

/// One measured sub-parameter of a panel result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterResult {
    pub name: String,
    pub value: Value,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub normal_range: NormalRange,
    #[serde(default)]
    pub is_abnormal: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    pub id: EntityId,
    pub order: EntityId,
    pub test: EntityId,
    pub patient: EntityId,
    pub patient_name: String,
    pub patient_mrn: String,
    pub test_name: String,
    pub test_code: String,
    #[serde(default)]
    pub value: Option<Value>,
    pub value_type: ValueType,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub normal_range: NormalRange,
    #[serde(default)]
    pub parameters: Vec<ParameterResult>,
    pub is_abnormal: bool,
    pub critical_value: bool,
    #[serde(default)]
    pub critical_value_notified_at: Option<DateTime<Utc>>,
    pub status: ResultStatus,
    pub entered_by: EntityId,
    #[serde(default)]
    pub analysis_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub verified_by: Option<EntityId>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_by: Option<EntityId>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LabResult {
    /// Key of the `(order, test)` uniqueness index.
    pub fn pair_key(order: EntityId, test: EntityId) -> String {
        format!("{order}:{test}")
    }

    pub fn has_value(&self) -> bool {
        matches!(&self.value, Some(v) if !v.is_null())
    }

    /// Writes a new value, re-derives the abnormal flag against `range` and marks the result
    /// completed.
    pub fn set_value(&mut self, value: Value, range: &NormalRange, at: DateTime<Utc>) {
        self.is_abnormal = compute_is_abnormal(self.value_type, &value, range);
        self.value = Some(value);
        self.status = ResultStatus::Completed;
        self.analysis_date = Some(at);
        self.updated_at = at;
    }

    /// Sets `status` and the matching attribution fields.
    pub fn apply_status(
        &mut self,
        status: ResultStatus,
        actor: EntityId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) {
        match status {
            ResultStatus::Verified => {
                self.verified_by = Some(actor);
                self.verified_at = Some(at);
            }
            ResultStatus::Rejected => {
                self.rejected_by = Some(actor);
                self.rejected_at = Some(at);
                self.rejection_reason = reason;
            }
            ResultStatus::RequiresReview => {
                if reason.is_some() {
                    self.comments = reason;
                }
            }
            ResultStatus::Completed => {
                if self.analysis_date.is_none() {
                    self.analysis_date = Some(at);
                }
            }
            ResultStatus::Pending | ResultStatus::InProgress => {}
        }
        self.status = status;
        self.updated_at = at;
    }

    /// Flags the result as critical. The status is left as is.
    pub fn mark_critical(&mut self, at: DateTime<Utc>) {
        self.critical_value = true;
        self.critical_value_notified_at = Some(at);
        self.updated_at = at;
    }
}

// ============================================================================
// VALUE DERIVATION
// ============================================================================

/// Decides whether a measurement lies outside its reference range.
///
/// Only numeric results can be abnormal. Strings are read by their numeric prefix
/// (see [`parse_float`]), so `"12 mmol/L"` reads as 12.
///
/// # Arguments
///
/// * `value_type` - Declared type of the result.
/// * `value` - The raw measured value.
/// * `range` - Reference range; absent bounds are not checked.
///
/// # Returns
///
/// `true` iff the type is number, the value reads as a finite number and it is below `min` or
/// above `max`.
pub fn compute_is_abnormal(value_type: ValueType, value: &Value, range: &NormalRange) -> bool {
    if value_type != ValueType::Number {
        return false;
    }
    let Some(v) = numeric_value(value) else {
        return false;
    };
    if !v.is_finite() {
        return false;
    }
    matches!(range.min, Some(min) if v < min) || matches!(range.max, Some(max) if v > max)
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float(s),
        _ => None,
    }
}

/// Parses the longest numeric prefix of `input`, after leading whitespace.
///
/// Returns `None` when there is no numeric prefix. `"Infinity"` (optionally signed) parses to an
/// infinite value.
pub fn parse_float(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        let negative = bytes.first() == Some(&b'-');
        return Some(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Checks that `value` has the JSON shape `value_type` expects.
///
/// # Errors
///
/// Returns [`LisError::InvalidInput`] naming the expected shape.
pub fn validate_value_shape(value_type: ValueType, value: &Value) -> LisResult<()> {
    let fits = match value_type {
        ValueType::Number => value.is_number() || value.is_string(),
        ValueType::Text => value.is_string(),
        ValueType::Boolean => value.is_boolean(),
        ValueType::Array => value.is_array(),
        ValueType::Object => value.is_object(),
    };
    if fits {
        Ok(())
    } else {
        Err(LisError::InvalidInput(format!(
            "value {value} does not fit value type '{value_type}'"
        )))
    }
}
