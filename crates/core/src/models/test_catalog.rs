//! Catalog tests and their reference ranges.

use crate::{LisError, LisResult};
use chrono::{DateTime, Utc};
use lis_uuid::EntityId;
use serde::{Deserialize, Serialize};

/// Reference interval for a numeric measurement. Either bound may be absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Free-text description for non-numeric references ("Negative").
    #[serde(default)]
    pub text: Option<String>,
}

impl NormalRange {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::default()
        }
    }

    /// True when neither numeric bound is set.
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn validate(&self) -> LisResult<()> {
        for bound in [self.min, self.max].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(LisError::InvalidInput(
                    "normal range bounds must be finite".into(),
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(LisError::InvalidInput(format!(
                    "normal range min ({min}) exceeds max ({max})"
                )));
            }
        }
        Ok(())
    }
}

/// A sub-measurement of a panel test, with its own reference range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestParameter {
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub normal_range: NormalRange,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabTest {
    pub id: EntityId,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub sample_type: String,
    pub price: f64,
    #[serde(default)]
    pub normal_range: NormalRange,
    #[serde(default)]
    pub test_parameters: Vec<TestParameter>,
    #[serde(default)]
    pub turnaround_hours: Option<u32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LabTest {
    pub fn parameter(&self, name: &str) -> Option<&TestParameter> {
        self.test_parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }
}

/// Rejects negative or non-finite prices.
pub fn validate_price(price: f64) -> LisResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(LisError::InvalidInput(format!(
            "price must be a non-negative amount, got {price}"
        )));
    }
    Ok(())
}

/// Validates parameter names are unique and each range is well formed.
pub fn validate_parameters(parameters: &[TestParameter]) -> LisResult<()> {
    for (index, parameter) in parameters.iter().enumerate() {
        if parameter.name.trim().is_empty() {
            return Err(LisError::InvalidInput(
                "test parameter name cannot be empty".into(),
            ));
        }
        parameter.normal_range.validate()?;
        let duplicate = parameters[..index]
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(parameter.name.trim()));
        if duplicate {
            return Err(LisError::InvalidInput(format!(
                "duplicate test parameter '{}'",
                parameter.name
            )));
        }
    }
    Ok(())
}
