//! Request and response bodies for the LIS APIs.
//!
//! Requests carry ids and enum values as strings so a malformed value becomes a validation
//! error naming the field. Each request converts into the matching core input with `TryFrom`.

use chrono::{DateTime, NaiveDate, Utc};
use lis_core::models::{NormalRange, ReportChanges, TestParameter};
use lis_core::repositories::orders::NewOrder;
use lis_core::repositories::patients::NewPatient;
use lis_core::repositories::reports::NewReport;
use lis_core::repositories::results::{NewParameterResult, NewResult};
use lis_core::repositories::samples::{CollectionStat, NewSample};
use lis_core::repositories::test_catalog::NewTest;
use lis_core::repositories::users::NewUser;
use lis_core::{BulkUpdateOutcome, EntityId, LisError, LisResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use utoipa::ToSchema;

/// Parses one canonical id, naming `field` on failure.
pub fn parse_id(field: &str, value: &str) -> LisResult<EntityId> {
    EntityId::parse(value.trim())
        .map_err(|e| LisError::InvalidInput(format!("{field}: {e}")))
}

pub fn parse_ids(field: &str, values: &[String]) -> LisResult<Vec<EntityId>> {
    values.iter().map(|v| parse_id(field, v)).collect()
}

fn parse_or_default<T: FromStr<Err = LisError> + Default>(value: Option<String>) -> LisResult<T> {
    value.as_deref().map(T::from_str).transpose().map(Option::unwrap_or_default)
}

// ============================================================================
// RESPONSES
// ============================================================================

/// Successful response envelope: `{ "success": true, "data": ... }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataRes<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataRes<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// OpenAPI shape of [`DataRes`]; `data` is the entity document.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DataEnvelope {
    pub success: bool,
    #[schema(value_type = Object)]
    pub data: Value,
}

/// Error body returned for every failed request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub success: bool,
    pub message: String,
}

impl ErrorRes {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BulkUpdateRes {
    pub matched: usize,
    pub modified: usize,
}

impl From<BulkUpdateOutcome> for BulkUpdateRes {
    fn from(outcome: BulkUpdateOutcome) -> Self {
        Self {
            matched: outcome.matched,
            modified: outcome.modified,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CollectionStatRes {
    pub status: String,
    pub count: usize,
    pub avg_processing_minutes: Option<f64>,
}

impl From<CollectionStat> for CollectionStatRes {
    fn from(stat: CollectionStat) -> Self {
        Self {
            status: stat.status.to_string(),
            count: stat.count,
            avg_processing_minutes: stat.avg_processing_minutes,
        }
    }
}

// ============================================================================
// PATIENTS, TESTS AND USERS
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatePatientReq {
    #[serde(default)]
    pub mrn: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[schema(value_type = String, format = Date)]
    pub date_of_birth: NaiveDate,
    /// `male`, `female`, `other` or `unknown` (default).
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

impl TryFrom<CreatePatientReq> for NewPatient {
    type Error = LisError;

    fn try_from(req: CreatePatientReq) -> LisResult<Self> {
        Ok(NewPatient {
            mrn: req.mrn,
            first_name: req.first_name,
            last_name: req.last_name,
            date_of_birth: req.date_of_birth,
            gender: parse_or_default(req.gender)?,
            phone: req.phone,
            email: req.email,
            address: req.address,
            allergies: req.allergies,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AllergyReq {
    pub allergy: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct NormalRangeDto {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl From<NormalRangeDto> for NormalRange {
    fn from(dto: NormalRangeDto) -> Self {
        NormalRange {
            min: dto.min,
            max: dto.max,
            unit: dto.unit,
            text: dto.text,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TestParameterDto {
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub normal_range: NormalRangeDto,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateTestReq {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub sample_type: String,
    pub price: f64,
    #[serde(default)]
    pub normal_range: NormalRangeDto,
    #[serde(default)]
    pub parameters: Vec<TestParameterDto>,
    #[serde(default)]
    pub turnaround_hours: Option<u32>,
}

impl From<CreateTestReq> for NewTest {
    fn from(req: CreateTestReq) -> Self {
        NewTest {
            code: req.code,
            name: req.name,
            category: req.category,
            sample_type: req.sample_type,
            price: req.price,
            normal_range: req.normal_range.into(),
            test_parameters: req
                .parameters
                .into_iter()
                .map(|p| TestParameter {
                    name: p.name,
                    unit: p.unit,
                    normal_range: p.normal_range.into(),
                })
                .collect(),
            turnaround_hours: req.turnaround_hours,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdatePriceReq {
    pub price: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateUserReq {
    pub name: String,
    pub email: String,
    /// `admin`, `doctor`, `lab_technician` or `receptionist`.
    pub role: String,
}

impl TryFrom<CreateUserReq> for NewUser {
    type Error = LisError;

    fn try_from(req: CreateUserReq) -> LisResult<Self> {
        Ok(NewUser {
            name: req.name,
            email: req.email,
            role: req.role.parse()?,
        })
    }
}

// ============================================================================
// ORDERS
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderReq {
    pub patient: String,
    pub tests: Vec<String>,
    #[serde(default)]
    pub discount: Option<f64>,
    /// `routine` (default), `urgent` or `stat`.
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TryFrom<CreateOrderReq> for NewOrder {
    type Error = LisError;

    fn try_from(req: CreateOrderReq) -> LisResult<Self> {
        Ok(NewOrder {
            patient: parse_id("patient", &req.patient)?,
            tests: parse_ids("tests", &req.tests)?,
            discount: req.discount,
            priority: parse_or_default(req.priority)?,
            notes: req.notes,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusReq {
    pub status: String,
    /// Required when cancelling.
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdatePaymentReq {
    pub payment_status: String,
    #[serde(default)]
    pub discount: Option<f64>,
}

// ============================================================================
// SAMPLES
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSampleReq {
    pub order: String,
    pub patient: String,
    pub tests: Vec<String>,
    pub sample_type: String,
    #[serde(default)]
    pub container_type: Option<String>,
    /// `routine` (default), `urgent`, `stat` or `critical`.
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub scheduled_collection_time: Option<DateTime<Utc>>,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl TryFrom<CreateSampleReq> for NewSample {
    type Error = LisError;

    fn try_from(req: CreateSampleReq) -> LisResult<Self> {
        Ok(NewSample {
            order: parse_id("order", &req.order)?,
            patient: parse_id("patient", &req.patient)?,
            tests: parse_ids("tests", &req.tests)?,
            sample_type: req.sample_type,
            container_type: req.container_type,
            priority: parse_or_default(req.priority)?,
            scheduled_collection_time: req.scheduled_collection_time,
            expiry_date: req.expiry_date,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateSampleStatusReq {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkSampleStatusReq {
    pub ids: Vec<String>,
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ParameterValueDto {
    pub name: String,
    #[schema(value_type = Object)]
    pub value: Value,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateResultReq {
    pub order: String,
    pub test: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub value: Option<Value>,
    /// `number`, `text`, `boolean`, `array` or `object`.
    pub value_type: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub normal_range: Option<NormalRangeDto>,
    #[serde(default)]
    pub parameters: Vec<ParameterValueDto>,
    #[serde(default)]
    pub comments: Option<String>,
}

impl TryFrom<CreateResultReq> for NewResult {
    type Error = LisError;

    fn try_from(req: CreateResultReq) -> LisResult<Self> {
        Ok(NewResult {
            order: parse_id("order", &req.order)?,
            test: parse_id("test", &req.test)?,
            value: req.value,
            value_type: req.value_type.parse()?,
            unit: req.unit,
            normal_range: req.normal_range.map(NormalRange::from),
            parameters: req
                .parameters
                .into_iter()
                .map(|p| NewParameterResult {
                    name: p.name,
                    value: p.value,
                    unit: p.unit,
                })
                .collect(),
            comments: req.comments,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateResultValueReq {
    #[schema(value_type = Object)]
    pub value: Value,
}

/// Body for reject and review actions.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReasonReq {
    pub reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkIdsReq {
    pub ids: Vec<String>,
}

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateReportReq {
    pub order: String,
    pub doctor: String,
    #[serde(default)]
    pub results: Vec<String>,
    /// `preliminary`, `final` (default) or `amended`.
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub interpretation: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

impl TryFrom<CreateReportReq> for NewReport {
    type Error = LisError;

    fn try_from(req: CreateReportReq) -> LisResult<Self> {
        Ok(NewReport {
            order: parse_id("order", &req.order)?,
            doctor: parse_id("doctor", &req.doctor)?,
            results: parse_ids("results", &req.results)?,
            report_type: parse_or_default(req.report_type)?,
            interpretation: req.interpretation,
            comments: req.comments,
        })
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct DeliverReportReq {
    #[serde(default)]
    pub delivered_to: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AmendReportReq {
    pub reason: String,
    #[serde(default)]
    pub interpretation: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<String>>,
}

impl AmendReportReq {
    /// Splits the request into the amendment reason and the content changes.
    pub fn into_parts(self) -> LisResult<(String, ReportChanges)> {
        let results = self
            .results
            .map(|ids| parse_ids("results", &ids))
            .transpose()?;
        Ok((
            self.reason,
            ReportChanges {
                interpretation: self.interpretation,
                comments: self.comments,
                results,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lis_core::models::{OrderPriority, ValueType};
    use serde_json::json;

    #[test]
    fn order_request_parses_ids_and_defaults_priority() {
        let test = EntityId::new();
        let req: CreateOrderReq = serde_json::from_value(json!({
            "patient": EntityId::new().to_string(),
            "tests": [test.to_string()],
        }))
        .expect("deserialize");
        let new = NewOrder::try_from(req).expect("convert");
        assert_eq!(new.tests, vec![test]);
        assert_eq!(new.priority, OrderPriority::Routine);
    }

    #[test]
    fn malformed_id_names_the_field() {
        let req = CreateOrderReq {
            patient: "not-an-id".into(),
            tests: vec![],
            discount: None,
            priority: None,
            notes: None,
        };
        let err = NewOrder::try_from(req).expect_err("bad id");
        assert!(err.to_string().contains("patient"));
    }

    #[test]
    fn result_request_keeps_raw_value() {
        let req: CreateResultReq = serde_json::from_value(json!({
            "order": EntityId::new().to_string(),
            "test": EntityId::new().to_string(),
            "value": "12 mmol/L",
            "value_type": "number",
            "normal_range": { "min": 4.0, "max": 10.0 },
        }))
        .expect("deserialize");
        let new = NewResult::try_from(req).expect("convert");
        assert_eq!(new.value, Some(json!("12 mmol/L")));
        assert_eq!(new.value_type, ValueType::Number);
        assert_eq!(new.normal_range, Some(NormalRange::between(4.0, 10.0)));
    }

    #[test]
    fn unknown_enum_value_is_invalid_input() {
        let req = CreateUserReq {
            name: "A".into(),
            email: "a@lab.example".into(),
            role: "janitor".into(),
        };
        assert!(matches!(
            NewUser::try_from(req),
            Err(LisError::InvalidInput(_))
        ));
    }

    #[test]
    fn error_body_is_unsuccessful() {
        let body = serde_json::to_value(ErrorRes::new("nope")).expect("serialize");
        assert_eq!(body, json!({ "success": false, "message": "nope" }));
    }
}
