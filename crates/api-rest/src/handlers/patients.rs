use super::{created, ok, Created, Data};
use crate::error::{Actor, ApiJson, ApiResult};
use crate::AppState;
use api_shared::dto::{parse_id, AllergyReq, CreatePatientReq, DataEnvelope, ErrorRes};
use axum::extract::{Path, Query, State};
use lis_core::models::Patient;
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub(crate) struct PatientQuery {
    /// Case-insensitive match on name or MRN. Active patients only.
    q: Option<String>,
    #[serde(default)]
    include_inactive: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/patients",
    request_body = CreatePatientReq,
    responses(
        (status = 201, description = "Patient registered", body = DataEnvelope),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 409, description = "MRN already in use", body = ErrorRes)
    )
)]
pub(crate) async fn create_patient(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<CreatePatientReq>,
) -> ApiResult<Created<Patient>> {
    let patient = state
        .services
        .patients
        .register_patient(req.try_into()?, actor)?;
    Ok(created(patient))
}

#[utoipa::path(
    get,
    path = "/api/v1/patients",
    params(PatientQuery),
    responses(
        (status = 200, description = "Matching patients", body = DataEnvelope)
    )
)]
pub(crate) async fn list_patients(
    State(state): State<AppState>,
    Query(query): Query<PatientQuery>,
) -> Data<Vec<Patient>> {
    let patients = &state.services.patients;
    match query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => ok(patients.search_patients(q)),
        None => ok(patients.list_patients(query.include_inactive)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
pub(crate) async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Data<Patient>> {
    let patient = state.services.patients.get_patient(parse_id("id", &id)?)?;
    Ok(ok(patient))
}

#[utoipa::path(
    put,
    path = "/api/v1/patients/{id}/allergies",
    params(("id" = String, Path, description = "Patient id")),
    request_body = AllergyReq,
    responses(
        (status = 200, description = "Allergy recorded", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
pub(crate) async fn add_allergy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AllergyReq>,
) -> ApiResult<Data<Patient>> {
    let patient = state
        .services
        .patients
        .add_allergy(parse_id("id", &id)?, &req.allergy)?;
    Ok(ok(patient))
}

#[utoipa::path(
    delete,
    path = "/api/v1/patients/{id}/allergies/{allergy}",
    params(
        ("id" = String, Path, description = "Patient id"),
        ("allergy" = String, Path, description = "Allergy to remove")
    ),
    responses(
        (status = 200, description = "Allergy removed, or was absent", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
pub(crate) async fn remove_allergy(
    State(state): State<AppState>,
    Path((id, allergy)): Path<(String, String)>,
) -> ApiResult<Data<Patient>> {
    let patient = state
        .services
        .patients
        .remove_allergy(parse_id("id", &id)?, &allergy)?;
    Ok(ok(patient))
}
