//! Test catalog and staff accounts.

use super::{created, ok, Created, Data};
use crate::error::{ApiJson, ApiResult};
use crate::AppState;
use api_shared::dto::{
    parse_id, CreateTestReq, CreateUserReq, DataEnvelope, ErrorRes, UpdatePriceReq,
};
use axum::extract::{Path, Query, State};
use lis_core::models::{LabTest, User};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub(crate) struct TestQuery {
    #[serde(default)]
    active_only: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/tests",
    request_body = CreateTestReq,
    responses(
        (status = 201, description = "Test added to the catalog", body = DataEnvelope),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 409, description = "Code already in use", body = ErrorRes)
    )
)]
pub(crate) async fn create_test(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateTestReq>,
) -> ApiResult<Created<LabTest>> {
    let test = state.services.tests.create_test(req.into())?;
    Ok(created(test))
}

#[utoipa::path(
    get,
    path = "/api/v1/tests",
    params(TestQuery),
    responses(
        (status = 200, description = "Catalog tests sorted by code", body = DataEnvelope)
    )
)]
pub(crate) async fn list_tests(
    State(state): State<AppState>,
    Query(query): Query<TestQuery>,
) -> Data<Vec<LabTest>> {
    ok(state.services.tests.list_tests(query.active_only))
}

#[utoipa::path(
    patch,
    path = "/api/v1/tests/{id}/price",
    params(("id" = String, Path, description = "Test id")),
    request_body = UpdatePriceReq,
    responses(
        (status = 200, description = "Price updated", body = DataEnvelope),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
pub(crate) async fn update_price(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdatePriceReq>,
) -> ApiResult<Data<LabTest>> {
    let test = state
        .services
        .tests
        .update_price(parse_id("id", &id)?, req.price)?;
    Ok(ok(test))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User created", body = DataEnvelope),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 409, description = "Email already in use", body = ErrorRes)
    )
)]
pub(crate) async fn create_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateUserReq>,
) -> ApiResult<Created<User>> {
    let user = state.services.users.create_user(req.try_into()?)?;
    Ok(created(user))
}
