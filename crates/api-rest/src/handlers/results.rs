use super::{created, ok, Created, Data};
use crate::error::{Actor, ApiJson, ApiResult};
use crate::AppState;
use api_shared::dto::{
    parse_id, parse_ids, BulkIdsReq, BulkUpdateRes, CreateResultReq, DataEnvelope, ErrorRes,
    ReasonReq, UpdateResultValueReq,
};
use axum::extract::{Path, State};
use lis_core::models::LabResult;

#[utoipa::path(
    post,
    path = "/api/v1/results",
    request_body = CreateResultReq,
    responses(
        (status = 201, description = "Result recorded", body = DataEnvelope),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 404, description = "Order or test not found", body = ErrorRes),
        (status = 409, description = "Order already has a result for this test", body = ErrorRes)
    )
)]
pub(crate) async fn create_result(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<CreateResultReq>,
) -> ApiResult<Created<LabResult>> {
    let result = state
        .services
        .results
        .create_result(req.try_into()?, actor)?;
    Ok(created(result))
}

#[utoipa::path(
    patch,
    path = "/api/v1/results/{id}/value",
    params(("id" = String, Path, description = "Result id")),
    request_body = UpdateResultValueReq,
    responses(
        (status = 200, description = "Value updated and abnormal flag re-derived", body = DataEnvelope),
        (status = 400, description = "Value does not fit the result type", body = ErrorRes),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
pub(crate) async fn update_value(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateResultValueReq>,
) -> ApiResult<Data<LabResult>> {
    let result = state
        .services
        .results
        .update_result_value(parse_id("id", &id)?, req.value, actor)?;
    Ok(ok(result))
}

#[utoipa::path(
    post,
    path = "/api/v1/results/{id}/verify",
    params(("id" = String, Path, description = "Result id")),
    responses(
        (status = 200, description = "Result verified", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 409, description = "Illegal status move", body = ErrorRes)
    )
)]
pub(crate) async fn verify_result(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<Data<LabResult>> {
    let result = state
        .services
        .results
        .verify_result(parse_id("id", &id)?, actor)?;
    Ok(ok(result))
}

#[utoipa::path(
    post,
    path = "/api/v1/results/{id}/reject",
    params(("id" = String, Path, description = "Result id")),
    request_body = ReasonReq,
    responses(
        (status = 200, description = "Result rejected", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 409, description = "Illegal status move", body = ErrorRes)
    )
)]
pub(crate) async fn reject_result(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ReasonReq>,
) -> ApiResult<Data<LabResult>> {
    let result = state
        .services
        .results
        .reject_result(parse_id("id", &id)?, actor, &req.reason)?;
    Ok(ok(result))
}

#[utoipa::path(
    post,
    path = "/api/v1/results/{id}/critical",
    params(("id" = String, Path, description = "Result id")),
    responses(
        (status = 200, description = "Result flagged critical", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
pub(crate) async fn mark_critical(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<Data<LabResult>> {
    let result = state
        .services
        .results
        .mark_result_as_critical(parse_id("id", &id)?, actor)?;
    Ok(ok(result))
}

#[utoipa::path(
    post,
    path = "/api/v1/results/bulk-verify",
    request_body = BulkIdsReq,
    responses(
        (status = 200, description = "Matched and modified counts", body = BulkUpdateRes),
        (status = 409, description = "Illegal status move; nothing was written", body = ErrorRes)
    )
)]
pub(crate) async fn bulk_verify(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<BulkIdsReq>,
) -> ApiResult<Data<BulkUpdateRes>> {
    let outcome = state
        .services
        .results
        .bulk_verify(&parse_ids("ids", &req.ids)?, actor)?;
    Ok(ok(outcome.into()))
}
