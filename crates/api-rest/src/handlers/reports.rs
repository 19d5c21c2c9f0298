use super::{created, ok, Created, Data};
use crate::error::{Actor, ApiJson, ApiResult};
use crate::AppState;
use api_shared::dto::{
    parse_id, AmendReportReq, CreateReportReq, DataEnvelope, DeliverReportReq, ErrorRes,
    ReasonReq,
};
use axum::extract::{Path, State};
use lis_core::models::Report;

#[utoipa::path(
    post,
    path = "/api/v1/reports",
    request_body = CreateReportReq,
    responses(
        (status = 201, description = "Report drafted", body = DataEnvelope),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 404, description = "Order, doctor or result not found", body = ErrorRes)
    )
)]
pub(crate) async fn create_report(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<CreateReportReq>,
) -> ApiResult<Created<Report>> {
    let report = state
        .services
        .reports
        .create_report(req.try_into()?, actor)?;
    Ok(created(report))
}

#[utoipa::path(
    post,
    path = "/api/v1/reports/{id}/submit",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report submitted for review", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 409, description = "Illegal status move", body = ErrorRes)
    )
)]
pub(crate) async fn submit_report(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<Data<Report>> {
    let report = state
        .services
        .reports
        .submit_for_review(parse_id("id", &id)?, actor)?;
    Ok(ok(report))
}

#[utoipa::path(
    post,
    path = "/api/v1/reports/{id}/approve",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report approved", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 409, description = "Illegal status move", body = ErrorRes)
    )
)]
pub(crate) async fn approve_report(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<Data<Report>> {
    let report = state
        .services
        .reports
        .approve_report(parse_id("id", &id)?, actor)?;
    Ok(ok(report))
}

#[utoipa::path(
    post,
    path = "/api/v1/reports/{id}/reject",
    params(("id" = String, Path, description = "Report id")),
    request_body = ReasonReq,
    responses(
        (status = 200, description = "Report rejected", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 409, description = "Illegal status move", body = ErrorRes)
    )
)]
pub(crate) async fn reject_report(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ReasonReq>,
) -> ApiResult<Data<Report>> {
    let report = state
        .services
        .reports
        .reject_report(parse_id("id", &id)?, actor, &req.reason)?;
    Ok(ok(report))
}

#[utoipa::path(
    post,
    path = "/api/v1/reports/{id}/deliver",
    params(("id" = String, Path, description = "Report id")),
    request_body = DeliverReportReq,
    responses(
        (status = 200, description = "Report delivered", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 409, description = "Illegal status move", body = ErrorRes)
    )
)]
pub(crate) async fn deliver_report(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<DeliverReportReq>,
) -> ApiResult<Data<Report>> {
    let report = state
        .services
        .reports
        .deliver_report(parse_id("id", &id)?, actor, req.delivered_to)?;
    Ok(ok(report))
}

#[utoipa::path(
    post,
    path = "/api/v1/reports/{id}/archive",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report archived", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 409, description = "Illegal status move", body = ErrorRes)
    )
)]
pub(crate) async fn archive_report(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> ApiResult<Data<Report>> {
    let report = state
        .services
        .reports
        .archive_report(parse_id("id", &id)?, actor)?;
    Ok(ok(report))
}

#[utoipa::path(
    post,
    path = "/api/v1/reports/{id}/amend",
    params(("id" = String, Path, description = "Report id")),
    request_body = AmendReportReq,
    responses(
        (status = 201, description = "New report version created", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 409, description = "Report was already amended", body = ErrorRes)
    )
)]
pub(crate) async fn amend_report(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AmendReportReq>,
) -> ApiResult<Created<Report>> {
    let (reason, changes) = req.into_parts()?;
    let report = state
        .services
        .reports
        .amend_report(parse_id("id", &id)?, actor, &reason, changes)?;
    Ok(created(report))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}/versions",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "The report and its direct neighbours", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
pub(crate) async fn report_versions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Data<Vec<Report>>> {
    let versions = state
        .services
        .reports
        .get_report_versions(parse_id("id", &id)?)?;
    Ok(ok(versions))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}/chain",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "Every version from the original onwards", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
pub(crate) async fn report_chain(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Data<Vec<Report>>> {
    let chain = state
        .services
        .reports
        .get_report_chain(parse_id("id", &id)?)?;
    Ok(ok(chain))
}
