use super::{created, ok, Created, Data};
use crate::error::{Actor, ApiJson, ApiResult};
use crate::AppState;
use api_shared::dto::{
    parse_id, parse_ids, BulkSampleStatusReq, BulkUpdateRes, CollectionStatRes, CreateSampleReq,
    DataEnvelope, ErrorRes, UpdateSampleStatusReq,
};
use axum::extract::{Path, State};
use lis_core::models::Sample;

#[utoipa::path(
    post,
    path = "/api/v1/samples",
    request_body = CreateSampleReq,
    responses(
        (status = 201, description = "Sample registered", body = DataEnvelope),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 404, description = "Order or patient not found", body = ErrorRes)
    )
)]
pub(crate) async fn create_sample(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<CreateSampleReq>,
) -> ApiResult<Created<Sample>> {
    let sample = state
        .services
        .samples
        .create_sample(req.try_into()?, actor)?;
    Ok(created(sample))
}

#[utoipa::path(
    get,
    path = "/api/v1/samples/pending",
    responses(
        (status = 200, description = "Pending samples, most urgent first", body = DataEnvelope)
    )
)]
pub(crate) async fn pending_samples(State(state): State<AppState>) -> Data<Vec<Sample>> {
    ok(state.services.samples.get_pending_samples())
}

#[utoipa::path(
    get,
    path = "/api/v1/samples/stats",
    responses(
        (status = 200, description = "Counts and mean processing time per status", body = [CollectionStatRes])
    )
)]
pub(crate) async fn collection_stats(State(state): State<AppState>) -> Data<Vec<CollectionStatRes>> {
    let stats = state.services.samples.get_collection_stats();
    ok(stats.into_iter().map(CollectionStatRes::from).collect())
}

#[utoipa::path(
    patch,
    path = "/api/v1/samples/{id}/status",
    params(("id" = String, Path, description = "Sample id")),
    request_body = UpdateSampleStatusReq,
    responses(
        (status = 200, description = "Status updated", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 409, description = "Illegal status move", body = ErrorRes)
    )
)]
pub(crate) async fn update_status(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateSampleStatusReq>,
) -> ApiResult<Data<Sample>> {
    let sample = state.services.samples.update_status(
        parse_id("id", &id)?,
        req.status.parse()?,
        actor,
        req.notes,
    )?;
    Ok(ok(sample))
}

#[utoipa::path(
    patch,
    path = "/api/v1/samples/bulk-status",
    request_body = BulkSampleStatusReq,
    responses(
        (status = 200, description = "Matched and modified counts", body = BulkUpdateRes),
        (status = 409, description = "Illegal status move; nothing was written", body = ErrorRes)
    )
)]
pub(crate) async fn bulk_update_status(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<BulkSampleStatusReq>,
) -> ApiResult<Data<BulkUpdateRes>> {
    let outcome = state.services.samples.bulk_update_status(
        &parse_ids("ids", &req.ids)?,
        req.status.parse()?,
        actor,
        req.notes,
    )?;
    Ok(ok(outcome.into()))
}
