use super::{created, ok, Created, Data};
use crate::error::{Actor, ApiJson, ApiResult};
use crate::AppState;
use api_shared::dto::{
    parse_id, CreateOrderReq, DataEnvelope, ErrorRes, UpdateOrderStatusReq, UpdatePaymentReq,
};
use axum::extract::{Path, State};
use lis_core::models::Order;
use lis_core::OrderStatus;

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderReq,
    responses(
        (status = 201, description = "Order created", body = DataEnvelope),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 404, description = "Patient or test not found", body = ErrorRes)
    )
)]
pub(crate) async fn create_order(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<CreateOrderReq>,
) -> ApiResult<Created<Order>> {
    let order = state.services.orders.create_order(req.try_into()?, actor)?;
    Ok(created(order))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = String, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = DataEnvelope),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
pub(crate) async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Data<Order>> {
    let order = state.services.orders.get_order(parse_id("id", &id)?)?;
    Ok(ok(order))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/status",
    params(("id" = String, Path, description = "Order id")),
    request_body = UpdateOrderStatusReq,
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
    ApiJson(req): ApiJson<UpdateOrderStatusReq>,
) -> ApiResult<Data<Order>> {
    let id = parse_id("id", &id)?;
    let orders = &state.services.orders;
    let order = match req.status.parse::<OrderStatus>()? {
        OrderStatus::Cancelled => orders.cancel_order(id, actor, req.reason)?,
        status => orders.update_order_status(id, status, actor)?,
    };
    Ok(ok(order))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/payment",
    params(("id" = String, Path, description = "Order id")),
    request_body = UpdatePaymentReq,
    responses(
        (status = 200, description = "Payment updated", body = DataEnvelope),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
pub(crate) async fn update_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdatePaymentReq>,
) -> ApiResult<Data<Order>> {
    let order = state.services.orders.update_order_payment(
        parse_id("id", &id)?,
        req.payment_status.parse()?,
        req.discount,
    )?;
    Ok(ok(order))
}
