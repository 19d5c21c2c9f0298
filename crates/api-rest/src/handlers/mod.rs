//! Route handlers, grouped by resource.

pub(crate) mod catalog;
pub(crate) mod orders;
pub(crate) mod patients;
pub(crate) mod reports;
pub(crate) mod results;
pub(crate) mod samples;

use api_shared::dto::DataRes;
use axum::http::StatusCode;
use axum::Json;

pub(crate) type Data<T> = Json<DataRes<T>>;
pub(crate) type Created<T> = (StatusCode, Json<DataRes<T>>);

pub(crate) fn ok<T>(data: T) -> Data<T> {
    Json(DataRes::new(data))
}

pub(crate) fn created<T>(data: T) -> Created<T> {
    (StatusCode::CREATED, Json(DataRes::new(data)))
}
