use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health check payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
    /// Version of the API crates serving the request.
    pub version: String,
}

/// Liveness probe shared by every API surface.
pub struct HealthService;

impl HealthService {
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "LIS is alive".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}
