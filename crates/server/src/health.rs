use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::api::ApiState;

#[derive(Clone)]
pub struct HealthState {
    api: ApiState,
    model: String,
    variant: String,
}

impl HealthState {
    pub fn new(api: ApiState, model: impl Into<String>, variant: impl Into<String>) -> Self {
        Self { api, model: model.into(), variant: variant.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub model: HealthCheck,
    pub capacity: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Reports configuration readiness only; the model is never called from here.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let free = state.api.available_permits();
    let ready = free > 0;
    let capacity = if ready {
        HealthCheck { status: "ready", detail: format!("{free} analysis slots free") }
    } else {
        HealthCheck { status: "busy", detail: "all analysis slots in use".to_string() }
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "busy" },
        service: HealthCheck {
            status: "ready",
            detail: "hoops-server runtime initialized".to_string(),
        },
        model: HealthCheck {
            status: "ready",
            detail: format!("model `{}`, default variant `{}`", state.model, state.variant),
        },
        capacity,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
