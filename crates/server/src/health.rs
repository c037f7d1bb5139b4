use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use shopmate_index::SharedIndex;

#[derive(Clone)]
pub struct HealthState {
    index: SharedIndex,
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
    pub search_index: HealthCheck,
    pub checked_at: String,
}

pub fn router(index: SharedIndex) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { index })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let search_index = index_check(&state.index).await;
    let ready = search_index.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "shopmate-server runtime initialized".to_string(),
        },
        search_index,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn index_check(index: &SharedIndex) -> HealthCheck {
    match index.ping().await {
        Ok(()) => HealthCheck { status: "ready", detail: "search index reachable".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("search index ping failed: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use shopmate_core::catalog::InMemoryIndex;
    use shopmate_index::connect_with_settings;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_index_answers() {
        let (status, Json(payload)) =
            health(State(HealthState { index: Arc::new(InMemoryIndex::new()) })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.search_index.status, "ready");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_index_is_down() {
        let index = connect_with_settings("http://127.0.0.1:9", 1).expect("client builds");

        let (status, Json(payload)) = health(State(HealthState { index: Arc::new(index) })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.search_index.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
