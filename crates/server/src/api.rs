//! JSON API for the storefront widget and catalog webhooks.
//!
//! - `POST /api/chat`                              : one assistant turn
//! - `GET  /api/products/search?q=&limit=`         : cached product search
//! - `POST /api/products/refresh`                  : re-sync products
//! - `POST /api/products/refresh-categories`       : re-sync categories
//! - `POST /api/products/refresh-all`              : categories, then products
//! - `POST /api/coupons/refresh`                   : re-sync coupons
//! - `POST /api/cache/clear`                       : drop cached searches
//! - `POST /wp-json/webhooks/woocommerce/product-*`: store change notifications

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shopmate_agent::conversation::{ChatContext, ChatRequest, ChatResponse};
use shopmate_core::cache::SEARCH_PREFIX;
use shopmate_core::domain::fields;
use shopmate_core::domain::product::Product;
use shopmate_core::errors::{ApplicationError, DomainError, InterfaceError};
use shopmate_index::SyncError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bootstrap::Services;

pub const MAX_QUERY_CHARS: usize = 200;
pub const MAX_SEARCH_LIMIT: usize = 50;
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

#[derive(Clone)]
pub struct ApiState {
    services: Arc<Services>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub message: &'static str,
    pub correlation_id: String,
}

/// An [`InterfaceError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl ApiError {
    fn from_application(error: ApplicationError, operation: &'static str) -> Self {
        let correlation_id = Uuid::new_v4().to_string();
        warn!(
            event_name = "api.request.failed",
            correlation_id = %correlation_id,
            operation,
            error = %error,
            "request failed"
        );
        Self(error.into_interface(correlation_id))
    }

    fn bad_request(message: impl Into<String>, operation: &'static str) -> Self {
        Self::from_application(DomainError::InvalidInput(message.into()).into(), operation)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = match &self.0 {
            InterfaceError::BadRequest { message, .. } => message.clone(),
            _ => self.0.user_message().to_string(),
        };
        let body = ApiErrorBody {
            error: detail,
            message: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    pub message: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub context: Option<ChatContext>,
    pub last_viewed_product: Option<Value>,
    pub cart: Option<Value>,
    pub user_email: Option<String>,
}

impl ChatPayload {
    /// Top-level fields win over the same fields inside `context`.
    fn into_request(self) -> ChatRequest {
        let mut context = self.context.unwrap_or_default();
        if self.user_id.is_some() {
            context.user_id = self.user_id;
        }
        if self.session_id.is_some() {
            context.session_id = self.session_id;
        }
        if self.last_viewed_product.is_some() {
            context.last_viewed_product = self.last_viewed_product;
        }
        if self.cart.is_some() {
            context.cart = self.cart;
        }
        if self.user_email.is_some() {
            context.user_email = self.user_email;
        }
        ChatRequest::new(self.message).with_context(context)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct RefreshResponse {
    pub message: &'static str,
    pub count: usize,
}

pub fn router(services: Arc<Services>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/products/search", get(search_products))
        .route("/api/products/refresh", post(refresh_products))
        .route("/api/products/refresh-categories", post(refresh_categories))
        .route("/api/products/refresh-all", post(refresh_all))
        .route("/api/coupons/refresh", post(refresh_coupons))
        .route("/api/cache/clear", post(clear_cache))
        .route("/wp-json/webhooks/woocommerce/product-created", post(product_created))
        .route("/wp-json/webhooks/woocommerce/product-updated", post(product_updated))
        .route("/wp-json/webhooks/woocommerce/product-deleted", post(product_deleted))
        .with_state(ApiState { services })
}

pub async fn chat(
    State(state): State<ApiState>,
    Json(payload): Json<ChatPayload>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request = payload.into_request();
    let message = request
        .validated_message()
        .map_err(|error| ApiError::from_application(error.into(), "chat"))?
        .to_string();

    let request = ChatRequest { message, ..request };
    Ok(Json(state.services.agent.handle(&request).await))
}

pub async fn search_products(
    State(state): State<ApiState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::bad_request("q must not be empty", "products.search"));
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(ApiError::bad_request(
            format!("q must be at most {MAX_QUERY_CHARS} characters"),
            "products.search",
        ));
    }

    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT as i64);
    let limit = usize::try_from(limit)
        .ok()
        .filter(|limit| (1..=MAX_SEARCH_LIMIT).contains(limit))
        .ok_or_else(|| {
            ApiError::bad_request(
                format!("limit must be between 1 and {MAX_SEARCH_LIMIT}"),
                "products.search",
            )
        })?;

    Ok(Json(state.services.search.search_products(query, limit).await))
}

pub async fn refresh_products(
    State(state): State<ApiState>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let count = state
        .services
        .sync
        .refresh_products()
        .await
        .map_err(|error| ApiError::from_application(error.into(), "products.refresh"))?;
    Ok(Json(RefreshResponse { message: "Products refreshed successfully", count }))
}

pub async fn refresh_categories(
    State(state): State<ApiState>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let count = state
        .services
        .sync
        .refresh_categories()
        .await
        .map_err(|error| ApiError::from_application(error.into(), "categories.refresh"))?;
    Ok(Json(RefreshResponse { message: "Categories refreshed successfully", count }))
}

pub async fn refresh_all(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    let sync = &state.services.sync;
    let failed = |error: SyncError| ApiError::from_application(error.into(), "catalog.refresh_all");
    let categories = sync.refresh_categories().await.map_err(failed)?;
    let products = sync.refresh_products().await.map_err(failed)?;

    Ok(Json(json!({
        "message": "Products and categories refreshed successfully",
        "products": products,
        "categories": categories,
    })))
}

pub async fn refresh_coupons(
    State(state): State<ApiState>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let count = state
        .services
        .sync
        .refresh_coupons()
        .await
        .map_err(|error| ApiError::from_application(error.into(), "coupons.refresh"))?;
    Ok(Json(RefreshResponse { message: "Coupons refreshed", count }))
}

pub async fn clear_cache(State(state): State<ApiState>) -> Json<Value> {
    let removed = state.services.cache.invalidate(SEARCH_PREFIX).await;
    info!(event_name = "api.cache.cleared", removed, "search cache cleared");
    Json(json!({"message": "Cache cleared successfully", "removed": removed}))
}

pub async fn product_created(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    product_webhook(&state, "created", &body).await
}

pub async fn product_updated(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    product_webhook(&state, "updated", &body).await
}

pub async fn product_deleted(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    product_webhook(&state, "deleted", &body).await
}

/// Logs what changed (best effort) and re-syncs the product index.
async fn product_webhook(
    state: &ApiState,
    action: &'static str,
    body: &[u8],
) -> Result<Json<Value>, ApiError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(payload) => {
            let id = payload.get("id").and_then(fields::text).unwrap_or_default();
            let name = payload.get("name").and_then(fields::text).unwrap_or_default();
            info!(event_name = "api.webhook.product", action, product_id = %id, product_name = %name, "product webhook received");
        }
        Err(error) => warn!(
            event_name = "api.webhook.unparseable",
            action,
            payload_bytes = body.len(),
            error = %error,
            "product webhook payload was not JSON"
        ),
    }

    let count = state
        .services
        .sync
        .refresh_products()
        .await
        .map_err(|error| ApiError::from_application(error.into(), "webhook.product"))?;
    Ok(Json(json!({"status": "success", "action": action, "count": count})))
}
