//! HTTP handlers, middleware and router

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use crate::dto::{
    BlockSummaryResponse, CreateResponseRequest, CreatedResponse, DeletedResponse, FieldView, FormView,
    HealthResponse, ResponseView,
};
use crate::error::ApiError;
use crate::store::FormStore;
use crate::summary;
use crate::types::{FieldDefinition, FieldType};

/// Header carrying the shared admin secret
pub const API_SECRET_HEADER: &str = "API-Secret";

const MAX_BODY_SIZE: usize = 256 * 1024;

// ==================== App State ====================

pub struct AppState<S> {
    store: Arc<S>,
}

impl<S> AppState<S> {
    pub fn new(store: S) -> Self {
        Self { store: Arc::new(store) }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

#[derive(Clone)]
struct ApiSecret(Arc<str>);

// ==================== Middleware ====================

/// Middleware to verify API-Secret header (constant-time comparison)
async fn require_api_secret(
    State(secret): State<ApiSecret>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    use constant_time_eq::constant_time_eq;

    let provided = request
        .headers()
        .get(API_SECRET_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.as_bytes())
        .unwrap_or(&[]);

    if !constant_time_eq(provided, secret.0.as_bytes()) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

// ==================== Handlers ====================

fn parse_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::BadRequest(format!("Invalid {} ID", what))),
    }
}

/// GET /health - Health check (no auth required)
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /forms/:form_id - Form name and field definitions (public)
async fn get_form<S: FormStore>(
    State(state): State<AppState<S>>,
    Path(form_id): Path<String>,
) -> Result<Json<FormView>, ApiError> {
    let form_id = parse_id(&form_id, "form")?;
    let (name, fields) = state.store.form(form_id).await?;

    Ok(Json(FormView {
        id: form_id.to_string(),
        name,
        options: fields.iter().map(FieldView::from).collect(),
    }))
}

/// GET /forms/:form_id/block-summary - Block coverage over active responses (auth required)
async fn get_block_summary<S: FormStore>(
    State(state): State<AppState<S>>,
    Path(form_id): Path<String>,
) -> Result<Json<BlockSummaryResponse>, ApiError> {
    let form_id = parse_id(&form_id, "form")?;
    let form = state.store.form_with_active_responses(form_id).await?;

    let summary = summary::compute(&form.name, &form.fields, &form.responses);
    Ok(Json(BlockSummaryResponse::new(summary, &form.fields)))
}

/// GET /forms/:form_id/responses - Active responses in submission order (auth required)
async fn get_responses<S: FormStore>(
    State(state): State<AppState<S>>,
    Path(form_id): Path<String>,
) -> Result<Json<Vec<ResponseView>>, ApiError> {
    let form_id = parse_id(&form_id, "form")?;
    let form = state.store.form_with_active_responses(form_id).await?;

    Ok(Json(form.responses.into_iter().map(ResponseView::from).collect()))
}

/// Check submitted answers against the form's field definitions
fn validate_values(fields: &[FieldDefinition], values: &serde_json::Map<String, Value>) -> Result<(), ApiError> {
    for (label, value) in values {
        let field = fields
            .iter()
            .find(|f| &f.label == label)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown field: {}", label)))?;

        if field.kind == FieldType::Checkbox {
            let valid = match value {
                Value::Null => true,
                Value::Array(items) => items.iter().all(Value::is_string),
                _ => false,
            };
            if !valid {
                return Err(ApiError::BadRequest(format!("{} must be a list of choices", label)));
            }
        }
    }
    Ok(())
}

/// POST /forms/:form_id/responses - Store a new response (auth required)
async fn create_response<S: FormStore>(
    State(state): State<AppState<S>>,
    Path(form_id): Path<String>,
    Json(payload): Json<CreateResponseRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let form_id = parse_id(&form_id, "form")?;

    if payload.user_id <= 0 {
        return Err(ApiError::BadRequest("userId must be a positive integer".to_string()));
    }

    let Value::Object(values) = payload.values else {
        return Err(ApiError::BadRequest("values must be an object".to_string()));
    };

    let (_, fields) = state.store.form(form_id).await?;
    validate_values(&fields, &values)?;

    let response_id = state.store.create_response(form_id, payload.user_id, values).await?;
    info!("Stored response {} for form {} from user {}", response_id, form_id, payload.user_id);

    Ok(Json(CreatedResponse {
        id: response_id.to_string(),
    }))
}

/// DELETE /responses/:response_id - Soft-delete a response (auth required)
async fn delete_response<S: FormStore>(
    State(state): State<AppState<S>>,
    Path(response_id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let response_id = parse_id(&response_id, "response")?;
    state.store.soft_delete_response(response_id).await?;
    info!("Soft-deleted response {}", response_id);

    Ok(Json(DeletedResponse {
        id: response_id.to_string(),
        deleted: true,
    }))
}

// ==================== Router ====================

/// Build the application router over any form store
pub fn app_router<S: FormStore>(state: AppState<S>, api_secret: &str) -> Router {
    let protected_routes = Router::new()
        .route("/forms/:form_id/block-summary", get(get_block_summary::<S>))
        .route(
            "/forms/:form_id/responses",
            get(get_responses::<S>).post(create_response::<S>),
        )
        .route("/responses/:response_id", delete(delete_response::<S>))
        .layer(middleware::from_fn_with_state(
            ApiSecret(Arc::from(api_secret)),
            require_api_secret,
        ));

    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/forms/:form_id", get(get_form::<S>));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
