pub mod config;
pub mod coordinator;
pub mod error;
pub mod geocoding;
pub mod providers;
pub mod runtime;
pub mod scheduler;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;
use shared::{
    ApiError, Confirmation, Coordinate, CoordinatorSnapshot, PlaceCandidate, SelectionTarget, Span,
};

use crate::error::CoordinatorError;
use crate::runtime::CoordinatorHandle;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: CoordinatorHandle,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/coordinator", get(snapshot_handler))
        .route("/api/search/query", put(update_query_handler))
        .route("/api/search/select", post(select_candidate_handler))
        .route("/api/search/target", put(selection_target_handler))
        .route("/api/viewport/center", post(recenter_handler))
        .route("/api/viewport/span", put(span_handler))
        .route(
            "/api/viewport/current-location",
            post(current_location_handler),
        )
        .route("/api/ride/pickup", put(pickup_handler))
        .route("/api/ride/dropoff", put(dropoff_handler))
        .route("/api/ride/submit", post(submit_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct TextInput {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct TargetInput {
    pub target: SelectionTarget,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

async fn snapshot_handler(State(state): State<AppState>) -> Json<CoordinatorSnapshot> {
    Json(state.coordinator.snapshot())
}

async fn update_query_handler(
    State(state): State<AppState>,
    Json(input): Json<TextInput>,
) -> ApiResult<CoordinatorSnapshot> {
    state.coordinator.update_query(input.text).await.map_err(api_error)?;
    Ok(Json(state.coordinator.snapshot()))
}

async fn select_candidate_handler(
    State(state): State<AppState>,
    Json(candidate): Json<PlaceCandidate>,
) -> ApiResult<CoordinatorSnapshot> {
    state
        .coordinator
        .select_candidate(candidate)
        .await
        .map_err(api_error)?;
    Ok(Json(state.coordinator.snapshot()))
}

async fn selection_target_handler(
    State(state): State<AppState>,
    Json(input): Json<TargetInput>,
) -> ApiResult<CoordinatorSnapshot> {
    state
        .coordinator
        .set_selection_target(input.target)
        .await
        .map_err(api_error)?;
    Ok(Json(state.coordinator.snapshot()))
}

async fn recenter_handler(
    State(state): State<AppState>,
    Json(center): Json<Coordinate>,
) -> ApiResult<CoordinatorSnapshot> {
    state.coordinator.recenter(center).await.map_err(api_error)?;
    Ok(Json(state.coordinator.snapshot()))
}

async fn span_handler(
    State(state): State<AppState>,
    Json(span): Json<Span>,
) -> ApiResult<CoordinatorSnapshot> {
    state.coordinator.set_span(span).await.map_err(api_error)?;
    Ok(Json(state.coordinator.snapshot()))
}

async fn current_location_handler(State(state): State<AppState>) -> ApiResult<CoordinatorSnapshot> {
    state
        .coordinator
        .recenter_on_current_location()
        .await
        .map_err(api_error)?;
    Ok(Json(state.coordinator.snapshot()))
}

async fn pickup_handler(
    State(state): State<AppState>,
    Json(input): Json<TextInput>,
) -> ApiResult<CoordinatorSnapshot> {
    state.coordinator.set_pickup(input.text).await.map_err(api_error)?;
    Ok(Json(state.coordinator.snapshot()))
}

async fn dropoff_handler(
    State(state): State<AppState>,
    Json(input): Json<TextInput>,
) -> ApiResult<CoordinatorSnapshot> {
    state.coordinator.set_dropoff(input.text).await.map_err(api_error)?;
    Ok(Json(state.coordinator.snapshot()))
}

async fn submit_handler(State(state): State<AppState>) -> ApiResult<Confirmation> {
    state
        .coordinator
        .submit_ride()
        .await
        .map(Json)
        .map_err(api_error)
}

fn api_error(err: CoordinatorError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        CoordinatorError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CoordinatorError::AlreadyInProgress => StatusCode::CONFLICT,
        CoordinatorError::Viewport(_) => StatusCode::BAD_REQUEST,
        CoordinatorError::LocationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoordinatorError::Scheduling(_) | CoordinatorError::Provider(_) => StatusCode::BAD_GATEWAY,
        CoordinatorError::SearchTimeout => StatusCode::GATEWAY_TIMEOUT,
        CoordinatorError::Closed => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
