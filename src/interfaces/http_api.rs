use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde::Deserialize;

use crate::application::usecases::ManageWatchesUseCase;
use crate::application::{AppError, WatchRepository};
use crate::domain::PushSubscription;

#[derive(Clone)]
pub struct ApiState {
    pub watches: Arc<dyn WatchRepository>,
    pub api_token: Option<String>,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/watches", get(list_watches).post(create_watch).delete(remove_watch))
        .route("/watches/all", delete(reset_watches))
        .route("/watches/keywords", put(set_keywords))
        .route("/watches/keywords/add", put(add_keyword))
        .route("/watches/keywords/remove", put(remove_keyword))
        .route("/watches/subscription", post(subscribe).delete(unsubscribe))
        .with_state(state)
}

#[derive(Deserialize)]
struct EmailQuery {
    email: String,
}

#[derive(Deserialize)]
struct KeywordQuery {
    email: String,
    keyword: String,
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn list_watches(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    if let Err(resp) = check_auth(&headers, &state.api_token) {
        return resp;
    }
    let uc = ManageWatchesUseCase {
        watches: state.watches.as_ref(),
    };
    match uc.list().await {
        Ok(v) => Json(v).into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_watch(
    State(state): State<ApiState>,
    Query(q): Query<EmailQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = check_auth(&headers, &state.api_token) {
        return resp;
    }
    let uc = ManageWatchesUseCase {
        watches: state.watches.as_ref(),
    };
    match uc.create(&q.email).await {
        Ok(w) => (StatusCode::CREATED, Json(w)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn remove_watch(
    State(state): State<ApiState>,
    Query(q): Query<EmailQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = check_auth(&headers, &state.api_token) {
        return resp;
    }
    let uc = ManageWatchesUseCase {
        watches: state.watches.as_ref(),
    };
    match uc.remove(&q.email).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn add_keyword(
    State(state): State<ApiState>,
    Query(q): Query<KeywordQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = check_auth(&headers, &state.api_token) {
        return resp;
    }
    let uc = ManageWatchesUseCase {
        watches: state.watches.as_ref(),
    };
    match uc.add_keyword(&q.email, &q.keyword).await {
        Ok(w) => Json(w).into_response(),
        Err(e) => error_response(e),
    }
}

async fn remove_keyword(
    State(state): State<ApiState>,
    Query(q): Query<KeywordQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = check_auth(&headers, &state.api_token) {
        return resp;
    }
    let uc = ManageWatchesUseCase {
        watches: state.watches.as_ref(),
    };
    match uc.remove_keyword(&q.email, &q.keyword).await {
        Ok(w) => Json(w).into_response(),
        Err(e) => error_response(e),
    }
}

async fn set_keywords(
    State(state): State<ApiState>,
    Query(q): Query<EmailQuery>,
    headers: HeaderMap,
    Json(keywords): Json<Vec<String>>,
) -> Response {
    if let Err(resp) = check_auth(&headers, &state.api_token) {
        return resp;
    }
    let uc = ManageWatchesUseCase {
        watches: state.watches.as_ref(),
    };
    match uc.set_keywords(&q.email, &keywords).await {
        Ok(w) => Json(w).into_response(),
        Err(e) => error_response(e),
    }
}

async fn subscribe(
    State(state): State<ApiState>,
    Query(q): Query<EmailQuery>,
    headers: HeaderMap,
    Json(subscription): Json<PushSubscription>,
) -> Response {
    if let Err(resp) = check_auth(&headers, &state.api_token) {
        return resp;
    }
    let uc = ManageWatchesUseCase {
        watches: state.watches.as_ref(),
    };
    match uc.subscribe(&q.email, subscription).await {
        Ok(w) => Json(w).into_response(),
        Err(e) => error_response(e),
    }
}

async fn unsubscribe(
    State(state): State<ApiState>,
    Query(q): Query<EmailQuery>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = check_auth(&headers, &state.api_token) {
        return resp;
    }
    let uc = ManageWatchesUseCase {
        watches: state.watches.as_ref(),
    };
    match uc.unsubscribe(&q.email).await {
        Ok(w) => Json(w).into_response(),
        Err(e) => error_response(e),
    }
}

async fn reset_watches(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    if let Err(resp) = check_auth(&headers, &state.api_token) {
        return resp;
    }
    let uc = ManageWatchesUseCase {
        watches: state.watches.as_ref(),
    };
    match uc.reset().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(e: AppError) -> Response {
    let code = match &e {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Conflict(_) => StatusCode::CONFLICT,
        AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if code == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("api request failed: {e}");
    }
    (code, format!("error: {e}")).into_response()
}

fn check_auth(headers: &HeaderMap, token: &Option<String>) -> Result<(), Response> {
    let Some(expected) = token else {
        return Ok(());
    }; // no token configured: auth disabled
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if auth == format!("Bearer {}", expected) {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "unauthorized".to_string()).into_response())
    }
}
