use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::aggregator::{Aggregator, NewsQuery};
use crate::error::NewsError;

pub struct AppState {
    pub aggregator: Aggregator,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/news", get(news))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub enum AppError {
    InvalidQuery(Vec<FieldError>),
    News(NewsError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidQuery(errors) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "message": "Invalid query parameters",
                    "errors": errors,
                })),
            )
                .into_response(),
            AppError::News(err @ NewsError::NoFeeds { .. }) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": err.to_string() })),
            )
                .into_response(),
            AppError::News(NewsError::Internal(detail)) => {
                error!("Get research news error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "Error fetching research news" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<NewsError> for AppError {
    fn from(err: NewsError) -> Self {
        AppError::News(err)
    }
}

/// Raw query string values, validated by [`NewsParams::validate`].
#[derive(Debug, Default, Deserialize)]
pub struct NewsParams {
    pub category: Option<String>,
    pub limit: Option<String>,
}

impl NewsParams {
    pub fn validate(self) -> Result<NewsQuery, Vec<FieldError>> {
        let limit = match self.limit {
            None => None,
            Some(raw) if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) => {
                // Digits only, so the sole failure is overflow
                Some(raw.parse::<usize>().unwrap_or(usize::MAX))
            }
            Some(_) => {
                return Err(vec![FieldError::new(
                    "limit",
                    "limit must be a non-negative integer",
                )])
            }
        };

        Ok(NewsQuery {
            category: self.category,
            limit,
        })
    }
}

pub async fn news(
    State(state): State<Arc<AppState>>,
    params: Result<Query<NewsParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params
        .map_err(|rejection| AppError::InvalidQuery(vec![FieldError::new("query", rejection.body_text())]))?;
    let query = params.validate().map_err(AppError::InvalidQuery)?;

    let response = state.aggregator.get_research_news(query).await?;
    Ok(Json(response))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
