//! HTTP route handlers for the API.

use crate::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use keepsake_common::{ItemView, KeepsakeError, MemoryItem};
use keepsake_llm::{SurveyQuestion, SurveySource};
use keepsake_memory::{FieldUpdate, UpdateSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub item_count: usize,
    pub oracle_enabled: bool,
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    pub code: &'static str,
}

impl ErrorResponse {
    fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
            code: "INVALID_INPUT",
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<KeepsakeError> for ErrorResponse {
    fn from(err: KeepsakeError) -> Self {
        match err {
            KeepsakeError::InvalidInput(msg) => Self::bad_request(msg),
            KeepsakeError::NotFound(msg) => Self {
                status: StatusCode::NOT_FOUND,
                error: msg,
                code: "NOT_FOUND",
            },
            KeepsakeError::Config(msg) => {
                warn!(error = %msg, "Request needs an unavailable collaborator");
                Self {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    error: msg,
                    code: "NOT_CONFIGURED",
                }
            }
            other => {
                error!(error = %other, "Request failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: "Internal server error".into(),
                    code: "INTERNAL_ERROR",
                }
            }
        }
    }
}

type ApiResult<T> = Result<Json<T>, ErrorResponse>;

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        item_count: state.store.count().await.unwrap_or_default(),
        oracle_enabled: state.oracle_enabled(),
    })
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    if !state.caregiver.verify(&request.username, &request.password) {
        warn!(username = %request.username, "Rejected login");
        return Err(ErrorResponse {
            status: StatusCode::UNAUTHORIZED,
            error: "Invalid username or password".into(),
            code: "INVALID_CREDENTIALS",
        });
    }

    info!(username = %request.username, "Caregiver logged in");
    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        user: request.username,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Register a media item whose content already lives at `url`.
pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<ItemView> {
    let filename = request
        .filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if filename.is_empty() {
        return Err(ErrorResponse::bad_request("filename must not be empty"));
    }
    let url = request.url.trim();
    if url.is_empty() {
        return Err(ErrorResponse::bad_request("url must not be empty"));
    }

    let caption = request.caption.as_deref().unwrap_or_default().trim();
    let item = MemoryItem::new(filename, url).with_caption(caption);
    let view = item.view();
    state.store.insert(item).await?;

    info!(item_id = %view.id, filename = %view.filename, "Registered media");
    Ok(Json(view))
}

pub async fn media_list(State(state): State<Arc<AppState>>) -> ApiResult<Vec<ItemView>> {
    let items = state.store.list().await?;
    Ok(Json(items.iter().map(MemoryItem::view).collect()))
}

pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ItemView> {
    match state.store.get(&id).await? {
        Some(item) => Ok(Json(item.view())),
        None => Err(KeepsakeError::NotFound(format!("Media '{id}' not found")).into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct CaptionRequest {
    pub caption: String,
}

/// Replace an item's caption and drop the description derived from the old one.
pub async fn update_caption(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<CaptionRequest>,
) -> ApiResult<ItemView> {
    let caption = request.caption.trim().to_string();
    state
        .store
        .update_field(&id, FieldUpdate::Caption(caption))
        .await?;
    state
        .store
        .update_field(&id, FieldUpdate::CombinedDescription(None))
        .await?;

    debug!(item_id = %id, "Caption updated");
    match state.store.get(&id).await? {
        Some(item) => Ok(Json(item.view())),
        None => Err(KeepsakeError::NotFound(format!("Media '{id}' not found")).into()),
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: String,
}

pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<DeleteResponse> {
    if !state.store.delete(&id).await? {
        return Err(KeepsakeError::NotFound(format!("Media '{id}' not found")).into());
    }

    info!(item_id = %id, "Deleted media");
    Ok(Json(DeleteResponse {
        message: "Media deleted".into(),
        id,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct RandomQuery {
    #[serde(default)]
    pub k: Option<i64>,
    /// Comma-separated ids to leave out of this draw
    #[serde(default)]
    pub exclude: Option<String>,
}

impl RandomQuery {
    fn count(&self) -> Result<usize, ErrorResponse> {
        match self.k {
            None => Ok(1),
            Some(k) if k >= 1 => Ok(k as usize),
            Some(_) => Err(ErrorResponse::bad_request("k must be at least 1")),
        }
    }

    fn excluded(&self) -> Vec<String> {
        self.exclude
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Draw `k` weighted random memories and suppress them for later draws.
pub async fn random_memories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RandomQuery>,
) -> ApiResult<Vec<ItemView>> {
    let k = query.count()?;
    let draw = state.sampler.draw(k, &query.excluded()).await?;

    if draw.decay_failures > 0 {
        warn!(failures = draw.decay_failures, "Some selected memories were not suppressed");
    }
    Ok(Json(draw.items))
}

#[derive(Debug, Deserialize)]
pub struct SimilarityRequest {
    pub query: String,
}

pub async fn update_weights_by_similarity(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SimilarityRequest>,
) -> ApiResult<UpdateSummary> {
    let summary = state
        .engine
        .update_weights(&request.query, state.oracle.as_ref())
        .await?;
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub message: String,
    pub updated_count: usize,
}

pub async fn reset_weights(State(state): State<Arc<AppState>>) -> ApiResult<ResetResponse> {
    let updated_count = state.engine.reset_weights().await?;
    Ok(Json(ResetResponse {
        message: format!("Reset {updated_count} memories to the default weight"),
        updated_count,
    }))
}

#[derive(Debug, Serialize)]
pub struct SurveyResponse {
    pub survey: Vec<SurveyQuestion>,
    pub total_questions: usize,
    pub memories_used: usize,
    pub total_memories_available: usize,
    pub memories_without_descriptions: usize,
}

/// Pick up to `limit` items with usable text, heaviest first.
fn survey_sources(items: &[MemoryItem], limit: usize) -> Vec<SurveySource> {
    let mut usable: Vec<(&MemoryItem, &str)> = items
        .iter()
        .filter_map(|item| {
            let text = item
                .cached_description()
                .or_else(|| Some(item.caption.trim()).filter(|c| !c.is_empty()))?;
            Some((item, text))
        })
        .collect();
    usable.sort_by(|a, b| b.0.weight.total_cmp(&a.0.weight));

    usable
        .into_iter()
        .take(limit)
        .map(|(item, text)| SurveySource {
            id: item.id.clone(),
            text: text.to_string(),
        })
        .collect()
}

pub async fn generate_survey(State(state): State<Arc<AppState>>) -> ApiResult<SurveyResponse> {
    let Some(generator) = state.surveys.as_ref() else {
        return Err(KeepsakeError::Config(
            "Survey generation requires an LLM provider".into(),
        )
        .into());
    };

    let items = state.store.list().await?;
    let sources = survey_sources(&items, state.survey_config.memory_limit);
    let without_descriptions = items
        .iter()
        .filter(|item| item.cached_description().is_none())
        .count();

    let survey = if sources.is_empty() {
        Vec::new()
    } else {
        generator
            .generate(&sources, state.survey_config.questions)
            .await?
    };

    info!(
        questions = survey.len(),
        memories_used = sources.len(),
        "Generated survey"
    );
    Ok(Json(SurveyResponse {
        total_questions: survey.len(),
        survey,
        memories_used: sources.len(),
        total_memories_available: items.len(),
        memories_without_descriptions: without_descriptions,
    }))
}
