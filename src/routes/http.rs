//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::logic::{self, ApiError};
use crate::protocol::*;
use crate::state::AppState;

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      warn!(target: "learnplay", error = %self, "Request failed");
    }
    (status, Json(ErrorOut { message: self.to_string() })).into_response()
  }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_catalog(State(state): State<Arc<AppState>>) -> Json<Vec<ModuleSummaryOut>> {
  Json(logic::list_catalog(&state))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_module(
  State(state): State<Arc<AppState>>,
  Path(module_id): Path<String>,
) -> ApiResult<ModuleDetailOut> {
  Ok(Json(logic::get_module_detail(&state, &module_id)?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  Path(module_id): Path<String>,
) -> ApiResult<crate::progress::ProgressRecord> {
  Ok(Json(logic::get_progress(&state, &module_id)?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_progress(
  State(state): State<Arc<AppState>>,
  Path(module_id): Path<String>,
) -> ApiResult<crate::progress::ProgressRecord> {
  Ok(Json(logic::reset_progress(&state, &module_id)?))
}

#[instrument(level = "info", skip(state, body), fields(module = %body.module_id, level = %body.level_id))]
pub async fn http_post_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartSessionIn>,
) -> ApiResult<SessionOut> {
  let out = logic::start_session(&state, &body.module_id, &body.level_id).await?;
  info!(target: "learnplay", session = %out.session_id, "HTTP session opened");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<crate::runner::RunnerView> {
  Ok(Json(logic::session_view(&state, &session_id).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_select(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
  Json(body): Json<SelectIn>,
) -> ApiResult<crate::runner::RunnerView> {
  Ok(Json(logic::select_answer(&state, &session_id, body.answer).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_submit(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<crate::session::SubmitOutcome> {
  Ok(Json(logic::submit_answer(&state, &session_id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_advance(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<crate::session::StepOutcome<crate::runner::Advance>> {
  Ok(Json(logic::advance(&state, &session_id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_continue(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<crate::session::StepOutcome<crate::runner::Continuation>> {
  Ok(Json(logic::continue_level(&state, &session_id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_restart(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<crate::runner::RunnerView> {
  Ok(Json(logic::restart_level(&state, &session_id).await?))
}

#[instrument(level = "info", skip(state), fields(index = q.index))]
pub async fn http_get_explanation(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
  Query(q): Query<ExplanationQuery>,
) -> ApiResult<ExplanationOut> {
  let text = logic::explanation(&state, &session_id, q.index).await?;
  Ok(Json(ExplanationOut { index: q.index, text }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> ApiResult<NavigateOut> {
  let intent = logic::exit_session(&state, &session_id).await?;
  Ok(Json(NavigateOut { intent }))
}
