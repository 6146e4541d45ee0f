use axum::{Extension, Json, extract::State, response::IntoResponse};

use parley_classifier::DEFAULT_MODEL;
use parley_types::api::{AnalyzeRequest, AnalyzeResponse, Claims};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::ApiJson;

/// `POST /toxicity/analyze`: the same analysis a send would run, without
/// sending. Clients use it to warn before posting.
pub async fn analyze(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    ApiJson(req): ApiJson<AnalyzeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Text is required".into()));
    }

    let model = req.selected_model.as_deref().unwrap_or(DEFAULT_MODEL);
    let classification = state.classifier.analyze(&text, model).await;

    Ok(Json(AnalyzeResponse { text, classification }))
}
