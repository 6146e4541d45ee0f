use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

use parley_db::models::{MessageRow, ReactionRow};
use parley_types::api::{Claims, ReactionListResponse, ReactionRequest, ReactionResponse};
use parley_types::events::GatewayEvent;
use parley_types::models::ReactionKind;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::pipeline::target_of;
use crate::{format_timestamp, parse_timestamp};

/// `POST /messages/{message_id}/reactions`. Adds the caller's reaction or
/// replaces the one they already had.
pub async fn add_reaction(
    State(state): State<AppState>,
    ApiPath(message_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<ReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = req
        .kind
        .parse::<ReactionKind>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid reaction type '{}'", req.kind)))?;

    let message = find_message(&state, message_id).await?;

    let reaction_id = Uuid::new_v4().to_string();
    let mid = message_id.to_string();
    let uid = claims.sub.to_string();
    let now = format_timestamp(chrono::Utc::now());
    let (created, row) = state
        .with_db(move |db| db.upsert_reaction(&reaction_id, &mid, &uid, kind.as_str(), &now))
        .await?;

    let reaction = reaction_response(&row)?;
    notify(&state, &message, GatewayEvent::ReactionAdded {
        message_id,
        reaction: reaction.clone(),
    })
    .await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(reaction)))
}

/// `DELETE /messages/{message_id}/reactions`
pub async fn remove_reaction(
    State(state): State<AppState>,
    ApiPath(message_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let message = find_message(&state, message_id).await?;

    let mid = message_id.to_string();
    let uid = claims.sub.to_string();
    state
        .with_db(move |db| db.remove_reaction(&mid, &uid))
        .await?
        .ok_or_else(|| ApiError::NotFound("Reaction not found".into()))?;

    notify(&state, &message, GatewayEvent::ReactionRemoved {
        message_id,
        user_id: claims.sub,
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /messages/{message_id}/reactions`
pub async fn list_reactions(
    State(state): State<AppState>,
    ApiPath(message_id): ApiPath<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    find_message(&state, message_id).await?;

    let mid = message_id.to_string();
    let rows = state
        .with_db(move |db| db.get_reactions_for_message(&mid))
        .await?;

    let reactions = rows
        .iter()
        .map(reaction_response)
        .collect::<Result<Vec<_>, _>>()?;

    let mut summary: BTreeMap<String, Vec<Uuid>> = BTreeMap::new();
    for r in &reactions {
        summary.entry(r.kind.as_str().to_string()).or_default().push(r.user_id);
    }

    Ok(Json(ReactionListResponse {
        total: reactions.len(),
        reactions,
        summary,
    }))
}

async fn find_message(state: &AppState, message_id: Uuid) -> Result<MessageRow, ApiError> {
    let mid = message_id.to_string();
    state
        .with_db(move |db| db.get_message(&mid))
        .await?
        .ok_or_else(|| ApiError::NotFound("Message not found".into()))
}

/// Reaction events follow the message: its room, or both direct parties.
async fn notify(state: &AppState, message: &MessageRow, event: GatewayEvent) -> Result<(), ApiError> {
    let (sender_id, target) = target_of(message)?;
    let reached = state.pipeline.fan_out(sender_id, target, event).await;
    debug!("reaction update on {} reached {} connection(s)", message.id, reached);
    Ok(())
}

fn reaction_response(row: &ReactionRow) -> Result<ReactionResponse, ApiError> {
    Ok(ReactionResponse {
        id: row.id.parse::<Uuid>().map_err(anyhow::Error::from)?,
        message_id: row.message_id.parse::<Uuid>().map_err(anyhow::Error::from)?,
        user_id: row.user_id.parse::<Uuid>().map_err(anyhow::Error::from)?,
        kind: row.kind.parse::<ReactionKind>().map_err(anyhow::Error::from)?,
        created_at: parse_timestamp(&row.created_at),
    })
}
