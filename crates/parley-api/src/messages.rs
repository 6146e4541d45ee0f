use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use parley_types::api::{Claims, MessageQuery, SendMessageRequest};
use parley_types::models::ConversationTarget;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::pipeline::NewMessage;

/// `POST /messages/send/{receiver_id}`. A `groupId` in the body turns this
/// into a group message and the path id is ignored.
pub async fn send_message(
    State(state): State<AppState>,
    ApiPath(receiver_id): ApiPath<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = match req.group_id {
        Some(group_id) => ConversationTarget::Group(group_id),
        None => ConversationTarget::Direct(receiver_id),
    };

    let delivered = state
        .pipeline
        .send_message(NewMessage {
            sender_id: claims.sub,
            target,
            text: req.text,
            image: req.image,
            reply_to: req.reply_to,
            model: req.selected_model,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(delivered)))
}

/// `GET /messages/{id}?groupId=`. Without `groupId` the path id is the other
/// party of a direct conversation.
pub async fn get_messages(
    State(state): State<AppState>,
    ApiPath(other_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let target = match query.group_id {
        Some(group_id) => ConversationTarget::Group(group_id),
        None => ConversationTarget::Direct(other_id),
    };

    let messages = state.pipeline.get_messages(claims.sub, target).await?;
    Ok(Json(messages))
}
