use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use parley_classifier::{Classifier, DEFAULT_MODEL};
use parley_crypto::ShiftCipher;
use parley_db::MessageStore;
use parley_db::models::MessageRow;
use parley_gateway::Dispatcher;
use parley_types::api::MessageResponse;
use parley_types::events::GatewayEvent;
use parley_types::models::{CipherMethod, Classification, ConversationTarget};

use crate::{format_timestamp, parse_timestamp};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Message target is not a known user or group")]
    InvalidTarget,

    #[error("Message needs text or an attachment")]
    EmptyMessage,

    #[error("Replied-to message {0} not found")]
    ReplyNotFound(Uuid),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] anyhow::Error),
}

/// An outbound message as handed over by the HTTP layer.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub target: ConversationTarget,
    pub text: Option<String>,
    pub image: Option<String>,
    pub reply_to: Option<Uuid>,
    /// Sentiment model requested by the client.
    pub model: Option<String>,
}

/// Validate, classify, transform, persist, reconstruct and fan out.
#[derive(Clone)]
pub struct MessagePipeline {
    store: Arc<dyn MessageStore>,
    classifier: Arc<Classifier>,
    cipher: ShiftCipher,
    dispatcher: Dispatcher,
}

impl MessagePipeline {
    pub fn new(
        store: Arc<dyn MessageStore>,
        classifier: Arc<Classifier>,
        cipher: ShiftCipher,
        dispatcher: Dispatcher,
    ) -> Self {
        Self { store, classifier, cipher, dispatcher }
    }

    pub fn cipher(&self) -> ShiftCipher {
        self.cipher
    }

    pub async fn send_message(&self, msg: NewMessage) -> Result<MessageResponse, PipelineError> {
        let text = non_blank(msg.text);
        let image = non_blank(msg.image);
        if text.is_none() && image.is_none() {
            return Err(PipelineError::EmptyMessage);
        }

        let target = msg.target;
        let reply_to = msg.reply_to;
        let (target_known, reply_known) = self
            .blocking(move |store| {
                let target_known = match target {
                    ConversationTarget::Direct(receiver_id) => {
                        store.user_exists(&receiver_id.to_string())?
                    }
                    ConversationTarget::Group(group_id) => {
                        store.group_exists(&group_id.to_string())?
                    }
                };
                let reply_known = match reply_to {
                    Some(id) => store.get_message(&id.to_string())?.is_some(),
                    None => true,
                };
                Ok((target_known, reply_known))
            })
            .await?;
        if !target_known {
            return Err(PipelineError::InvalidTarget);
        }
        if let (false, Some(id)) = (reply_known, reply_to) {
            return Err(PipelineError::ReplyNotFound(id));
        }

        let classification = match &text {
            Some(text) => {
                let model = msg.model.as_deref().unwrap_or(DEFAULT_MODEL);
                self.classifier.analyze(text, model).await
            }
            None => Classification::default(),
        };

        let row = MessageRow {
            id: Uuid::new_v4().to_string(),
            sender_id: msg.sender_id.to_string(),
            receiver_id: target.receiver_id().map(|id| id.to_string()),
            group_id: target.group_id().map(|id| id.to_string()),
            body: text.as_deref().map(|t| self.cipher.encrypt(t)),
            attachment: image,
            is_encrypted: true,
            cipher_method: CipherMethod::Cipher.as_str().to_string(),
            cipher_key: self.cipher.key(),
            sentiment: classification.effective_sentiment().as_str().to_string(),
            is_toxic: classification.toxicity.is_toxic,
            classification: serde_json::to_string(&classification)
                .context("failed to encode classification")?,
            reply_to: reply_to.map(|id| id.to_string()),
            edited: false,
            is_deleted: false,
            pinned: false,
            created_at: format_timestamp(chrono::Utc::now()),
        };

        let stored = row.clone();
        self.blocking(move |store| store.insert_message(&stored))
            .await
            .inspect_err(|e| error!("failed to persist message from {}: {}", msg.sender_id, e))?;
        info!(
            "message {} from {} persisted (toxic={})",
            row.id, row.sender_id, row.is_toxic
        );

        let delivery = reconstruct(&row)?;
        let event = GatewayEvent::NewMessage(Box::new(delivery.clone()));
        let reached = self.fan_out(msg.sender_id, target, event).await;
        debug!("message {} delivered to {} connection(s)", row.id, reached);

        Ok(delivery)
    }

    /// Full history for a conversation as seen by `viewer`, oldest first,
    /// always in plaintext.
    pub async fn get_messages(
        &self,
        viewer: Uuid,
        target: ConversationTarget,
    ) -> Result<Vec<MessageResponse>, PipelineError> {
        let rows = self
            .blocking(move |store| match target {
                ConversationTarget::Direct(other) => {
                    store.get_direct_messages(&viewer.to_string(), &other.to_string())
                }
                ConversationTarget::Group(group_id) => {
                    store.get_group_messages(&group_id.to_string())
                }
            })
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                reconstruct(row)
                    .inspect_err(|e| warn!("skipping corrupt message '{}': {:#}", row.id, e))
                    .ok()
            })
            .collect())
    }

    /// Deliver `event` to everyone following a conversation. Group targets go
    /// to the room; direct targets go to the receiver and to the sender's own
    /// connection. Returns how many connections were reached.
    pub async fn fan_out(
        &self,
        sender_id: Uuid,
        target: ConversationTarget,
        event: GatewayEvent,
    ) -> usize {
        match target {
            ConversationTarget::Group(group_id) => {
                self.dispatcher.send_to_room(group_id, event).await
            }
            ConversationTarget::Direct(receiver_id) => {
                let mut reached = usize::from(
                    self.dispatcher.send_to_user(receiver_id, event.clone()).await,
                );
                if receiver_id != sender_id {
                    reached += usize::from(self.dispatcher.send_to_user(sender_id, event).await);
                }
                reached
            }
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, PipelineError>
    where
        F: FnOnce(&dyn MessageStore) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .context("storage task panicked")?;
        Ok(result?)
    }
}

/// Sender and conversation of a stored message.
pub fn target_of(row: &MessageRow) -> anyhow::Result<(Uuid, ConversationTarget)> {
    let sender_id = row.sender_id.parse::<Uuid>().context("bad sender id")?;
    let receiver_id = row
        .receiver_id
        .as_deref()
        .map(str::parse::<Uuid>)
        .transpose()
        .context("bad receiver id")?;
    let group_id = row
        .group_id
        .as_deref()
        .map(str::parse::<Uuid>)
        .transpose()
        .context("bad group id")?;
    let target = ConversationTarget::from_parts(receiver_id, group_id)
        .context("message has no single target")?;
    Ok((sender_id, target))
}

/// Build the delivery copy of a stored row. The row itself is untouched.
pub fn reconstruct(row: &MessageRow) -> anyhow::Result<MessageResponse> {
    let (sender_id, target) = target_of(row)?;
    let method: CipherMethod = row.cipher_method.parse()?;

    let text = match (&row.body, row.is_encrypted, method) {
        (Some(body), true, CipherMethod::Cipher) => Some(ShiftCipher::new(row.cipher_key).decrypt(body)),
        (body, _, _) => body.clone(),
    };

    let classification: Classification =
        serde_json::from_str(&row.classification).unwrap_or_else(|e| {
            warn!("Corrupt classification on message '{}': {}", row.id, e);
            Classification::default()
        });

    Ok(MessageResponse {
        id: row.id.parse::<Uuid>().context("bad message id")?,
        sender_id,
        receiver_id: target.receiver_id(),
        group_id: target.group_id(),
        text,
        image: row.attachment.clone(),
        is_encrypted: row.is_encrypted,
        encryption_method: method,
        encryption_key: row.cipher_key,
        sentiment: classification.effective_sentiment(),
        sentiment_overridden: classification.sentiment_overridden,
        sentiment_analysis: classification.sentiment,
        toxicity: classification.toxicity,
        reply_to: row
            .reply_to
            .as_deref()
            .map(str::parse::<Uuid>)
            .transpose()
            .context("bad reply id")?,
        edited: row.edited,
        is_deleted: row.is_deleted,
        pinned: row.pinned,
        created_at: parse_timestamp(&row.created_at),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::models::{Sentiment, Toxicity};

    fn row(body: &str, classification: &Classification) -> MessageRow {
        MessageRow {
            id: Uuid::new_v4().to_string(),
            sender_id: Uuid::new_v4().to_string(),
            receiver_id: Some(Uuid::new_v4().to_string()),
            group_id: None,
            body: Some(body.to_string()),
            attachment: None,
            is_encrypted: true,
            cipher_method: "cipher".into(),
            cipher_key: 4,
            sentiment: "neutral".into(),
            is_toxic: classification.toxicity.is_toxic,
            classification: serde_json::to_string(classification).unwrap(),
            reply_to: None,
            edited: false,
            is_deleted: false,
            pinned: false,
            created_at: "2026-03-01T10:00:00.000000Z".into(),
        }
    }

    #[test]
    fn reconstruct_decrypts_with_the_stored_key() {
        let stored = row("Lipps", &Classification::default());
        let copy = reconstruct(&stored).unwrap();
        assert_eq!(copy.text.as_deref(), Some("Hello"));
        assert_eq!(stored.body.as_deref(), Some("Lipps"));
        assert_eq!(copy.encryption_key, 4);
    }

    #[test]
    fn plain_rows_pass_through() {
        let mut stored = row("Lipps", &Classification::default());
        stored.is_encrypted = false;
        stored.cipher_method = "none".into();
        assert_eq!(reconstruct(&stored).unwrap().text.as_deref(), Some("Lipps"));
    }

    #[test]
    fn toxic_rows_always_read_negative() {
        let mut classification = Classification::default();
        classification.sentiment.value = Sentiment::Positive;
        classification.toxicity = Toxicity { is_toxic: true, ..Toxicity::default() };
        let copy = reconstruct(&row("x", &classification)).unwrap();
        assert_eq!(copy.sentiment, Sentiment::Negative);
    }

    #[test]
    fn rows_need_exactly_one_target() {
        let mut stored = row("x", &Classification::default());
        stored.group_id = Some(Uuid::new_v4().to_string());
        assert!(target_of(&stored).is_err());
        stored.receiver_id = None;
        assert!(matches!(target_of(&stored), Ok((_, ConversationTarget::Group(_)))));
    }

    #[test]
    fn blank_text_is_dropped() {
        assert_eq!(non_blank(Some("  hi  ".into())), Some("hi".into()));
        assert_eq!(non_blank(Some(" \n ".into())), None);
        assert_eq!(non_blank(None), None);
    }
}
