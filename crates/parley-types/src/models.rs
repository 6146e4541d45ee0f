use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who a message (or an ephemeral signal) is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationTarget {
    /// One-to-one conversation with the given user.
    Direct(Uuid),
    /// Group conversation; the group id doubles as the gateway room id.
    Group(Uuid),
}

impl ConversationTarget {
    /// Build a target from the two optional addressing fields.
    /// Exactly one of them must be set.
    pub fn from_parts(receiver_id: Option<Uuid>, group_id: Option<Uuid>) -> Option<Self> {
        match (receiver_id, group_id) {
            (Some(receiver_id), None) => Some(Self::Direct(receiver_id)),
            (None, Some(group_id)) => Some(Self::Group(group_id)),
            _ => None,
        }
    }

    pub fn receiver_id(&self) -> Option<Uuid> {
        match self {
            Self::Direct(id) => Some(*id),
            Self::Group(_) => None,
        }
    }

    pub fn group_id(&self) -> Option<Uuid> {
        match self {
            Self::Direct(_) => None,
            Self::Group(id) => Some(*id),
        }
    }
}

/// Error returned when a stored enum label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

// -- Transform metadata --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherMethod {
    #[serde(rename = "cipher")]
    Cipher,
    #[serde(rename = "none")]
    Plain,
}

impl CipherMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cipher => "cipher",
            Self::Plain => "none",
        }
    }
}

impl FromStr for CipherMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cipher" => Ok(Self::Cipher),
            "none" => Ok(Self::Plain),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

// -- Sentiment --

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl FromStr for Sentiment {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Where the final sentiment label came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentSource {
    EnhancedAnalysis,
    ToxicityOverride,
    #[default]
    Fallback,
}

/// Per-token score from the enhanced sentiment model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordScore {
    pub word: String,
    pub original_score: f64,
    pub final_score: f64,
    pub is_negated: bool,
    pub intensity_multiplier: f64,
    pub sentiment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentAnalysis {
    pub value: Sentiment,
    pub confidence: f64,
    pub score: f64,
    pub source: SentimentSource,
    #[serde(default)]
    pub word_analysis: Vec<WordScore>,
    pub enhanced: bool,
}

// -- Toxicity --

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Warning,
    High,
    Severe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToxicityCategory {
    IdentityAttack,
    Insult,
    Profanity,
    Threat,
    #[serde(other)]
    Other,
}

/// Which toxicity strategy produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    DjangoMl,
    PerspectiveApi,
    KeywordFallback,
    Unavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toxicity {
    pub is_toxic: bool,
    pub toxicity_score: f64,
    pub severity: Severity,
    #[serde(default)]
    pub categories: BTreeSet<ToxicityCategory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detected_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<DetectionMethod>,
}

/// Everything the classifier collaborator attaches to a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub sentiment: SentimentAnalysis,
    pub toxicity: Toxicity,
    pub sentiment_overridden: bool,
}

impl Classification {
    /// Sentiment as it must be shown to clients: toxic content always reads
    /// as negative, whatever was stored.
    pub fn effective_sentiment(&self) -> Sentiment {
        if self.toxicity.is_toxic {
            Sentiment::Negative
        } else {
            self.sentiment.value
        }
    }
}

// -- Reactions --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactionKind {
    #[serde(rename = "👍")]
    ThumbsUp,
    #[serde(rename = "❤️")]
    Heart,
    #[serde(rename = "😂")]
    Laugh,
    #[serde(rename = "😮")]
    Surprised,
    #[serde(rename = "😢")]
    Sad,
    #[serde(rename = "😡")]
    Angry,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThumbsUp => "👍",
            Self::Heart => "❤️",
            Self::Laugh => "😂",
            Self::Surprised => "😮",
            Self::Sad => "😢",
            Self::Angry => "😡",
        }
    }
}

impl FromStr for ReactionKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "👍" => Ok(Self::ThumbsUp),
            "❤️" => Ok(Self::Heart),
            "😂" => Ok(Self::Laugh),
            "😮" => Ok(Self::Surprised),
            "😢" => Ok(Self::Sad),
            "😡" => Ok(Self::Angry),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}
