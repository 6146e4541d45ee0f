use serde::{Deserialize, Serialize};
use tracing::debug;

use parley_types::models::{Sentiment, WordScore};

use crate::error::ClassifierError;

#[derive(Serialize)]
struct SentimentRequest<'a> {
    text: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct SentimentReply {
    #[serde(default)]
    sentiment: Option<String>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    word_analysis: Vec<RemoteWordScore>,
    #[serde(default)]
    model_used: Option<String>,
}

#[derive(Deserialize)]
struct RemoteWordScore {
    word: String,
    #[serde(default)]
    original_score: f64,
    #[serde(default)]
    final_score: f64,
    #[serde(default)]
    is_negated: bool,
    #[serde(default = "unit_multiplier")]
    intensity_multiplier: f64,
    #[serde(default)]
    sentiment: String,
}

fn unit_multiplier() -> f64 {
    1.0
}

impl From<RemoteWordScore> for WordScore {
    fn from(w: RemoteWordScore) -> Self {
        Self {
            word: w.word,
            original_score: w.original_score,
            final_score: w.final_score,
            is_negated: w.is_negated,
            intensity_multiplier: w.intensity_multiplier,
            sentiment: w.sentiment,
        }
    }
}

/// Raw sentiment as reported by the classifier, before the toxicity override.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentReading {
    pub value: Sentiment,
    pub confidence: f64,
    pub score: f64,
    pub word_analysis: Vec<WordScore>,
    /// `false` when this reading is the local fallback.
    pub enhanced: bool,
    pub model: String,
}

impl SentimentReading {
    pub fn fallback() -> Self {
        Self {
            value: Sentiment::Neutral,
            confidence: 0.0,
            score: 0.0,
            word_analysis: Vec::new(),
            enhanced: false,
            model: "fallback".to_string(),
        }
    }
}

pub(crate) async fn fetch(
    http: &reqwest::Client,
    url: &str,
    text: &str,
    model: &str,
) -> Result<SentimentReading, ClassifierError> {
    let resp = http
        .post(url)
        .json(&SentimentRequest { text, model })
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(ClassifierError::Status {
            endpoint: "sentiment",
            status: resp.status().as_u16(),
        });
    }
    let reply: SentimentReply = resp.json().await?;

    // Unknown labels read as neutral rather than failing the whole reading.
    let value = reply
        .sentiment
        .as_deref()
        .and_then(|s| s.parse::<Sentiment>().ok())
        .unwrap_or_default();
    let model_used = reply.model_used.unwrap_or_else(|| model.to_string());
    debug!("sentiment {} via model {}", value.as_str(), model_used);

    Ok(SentimentReading {
        value,
        confidence: reply.confidence,
        score: reply.score,
        word_analysis: reply.word_analysis.into_iter().map(WordScore::from).collect(),
        enhanced: true,
        model: model_used,
    })
}
