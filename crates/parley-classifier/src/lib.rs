//! Client for the external sentiment/toxicity classifier.
//!
//! `Classifier::analyze` never fails: every remote problem (non-2xx, bad
//! body, timeout, refused connection) degrades to the next toxicity strategy
//! and finally to neutral, non-toxic defaults.

pub mod error;
pub mod policy;
pub mod sentiment;
pub mod toxicity;

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, warn};

use parley_types::models::{Classification, DetectionMethod, Sentiment, Toxicity, UnknownVariant};

pub use error::ClassifierError;
pub use sentiment::SentimentReading;
pub use toxicity::ToxicityStrategy;

pub const DEFAULT_SENTIMENT_URL: &str = "http://127.0.0.1:8000/api/sentiment/enhanced/";
pub const DEFAULT_TOXICITY_URL: &str = "http://127.0.0.1:8000/api/sentiment/toxicity/";
pub const DEFAULT_PERSPECTIVE_URL: &str =
    "https://commentanalyzer.googleapis.com/v1alpha1/comments:analyze";
pub const DEFAULT_MODEL: &str = "svc";

/// Preferred toxicity detection method, as configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToxicityMethod {
    #[default]
    Auto,
    Django,
    Perspective,
    Keyword,
}

impl FromStr for ToxicityMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "django" => Ok(Self::Django),
            "perspective" => Ok(Self::Perspective),
            "keyword" => Ok(Self::Keyword),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub sentiment_url: String,
    pub toxicity_url: String,
    pub perspective_url: String,
    pub perspective_api_key: Option<String>,
    pub method: ToxicityMethod,
    /// Call the remote sentiment endpoint at all.
    pub enhanced_sentiment: bool,
    /// Append the keyword strategy as the last resort.
    pub keyword_fallback: bool,
    pub timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sentiment_url: DEFAULT_SENTIMENT_URL.to_string(),
            toxicity_url: DEFAULT_TOXICITY_URL.to_string(),
            perspective_url: DEFAULT_PERSPECTIVE_URL.to_string(),
            perspective_api_key: None,
            method: ToxicityMethod::Auto,
            enhanced_sentiment: true,
            keyword_fallback: true,
            timeout: Duration::from_millis(5000),
        }
    }
}

pub struct Classifier {
    http: reqwest::Client,
    config: ClassifierConfig,
    chain: Vec<ToxicityStrategy>,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build classifier http client")?;
        let chain = ToxicityStrategy::chain(
            config.method,
            config.perspective_api_key.is_some(),
            config.keyword_fallback,
        );
        debug!("toxicity strategy chain: {:?}", chain);
        Ok(Self { http, config, chain })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn strategies(&self) -> &[ToxicityStrategy] {
        &self.chain
    }

    /// Score `text` for sentiment and toxicity and apply the override policy.
    pub async fn analyze(&self, text: &str, model: &str) -> Classification {
        let reading = if self.config.enhanced_sentiment {
            Some(self.sentiment(text, model).await)
        } else {
            None
        };
        let raw = reading.as_ref().map_or(Sentiment::Neutral, |r| r.value);
        let toxicity = self.toxicity(text, raw).await;
        policy::resolve(reading.as_ref(), toxicity)
    }

    /// Remote sentiment reading, or the neutral fallback reading on failure.
    pub async fn sentiment(&self, text: &str, model: &str) -> SentimentReading {
        match sentiment::fetch(&self.http, &self.config.sentiment_url, text, model).await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("sentiment endpoint unavailable, using fallback: {}", e);
                SentimentReading::fallback()
            }
        }
    }

    /// Walk the strategy chain; the first strategy that answers wins.
    pub async fn toxicity(&self, text: &str, raw_sentiment: Sentiment) -> Toxicity {
        for strategy in &self.chain {
            match self.run(*strategy, text, raw_sentiment).await {
                Ok(verdict) => {
                    debug!(
                        "toxicity via {:?}: toxic={} severity={:?}",
                        strategy, verdict.is_toxic, verdict.severity
                    );
                    return verdict;
                }
                Err(e) => warn!("toxicity strategy {:?} failed: {}", strategy, e),
            }
        }

        warn!("every toxicity strategy failed or is disabled");
        Toxicity {
            method: Some(DetectionMethod::Unavailable),
            ..Toxicity::default()
        }
    }

    async fn run(
        &self,
        strategy: ToxicityStrategy,
        text: &str,
        raw_sentiment: Sentiment,
    ) -> Result<Toxicity, ClassifierError> {
        match strategy {
            ToxicityStrategy::Remote => {
                toxicity::remote(&self.http, &self.config.toxicity_url, text, raw_sentiment).await
            }
            ToxicityStrategy::Perspective => {
                let key = self
                    .config
                    .perspective_api_key
                    .as_deref()
                    .ok_or(ClassifierError::Unconfigured("perspective api key"))?;
                toxicity::perspective(&self.http, &self.config.perspective_url, key, text).await
            }
            ToxicityStrategy::Keyword => Ok(toxicity::keyword(text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toxicity_method_parses_case_insensitively() {
        assert_eq!("AUTO".parse::<ToxicityMethod>(), Ok(ToxicityMethod::Auto));
        assert_eq!(" keyword ".parse::<ToxicityMethod>(), Ok(ToxicityMethod::Keyword));
        assert!("bayes".parse::<ToxicityMethod>().is_err());
    }

    #[test]
    fn default_chain_skips_perspective_without_key() {
        let classifier = Classifier::new(ClassifierConfig::default()).unwrap();
        assert_eq!(
            classifier.strategies(),
            &[ToxicityStrategy::Remote, ToxicityStrategy::Keyword]
        );
    }
}
