//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so the server starts with zero configuration
//! for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use parley_classifier::{ClassifierConfig, ToxicityMethod};
use parley_crypto::DEFAULT_SHIFT;

/// Placeholder JWT secrets that should never reach production.
pub const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Env: `PARLEY_HOST` / `PARLEY_PORT`
    /// Default: `0.0.0.0:5001`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `PARLEY_DB_PATH`
    /// Default: `parley.db`
    pub db_path: PathBuf,

    /// HS256 secret for bearer tokens.
    /// Env: `PARLEY_JWT_SECRET`
    /// Default: `dev-secret-change-me` (development only).
    pub jwt_secret: String,

    /// Shift used by the message body transform.
    /// Env: `PARLEY_CIPHER_SHIFT`
    /// Default: `4`
    pub cipher_shift: i64,

    /// Env: `PARLEY_SENTIMENT_URL`, `PARLEY_TOXICITY_URL`,
    /// `PARLEY_PERSPECTIVE_API_KEY`, `PARLEY_TOXICITY_METHOD`,
    /// `PARLEY_ENHANCED_SENTIMENT`, `PARLEY_KEYWORD_FALLBACK`,
    /// `PARLEY_CLASSIFIER_TIMEOUT_MS`
    pub classifier: ClassifierConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 5001).into(),
            db_path: PathBuf::from("parley.db"),
            jwt_secret: "dev-secret-change-me".to_string(),
            cipher_shift: DEFAULT_SHIFT,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let host = var("PARLEY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("PARLEY_PORT").unwrap_or_else(|| "5001".into());
        match format!("{host}:{port}").parse::<SocketAddr>() {
            Ok(addr) => config.http_addr = addr,
            Err(_) => tracing::warn!(%host, %port, "Invalid PARLEY_HOST/PARLEY_PORT, using default"),
        }

        if let Some(path) = var("PARLEY_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Some(secret) = var("PARLEY_JWT_SECRET").filter(|s| !s.is_empty()) {
            config.jwt_secret = secret;
        }

        if let Some(val) = var("PARLEY_CIPHER_SHIFT") {
            match val.parse::<i64>() {
                Ok(shift) => config.cipher_shift = shift,
                Err(_) => tracing::warn!(value = %val, "Invalid PARLEY_CIPHER_SHIFT, using default"),
            }
        }

        // -- Classifier --

        let classifier = &mut config.classifier;
        if let Some(url) = var("PARLEY_SENTIMENT_URL") {
            classifier.sentiment_url = url;
        }
        if let Some(url) = var("PARLEY_TOXICITY_URL") {
            classifier.toxicity_url = url;
        }
        classifier.perspective_api_key = var("PARLEY_PERSPECTIVE_API_KEY").filter(|k| !k.is_empty());
        if let Some(val) = var("PARLEY_TOXICITY_METHOD") {
            match val.parse::<ToxicityMethod>() {
                Ok(method) => classifier.method = method,
                Err(e) => tracing::warn!(error = %e, "Invalid PARLEY_TOXICITY_METHOD, using auto"),
            }
        }
        if let Some(val) = var("PARLEY_ENHANCED_SENTIMENT") {
            classifier.enhanced_sentiment = flag(&val);
        }
        if let Some(val) = var("PARLEY_KEYWORD_FALLBACK") {
            classifier.keyword_fallback = flag(&val);
        }
        if let Some(val) = var("PARLEY_CLASSIFIER_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => classifier.timeout = Duration::from_millis(ms),
                _ => tracing::warn!(value = %val, "Invalid PARLEY_CLASSIFIER_TIMEOUT_MS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

fn flag(val: &str) -> bool {
    val != "false" && val != "0"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 5001).into());
        assert_eq!(config.db_path, PathBuf::from("parley.db"));
        assert_eq!(config.cipher_shift, 4);
        assert!(config.uses_placeholder_secret());
        assert_eq!(config.classifier.method, ToxicityMethod::Auto);
        assert!(config.classifier.enhanced_sentiment);
        assert_eq!(config.classifier.timeout, Duration::from_millis(5000));
    }

    #[test]
    fn environment_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PARLEY_HOST", "127.0.0.1"),
            ("PARLEY_PORT", "8088"),
            ("PARLEY_JWT_SECRET", "a-real-secret"),
            ("PARLEY_CIPHER_SHIFT", "7"),
            ("PARLEY_TOXICITY_METHOD", "keyword"),
            ("PARLEY_ENHANCED_SENTIMENT", "false"),
            ("PARLEY_KEYWORD_FALLBACK", "0"),
            ("PARLEY_CLASSIFIER_TIMEOUT_MS", "1500"),
            ("PARLEY_PERSPECTIVE_API_KEY", "k"),
        ]));
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 8088).into());
        assert!(!config.uses_placeholder_secret());
        assert_eq!(config.cipher_shift, 7);
        assert_eq!(config.classifier.method, ToxicityMethod::Keyword);
        assert!(!config.classifier.enhanced_sentiment);
        assert!(!config.classifier.keyword_fallback);
        assert_eq!(config.classifier.timeout, Duration::from_millis(1500));
        assert_eq!(config.classifier.perspective_api_key.as_deref(), Some("k"));
    }

    #[test]
    fn bad_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PARLEY_PORT", "not-a-port"),
            ("PARLEY_CIPHER_SHIFT", "four"),
            ("PARLEY_TOXICITY_METHOD", "bayes"),
            ("PARLEY_CLASSIFIER_TIMEOUT_MS", "soon"),
        ]));
        assert_eq!(config.http_addr.port(), 5001);
        assert_eq!(config.cipher_shift, 4);
        assert_eq!(config.classifier.method, ToxicityMethod::Auto);
        assert_eq!(config.classifier.timeout, ClassifierConfig::default().timeout);
    }

    #[test]
    fn zero_classifier_timeout_is_rejected() {
        let config = ServerConfig::from_lookup(lookup(&[("PARLEY_CLASSIFIER_TIMEOUT_MS", "0")]));
        assert_eq!(config.classifier.timeout, ClassifierConfig::default().timeout);
    }
}
