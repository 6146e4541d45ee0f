use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::json;

use parley_types::models::{DetectionMethod, Sentiment, Severity, Toxicity, ToxicityCategory};

use crate::ToxicityMethod;
use crate::error::ClassifierError;

/// One way of deciding whether text is toxic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToxicityStrategy {
    /// The classifier service's ML endpoint.
    Remote,
    /// Google Perspective API.
    Perspective,
    /// Local word list.
    Keyword,
}

impl ToxicityStrategy {
    /// Ordered list of strategies to try for a configured method.
    pub fn chain(method: ToxicityMethod, has_perspective_key: bool, keyword_fallback: bool) -> Vec<Self> {
        let mut chain = match method {
            ToxicityMethod::Auto if has_perspective_key => vec![Self::Remote, Self::Perspective],
            ToxicityMethod::Auto => vec![Self::Remote],
            ToxicityMethod::Django => vec![Self::Remote],
            ToxicityMethod::Perspective => vec![Self::Perspective],
            ToxicityMethod::Keyword => vec![Self::Keyword],
        };
        if keyword_fallback && !chain.contains(&Self::Keyword) {
            chain.push(Self::Keyword);
        }
        chain
    }
}

// -- Remote ML endpoint --

#[derive(Serialize)]
struct RemoteRequest<'a> {
    text: &'a str,
    use_ml: bool,
    sentiment: Sentiment,
}

#[derive(Deserialize)]
struct RemoteReply {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    toxicity: Option<RemoteVerdict>,
}

/// The service labels its own method (`ml_enhanced`, `keyword_only`) and
/// echoes extra fields; only the verdict itself is kept.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteVerdict {
    is_toxic: bool,
    #[serde(default)]
    toxicity_score: f64,
    #[serde(default)]
    severity: Severity,
    #[serde(default)]
    categories: BTreeSet<ToxicityCategory>,
    #[serde(default)]
    detected_keywords: Vec<String>,
}

impl From<RemoteVerdict> for Toxicity {
    fn from(v: RemoteVerdict) -> Self {
        Self {
            is_toxic: v.is_toxic,
            toxicity_score: v.toxicity_score,
            severity: v.severity,
            categories: v.categories,
            detected_keywords: v.detected_keywords,
            method: Some(DetectionMethod::DjangoMl),
        }
    }
}

pub(crate) async fn remote(
    http: &reqwest::Client,
    url: &str,
    text: &str,
    sentiment: Sentiment,
) -> Result<Toxicity, ClassifierError> {
    let resp = http
        .post(url)
        .json(&RemoteRequest { text, use_ml: true, sentiment })
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(ClassifierError::Status {
            endpoint: "toxicity",
            status: resp.status().as_u16(),
        });
    }
    let reply: RemoteReply = resp.json().await?;
    if let Some(error) = reply.error {
        return Err(ClassifierError::Remote(error));
    }
    reply
        .toxicity
        .map(Toxicity::from)
        .ok_or_else(|| ClassifierError::Remote("reply carried no toxicity verdict".into()))
}

// -- Perspective API --

const SEVERE_THRESHOLD: f64 = 0.8;
const TOXIC_THRESHOLD: f64 = 0.7;
const WARNING_THRESHOLD: f64 = 0.5;
const SEVERE_TOXICITY_THRESHOLD: f64 = 0.5;
const CATEGORY_THRESHOLD: f64 = 0.6;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerspectiveReply {
    #[serde(default)]
    attribute_scores: HashMap<String, AttributeScore>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributeScore {
    summary_score: SummaryScore,
}

#[derive(Deserialize)]
struct SummaryScore {
    value: f64,
}

/// Summary scores for the attributes we request from Perspective.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerspectiveScores {
    pub toxicity: f64,
    pub severe_toxicity: f64,
    pub identity_attack: f64,
    pub insult: f64,
    pub profanity: f64,
    pub threat: f64,
}

impl PerspectiveScores {
    fn from_reply(reply: &PerspectiveReply) -> Self {
        let score = |name: &str| {
            reply
                .attribute_scores
                .get(name)
                .map_or(0.0, |a| a.summary_score.value)
        };
        Self {
            toxicity: score("TOXICITY"),
            severe_toxicity: score("SEVERE_TOXICITY"),
            identity_attack: score("IDENTITY_ATTACK"),
            insult: score("INSULT"),
            profanity: score("PROFANITY"),
            threat: score("THREAT"),
        }
    }

    pub fn verdict(&self) -> Toxicity {
        let severity = if self.toxicity >= SEVERE_THRESHOLD
            || self.severe_toxicity >= SEVERE_TOXICITY_THRESHOLD
        {
            Severity::Severe
        } else if self.toxicity >= TOXIC_THRESHOLD {
            Severity::High
        } else if self.toxicity >= WARNING_THRESHOLD {
            Severity::Warning
        } else {
            Severity::None
        };

        let categories: BTreeSet<ToxicityCategory> = [
            (self.identity_attack, ToxicityCategory::IdentityAttack),
            (self.insult, ToxicityCategory::Insult),
            (self.profanity, ToxicityCategory::Profanity),
            (self.threat, ToxicityCategory::Threat),
        ]
        .into_iter()
        .filter(|(score, _)| *score >= CATEGORY_THRESHOLD)
        .map(|(_, category)| category)
        .collect();

        Toxicity {
            is_toxic: severity != Severity::None,
            toxicity_score: (self.toxicity * 100.0).round() / 100.0,
            severity,
            categories,
            detected_keywords: Vec::new(),
            method: Some(DetectionMethod::PerspectiveApi),
        }
    }
}

pub(crate) async fn perspective(
    http: &reqwest::Client,
    url: &str,
    api_key: &str,
    text: &str,
) -> Result<Toxicity, ClassifierError> {
    let body = json!({
        "comment": { "text": text },
        "requestedAttributes": {
            "TOXICITY": {},
            "SEVERE_TOXICITY": {},
            "IDENTITY_ATTACK": {},
            "INSULT": {},
            "PROFANITY": {},
            "THREAT": {},
        },
        "languages": ["en"],
    });
    let resp = http
        .post(url)
        .query(&[("key", api_key)])
        .json(&body)
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(ClassifierError::Status {
            endpoint: "perspective",
            status: resp.status().as_u16(),
        });
    }
    let reply: PerspectiveReply = resp.json().await?;
    Ok(PerspectiveScores::from_reply(&reply).verdict())
}

// -- Keyword list --

const TOXIC_KEYWORDS: &[&str] = &[
    // profanity
    "fuck", "shit", "bitch", "asshole", "damn", "hell",
    // threats
    "kill", "die", "murder", "violence", "hurt", "harm",
    // insults
    "hate", "stupid", "idiot", "moron", "loser", "trash",
];

/// Whole-word match against a fixed list. Severity grows with the number of
/// distinct keywords found.
pub fn keyword(text: &str) -> Toxicity {
    let words: BTreeSet<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    let found: Vec<String> = TOXIC_KEYWORDS
        .iter()
        .filter(|k| words.contains(**k))
        .map(|k| k.to_string())
        .collect();

    let severity = match found.len() {
        0 => Severity::None,
        1 => Severity::Warning,
        2 => Severity::High,
        _ => Severity::Severe,
    };
    let mut categories = BTreeSet::new();
    if !found.is_empty() {
        categories.insert(ToxicityCategory::Profanity);
    }

    Toxicity {
        is_toxic: !found.is_empty(),
        toxicity_score: (found.len() as f64 * 0.3).min(1.0),
        severity,
        categories,
        detected_keywords: found,
        method: Some(DetectionMethod::KeywordFallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_order_per_method() {
        use ToxicityStrategy::*;
        assert_eq!(ToxicityStrategy::chain(ToxicityMethod::Auto, true, true), vec![Remote, Perspective, Keyword]);
        assert_eq!(ToxicityStrategy::chain(ToxicityMethod::Auto, false, false), vec![Remote]);
        assert_eq!(ToxicityStrategy::chain(ToxicityMethod::Django, true, true), vec![Remote, Keyword]);
        assert_eq!(ToxicityStrategy::chain(ToxicityMethod::Perspective, false, true), vec![Perspective, Keyword]);
        assert_eq!(ToxicityStrategy::chain(ToxicityMethod::Keyword, true, true), vec![Keyword]);
        assert_eq!(ToxicityStrategy::chain(ToxicityMethod::Keyword, false, false), vec![Keyword]);
    }

    #[test]
    fn keyword_severity_scales_with_matches() {
        let clean = keyword("Hello there, how are you?");
        assert!(!clean.is_toxic);
        assert_eq!(clean.severity, Severity::None);
        assert!(clean.categories.is_empty());

        let one = keyword("you are an IDIOT");
        assert_eq!(one.severity, Severity::Warning);
        assert_eq!(one.detected_keywords, vec!["idiot"]);
        assert!((one.toxicity_score - 0.3).abs() < 1e-9);

        let two = keyword("stupid idiot");
        assert_eq!(two.severity, Severity::High);

        let many = keyword("I hate you, stupid idiot loser");
        assert_eq!(many.severity, Severity::Severe);
        assert_eq!(many.toxicity_score, 1.0);
        assert!(many.categories.contains(&ToxicityCategory::Profanity));
        assert_eq!(many.method, Some(DetectionMethod::KeywordFallback));
    }

    #[test]
    fn keyword_matches_whole_words_only() {
        assert!(!keyword("Hello, shell scripting is harmless").is_toxic);
        assert!(keyword("what the hell!").is_toxic);
    }

    #[test]
    fn perspective_thresholds() {
        let scores = |toxicity, severe_toxicity| PerspectiveScores {
            toxicity,
            severe_toxicity,
            ..PerspectiveScores::default()
        };
        assert_eq!(scores(0.85, 0.0).verdict().severity, Severity::Severe);
        assert_eq!(scores(0.3, 0.55).verdict().severity, Severity::Severe);
        assert_eq!(scores(0.72, 0.0).verdict().severity, Severity::High);
        assert_eq!(scores(0.5, 0.0).verdict().severity, Severity::Warning);

        let calm = scores(0.49, 0.1).verdict();
        assert!(!calm.is_toxic);
        assert_eq!(calm.severity, Severity::None);
    }

    #[test]
    fn perspective_categories_and_rounding() {
        let verdict = PerspectiveScores {
            toxicity: 0.7349,
            insult: 0.61,
            threat: 0.59,
            ..PerspectiveScores::default()
        }
        .verdict();
        assert_eq!(verdict.toxicity_score, 0.73);
        assert_eq!(
            verdict.categories.into_iter().collect::<Vec<_>>(),
            vec![ToxicityCategory::Insult]
        );
        assert_eq!(verdict.method, Some(DetectionMethod::PerspectiveApi));
    }
}
