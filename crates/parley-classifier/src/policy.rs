use parley_types::models::{
    Classification, Sentiment, SentimentAnalysis, SentimentSource, Toxicity,
};

use crate::sentiment::SentimentReading;

/// Combine a sentiment reading and a toxicity verdict into the classification
/// stored with a message.
///
/// Toxic text is always negative. Otherwise an enhanced reading is taken as
/// is, and anything else reads neutral.
pub fn resolve(reading: Option<&SentimentReading>, toxicity: Toxicity) -> Classification {
    let (value, source, sentiment_overridden) = if toxicity.is_toxic {
        let overridden = reading.is_some_and(|r| r.value != Sentiment::Negative);
        (Sentiment::Negative, SentimentSource::ToxicityOverride, overridden)
    } else {
        match reading {
            Some(r) if r.enhanced => (r.value, SentimentSource::EnhancedAnalysis, false),
            _ => (Sentiment::Neutral, SentimentSource::Fallback, false),
        }
    };

    let sentiment = SentimentAnalysis {
        value,
        confidence: reading.map_or(0.0, |r| r.confidence),
        score: reading.map_or(0.0, |r| r.score),
        source,
        word_analysis: reading.map(|r| r.word_analysis.clone()).unwrap_or_default(),
        enhanced: reading.is_some_and(|r| r.enhanced),
    };

    Classification { sentiment, toxicity, sentiment_overridden }
}
