use thiserror::Error;

/// Failure of a single remote classifier call. These never escape
/// `Classifier::analyze`; they only decide which fallback is used.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{endpoint} responded with status {status}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("classifier reported an error: {0}")]
    Remote(String),

    #[error("{0} is not configured")]
    Unconfigured(&'static str),
}
