use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-success status from a government API or the charting service.
    #[error("{service} returned HTTP {status} for {url}")]
    Upstream {
        service: String,
        url: String,
        status: u16,
    },

    /// A required field is missing or has an unexpected shape.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Only one side of a Yes/No ballot measure was present in the batch.
    #[error("Measure {race_id} has no \"{missing}\" record")]
    PairingGap {
        race_id: String,
        missing: &'static str,
    },
}

impl ScraperError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ScraperError::MalformedRecord(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        ScraperError::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
