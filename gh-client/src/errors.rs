use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rate limit exceeded after {attempts} retries: {path}")]
    RateLimitExhausted { path: String, attempts: u32 },

    #[error("server error {status} after {attempts} retries: {path}")]
    ServerExhausted {
        status: u16,
        path: String,
        attempts: u32,
    },

    #[error("client error {status}: {path} - {body}")]
    ClientError {
        status: u16,
        path: String,
        body: String,
    },

    #[error("request failed after {attempts} retries: {path}: {source}")]
    TransportExhausted {
        path: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response shape at {path}: {reason}")]
    UnexpectedShape { path: String, reason: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

impl FetchError {
    /// Mirrors the disqualify-from-retry classification: 404 / non-rate-limit
    /// 403 / 422 are permanent, everything else is worth retrying elsewhere.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            FetchError::ClientError { status, .. }
                if matches!(status, 404 | 403 | 422)
        )
    }
}
