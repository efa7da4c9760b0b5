use thiserror::Error;

/// Transport-level failures talking to the console backend
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} answered {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("stream interrupted: {0}")]
    Transport(String),

    #[error("server reported an error: {0}")]
    Remote(String),
}
