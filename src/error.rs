use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("LIST_OF_MAIN_SERVICE_API environment variable is required")]
    MissingBackends,
    #[error("at least one API must be provided in LIST_OF_MAIN_SERVICE_API")]
    EmptyBackends,
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failure of a single backend's metrics fetch. Never leaves its refresh cycle.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("error calling {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("error reading response from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("probe task for {url} did not complete: {reason}")]
    Task { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("no available API")]
    NoBackendAvailable,
    #[error("invalid request method {0:?}")]
    InvalidMethod(String),
    #[error("error marshalling request body: {0}")]
    Marshal(#[from] serde_json::Error),
    #[error("error sending request: {0}")]
    Send(#[source] reqwest::Error),
    #[error("error reading response body: {0}")]
    Body(#[source] reqwest::Error),
}

impl ForwardError {
    /// Status code the service layer answers with for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            ForwardError::NoBackendAvailable => 503,
            _ => 500,
        }
    }
}
