use thiserror::Error;

/// Failures talking to a ledger store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("database error: {0}")]
    Database(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("not authenticated: {0}")]
    Unauthenticated(String),

    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

impl StoreError {
    /// Short label used as a metrics dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Status { status, .. } if *status == 401 || *status == 403 => "auth",
            Self::Status { .. } => "status",
            Self::Decode { .. } => "decode",
            Self::Database(_) => "database",
            Self::NotFound(_) => "not_found",
            Self::Unauthenticated(_) => "auth",
            Self::InvalidUrl(_) => "config",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}
