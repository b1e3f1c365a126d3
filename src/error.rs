use thiserror::Error;

/// Failures surfaced by the snapshot fetch layer.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http {status} from {url}")]
    Http { status: u16, url: String },
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("invalid {what} json: {message}")]
    Decode { what: &'static str, message: String },
    #[error("received 304 for {url} without a cached body")]
    NotModifiedWithoutBody { url: String },
}

impl FetchError {
    pub fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        FetchError::Decode {
            what,
            message: err.to_string(),
        }
    }
}
