use thiserror::Error;

use crate::request::RequestError;

/// The only two failures that abort a search. Everything else degrades to
/// partial or empty results.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),
    #[error("could not resolve location: {0}")]
    InvalidLocation(String),
}
