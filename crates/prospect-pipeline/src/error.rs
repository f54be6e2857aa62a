//! Pipeline error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Db(#[from] prospect_db::DbError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected payload while {context}")]
    UnexpectedPayload { context: &'static str },
}
