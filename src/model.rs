//! Types exchanged with the browser and the vendor API.
//!
//! Vendor payloads are normalized here, at the client boundary, into one canonical shape. Anything
//! the normalizer does not recognise is a [`ParseError`] rather than a guess.

pub mod feedback_update;
pub mod submission;
pub mod token_set;

pub use feedback_update::FeedbackUpdate;
pub use submission::{Submission, SubmissionList, UpdateOutcome};
pub use token_set::TokenSet;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected submission list shape: {0}")]
    ListShape(&'static str),
    #[error("unexpected submission shape: {0}")]
    SubmissionShape(&'static str),
    #[error("submission is missing a {0} reference")]
    MissingReference(&'static str),
    #[error("unrecognised submission timestamp `{0}`")]
    Timestamp(String),
    #[error("response body is not JSON: {0}")]
    NotJson(#[source] serde_json::Error),
    #[error("invalid submission field: {0}")]
    Field(#[from] serde_json::Error),
}
