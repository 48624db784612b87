use thiserror::Error;

/// Failures raised at the boundary where external rows become entities.
///
/// The engine itself never produces these: once records are in the store
/// everything downstream is infallible.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("grade {0:?} has no numeric component")]
    InvalidGrade(String),

    #[error("unrecognised date {0:?}")]
    InvalidDate(String),

    #[error("unrecognised nomination flag {0:?}")]
    InvalidFlag(String),

    #[error("no player is registered under code {0:?}")]
    UnknownPlayerCode(String),

    #[error("team {0:?} has not appeared in any match feed")]
    UnknownTeam(String),

    #[error("{context}: missing column {column:?}")]
    MissingColumn { context: String, column: String },

    #[error("match feed entry {index}: {reason}")]
    MalformedMatch { index: usize, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
