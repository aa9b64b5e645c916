use thiserror::Error;

/// The four error kinds surfaced by this crate.
///
/// Construction and deserialisation are the only fallible operations; a query
/// against an already-built index never returns an error; an empty or
/// budget-truncated result is represented in-band (see [`crate::matcher::MatchResult`]).
#[derive(Debug, Error)]
pub enum GfmiError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("io error for path {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("budget exhausted: {0}")]
    BudgetExhausted(String),

    #[error("internal logic error: {0}")]
    LogicError(String),
}

pub type Result<T> = std::result::Result<T, GfmiError>;

impl GfmiError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        GfmiError::MalformedInput(msg.into())
    }

    pub fn logic(msg: impl Into<String>) -> Self {
        GfmiError::LogicError(msg.into())
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        GfmiError::Io {
            path: path.into(),
            source,
        }
    }
}
