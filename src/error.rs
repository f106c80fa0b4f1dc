use thiserror::Error;

/// Errors surfaced by the scoring core.
///
/// Missing history is not an error: scorers fall back to their documented
/// neutral value and report it as `Factor::Defaulted`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CoreError::InvalidArgument(msg.into())
    }
}
