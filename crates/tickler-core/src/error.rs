use thiserror::Error;

#[derive(Debug, Error)]
pub enum TicklerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid deadline: {input:?}")]
    InvalidDeadline { input: String },
}

impl TicklerError {
    /// Short machine-readable code, used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            TicklerError::Config(_) => "CONFIG_ERROR",
            TicklerError::InvalidDeadline { .. } => "INVALID_DEADLINE",
        }
    }
}

pub type Result<T> = std::result::Result<T, TicklerError>;
