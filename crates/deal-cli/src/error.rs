//! CLI error types.

use deal_token::{DealError, ErrorKind, OperationFailure};
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Keypair missing or unreadable.
    #[error("keypair error: {0}")]
    Keypair(String),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation returned a failure result.
    #[error("{kind}: {message}")]
    Operation {
        /// Classified failure.
        kind: ErrorKind,
        /// Human-readable message.
        message: String,
    },

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// The failure kind, when the error came from an operation.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Operation { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<OperationFailure> for CliError {
    fn from(failure: OperationFailure) -> Self {
        let message = match failure.partial_mint {
            Some(mint) => format!(
                "{} (run `dealctl resume {mint} <metadata>` to finish)",
                failure.message
            ),
            None => failure.message,
        };
        Self::Operation {
            kind: failure.kind,
            message,
        }
    }
}

impl From<DealError> for CliError {
    fn from(err: DealError) -> Self {
        Self::Operation {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deal_token::{Address, OperationResult};

    #[test]
    fn cli_error_display_config() {
        let err = CliError::Config("bad network".into());
        assert_eq!(err.to_string(), "configuration error: bad network");
    }

    #[test]
    fn cli_error_from_failure_keeps_kind() {
        let failure = OperationResult::<()>::failed(&DealError::invalid_recipient("nope"))
            .into_result()
            .expect_err("failed");
        let err = CliError::from(failure);
        assert_eq!(err.kind(), Some(ErrorKind::InvalidRecipient));
        assert!(err.to_string().starts_with("invalid_recipient: "));
    }

    #[test]
    fn cli_error_partial_mint_suggests_resume() {
        let mint = Address::new([9; 32]);
        let cause = DealError::signing_rejected("declined");
        let failure = OperationResult::<()>::failed(&DealError::partially_minted(mint, &cause))
            .into_result()
            .expect_err("failed");
        let err = CliError::from(failure);
        assert!(err.to_string().contains(&format!("dealctl resume {mint}")));
    }

    #[test]
    fn cli_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert!(matches!(CliError::from(io_err), CliError::Io(_)));
    }
}
