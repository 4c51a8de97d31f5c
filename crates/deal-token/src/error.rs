//! Error types for deal token operations.
//!
//! [`DealError`] is what internal helpers propagate with `?`. At the public
//! boundary every error is collapsed into one [`ErrorKind`] from a closed set
//! and carried inside an [`OperationResult`](crate::OperationResult).

use crate::amount::Amount;
use crate::keys::{Address, Signature};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for deal token operations.
pub type Result<T> = std::result::Result<T, DealError>;

/// The closed set of failure classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No address could be found on the wallet handle.
    WalletNotConnected,
    /// The wallet exposes no usable signing method.
    WalletIncapable,
    /// Spendable balance is below the operation's reserve.
    InsufficientBalance,
    /// Malformed metadata, price, address or listing state.
    InvalidInput,
    /// The destination address is malformed or unusable.
    InvalidRecipient,
    /// The wallet declined to sign. Nothing was sent.
    SigningRejected,
    /// The network refused the transaction or could not be reached.
    SubmissionFailed,
    /// Sent, but not confirmed in time. It may still land.
    ConfirmationTimeout,
    /// The token identity exists on the ledger but issuance did not confirm.
    PartiallyMinted,
    /// A redemption ticket failed structural or integrity checks.
    InvalidTicketFormat,
    /// A redemption ticket is past its expiry.
    TicketExpired,
}

impl ErrorKind {
    /// Whether the ledger state is unknown and must be re-queried.
    #[must_use]
    pub const fn is_uncertain(&self) -> bool {
        matches!(self, Self::ConfirmationTimeout | Self::PartiallyMinted)
    }

    /// Whether the failure happened before anything was sent to the network.
    #[must_use]
    pub const fn landed_nothing(&self) -> bool {
        matches!(
            self,
            Self::WalletNotConnected
                | Self::WalletIncapable
                | Self::InsufficientBalance
                | Self::InvalidInput
                | Self::InvalidRecipient
                | Self::SigningRejected
                | Self::InvalidTicketFormat
                | Self::TicketExpired
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WalletNotConnected => "wallet_not_connected",
            Self::WalletIncapable => "wallet_incapable",
            Self::InsufficientBalance => "insufficient_balance",
            Self::InvalidInput => "invalid_input",
            Self::InvalidRecipient => "invalid_recipient",
            Self::SigningRejected => "signing_rejected",
            Self::SubmissionFailed => "submission_failed",
            Self::ConfirmationTimeout => "confirmation_timeout",
            Self::PartiallyMinted => "partially_minted",
            Self::InvalidTicketFormat => "invalid_ticket_format",
            Self::TicketExpired => "ticket_expired",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during deal token operations.
#[derive(Debug, Error)]
pub enum DealError {
    /// The wallet handle exposes no address.
    #[error("wallet not connected: no public key found on the wallet handle")]
    WalletNotConnected,

    /// The wallet cannot sign.
    #[error("wallet incapable: {message}")]
    WalletIncapable {
        /// What is missing.
        message: String,
    },

    /// Insufficient balance for the operation.
    #[error(
        "insufficient balance: wallet has {have}, needs at least {need} for {operation} (short by {shortfall})"
    )]
    InsufficientBalance {
        /// Current balance.
        have: Amount,
        /// Required balance.
        need: Amount,
        /// `need - have`.
        shortfall: Amount,
        /// Operation that was gated.
        operation: String,
    },

    /// Invalid caller input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },

    /// Invalid recipient address.
    #[error("invalid recipient: {message}")]
    InvalidRecipient {
        /// Description of the problem.
        message: String,
    },

    /// The wallet refused to sign.
    #[error("signing rejected: {message}")]
    SigningRejected {
        /// Reason reported by the wallet.
        message: String,
    },

    /// The transaction was refused or could not be delivered.
    #[error("submission failed: {message}")]
    SubmissionFailed {
        /// Reason for failure.
        message: String,
    },

    /// Confirmation did not arrive in time.
    #[error(
        "timeout: transaction {signature} not confirmed within {timeout_secs} seconds; re-check ledger state before retrying{}",
        .mint.map(|m| format!(" (token {m} may exist; resume it once confirmed)")).unwrap_or_default()
    )]
    ConfirmationTimeout {
        /// The submitted transaction.
        signature: Signature,
        /// Wait bound.
        timeout_secs: u64,
        /// Token identity the transaction was creating, if any.
        mint: Option<Address>,
    },

    /// The mint account exists but the unit was not issued.
    #[error("partially minted: token {mint} exists but issuance did not complete: {reason}")]
    PartiallyMinted {
        /// Token identity to resume.
        mint: Address,
        /// Underlying failure of the issuance step.
        reason: String,
    },

    /// Malformed or tampered redemption ticket.
    #[error("invalid ticket: {message}")]
    InvalidTicketFormat {
        /// Description of the problem.
        message: String,
    },

    /// The redemption ticket has expired.
    #[error("ticket expired at {expired_at}")]
    TicketExpired {
        /// When the ticket stopped being valid.
        expired_at: DateTime<Utc>,
    },

    /// JSON-RPC error returned by the ledger node.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// RPC error message.
        message: String,
    },

    /// Transport-level failure talking to the ledger node.
    #[error("network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DealError {
    /// Classify this error into the public closed set.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::WalletNotConnected => ErrorKind::WalletNotConnected,
            Self::WalletIncapable { .. } => ErrorKind::WalletIncapable,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::InvalidInput { .. } | Self::Io(_) | Self::Json(_) => ErrorKind::InvalidInput,
            Self::InvalidRecipient { .. } => ErrorKind::InvalidRecipient,
            Self::SigningRejected { .. } => ErrorKind::SigningRejected,
            Self::SubmissionFailed { .. } | Self::Rpc { .. } | Self::Network { .. } => {
                ErrorKind::SubmissionFailed
            }
            Self::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            Self::PartiallyMinted { .. } => ErrorKind::PartiallyMinted,
            Self::InvalidTicketFormat { .. } => ErrorKind::InvalidTicketFormat,
            Self::TicketExpired { .. } => ErrorKind::TicketExpired,
        }
    }

    /// Whether a retry of the same send may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Create an insufficient balance error.
    #[must_use]
    pub fn insufficient_balance(have: Amount, need: Amount, operation: impl Into<String>) -> Self {
        Self::InsufficientBalance {
            have,
            need,
            shortfall: need.saturating_sub(have),
            operation: operation.into(),
        }
    }

    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an invalid recipient error.
    #[must_use]
    pub fn invalid_recipient(message: impl Into<String>) -> Self {
        Self::InvalidRecipient {
            message: message.into(),
        }
    }

    /// Create a wallet incapable error.
    #[must_use]
    pub fn wallet_incapable(message: impl Into<String>) -> Self {
        Self::WalletIncapable {
            message: message.into(),
        }
    }

    /// Create a signing rejected error.
    #[must_use]
    pub fn signing_rejected(message: impl Into<String>) -> Self {
        Self::SigningRejected {
            message: message.into(),
        }
    }

    /// Create a submission failed error.
    #[must_use]
    pub fn submission_failed(message: impl Into<String>) -> Self {
        Self::SubmissionFailed {
            message: message.into(),
        }
    }

    /// Create a network error.
    #[must_use]
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an invalid ticket error.
    #[must_use]
    pub fn invalid_ticket(message: impl Into<String>) -> Self {
        Self::InvalidTicketFormat {
            message: message.into(),
        }
    }

    /// Attach the token identity an unconfirmed transaction was creating.
    /// Other errors pass through unchanged.
    #[must_use]
    pub fn with_pending_mint(self, pending: Address) -> Self {
        match self {
            Self::ConfirmationTimeout {
                signature,
                timeout_secs,
                ..
            } => Self::ConfirmationTimeout {
                signature,
                timeout_secs,
                mint: Some(pending),
            },
            other => other,
        }
    }

    /// Token identity the caller can re-check or resume, if the error
    /// carries one.
    #[must_use]
    pub const fn resumable_mint(&self) -> Option<Address> {
        match self {
            Self::PartiallyMinted { mint, .. } => Some(*mint),
            Self::ConfirmationTimeout { mint, .. } => *mint,
            _ => None,
        }
    }

    /// Wrap a failed issuance step for an already-created token identity.
    #[must_use]
    pub fn partially_minted(mint: Address, cause: &Self) -> Self {
        Self::PartiallyMinted {
            mint,
            reason: cause.to_string(),
        }
    }
}
