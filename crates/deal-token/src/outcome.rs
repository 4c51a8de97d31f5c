//! The uniform result returned by every public operation.

use serde::{Deserialize, Serialize};

use crate::error::{DealError, ErrorKind, Result};
use crate::keys::Address;

/// Outcome of a public operation.
///
/// Errors never cross the boundary as `Err`; they are folded into
/// `error_kind` and `message`. `partial_mint` is set for
/// [`ErrorKind::PartiallyMinted`], and for a
/// [`ErrorKind::ConfirmationTimeout`] while creating a token identity; it
/// carries the identity to re-check and resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult<T> {
    /// Whether the operation completed.
    pub success: bool,
    /// The produced value on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    /// Classified failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Human-readable failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Explorer link for the last landed transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_ref: Option<String>,
    /// Token identity left without its unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_mint: Option<Address>,
}

impl<T> OperationResult<T> {
    /// A successful outcome without a transaction link.
    #[must_use]
    pub const fn ok(value: T) -> Self {
        Self {
            success: true,
            value: Some(value),
            error_kind: None,
            message: None,
            explorer_ref: None,
            partial_mint: None,
        }
    }

    /// A successful outcome linked to a transaction.
    #[must_use]
    pub fn ok_with_ref(value: T, explorer_ref: impl Into<String>) -> Self {
        Self {
            explorer_ref: Some(explorer_ref.into()),
            ..Self::ok(value)
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failed(error: &DealError) -> Self {
        let partial_mint = error.resumable_mint();
        Self {
            success: false,
            value: None,
            error_kind: Some(error.kind()),
            message: Some(error.to_string()),
            explorer_ref: None,
            partial_mint,
        }
    }

    /// Convert back into a `Result` for `?`-style composition.
    ///
    /// # Errors
    ///
    /// Returns the folded failure; the original error detail survives only
    /// as the message.
    pub fn into_result(self) -> std::result::Result<T, OperationFailure> {
        match (self.success, self.value) {
            (true, Some(value)) => Ok(value),
            _ => Err(OperationFailure {
                kind: self.error_kind.unwrap_or(ErrorKind::SubmissionFailed),
                message: self.message.unwrap_or_default(),
                partial_mint: self.partial_mint,
            }),
        }
    }

    /// Map the success value.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        OperationResult {
            success: self.success,
            value: self.value.map(f),
            error_kind: self.error_kind,
            message: self.message,
            explorer_ref: self.explorer_ref,
            partial_mint: self.partial_mint,
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::failed(&e),
        }
    }
}

/// A failed [`OperationResult`] unpacked by [`OperationResult::into_result`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct OperationFailure {
    /// Classified failure.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Identity to resume after a partial mint.
    pub partial_mint: Option<Address>,
}
