//! Ledger errors.

use alloy_transport::TransportError;

/// Result alias with [`LedgerError`] as error.
pub type LedgerResult<T, E = LedgerError> = Result<T, E>;

/// Errors returned by a [`Ledger`](crate::Ledger).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The node could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    /// The node answered the request with an error.
    #[error("`{method}` rejected: {message}")]
    Rejected { method: &'static str, message: String },
    /// The call or transaction reverted.
    #[error("execution reverted: {0}")]
    Reverted(String),
}

impl LedgerError {
    /// Creates a new [`LedgerError::Rejected`].
    pub fn rejected(method: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected { method, message: message.into() }
    }

    /// Whether the node could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Whether the error is a revert of the executed code.
    pub fn is_revert(&self) -> bool {
        matches!(self, Self::Reverted(_))
    }

    /// Classifies a transport error returned while executing `method`.
    pub(crate) fn from_transport(method: &'static str, err: TransportError) -> Self {
        if err.is_transport_error() {
            return Self::Unavailable(err.to_string());
        }
        if let Some(payload) = err.as_error_resp() {
            // geth and anvil both use code 3 for execution reverts
            if payload.code == 3 || payload.message.contains("revert") {
                return Self::Reverted(payload.message.to_string());
            }
            return Self::rejected(method, payload.message.to_string());
        }
        Self::rejected(method, err.to_string())
    }
}
