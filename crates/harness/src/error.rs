use crate::result::{CheckResult, FailureKind};
use alloy_primitives::{Address, B256, U256};
use ante_ledger::LedgerError;
use std::path::PathBuf;

/// Convenience alias for harness results.
pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

/// Errors raised while driving checks against a ledger.
///
/// [`LedgerUnavailable`](Self::LedgerUnavailable) and [`InvalidHandle`](Self::InvalidHandle) are
/// fatal: the ledger can no longer be trusted to be isolated, so the whole suite is aborted. Every
/// other error only fails the check it occurred in.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("invalid snapshot handle {id}: {reason}")]
    InvalidHandle { id: U256, reason: &'static str },

    #[error("storage write to {target} at slot {slot} was rejected: {source}")]
    StorageWriteRejected {
        target: Address,
        slot: B256,
        #[source]
        source: LedgerError,
    },

    #[error("time travel rejected: {0}")]
    TimeTravelRejected(String),

    #[error("no sender configured and the node has no unlocked accounts")]
    NoSender,

    #[error("failed to decode the output of `{function}`: {source}")]
    Decode {
        function: String,
        #[source]
        source: alloy_sol_types::Error,
    },

    #[error("invalid check `{name}`: {reason}")]
    InvalidCheck { name: String, reason: String },

    #[error("failed to read artifact {}: {source}", path.display())]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid artifact {}: {source}", path.display())]
    ArtifactFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Abi(#[from] alloy_dyn_abi::Error),

    #[error(transparent)]
    Config(Box<figment::Error>),

    #[error(transparent)]
    Ledger(LedgerError),

    /// A fatal error stopped the suite while `check` was running.
    #[error("check `{check}` aborted the suite: {source}")]
    Aborted {
        check: String,
        /// Results of the checks that finished before `check`.
        completed: Vec<CheckResult>,
        #[source]
        source: Box<HarnessError>,
    },
}

impl HarnessError {
    pub(crate) fn invalid_check(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidCheck { name: name.into(), reason: reason.to_string() }
    }

    /// Whether the error must abort the whole suite.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LedgerUnavailable(_) | Self::InvalidHandle { .. } | Self::Aborted { .. }
        )
    }

    /// Classifies a non-fatal error for reporting.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::StorageWriteRejected { .. } => FailureKind::StorageWriteRejected,
            Self::TimeTravelRejected(_) => FailureKind::TimeTravelRejected,
            _ => FailureKind::Execution,
        }
    }
}

impl From<LedgerError> for HarnessError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unavailable(msg) => Self::LedgerUnavailable(msg),
            err => Self::Ledger(err),
        }
    }
}

impl From<figment::Error> for HarnessError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
