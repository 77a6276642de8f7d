//! Check outcomes.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// Results of a suite run, in the order the checks were given.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SuiteResult {
    /// Total duration of the suite, including snapshot bookkeeping.
    pub duration: Duration,
    pub results: Vec<CheckResult>,
}

impl SuiteResult {
    pub fn new(duration: Duration, results: Vec<CheckResult>) -> Self {
        Self { duration, results }
    }

    /// Iterator over all passing checks.
    pub fn successes(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|result| result.status.is_success())
    }

    /// Iterator over all failing checks.
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|result| result.status.is_failure())
    }

    /// Whether every check passed.
    pub fn passed(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Success,
    #[default]
    Failure,
}

impl CheckStatus {
    /// Returns `true` if the check passed.
    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns `true` if the check failed.
    #[inline]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failure)
    }
}

/// Lifecycle of a single check. Stages are only ever entered in this order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Init,
    /// The check contract exists on the ledger.
    Deployed,
    /// Every priming step ran.
    Primed,
    /// The predicate returned.
    Asserted,
    /// Snapshot restored.
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::Deployed => "deployed",
            Self::Primed => "primed",
            Self::Asserted => "asserted",
            Self::Done => "done",
        })
    }
}

/// Why a check failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The predicate returned `false`.
    PredicateFalse,
    /// The node refused a raw storage write.
    StorageWriteRejected,
    /// The node refused a clock change.
    TimeTravelRejected,
    /// A forged balance was not reported back by the token.
    UnconfirmedForge,
    /// An expected balance was not reached.
    BalanceBelowMinimum,
    /// Deployment, a priming transaction, or the predicate call failed.
    Execution,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PredicateFalse => "predicate false",
            Self::StorageWriteRejected => "storage write rejected",
            Self::TimeTravelRejected => "time travel rejected",
            Self::UnconfirmedForge => "unconfirmed forge",
            Self::BalanceBelowMinimum => "balance below minimum",
            Self::Execution => "execution failed",
        })
    }
}

/// The result of one check.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    /// The last stage the check reached. `Done` for checks that ran to completion, whatever the
    /// predicate returned.
    pub stage: Stage,
    /// Address the check was deployed at.
    pub address: Option<Address>,
    /// Value returned by the predicate, if it was invoked.
    pub observed: Option<bool>,
    pub kind: Option<FailureKind>,
    pub reason: Option<String>,
    pub duration: Duration,
}

impl CheckResult {
    pub fn success(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Success,
            stage: Stage::Done,
            address: Some(address),
            observed: Some(true),
            ..Default::default()
        }
    }

    pub fn fail(name: impl Into<String>, stage: Stage, kind: FailureKind, reason: String) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Failure,
            stage,
            kind: Some(kind),
            reason: Some(reason),
            ..Default::default()
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            CheckStatus::Success => write!(f, "[PASS] {}", self.name),
            CheckStatus::Failure => {
                let reason = self.reason.as_deref().unwrap_or("failed");
                write!(f, "[FAIL: {reason}] {}", self.name)
            }
        }
    }
}
