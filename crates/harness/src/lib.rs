//! # ante-harness
//!
//! Runs on-chain invariant checks ("Ante tests") against a dev ledger.
//!
//! Every check is deployed inside its own ledger snapshot, primed (forged balances, time
//! travel, auxiliary calls), asserted through its boolean predicate, and rolled back, so that no
//! check can observe another's mutations. The pieces are usable on their own:
//!
//! - [`SnapshotManager`]: nested capture/restore of the entire ledger state.
//! - [`TimeController`]: deterministic timestamp and block height advancement.
//! - [`SlotResolver`]: forges `mapping(address => uint256)` balances by brute-forcing the
//!   mapping's declaration index.
//! - [`CheckRunner`]: the `Init → Deployed → Primed → Asserted → Done` lifecycle.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

pub mod abi;

mod artifact;
pub use artifact::{encode_call, load_check};

mod check;
pub use check::{AnteCheck, CheckDefinition, PrimingStep};

pub mod config;
pub use config::{CheckConfig, HarnessConfig, ProbeConfig};

mod error;
pub use error::{HarnessError, Result};

mod result;
pub use result::{CheckResult, CheckStatus, FailureKind, Stage, SuiteResult};

mod runner;
pub use runner::CheckRunner;

pub mod slots;
pub use slots::{MappingLayout, SlotResolver};

mod snapshot;
pub use snapshot::{SnapshotHandle, SnapshotManager};

mod time;
pub use time::TimeController;

pub use ante_ledger as ledger;
