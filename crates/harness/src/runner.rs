//! Drives checks through their lifecycle.

use crate::{
    AnteCheck, CheckResult, FailureKind, HarnessConfig, HarnessError, PrimingStep, Result, Stage,
    SlotResolver, SnapshotManager, SuiteResult, TimeController, encode_call,
};
use alloy_json_abi::Function;
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolValue;
use ante_ledger::Ledger;
use std::time::Instant;

/// Runs checks against a ledger, isolating each inside its own snapshot.
///
/// A suite is wrapped in one outer snapshot and every check in an inner one, so the ledger is
/// left exactly as it was found, and no check observes another's deployment, forged storage or
/// time travel. Checks run sequentially: snapshots are global to the ledger.
#[derive(Debug)]
pub struct CheckRunner<'a, L: ?Sized> {
    ledger: &'a L,
    config: &'a HarnessConfig,
    snapshots: SnapshotManager<'a, L>,
    sender: Address,
    predicate: Bytes,
}

/// How far a check got.
#[derive(Default)]
struct Progress {
    stage: Stage,
    address: Option<Address>,
    observed: Option<bool>,
}

/// An outcome that fails the check without being an error.
struct Failure {
    kind: FailureKind,
    reason: String,
}

impl<'a, L: Ledger + ?Sized> CheckRunner<'a, L> {
    /// Creates a runner, resolving the sender from the node if none is configured.
    pub async fn new(ledger: &'a L, config: &'a HarnessConfig) -> Result<Self> {
        let sender = match config.sender {
            Some(sender) => sender,
            None => ledger.accounts().await?.first().copied().ok_or(HarnessError::NoSender)?,
        };
        let predicate = Function::parse(&config.predicate)
            .map_err(|err| HarnessError::invalid_check(&config.predicate, err))?;
        if !predicate.inputs.is_empty() {
            return Err(HarnessError::invalid_check(
                &config.predicate,
                "the predicate must not take arguments",
            ));
        }
        let predicate = Bytes::copy_from_slice(predicate.selector().as_slice());
        Ok(Self { ledger, config, snapshots: SnapshotManager::new(ledger), sender, predicate })
    }

    /// The account deploying and priming checks.
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Runs every check and restores the ledger afterwards.
    ///
    /// A failing check never stops the suite. An unreachable ledger or a broken snapshot does,
    /// after a best-effort restore of the state the suite started from: the error is then
    /// [`HarnessError::Aborted`], naming the check and carrying the results gathered so far.
    pub async fn run_suite<C: AnteCheck>(&mut self, checks: &[C]) -> Result<SuiteResult> {
        let start = Instant::now();
        info!(target: "runner", checks = checks.len(), sender = %self.sender, "running suite");
        let outer = self.snapshots.capture().await?;

        let mut results = Vec::with_capacity(checks.len());
        for check in checks {
            match self.run_check(check).await {
                Ok(result) => results.push(result),
                Err(err) => {
                    error!(target: "runner", check = check.name(), %err, "aborting suite");
                    if let Err(restore) = self.snapshots.restore(outer).await {
                        warn!(target: "runner", %restore, "failed to restore the ledger");
                    }
                    return Err(HarnessError::Aborted {
                        check: check.name().to_string(),
                        completed: results,
                        source: Box::new(err),
                    });
                }
            }
        }

        self.snapshots.restore(outer).await?;
        let suite = SuiteResult::new(start.elapsed(), results);
        info!(
            target: "runner",
            passed = suite.successes().count(),
            failed = suite.failures().count(),
            duration = ?suite.duration,
            "suite finished"
        );
        Ok(suite)
    }

    /// Runs a single check: deploy, prime, assert, restore.
    ///
    /// Failures of the check itself are reported in the result. `Err` is only returned for
    /// fatal errors, see [`HarnessError::is_fatal`], or if the check's snapshot cannot be
    /// restored.
    pub async fn run_check<C: AnteCheck + ?Sized>(&mut self, check: &C) -> Result<CheckResult> {
        let start = Instant::now();
        let name = check.name();
        let handle =
            if self.config.isolate_checks { Some(self.snapshots.capture().await?) } else { None };

        let mut progress = Progress::default();
        let outcome = self.execute(check, &mut progress).await;

        // restore unconditionally, whatever the check did
        let restored = match handle {
            Some(handle) => self.snapshots.restore(handle).await,
            None => Ok(()),
        };

        let mut result = match outcome {
            Ok(None) => CheckResult::success(name, progress.address.unwrap_or_default()),
            Ok(Some(Failure { kind, reason })) => {
                let stage =
                    if kind == FailureKind::PredicateFalse { Stage::Done } else { progress.stage };
                CheckResult::fail(name, stage, kind, reason)
            }
            Err(err) if err.is_fatal() => {
                if let Err(restore) = restored {
                    warn!(target: "runner", check = name, %restore, "failed to restore check snapshot");
                }
                return Err(err);
            }
            Err(err) => CheckResult::fail(name, progress.stage, err.failure_kind(), err.to_string()),
        };
        restored?;

        result.address = progress.address;
        result.observed = progress.observed;
        result.duration = start.elapsed();
        match &result.reason {
            None => info!(target: "runner", check = name, "passed"),
            Some(reason) => {
                info!(target: "runner", check = name, stage = %result.stage, %reason, "failed")
            }
        }
        Ok(result)
    }

    async fn execute<C: AnteCheck + ?Sized>(
        &self,
        check: &C,
        progress: &mut Progress,
    ) -> Result<Option<Failure>> {
        let address = self.ledger.deploy(self.sender, check.init_code()).await?;
        progress.address = Some(address);
        progress.stage = Stage::Deployed;
        debug!(target: "runner", check = check.name(), %address, "deployed");

        for step in check.priming() {
            if let Some(failure) = self.prime(address, step).await? {
                return Ok(Some(failure));
            }
        }
        progress.stage = Stage::Primed;

        let output = self.ledger.call(self.sender, address, self.predicate.clone()).await?;
        let observed = bool::abi_decode(&output).map_err(|source| HarnessError::Decode {
            function: self.config.predicate.clone(),
            source,
        })?;
        progress.stage = Stage::Asserted;
        progress.observed = Some(observed);
        debug!(target: "runner", check = check.name(), observed, "asserted");

        Ok((!observed).then(|| Failure {
            kind: FailureKind::PredicateFalse,
            reason: format!("{} returned false", self.config.predicate),
        }))
    }

    async fn prime(&self, check: Address, step: &PrimingStep) -> Result<Option<Failure>> {
        trace!(target: "runner", %check, ?step, "priming");
        match step {
            PrimingStep::ForgeBalance { token, holder, amount } => {
                let holder = holder.unwrap_or(check);
                let confirmation =
                    self.resolver().forge_and_confirm(*token, holder, *amount).await?;
                if !confirmation.is_confirmed() {
                    return Ok(Some(Failure {
                        kind: FailureKind::UnconfirmedForge,
                        reason: format!(
                            "forged balance of {holder} in {token} not observed: expected {amount}, found {}",
                            confirmation.observed
                        ),
                    }));
                }
            }
            PrimingStep::AdvanceTime { seconds } => self.clock().advance(*seconds).await?,
            PrimingStep::Mine { blocks } => {
                self.clock().mine(*blocks).await?;
            }
            PrimingStep::Invoke { signature, args, target } => {
                let input = encode_call(signature, args)?;
                self.ledger.transact(self.sender, target.unwrap_or(check), input).await?;
            }
            PrimingStep::ExpectBalance { token, holder, min } => {
                let holder = holder.unwrap_or(check);
                let balance = self.resolver().balance_of(*token, holder).await?;
                if balance < *min {
                    return Ok(Some(Failure {
                        kind: FailureKind::BalanceBelowMinimum,
                        reason: format!(
                            "balance of {holder} in {token} is {balance}, expected at least {min}"
                        ),
                    }));
                }
            }
        }
        Ok(None)
    }

    fn resolver(&self) -> SlotResolver<'a, L> {
        let config: &'a HarnessConfig = self.config;
        SlotResolver::new(self.ledger, &config.probe)
    }

    fn clock(&self) -> TimeController<'a, L> {
        TimeController::new(self.ledger)
    }
}
