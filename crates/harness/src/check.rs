use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// One action taken between deploying a check and asserting it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum PrimingStep {
    /// Forges `amount` as `holder`'s balance of `token`, then fails the check unless `balanceOf`
    /// reports exactly `amount`. The holder defaults to the check itself.
    ForgeBalance {
        token: Address,
        #[serde(default)]
        holder: Option<Address>,
        amount: U256,
    },
    /// Adds to the timestamp of the next mined block.
    AdvanceTime { seconds: i64 },
    Mine { blocks: u64 },
    /// Sends a transaction calling `signature` with string-encoded `args`. The target defaults to
    /// the check itself.
    Invoke {
        signature: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        target: Option<Address>,
    },
    /// Fails the check unless `holder`'s balance of `token` is at least `min`.
    ExpectBalance {
        token: Address,
        #[serde(default)]
        holder: Option<Address>,
        min: U256,
    },
}

/// An invariant check the runner can deploy, prime and assert.
pub trait AnteCheck: Send + Sync {
    /// Human-readable name used in reports.
    fn name(&self) -> &str;

    /// Creation code, including ABI-encoded constructor arguments.
    fn init_code(&self) -> Bytes;

    /// Steps run after deployment and before the predicate.
    fn priming(&self) -> &[PrimingStep] {
        &[]
    }
}

impl<T: AnteCheck + ?Sized> AnteCheck for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn init_code(&self) -> Bytes {
        (**self).init_code()
    }

    fn priming(&self) -> &[PrimingStep] {
        (**self).priming()
    }
}

/// A check assembled from plain data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckDefinition {
    pub name: String,
    pub init_code: Bytes,
    pub priming: Vec<PrimingStep>,
}

impl CheckDefinition {
    pub fn new(name: impl Into<String>, init_code: impl Into<Bytes>) -> Self {
        Self { name: name.into(), init_code: init_code.into(), priming: Vec::new() }
    }

    /// Appends a priming step.
    pub fn with_step(mut self, step: PrimingStep) -> Self {
        self.priming.push(step);
        self
    }
}

impl AnteCheck for CheckDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn init_code(&self) -> Bytes {
        self.init_code.clone()
    }

    fn priming(&self) -> &[PrimingStep] {
        &self.priming
    }
}
