//! Native contracts executed by the [`MemoryLedger`](super::MemoryLedger).

use super::state::State;
use crate::BlockInfo;
use alloy_primitives::{Address, B256, Bytes, U256};
use std::fmt;

/// The reason a native call reverted.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct Revert(pub String);

impl Revert {
    /// Creates a new revert with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Result of a native call.
pub type CallResult<T = Bytes> = Result<T, Revert>;

/// Contract logic that the in-memory ledger runs instead of EVM bytecode.
///
/// Implementations hold no state of their own: everything persistent goes through the
/// [`CallContext`] storage so that snapshots and reverts cover it.
pub trait NativeContract: fmt::Debug + Send + Sync {
    /// Runs the constructor. `args` are the ABI-encoded arguments appended to the init code.
    fn construct(&self, ctx: &mut CallContext<'_>, args: &[u8]) -> CallResult<()> {
        let _ = (ctx, args);
        Ok(())
    }

    /// Executes a call with the given calldata.
    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> CallResult;
}

/// The execution frame of a native call.
pub struct CallContext<'a> {
    state: &'a mut State,
    address: Address,
    caller: Address,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(state: &'a mut State, address: Address, caller: Address) -> Self {
        Self { state, address, caller }
    }

    /// The address of the executing contract.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The immediate caller.
    pub fn caller(&self) -> Address {
        self.caller
    }

    /// The block the call executes in.
    pub fn block(&self) -> BlockInfo {
        self.state.block
    }

    /// Reads a word of the executing contract's storage.
    pub fn sload(&self, slot: B256) -> U256 {
        self.state.storage(self.address, slot)
    }

    /// Writes a word of the executing contract's storage.
    pub fn sstore(&mut self, slot: B256, value: U256) {
        self.state.set_storage(self.address, slot, value);
    }

    /// Calls `to` with the executing contract as caller.
    ///
    /// Writes of a reverted sub-call are discarded. Calling an account without code succeeds with
    /// empty output.
    pub fn call(&mut self, to: Address, input: &[u8]) -> CallResult {
        let Some(code) = self.state.code(to) else { return Ok(Bytes::new()) };
        let checkpoint = self.state.clone();
        let result = {
            let mut frame = CallContext::new(&mut *self.state, to, self.address);
            code.call(&mut frame, input)
        };
        if result.is_err() {
            *self.state = checkpoint;
        }
        result
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("address", &self.address)
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}
