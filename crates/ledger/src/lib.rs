//! # ante-ledger
//!
//! The raw ledger surface driven by the Ante harness.
//!
//! [`Ledger`] is the privileged dev-node RPC subset the harness needs: snapshot/revert by id, raw
//! storage access, timestamp manipulation, forced mining, deployment and calls. Two backends are
//! provided:
//!
//! - [`RpcLedger`], talking JSON-RPC to a dev node such as Anvil or Hardhat.
//! - [`MemoryLedger`], an in-process ledger that runs [`NativeContract`]s, used for hermetic runs.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate tracing;

use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};

mod error;
pub use error::{LedgerError, LedgerResult};

pub mod memory;
pub use memory::{CallContext, MemoryLedger, NativeContract, Revert};

mod rpc;
pub use rpc::RpcLedger;

/// Metadata of the latest mined block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block height.
    pub number: u64,
    /// Block timestamp, in seconds.
    pub timestamp: u64,
}

/// The ledger RPC surface.
///
/// Every method is a single round-trip with no retries. Implementations must be driven by one
/// caller at a time: snapshots and time offsets are global to the ledger.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Captures the full ledger state and returns its id. (`evm_snapshot`)
    async fn snapshot(&self) -> LedgerResult<U256>;

    /// Rewinds the ledger to snapshot `id`, dropping it and every snapshot taken after it.
    ///
    /// Returns `false` if the id is unknown. (`evm_revert`)
    async fn revert(&self, id: U256) -> LedgerResult<bool>;

    /// Adds `seconds` to the timestamp of the next mined block. (`evm_increaseTime`)
    async fn increase_time(&self, seconds: u64) -> LedgerResult<()>;

    /// Pins the timestamp of the next mined block. (`evm_setNextBlockTimestamp`)
    async fn set_next_block_timestamp(&self, timestamp: u64) -> LedgerResult<()>;

    /// Mines `blocks` empty blocks. (`evm_mine`)
    async fn mine(&self, blocks: u64) -> LedgerResult<()>;

    /// Returns the latest block.
    async fn block(&self) -> LedgerResult<BlockInfo>;

    /// Reads one storage word.
    async fn storage_at(&self, address: Address, slot: B256) -> LedgerResult<B256>;

    /// Overwrites one storage word. (`hardhat_setStorageAt`)
    async fn set_storage_at(&self, address: Address, slot: B256, value: B256) -> LedgerResult<()>;

    /// Returns the unlocked accounts of the node.
    async fn accounts(&self) -> LedgerResult<Vec<Address>>;

    /// Deploys `init_code` from `from` and returns the created address.
    async fn deploy(&self, from: Address, init_code: Bytes) -> LedgerResult<Address>;

    /// Executes a call against the latest state without committing it.
    async fn call(&self, from: Address, to: Address, input: Bytes) -> LedgerResult<Bytes>;

    /// Sends a state-changing transaction and waits for it to be mined.
    async fn transact(&self, from: Address, to: Address, input: Bytes) -> LedgerResult<()>;
}
