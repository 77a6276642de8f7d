//! An in-process ledger with Anvil's snapshot, time and storage semantics.
//!
//! Contract code is native Rust: a [`NativeContract`] is registered under an init-code blob and
//! deploying that blob (followed by ABI-encoded constructor arguments) instantiates it, exactly
//! like EVM init code would. Every transaction mines its own block.

use crate::{BlockInfo, Ledger, LedgerError, LedgerResult};
use alloy_primitives::{Address, B256, Bytes, U256, address, keccak256};
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};

mod native;
pub use native::{CallContext, CallResult, NativeContract, Revert};

mod state;
pub use state::{AccountDump, StateDump};
use state::{Code, State};

/// The first Anvil dev account, unlocked by default.
pub const DEV_ACCOUNT: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// Timestamp of the genesis block of [`MemoryLedger::new`].
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// A [`Ledger`] kept entirely in memory.
#[derive(Debug)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Creates a ledger at block 0 with [`GENESIS_TIMESTAMP`] and [`DEV_ACCOUNT`] unlocked.
    pub fn new() -> Self {
        Self::with_genesis(BlockInfo { number: 0, timestamp: GENESIS_TIMESTAMP })
    }

    /// Creates a ledger starting at the given block.
    pub fn with_genesis(genesis: BlockInfo) -> Self {
        let inner = Inner {
            state: State::with_block(genesis),
            snapshots: BTreeMap::new(),
            next_snapshot_id: U256::ZERO,
            artifacts: Vec::new(),
            accounts: vec![DEV_ACCOUNT],
            storage_writes: true,
        };
        Self { inner: Mutex::new(inner) }
    }

    /// Disables `hardhat_setStorageAt`, like a production node that lacks the method.
    pub fn deny_storage_writes(self) -> Self {
        self.inner.lock().storage_writes = false;
        self
    }

    /// Registers `contract` as the code created by `init_code`.
    pub fn register(&self, init_code: impl Into<Bytes>, contract: Arc<dyn NativeContract>) {
        let init_code = init_code.into();
        let code = Code { hash: keccak256(&init_code), contract };
        self.inner.lock().artifacts.push(Artifact { init_code, code });
    }

    /// Places the contract created by `init_code` at `address` and runs its constructor, without
    /// mining a block. Used to set up pre-existing protocol contracts.
    pub fn install(&self, address: Address, init_code: &[u8]) -> LedgerResult<()> {
        let mut inner = self.inner.lock();
        let (code, args) = inner.resolve(init_code)?;
        let mut scratch = inner.state.clone();
        instantiate(&mut scratch, address, DEV_ACCOUNT, code, args)
            .map_err(|revert| LedgerError::Reverted(revert.0))?;
        inner.state = scratch;
        Ok(())
    }

    /// Sets the native balance of `address`.
    pub fn set_balance(&self, address: Address, balance: U256) {
        self.inner.lock().state.accounts.entry(address).or_default().balance = balance;
    }

    /// Returns the native balance of `address`.
    pub fn balance(&self, address: Address) -> U256 {
        let inner = self.inner.lock();
        inner.state.accounts.get(&address).map(|account| account.balance).unwrap_or_default()
    }

    /// Returns a comparable view of the entire ledger state.
    pub fn dump(&self) -> StateDump {
        self.inner.lock().state.dump()
    }

    /// Number of snapshots that can still be reverted to.
    pub fn active_snapshots(&self) -> usize {
        self.inner.lock().snapshots.len()
    }
}

#[derive(Clone, Debug)]
struct Artifact {
    init_code: Bytes,
    code: Code,
}

#[derive(Debug)]
struct Inner {
    state: State,
    snapshots: BTreeMap<U256, State>,
    next_snapshot_id: U256,
    artifacts: Vec<Artifact>,
    accounts: Vec<Address>,
    storage_writes: bool,
}

impl Inner {
    /// Finds the registered artifact with the longest init code prefixing `init_code`, and the
    /// remaining constructor arguments.
    fn resolve<'a>(&self, init_code: &'a [u8]) -> LedgerResult<(Code, &'a [u8])> {
        self.artifacts
            .iter()
            .filter(|artifact| init_code.starts_with(&artifact.init_code))
            .max_by_key(|artifact| artifact.init_code.len())
            .map(|artifact| (artifact.code.clone(), &init_code[artifact.init_code.len()..]))
            .ok_or_else(|| {
                LedgerError::rejected(
                    "eth_sendTransaction",
                    format!("no native contract registered for init code of {} bytes", init_code.len()),
                )
            })
    }

    /// Mines a block holding one transaction from `from`. State changes made by `f` are only
    /// committed if it succeeds; the nonce is consumed either way.
    fn transact_with<T>(
        &mut self,
        from: Address,
        f: impl FnOnce(&mut State) -> CallResult<T>,
    ) -> LedgerResult<T> {
        self.state.mine_block();
        self.state.bump_nonce(from);
        let mut scratch = self.state.clone();
        let out = f(&mut scratch).map_err(|revert| LedgerError::Reverted(revert.0))?;
        self.state = scratch;
        Ok(out)
    }

    fn snapshot(&mut self) -> U256 {
        let id = self.next_snapshot_id;
        self.snapshots.insert(id, self.state.clone());
        self.next_snapshot_id += U256::ONE;
        trace!(target: "ledger", %id, block = self.state.block.number, "created snapshot");
        id
    }

    fn revert(&mut self, id: U256) -> bool {
        let Some(state) = self.snapshots.remove(&id) else {
            trace!(target: "ledger", %id, "unknown snapshot");
            return false;
        };
        // later snapshots describe a history that no longer exists
        self.snapshots.retain(|other, _| *other < id);
        self.state = state;
        trace!(target: "ledger", %id, block = self.state.block.number, "reverted to snapshot");
        true
    }

    fn set_next_block_timestamp(&mut self, timestamp: u64) -> LedgerResult<()> {
        let parent = self.state.block.timestamp;
        if timestamp <= parent {
            return Err(LedgerError::rejected(
                "evm_setNextBlockTimestamp",
                format!(
                    "Timestamp error: {timestamp} is lower than or equal to previous block's timestamp {parent}"
                ),
            ));
        }
        self.state.clock.next_timestamp = Some(timestamp);
        Ok(())
    }

    fn set_storage_at(&mut self, address: Address, slot: B256, value: B256) -> LedgerResult<()> {
        if !self.storage_writes {
            return Err(LedgerError::rejected("hardhat_setStorageAt", "Method not found"));
        }
        self.state.set_storage(address, slot, U256::from_be_bytes(value.0));
        Ok(())
    }

    fn deploy(&mut self, from: Address, init_code: &[u8]) -> LedgerResult<Address> {
        let (code, args) = self.resolve(init_code)?;
        let address = from.create(self.state.nonce(from));
        self.transact_with(from, |state| instantiate(state, address, from, code, args))?;
        debug!(target: "ledger", %address, %from, "deployed contract");
        Ok(address)
    }
}

/// Sets the code of `address` and runs the constructor.
fn instantiate(
    state: &mut State,
    address: Address,
    deployer: Address,
    code: Code,
    args: &[u8],
) -> CallResult<()> {
    let contract = code.contract.clone();
    let account = state.accounts.entry(address).or_default();
    // EIP-161: contract nonces start at 1
    account.nonce = 1;
    account.code = Some(code);
    contract.construct(&mut CallContext::new(state, address, deployer), args)
}

#[async_trait::async_trait]
impl Ledger for MemoryLedger {
    async fn snapshot(&self) -> LedgerResult<U256> {
        Ok(self.inner.lock().snapshot())
    }

    async fn revert(&self, id: U256) -> LedgerResult<bool> {
        Ok(self.inner.lock().revert(id))
    }

    async fn increase_time(&self, seconds: u64) -> LedgerResult<()> {
        let mut inner = self.inner.lock();
        inner.state.clock.offset = inner.state.clock.offset.saturating_add(seconds);
        Ok(())
    }

    async fn set_next_block_timestamp(&self, timestamp: u64) -> LedgerResult<()> {
        self.inner.lock().set_next_block_timestamp(timestamp)
    }

    async fn mine(&self, blocks: u64) -> LedgerResult<()> {
        let mut inner = self.inner.lock();
        for _ in 0..blocks {
            inner.state.mine_block();
        }
        Ok(())
    }

    async fn block(&self) -> LedgerResult<BlockInfo> {
        Ok(self.inner.lock().state.block)
    }

    async fn storage_at(&self, address: Address, slot: B256) -> LedgerResult<B256> {
        let value = self.inner.lock().state.storage(address, slot);
        Ok(B256::from(value.to_be_bytes::<32>()))
    }

    async fn set_storage_at(&self, address: Address, slot: B256, value: B256) -> LedgerResult<()> {
        self.inner.lock().set_storage_at(address, slot, value)
    }

    async fn accounts(&self) -> LedgerResult<Vec<Address>> {
        Ok(self.inner.lock().accounts.clone())
    }

    async fn deploy(&self, from: Address, init_code: Bytes) -> LedgerResult<Address> {
        self.inner.lock().deploy(from, &init_code)
    }

    async fn call(&self, from: Address, to: Address, input: Bytes) -> LedgerResult<Bytes> {
        // calls run against a scratch copy that is thrown away
        let mut scratch = self.inner.lock().state.clone();
        let Some(code) = scratch.code(to) else { return Ok(Bytes::new()) };
        code.call(&mut CallContext::new(&mut scratch, to, from), &input)
            .map_err(|revert| LedgerError::Reverted(revert.0))
    }

    async fn transact(&self, from: Address, to: Address, input: Bytes) -> LedgerResult<()> {
        self.inner.lock().transact_with(from, |state| match state.code(to) {
            Some(code) => code.call(&mut CallContext::new(state, to, from), &input).map(drop),
            None => Ok(()),
        })
    }
}
