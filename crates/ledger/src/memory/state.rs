//! The mutable state of the in-memory ledger.

use super::native::NativeContract;
use crate::BlockInfo;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, sync::Arc};

/// Deployed native code and the hash of the init code it was registered under.
#[derive(Clone)]
pub(crate) struct Code {
    pub(crate) hash: B256,
    pub(crate) contract: Arc<dyn NativeContract>,
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Code").field("hash", &self.hash).finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Account {
    pub(crate) nonce: u64,
    pub(crate) balance: U256,
    /// Zero words are never stored.
    pub(crate) storage: BTreeMap<B256, U256>,
    pub(crate) code: Option<Code>,
}

/// Pending timestamp adjustments, applied to the next mined block.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Clock {
    pub(crate) offset: u64,
    pub(crate) next_timestamp: Option<u64>,
}

/// Everything a snapshot captures.
#[derive(Clone, Debug, Default)]
pub(crate) struct State {
    pub(crate) accounts: BTreeMap<Address, Account>,
    pub(crate) block: BlockInfo,
    pub(crate) clock: Clock,
}

impl State {
    pub(crate) fn with_block(block: BlockInfo) -> Self {
        Self { block, ..Default::default() }
    }

    pub(crate) fn storage(&self, address: Address, slot: B256) -> U256 {
        self.accounts
            .get(&address)
            .and_then(|account| account.storage.get(&slot).copied())
            .unwrap_or_default()
    }

    pub(crate) fn set_storage(&mut self, address: Address, slot: B256, value: U256) {
        if value.is_zero() {
            if let Some(account) = self.accounts.get_mut(&address) {
                account.storage.remove(&slot);
            }
        } else {
            self.accounts.entry(address).or_default().storage.insert(slot, value);
        }
    }

    pub(crate) fn code(&self, address: Address) -> Option<Arc<dyn NativeContract>> {
        self.accounts.get(&address)?.code.as_ref().map(|code| code.contract.clone())
    }

    pub(crate) fn nonce(&self, address: Address) -> u64 {
        self.accounts.get(&address).map(|account| account.nonce).unwrap_or_default()
    }

    pub(crate) fn bump_nonce(&mut self, address: Address) {
        self.accounts.entry(address).or_default().nonce += 1;
    }

    /// Seals a new block, consuming the pending clock adjustments.
    ///
    /// Timestamps strictly increase: without an adjustment the block is one second after its
    /// parent.
    pub(crate) fn mine_block(&mut self) {
        let parent = self.block.timestamp;
        let timestamp = match self.clock.next_timestamp.take() {
            Some(timestamp) => timestamp,
            None => parent.saturating_add(self.clock.offset.max(1)),
        };
        self.clock.offset = 0;
        self.block = BlockInfo { number: self.block.number + 1, timestamp };
    }

    pub(crate) fn dump(&self) -> StateDump {
        StateDump {
            block: self.block,
            accounts: self
                .accounts
                .iter()
                .map(|(address, account)| {
                    let dump = AccountDump {
                        nonce: account.nonce,
                        balance: account.balance,
                        code_hash: account.code.as_ref().map(|code| code.hash),
                        storage: account.storage.clone(),
                    };
                    (*address, dump)
                })
                .collect(),
        }
    }
}

/// A serializable view of the whole ledger, comparable for equality.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDump {
    pub block: BlockInfo,
    pub accounts: BTreeMap<Address, AccountDump>,
}

/// A serializable view of one account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDump {
    pub nonce: u64,
    pub balance: U256,
    pub code_hash: Option<B256>,
    pub storage: BTreeMap<B256, U256>,
}
