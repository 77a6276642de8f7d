//! Forging ERC20 balances by writing raw storage.
//!
//! A `mapping(address => uint256)` declared at index `i` stores the value for `key` at
//! `keccak256(abi.encode(i, key))` in Vyper, or `keccak256(abi.encode(key, i))` in Solidity. The
//! declaration index of a token's balance mapping is rarely known, so the resolver writes the
//! value at every candidate index below a ceiling. Writes at wrong indices land in slots nothing
//! reads and are undone by the surrounding snapshot.

use crate::{HarnessError, Result, abi::IERC20};
use alloy_primitives::{Address, B256, U256, keccak256};
use alloy_sol_types::{SolCall, SolValue};
use ante_ledger::{Ledger, LedgerError};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Default number of mapping indices probed.
pub const DEFAULT_CEILING: u64 = 256;

/// How a mapping slot is derived from the declaration index and the key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingLayout {
    /// `keccak256(abi.encode(index, key))`, as laid out by Vyper.
    #[default]
    IndexFirst,
    /// `keccak256(abi.encode(key, index))`, as laid out by Solidity.
    KeyFirst,
}

impl MappingLayout {
    /// Returns the storage slot of `key` in the mapping declared at `index`.
    pub fn slot(self, index: U256, key: Address) -> B256 {
        let preimage = match self {
            Self::IndexFirst => (index, key).abi_encode(),
            Self::KeyFirst => (key, index).abi_encode(),
        };
        keccak256(preimage)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IndexFirst => "index_first",
            Self::KeyFirst => "key_first",
        }
    }
}

impl fmt::Display for MappingLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MappingLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "index_first" | "index-first" | "vyper" => Ok(Self::IndexFirst),
            "key_first" | "key-first" | "solidity" => Ok(Self::KeyFirst),
            _ => Err(format!("unknown mapping layout `{s}`, expected `index_first` or `key_first`")),
        }
    }
}

/// Tuning for the brute-force probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Mapping indices `0..ceiling` are written.
    pub ceiling: u64,
    /// Layouts to write, in order.
    pub layouts: Vec<MappingLayout>,
    /// Mine a block after every write, for nodes that only expose storage changes once mined.
    pub mine_after_write: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { ceiling: DEFAULT_CEILING, layouts: vec![MappingLayout::IndexFirst], mine_after_write: false }
    }
}

/// Summary of a brute-force write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForgeReport {
    pub target: Address,
    pub beneficiary: Address,
    pub value: U256,
    pub slots_written: u64,
}

/// A forge followed by a read of the beneficiary's balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Confirmation {
    pub report: ForgeReport,
    pub observed: U256,
}

impl Confirmation {
    /// Whether the token now reports the forged value.
    pub fn is_confirmed(&self) -> bool {
        self.observed == self.report.value
    }
}

/// Where a holder's balance actually lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLocation {
    pub layout: MappingLayout,
    pub index: u64,
    pub slot: B256,
}

/// Writes forged balances into token contracts.
#[derive(Debug)]
pub struct SlotResolver<'a, L: ?Sized> {
    ledger: &'a L,
    config: &'a ProbeConfig,
}

impl<'a, L: Ledger + ?Sized> SlotResolver<'a, L> {
    pub fn new(ledger: &'a L, config: &'a ProbeConfig) -> Self {
        Self { ledger, config }
    }

    /// Writes `value` for `beneficiary` at every candidate mapping slot of `target`.
    ///
    /// The first rejected write aborts the probe with [`HarnessError::StorageWriteRejected`];
    /// writes made before it are left in place for the caller's snapshot to undo.
    pub async fn forge_balance(
        &self,
        target: Address,
        beneficiary: Address,
        value: U256,
    ) -> Result<ForgeReport> {
        let word = B256::from(value.to_be_bytes::<32>());
        let mut slots_written = 0;
        for &layout in &self.config.layouts {
            for index in 0..self.config.ceiling {
                let slot = layout.slot(U256::from(index), beneficiary);
                self.write(target, slot, word).await?;
                slots_written += 1;
            }
        }
        debug!(target: "slots", %target, %beneficiary, %value, slots_written, "forged balance");
        Ok(ForgeReport { target, beneficiary, value, slots_written })
    }

    /// Forges a balance and reads it back through `balanceOf`.
    pub async fn forge_and_confirm(
        &self,
        token: Address,
        beneficiary: Address,
        value: U256,
    ) -> Result<Confirmation> {
        let report = self.forge_balance(token, beneficiary, value).await?;
        let observed = self.balance_of(token, beneficiary).await?;
        if observed != value {
            warn!(target: "slots", %token, %beneficiary, %value, %observed, "forged balance not observed");
        }
        Ok(Confirmation { report, observed })
    }

    /// Finds the slot holding `holder`'s balance without disturbing any other storage.
    ///
    /// Each candidate slot is overwritten with a sentinel, checked through `balanceOf`, and put
    /// back before the next candidate is tried. Returns `None` if no candidate below the ceiling
    /// matches.
    pub async fn locate(&self, token: Address, holder: Address) -> Result<Option<SlotLocation>> {
        let current = self.balance_of(token, holder).await?;
        let mut sentinel = U256::from_be_bytes(keccak256("ante.slots.sentinel").0);
        if sentinel == current {
            sentinel -= U256::ONE;
        }
        let sentinel_word = B256::from(sentinel.to_be_bytes::<32>());

        for &layout in &self.config.layouts {
            for index in 0..self.config.ceiling {
                let slot = layout.slot(U256::from(index), holder);
                let previous = self.ledger.storage_at(token, slot).await?;
                self.write(token, slot, sentinel_word).await?;
                let observed = self.balance_of(token, holder).await;
                self.write(token, slot, previous).await?;

                match observed {
                    Ok(observed) if observed == sentinel => {
                        debug!(target: "slots", %token, %holder, %layout, index, "located balance slot");
                        return Ok(Some(SlotLocation { layout, index, slot }));
                    }
                    Ok(_) | Err(HarnessError::Ledger(LedgerError::Reverted(_))) => {}
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(None)
    }

    /// Calls `balanceOf(holder)` on `token`.
    pub async fn balance_of(&self, token: Address, holder: Address) -> Result<U256> {
        let input = IERC20::balanceOfCall { account: holder }.abi_encode();
        let output = self.ledger.call(Address::ZERO, token, input.into()).await?;
        U256::abi_decode(&output).map_err(|source| HarnessError::Decode {
            function: IERC20::balanceOfCall::SIGNATURE.to_string(),
            source,
        })
    }

    async fn write(&self, target: Address, slot: B256, value: B256) -> Result<()> {
        trace!(target: "slots", %target, %slot, %value, "setStorageAt");
        self.ledger
            .set_storage_at(target, slot, value)
            .await
            .map_err(|source| HarnessError::StorageWriteRejected { target, slot, source })?;
        if self.config.mine_after_write {
            self.ledger.mine(1).await?;
        }
        Ok(())
    }
}
