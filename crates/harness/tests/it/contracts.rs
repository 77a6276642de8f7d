//! Native stand-ins for a token, a yield vault and Ante tests written against them.

use alloy_primitives::{Address, B256, Bytes, U256, address};
use alloy_sol_types::{SolCall, SolValue, sol};
use ante_harness::MappingLayout;
use ante_ledger::{CallContext, Ledger, MemoryLedger, NativeContract, Revert, memory::CallResult};
use std::sync::Arc;

sol! {
    interface IToken {
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    interface IVault {
        function withdraw() external returns (uint256);
    }

    interface IWithdrawCheck {
        function withdraw() external;
        function checkTestPasses() external returns (bool);
    }
}

pub const TOKEN: Address = address!("0x00000000000000000000000000000000000000aa");
pub const VAULT: Address = address!("0x00000000000000000000000000000000000000bb");

pub const TOKEN_CODE: &[u8] = b"mock-token";
pub const VAULT_CODE: &[u8] = b"mock-vault";
pub const CHECK_CODE: &[u8] = b"withdraw-check";
pub const PASS_CODE: &[u8] = b"always-pass";
pub const FAIL_CODE: &[u8] = b"always-fail";
pub const BROKEN_CODE: &[u8] = b"broken";

/// Where the token keeps balances.
pub const TOKEN_LAYOUT: (MappingLayout, u64) = (MappingLayout::KeyFirst, 0);
/// Where the vault keeps shares, like a Vyper vault.
pub const VAULT_LAYOUT: (MappingLayout, u64) = (MappingLayout::IndexFirst, 3);

/// Seconds a withdrawal must age before the withdraw check passes.
pub const WITHDRAW_DELAY: u64 = 960;

fn decode<C: SolCall>(input: &[u8]) -> CallResult<C> {
    C::abi_decode(input).map_err(|err| Revert::new(err.to_string()))
}

fn selector(input: &[u8]) -> CallResult<[u8; 4]> {
    input
        .split_first_chunk::<4>()
        .map(|(selector, _)| *selector)
        .ok_or_else(|| Revert::new("no selector"))
}

fn word(address: Address) -> B256 {
    address.into_word()
}

fn address_at(ctx: &CallContext<'_>, slot: u64) -> Address {
    Address::from_word(B256::from(ctx.sload(B256::from(U256::from(slot))).to_be_bytes::<32>()))
}

fn balance_of(ctx: &mut CallContext<'_>, token: Address, account: Address) -> CallResult<U256> {
    let output = ctx.call(token, &IToken::balanceOfCall { account }.abi_encode())?;
    U256::abi_decode(&output).map_err(|err| Revert::new(err.to_string()))
}

/// An ERC20 balance mapping declared at a configurable index.
#[derive(Debug)]
pub struct MockToken {
    pub layout: MappingLayout,
    pub index: u64,
}

impl MockToken {
    pub fn new((layout, index): (MappingLayout, u64)) -> Self {
        Self { layout, index }
    }

    fn slot(&self, account: Address) -> B256 {
        self.layout.slot(U256::from(self.index), account)
    }
}

impl NativeContract for MockToken {
    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> CallResult {
        let selector = selector(input)?;
        if selector == IToken::balanceOfCall::SELECTOR {
            let call = decode::<IToken::balanceOfCall>(input)?;
            Ok(ctx.sload(self.slot(call.account)).abi_encode().into())
        } else if selector == IToken::transferCall::SELECTOR {
            let call = decode::<IToken::transferCall>(input)?;
            let from = self.slot(ctx.caller());
            let balance = ctx.sload(from);
            if balance < call.amount {
                return Err(Revert::new("insufficient balance"));
            }
            ctx.sstore(from, balance - call.amount);
            let to = self.slot(call.to);
            let credited = ctx.sload(to) + call.amount;
            ctx.sstore(to, credited);
            Ok(true.abi_encode().into())
        } else {
            Err(Revert::new("unknown selector"))
        }
    }
}

/// Vault shares redeemable one-to-one for the underlying token. The constructor takes the
/// underlying token's address.
#[derive(Debug)]
pub struct MockVault;

impl MockVault {
    fn slot(account: Address) -> B256 {
        VAULT_LAYOUT.0.slot(U256::from(VAULT_LAYOUT.1), account)
    }
}

impl NativeContract for MockVault {
    fn construct(&self, ctx: &mut CallContext<'_>, args: &[u8]) -> CallResult<()> {
        let token = Address::abi_decode(args).map_err(|err| Revert::new(err.to_string()))?;
        ctx.sstore(B256::ZERO, U256::from_be_bytes(word(token).0));
        Ok(())
    }

    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> CallResult {
        let selector = selector(input)?;
        if selector == IToken::balanceOfCall::SELECTOR {
            let call = decode::<IToken::balanceOfCall>(input)?;
            Ok(ctx.sload(Self::slot(call.account)).abi_encode().into())
        } else if selector == IVault::withdrawCall::SELECTOR {
            let owner = ctx.caller();
            let shares = ctx.sload(Self::slot(owner));
            if shares.is_zero() {
                return Err(Revert::new("nothing to withdraw"));
            }
            ctx.sstore(Self::slot(owner), U256::ZERO);
            let token = address_at(ctx, 0);
            ctx.call(token, &IToken::transferCall { to: owner, amount: shares }.abi_encode())?;
            Ok(shares.abi_encode().into())
        } else {
            Err(Revert::new("unknown selector"))
        }
    }
}

/// Withdraws its vault shares and passes once the withdrawal is [`WITHDRAW_DELAY`] old, as long
/// as the vault still holds underlying tokens. The constructor takes `(vault, token)`.
#[derive(Debug)]
pub struct WithdrawCheck;

impl NativeContract for WithdrawCheck {
    fn construct(&self, ctx: &mut CallContext<'_>, args: &[u8]) -> CallResult<()> {
        let (vault, token) = <(Address, Address)>::abi_decode_params(args)
            .map_err(|err| Revert::new(err.to_string()))?;
        ctx.sstore(B256::ZERO, U256::from_be_bytes(word(vault).0));
        ctx.sstore(B256::from(U256::from(1)), U256::from_be_bytes(word(token).0));
        Ok(())
    }

    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> CallResult {
        let withdrawn_at = B256::from(U256::from(2));
        let selector = selector(input)?;
        if selector == IWithdrawCheck::withdrawCall::SELECTOR {
            let vault = address_at(ctx, 0);
            ctx.call(vault, &IVault::withdrawCall {}.abi_encode())?;
            let now = U256::from(ctx.block().timestamp);
            ctx.sstore(withdrawn_at, now);
            Ok(Bytes::new())
        } else if selector == IWithdrawCheck::checkTestPassesCall::SELECTOR {
            let since = ctx.sload(withdrawn_at);
            let aged = !since.is_zero()
                && U256::from(ctx.block().timestamp) >= since + U256::from(WITHDRAW_DELAY);
            let (vault, token) = (address_at(ctx, 0), address_at(ctx, 1));
            let solvent = !balance_of(ctx, token, vault)?.is_zero();
            Ok((aged && solvent).abi_encode().into())
        } else {
            Err(Revert::new("unknown selector"))
        }
    }
}

/// A check whose predicate always returns the same value.
#[derive(Debug)]
pub struct Verdict(pub bool);

impl NativeContract for Verdict {
    fn call(&self, _ctx: &mut CallContext<'_>, input: &[u8]) -> CallResult {
        if selector(input)? == IWithdrawCheck::checkTestPassesCall::SELECTOR {
            Ok(self.0.abi_encode().into())
        } else {
            Err(Revert::new("unknown selector"))
        }
    }
}

/// A contract whose constructor always reverts.
#[derive(Debug)]
pub struct Broken;

impl NativeContract for Broken {
    fn construct(&self, _ctx: &mut CallContext<'_>, _args: &[u8]) -> CallResult<()> {
        Err(Revert::new("constructor reverted"))
    }

    fn call(&self, _ctx: &mut CallContext<'_>, _input: &[u8]) -> CallResult {
        Ok(Bytes::new())
    }
}

/// Init code of a [`WithdrawCheck`] against the installed vault.
pub fn withdraw_check_code() -> Bytes {
    [CHECK_CODE, &(VAULT, TOKEN).abi_encode_params()].concat().into()
}

/// A ledger with every mock registered, the token and the vault installed, and `reserve`
/// underlying tokens held by the vault.
pub async fn protocol(reserve: u64) -> MemoryLedger {
    let ledger = MemoryLedger::new();
    register(&ledger);
    ledger.install(TOKEN, TOKEN_CODE).unwrap();
    ledger.install(VAULT, &[VAULT_CODE, TOKEN.into_word().as_slice()].concat()).unwrap();

    let slot = TOKEN_LAYOUT.0.slot(U256::from(TOKEN_LAYOUT.1), VAULT);
    ledger.set_storage_at(TOKEN, slot, U256::from(reserve).into()).await.unwrap();
    ledger
}

pub fn register(ledger: &MemoryLedger) {
    ledger.register(TOKEN_CODE, Arc::new(MockToken::new(TOKEN_LAYOUT)));
    ledger.register(VAULT_CODE, Arc::new(MockVault));
    ledger.register(CHECK_CODE, Arc::new(WithdrawCheck));
    ledger.register(PASS_CODE, Arc::new(Verdict(true)));
    ledger.register(FAIL_CODE, Arc::new(Verdict(false)));
    ledger.register(BROKEN_CODE, Arc::new(Broken));
}
