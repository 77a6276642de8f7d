//! JSON-RPC backed ledger.

use crate::{BlockInfo, Ledger, LedgerError, LedgerResult};
use alloy_json_rpc::{RpcRecv, RpcSend};
use alloy_network::{ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::{BlockNumberOrTag, TransactionReceipt, TransactionRequest};
use serde_json::Value;
use std::fmt;
use url::Url;

/// A [`Ledger`] talking to a dev node (Anvil, Hardhat) over JSON-RPC.
///
/// Only the `evm_*` and `hardhat_setStorageAt` methods are used for privileged operations, which
/// Anvil and Hardhat both serve.
#[derive(Clone)]
pub struct RpcLedger {
    provider: DynProvider,
    endpoint: Url,
}

impl fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcLedger").field("endpoint", &self.endpoint.as_str()).finish()
    }
}

impl RpcLedger {
    /// Connects to the HTTP endpoint at `url`.
    ///
    /// `localhost:8545` style URLs without a scheme are accepted.
    pub fn connect_http(url: &str) -> LedgerResult<Self> {
        let url = if url.starts_with("localhost:") { format!("http://{url}") } else { url.into() };
        let endpoint = Url::parse(&url)
            .map_err(|err| LedgerError::Unavailable(format!("invalid RPC URL {url:?}: {err}")))?;
        let provider = ProviderBuilder::new().connect_http(endpoint.clone()).erased();
        Ok(Self { provider, endpoint })
    }

    /// The endpoint this ledger is connected to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn request<P, R>(&self, method: &'static str, params: P) -> LedgerResult<R>
    where
        P: RpcSend,
        R: RpcRecv,
    {
        trace!(target: "ledger", %method, "request");
        self.provider
            .raw_request::<P, R>(method.into(), params)
            .await
            .map_err(|err| LedgerError::from_transport(method, err))
    }

    async fn send(&self, tx: TransactionRequest) -> LedgerResult<TransactionReceipt> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|err| LedgerError::from_transport("eth_sendTransaction", err))?;
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|err| LedgerError::rejected("eth_getTransactionReceipt", err.to_string()))?;
        if !receipt.status() {
            return Err(LedgerError::Reverted(format!(
                "transaction {} reverted",
                receipt.transaction_hash()
            )));
        }
        Ok(receipt)
    }
}

#[async_trait::async_trait]
impl Ledger for RpcLedger {
    async fn snapshot(&self) -> LedgerResult<U256> {
        self.request("evm_snapshot", ()).await
    }

    async fn revert(&self, id: U256) -> LedgerResult<bool> {
        self.request("evm_revert", (id,)).await
    }

    async fn increase_time(&self, seconds: u64) -> LedgerResult<()> {
        self.request::<_, Value>("evm_increaseTime", (U256::from(seconds),)).await?;
        Ok(())
    }

    async fn set_next_block_timestamp(&self, timestamp: u64) -> LedgerResult<()> {
        self.request::<_, Value>("evm_setNextBlockTimestamp", (U256::from(timestamp),)).await?;
        Ok(())
    }

    async fn mine(&self, blocks: u64) -> LedgerResult<()> {
        // `evm_mine` without arguments is the one form every dev node agrees on
        for _ in 0..blocks {
            self.request::<_, Value>("evm_mine", ()).await?;
        }
        Ok(())
    }

    async fn block(&self) -> LedgerResult<BlockInfo> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|err| LedgerError::from_transport("eth_getBlockByNumber", err))?
            .ok_or_else(|| {
                LedgerError::rejected("eth_getBlockByNumber", "latest block not found")
            })?;
        Ok(BlockInfo { number: block.header.number, timestamp: block.header.timestamp })
    }

    async fn storage_at(&self, address: Address, slot: B256) -> LedgerResult<B256> {
        let value = self
            .provider
            .get_storage_at(address, U256::from_be_bytes(slot.0))
            .await
            .map_err(|err| LedgerError::from_transport("eth_getStorageAt", err))?;
        Ok(B256::from(value.to_be_bytes::<32>()))
    }

    async fn set_storage_at(&self, address: Address, slot: B256, value: B256) -> LedgerResult<()> {
        self.request::<_, Value>(
            "hardhat_setStorageAt",
            (address, U256::from_be_bytes(slot.0), value),
        )
        .await?;
        Ok(())
    }

    async fn accounts(&self) -> LedgerResult<Vec<Address>> {
        self.provider
            .get_accounts()
            .await
            .map_err(|err| LedgerError::from_transport("eth_accounts", err))
    }

    async fn deploy(&self, from: Address, init_code: Bytes) -> LedgerResult<Address> {
        let tx = TransactionRequest::default().with_from(from).with_deploy_code(init_code);
        let receipt = self.send(tx).await?;
        receipt.contract_address().ok_or_else(|| {
            LedgerError::rejected("eth_sendTransaction", "receipt has no contract address")
        })
    }

    async fn call(&self, from: Address, to: Address, input: Bytes) -> LedgerResult<Bytes> {
        let tx = TransactionRequest::default().with_from(from).with_to(to).with_input(input);
        self.provider.call(tx).await.map_err(|err| LedgerError::from_transport("eth_call", err))
    }

    async fn transact(&self, from: Address, to: Address, input: Bytes) -> LedgerResult<()> {
        let tx = TransactionRequest::default().with_from(from).with_to(to).with_input(input);
        self.send(tx).await?;
        Ok(())
    }
}
