use super::RpcOpts;
use alloy_primitives::Address;
use ante_harness::{
    ProbeConfig, SlotResolver, SnapshotManager,
    config::HarnessConfig,
    slots::{DEFAULT_CEILING, MappingLayout},
};
use ante_ledger::RpcLedger;
use clap::Parser;
use eyre::Result;

/// CLI arguments for `ante slot`.
#[derive(Clone, Debug, Parser)]
pub struct SlotArgs {
    /// The token contract.
    pub token: Address,

    /// The account whose balance slot to find.
    pub holder: Address,

    /// Number of mapping indices to try per layout.
    #[arg(long, default_value_t = DEFAULT_CEILING)]
    pub ceiling: u64,

    /// Preimage layouts to try, in order.
    #[arg(
        long = "layout",
        value_delimiter = ',',
        default_values_t = [MappingLayout::IndexFirst, MappingLayout::KeyFirst]
    )]
    pub layouts: Vec<MappingLayout>,

    #[command(flatten)]
    pub rpc: RpcOpts,
}

impl SlotArgs {
    pub async fn run(self) -> Result<()> {
        let Self { token, holder, ceiling, layouts, rpc } = self;
        let url = rpc.url.unwrap_or_else(|| HarnessConfig::default().rpc_url);
        let ledger = RpcLedger::connect_http(&url)?;
        let config = ProbeConfig { ceiling, layouts, mine_after_write: false };

        let mut snapshots = SnapshotManager::new(&ledger);
        let snapshot = snapshots.capture().await?;
        let located = SlotResolver::new(&ledger, &config).locate(token, holder).await;
        snapshots.restore(snapshot).await?;

        match located? {
            Some(location) => {
                println!("{}", location.slot);
                info!(layout = %location.layout, index = location.index, "located balance slot");
                Ok(())
            }
            None => eyre::bail!(
                "no balance slot for {holder} found in {token} below mapping index {ceiling}"
            ),
        }
    }
}
