//! Subcommands of the `ante` binary.

pub mod slot;
pub mod test;

use clap::Parser;

/// Connection options shared by the subcommands that talk to a node.
#[derive(Clone, Debug, Default, Parser)]
#[command(next_help_heading = "RPC options")]
pub struct RpcOpts {
    /// The RPC endpoint of the dev node.
    #[arg(long = "rpc-url", short = 'r', env = "ETH_RPC_URL", value_name = "URL")]
    pub url: Option<String>,
}
