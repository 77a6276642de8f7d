use crate::cmd::{slot::SlotArgs, test::TestArgs};
use alloy_primitives::{Address, U256};
use ante_harness::slots::MappingLayout;
use clap::{ArgAction, Parser, Subcommand};

/// Run on-chain invariant checks against a dev node.
#[derive(Parser)]
#[command(name = "ante", version, next_display_order = None)]
pub struct Ante {
    /// Verbosity of the log output.
    ///
    /// Pass multiple times to increase the verbosity (e.g. -v, -vv, -vvv).
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub verbosity: u8,

    #[command(subcommand)]
    pub cmd: AnteSubcommand,
}

#[derive(Subcommand)]
pub enum AnteSubcommand {
    /// Deploy, prime and assert every configured check.
    #[command(visible_alias = "t")]
    Test(TestArgs),

    /// Find the storage slot holding an account's token balance.
    ///
    /// The probe runs inside a snapshot, the node is left as it was found.
    #[command(visible_alias = "sl")]
    Slot(SlotArgs),

    /// Compute the storage slot of an address key in a `mapping(address => uint256)`.
    #[command(visible_alias = "in")]
    Index {
        /// The mapping key.
        holder: Address,

        /// The declaration index of the mapping.
        index: U256,

        /// Argument order of the slot preimage.
        #[arg(long, default_value_t = MappingLayout::IndexFirst)]
        layout: MappingLayout,
    },
}
