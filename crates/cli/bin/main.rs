#[macro_use]
extern crate tracing;

use ante_cli::{handler, utils};
use clap::Parser;
use eyre::Result;

mod cmd;

mod opts;
use opts::{Ante, AnteSubcommand};

fn main() -> Result<()> {
    handler::install();
    let args = Ante::parse();
    utils::subscriber(args.verbosity);
    utils::block_on(main_args(args))?
}

async fn main_args(args: Ante) -> Result<()> {
    match args.cmd {
        AnteSubcommand::Test(cmd) => {
            let outcome = cmd.run().await?;
            outcome.ensure_ok()
        }
        AnteSubcommand::Slot(cmd) => cmd.run().await,
        AnteSubcommand::Index { holder, index, layout } => {
            println!("{}", layout.slot(index, holder));
            Ok(())
        }
    }
}
