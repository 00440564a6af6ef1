#[macro_use]
extern crate tracing;

mod args;
mod cmd;
mod opts;
mod utils;

use args::{StorageArgs, StorageSubcommand};
use clap::Parser;
use eyre::Result;

fn main() -> Result<()> {
    utils::install_error_handler();
    utils::subscriber();
    utils::enable_paint();

    let opts = StorageArgs::parse();

    match opts.cmd {
        StorageSubcommand::Layout(cmd) => utils::block_on(cmd.run()),
        StorageSubcommand::Decode(cmd) => utils::block_on(cmd.run()),
    }
}
