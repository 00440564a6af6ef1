use crate::cmd::{decode::DecodeArgs, layout::LayoutArgs};
use clap::{Parser, Subcommand};

/// Storage inspector of EDB: the EVM Project Debugger.
#[derive(Parser, Debug)]
#[command(
    name = "edb-storage",
    version,
    after_help = "Find more information in our homepage: https://medga.org/",
    next_display_order = None,
)]
pub struct StorageArgs {
    #[command(subcommand)]
    pub cmd: StorageSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum StorageSubcommand {
    /// Print where each state variable of a contract lives in storage.
    #[command(visible_alias = "l")]
    Layout(LayoutArgs),

    /// Decode a storage snapshot of a contract into typed values.
    #[command(visible_alias = "d")]
    Decode(DecodeArgs),
}
