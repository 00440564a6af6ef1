use std::path::PathBuf;

use clap::Parser;
use edb_storage::{StorageDecoder, StorageSnapshot};
use eyre::{Result, WrapErr};
use serde::Serialize;

use crate::opts::{ConfigOpts, SourceOpts};

/// CLI arguments for `edb-storage decode`.
#[derive(Clone, Debug, Parser)]
pub struct DecodeArgs {
    #[command(flatten)]
    pub source: SourceOpts,

    /// The storage snapshot: a `{ "<slot>": "<word>" }` JSON object, or the result of
    /// `debug_storageRangeAt`.
    #[arg(long, short = 's', value_name = "FILE")]
    pub storage: PathBuf,

    /// Decode only this state variable.
    #[arg(long, short = 'v', value_name = "NAME")]
    pub variable: Option<String>,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pub pretty: bool,

    #[command(flatten)]
    pub config: ConfigOpts,
}

impl DecodeArgs {
    pub async fn run(self) -> Result<()> {
        let forest = self.source.load_forest().await?;
        let config = self.config.load().await?;

        let json = tokio::fs::read_to_string(&self.storage)
            .await
            .wrap_err_with(|| format!("failed to read {}", self.storage.display()))?;
        let snapshot = StorageSnapshot::from_json_str(&json)
            .wrap_err_with(|| format!("failed to load the snapshot in {}", self.storage.display()))?;

        let decoder = StorageDecoder::with_config(forest, config);
        let contract = &self.source.contract;
        match &self.variable {
            Some(name) => {
                let variable = decoder.decode_variable(contract, name, &snapshot)?;
                self.print(&variable)
            }
            None => {
                let state = decoder.decode_state(contract, &snapshot)?;
                for variable in state.errors() {
                    warn!("could not decode {}: {}", variable.name, variable.value);
                }
                self.print(&state)
            }
        }
    }

    fn print<T: Serialize>(&self, value: &T) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        println!("{json}");
        Ok(())
    }
}
