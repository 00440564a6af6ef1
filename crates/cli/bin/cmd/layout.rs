use clap::Parser;
use edb_storage::{Footprint, StorageDecoder};
use eyre::Result;
use yansi::Paint;

use crate::opts::SourceOpts;

/// CLI arguments for `edb-storage layout`.
#[derive(Clone, Debug, Parser)]
pub struct LayoutArgs {
    #[command(flatten)]
    pub source: SourceOpts,
}

impl LayoutArgs {
    pub async fn run(self) -> Result<()> {
        let forest = self.source.load_forest().await?;
        let decoder = StorageDecoder::new(forest);
        let layout = decoder.layout(&self.source.contract)?;

        println!("{}", format!("Storage layout of {}", layout.contract).bold());
        println!("{:>8}  {:>6}  {:<10}  {}", "slot", "offset", "bytes", "variable");
        for variable in &layout.variables {
            let width = match variable.footprint() {
                Footprint::Packed(size) => format!("{size}"),
                footprint => format!("{} (own)", footprint.bytes()),
            };
            let type_name = variable.type_name();
            let type_name = match &variable.ty {
                Ok(_) => type_name.cyan(),
                Err(_) => type_name.red(),
            };

            println!(
                "{:>8}  {:>6}  {:<10}  {} {}",
                variable.location.slot.to_string(),
                variable.location.offset,
                width,
                type_name,
                variable.name.bold()
            );
            if let Err(err) = &variable.ty {
                println!("{:>30}{}", "", err.yellow());
            }
        }

        Ok(())
    }
}
