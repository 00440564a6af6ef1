use std::path::PathBuf;

use clap::Parser;
use edb_storage::SourceForest;
use eyre::{ensure, Result, WrapErr};

#[derive(Clone, Debug, Parser)]
pub struct SourceOpts {
    /// AST files: solc standard-JSON output, a single `SourceUnit`, or an array of them.
    ///
    /// Legacy ASTs (solc < 0.5) are accepted as well.
    #[arg(long, short = 'a', required = true, num_args = 1.., value_name = "FILE")]
    pub ast: Vec<PathBuf>,

    /// The contract to inspect, either `Name` or `path/to/File.sol:Name`.
    #[arg(long, short = 'c', value_name = "CONTRACT")]
    pub contract: String,
}

impl SourceOpts {
    /// Reads every AST file into one source forest.
    pub async fn load_forest(&self) -> Result<SourceForest> {
        let mut forest = SourceForest::default();
        for path in &self.ast {
            let json = tokio::fs::read_to_string(path)
                .await
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            let units = SourceForest::from_json_str(&json)
                .wrap_err_with(|| format!("failed to load the AST in {}", path.display()))?;
            debug!("loaded {} source units from {}", units.units().len(), path.display());
            forest.extend(units);
        }

        ensure!(!forest.is_empty(), "no source units found in the given AST files");
        Ok(forest)
    }
}
