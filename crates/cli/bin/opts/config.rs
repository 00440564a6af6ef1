use std::path::PathBuf;

use clap::Parser;
use edb_storage::{DecoderConfig, StringEncoding};
use eyre::{Result, WrapErr};

#[derive(Clone, Debug, Default, Parser)]
pub struct ConfigOpts {
    /// A TOML file with decoder settings. Flags below take precedence over it.
    #[arg(long, env = "EDB_STORAGE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// How short and long `bytes`/`string` values are told apart.
    ///
    /// `low-bit` checks the lowest bit of the header word, `slot-presence` checks whether the
    /// snapshot holds the first data word.
    #[arg(long, value_name = "ENCODING")]
    pub string_encoding: Option<StringEncoding>,

    /// Decode at most this many elements of each array.
    #[arg(long, value_name = "COUNT")]
    pub max_array_elements: Option<usize>,

    /// Read at most this many bytes of each `bytes`/`string` value.
    #[arg(long, value_name = "BYTES")]
    pub max_bytes_length: Option<usize>,
}

impl ConfigOpts {
    pub async fn load(&self) -> Result<DecoderConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let toml = tokio::fs::read_to_string(path)
                    .await
                    .wrap_err_with(|| format!("failed to read {}", path.display()))?;
                DecoderConfig::from_toml_str(&toml)
                    .wrap_err_with(|| format!("failed to load config from {}", path.display()))?
            }
            None => DecoderConfig::default(),
        };

        if let Some(string_encoding) = self.string_encoding {
            config = config.with_string_encoding(string_encoding);
        }
        if let Some(max_array_elements) = self.max_array_elements {
            config = config.with_max_array_elements(max_array_elements);
        }
        if let Some(max_bytes_length) = self.max_bytes_length {
            config = config.with_max_bytes_length(max_bytes_length);
        }

        trace!(?config, "decoder config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.toml");
        std::fs::write(&path, "string-encoding = \"slot-presence\"\nmax-bytes-length = 64\n")
            .unwrap();

        let opts = ConfigOpts {
            config: Some(path),
            string_encoding: Some(StringEncoding::LowBit),
            ..Default::default()
        };
        let config = opts.load().await.unwrap();
        assert_eq!(config.string_encoding, StringEncoding::LowBit);
        assert_eq!(config.max_bytes_length, 64);
        assert_eq!(config.max_array_elements, DecoderConfig::default().max_array_elements);
    }
}
