use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

use crate::error::{Result, StorageError};

/// How the short and long forms of a `bytes`/`string` header are told apart.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, VariantNames,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StringEncoding {
    /// The lowest bit of the header word is set for the long form.
    #[default]
    LowBit,
    /// The long form is assumed whenever the snapshot holds a word at the hashed slot.
    SlotPresence,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct DecoderConfig {
    pub string_encoding: StringEncoding,
    /// Decode at most this many elements of a dynamic array.
    pub max_array_elements: usize,
    /// Read at most this many bytes of a dynamic `bytes`/`string`.
    pub max_bytes_length: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            string_encoding: StringEncoding::default(),
            max_array_elements: 1 << 16,
            max_bytes_length: 1 << 20,
        }
    }
}

impl DecoderConfig {
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|err| StorageError::InvalidConfig(err.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|err| StorageError::InvalidConfig(format!("{}: {err}", path.display())))?;
        let config = Self::from_toml_str(&content)?;
        debug!("loaded decoder config from {}: {config:?}", path.display());
        Ok(config)
    }

    pub fn with_string_encoding(mut self, string_encoding: StringEncoding) -> Self {
        self.string_encoding = string_encoding;
        self
    }

    pub fn with_max_array_elements(mut self, max_array_elements: usize) -> Self {
        self.max_array_elements = max_array_elements;
        self
    }

    pub fn with_max_bytes_length(mut self, max_bytes_length: usize) -> Self {
        self.max_bytes_length = max_bytes_length;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_string_encoding_names() {
        assert_eq!(StringEncoding::from_str("slot-presence").unwrap(), StringEncoding::SlotPresence);
        assert_eq!(StringEncoding::LowBit.to_string(), "low-bit");
        assert_eq!(StringEncoding::VARIANTS, ["low-bit", "slot-presence"]);
        assert!(StringEncoding::from_str("presence").is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config = DecoderConfig::from_toml_str("string-encoding = \"slot-presence\"").unwrap();
        assert_eq!(config.string_encoding, StringEncoding::SlotPresence);
        assert_eq!(config.max_array_elements, DecoderConfig::default().max_array_elements);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = DecoderConfig::from_toml_str("max-elements = 3").unwrap_err();
        assert!(matches!(err, StorageError::InvalidConfig(_)));
    }
}
