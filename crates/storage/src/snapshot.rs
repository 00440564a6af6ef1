use alloy_primitives::{B256, U256};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::{Result, StorageError};

/// Raw storage words of one contract at one point of execution.
///
/// Slots missing from the snapshot read as zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageSnapshot {
    words: FxHashMap<U256, B256>,
}

impl StorageSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: U256, word: B256) -> Option<B256> {
        self.words.insert(slot, word)
    }

    pub fn get(&self, slot: U256) -> B256 {
        self.words.get(&slot).copied().unwrap_or_default()
    }

    /// Whether the snapshot carries a word for `slot`, zero or not.
    pub fn contains(&self, slot: U256) -> bool {
        self.words.contains_key(&slot)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&U256, &B256)> {
        self.words.iter()
    }

    /// Build a snapshot from hex encoded `(slot, word)` pairs.
    pub fn from_hex_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        pairs
            .into_iter()
            .map(|(key, value)| {
                let (key, value) = (key.as_ref(), value.as_ref());
                let slot = parse_word(key)
                    .ok_or_else(|| StorageError::MalformedStorageKey(key.to_string()))?;
                let word = parse_word(value).ok_or_else(|| StorageError::MalformedStorageValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                Ok((U256::from_be_bytes(slot.0), word))
            })
            .collect()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|err| StorageError::MalformedStorageKey(format!("invalid snapshot: {err}")))?;
        Self::from_json_value(&value)
    }

    /// Accepts either a flat `{ "<slot>": "<word>" }` object or a `debug_storageRangeAt`
    /// result, whose `storage` maps `{ "<hashed slot>": { "key": .., "value": .. } }`.
    pub fn from_json_value(value: &Value) -> Result<Self> {
        let value = value.get("storage").filter(|storage| storage.is_object()).unwrap_or(value);
        let Value::Object(entries) = value else {
            return Err(StorageError::MalformedStorageKey("snapshot is not a JSON object".into()));
        };

        let mut pairs = Vec::with_capacity(entries.len());
        for (key, entry) in entries {
            match entry {
                Value::String(word) => pairs.push((key.as_str(), word.as_str())),
                Value::Object(range_entry) => {
                    let word = range_entry.get("value").and_then(Value::as_str).ok_or_else(|| {
                        StorageError::MalformedStorageValue {
                            key: key.clone(),
                            value: entry.to_string(),
                        }
                    })?;
                    match range_entry.get("key").and_then(Value::as_str) {
                        Some(slot) => pairs.push((slot, word)),
                        None => warn!("no preimage for hashed slot {key}, skipping it"),
                    }
                }
                _ => {
                    return Err(StorageError::MalformedStorageValue {
                        key: key.clone(),
                        value: entry.to_string(),
                    })
                }
            }
        }

        let snapshot = Self::from_hex_pairs(pairs)?;
        debug!("loaded storage snapshot with {} words", snapshot.len());
        Ok(snapshot)
    }
}

impl FromIterator<(U256, B256)> for StorageSnapshot {
    fn from_iter<T: IntoIterator<Item = (U256, B256)>>(iter: T) -> Self {
        Self { words: iter.into_iter().collect() }
    }
}

impl Extend<(U256, B256)> for StorageSnapshot {
    fn extend<T: IntoIterator<Item = (U256, B256)>>(&mut self, iter: T) {
        self.words.extend(iter)
    }
}

/// Parse up to 32 bytes of hex, with or without `0x`, left padding to a full word.
fn parse_word(hex_str: &str) -> Option<B256> {
    let digits = hex_str.trim();
    let digits = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")).unwrap_or(digits);
    if digits.len() > 64 {
        return None;
    }

    let padded = format!("{digits:0>64}");
    let mut word = [0u8; 32];
    hex::decode_to_slice(padded, &mut word).ok()?;
    Some(B256::from(word))
}
