//! Decoded storage values and their JSON rendering.

use std::fmt;

use alloy_primitives::{Address, Bytes, I256, U256};
use itertools::Itertools;
use serde::{
    ser::{SerializeMap, SerializeStruct},
    Serialize, Serializer,
};

use crate::{error::StorageError, layout::StorageLocation};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedValue {
    Uint(U256),
    Int(I256),
    Bool(bool),
    Address(Address),
    FixedBytes(Bytes),
    Bytes {
        raw: Bytes,
        /// Length as stored, which may exceed `raw` when the content was truncated.
        length: U256,
        truncated: bool,
    },
    String {
        /// One character per stored byte.
        value: String,
        raw: Bytes,
        length: U256,
        truncated: bool,
    },
    /// Name of the enum member.
    Enum(String),
    Array {
        length: U256,
        elements: Vec<DecodedValue>,
        truncated: bool,
    },
    Struct(Vec<(String, DecodedValue)>),
    /// The field could not be decoded. Siblings are unaffected.
    Error(StorageError),
}

impl DecodedValue {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Look up a struct member by name.
    pub fn member(&self, name: &str) -> Option<&Self> {
        match self {
            Self::Struct(members) => {
                members.iter().find(|(member, _)| member == name).map(|(_, value)| value)
            }
            _ => None,
        }
    }

    pub fn elements(&self) -> Option<&[Self]> {
        match self {
            Self::Array { elements, .. } => Some(elements),
            _ => None,
        }
    }
}

impl From<StorageError> for DecodedValue {
    fn from(err: StorageError) -> Self {
        Self::Error(err)
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Address(address) => f.write_str(&hex::encode_prefixed(address)),
            Self::FixedBytes(raw) | Self::Bytes { raw, .. } => {
                f.write_str(&hex::encode_prefixed(raw))
            }
            Self::String { value, .. } => write!(f, "{value:?}"),
            Self::Enum(name) => f.write_str(name),
            Self::Array { elements, truncated, .. } => {
                write!(f, "[{}", elements.iter().format(", "))?;
                if *truncated {
                    f.write_str(", ..")?;
                }
                f.write_str("]")
            }
            Self::Struct(members) => write!(
                f,
                "{{ {} }}",
                members.iter().format_with(", ", |(name, value), f| f(&format_args!(
                    "{name}: {value}"
                )))
            ),
            Self::Error(err) => write!(f, "<{err}>"),
        }
    }
}

impl Serialize for DecodedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Uint(value) => serializer.collect_str(value),
            Self::Int(value) => serializer.collect_str(value),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Address(address) => serializer.serialize_str(&hex::encode_prefixed(address)),
            Self::FixedBytes(raw) => serializer.serialize_str(&hex::encode_prefixed(raw)),
            Self::Bytes { raw, length, truncated } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("value", &hex::encode_prefixed(raw))?;
                map.serialize_entry("raw", &hex::encode_prefixed(raw))?;
                map.serialize_entry("length", &length.to_string())?;
                if *truncated {
                    map.serialize_entry("truncated", truncated)?;
                }
                map.end()
            }
            Self::String { value, raw, length, truncated } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("value", value)?;
                map.serialize_entry("raw", &hex::encode_prefixed(raw))?;
                map.serialize_entry("length", &length.to_string())?;
                if *truncated {
                    map.serialize_entry("truncated", truncated)?;
                }
                map.end()
            }
            Self::Enum(name) => serializer.serialize_str(name),
            Self::Array { length, elements, truncated } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("length", &length.to_string())?;
                map.serialize_entry("elements", elements)?;
                if *truncated {
                    map.serialize_entry("truncated", truncated)?;
                }
                map.end()
            }
            Self::Struct(members) => {
                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (name, value) in members {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            Self::Error(err) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", &err.to_string())?;
                map.end()
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedVariable {
    pub name: String,
    pub type_name: String,
    pub location: StorageLocation,
    pub value: DecodedValue,
}

impl Serialize for DecodedVariable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DecodedVariable", 4)?;
        state.serialize_field("type", &self.type_name)?;
        state.serialize_field("slot", &self.location.slot.to_string())?;
        state.serialize_field("offset", &self.location.offset)?;
        state.serialize_field("value", &self.value)?;
        state.end()
    }
}

/// Every state variable of a contract, decoded, in storage order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedState {
    pub contract: String,
    pub variables: Vec<DecodedVariable>,
}

impl DecodedState {
    /// The most derived variable called `name`.
    pub fn get(&self, name: &str) -> Option<&DecodedValue> {
        self.variables.iter().rev().find(|variable| variable.name == name).map(|v| &v.value)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DecodedVariable> {
        self.variables.iter().filter(|variable| variable.value.is_error())
    }
}

impl Serialize for DecodedState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.variables.len()))?;
        for variable in &self.variables {
            map.serialize_entry(&variable.name, variable)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_scalars() {
        assert_eq!(serde_json::to_value(DecodedValue::Uint(U256::from(256))).unwrap(), json!("256"));
        assert_eq!(serde_json::to_value(DecodedValue::Int(I256::MINUS_ONE)).unwrap(), json!("-1"));
        assert_eq!(serde_json::to_value(DecodedValue::Bool(true)).unwrap(), json!(true));
        assert_eq!(
            serde_json::to_value(DecodedValue::Address(address!(
                "5FbDB2315678afecb367f032d93F642f64180aa3"
            )))
            .unwrap(),
            json!("0x5fbdb2315678afecb367f032d93f642f64180aa3")
        );
        assert_eq!(
            serde_json::to_value(DecodedValue::FixedBytes(Bytes::from_static(&[0xde, 0xad])))
                .unwrap(),
            json!("0xdead")
        );
    }

    #[test]
    fn test_serialize_aggregates() {
        let value = DecodedValue::Struct(vec![
            ("b".to_string(), DecodedValue::Enum("Green".to_string())),
            (
                "a".to_string(),
                DecodedValue::Array {
                    length: U256::from(5),
                    elements: vec![DecodedValue::Bool(false)],
                    truncated: true,
                },
            ),
            (
                "s".to_string(),
                DecodedValue::String {
                    value: "hi".to_string(),
                    raw: Bytes::from_static(b"hi"),
                    length: U256::from(2),
                    truncated: false,
                },
            ),
            ("m".to_string(), StorageError::UnresolvedType("mapping(uint256 => bool)".into()).into()),
        ]);

        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(
            json,
            r#"{"b":"Green","a":{"length":"5","elements":[false],"truncated":true},"s":{"value":"hi","raw":"0x6869","length":"2"},"m":{"error":"unresolved type: mapping(uint256 => bool)"}}"#
        );
    }

    #[test]
    fn test_state_lookup_and_json() {
        let state = DecodedState {
            contract: "C".to_string(),
            variables: vec![
                DecodedVariable {
                    name: "x".to_string(),
                    type_name: "uint8".to_string(),
                    location: StorageLocation::new(U256::from(3), 1),
                    value: DecodedValue::Uint(U256::from(9)),
                },
                DecodedVariable {
                    name: "m".to_string(),
                    type_name: "mapping(uint256 => bool)".to_string(),
                    location: StorageLocation::at_slot(U256::from(4)),
                    value: StorageError::UnresolvedType("mapping".into()).into(),
                },
            ],
        };
        assert_eq!(state.get("x"), Some(&DecodedValue::Uint(U256::from(9))));
        assert_eq!(state.errors().count(), 1);
        assert_eq!(
            serde_json::to_value(&state).unwrap()["x"],
            json!({ "type": "uint8", "slot": "3", "offset": 1, "value": "9" })
        );
    }

    #[test]
    fn test_display() {
        let value = DecodedValue::Struct(vec![
            ("n".to_string(), DecodedValue::Int(I256::try_from(-5i64).unwrap())),
            (
                "xs".to_string(),
                DecodedValue::Array {
                    length: U256::from(2),
                    elements: vec![DecodedValue::Uint(U256::from(1)), DecodedValue::Uint(U256::from(2))],
                    truncated: false,
                },
            ),
        ]);
        assert_eq!(value.to_string(), "{ n: -5, xs: [1, 2] }");
    }
}
