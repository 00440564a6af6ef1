use alloy_primitives::U256;

/// Errors raised while resolving layouts or decoding storage.
///
/// The type is cheap to clone because field-level failures are stored inside the decoded
/// value tree next to the siblings that decoded fine.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The requested contract is not defined in the given sources.
    #[error("unresolved contract: {0}")]
    UnresolvedContract(String),

    /// The contract declares no state variable with this name.
    #[error("{contract} has no state variable `{name}`")]
    UnknownVariable { contract: String, name: String },

    /// The declared type is outside the categories that can be decoded from storage.
    #[error("unresolved type: {0}")]
    UnresolvedType(String),

    /// A struct or enum is referenced but its declaration is not available.
    #[error("missing definition for `{0}`")]
    MissingMemberDefinition(String),

    /// A snapshot key cannot be read as a 32-byte word.
    #[error("malformed storage key: {0:?}")]
    MalformedStorageKey(String),

    /// A snapshot value cannot be read as a 32-byte word.
    #[error("malformed storage value {value:?} at key {key:?}")]
    MalformedStorageValue { key: String, value: String },

    /// The stored ordinal has no matching enum member.
    #[error("ordinal {ordinal} is out of range for `enum {name}`")]
    EnumOutOfRange { name: String, ordinal: U256 },

    /// The AST does not have the expected shape.
    #[error("invalid AST: {0}")]
    InvalidAst(String),

    /// The decoder configuration cannot be loaded.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = StorageError> = std::result::Result<T, E>;
