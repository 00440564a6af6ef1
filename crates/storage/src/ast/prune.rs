use foundry_compilers::artifacts::SourceUnit;
use serde_json::{json, Map, Value};

use crate::error::{Result, StorageError};

/// Top-level nodes of a source unit that can shape the storage of a contract.
const SOURCE_UNIT_PARTS: [&str; 4] = [
    "ContractDefinition",
    "StructDefinition",
    "EnumDefinition",
    "UserDefinedValueTypeDefinition",
];

/// Contract members that can shape its storage.
const CONTRACT_PARTS: [&str; 4] = [
    "VariableDeclaration",
    "StructDefinition",
    "EnumDefinition",
    "UserDefinedValueTypeDefinition",
];

/// We prune the AST down to the declarations that determine storage layout before handing it
/// to the typed nodes. Function bodies, events, modifiers and the like have changed shape
/// across compiler versions and play no part in where state lives.
///
/// Specifically, we will perform the following operations:
/// - Keep only contract, struct, enum and user-defined value type definitions at file level.
/// - Keep only variable, struct, enum and user-defined value type declarations in contracts.
///    - Variables in transient storage are dropped as well
/// - Set `baseContracts` of contracts to an empty array, the linearization carries the bases
/// - Remove `value`, `overrides` and `typeName` from variable declarations
/// - Nullify the `documentation` field of every kept node
pub struct AstPruner {}

impl AstPruner {
    pub fn convert(mut ast: Value) -> Result<SourceUnit> {
        Self::prune(&mut ast)?;
        serde_json::from_value(ast).map_err(|err| StorageError::InvalidAst(err.to_string()))
    }

    pub fn prune(ast: &mut Value) -> Result<()> {
        let Value::Object(unit) = ast else {
            return Err(StorageError::InvalidAst("a source unit must be an object".to_string()));
        };
        match unit.get("nodeType").and_then(Value::as_str) {
            Some("SourceUnit") => {}
            Some(other) => {
                return Err(StorageError::InvalidAst(format!("expected SourceUnit, found {other}")))
            }
            None => return Err(StorageError::InvalidAst("missing `nodeType`".to_string())),
        }

        Self::retain_nodes(unit, "nodes", &SOURCE_UNIT_PARTS);
        Self::prune_children(unit, "nodes");
        Ok(())
    }

    fn prune_node(node: &mut Map<String, Value>) {
        match node.get("nodeType").and_then(Value::as_str) {
            Some("ContractDefinition") => {
                node.insert("baseContracts".to_string(), json!([]));
                Self::retain_nodes(node, "nodes", &CONTRACT_PARTS);
                Self::prune_children(node, "nodes");
            }
            Some("StructDefinition") => Self::prune_children(node, "members"),
            Some("VariableDeclaration") => {
                node.remove("value");
                node.remove("overrides");
                node.remove("typeName");
            }
            _ => {}
        }

        if let Some(documentation) = node.get_mut("documentation") {
            // we nullify the documentation field as Solidity 0.4.0 emits it as a plain string
            *documentation = Value::Null;
        }
    }

    fn prune_children(node: &mut Map<String, Value>, field: &str) {
        if let Some(Value::Array(children)) = node.get_mut(field) {
            for child in children.iter_mut() {
                if let Value::Object(child) = child {
                    Self::prune_node(child);
                }
            }
        }
    }

    fn retain_nodes(node: &mut Map<String, Value>, field: &str, kinds: &[&str]) {
        if let Some(Value::Array(children)) = node.get_mut(field) {
            children.retain(|child| {
                let kind = child.get("nodeType").and_then(Value::as_str);
                let transient = child.get("storageLocation").and_then(Value::as_str) ==
                    Some("transient");
                kind.is_some_and(|kind| kinds.contains(&kind)) && !transient
            });
        }
    }
}
