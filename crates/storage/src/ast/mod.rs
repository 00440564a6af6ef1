//! Loading of solc JSON ASTs into the typed [`foundry_compilers::artifacts`] nodes.
//!
//! Trees in the pre-0.5 legacy format are first rewritten into the compact shape (see
//! [`LegacyAstNormalizer`]), then pruned down to the nodes that shape contract storage (see
//! [`AstPruner`]) before being deserialized.

mod legacy;
mod prune;
mod visitor;

use foundry_compilers::artifacts::{
    ContractDefinition, Mutability, SourceUnit, SourceUnitPart, VariableDeclaration,
};
use serde_json::Value;

use crate::error::{Result, StorageError};

pub use legacy::LegacyAstNormalizer;
pub use prune::AstPruner;
pub use visitor::{Visitor, Walk};

/// Storage-related accessors on declarations.
pub trait VariableDeclarationExt {
    /// The compiler-emitted type string, e.g. `uint256[] storage ref`.
    fn declared_type(&self) -> Option<&str>;

    /// Constants and immutables are declared as state variables but live in the bytecode.
    fn occupies_storage(&self) -> bool;
}

impl VariableDeclarationExt for VariableDeclaration {
    fn declared_type(&self) -> Option<&str> {
        self.type_descriptions.type_string.as_deref()
    }

    fn occupies_storage(&self) -> bool {
        self.state_variable &&
            !self.constant &&
            !matches!(self.mutability, Some(Mutability::Immutable | Mutability::Constant))
    }
}

/// All source units of one compilation, ordered by source id.
#[derive(Clone, Debug, Default)]
pub struct SourceForest {
    units: Vec<SourceUnit>,
}

impl SourceForest {
    pub fn new(mut units: Vec<SourceUnit>) -> Self {
        units.sort_by_key(|unit| unit.id);
        Self { units }
    }

    pub fn units(&self) -> &[SourceUnit] {
        &self.units
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Merge another forest into this one, keeping source id order.
    pub fn extend(&mut self, other: Self) {
        self.units.extend(other.units);
        self.units.sort_by_key(|unit| unit.id);
    }

    /// Every contract definition in forest order, together with the unit declaring it.
    pub fn contracts(&self) -> impl Iterator<Item = (&SourceUnit, &ContractDefinition)> {
        self.units.iter().flat_map(|unit| {
            unit.nodes.iter().filter_map(move |part| match part {
                SourceUnitPart::ContractDefinition(contract) => Some((unit, &**contract)),
                _ => None,
            })
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|err| StorageError::InvalidAst(err.to_string()))?;
        Self::from_json_value(value)
    }

    /// Load a forest from one of the shapes the compiler tooling produces:
    /// - a single `SourceUnit` node,
    /// - an array of `SourceUnit` nodes,
    /// - a solc standard-JSON output, taking `sources.<path>.ast` (or `legacyAST`).
    pub fn from_json_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(units) => {
                units.into_iter().map(parse_source_unit).collect::<Result<Vec<_>>>().map(Self::new)
            }
            Value::Object(mut output) => match output.remove("sources") {
                Some(Value::Object(sources)) => {
                    let mut units = Vec::with_capacity(sources.len());
                    for (path, mut source) in sources {
                        let id = source.get("id").cloned();
                        let Some(mut ast) = ["ast", "legacyAST", "AST"]
                            .iter()
                            .find_map(|key| source.get_mut(*key).map(Value::take))
                        else {
                            warn!("source {path} carries no AST, skipping");
                            continue;
                        };

                        // the standard-JSON wrapper knows the path and id even when the legacy
                        // tree does not
                        LegacyAstNormalizer::normalize(&mut ast);
                        if let Value::Object(node) = &mut ast {
                            node.entry("absolutePath").or_insert(Value::String(path));
                            if let Some(id) = id {
                                node.entry("id").or_insert(id);
                            }
                        }
                        units.push(parse_source_unit(ast)?);
                    }
                    Ok(Self::new(units))
                }
                Some(_) => Err(StorageError::InvalidAst("`sources` is not an object".to_string())),
                None => parse_source_unit(Value::Object(output)).map(|unit| Self::new(vec![unit])),
            },
            _ => Err(StorageError::InvalidAst("expected a source unit or compiler output".into())),
        }
    }
}

impl FromIterator<SourceUnit> for SourceForest {
    fn from_iter<T: IntoIterator<Item = SourceUnit>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn parse_source_unit(mut value: Value) -> Result<SourceUnit> {
    LegacyAstNormalizer::normalize(&mut value);
    AstPruner::convert(value)
}

/// Compact AST nodes carrying every field the typed nodes require.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{json, Value};

    use super::SourceForest;

    static NEXT_ID: AtomicUsize = AtomicUsize::new(1000);

    fn next_id() -> usize {
        NEXT_ID.fetch_add(1, Ordering::Relaxed)
    }

    fn declaration(name: &str, ty: &str, state_variable: bool) -> Value {
        json!({
            "nodeType": "VariableDeclaration",
            "id": next_id(),
            "src": "0:0:0",
            "name": name,
            "scope": 0,
            "stateVariable": state_variable,
            "constant": false,
            "mutability": "mutable",
            "storageLocation": "default",
            "visibility": "internal",
            "typeDescriptions": { "typeString": ty }
        })
    }

    pub fn var(name: &str, ty: &str) -> Value {
        declaration(name, ty, true)
    }

    pub fn member(name: &str, ty: &str) -> Value {
        declaration(name, ty, false)
    }

    pub fn constant(name: &str, ty: &str) -> Value {
        let mut node = var(name, ty);
        node["constant"] = json!(true);
        node["mutability"] = json!("constant");
        node
    }

    pub fn struct_def(name: &str, canonical: &str, members: Vec<Value>) -> Value {
        json!({
            "nodeType": "StructDefinition",
            "id": next_id(),
            "src": "0:0:0",
            "name": name,
            "canonicalName": canonical,
            "members": members,
            "scope": 0,
            "visibility": "public"
        })
    }

    pub fn enum_def(name: &str, canonical: &str, values: &[&str]) -> Value {
        let members: Vec<_> = values
            .iter()
            .map(|value| {
                json!({ "nodeType": "EnumValue", "id": next_id(), "src": "0:0:0", "name": value })
            })
            .collect();
        json!({
            "nodeType": "EnumDefinition",
            "id": next_id(),
            "src": "0:0:0",
            "name": name,
            "canonicalName": canonical,
            "members": members
        })
    }

    pub fn value_type(name: &str, canonical: &str, underlying: &str) -> Value {
        json!({
            "nodeType": "UserDefinedValueTypeDefinition",
            "id": next_id(),
            "src": "0:0:0",
            "name": name,
            "canonicalName": canonical,
            "underlyingType": {
                "nodeType": "ElementaryTypeName",
                "id": next_id(),
                "src": "0:0:0",
                "name": underlying,
                "typeDescriptions": { "typeString": underlying }
            }
        })
    }

    pub fn function(name: &str) -> Value {
        json!({
            "nodeType": "FunctionDefinition",
            "id": next_id(),
            "src": "0:0:0",
            "name": name,
            "body": { "nodeType": "Block", "statements": [] }
        })
    }

    /// `linearized` lists the contract itself first, then its bases, most derived first.
    pub fn contract(id: usize, name: &str, linearized: &[usize], nodes: Vec<Value>) -> Value {
        json!({
            "nodeType": "ContractDefinition",
            "id": id,
            "src": "0:0:0",
            "name": name,
            "abstract": false,
            "baseContracts": [],
            "contractDependencies": [],
            "contractKind": "contract",
            "fullyImplemented": true,
            "linearizedBaseContracts": linearized,
            "nodes": nodes,
            "scope": 0
        })
    }

    pub fn source_unit(id: usize, path: &str, nodes: Vec<Value>) -> Value {
        json!({
            "nodeType": "SourceUnit",
            "id": id,
            "src": format!("0:0:{id}"),
            "absolutePath": path,
            "exportedSymbols": {},
            "nodes": nodes
        })
    }

    /// A forest with a single file holding `contract`.
    pub fn single_contract(name: &str, nodes: Vec<Value>) -> SourceForest {
        let unit = source_unit(0, "test.sol", vec![contract(1, name, &[1], nodes)]);
        SourceForest::from_json_value(unit).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use foundry_compilers::artifacts::ContractDefinitionPart;
    use serde_json::json;

    use super::{fixtures::*, *};

    #[test]
    fn test_parse_compact_source_unit() {
        let pragma = json!({
            "nodeType": "PragmaDirective",
            "id": 1,
            "src": "0:23:0",
            "literals": ["solidity", "^", "0.8", ".0"]
        });
        let unit = source_unit(
            3,
            "A.sol",
            vec![pragma, contract(2, "A", &[2], vec![var("a", "uint256"), function("f")])],
        );
        let forest = SourceForest::from_json_value(unit).unwrap();

        let (unit, contract) = forest.contracts().next().unwrap();
        assert_eq!(unit.absolute_path, "A.sol");
        assert_eq!(unit.nodes.len(), 1);
        assert_eq!(contract.name, "A");
        assert_eq!(contract.nodes.len(), 1);
        match &contract.nodes[0] {
            ContractDefinitionPart::VariableDeclaration(decl) => {
                assert_eq!(decl.declared_type(), Some("uint256"));
                assert!(decl.occupies_storage());
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_parse_standard_json_output() {
        let unit = |id| {
            let mut unit = source_unit(id, "", vec![]);
            let node = unit.as_object_mut().unwrap();
            node.remove("absolutePath");
            node.remove("id");
            unit
        };
        let forest = SourceForest::from_json_value(json!({
            "sources": {
                "b.sol": { "id": 1, "ast": unit(1) },
                "a.sol": { "id": 0, "ast": unit(0) }
            }
        }))
        .unwrap();

        let paths: Vec<_> = forest.units().iter().map(|u| u.absolute_path.as_str()).collect();
        assert_eq!(paths, ["a.sol", "b.sol"]);
    }

    #[test]
    fn test_constants_and_immutables_have_no_storage() {
        let decl: VariableDeclaration = serde_json::from_value(constant("X", "uint256")).unwrap();
        assert!(!decl.occupies_storage());

        let mut immutable = var("Y", "address");
        immutable["mutability"] = json!("immutable");
        let decl: VariableDeclaration = serde_json::from_value(immutable).unwrap();
        assert!(!decl.occupies_storage());

        let decl: VariableDeclaration = serde_json::from_value(member("m", "uint8")).unwrap();
        assert!(!decl.occupies_storage());
    }

    #[test]
    fn test_reject_non_source_unit() {
        let err = SourceForest::from_json_value(contract(1, "C", &[1], vec![]));
        assert!(matches!(err, Err(StorageError::InvalidAst(_))));
    }
}
