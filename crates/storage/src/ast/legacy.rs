use serde_json::{json, Map, Value};

/// Rewrites legacy AST trees (solc < 0.5, `legacyAST`) into the compact JSON shape so both
/// can be read by the same typed nodes.
///
/// A legacy node looks like `{ "name": "ContractDefinition", "id", "src", "attributes", "children" }`.
/// Specifically, we will perform the following operations on every such node:
/// - Rename `name` to `nodeType`.
/// - Lift every entry of `attributes` into the node itself.
///    - `attributes.type` becomes `typeDescriptions.typeString`
///    - `[null]`, which legacy trees use for empty lists, becomes `[]`
/// - Move `children` to `members` for struct/enum definitions, and to `nodes` otherwise.
///
/// Nodes that already carry a `nodeType` are left untouched.
pub struct LegacyAstNormalizer {}

impl LegacyAstNormalizer {
    pub fn normalize(value: &mut Value) {
        match value {
            Value::Object(obj) => {
                if Self::is_legacy_node(obj) {
                    Self::normalize_node(obj);
                }

                for (_, value) in obj.iter_mut() {
                    Self::normalize(value);
                }
            }
            Value::Array(arr) => {
                for value in arr.iter_mut() {
                    Self::normalize(value);
                }
            }
            _ => {}
        }
    }

    fn is_legacy_node(obj: &Map<String, Value>) -> bool {
        !obj.contains_key("nodeType") &&
            obj.get("name").is_some_and(Value::is_string) &&
            obj.contains_key("src")
    }

    fn normalize_node(obj: &mut Map<String, Value>) {
        let Some(node_type) = obj.remove("name") else { return };
        let children_key = match node_type.as_str() {
            Some("StructDefinition" | "EnumDefinition") => "members",
            _ => "nodes",
        };
        obj.insert("nodeType".to_string(), node_type);

        if let Some(Value::Object(attributes)) = obj.remove("attributes") {
            for (field, value) in attributes {
                if field == "type" {
                    obj.insert("typeDescriptions".to_string(), json!({ "typeString": value }));
                } else if value == json!([null]) {
                    obj.insert(field, json!([]));
                } else {
                    obj.insert(field, value);
                }
            }
        }

        if let Some(children) = obj.remove("children") {
            obj.insert(children_key.to_string(), children);
        }
    }
}

#[cfg(test)]
mod tests {
    use foundry_compilers::artifacts::{ContractDefinitionPart, SourceUnitPart};

    use super::*;
    use crate::ast::{SourceForest, VariableDeclarationExt};

    fn legacy_source_unit() -> Value {
        json!({
            "name": "SourceUnit",
            "id": 10,
            "src": "0:100:0",
            "attributes": {
                "absolutePath": "legacy.sol",
                "exportedSymbols": { "Legacy": [9] }
            },
            "children": [
                {
                    "name": "PragmaDirective",
                    "id": 1,
                    "src": "0:23:0",
                    "attributes": { "literals": ["solidity", "^", "0.4", ".24"] }
                },
                {
                    "name": "ContractDefinition",
                    "id": 9,
                    "src": "25:75:0",
                    "attributes": {
                        "baseContracts": [null],
                        "contractDependencies": [null],
                        "contractKind": "contract",
                        "documentation": "Legacy storage",
                        "fullyImplemented": true,
                        "linearizedBaseContracts": [9],
                        "name": "Legacy",
                        "scope": 10
                    },
                    "children": [
                        {
                            "name": "EnumDefinition",
                            "id": 4,
                            "src": "45:20:0",
                            "attributes": { "canonicalName": "Legacy.Color", "name": "Color" },
                            "children": [
                                { "name": "EnumValue", "id": 2, "src": "57:3:0", "attributes": { "name": "Red" } },
                                { "name": "EnumValue", "id": 3, "src": "61:4:0", "attributes": { "name": "Blue" } }
                            ]
                        },
                        {
                            "name": "VariableDeclaration",
                            "id": 6,
                            "src": "70:11:0",
                            "attributes": {
                                "constant": false,
                                "name": "color",
                                "scope": 9,
                                "stateVariable": true,
                                "storageLocation": "default",
                                "type": "enum Legacy.Color",
                                "value": null,
                                "visibility": "internal"
                            },
                            "children": [{
                                "name": "UserDefinedTypeName",
                                "id": 5,
                                "src": "70:5:0",
                                "attributes": {
                                    "contractScope": null,
                                    "name": "Color",
                                    "referencedDeclaration": 4,
                                    "type": "enum Legacy.Color"
                                }
                            }]
                        },
                        {
                            "name": "ModifierDefinition",
                            "id": 8,
                            "src": "85:14:0",
                            "attributes": { "name": "only", "visibility": "internal" },
                            "children": [{ "name": "PlaceholderStatement", "id": 7, "src": "96:1:0" }]
                        }
                    ]
                }
            ]
        })
    }

    #[test]
    fn test_normalize_legacy_contract() {
        let mut ast = legacy_source_unit();
        LegacyAstNormalizer::normalize(&mut ast);

        let contract = &ast["nodes"][1];
        assert_eq!(ast["nodeType"], "SourceUnit");
        assert_eq!(contract["contractDependencies"], json!([]));
        assert_eq!(contract["nodes"][1]["typeDescriptions"]["typeString"], "enum Legacy.Color");
        assert_eq!(contract["nodes"][0]["members"][1]["name"], "Blue");
    }

    #[test]
    fn test_load_legacy_tree() {
        let forest = SourceForest::from_json_value(legacy_source_unit()).unwrap();
        let unit = &forest.units()[0];
        assert_eq!(unit.absolute_path, "legacy.sol");

        let SourceUnitPart::ContractDefinition(contract) = &unit.nodes[0] else {
            panic!("expected a contract")
        };
        assert_eq!(contract.name, "Legacy");
        assert_eq!(contract.linearized_base_contracts, vec![9]);
        assert_eq!(contract.nodes.len(), 2);
        let ContractDefinitionPart::VariableDeclaration(color) = &contract.nodes[1] else {
            panic!("expected a variable")
        };
        assert_eq!(color.declared_type(), Some("enum Legacy.Color"));
        assert!(color.occupies_storage());
    }

    #[test]
    fn test_compact_nodes_untouched() {
        let mut ast = json!({ "nodeType": "SourceUnit", "id": 0, "src": "0:0:0", "name": "x" });
        let expected = ast.clone();
        LegacyAstNormalizer::normalize(&mut ast);
        assert_eq!(ast, expected);
    }
}
