//! Locates a contract in the source forest and flattens its state variables across
//! inheritance, base contracts first.

use foundry_compilers::artifacts::{
    ContractDefinition, EnumDefinition, SourceUnitPart, StructDefinition, TypeName,
    UserDefinedValueTypeDefinition, VariableDeclaration,
};
use rustc_hash::FxHashMap;

use crate::{
    ast::{SourceForest, VariableDeclarationExt, Visitor, Walk},
    error::{Result, StorageError},
};

/// Struct and enum declarations, keyed by `struct <canonical name>` / `enum <canonical name>`,
/// and the underlying types of user-defined value types, keyed by canonical name.
#[derive(Clone, Debug, Default)]
pub struct DefinitionIndex {
    structs: FxHashMap<String, StructDefinition>,
    enums: FxHashMap<String, EnumDefinition>,
    value_types: FxHashMap<String, String>,
}

impl DefinitionIndex {
    /// Look up a struct by the name following `struct ` in a type string.
    pub fn struct_definition(&self, name: &str) -> Option<&StructDefinition> {
        self.structs.get(&format!("struct {name}"))
    }

    /// Look up an enum by the name following `enum ` in a type string.
    pub fn enum_definition(&self, name: &str) -> Option<&EnumDefinition> {
        self.enums.get(&format!("enum {name}"))
    }

    /// The underlying elementary type of a user-defined value type, e.g. `uint128` for
    /// `type Price is uint128`.
    pub fn value_type(&self, name: &str) -> Option<&str> {
        self.value_types.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.structs.len() + self.enums.len() + self.value_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The first definition registered under a key wins, so reachable definitions must be
    // inserted before the rest of the forest.
    fn insert_struct(&mut self, qualified: String, definition: &StructDefinition) {
        let alias = format!("struct {}", definition.name);
        self.structs.entry(format!("struct {qualified}")).or_insert_with(|| definition.clone());
        self.structs.entry(alias).or_insert_with(|| definition.clone());
    }

    fn insert_enum(&mut self, qualified: String, definition: &EnumDefinition) {
        let alias = format!("enum {}", definition.name);
        self.enums.entry(format!("enum {qualified}")).or_insert_with(|| definition.clone());
        self.enums.entry(alias).or_insert_with(|| definition.clone());
    }

    fn insert_value_type(&mut self, qualified: String, name: &str, underlying: String) {
        self.value_types.entry(qualified).or_insert_with(|| underlying.clone());
        self.value_types.entry(name.to_string()).or_insert(underlying);
    }
}

/// A contract with its storage-relevant declarations resolved.
#[derive(Clone, Debug)]
pub struct ResolvedContract {
    pub id: usize,
    pub name: String,
    /// State variables occupying storage, base contracts first, each in source order.
    pub variables: Vec<VariableDeclaration>,
    pub definitions: DefinitionIndex,
}

pub struct ContractTypeResolver<'a> {
    forest: &'a SourceForest,
}

impl<'a> ContractTypeResolver<'a> {
    pub fn new(forest: &'a SourceForest) -> Self {
        Self { forest }
    }

    /// Resolve `contract`, given either as a bare name or as `<absolute path>:<name>`.
    pub fn resolve(&self, contract: &str) -> Result<ResolvedContract> {
        let target = self.find_contract(contract)?;
        let by_id: FxHashMap<usize, &ContractDefinition> =
            self.forest.contracts().map(|(_, contract)| (contract.id, contract)).collect();

        let linearized = if target.linearized_base_contracts.is_empty() {
            vec![target.id]
        } else {
            target.linearized_base_contracts.clone()
        };

        let bases = linearized
            .iter()
            .rev()
            .map(|id| {
                by_id.get(id).copied().ok_or_else(|| {
                    StorageError::UnresolvedContract(format!(
                        "base contract #{id} of {} is not in the given sources",
                        target.name
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut collector = StateVariableCollector::default();
        for base in &bases {
            base.walk(&mut collector)?;
        }

        let definitions = self.index_definitions(&bases)?;

        debug!(
            "resolved contract {} ({} bases, {} state variables, {} type definitions)",
            target.name,
            bases.len(),
            collector.variables.len(),
            definitions.len()
        );

        Ok(ResolvedContract {
            id: target.id,
            name: target.name.clone(),
            variables: collector.variables,
            definitions,
        })
    }

    fn find_contract(&self, contract: &str) -> Result<&'a ContractDefinition> {
        let (path, name) = match contract.rsplit_once(':') {
            Some((path, name)) => (Some(path), name),
            None => (None, contract),
        };

        let mut candidates = self.forest.contracts().filter(|(unit, definition)| {
            definition.name == name && path.map_or(true, |path| unit.absolute_path == path)
        });

        let (unit, definition) = candidates
            .next()
            .ok_or_else(|| StorageError::UnresolvedContract(contract.to_string()))?;

        if let Some((other, _)) = candidates.next() {
            warn!(
                "contract {name} is defined more than once (e.g. {} and {}), using the first one",
                unit.absolute_path, other.absolute_path
            );
        }

        Ok(definition)
    }

    fn index_definitions(&self, bases: &[&ContractDefinition]) -> Result<DefinitionIndex> {
        let mut collector = DefinitionCollector::default();

        // Reachable first: the contract and its bases, then file-level declarations.
        for base in bases.iter().rev() {
            base.walk(&mut collector)?;
        }
        for unit in self.forest.units() {
            for part in &unit.nodes {
                if !matches!(part, SourceUnitPart::ContractDefinition(_)) {
                    part.walk(&mut collector)?;
                }
            }
        }

        // Anything else in the forest only fills keys that are still free, e.g. a struct of
        // a library that the contract uses without inheriting from it.
        for unit in self.forest.units() {
            unit.walk(&mut collector)?;
        }

        Ok(collector.index)
    }
}

/// Collects storage-occupying state variables, skipping struct members.
#[derive(Default)]
struct StateVariableCollector {
    variables: Vec<VariableDeclaration>,
    struct_depth: usize,
}

impl Visitor for StateVariableCollector {
    fn visit_struct_definition(&mut self, _definition: &StructDefinition) -> Result<()> {
        self.struct_depth += 1;
        Ok(())
    }

    fn post_visit_struct_definition(&mut self, _definition: &StructDefinition) -> Result<()> {
        self.struct_depth -= 1;
        Ok(())
    }

    fn visit_variable_declaration(&mut self, declaration: &VariableDeclaration) -> Result<()> {
        if self.struct_depth > 0 || !declaration.state_variable {
            return Ok(());
        }

        if declaration.occupies_storage() {
            self.variables.push(declaration.clone());
        } else {
            trace!("skipping {} as it does not live in storage", declaration.name);
        }
        Ok(())
    }
}

#[derive(Default)]
struct DefinitionCollector {
    index: DefinitionIndex,
    contract: Option<String>,
}

impl DefinitionCollector {
    fn qualified_name(&self, name: &str, canonical: Option<&str>) -> String {
        match (canonical.filter(|canonical| !canonical.is_empty()), &self.contract) {
            (Some(canonical), _) => canonical.to_string(),
            (None, Some(contract)) => format!("{contract}.{name}"),
            (None, None) => name.to_string(),
        }
    }
}

impl Visitor for DefinitionCollector {
    fn visit_contract_definition(&mut self, definition: &ContractDefinition) -> Result<()> {
        self.contract = Some(definition.name.clone());
        Ok(())
    }

    fn post_visit_contract_definition(&mut self, _definition: &ContractDefinition) -> Result<()> {
        self.contract = None;
        Ok(())
    }

    fn visit_struct_definition(&mut self, definition: &StructDefinition) -> Result<()> {
        let qualified = self.qualified_name(&definition.name, Some(definition.canonical_name.as_str()));
        self.index.insert_struct(qualified, definition);
        Ok(())
    }

    fn visit_enum_definition(&mut self, definition: &EnumDefinition) -> Result<()> {
        let qualified = self.qualified_name(&definition.name, Some(definition.canonical_name.as_str()));
        self.index.insert_enum(qualified, definition);
        Ok(())
    }

    fn visit_user_defined_value_type(
        &mut self,
        value_type: &UserDefinedValueTypeDefinition,
    ) -> Result<()> {
        let TypeName::ElementaryTypeName(underlying) = &value_type.underlying_type else {
            warn!("value type {} is not backed by an elementary type", value_type.name);
            return Ok(());
        };
        let qualified =
            self.qualified_name(&value_type.name, value_type.canonical_name.as_deref());
        self.index.insert_value_type(qualified, &value_type.name, underlying.name.clone());
        Ok(())
    }
}
