//! Slot assignment following solc's storage packing rules.

use std::fmt;

use alloy_primitives::{keccak256, U256};

use crate::{
    ast::VariableDeclarationExt,
    error::{Result, StorageError},
    resolver::ResolvedContract,
    types::{Footprint, TypeBuilder, TypeDescriptor},
};

/// Size of a storage slot in bytes.
pub const WORD_SIZE: usize = 32;

/// A slot and a byte offset counted from the least significant end of its word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageLocation {
    pub slot: U256,
    pub offset: usize,
}

impl StorageLocation {
    pub const fn new(slot: U256, offset: usize) -> Self {
        Self { slot, offset }
    }

    pub const fn at_slot(slot: U256) -> Self {
        Self { slot, offset: 0 }
    }

    /// Rebase a location computed relative to slot 0 onto `base`.
    pub fn relative_to(self, base: U256) -> Self {
        Self { slot: base.wrapping_add(self.slot), offset: self.offset }
    }

    fn next_slot(self) -> Self {
        Self::at_slot(self.slot.wrapping_add(U256::from(1)))
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slot, self.offset)
    }
}

/// Place one entry with the given footprint at `cursor`.
///
/// Returns the location assigned to the entry and the cursor for the entry after it.
pub fn walk_storage(
    footprint: Footprint,
    cursor: StorageLocation,
) -> (StorageLocation, StorageLocation) {
    match footprint {
        Footprint::Packed(size) => {
            let start = if cursor.offset > 0 && cursor.offset + size > WORD_SIZE {
                cursor.next_slot()
            } else {
                cursor
            };
            let end = start.offset + size;
            let next =
                if end >= WORD_SIZE { start.next_slot() } else { StorageLocation::new(start.slot, end) };
            (start, next)
        }
        Footprint::Slots(slots) => {
            let start = if cursor.offset > 0 { cursor.next_slot() } else { cursor };
            (start, StorageLocation::at_slot(start.slot.wrapping_add(slots)))
        }
    }
}

/// Assigns consecutive locations to a sequence of entries, as for the state variables of a
/// contract or the members of a struct.
#[derive(Clone, Debug, Default)]
pub struct LayoutAllocator {
    start: StorageLocation,
    cursor: StorageLocation,
}

impl LayoutAllocator {
    pub fn new(start: StorageLocation) -> Self {
        Self { start, cursor: start }
    }

    pub fn allocate(&mut self, ty: &TypeDescriptor) -> StorageLocation {
        self.allocate_footprint(ty.footprint())
    }

    pub fn allocate_footprint(&mut self, footprint: Footprint) -> StorageLocation {
        let (assigned, next) = walk_storage(footprint, self.cursor);
        self.cursor = next;
        assigned
    }

    /// The location right after the last allocated entry.
    pub fn cursor(&self) -> StorageLocation {
        self.cursor
    }

    /// Slots touched since the start, counting a partially filled last slot.
    pub fn slots_used(&self) -> U256 {
        let end = if self.cursor.offset > 0 { self.cursor.next_slot() } else { self.cursor };
        end.slot.wrapping_sub(self.start.slot)
    }
}

/// The first slot of the data region of a dynamic array or long byte string whose header
/// lives at `slot`.
pub fn hashed_slot(slot: U256) -> U256 {
    U256::from_be_bytes(keccak256(slot.to_be_bytes::<32>()).0)
}

#[derive(Clone, Debug)]
pub struct StateVariable {
    pub name: String,
    /// The type string as declared, qualifiers included.
    pub declared_type: String,
    pub ty: Result<TypeDescriptor>,
    pub location: StorageLocation,
}

impl StateVariable {
    /// The canonical name of the type, or the declared string if it failed to build.
    pub fn type_name(&self) -> String {
        match &self.ty {
            Ok(ty) => ty.to_string(),
            Err(_) => self.declared_type.clone(),
        }
    }

    pub fn footprint(&self) -> Footprint {
        self.ty.as_ref().map_or(Footprint::Slots(U256::from(1)), TypeDescriptor::footprint)
    }
}

/// Storage layout of all state variables of a contract, base contracts first.
#[derive(Clone, Debug)]
pub struct ContractLayout {
    pub contract: String,
    pub variables: Vec<StateVariable>,
    /// The first free location after the last variable.
    pub end: StorageLocation,
}

impl ContractLayout {
    pub fn build(contract: &ResolvedContract) -> Self {
        let mut builder = TypeBuilder::new(&contract.definitions);
        let mut allocator = LayoutAllocator::default();

        let variables = contract
            .variables
            .iter()
            .map(|declaration| {
                let declared_type = declaration.declared_type().unwrap_or_default().to_string();
                let ty = match declaration.declared_type() {
                    Some(declared) => builder.build(declared),
                    None => Err(StorageError::UnresolvedType(format!(
                        "{} has no type description",
                        declaration.name
                    ))),
                };
                if let Err(err) = &ty {
                    warn!(
                        "state variable {}.{} gets a one-slot placeholder: {err}",
                        contract.name, declaration.name
                    );
                }

                let mut variable = StateVariable {
                    name: declaration.name.clone(),
                    declared_type,
                    ty,
                    location: StorageLocation::default(),
                };
                variable.location = allocator.allocate_footprint(variable.footprint());
                trace!("{}: {} at {}", variable.name, variable.type_name(), variable.location);
                variable
            })
            .collect();

        Self { contract: contract.name.clone(), variables, end: allocator.cursor() }
    }

    /// Look up a state variable. A name declared in several contracts of the hierarchy
    /// resolves to the most derived one.
    pub fn variable(&self, name: &str) -> Option<&StateVariable> {
        self.variables.iter().rev().find(|variable| variable.name == name)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::{ast::fixtures::*, resolver::ContractTypeResolver};

    fn layout_with(definitions: Vec<Value>, vars: &[(&str, &str)]) -> ContractLayout {
        let nodes = definitions.into_iter().chain(vars.iter().map(|(name, ty)| var(name, ty)));
        let forest = single_contract("C", nodes.collect());
        ContractLayout::build(&ContractTypeResolver::new(&forest).resolve("C").unwrap())
    }

    fn layout(vars: &[(&str, &str)]) -> ContractLayout {
        layout_with(vec![], vars)
    }

    fn locations(layout: &ContractLayout) -> Vec<(u64, usize)> {
        layout.variables.iter().map(|v| (v.location.slot.to::<u64>(), v.location.offset)).collect()
    }

    #[test]
    fn test_walk_storage_packing() {
        let start = StorageLocation::default();
        let (a, next) = walk_storage(Footprint::Packed(4), start);
        assert_eq!(a, start);
        assert_eq!(next, StorageLocation::new(U256::ZERO, 4));

        // does not fit in the remaining 28 bytes
        let (b, next) = walk_storage(Footprint::Packed(30), next);
        assert_eq!(b, StorageLocation::at_slot(U256::from(1)));
        assert_eq!(next, StorageLocation::new(U256::from(1), 30));

        // fills the slot exactly
        let (c, next) = walk_storage(Footprint::Packed(2), next);
        assert_eq!(c, StorageLocation::new(U256::from(1), 30));
        assert_eq!(next, StorageLocation::at_slot(U256::from(2)));

        let (d, next) = walk_storage(Footprint::Slots(U256::from(3)), next);
        assert_eq!(d, StorageLocation::at_slot(U256::from(2)));
        assert_eq!(next, StorageLocation::at_slot(U256::from(5)));
    }

    #[test]
    fn test_own_slot_after_partial_slot() {
        let layout = layout(&[
            ("a", "uint32"),
            ("b", "uint256"),
            ("c", "uint256[1] storage ref"),
            ("d", "bool"),
            ("e", "string storage ref"),
            ("f", "uint8"),
        ]);
        assert_eq!(locations(&layout), [(0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0)]);
        assert_eq!(layout.end, StorageLocation::new(U256::from(5), 1));
    }

    #[test]
    fn test_tight_packing() {
        let layout = layout(&[
            ("owner", "address"),
            ("paused", "bool"),
            ("fee", "uint16"),
            ("limit", "uint128"),
            ("tag", "bytes4"),
        ]);
        assert_eq!(locations(&layout), [(0, 0), (0, 20), (0, 21), (1, 0), (1, 16)]);
        assert_eq!(layout.variable("fee").unwrap().footprint(), Footprint::Packed(2));
    }

    #[test]
    fn test_value_types_pack_like_their_underlying_type() {
        let layout = layout_with(
            vec![value_type("Price", "C.Price", "uint128"), value_type("Id", "Id", "uint64")],
            &[("p", "C.Price"), ("q", "uint128"), ("id", "Id"), ("ok", "bool")],
        );
        assert_eq!(locations(&layout), [(0, 0), (0, 16), (1, 0), (1, 8)]);
        assert_eq!(layout.variable("p").unwrap().type_name(), "C.Price");
    }

    #[test]
    fn test_failed_type_gets_placeholder_slot() {
        let layout = layout(&[("a", "uint8"), ("b", "uint7"), ("c", "uint8")]);
        assert_eq!(locations(&layout), [(0, 0), (1, 0), (2, 0)]);
        let b = layout.variable("b").unwrap();
        assert!(matches!(b.ty, Err(StorageError::UnresolvedType(_))));
        assert_eq!(b.type_name(), "uint7");
    }

    #[test]
    fn test_slots_used() {
        let mut allocator = LayoutAllocator::new(StorageLocation::at_slot(U256::from(10)));
        assert_eq!(allocator.slots_used(), U256::ZERO);
        allocator.allocate(&TypeDescriptor::Bool);
        assert_eq!(allocator.slots_used(), U256::from(1));
        allocator.allocate(&TypeDescriptor::String);
        assert_eq!(allocator.slots_used(), U256::from(2));
        assert_eq!(allocator.cursor(), StorageLocation::at_slot(U256::from(12)));
    }

    #[test]
    fn test_hashed_slot() {
        let expected: U256 =
            "0x290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563".parse().unwrap();
        assert_eq!(hashed_slot(U256::ZERO), expected);
    }

    #[test]
    fn test_relative_location_wraps() {
        let location = StorageLocation::new(U256::from(2), 7).relative_to(U256::MAX);
        assert_eq!(location, StorageLocation::new(U256::from(1), 7));
    }
}
