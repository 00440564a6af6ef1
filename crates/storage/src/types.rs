//! Structured descriptors for declared types, built from solc type strings.

use std::{fmt, sync::Arc};

use alloy_primitives::U256;
use rustc_hash::FxHashMap;

use crate::{
    ast::VariableDeclarationExt,
    error::{Result, StorageError},
    layout::{LayoutAllocator, StorageLocation, WORD_SIZE},
    resolver::DefinitionIndex,
};

/// Location qualifiers solc appends to type strings. None of them affect storage layout.
const QUALIFIERS: [&str; 7] = ["storage", "ref", "pointer", "memory", "calldata", "slice", "payable"];

/// How much storage a value of some type takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Footprint {
    /// A value of this many bytes that can share a slot with its neighbours.
    Packed(usize),
    /// Whole slots, always starting at offset 0 of a fresh slot.
    Slots(U256),
}

impl Footprint {
    pub fn needs_own_slot(&self) -> bool {
        matches!(self, Self::Slots(_))
    }

    /// Width in bytes.
    pub fn bytes(&self) -> U256 {
        match *self {
            Self::Packed(size) => U256::from(size),
            Self::Slots(slots) => slots.saturating_mul(U256::from(WORD_SIZE)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArraySize {
    Fixed(U256),
    Dynamic,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDescriptor {
    Uint { bits: u16 },
    Int { bits: u16 },
    Bool,
    Address,
    FixedBytes { size: usize },
    Bytes,
    String,
    Enum(Arc<EnumType>),
    Struct(Arc<StructType>),
    Array { element: Box<TypeDescriptor>, size: ArraySize },
    /// A user-defined value type, stored exactly like its underlying type.
    ValueType { name: String, underlying: Box<TypeDescriptor> },
    /// Mappings, function types and the like. They are placed like any other type but
    /// cannot be decoded.
    Unsupported { type_name: String, footprint: Footprint },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructType {
    pub name: String,
    pub members: Vec<StructMember>,
    /// Whole slots spanned by the members, at least one.
    pub slots: U256,
}

impl StructType {
    pub fn member(&self, name: &str) -> Option<&StructMember> {
        self.members.iter().find(|member| member.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructMember {
    pub name: String,
    pub ty: Result<TypeDescriptor>,
    /// Relative to the slot the struct instance starts at.
    pub location: StorageLocation,
}

impl TypeDescriptor {
    pub fn footprint(&self) -> Footprint {
        match self {
            Self::Uint { bits } | Self::Int { bits } => Footprint::Packed(usize::from(*bits) / 8),
            Self::Bool | Self::Enum(_) => Footprint::Packed(1),
            Self::Address => Footprint::Packed(20),
            Self::FixedBytes { size } => Footprint::Packed(*size),
            Self::Bytes | Self::String => Footprint::Slots(U256::from(1)),
            Self::Struct(ty) => Footprint::Slots(ty.slots),
            Self::Array { size: ArraySize::Dynamic, .. } => Footprint::Slots(U256::from(1)),
            Self::Array { element, size: ArraySize::Fixed(len) } => match element.footprint() {
                Footprint::Packed(size) => {
                    let per_slot = U256::from(WORD_SIZE / size);
                    let (slots, rest) = (*len / per_slot, *len % per_slot);
                    Footprint::Slots(if rest.is_zero() { slots } else { slots + U256::from(1) })
                }
                Footprint::Slots(slots) => Footprint::Slots(len.saturating_mul(slots)),
            },
            Self::ValueType { underlying, .. } => underlying.footprint(),
            Self::Unsupported { footprint, .. } => *footprint,
        }
    }

    pub fn needs_own_slot(&self) -> bool {
        self.footprint().needs_own_slot()
    }

    pub fn storage_bytes(&self) -> U256 {
        self.footprint().bytes()
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Bytes | Self::String | Self::Array { size: ArraySize::Dynamic, .. })
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint { bits } => write!(f, "uint{bits}"),
            Self::Int { bits } => write!(f, "int{bits}"),
            Self::Bool => f.write_str("bool"),
            Self::Address => f.write_str("address"),
            Self::FixedBytes { size } => write!(f, "bytes{size}"),
            Self::Bytes => f.write_str("bytes"),
            Self::String => f.write_str("string"),
            Self::Enum(ty) => write!(f, "enum {}", ty.name),
            Self::Struct(ty) => write!(f, "struct {}", ty.name),
            Self::Array { element, size: ArraySize::Fixed(len) } => write!(f, "{element}[{len}]"),
            Self::Array { element, size: ArraySize::Dynamic } => write!(f, "{element}[]"),
            Self::ValueType { name, .. } => f.write_str(name),
            Self::Unsupported { type_name, .. } => f.write_str(type_name),
        }
    }
}

/// Builds [`TypeDescriptor`]s for the type strings of one contract.
///
/// Struct descriptors are memoised, so every variable of the same struct type shares one
/// laid-out member list.
pub struct TypeBuilder<'a> {
    definitions: &'a DefinitionIndex,
    structs: FxHashMap<String, Arc<StructType>>,
    resolving: Vec<String>,
}

impl<'a> TypeBuilder<'a> {
    pub fn new(definitions: &'a DefinitionIndex) -> Self {
        Self { definitions, structs: FxHashMap::default(), resolving: Vec::new() }
    }

    /// Build the descriptor of a declared type string such as `int16[3][] storage ref`.
    pub fn build(&mut self, declared: &str) -> Result<TypeDescriptor> {
        let ty = normalize_type_string(declared);
        self.classify(&ty)
    }

    fn classify(&mut self, ty: &str) -> Result<TypeDescriptor> {
        // `T[inner][outer]`: the rightmost dimension is the outermost array.
        if let Some((element, size)) = split_outer_array(ty)? {
            let element = self.classify(element)?;
            return Ok(TypeDescriptor::Array { element: Box::new(element), size });
        }

        if ty.starts_with("mapping") {
            return Ok(unsupported(ty, Footprint::Slots(U256::from(1))));
        }
        if ty.starts_with("function") {
            let size = if ty.split_whitespace().any(|token| token == "external") { 24 } else { 8 };
            return Ok(unsupported(ty, Footprint::Packed(size)));
        }
        if let Some(name) = ty.strip_prefix("struct ") {
            return self.struct_type(name.trim());
        }
        if let Some(name) = ty.strip_prefix("enum ") {
            return self.enum_type(name.trim());
        }
        if ty.starts_with("contract ") || ty.starts_with("interface ") {
            return Ok(TypeDescriptor::Address);
        }
        if let Some(underlying) = self.definitions.value_type(ty) {
            let underlying = elementary(&normalize_type_string(underlying))?;
            return Ok(TypeDescriptor::ValueType {
                name: ty.to_string(),
                underlying: Box::new(underlying),
            });
        }

        elementary(ty)
    }

    fn struct_type(&mut self, name: &str) -> Result<TypeDescriptor> {
        if let Some(ty) = self.structs.get(name) {
            return Ok(TypeDescriptor::Struct(ty.clone()));
        }
        if self.resolving.iter().any(|resolving| resolving == name) {
            debug!("struct {name} contains itself, cutting the recursive member");
            return Ok(unsupported(&format!("struct {name}"), Footprint::Slots(U256::from(1))));
        }

        let definitions = self.definitions;
        let definition = definitions
            .struct_definition(name)
            .ok_or_else(|| StorageError::MissingMemberDefinition(format!("struct {name}")))?;

        self.resolving.push(name.to_string());
        let mut allocator = LayoutAllocator::default();
        let mut members = Vec::with_capacity(definition.members.len());
        for member in &definition.members {
            let ty = match member.declared_type() {
                Some(declared) => self.build(declared),
                None => Err(StorageError::UnresolvedType(format!(
                    "member {} of struct {name} has no type",
                    member.name
                ))),
            };
            let footprint = match &ty {
                Ok(ty) => ty.footprint(),
                Err(err) => {
                    warn!("member {} of struct {name}: {err}", member.name);
                    Footprint::Slots(U256::from(1))
                }
            };
            let location = allocator.allocate_footprint(footprint);
            members.push(StructMember { name: member.name.clone(), ty, location });
        }
        self.resolving.pop();

        let ty = Arc::new(StructType {
            name: name.to_string(),
            members,
            slots: allocator.slots_used().max(U256::from(1)),
        });
        trace!("struct {name} spans {} slots", ty.slots);

        // A struct built while another one is open may have had a cycle cut, which depends
        // on where it was reached from.
        if self.resolving.is_empty() {
            self.structs.insert(name.to_string(), ty.clone());
        }
        Ok(TypeDescriptor::Struct(ty))
    }

    fn enum_type(&self, name: &str) -> Result<TypeDescriptor> {
        let definition = self
            .definitions
            .enum_definition(name)
            .ok_or_else(|| StorageError::MissingMemberDefinition(format!("enum {name}")))?;
        Ok(TypeDescriptor::Enum(Arc::new(EnumType {
            name: name.to_string(),
            values: definition.members.iter().map(|value| value.name.clone()).collect(),
        })))
    }
}

fn unsupported(ty: &str, footprint: Footprint) -> TypeDescriptor {
    debug!("{ty} cannot be decoded from storage");
    TypeDescriptor::Unsupported { type_name: ty.to_string(), footprint }
}

/// Drop location qualifiers, wherever they appear:
/// `struct C.S storage ref[3] storage ref` becomes `struct C.S[3]`, and
/// `mapping(uint256 => struct C.S storage ref)` becomes `mapping(uint256 => struct C.S)`.
pub fn normalize_type_string(declared: &str) -> String {
    let mut normalized = String::with_capacity(declared.len());
    for token in declared.split_whitespace() {
        let (word, suffix) =
            token.find(|c| c == '[' || c == ')').map_or((token, ""), |at| token.split_at(at));
        if QUALIFIERS.contains(&word) {
            normalized.push_str(suffix);
            continue;
        }
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        normalized.push_str(token);
    }
    normalized
}

fn split_outer_array(ty: &str) -> Result<Option<(&str, ArraySize)>> {
    let Some(inner) = ty.strip_suffix(']') else { return Ok(None) };
    let unresolved = || StorageError::UnresolvedType(ty.to_string());

    let open = inner.rfind('[').ok_or_else(unresolved)?;
    let element = inner[..open].trim_end();
    if element.is_empty() {
        return Err(unresolved());
    }

    let size = match inner[open + 1..].trim() {
        "" => ArraySize::Dynamic,
        len => ArraySize::Fixed(len.parse::<U256>().map_err(|_| unresolved())?),
    };
    Ok(Some((element, size)))
}

fn elementary(ty: &str) -> Result<TypeDescriptor> {
    let unresolved = || StorageError::UnresolvedType(ty.to_string());

    let descriptor = match ty {
        "bool" => TypeDescriptor::Bool,
        "address" => TypeDescriptor::Address,
        "string" => TypeDescriptor::String,
        "bytes" => TypeDescriptor::Bytes,
        "byte" => TypeDescriptor::FixedBytes { size: 1 },
        "uint" => TypeDescriptor::Uint { bits: 256 },
        "int" => TypeDescriptor::Int { bits: 256 },
        "fixed" | "ufixed" => unsupported(ty, Footprint::Packed(16)),
        _ => {
            if let Some(bits) = ty.strip_prefix("uint") {
                TypeDescriptor::Uint { bits: integer_width(bits).ok_or_else(unresolved)? }
            } else if let Some(bits) = ty.strip_prefix("int") {
                TypeDescriptor::Int { bits: integer_width(bits).ok_or_else(unresolved)? }
            } else if let Some(size) = ty.strip_prefix("bytes") {
                let size = size
                    .parse::<usize>()
                    .ok()
                    .filter(|size| (1..=WORD_SIZE).contains(size))
                    .ok_or_else(unresolved)?;
                TypeDescriptor::FixedBytes { size }
            } else if let Some(dims) = ty.strip_prefix("ufixed").or_else(|| ty.strip_prefix("fixed")) {
                // fixedMxN: M bits, N decimals
                let bits = dims.split_once('x').and_then(|(bits, _)| integer_width(bits));
                unsupported(ty, Footprint::Packed(usize::from(bits.ok_or_else(unresolved)?) / 8))
            } else if is_identifier(ty) {
                unsupported(ty, Footprint::Slots(U256::from(1)))
            } else {
                return Err(unresolved());
            }
        }
    };
    Ok(descriptor)
}

fn integer_width(bits: &str) -> Option<u16> {
    bits.parse::<u16>().ok().filter(|bits| bits % 8 == 0 && (8..=256).contains(bits))
}

fn is_identifier(ty: &str) -> bool {
    let mut chars = ty.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$') &&
        chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
}
