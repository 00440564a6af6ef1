use alloy_primitives::{Address, Bytes, I256, U256};

use crate::{
    config::{DecoderConfig, StringEncoding},
    error::StorageError,
    layout::{hashed_slot, ContractLayout, LayoutAllocator, StateVariable, StorageLocation, WORD_SIZE},
    snapshot::StorageSnapshot,
    types::{ArraySize, TypeDescriptor},
    value::{DecodedState, DecodedValue, DecodedVariable},
};

/// Reads typed values out of a storage snapshot.
///
/// Decoding never fails as a whole: a field that cannot be decoded becomes a
/// [`DecodedValue::Error`] and its siblings are decoded as usual.
#[derive(Clone, Copy, Debug)]
pub struct ValueDecoder<'a> {
    snapshot: &'a StorageSnapshot,
    config: &'a DecoderConfig,
}

impl<'a> ValueDecoder<'a> {
    pub fn new(snapshot: &'a StorageSnapshot, config: &'a DecoderConfig) -> Self {
        Self { snapshot, config }
    }

    pub fn decode_state(&self, layout: &ContractLayout) -> DecodedState {
        DecodedState {
            contract: layout.contract.clone(),
            variables: layout.variables.iter().map(|variable| self.decode_variable(variable)).collect(),
        }
    }

    pub fn decode_variable(&self, variable: &StateVariable) -> DecodedVariable {
        let value = match &variable.ty {
            Ok(ty) => self.decode(ty, variable.location),
            Err(err) => DecodedValue::Error(err.clone()),
        };
        DecodedVariable {
            name: variable.name.clone(),
            type_name: variable.type_name(),
            location: variable.location,
            value,
        }
    }

    pub fn decode(&self, ty: &TypeDescriptor, location: StorageLocation) -> DecodedValue {
        match ty {
            TypeDescriptor::Uint { bits } => {
                DecodedValue::Uint(self.read_uint(location, usize::from(*bits) / 8))
            }
            TypeDescriptor::Int { bits } => {
                let raw = self.read_uint(location, usize::from(*bits) / 8);
                DecodedValue::Int(sign_extend(raw, usize::from(*bits)))
            }
            TypeDescriptor::Bool => DecodedValue::Bool(!self.read_uint(location, 1).is_zero()),
            TypeDescriptor::Address => {
                DecodedValue::Address(Address::left_padding_from(&self.read_bytes(location, 20)))
            }
            TypeDescriptor::FixedBytes { size } => {
                DecodedValue::FixedBytes(Bytes::copy_from_slice(&self.read_bytes(location, *size)))
            }
            TypeDescriptor::Enum(ty) => {
                let ordinal = self.read_uint(location, 1);
                match ty.values.get(ordinal.to::<usize>()) {
                    Some(name) => DecodedValue::Enum(name.clone()),
                    None => {
                        StorageError::EnumOutOfRange { name: ty.name.clone(), ordinal }.into()
                    }
                }
            }
            TypeDescriptor::Struct(ty) => DecodedValue::Struct(
                ty.members
                    .iter()
                    .map(|member| {
                        let value = match &member.ty {
                            Ok(member_ty) => {
                                self.decode(member_ty, member.location.relative_to(location.slot))
                            }
                            Err(err) => DecodedValue::Error(err.clone()),
                        };
                        (member.name.clone(), value)
                    })
                    .collect(),
            ),
            TypeDescriptor::Array { element, size: ArraySize::Fixed(length) } => {
                self.decode_elements(element, location.slot, *length)
            }
            TypeDescriptor::Array { element, size: ArraySize::Dynamic } => {
                let length = U256::from_be_bytes(self.snapshot.get(location.slot).0);
                self.decode_elements(element, hashed_slot(location.slot), length)
            }
            TypeDescriptor::Bytes => {
                let (raw, length, truncated) = self.read_dynamic_bytes(location.slot);
                DecodedValue::Bytes { raw, length, truncated }
            }
            TypeDescriptor::String => {
                let (raw, length, truncated) = self.read_dynamic_bytes(location.slot);
                let value = raw.iter().copied().map(char::from).collect();
                DecodedValue::String { value, raw, length, truncated }
            }
            TypeDescriptor::ValueType { underlying, .. } => self.decode(underlying, location),
            TypeDescriptor::Unsupported { type_name, .. } => {
                StorageError::UnresolvedType(type_name.clone()).into()
            }
        }
    }

    /// Elements are placed exactly as the allocator places consecutive entries, starting at
    /// offset 0 of `base`.
    fn decode_elements(&self, element: &TypeDescriptor, base: U256, length: U256) -> DecodedValue {
        let limit = self.config.max_array_elements;
        let count = if length > U256::from(limit) { limit } else { length.to::<usize>() };
        let truncated = U256::from(count) < length;
        if truncated {
            warn!("array of {element} at slot {base} has {length} elements, decoding the first {count}");
        }

        let footprint = element.footprint();
        let mut allocator = LayoutAllocator::new(StorageLocation::at_slot(base));
        let elements = (0..count)
            .map(|_| self.decode(element, allocator.allocate_footprint(footprint)))
            .collect();

        DecodedValue::Array { length, elements, truncated }
    }

    /// Returns the content, the stored length and whether the content was cut short.
    fn read_dynamic_bytes(&self, slot: U256) -> (Bytes, U256, bool) {
        let header = self.snapshot.get(slot);
        let data_slot = hashed_slot(slot);
        let long_form = match self.config.string_encoding {
            StringEncoding::LowBit => header[WORD_SIZE - 1] & 1 == 1,
            StringEncoding::SlotPresence => self.snapshot.contains(data_slot),
        };
        let limit = self.config.max_bytes_length;

        if !long_form {
            // short form: content left-aligned, `2 * length` in the lowest byte
            let length = usize::from(header[WORD_SIZE - 1] / 2).min(WORD_SIZE - 1);
            let count = length.min(limit);
            return (Bytes::copy_from_slice(&header[..count]), U256::from(length), count < length);
        }

        let length = U256::from_be_bytes(header.0) >> 1usize;
        let count = if length > U256::from(limit) { limit } else { length.to::<usize>() };
        let truncated = U256::from(count) < length;
        if truncated {
            warn!("byte string at slot {slot} is {length} bytes long, reading the first {count}");
        }
        trace!("reading {count} bytes of long-form data at slot {data_slot}");

        let mut raw = Vec::with_capacity(count.next_multiple_of(WORD_SIZE));
        let mut next = data_slot;
        while raw.len() < count {
            raw.extend_from_slice(self.snapshot.get(next).as_slice());
            next = next.wrapping_add(U256::from(1));
        }
        raw.truncate(count);
        (raw.into(), length, truncated)
    }

    /// The `size` bytes ending `location.offset` bytes before the end of the word, clamped to
    /// the word.
    fn read_bytes(&self, location: StorageLocation, size: usize) -> Vec<u8> {
        let word = self.snapshot.get(location.slot);
        let end = WORD_SIZE.saturating_sub(location.offset);
        let start = end.saturating_sub(size);
        word[start..end].to_vec()
    }

    fn read_uint(&self, location: StorageLocation, size: usize) -> U256 {
        U256::from_be_slice(&self.read_bytes(location, size))
    }
}

/// Reinterpret the low `bits` bits of `raw` as a two's complement number.
fn sign_extend(raw: U256, bits: usize) -> I256 {
    if bits > 0 && bits < 256 && raw.bit(bits - 1) {
        I256::from_raw(raw | (U256::MAX << bits))
    } else {
        I256::from_raw(raw)
    }
}
