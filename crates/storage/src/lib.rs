//! # edb-storage
//!
//! Reconstructs how solc packed a contract's state variables into storage and decodes a
//! snapshot of raw storage words back into typed values.
//!
//! The pipeline runs one way:
//!
//! AST → [`ContractTypeResolver`] → [`TypeBuilder`] → [`LayoutAllocator`] → [`ValueDecoder`]
//!
//! [`StorageDecoder`] ties the stages together and caches one [`ContractLayout`] per contract
//! for the lifetime of a compilation result.

#[macro_use]
extern crate tracing;

pub mod ast;
pub mod config;
pub mod decoder;
pub mod error;
pub mod layout;
pub mod resolver;
pub mod session;
pub mod snapshot;
pub mod types;
pub mod value;

pub use ast::SourceForest;
pub use config::{DecoderConfig, StringEncoding};
pub use decoder::ValueDecoder;
pub use error::{Result, StorageError};
pub use layout::{ContractLayout, LayoutAllocator, StateVariable, StorageLocation};
pub use resolver::{ContractTypeResolver, DefinitionIndex, ResolvedContract};
pub use session::StorageDecoder;
pub use snapshot::StorageSnapshot;
pub use types::{ArraySize, Footprint, TypeBuilder, TypeDescriptor};
pub use value::{DecodedState, DecodedValue, DecodedVariable};
