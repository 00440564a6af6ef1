use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;

use crate::{
    ast::SourceForest,
    config::DecoderConfig,
    decoder::ValueDecoder,
    error::{Result, StorageError},
    layout::ContractLayout,
    resolver::ContractTypeResolver,
    snapshot::StorageSnapshot,
    value::{DecodedState, DecodedVariable},
};

type LayoutCell = Arc<OnceCell<Arc<ContractLayout>>>;

/// Decodes the storage of the contracts of one compilation.
///
/// Layouts are computed on first use and shared afterwards. Concurrent first requests for
/// the same contract compute its layout once; the others wait for it.
#[derive(Debug)]
pub struct StorageDecoder {
    sources: SourceForest,
    config: DecoderConfig,
    layouts: Mutex<FxHashMap<String, LayoutCell>>,
}

impl StorageDecoder {
    pub fn new(sources: SourceForest) -> Self {
        Self::with_config(sources, DecoderConfig::default())
    }

    pub fn with_config(sources: SourceForest, config: DecoderConfig) -> Self {
        Self { sources, config, layouts: Mutex::default() }
    }

    pub fn sources(&self) -> &SourceForest {
        &self.sources
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// The storage layout of `contract`, computed on first use.
    pub fn layout(&self, contract: &str) -> Result<Arc<ContractLayout>> {
        let cell = self
            .layouts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(contract.to_string())
            .or_default()
            .clone();

        // the map lock is released here, only requests for this contract wait on the cell
        if let Some(layout) = cell.get() {
            trace!("layout cache hit for {contract}");
            return Ok(layout.clone());
        }

        cell.get_or_try_init(|| {
            debug!("computing storage layout of {contract}");
            let resolved = ContractTypeResolver::new(&self.sources).resolve(contract)?;
            Ok(Arc::new(ContractLayout::build(&resolved)))
        })
        .cloned()
        .inspect_err(|_| self.forget_failed(contract, &cell))
    }

    /// Drop the entry of a failed resolution, unless it was replaced or filled meanwhile.
    fn forget_failed(&self, contract: &str, cell: &LayoutCell) {
        let mut layouts = self.layouts.lock().unwrap_or_else(PoisonError::into_inner);
        if layouts
            .get(contract)
            .is_some_and(|existing| Arc::ptr_eq(existing, cell) && existing.get().is_none())
        {
            layouts.remove(contract);
        }
    }

    pub fn decode_state(&self, contract: &str, snapshot: &StorageSnapshot) -> Result<DecodedState> {
        let layout = self.layout(contract)?;
        Ok(ValueDecoder::new(snapshot, &self.config).decode_state(&layout))
    }

    pub fn decode_variable(
        &self,
        contract: &str,
        name: &str,
        snapshot: &StorageSnapshot,
    ) -> Result<DecodedVariable> {
        let layout = self.layout(contract)?;
        let variable = layout.variable(name).ok_or_else(|| StorageError::UnknownVariable {
            contract: contract.to_string(),
            name: name.to_string(),
        })?;
        Ok(ValueDecoder::new(snapshot, &self.config).decode_variable(variable))
    }

    /// Drop the cached layout of `contract`. Returns whether there was one.
    pub fn invalidate(&self, contract: &str) -> bool {
        let removed = self.layouts.lock().unwrap_or_else(PoisonError::into_inner).remove(contract);
        removed.is_some_and(|cell| cell.get().is_some())
    }
}
