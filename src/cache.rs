use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::archive::ArchiveSource;
use crate::catalog::DatasetDescriptor;
use crate::dataset::UisDataset;
use crate::error::UisError;

/// In-process store of assembled datasets, keyed by archive location so two
/// descriptors pointing at the same archive share one entry. Entries live
/// until explicitly refreshed or invalidated; there is no expiry and no
/// size bound.
pub struct DataCache {
    source: Box<dyn ArchiveSource>,
    entries: Mutex<HashMap<String, Arc<UisDataset>>>,
}

impl DataCache {
    pub fn new(source: impl ArchiveSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the dataset for a descriptor, running the retrieval pipeline
    /// on a miss or when `refresh` is set. A failed retrieval leaves any
    /// previously stored entry in place; the replacement is only installed
    /// once fully assembled.
    pub fn get(
        &self,
        descriptor: &DatasetDescriptor,
        refresh: bool,
    ) -> Result<Arc<UisDataset>, UisError> {
        self.get_location(&descriptor.url, refresh)
    }

    pub fn get_location(
        &self,
        location: &str,
        refresh: bool,
    ) -> Result<Arc<UisDataset>, UisError> {
        if !refresh {
            if let Some(dataset) = self.entries().get(location) {
                debug!(location, "cache hit");
                return Ok(Arc::clone(dataset));
            }
        }

        info!(location, refresh, "retrieving dataset");
        let folder = self.source.fetch(location)?;
        let dataset = Arc::new(UisDataset::from_archive(folder)?);
        self.entries()
            .insert(location.to_string(), Arc::clone(&dataset));
        Ok(dataset)
    }

    /// Drop the entry for one location. Returns whether an entry existed.
    pub fn invalidate(&self, location: &str) -> bool {
        self.entries().remove(location).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<UisDataset>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
