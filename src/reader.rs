use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::cache::DataCache;
use crate::catalog::{Catalog, DatasetDescriptor};
use crate::dataset::UisDataset;
use crate::error::UisError;
use crate::table::Table;

/// Default projection for country-level rows, without metadata columns.
const COUNTRY_COLUMNS: [&str; 6] = [
    "country_id",
    "country_name",
    "indicator_id",
    "indicator_label",
    "year",
    "value",
];

/// Default projection for region-level rows.
const REGION_COLUMNS: [&str; 5] = [
    "region_id",
    "indicator_id",
    "indicator_label",
    "year",
    "value",
];

/// Read-only view over one dataset. Construction resolves the descriptor
/// but performs no I/O; the first data access triggers retrieval through
/// the shared cache. Several readers bound to the same archive share the
/// cached dataset, so a `refresh` on one is visible to the others on their
/// next access.
pub struct Uis {
    descriptor: DatasetDescriptor,
    cache: Arc<DataCache>,
}

impl std::fmt::Debug for Uis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uis")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl Uis {
    pub fn new(catalog: &Catalog, cache: Arc<DataCache>, dataset: &str) -> Result<Self, UisError> {
        let descriptor = catalog.resolve(dataset)?.clone();
        Ok(Self { descriptor, cache })
    }

    pub fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn code(&self) -> &str {
        &self.descriptor.code
    }

    pub fn category(&self) -> &str {
        &self.descriptor.category
    }

    /// Re-run retrieval for the bound dataset. On failure the previously
    /// cached data stays bound; the view never ends up half refreshed.
    pub fn refresh(&self) -> Result<(), UisError> {
        self.cache.get(&self.descriptor, true)?;
        info!(code = %self.descriptor.code, "dataset refreshed");
        Ok(())
    }

    fn data(&self) -> Result<Arc<UisDataset>, UisError> {
        self.cache.get(&self.descriptor, false)
    }

    /// Country-level rows, optionally filtered to one region. With
    /// `include_metadata` the full merged column set is returned; otherwise
    /// the fixed default projection.
    pub fn country_data(
        &self,
        include_metadata: bool,
        region: Option<&str>,
    ) -> Result<Table, UisError> {
        let data = self.data()?;
        let table = match region {
            Some(region) => {
                let members: HashSet<String> =
                    data.region_countries(region)?.into_iter().collect();
                let country = data.country_data.require_column("country_id")?;
                data.country_data
                    .filtered(|cells| members.contains(&cells[country].key()))
            }
            None => data.country_data.clone(),
        };
        if include_metadata {
            Ok(table)
        } else {
            table.select(&COUNTRY_COLUMNS)
        }
    }

    /// Region-level aggregated rows, if the dataset publishes them.
    pub fn region_data(&self, include_metadata: bool) -> Result<Table, UisError> {
        let data = self.data()?;
        let table = data
            .region_data
            .as_ref()
            .ok_or_else(|| UisError::Unsupported("regional data".to_string()))?;
        if include_metadata {
            Ok(table.clone())
        } else {
            table.select(&REGION_COLUMNS)
        }
    }

    /// The long-format metadata table with duplicate keys squashed.
    pub fn metadata(&self) -> Result<Table, UisError> {
        let data = self.data()?;
        data.metadata
            .clone()
            .ok_or_else(|| UisError::Unsupported("metadata".to_string()))
    }

    pub fn countries(&self) -> Result<Table, UisError> {
        let data = self.data()?;
        data.country_concordance
            .clone()
            .ok_or_else(|| UisError::Unsupported("information about countries".to_string()))
    }

    pub fn regions(&self) -> Result<Table, UisError> {
        let data = self.data()?;
        data.region_concordance
            .clone()
            .ok_or_else(|| UisError::Unsupported("information about regions".to_string()))
    }

    pub fn variables(&self) -> Result<Table, UisError> {
        let data = self.data()?;
        data.variable_concordance
            .clone()
            .ok_or_else(|| UisError::Unsupported("information about variables".to_string()))
    }

    pub fn readme(&self) -> Result<String, UisError> {
        let data = self.data()?;
        data.readme
            .clone()
            .ok_or_else(|| UisError::Unsupported("the readme file".to_string()))
    }
}
