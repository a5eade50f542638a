use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::UisError;

const BULK_BASE_URL: &str =
    "https://apimgmtstzgjpfeq2u763lag.blob.core.windows.net/content/MediaLibrary/bdds";

/// One retrievable dataset in the UIS bulk download service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub name: String,
    pub code: String,
    pub category: String,
    /// Canonical archive address; also the cache key.
    pub url: String,
    /// Whether UIS publishes regional aggregates for this dataset.
    pub regional: bool,
}

/// Static reference table of the published bulk datasets. Loaded once and
/// never written.
#[derive(Debug, Clone)]
pub struct Catalog {
    datasets: Vec<DatasetDescriptor>,
}

impl Catalog {
    /// The bulk datasets UIS currently publishes.
    pub fn bundled() -> Self {
        let entries: [(&str, &str, &str, bool); 9] = [
            ("SDG Global and Thematic Indicators", "SDG", "Education", true),
            ("Other Policy Relevant Indicators (OPRI)", "OPRI", "Education", true),
            ("Research and Development (R&D)", "SCI", "Science", true),
            ("Innovation", "INNO", "Science", false),
            ("Cultural Employment", "CLTE", "Culture", false),
            ("Feature Films", "FILM", "Culture", false),
            ("Cultural Trade", "CLTT", "Culture", false),
            ("SDG 11", "SDG11", "Culture", false),
            ("Demographic and Socio-economic Indicators", "DEM", "External", false),
        ];
        Self {
            datasets: entries
                .into_iter()
                .map(|(name, code, category, regional)| DatasetDescriptor {
                    name: name.to_string(),
                    code: code.to_string(),
                    category: category.to_string(),
                    url: format!("{BULK_BASE_URL}/{code}.zip"),
                    regional,
                })
                .collect(),
        }
    }

    /// Build a catalog from caller-supplied descriptors. Codes must be
    /// unique.
    pub fn from_descriptors(datasets: Vec<DatasetDescriptor>) -> Result<Self, UisError> {
        let mut seen = HashSet::new();
        for descriptor in &datasets {
            if !seen.insert(descriptor.code.clone()) {
                return Err(UisError::InvalidCatalog(format!(
                    "duplicate dataset code: {}",
                    descriptor.code
                )));
            }
        }
        Ok(Self { datasets })
    }

    pub fn datasets(&self) -> &[DatasetDescriptor] {
        &self.datasets
    }

    /// Map a dataset name or code to its descriptor. Codes match
    /// case-insensitively; names must match exactly.
    pub fn resolve(&self, name_or_code: &str) -> Result<&DatasetDescriptor, UisError> {
        if let Some(descriptor) = self
            .datasets
            .iter()
            .find(|descriptor| descriptor.name == name_or_code)
        {
            return Ok(descriptor);
        }
        if let Some(descriptor) = self
            .datasets
            .iter()
            .find(|descriptor| descriptor.code.eq_ignore_ascii_case(name_or_code))
        {
            return Ok(descriptor);
        }
        Err(UisError::DatasetNotFound {
            name: name_or_code.to_string(),
            available: self
                .datasets
                .iter()
                .map(|descriptor| format!("{} ({})", descriptor.name, descriptor.code))
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}
