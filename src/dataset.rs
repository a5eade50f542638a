use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::archive::ZipFolder;
use crate::error::UisError;
use crate::merge::{LabelLookup, attach_label, merge};
use crate::reshape::{annotation_rows, reshape, squash, squashed_table};
use crate::table::{Table, Value};

/// Member-name patterns of a UIS bulk archive, resolved relative to the
/// dataset code: `{code}_DATA_NATIONAL.csv`, `{code}_LABEL.csv` and so on.
const COUNTRY_DATA: &str = "DATA_NATIONAL.csv";
const REGION_DATA: &str = "DATA_REGIONAL.csv";
const COUNTRY_CONCORDANCE: &str = "COUNTRY.csv";
const REGION_CONCORDANCE: &str = "REGION.csv";
const VARIABLE_CONCORDANCE: &str = "LABEL.csv";
const METADATA: &str = "METADATA.csv";
const README: &str = "README";

/// One fully assembled dataset: the merged country table plus whatever
/// optional members the archive shipped. `None` means the member is absent
/// from the archive, which is distinct from an empty table.
#[derive(Debug, Clone)]
pub struct UisDataset {
    pub dataset_code: String,
    pub fetched_at: DateTime<Utc>,
    pub country_data: Table,
    pub region_data: Option<Table>,
    pub metadata: Option<Table>,
    pub country_concordance: Option<Table>,
    pub region_concordance: Option<Table>,
    pub variable_concordance: Option<Table>,
    pub readme: Option<String>,
}

impl UisDataset {
    /// Assemble a dataset from an unpacked archive: parse each known member,
    /// reshape the metadata and merge everything into the denormalized
    /// country table.
    pub fn from_archive(mut folder: ZipFolder) -> Result<Self, UisError> {
        let names = folder.member_names();
        let dataset_code = infer_dataset_code(&names)?;
        debug!(code = %dataset_code, members = names.len(), "assembling dataset");

        let country_concordance = read_optional(&mut folder, &names, COUNTRY_CONCORDANCE)?;
        let variable_concordance = read_optional(&mut folder, &names, VARIABLE_CONCORDANCE)?;
        let region_concordance = match read_optional(&mut folder, &names, REGION_CONCORDANCE)? {
            Some(table) => Some(split_region_groupings(table)?),
            None => None,
        };

        let country_lookup = country_concordance
            .as_ref()
            .map(|table| LabelLookup::from_table(table, "country_id", "country_name"))
            .transpose()?;
        let variable_lookup = variable_concordance
            .as_ref()
            .map(|table| LabelLookup::from_table(table, "indicator_id", "indicator_label"))
            .transpose()?;

        let (metadata, annotations) = match read_optional(&mut folder, &names, METADATA)? {
            Some(table) => {
                let rows = annotation_rows(&table)?;
                let wide = reshape(&rows);
                (Some(squashed_table(&squash(&rows))), wide)
            }
            None => (None, Default::default()),
        };

        let raw_country = match read_optional(&mut folder, &names, COUNTRY_DATA)? {
            Some(table) => table,
            None => {
                return Err(UisError::MemberNotFound {
                    member: format!("{dataset_code}_{COUNTRY_DATA}"),
                });
            }
        };
        let country_data = merge(
            &raw_country,
            country_lookup.as_ref(),
            variable_lookup.as_ref(),
            &annotations,
        )?;

        let region_data = match read_optional(&mut folder, &names, REGION_DATA)? {
            Some(mut table) => {
                if let Some(lookup) = variable_lookup.as_ref() {
                    attach_label(&mut table, "indicator_id", "indicator_label", lookup)?;
                }
                Some(table)
            }
            None => None,
        };

        let readme = match find_member(&names, README) {
            Some(name) => {
                let bytes = folder.read_member(&name)?;
                Some(String::from_utf8_lossy(&bytes).into_owned())
            }
            None => None,
        };

        info!(
            code = %dataset_code,
            rows = country_data.len(),
            regional = region_data.is_some(),
            "dataset assembled"
        );
        Ok(Self {
            dataset_code,
            fetched_at: Utc::now(),
            country_data,
            region_data,
            metadata,
            country_concordance,
            region_concordance,
            variable_concordance,
            readme,
        })
    }

    /// Country ids belonging to one region, resolved through the region
    /// concordance.
    pub fn region_countries(&self, region: &str) -> Result<Vec<String>, UisError> {
        let concordance = self
            .region_concordance
            .as_ref()
            .ok_or_else(|| UisError::Unsupported("regional data".to_string()))?;
        let region_column = concordance.require_column("region_id")?;
        let country_column = concordance.require_column("country_id")?;

        let countries: Vec<String> = concordance
            .rows()
            .iter()
            .filter(|cells| cells[region_column].key() == region)
            .map(|cells| cells[country_column].key())
            .collect();
        if countries.is_empty() {
            return Err(UisError::RegionNotFound(region.to_string()));
        }
        Ok(countries)
    }
}

/// Every member name starts with the dataset code; an archive mixing codes
/// is malformed.
fn infer_dataset_code(names: &[String]) -> Result<String, UisError> {
    let mut code: Option<String> = None;
    for name in names {
        let base = base_name(name);
        if base.is_empty() {
            continue;
        }
        let prefix = base.split('_').next().unwrap_or(base).to_string();
        match &code {
            Some(existing) if existing != &prefix => {
                return Err(UisError::Parse(format!(
                    "multiple dataset codes in archive: {existing}, {prefix}"
                )));
            }
            Some(_) => {}
            None => code = Some(prefix),
        }
    }
    code.ok_or_else(|| UisError::Parse("archive contains no members".to_string()))
}

fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn find_member(names: &[String], pattern: &str) -> Option<String> {
    names
        .iter()
        .find(|name| base_name(name).contains(pattern))
        .cloned()
}

fn read_optional(
    folder: &mut ZipFolder,
    names: &[String],
    pattern: &str,
) -> Result<Option<Table>, UisError> {
    match find_member(names, pattern) {
        Some(name) => {
            let bytes = folder.read_member(&name)?;
            Ok(Some(Table::from_csv(&bytes)?))
        }
        None => Ok(None),
    }
}

/// UIS encodes the grouping entity inside the region id, e.g.
/// `SDG: SDG region Sub-Saharan Africa`. Split it into separate
/// `grouping_entity` and `region_name` columns.
fn split_region_groupings(mut table: Table) -> Result<Table, UisError> {
    let region_column = table.require_column("region_id")?;
    let mut entities = Vec::with_capacity(table.len());
    let mut names = Vec::with_capacity(table.len());
    for cells in table.rows() {
        match cells[region_column].key().split_once(": ") {
            Some((entity, name)) => {
                entities.push(Value::Text(entity.to_string()));
                names.push(Value::Text(name.to_string()));
            }
            None => {
                entities.push(Value::Null);
                names.push(Value::Null);
            }
        }
    }
    table.add_column("grouping_entity", entities)?;
    table.add_column("region_name", names)?;
    Ok(table)
}
