use std::collections::HashMap;

use tracing::warn;

use crate::error::UisError;
use crate::reshape::AnnotationTable;
use crate::table::{Table, Value};

/// Mapping from a coded identifier to its display name, built from a
/// two-column concordance table. Duplicate codes keep the first occurrence;
/// a conflicting second name is a data-quality problem in the source and is
/// logged, not fatal.
#[derive(Debug, Clone, Default)]
pub struct LabelLookup {
    names: HashMap<String, String>,
}

impl LabelLookup {
    pub fn from_table(
        table: &Table,
        key_column: &str,
        name_column: &str,
    ) -> Result<Self, UisError> {
        let key = table.require_column(key_column)?;
        let name = table.require_column(name_column)?;

        let mut names = HashMap::with_capacity(table.len());
        for cells in table.rows() {
            let code = cells[key].key();
            let label = cells[name].to_string();
            if let Some(existing) = names.get(&code) {
                if existing != &label {
                    warn!(code = %code, "duplicate code in {key_column} lookup, keeping first name");
                }
                continue;
            }
            names.insert(code, label);
        }
        Ok(Self { names })
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Append a display-name column resolved through a lookup. Codes without a
/// match yield null cells; partial concordance coverage is expected.
pub fn attach_label(
    table: &mut Table,
    key_column: &str,
    label_column: &str,
    lookup: &LabelLookup,
) -> Result<(), UisError> {
    let key = table.require_column(key_column)?;
    let labels = table
        .rows()
        .iter()
        .map(|cells| match lookup.get(&cells[key].key()) {
            Some(name) => Value::Text(name.to_string()),
            None => Value::Null,
        })
        .collect();
    table.add_column(label_column, labels)
}

/// Join raw observations with label lookups and wide-format metadata into
/// the denormalized country dataset.
///
/// Column order in the result: the original value columns, then
/// `indicator_label` and `country_name`, then one column per annotation type
/// in first-seen order. The left join on (indicator_id, country_id, year)
/// neither duplicates nor drops rows: the output row count always equals
/// the input row count.
pub fn merge(
    values: &Table,
    country_labels: Option<&LabelLookup>,
    indicator_labels: Option<&LabelLookup>,
    annotations: &AnnotationTable,
) -> Result<Table, UisError> {
    let mut merged = values.clone();

    if let Some(lookup) = indicator_labels {
        attach_label(&mut merged, "indicator_id", "indicator_label", lookup)?;
    }
    if let Some(lookup) = country_labels {
        attach_label(&mut merged, "country_id", "country_name", lookup)?;
    }

    if annotations.annotation_columns().is_empty() {
        return Ok(merged);
    }

    let indicator = merged.require_column("indicator_id")?;
    let country = merged.require_column("country_id")?;
    let year = merged.require_column("year")?;

    let width = annotations.annotation_columns().len();
    let mut joined: Vec<Vec<Value>> = vec![Vec::with_capacity(merged.len()); width];
    for cells in merged.rows() {
        let key = (
            cells[indicator].key(),
            cells[country].key(),
            cells[year].key(),
        );
        match annotations.get(&key) {
            Some(annotation_cells) => {
                for (column, cell) in joined.iter_mut().zip(annotation_cells) {
                    column.push(match cell {
                        Some(text) => Value::Text(text.clone()),
                        None => Value::Null,
                    });
                }
            }
            None => {
                for column in &mut joined {
                    column.push(Value::Null);
                }
            }
        }
    }

    for (name, column) in annotations.annotation_columns().iter().zip(joined) {
        merged.add_column(name, column)?;
    }
    Ok(merged)
}
