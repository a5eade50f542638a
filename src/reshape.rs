use std::collections::HashMap;

use crate::error::UisError;
use crate::table::{Table, Value};

/// One long-format metadata fact: a typed annotation attached to a single
/// observation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRow {
    pub indicator_id: String,
    pub country_id: String,
    pub year: Value,
    pub annotation_type: String,
    pub text: String,
}

/// Join key of the observation an annotation belongs to.
pub type ObsKey = (String, String, String);

impl AnnotationRow {
    pub fn obs_key(&self) -> ObsKey {
        (
            self.indicator_id.clone(),
            self.country_id.clone(),
            self.year.key(),
        )
    }
}

/// Wide-format metadata: one row per observation, one column per annotation
/// type seen in the source. The column set is data dependent.
#[derive(Debug, Clone, Default)]
pub struct AnnotationTable {
    annotation_columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    index: HashMap<ObsKey, usize>,
}

impl AnnotationTable {
    pub fn annotation_columns(&self) -> &[String] {
        &self.annotation_columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &ObsKey) -> Option<&[Option<String>]> {
        self.index.get(key).map(|&row| self.rows[row].as_slice())
    }
}

/// Extract long-format annotation rows from a parsed `METADATA.csv` table.
/// Rows with an empty annotation cell carry no information and are dropped.
pub fn annotation_rows(table: &Table) -> Result<Vec<AnnotationRow>, UisError> {
    let indicator = table.require_column("indicator_id")?;
    let country = table.require_column("country_id")?;
    let year = table.require_column("year")?;
    let annotation_type = table.require_column("type")?;
    let text = table.require_column("metadata")?;

    let mut rows = Vec::with_capacity(table.len());
    for cells in table.rows() {
        if cells[text].is_null() {
            continue;
        }
        rows.push(AnnotationRow {
            indicator_id: cells[indicator].key(),
            country_id: cells[country].key(),
            year: cells[year].clone(),
            annotation_type: cells[annotation_type].key(),
            text: cells[text].to_string(),
        });
    }
    Ok(rows)
}

/// Collapse rows sharing the same (indicator, country, year, type) key into
/// one, joining the texts with `" / "` in original row order. Grouping is
/// stable: groups appear in first-seen order and values are never sorted.
/// Annotation types are matched exactly, with no case or whitespace
/// normalization.
pub fn squash(rows: &[AnnotationRow]) -> Vec<AnnotationRow> {
    let mut order: Vec<AnnotationRow> = Vec::new();
    let mut seen: HashMap<(ObsKey, String), usize> = HashMap::new();

    for row in rows {
        let key = (row.obs_key(), row.annotation_type.clone());
        match seen.get(&key) {
            Some(&at) => {
                let joined = &mut order[at].text;
                joined.push_str(" / ");
                joined.push_str(&row.text);
            }
            None => {
                seen.insert(key, order.len());
                order.push(row.clone());
            }
        }
    }
    order
}

/// Render squashed rows back into a long-format table, the shape served by
/// the metadata projection.
pub fn squashed_table(rows: &[AnnotationRow]) -> Table {
    let mut table = Table::new(vec![
        "indicator_id".to_string(),
        "country_id".to_string(),
        "year".to_string(),
        "type".to_string(),
        "metadata".to_string(),
    ]);
    for row in rows {
        // arity is fixed here, push_row cannot fail
        let _ = table.push_row(vec![
            Value::Text(row.indicator_id.clone()),
            Value::Text(row.country_id.clone()),
            row.year.clone(),
            Value::Text(row.annotation_type.clone()),
            Value::Text(row.text.clone()),
        ]);
    }
    table
}

/// Reshape long-format annotations into the wide table joined onto country
/// data: squash duplicate keys, then pivot annotation types into columns.
/// Empty input yields an empty table with no annotation columns.
pub fn reshape(rows: &[AnnotationRow]) -> AnnotationTable {
    let squashed = squash(rows);

    let mut table = AnnotationTable::default();
    let mut column_index: HashMap<String, usize> = HashMap::new();

    // First pass fixes the column set in first-seen order so every row can
    // be allocated at full width.
    for row in &squashed {
        if !column_index.contains_key(&row.annotation_type) {
            column_index.insert(row.annotation_type.clone(), table.annotation_columns.len());
            table.annotation_columns.push(row.annotation_type.clone());
        }
    }

    let width = table.annotation_columns.len();
    for row in &squashed {
        let key = row.obs_key();
        let at = match table.index.get(&key) {
            Some(&at) => at,
            None => {
                table.index.insert(key, table.rows.len());
                table.rows.push(vec![None; width]);
                table.rows.len() - 1
            }
        };
        let column = column_index[&row.annotation_type];
        table.rows[at][column] = Some(row.text.clone());
    }
    table
}
