use std::fmt;

use csv::ReaderBuilder;
use serde::Serialize;

use crate::error::UisError;

/// A single cell. UIS files mix numeric observations with coded text, so the
/// type is carried per value rather than per column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Number(f64),
    Null,
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical form used for join keys. Integral numbers render without a
    /// fractional part so a textual "2020" matches a numeric 2020 coming
    /// from a differently typed source file.
    pub fn key(&self) -> String {
        match self {
            Value::Text(text) => text.clone(),
            Value::Number(number) if number.fract() == 0.0 && number.is_finite() => {
                format!("{}", *number as i64)
            }
            Value::Number(number) => format!("{number}"),
            Value::Null => String::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => write!(f, "{text}"),
            Value::Number(number) => write!(f, "{number}"),
            Value::Null => Ok(()),
        }
    }
}

/// An in-memory table with header-derived column names.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Parse delimited text into a table. Column names are normalized to the
    /// UIS convention (lowercase, trailing `_en` suffix removed). Values in
    /// identifier columns stay textual even when they look numeric.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, UisError> {
        let mut reader = ReaderBuilder::new().flexible(false).from_reader(bytes);
        let headers = reader
            .headers()
            .map_err(|err| UisError::Parse(err.to_string()))?;
        let columns: Vec<String> = headers.iter().map(normalize_column).collect();
        let text_forced: Vec<bool> = columns
            .iter()
            .map(|name| is_identifier_column(name))
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| UisError::Parse(err.to_string()))?;
            let row = record
                .iter()
                .zip(&text_forced)
                .map(|(field, forced)| parse_value(field, *forced))
                .collect();
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, UisError> {
        self.column_index(name).ok_or_else(|| {
            UisError::Parse(format!(
                "missing column {name}, found: {}",
                self.columns.join(", ")
            ))
        })
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(index))
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), UisError> {
        if row.len() != self.columns.len() {
            return Err(UisError::Parse(format!(
                "row has {} fields, expected {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append a derived column. The value vector must cover every row.
    pub fn add_column(&mut self, name: &str, values: Vec<Value>) -> Result<(), UisError> {
        if values.len() != self.rows.len() {
            return Err(UisError::Parse(format!(
                "column {name} has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Project onto a subset of columns, in the order given.
    pub fn select(&self, names: &[&str]) -> Result<Table, UisError> {
        let indices = names
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>, _>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&index| row[index].clone()).collect())
            .collect();
        Ok(Table {
            columns: names.iter().map(|name| name.to_string()).collect(),
            rows,
        })
    }

    /// Keep only rows for which the predicate holds.
    pub fn filtered<F>(&self, predicate: F) -> Table
    where
        F: Fn(&[Value]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| predicate(row))
                .cloned()
                .collect(),
        }
    }
}

/// Lowercase a header and drop the `_en` suffix UIS appends to translated
/// label columns.
pub fn normalize_column(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    match lowered.strip_suffix("_en") {
        Some(stripped) => stripped.to_string(),
        None => lowered,
    }
}

fn is_identifier_column(name: &str) -> bool {
    name.ends_with("_id")
}

fn parse_value(field: &str, text_forced: bool) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if text_forced {
        return Value::Text(trimmed.to_string());
    }
    match trimmed.parse::<f64>() {
        Ok(number) => Value::Number(number),
        Err(_) => Value::Text(trimmed.to_string()),
    }
}
