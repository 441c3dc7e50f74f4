use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::ColumnType;

/// The fixed set of query templates the coordinator can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statement {
    SelectStationName,
    SelectMaxTmax,
    SelectStationRecords,
    InsertTemperature,
    InsertStationName,
}

impl Statement {
    pub fn cql(&self) -> &'static str {
        match self {
            Statement::SelectStationName => "SELECT name FROM weather.stations WHERE id = ?",
            Statement::SelectMaxTmax => {
                "SELECT MAX(record.tmax) AS max_temp FROM weather.stations WHERE id = ?"
            }
            Statement::SelectStationRecords => {
                "SELECT date, record.tmin, record.tmax FROM weather.stations WHERE id = ? AND date >= ? AND date <= ?"
            }
            Statement::InsertTemperature => {
                "INSERT INTO weather.stations (id, date, record) VALUES (?, ?, {tmin: ?, tmax: ?})"
            }
            Statement::InsertStationName => "INSERT INTO weather.stations (id, name) VALUES (?, ?)",
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Statement::InsertTemperature | Statement::InsertStationName
        )
    }

    /// Bind-marker types in order. The first marker is always the partition key.
    pub fn param_types(&self) -> &'static [ColumnType] {
        match self {
            Statement::SelectStationName | Statement::SelectMaxTmax => &[ColumnType::Text],
            Statement::SelectStationRecords => {
                &[ColumnType::Text, ColumnType::Date, ColumnType::Date]
            }
            Statement::InsertTemperature => &[
                ColumnType::Text,
                ColumnType::Date,
                ColumnType::Int,
                ColumnType::Int,
            ],
            Statement::InsertStationName => &[ColumnType::Text, ColumnType::Text],
        }
    }

    /// Table columns the template refers to.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Statement::SelectStationName => &["id", "name"],
            Statement::SelectMaxTmax => &["id", "record"],
            Statement::SelectStationRecords => &["id", "date", "record"],
            Statement::InsertTemperature => &["id", "date", "record"],
            Statement::InsertStationName => &["id", "name"],
        }
    }

    /// Fields of the compound value the template refers to.
    pub fn compound_fields(&self) -> &'static [&'static str] {
        match self {
            Statement::SelectMaxTmax => &["tmax"],
            Statement::SelectStationRecords | Statement::InsertTemperature => &["tmin", "tmax"],
            Statement::SelectStationName | Statement::InsertStationName => &[],
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Engine-side handle for a template that has been validated against the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    pub id: u64,
    pub statement: Statement,
}

impl PreparedStatement {
    pub fn new(id: u64, statement: Statement) -> Self {
        Self { id, statement }
    }

    pub fn cql(&self) -> &'static str {
        self.statement.cql()
    }
}

/// A bound parameter or a returned cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Text(String),
    Date(NaiveDate),
    Int(i32),
}

impl Value {
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Text(_) => Some(ColumnType::Text),
            Value::Date(_) => Some(ColumnType::Date),
            Value::Int(_) => Some(ColumnType::Int),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

/// One result row as ordered `(column, value)` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: Value) -> Self {
        self.columns.push((column.to_string(), value));
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn get_text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_text)
    }

    pub fn get_int(&self, column: &str) -> Option<i32> {
        self.get(column).and_then(Value::as_int)
    }

    pub fn get_date(&self, column: &str) -> Option<NaiveDate> {
        self.get(column).and_then(Value::as_date)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
