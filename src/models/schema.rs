//! Physical layout of the station table.
//!
//! Rows are partitioned by station id so every per-station query touches a
//! single partition, and clustered by date so a partition is already sorted
//! for range scans and aggregates.

use serde::{Deserialize, Serialize};

use crate::utils::constants::{COMPOUND_TYPE, KEYSPACE, TABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Date,
    Int,
    Compound,
}

impl ColumnType {
    pub fn cql(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Date => "date",
            ColumnType::Int => "int",
            ColumnType::Compound => COMPOUND_TYPE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    PartitionKey,
    ClusteringKey,
    Static,
    Regular,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub role: ColumnRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub keyspace: &'static str,
    pub table: &'static str,
    pub compound_type: &'static str,
    pub compound_fields: Vec<(&'static str, ColumnType)>,
    pub columns: Vec<Column>,
    pub replication_factor: u8,
}

impl TableSchema {
    /// Layout for station partitions holding `{tmin, tmax}` rows ordered by date.
    pub fn stations(replication_factor: u8) -> Self {
        Self {
            keyspace: KEYSPACE,
            table: TABLE,
            compound_type: COMPOUND_TYPE,
            compound_fields: vec![("tmin", ColumnType::Int), ("tmax", ColumnType::Int)],
            columns: vec![
                Column {
                    name: "id",
                    column_type: ColumnType::Text,
                    role: ColumnRole::PartitionKey,
                },
                Column {
                    name: "date",
                    column_type: ColumnType::Date,
                    role: ColumnRole::ClusteringKey,
                },
                Column {
                    name: "name",
                    column_type: ColumnType::Text,
                    role: ColumnRole::Static,
                },
                Column {
                    name: "record",
                    column_type: ColumnType::Compound,
                    role: ColumnRole::Regular,
                },
            ],
            replication_factor,
        }
    }

    pub fn partition_key(&self) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.role == ColumnRole::PartitionKey)
    }

    pub fn clustering_key(&self) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.role == ColumnRole::ClusteringKey)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_compound_field(&self, field: &str) -> bool {
        self.compound_fields.iter().any(|(name, _)| *name == field)
    }

    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.keyspace, self.table)
    }

    pub fn create_keyspace_cql(&self) -> String {
        format!(
            "CREATE KEYSPACE {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
            self.keyspace, self.replication_factor
        )
    }

    pub fn create_type_cql(&self) -> String {
        let fields: Vec<String> = self
            .compound_fields
            .iter()
            .map(|(name, ty)| format!("    {} {}", name, ty.cql()))
            .collect();
        format!(
            "CREATE TYPE {}.{} (\n{}\n)",
            self.keyspace,
            self.compound_type,
            fields.join(",\n")
        )
    }

    /// The `CREATE TABLE` statement, also returned by schema describe requests.
    pub fn create_table_cql(&self) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.role == ColumnRole::Static {
                    format!("    {} {} static", c.name, c.column_type.cql())
                } else {
                    format!("    {} {}", c.name, c.column_type.cql())
                }
            })
            .collect();

        let pk = self.partition_key().map(|c| c.name).unwrap_or("id");
        let ck = self.clustering_key().map(|c| c.name).unwrap_or("date");
        lines.push(format!("    PRIMARY KEY ({}, {})", pk, ck));

        format!(
            "CREATE TABLE {} (\n{}\n) WITH CLUSTERING ORDER BY ({} ASC)",
            self.qualified_table(),
            lines.join(",\n"),
            ck
        )
    }
}
