//! Schema introspection
//!
//! Groups `information_schema.columns` rows into tables and renders them as
//! the plain-text description handed to the query-generating agent.

use std::fmt::Write as _;

use serde::Serialize;

/// One row of the column catalogue, as fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRecord {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    /// `YES` / `NO`, as reported by `information_schema`
    pub is_nullable: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

/// Tables of one schema, in catalogue order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSchema {
    pub schema: String,
    pub tables: Vec<TableSchema>,
}

impl DatabaseSchema {
    /// Group records (already ordered by table, ordinal position) into tables
    pub fn from_records(schema: impl Into<String>, records: Vec<ColumnRecord>) -> Self {
        let mut tables: Vec<TableSchema> = Vec::new();

        for record in records {
            let column = ColumnDescriptor {
                name: record.column_name,
                data_type: record.data_type,
                nullable: record.is_nullable.eq_ignore_ascii_case("YES"),
            };

            match tables.iter_mut().find(|t| t.name == record.table_name) {
                Some(table) => table.columns.push(column),
                None => tables.push(TableSchema {
                    name: record.table_name,
                    columns: vec![column],
                }),
            }
        }

        Self {
            schema: schema.into(),
            tables,
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Human-readable description for the query generator
    pub fn render(&self) -> String {
        let mut text = String::from("Database Schema:\n");
        for table in &self.tables {
            let _ = writeln!(text, "\nTable: {}", table.name);
            for column in &table.columns {
                let nullable = if column.nullable { "NULL" } else { "NOT NULL" };
                let _ = writeln!(text, "  - {} ({}, {})", column.name, column.data_type, nullable);
            }
        }
        text
    }
}
