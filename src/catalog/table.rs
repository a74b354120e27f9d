//! Table Definition Module
//!
//! This module defines the TableDef type that describes a stored table.

use std::collections::HashMap;
use super::column::Column;
use serde::{Serialize, Deserialize};

/// Represents a database table schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name
    name: String,
    /// Columns in the table
    columns: Vec<Column>,
    /// Lowercased column name to index lookup
    column_map: HashMap<String, usize>,
}

impl TableDef {
    /// Create a new table with the given name and columns
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let column_map = columns
            .iter()
            .enumerate()
            .map(|(i, col)| (col.name().to_lowercase(), i))
            .collect();

        TableDef {
            name: name.into(),
            columns,
            column_map,
        }
    }

    /// Get the table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get all columns
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Get a column by name (case-insensitive)
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|idx| &self.columns[idx])
    }

    /// Get the column index for a column name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_map.get(&name.to_lowercase()).copied()
    }

    /// Names of all columns in declaration order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    /// Check structural validity before the table is stored
    pub fn validate(&self) -> Result<(), String> {
        if self.columns.is_empty() {
            return Err(format!("Table '{}' must have at least one column", self.name));
        }
        if self.column_map.len() != self.columns.len() {
            return Err(format!("Table '{}' has duplicate column names", self.name));
        }
        Ok(())
    }
}
