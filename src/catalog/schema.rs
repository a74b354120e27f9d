// Data Type Module
//
// This module defines the SQL data types known to the catalog.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Data types supported by the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
    Date,
    Timestamp,
    Blob,
}

impl DataType {
    /// Convert a type name as written in SQL to a DataType
    pub fn from_name(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" => Ok(DataType::Integer),
            "FLOAT" | "REAL" | "DOUBLE" => Ok(DataType::Float),
            "TEXT" | "VARCHAR" | "NVARCHAR" | "CHAR" | "STRING" => Ok(DataType::Text),
            "BIT" | "BOOL" | "BOOLEAN" => Ok(DataType::Boolean),
            "DATE" => Ok(DataType::Date),
            "TIMESTAMP" | "DATETIME" => Ok(DataType::Timestamp),
            "BLOB" | "BINARY" | "VARBINARY" => Ok(DataType::Blob),
            _ => Err(format!("Unknown data type: {}", s)),
        }
    }

    /// Whether values of this type can be compared with `<`/`>`
    pub fn is_ordered(&self) -> bool {
        !matches!(self, DataType::Blob)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::Text => "TEXT",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "DATE",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Blob => "BLOB",
        };
        f.write_str(name)
    }
}
