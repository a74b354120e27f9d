//! Catalog Management Module
//!
//! This module holds the definitions of every named database object the
//! statement core creates, alters and drops: tables, views, indexes,
//! functions and procedures.

pub mod catalog;
pub mod column;
pub mod routine;
pub mod schema;
pub mod table;

use std::fmt;
use serde::{Deserialize, Serialize};

// Re-export key types
pub use self::catalog::Catalog;
pub use self::column::Column;
pub use self::routine::{ParamDef, ParamDirection, RoutineDef};
pub use self::schema::DataType;
pub use self::table::TableDef;

use crate::query::ast::SelectStatement;

/// Kind of a named catalog object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Table,
    View,
    Index,
    Function,
    Procedure,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
            ObjectKind::Index => "index",
            ObjectKind::Function => "function",
            ObjectKind::Procedure => "procedure",
        };
        f.write_str(name)
    }
}

/// A stored view: a named SELECT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDef {
    pub name: String,
    pub query: SelectStatement,
}

/// A single-column hash index over a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    pub column: String,
}

/// Definition of any named catalog object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectDef {
    Table(TableDef),
    View(ViewDef),
    Index(IndexDef),
    Function(RoutineDef),
    Procedure(RoutineDef),
}

impl ObjectDef {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectDef::Table(_) => ObjectKind::Table,
            ObjectDef::View(_) => ObjectKind::View,
            ObjectDef::Index(_) => ObjectKind::Index,
            ObjectDef::Function(_) => ObjectKind::Function,
            ObjectDef::Procedure(_) => ObjectKind::Procedure,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ObjectDef::Table(t) => t.name(),
            ObjectDef::View(v) => &v.name,
            ObjectDef::Index(i) => &i.name,
            ObjectDef::Function(r) | ObjectDef::Procedure(r) => &r.name,
        }
    }

    /// Structural checks performed by storage before the object is created
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ObjectDef::Table(t) => t.validate(),
            ObjectDef::View(v) if v.query.columns.is_empty() => {
                Err(format!("View '{}' must select at least one column", v.name))
            }
            ObjectDef::View(_) => Ok(()),
            ObjectDef::Index(_) => Ok(()),
            ObjectDef::Function(r) => r.validate(true),
            ObjectDef::Procedure(r) => r.validate(false),
        }
    }

    pub fn as_routine(&self) -> Option<&RoutineDef> {
        match self {
            ObjectDef::Function(r) | ObjectDef::Procedure(r) => Some(r),
            _ => None,
        }
    }
}
