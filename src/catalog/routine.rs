//! Stored routine definitions (functions and procedures)

use std::collections::HashSet;
use serde::{Deserialize, Serialize};

use super::schema::DataType;
use crate::query::ast::Statement;

/// Direction of a routine parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamDirection {
    In,
    Out,
    InOut,
    /// The return slot of a function, or a procedure's captured return status
    Return,
}

impl ParamDirection {
    /// Whether the caller observes writes to this parameter
    pub fn is_output(&self) -> bool {
        matches!(self, ParamDirection::Out | ParamDirection::InOut | ParamDirection::Return)
    }
}

/// A declared routine parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    /// `None` when the type is inferred from the first value stored
    pub data_type: Option<DataType>,
    pub direction: ParamDirection,
}

impl ParamDef {
    pub fn input(name: impl Into<String>, data_type: DataType) -> Self {
        Self { name: name.into(), data_type: Some(data_type), direction: ParamDirection::In }
    }

    pub fn output(name: impl Into<String>, data_type: DataType) -> Self {
        Self { name: name.into(), data_type: Some(data_type), direction: ParamDirection::Out }
    }

    pub fn in_out(name: impl Into<String>, data_type: DataType) -> Self {
        Self { name: name.into(), data_type: Some(data_type), direction: ParamDirection::InOut }
    }
}

/// Definition of a stored function or procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    /// Declared RETURNS type; required for functions, absent for procedures
    pub returns: Option<DataType>,
    pub body: Vec<Statement>,
}

impl RoutineDef {
    pub fn new(
        name: impl Into<String>,
        params: Vec<ParamDef>,
        returns: Option<DataType>,
        body: Vec<Statement>,
    ) -> Self {
        Self { name: name.into(), params, returns, body }
    }

    /// Check structural validity before the routine is stored
    pub fn validate(&self, is_function: bool) -> Result<(), String> {
        let mut seen = HashSet::new();
        for param in &self.params {
            if !seen.insert(param.name.to_lowercase()) {
                return Err(format!(
                    "Duplicate parameter '{}' in routine '{}'",
                    param.name, self.name
                ));
            }
            if param.direction == ParamDirection::Return {
                return Err(format!(
                    "Parameter '{}' of routine '{}' cannot be declared with RETURN direction",
                    param.name, self.name
                ));
            }
            if is_function && param.direction != ParamDirection::In {
                return Err(format!(
                    "Function '{}' may only declare input parameters ('{}' is not)",
                    self.name, param.name
                ));
            }
        }
        if is_function && self.returns.is_none() {
            return Err(format!("Function '{}' must declare a RETURNS type", self.name));
        }
        if !is_function && self.returns.is_some() {
            return Err(format!("Procedure '{}' cannot declare a RETURNS type", self.name));
        }
        Ok(())
    }
}
