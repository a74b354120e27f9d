// Execution Context
//
// Mutable state of one running batch or routine body: declared variables,
// bound routine parameters, and the results and messages produced so far.

use linked_hash_map::LinkedHashMap;
use log::debug;

use crate::catalog::DataType;
use crate::query::executor::expression_eval::VariableLookup;
use crate::query::executor::result::{convert_data_value, DataValue, QueryError, QueryResult, QueryResultSet};
use crate::query::executor::routine::ParameterMap;

/// What kind of body the context runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Batch,
    Procedure,
    /// Function bodies may not produce result sets
    Function,
}

#[derive(Debug, Clone)]
struct Variable {
    data_type: Option<DataType>,
    value: DataValue,
}

pub struct ExecutionContext {
    kind: BodyKind,
    name: String,
    variables: LinkedHashMap<String, Variable>,
    params: ParameterMap,
    results: Vec<QueryResultSet>,
    messages: Vec<String>,
}

impl ExecutionContext {
    pub fn batch() -> Self {
        Self::with_params(BodyKind::Batch, "batch", ParameterMap::new())
    }

    pub fn routine(kind: BodyKind, name: &str, params: ParameterMap) -> Self {
        Self::with_params(kind, name, params)
    }

    fn with_params(kind: BodyKind, name: &str, params: ParameterMap) -> Self {
        ExecutionContext {
            kind,
            name: name.to_string(),
            variables: LinkedHashMap::new(),
            params,
            results: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn params(&self) -> &ParameterMap {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterMap {
        &mut self.params
    }

    pub fn declare(&mut self, name: &str, data_type: Option<DataType>, value: DataValue) -> QueryResult<()> {
        let key = name.to_lowercase();
        if self.variables.contains_key(&key) || self.params.get(name).is_some() {
            return Err(QueryError::ExecutionError(format!(
                "The variable name '{}' has already been declared",
                name
            )));
        }
        let value = match data_type {
            Some(target) => convert_data_value(&value, target)?,
            None => value,
        };
        let data_type = data_type.or_else(|| value.data_type());
        self.variables.insert(key, Variable { data_type, value });
        Ok(())
    }

    /// Assign a declared variable or a bound parameter
    pub fn set_variable(&mut self, name: &str, value: DataValue) -> QueryResult<()> {
        if let Some(var) = self.variables.get_mut(&name.to_lowercase()) {
            var.value = match var.data_type {
                Some(target) => convert_data_value(&value, target)?,
                None => {
                    var.data_type = value.data_type();
                    value
                }
            };
            return Ok(());
        }
        match self.params.get_mut(name) {
            Some(slot) => slot.store(value),
            None => Err(QueryError::VariableNotFound(name.to_string())),
        }
    }

    /// Surface a result set to the caller
    pub fn emit_result(&mut self, result: QueryResultSet) -> QueryResult<()> {
        if self.kind == BodyKind::Function {
            return Err(QueryError::InvalidReturnShape(format!(
                "Function '{}' cannot return a result set ({} column(s))",
                self.name,
                result.columns().len()
            )));
        }
        debug!("{}: result set with {} row(s)", self.name, result.row_count());
        self.results.push(result);
        Ok(())
    }

    pub fn message(&mut self, text: impl Into<String>) {
        self.messages.push(text.into());
    }

    /// Move the results and messages of a finished callee into this context
    pub fn absorb(&mut self, callee: ExecutionContext) -> QueryResult<ParameterMap> {
        for result in callee.results {
            self.emit_result(result)?;
        }
        self.messages.extend(callee.messages);
        Ok(callee.params)
    }

    pub fn into_output(self) -> (Vec<QueryResultSet>, Vec<String>) {
        (self.results, self.messages)
    }
}

impl VariableLookup for ExecutionContext {
    fn lookup_variable(&self, name: &str) -> Option<DataValue> {
        self.variables
            .get(&name.to_lowercase())
            .map(|var| var.value.clone())
            .or_else(|| self.params.lookup(name))
    }
}
