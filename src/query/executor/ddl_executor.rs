// Data Definition Language Executor
//
// This module handles execution of DDL statements: CREATE, ALTER and DROP
// over every catalog object kind. ALTER of any kind goes through the single
// nesting-aware replace in `transaction::replace`.

use log::info;

use crate::catalog::{ObjectDef, ObjectKind};
use crate::query::executor::result::{QueryError, QueryResult};
use crate::transaction::{replace_object, TransactionManager};

/// Handles execution of DDL operations
pub struct DdlExecutor {
    tm: TransactionManager,
}

impl DdlExecutor {
    pub fn new(tm: TransactionManager) -> Self {
        DdlExecutor { tm }
    }

    pub fn execute_create(&self, def: &ObjectDef) -> QueryResult<String> {
        let (kind, name) = (def.kind(), def.name().to_string());
        self.tm.database().create_object(def.clone())?;
        info!("created {} '{}'", kind, name);
        Ok(format!("{} '{}' created.", capitalized(kind), name))
    }

    pub fn execute_alter(&self, def: &ObjectDef) -> QueryResult<String> {
        match def.kind() {
            ObjectKind::Table => {
                return Err(QueryError::UnsupportedFeature("ALTER TABLE".to_string()));
            }
            ObjectKind::Index => {
                return Err(QueryError::UnsupportedFeature("ALTER INDEX".to_string()));
            }
            ObjectKind::View | ObjectKind::Function | ObjectKind::Procedure => {}
        }
        replace_object(&self.tm, def.clone())?;
        info!("altered {} '{}'", def.kind(), def.name());
        Ok(format!("{} '{}' altered.", capitalized(def.kind()), def.name()))
    }

    pub fn execute_drop(&self, kind: ObjectKind, name: &str, if_exists: bool) -> QueryResult<Option<String>> {
        let db = self.tm.database();
        if !db.object_exists(kind, name) {
            if if_exists {
                return Ok(None);
            }
            return Err(QueryError::ObjectNotFound { kind, name: name.to_string() });
        }
        db.delete_object(kind, name)?;
        info!("dropped {} '{}'", kind, name);
        Ok(Some(format!("{} '{}' dropped.", capitalized(kind), name)))
    }

    pub fn execute_rebuild_index(&self, name: &str) -> QueryResult<String> {
        Err(QueryError::UnsupportedFeature(format!("ALTER INDEX {} REBUILD", name)))
    }
}

fn capitalized(kind: ObjectKind) -> String {
    let name = kind.to_string();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => name,
    }
}
