// Transaction Management Module
//
// Transaction demarcation over the storage collaborator, and the
// nesting-aware DDL-replace envelope built on it.

pub mod replace;

pub use self::replace::replace_object;

use std::sync::Arc;

use log::info;

use crate::query::executor::result::QueryResult;
use crate::storage::Database;

/// Transaction manager - demarcates transactions on one database
#[derive(Clone)]
pub struct TransactionManager {
    db: Arc<dyn Database>,
}

impl TransactionManager {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &dyn Database {
        self.db.as_ref()
    }

    /// 0 when no transaction is active
    pub fn nested_level(&self) -> usize {
        self.db.nested_transaction_level()
    }

    /// Whether work done now runs outside any caller-owned transaction
    pub fn is_outermost(&self) -> bool {
        self.nested_level() == 0
    }

    /// Begin a (possibly nested) transaction
    pub fn begin_transaction(&self) -> QueryResult<usize> {
        self.db.begin_transaction()?;
        let level = self.nested_level();
        info!("transaction begun, nesting level {}", level);
        Ok(level)
    }

    pub fn commit_transaction(&self) -> QueryResult<()> {
        self.db.commit_transaction()?;
        info!("transaction committed, nesting level {}", self.nested_level());
        Ok(())
    }

    /// Abort all pending work
    pub fn abort_transaction(&self) -> QueryResult<()> {
        self.db.rollback_transaction()?;
        info!("transaction rolled back");
        Ok(())
    }
}
