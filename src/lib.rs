// BayunQL Statement Engine
//
// Statement execution and join core of an embedded SQL engine: RowSet join
// trees, a scope-checked statement interpreter with stored routines, and
// nesting-aware transactional DDL over a pluggable storage collaborator.

pub mod common;
pub mod query;
pub mod storage;
pub mod transaction;
pub mod catalog;

// Re-export key items for convenient access
pub use catalog::{Catalog, ObjectDef, ObjectKind};
pub use query::builder::BatchBuilder;
pub use query::executor::engine::{BatchOutcome, EngineConfig, ExecutionEngine};
pub use query::executor::result::{DataValue, ErrorKind, QueryError, QueryResult, QueryResultSet};
pub use query::executor::statement::{Batch, ResultShape};
pub use storage::{Database, MemoryDatabase, TableSource};
