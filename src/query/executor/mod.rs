// Query Executor Module
//
// This module is responsible for executing prepared batches and producing
// results. Rows are pulled through RowSet trees; statements run in a single
// interpreter that passes control-flow signals back up as values.

pub mod context;
pub mod control_flow;
pub mod ddl_executor;
pub mod dml_executor;
pub mod engine;
pub mod expression_eval;
pub mod result;
pub mod routine;
pub mod rowset;
pub mod statement;
pub mod table_collection;

// Export key types
pub use self::control_flow::Flow;
pub use self::engine::{BatchOutcome, EngineConfig, ExecutionEngine};
pub use self::result::{DataValue, ErrorKind, QueryError, QueryResult, QueryResultSet, Row};
pub use self::rowset::{JoinedRow, JoinedRows, Padding, RowSet};
pub use self::statement::{Batch, Phase, ResultShape};
pub use self::table_collection::TableCollection;
