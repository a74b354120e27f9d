// Query Processing Module
//
// Statement trees, the scope-checked builder that produces them, and the
// executor that prepares and runs them.

pub mod ast;
pub mod builder;
pub mod executor;

// Export key public interfaces
pub use builder::BatchBuilder;
pub use executor::engine::ExecutionEngine;
pub use executor::result::QueryResult;
