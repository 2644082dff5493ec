//! SPARQL 1.1 query and update support
//!
//! The engine owns an explicit walk over the spargebra algebra with a
//! total ordering on terms, and produces, for updates, one change set
//! per sub-operation describing exactly its effect on the in-memory
//! snapshot it ran against.

mod engine;
mod parser;
mod results;
mod update;

pub use engine::{Binding, QueryEngine};
pub use parser::{parse_query, parse_update, update_label};
pub use results::{negotiate, serialize_results, QueryResults, ResultsFormat};
pub use update::{execute_update, UpdateScoping};

use thiserror::Error;

/// SPARQL errors
#[derive(Error, Debug)]
pub enum SparqlError {
    /// Syntax error in a query or update string
    #[error("Parse error: {0}")]
    Parse(String),

    /// Feature outside the supported algebra subset
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Evaluation failure
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Invalid update operation (LOAD, writes to the default graph,
    /// CREATE on an existing graph, conflicting dataset scoping)
    #[error("Invalid update: {0}")]
    Update(String),

    /// CLEAR/DROP on a graph the dataset does not hold
    #[error("Unknown graph: {0}")]
    UnknownGraph(String),
}

pub type SparqlResult<T> = Result<T, SparqlError>;
