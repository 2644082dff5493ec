//! RDF data model
//!
//! Term types, the in-memory quad dataset with its per-request read
//! view, and the serialization formats the store persists graphs in.

mod dataset;
mod serialization;
mod types;

pub use dataset::{ChangeSet, Dataset, DatasetView, GraphDelta, QuadPattern};
pub use serialization::{
    parse_ntriples, parse_turtle, serialize_graph, serialize_triples, serialize_turtle, RdfFormat,
};
pub use types::{
    BlankNode, Literal, NamedNode, Object, Quad, RdfError, RdfResult, Subject, Triple,
};
