//! Quit Store
//!
//! A version-controlled RDF quad store: a SPARQL 1.1 Query and Update
//! endpoint whose persistent state is a git repository of N-Triples
//! files. Every successful update produces a commit, branches are
//! isolated named versions of the dataset, and an optional provenance
//! dataset indexes every change set in the history.
//!
//! # Architecture
//!
//! - `rdf`: term model, in-memory quad dataset, N-Triples/Turtle I/O
//! - `sparql`: query/update parsing (spargebra), algebra evaluation,
//!   change-set capture, result serialization (sparesults)
//! - `repo`: git adapter (git2), merge strategies, blame
//! - `store`: graph-file registry, per-branch snapshots, the update
//!   transaction, branch/merge/pull orchestration
//! - `provenance`: the PROV change-set index over the commit history
//! - `http`: the axum SPARQL protocol endpoint and management routes
//!
//! ## Example
//!
//! ```rust,no_run
//! use quit_store::config::StoreConfig;
//! use quit_store::store::QuitStore;
//!
//! let store = QuitStore::open(StoreConfig::new("/data/store")).unwrap();
//! let results = store
//!     .query(None, "ASK { GRAPH <http://example.org/> { ?s ?p ?o } }", &Default::default())
//!     .unwrap();
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod http;
pub mod provenance;
pub mod rdf;
pub mod repo;
pub mod sparql;
pub mod store;

// Re-export main types for convenience
pub use config::{ConfigMode, Features, StoreConfig};
pub use error::{QuitError, QuitResult};
pub use http::HttpServer;
pub use provenance::ProvenanceIndex;
pub use rdf::{
    BlankNode, ChangeSet, Dataset, DatasetView, GraphDelta, Literal, NamedNode, Object, Quad,
    RdfError, Subject, Triple,
};
pub use repo::{
    BlameRow, CommitMeta, ConflictReport, MergeMethod, RepoError, Repository,
};
pub use sparql::{QueryResults, ResultsFormat, SparqlError, UpdateScoping};
pub use store::{GraphRegistry, QueryScoping, QuitStore, RegistryMode};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
