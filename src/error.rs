//! Crate-level error kinds
//!
//! One variant per externally observable failure class; area errors
//! fold into these at the store boundary. Each kind maps to exactly
//! one HTTP status.

use crate::repo::{ConflictReport, RepoError};
use crate::rdf::RdfError;
use crate::sparql::SparqlError;
use thiserror::Error;

/// Store errors
#[derive(Error, Debug)]
pub enum QuitError {
    /// Malformed SPARQL, incompatible dataset-scoping parameters,
    /// wrong endpoint for the request form
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Graph IRI with no binding
    #[error("unknown graph: {0}")]
    UnknownGraph(String),

    /// Ref or commit id that does not resolve
    #[error("unknown ref: {0}")]
    UnknownRef(String),

    /// Branch creation target already exists
    #[error("branch already exists: {0}")]
    RefExists(String),

    /// Refusing to delete the checked-out branch
    #[error("cannot delete current HEAD: {0}")]
    CannotDeleteHead(String),

    /// Merge rejected; nothing was committed
    #[error("merge conflict")]
    MergeConflict(ConflictReport),

    /// No acceptable response representation
    #[error("not acceptable: {0}")]
    NotAcceptable(String),

    /// Endpoint for a feature that is switched off
    #[error("feature disabled: {0}")]
    FeatureDisabled(&'static str),

    /// Disk or git failure
    #[error("io failure: {0}")]
    IoFailure(String),
}

pub type QuitResult<T> = Result<T, QuitError>;

impl From<SparqlError> for QuitError {
    fn from(e: SparqlError) -> Self {
        match e {
            SparqlError::UnknownGraph(g) => QuitError::UnknownGraph(g),
            other => QuitError::BadRequest(other.to_string()),
        }
    }
}

impl From<RepoError> for QuitError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::UnknownRef(r) => QuitError::UnknownRef(r),
            RepoError::RefExists(r) => QuitError::RefExists(r),
            RepoError::CannotDeleteHead(r) => QuitError::CannotDeleteHead(r),
            RepoError::MergeConflict(report) => QuitError::MergeConflict(report),
            RepoError::Git(e) => QuitError::IoFailure(e.to_string()),
            RepoError::Io(e) => QuitError::IoFailure(e.to_string()),
            RepoError::Corrupt(msg) => QuitError::IoFailure(msg),
        }
    }
}

impl From<RdfError> for QuitError {
    fn from(e: RdfError) -> Self {
        QuitError::IoFailure(e.to_string())
    }
}

impl From<std::io::Error> for QuitError {
    fn from(e: std::io::Error) -> Self {
        QuitError::IoFailure(e.to_string())
    }
}

impl QuitError {
    /// HTTP status this error maps to
    pub fn status(&self) -> u16 {
        match self {
            QuitError::BadRequest(_)
            | QuitError::UnknownRef(_)
            | QuitError::RefExists(_)
            | QuitError::CannotDeleteHead(_) => 400,
            QuitError::UnknownGraph(_) | QuitError::FeatureDisabled(_) => 404,
            QuitError::NotAcceptable(_) => 406,
            QuitError::MergeConflict(_) => 409,
            QuitError::IoFailure(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(QuitError::BadRequest("x".into()).status(), 400);
        assert_eq!(QuitError::UnknownRef("x".into()).status(), 400);
        assert_eq!(QuitError::UnknownGraph("x".into()).status(), 404);
        assert_eq!(QuitError::NotAcceptable("x".into()).status(), 406);
        assert_eq!(
            QuitError::MergeConflict(ConflictReport::default()).status(),
            409
        );
        assert_eq!(QuitError::IoFailure("x".into()).status(), 500);
    }

    #[test]
    fn test_sparql_error_folding() {
        let e: QuitError = SparqlError::Parse("bad".into()).into();
        assert_eq!(e.status(), 400);
        let e: QuitError = SparqlError::UnknownGraph("urn:g".into()).into();
        assert_eq!(e.status(), 404);
    }
}
