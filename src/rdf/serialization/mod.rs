//! RDF serialization formats
//!
//! N-Triples is the format graphs are persisted in; Turtle is used for
//! the store configuration document and CONSTRUCT/DESCRIBE responses.

mod ntriples;
mod turtle;

pub use ntriples::{parse_ntriples, serialize_graph, serialize_triples};
pub use turtle::{parse_turtle, serialize_turtle};

use super::types::{BlankNode, Literal, NamedNode, Object, RdfError, Subject};

/// File format of a persisted graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfFormat {
    /// N-Triples (`.nt`), the only format graphs are written in
    NTriples,
}

impl RdfFormat {
    /// Parse the format name used in sidecar/config metadata
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nt" => Some(RdfFormat::NTriples),
            _ => None,
        }
    }

    /// Metadata name of this format
    pub fn name(&self) -> &'static str {
        match self {
            RdfFormat::NTriples => "nt",
        }
    }

    /// File extension including the dot
    pub fn extension(&self) -> &'static str {
        match self {
            RdfFormat::NTriples => ".nt",
        }
    }
}

pub(crate) fn convert_subject(s: rio_api::model::Subject<'_>) -> Result<Subject, RdfError> {
    match s {
        rio_api::model::Subject::NamedNode(n) => Ok(Subject::NamedNode(NamedNode::new(n.iri)?)),
        rio_api::model::Subject::BlankNode(b) => {
            Ok(Subject::BlankNode(BlankNode::from_identifier(b.id)?))
        }
        _ => Err(RdfError::Parse("Unsupported subject type".to_string())),
    }
}

pub(crate) fn convert_predicate(p: rio_api::model::NamedNode<'_>) -> Result<NamedNode, RdfError> {
    NamedNode::new(p.iri)
}

pub(crate) fn convert_object(o: rio_api::model::Term<'_>) -> Result<Object, RdfError> {
    match o {
        rio_api::model::Term::NamedNode(n) => Ok(Object::NamedNode(NamedNode::new(n.iri)?)),
        rio_api::model::Term::BlankNode(b) => {
            Ok(Object::BlankNode(BlankNode::from_identifier(b.id)?))
        }
        rio_api::model::Term::Literal(l) => match l {
            rio_api::model::Literal::Simple { value } => {
                Ok(Object::Literal(Literal::new_simple_literal(value)))
            }
            rio_api::model::Literal::LanguageTaggedString { value, language } => Ok(
                Object::Literal(Literal::new_language_tagged_literal(value, language)?),
            ),
            rio_api::model::Literal::Typed { value, datatype } => {
                let dt = NamedNode::new(datatype.iri)?;
                Ok(Object::Literal(Literal::new_typed_literal(value, dt)))
            }
        },
        _ => Err(RdfError::Parse("Unsupported object type".to_string())),
    }
}
