//! Turtle format implementation
//!
//! Used for the graph configuration document (config mode) and for
//! CONSTRUCT/DESCRIBE response bodies.

use super::{convert_object, convert_predicate, convert_subject};
use crate::rdf::types::{Object, RdfError, RdfResult, Subject, Triple};
use rio_api::formatter::TriplesFormatter;
use rio_api::parser::TriplesParser;
use rio_turtle::{TurtleError, TurtleFormatter, TurtleParser};
use std::io::{BufReader, Cursor};

/// Parse a Turtle document into triples
pub fn parse_turtle(input: &str) -> RdfResult<Vec<Triple>> {
    let reader = BufReader::new(Cursor::new(input));
    let mut parser = TurtleParser::new(reader, None);

    let mut triples = Vec::new();
    let res: Result<(), TurtleError> = parser.parse_all(&mut |t| {
        let subject = convert_subject(t.subject)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        let predicate = convert_predicate(t.predicate)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        let object = convert_object(t.object)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        triples.push(Triple::new(subject, predicate, object));
        Ok(())
    });

    match res {
        Ok(_) => Ok(triples),
        Err(e) => Err(RdfError::Parse(e.to_string())),
    }
}

/// Serialize triples to Turtle
pub fn serialize_turtle(triples: &[Triple]) -> RdfResult<String> {
    let mut output = Vec::new();
    let mut formatter = TurtleFormatter::new(&mut output);

    for triple in triples {
        let s_node;
        let s_blank;
        let subject = match &triple.subject {
            Subject::NamedNode(n) => {
                s_node = rio_api::model::NamedNode { iri: n.as_str() };
                rio_api::model::Subject::NamedNode(s_node)
            }
            Subject::BlankNode(b) => {
                s_blank = rio_api::model::BlankNode { id: b.as_str() };
                rio_api::model::Subject::BlankNode(s_blank)
            }
        };

        let p_node = rio_api::model::NamedNode {
            iri: triple.predicate.as_str(),
        };

        let o_node;
        let o_blank;
        let o_dt_node;
        let object = match &triple.object {
            Object::NamedNode(n) => {
                o_node = rio_api::model::NamedNode { iri: n.as_str() };
                rio_api::model::Term::NamedNode(o_node)
            }
            Object::BlankNode(b) => {
                o_blank = rio_api::model::BlankNode { id: b.as_str() };
                rio_api::model::Term::BlankNode(o_blank)
            }
            Object::Literal(l) => {
                if let Some(lang) = l.language() {
                    rio_api::model::Term::Literal(rio_api::model::Literal::LanguageTaggedString {
                        value: l.value(),
                        language: lang,
                    })
                } else {
                    let datatype_iri = l.datatype();
                    if datatype_iri.as_str() == "http://www.w3.org/2001/XMLSchema#string" {
                        rio_api::model::Term::Literal(rio_api::model::Literal::Simple {
                            value: l.value(),
                        })
                    } else {
                        o_dt_node = datatype_iri;
                        rio_api::model::Term::Literal(rio_api::model::Literal::Typed {
                            value: l.value(),
                            datatype: rio_api::model::NamedNode {
                                iri: o_dt_node.as_str(),
                            },
                        })
                    }
                }
            }
        };

        formatter
            .format(&rio_api::model::Triple {
                subject,
                predicate: p_node,
                object,
            })
            .map_err(|e| RdfError::Serialization(e.to_string()))?;
    }

    formatter
        .finish()
        .map_err(|e| RdfError::Serialization(e.to_string()))?;
    String::from_utf8(output).map_err(|e| RdfError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turtle_roundtrip() {
        let input = r#"<http://example.org/a> <http://example.org/b> "c" ."#;
        let triples = parse_turtle(input).unwrap();
        assert_eq!(triples.len(), 1);
        let output = serialize_turtle(&triples).unwrap();
        assert!(output.contains("http://example.org/a"));
    }

    #[test]
    fn test_turtle_prefixes() {
        let input = r#"
            @prefix ex: <http://example.org/> .
            ex:a ex:b ex:c .
        "#;
        let triples = parse_turtle(input).unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].predicate.as_str(), "http://example.org/b");
    }
}
