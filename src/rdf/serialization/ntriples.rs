//! N-Triples format implementation
//!
//! Graph files are written sorted with a trailing newline so that the
//! same triple set always produces the same bytes, which keeps git
//! diffs and blob ids stable. An empty graph serializes to a single
//! newline.

use super::{convert_object, convert_predicate, convert_subject};
use crate::rdf::types::{Object, RdfError, RdfResult, Subject, Triple};
use rio_api::formatter::TriplesFormatter;
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesFormatter, NTriplesParser, TurtleError};
use std::io::{BufReader, Cursor};

/// Parse an N-Triples document into triples
pub fn parse_ntriples(input: &str) -> RdfResult<Vec<Triple>> {
    let reader = BufReader::new(Cursor::new(input));
    let mut parser = NTriplesParser::new(reader);

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

/// Serialize triples in their given order, one statement per line
pub fn serialize_triples(triples: &[Triple]) -> RdfResult<String> {
    let mut output = Vec::new();
    let mut formatter = NTriplesFormatter::new(&mut output);

    for triple in triples {
        format_one(&mut formatter, triple)?;
    }

    formatter
        .finish()
        .map_err(|e| RdfError::Serialization(e.to_string()))?;
    String::from_utf8(output).map_err(|e| RdfError::Serialization(e.to_string()))
}

/// Serialize the triples of one graph to its canonical file content:
/// lexicographically sorted statements plus a trailing newline.
pub fn serialize_graph<'a>(triples: impl IntoIterator<Item = &'a Triple>) -> RdfResult<String> {
    let mut lines = Vec::new();
    for triple in triples {
        let mut buf = Vec::new();
        let mut formatter = NTriplesFormatter::new(&mut buf);
        format_one(&mut formatter, triple)?;
        formatter
            .finish()
            .map_err(|e| RdfError::Serialization(e.to_string()))?;
        let line = String::from_utf8(buf).map_err(|e| RdfError::Serialization(e.to_string()))?;
        lines.push(line.trim_end().to_string());
    }

    if lines.is_empty() {
        return Ok("\n".to_string());
    }
    lines.sort();
    Ok(format!("{}\n", lines.join("\n")))
}

fn format_one<W: std::io::Write>(
    formatter: &mut NTriplesFormatter<W>,
    triple: &Triple,
) -> RdfResult<()> {
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
        .map_err(|e| RdfError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::types::NamedNode;

    #[test]
    fn test_roundtrip() {
        let input = "<http://ex.org/a> <http://ex.org/b> \"c\" .\n";
        let triples = parse_ntriples(input).unwrap();
        assert_eq!(triples.len(), 1);
        let output = serialize_graph(&triples).unwrap();
        let reparsed = parse_ntriples(&output).unwrap();
        assert_eq!(triples, reparsed);
    }

    #[test]
    fn test_whitespace_tolerant_parse() {
        let input = "<urn:x>  <urn:y>   <urn:z>   . ";
        let triples = parse_ntriples(input).unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(
            serialize_graph(&triples).unwrap(),
            "<urn:x> <urn:y> <urn:z> .\n"
        );
    }

    #[test]
    fn test_empty_graph_is_single_newline() {
        assert_eq!(serialize_graph(&[]).unwrap(), "\n");
    }

    #[test]
    fn test_sorted_output() {
        let t1 = Triple::new(
            NamedNode::new("urn:z").unwrap(),
            NamedNode::new("urn:p").unwrap(),
            NamedNode::new("urn:o").unwrap(),
        );
        let t2 = Triple::new(
            NamedNode::new("urn:a").unwrap(),
            NamedNode::new("urn:p").unwrap(),
            NamedNode::new("urn:o").unwrap(),
        );
        let out = serialize_graph(&[t1, t2]).unwrap();
        assert_eq!(out, "<urn:a> <urn:p> <urn:o> .\n<urn:z> <urn:p> <urn:o> .\n");
    }

    #[test]
    fn test_parse_error() {
        assert!(parse_ntriples("this is not ntriples").is_err());
    }
}
