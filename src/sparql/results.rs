//! SPARQL query results and wire formats
//!
//! Solution sequences and booleans serialize through sparesults
//! (XML/JSON/CSV/TSV); CONSTRUCT/DESCRIBE graphs serialize as
//! N-Triples or Turtle. Content negotiation echoes the accepted type
//! back as the response content type.

use super::engine::Binding;
use super::{SparqlError, SparqlResult};
use crate::rdf::{serialize_triples, serialize_turtle, Triple};
use oxrdf::{Term as OxTerm, Variable};
use sparesults::{QueryResultsFormat, QueryResultsSerializer};

/// Result of one query
#[derive(Debug, Clone)]
pub enum QueryResults {
    /// Bindings from a SELECT query
    Solutions {
        variables: Vec<String>,
        solutions: Vec<Binding>,
    },
    /// Boolean result from an ASK query
    Boolean(bool),
    /// Graph from a CONSTRUCT/DESCRIBE query
    Graph(Vec<Triple>),
}

impl QueryResults {
    /// True for CONSTRUCT/DESCRIBE results
    pub fn is_graph(&self) -> bool {
        matches!(self, QueryResults::Graph(_))
    }
}

/// Serialization format of a response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsFormat {
    SparqlXml,
    SparqlJson,
    Csv,
    Tsv,
    NTriples,
    Turtle,
}

const SOLUTION_TYPES: &[(&str, ResultsFormat)] = &[
    ("application/sparql-results+xml", ResultsFormat::SparqlXml),
    ("application/xml", ResultsFormat::SparqlXml),
    ("application/sparql-results+json", ResultsFormat::SparqlJson),
    ("application/json", ResultsFormat::SparqlJson),
    ("text/csv", ResultsFormat::Csv),
    ("text/tab-separated-values", ResultsFormat::Tsv),
];

const GRAPH_TYPES: &[(&str, ResultsFormat)] = &[
    ("application/n-triples", ResultsFormat::NTriples),
    ("text/turtle", ResultsFormat::Turtle),
    ("application/x-turtle", ResultsFormat::Turtle),
];

/// Pick the response format for an Accept header. Returns the format
/// and the content type to echo; None means no supported type matched
/// (HTTP 406).
pub fn negotiate(accept: Option<&str>, graph: bool) -> Option<(ResultsFormat, String)> {
    let supported = if graph { GRAPH_TYPES } else { SOLUTION_TYPES };
    let default = (supported[0].1, supported[0].0.to_string());

    let accept = match accept {
        Some(a) if !a.trim().is_empty() => a,
        _ => return Some(default),
    };

    // parse "type/sub;q=0.5, type/sub" into candidates ordered by q
    let mut candidates: Vec<(mime::Mime, f32)> = Vec::new();
    for part in accept.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Ok(m) = part.parse::<mime::Mime>() {
            let q = m
                .get_param("q")
                .and_then(|v| v.as_str().parse::<f32>().ok())
                .unwrap_or(1.0);
            candidates.push((m, q));
        }
    }
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    for (m, _) in candidates {
        if m.type_() == mime::STAR {
            return Some(default);
        }
        if m.subtype() == mime::STAR {
            if let Some((name, format)) = supported
                .iter()
                .find(|(name, _)| name.starts_with(m.type_().as_str()))
            {
                return Some((*format, name.to_string()));
            }
            continue;
        }
        let essence = m.essence_str();
        if let Some((name, format)) = supported.iter().find(|(name, _)| *name == essence) {
            return Some((*format, name.to_string()));
        }
    }
    None
}

/// Serialize results in the given format
pub fn serialize_results(results: &QueryResults, format: ResultsFormat) -> SparqlResult<Vec<u8>> {
    match format {
        ResultsFormat::SparqlXml
        | ResultsFormat::SparqlJson
        | ResultsFormat::Csv
        | ResultsFormat::Tsv => serialize_solutions(results, format),
        ResultsFormat::NTriples | ResultsFormat::Turtle => match results {
            QueryResults::Graph(triples) => {
                let body = if format == ResultsFormat::NTriples {
                    serialize_triples(triples)
                } else {
                    serialize_turtle(triples)
                }
                .map_err(|e| SparqlError::Evaluation(e.to_string()))?;
                Ok(body.into_bytes())
            }
            _ => Err(SparqlError::Evaluation(
                "solution results cannot serialize as RDF".to_string(),
            )),
        },
    }
}

fn serialize_solutions(results: &QueryResults, format: ResultsFormat) -> SparqlResult<Vec<u8>> {
    let format = match format {
        ResultsFormat::SparqlXml => QueryResultsFormat::Xml,
        ResultsFormat::SparqlJson => QueryResultsFormat::Json,
        ResultsFormat::Csv => QueryResultsFormat::Csv,
        ResultsFormat::Tsv => QueryResultsFormat::Tsv,
        _ => unreachable!("graph formats handled by caller"),
    };
    let serializer = QueryResultsSerializer::from_format(format);

    match results {
        QueryResults::Boolean(value) => serializer
            .write_boolean_result(Vec::new(), *value)
            .map_err(|e| SparqlError::Evaluation(e.to_string())),
        QueryResults::Solutions {
            variables,
            solutions,
        } => {
            let vars: Vec<Variable> = variables
                .iter()
                .map(|name| {
                    Variable::new(name.clone())
                        .map_err(|e| SparqlError::Evaluation(e.to_string()))
                })
                .collect::<SparqlResult<_>>()?;

            let mut writer = serializer
                .solutions_writer(Vec::new(), vars.clone())
                .map_err(|e| SparqlError::Evaluation(e.to_string()))?;
            for solution in solutions {
                let row: Vec<(&Variable, &OxTerm)> = vars
                    .iter()
                    .filter_map(|v| solution.get(v.as_str()).map(|t| (v, t)))
                    .collect();
                writer
                    .serialize(row)
                    .map_err(|e| SparqlError::Evaluation(e.to_string()))?;
            }
            writer
                .finish()
                .map_err(|e| SparqlError::Evaluation(e.to_string()))
        }
        QueryResults::Graph(_) => Err(SparqlError::Evaluation(
            "graph results cannot serialize as solution bindings".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate_default() {
        let (format, content_type) = negotiate(None, false).unwrap();
        assert_eq!(format, ResultsFormat::SparqlXml);
        assert_eq!(content_type, "application/sparql-results+xml");

        let (format, _) = negotiate(Some("*/*"), false).unwrap();
        assert_eq!(format, ResultsFormat::SparqlXml);
    }

    #[test]
    fn test_negotiate_echoes_requested_type() {
        let (format, content_type) = negotiate(Some("application/xml"), false).unwrap();
        assert_eq!(format, ResultsFormat::SparqlXml);
        assert_eq!(content_type, "application/xml");

        let (format, content_type) = negotiate(Some("application/json"), false).unwrap();
        assert_eq!(format, ResultsFormat::SparqlJson);
        assert_eq!(content_type, "application/json");
    }

    #[test]
    fn test_negotiate_q_values() {
        let (_, content_type) = negotiate(
            Some("foo/bar,application/sparql-results+xml;q=0.5"),
            false,
        )
        .unwrap();
        assert_eq!(content_type, "application/sparql-results+xml");
    }

    #[test]
    fn test_negotiate_unacceptable() {
        assert!(negotiate(Some("foo/bar"), false).is_none());
    }

    #[test]
    fn test_negotiate_graph() {
        let (format, content_type) = negotiate(None, true).unwrap();
        assert_eq!(format, ResultsFormat::NTriples);
        assert_eq!(content_type, "application/n-triples");

        let (format, _) = negotiate(Some("text/turtle"), true).unwrap();
        assert_eq!(format, ResultsFormat::Turtle);
    }

    #[test]
    fn test_serialize_boolean_json() {
        let body =
            serialize_results(&QueryResults::Boolean(true), ResultsFormat::SparqlJson).unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("true"));
    }

    #[test]
    fn test_serialize_solutions_json() {
        let mut binding = Binding::new();
        binding.insert(
            "s".to_string(),
            OxTerm::NamedNode(oxrdf::NamedNode::new("urn:a").unwrap()),
        );
        let results = QueryResults::Solutions {
            variables: vec!["s".to_string()],
            solutions: vec![binding],
        };
        let body = serialize_results(&results, ResultsFormat::SparqlJson).unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("urn:a"));
        assert!(text.contains("\"s\""));
    }
}
