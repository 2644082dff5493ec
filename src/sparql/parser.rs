//! SPARQL parsing via spargebra

use super::{SparqlError, SparqlResult};
use spargebra::GraphUpdateOperation;
use spargebra::{Query, Update};

/// Parse a SPARQL query string
pub fn parse_query(input: &str, base_iri: Option<&str>) -> SparqlResult<Query> {
    Query::parse(input, base_iri).map_err(|e| SparqlError::Parse(e.to_string()))
}

/// Parse a SPARQL update string
pub fn parse_update(input: &str, base_iri: Option<&str>) -> SparqlResult<Update> {
    Update::parse(input, base_iri).map_err(|e| SparqlError::Parse(e.to_string()))
}

/// Coarse label of one update operation, used in commit messages
fn operation_label(op: &GraphUpdateOperation) -> &'static str {
    match op {
        GraphUpdateOperation::InsertData { .. } => "INSERT",
        GraphUpdateOperation::DeleteData { .. } => "DELETE",
        GraphUpdateOperation::DeleteInsert { delete, insert, .. } => {
            if delete.is_empty() {
                "INSERT"
            } else if insert.is_empty() {
                "DELETE"
            } else {
                "INSERT/DELETE"
            }
        }
        GraphUpdateOperation::Load { .. } => "LOAD",
        GraphUpdateOperation::Clear { .. } => "CLEAR",
        GraphUpdateOperation::Create { .. } => "CREATE",
        GraphUpdateOperation::Drop { .. } => "DROP",
    }
}

/// Operation-type label of a whole update: the distinct per-operation
/// labels in first-seen order, joined with `/`.
pub fn update_label(update: &Update) -> String {
    let mut labels: Vec<&'static str> = Vec::new();
    for op in &update.operations {
        let label = operation_label(op);
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select() {
        let query = parse_query("SELECT * WHERE { ?s ?p ?o }", None);
        assert!(query.is_ok());
    }

    #[test]
    fn test_parse_syntax_error() {
        assert!(matches!(
            parse_query("SELECT WHERE {", None),
            Err(SparqlError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_update_with_base() {
        let update = parse_update(
            "INSERT DATA { GRAPH <urn:g> { <relativeURI> <urn:p> <urn:o> } }",
            Some("http://example.org/newNS/"),
        )
        .unwrap();
        assert_eq!(update.operations.len(), 1);
    }

    #[test]
    fn test_update_label_single() {
        let update = parse_update("INSERT DATA { GRAPH <urn:g> { <urn:a> <urn:b> <urn:c> } }", None)
            .unwrap();
        assert_eq!(update_label(&update), "INSERT");
    }

    #[test]
    fn test_update_label_mixed() {
        let update = parse_update(
            "DELETE DATA { GRAPH <urn:g> { <urn:a> <urn:b> <urn:c> } } ; \
             INSERT DATA { GRAPH <urn:g> { <urn:x> <urn:y> <urn:z> } }",
            None,
        )
        .unwrap();
        assert_eq!(update_label(&update), "DELETE/INSERT");
    }

    #[test]
    fn test_update_label_delete_insert_where() {
        let update = parse_update(
            "DELETE { GRAPH <urn:g> { ?s <urn:b> ?o } } \
             INSERT { GRAPH <urn:g> { ?s <urn:c> ?o } } \
             WHERE { GRAPH <urn:g> { ?s <urn:b> ?o } }",
            None,
        )
        .unwrap();
        assert_eq!(update_label(&update), "INSERT/DELETE");
    }
}
