//! SPARQL Update execution
//!
//! Updates run against the transaction's shadow dataset. Every
//! sub-operation yields one change set that records exactly its
//! effect: a triple appears as an addition only if it was absent
//! before the operation, as a removal only if it was present, and
//! never as both.

use super::engine::{Binding, QueryEngine};
use super::{SparqlError, SparqlResult};
use crate::rdf::{ChangeSet, Dataset, DatasetView, NamedNode, Quad, Triple};
use oxrdf::{NamedNode as OxNamedNode, Term as OxTerm};
use spargebra::algebra::{GraphTarget, QueryDataset};
use spargebra::GraphUpdateOperation;
use spargebra::term::{
    GraphName, GraphNamePattern, GroundQuad, GroundQuadPattern, GroundSubject, GroundTerm,
    GroundTermPattern, NamedNodePattern, QuadPattern, TermPattern,
};
use spargebra::Update;

/// Protocol-level dataset scoping of an update
/// (`using-graph-uri` / `using-named-graph-uri`)
#[derive(Debug, Clone, Default)]
pub struct UpdateScoping {
    pub default: Vec<OxNamedNode>,
    pub named: Vec<OxNamedNode>,
}

impl UpdateScoping {
    pub fn is_empty(&self) -> bool {
        self.default.is_empty() && self.named.is_empty()
    }
}

/// Run all operations of an update against the shadow dataset,
/// capturing one change set per operation in order. The first failing
/// operation aborts the whole run; the caller discards the shadow.
pub fn execute_update(
    update: &Update,
    shadow: &mut Dataset,
    union_default: bool,
    protocol: Option<&UpdateScoping>,
) -> SparqlResult<Vec<ChangeSet>> {
    let mut change_sets = Vec::new();
    for operation in &update.operations {
        change_sets.push(execute_operation(
            operation,
            shadow,
            union_default,
            protocol,
        )?);
    }
    Ok(change_sets)
}

fn execute_operation(
    operation: &GraphUpdateOperation,
    shadow: &mut Dataset,
    union_default: bool,
    protocol: Option<&UpdateScoping>,
) -> SparqlResult<ChangeSet> {
    match operation {
        GraphUpdateOperation::InsertData { data } => {
            let mut cs = ChangeSet::new();
            for quad in data {
                let quad = insert_data_quad(quad)?;
                if shadow.insert(quad.clone()) {
                    cs.add(quad.graph.clone(), quad.as_triple());
                } else {
                    cs.touch(quad.graph.clone());
                }
            }
            Ok(cs)
        }
        GraphUpdateOperation::DeleteData { data } => {
            let mut cs = ChangeSet::new();
            for quad in data {
                delete_data_quad(quad, shadow, union_default, &mut cs)?;
            }
            Ok(cs)
        }
        GraphUpdateOperation::DeleteInsert {
            delete,
            insert,
            using,
            pattern,
        } => {
            if using.is_some() && protocol.map(|p| !p.is_empty()).unwrap_or(false) {
                return Err(SparqlError::Update(
                    "both USING and using-graph-uri given".to_string(),
                ));
            }
            let pre = shadow.clone();
            let view = scoped_view(&pre, union_default, using.as_ref(), protocol);
            let engine = QueryEngine::new(&view);
            let solutions = engine.solutions(pattern)?;

            let mut cs = ChangeSet::new();
            // removals first, over all solutions, then insertions
            for solution in &solutions {
                for pattern in delete {
                    apply_delete_pattern(pattern, solution, shadow, union_default, &mut cs)?;
                }
            }
            for (index, solution) in solutions.iter().enumerate() {
                for pattern in insert {
                    apply_insert_pattern(pattern, solution, index, shadow, &mut cs)?;
                }
            }
            normalize(&mut cs);
            Ok(cs)
        }
        GraphUpdateOperation::Load { .. } => Err(SparqlError::Update(
            "LOAD is not supported; the store does not fetch remote documents".to_string(),
        )),
        GraphUpdateOperation::Clear { silent, graph } => {
            clear_target(graph, shadow, union_default, *silent, false)
        }
        GraphUpdateOperation::Create { silent, graph } => {
            let graph = NamedNode::new(graph.as_str())
                .map_err(|e| SparqlError::Update(e.to_string()))?;
            if shadow.has_graph(&graph) {
                if *silent {
                    return Ok(ChangeSet::new());
                }
                return Err(SparqlError::Update(format!(
                    "graph already exists: {}",
                    graph.as_str()
                )));
            }
            shadow.create_graph(graph.clone());
            let mut cs = ChangeSet::new();
            cs.touch(graph);
            Ok(cs)
        }
        GraphUpdateOperation::Drop { silent, graph } => {
            clear_target(graph, shadow, union_default, *silent, true)
        }
    }
}

fn insert_data_quad(quad: &spargebra::term::Quad) -> SparqlResult<Quad> {
    let graph = named_graph(&quad.graph_name)?;
    Ok(Quad::new(
        crate::rdf::Subject::from(quad.subject.clone()),
        NamedNode::from(quad.predicate.clone()),
        crate::rdf::Object::from(quad.object.clone()),
        graph,
    ))
}

fn delete_data_quad(
    quad: &GroundQuad,
    shadow: &mut Dataset,
    union_default: bool,
    cs: &mut ChangeSet,
) -> SparqlResult<()> {
    let subject = match &quad.subject {
        GroundSubject::NamedNode(n) => crate::rdf::Subject::from(NamedNode::from(n.clone())),
        #[allow(unreachable_patterns)]
        _ => return Err(SparqlError::Unsupported("RDF-star data".to_string())),
    };
    let object = match &quad.object {
        GroundTerm::NamedNode(n) => crate::rdf::Object::from(NamedNode::from(n.clone())),
        GroundTerm::Literal(l) => crate::rdf::Object::from(crate::rdf::Literal::from(l.clone())),
        #[allow(unreachable_patterns)]
        _ => return Err(SparqlError::Unsupported("RDF-star data".to_string())),
    };
    let triple = Triple::new(subject, NamedNode::from(quad.predicate.clone()), object);

    match &quad.graph_name {
        GraphName::NamedNode(g) => {
            let graph = NamedNode::new(g.as_str())
                .map_err(|e| SparqlError::Update(e.to_string()))?;
            let quad = triple.in_graph(graph.clone());
            if shadow.remove(&quad) {
                cs.remove(graph, quad.as_triple());
            }
        }
        GraphName::DefaultGraph => {
            // the default graph is the union iff configured so;
            // otherwise deleting from it touches nothing
            if union_default {
                for graph in shadow.graphs() {
                    let quad = triple.clone().in_graph(graph.clone());
                    if shadow.remove(&quad) {
                        cs.remove(graph, quad.as_triple());
                    }
                }
            }
        }
    }
    Ok(())
}

enum GraphTargetRef {
    Graph(NamedNode),
    Default,
}

fn apply_delete_pattern(
    pattern: &GroundQuadPattern,
    solution: &Binding,
    shadow: &mut Dataset,
    union_default: bool,
    cs: &mut ChangeSet,
) -> SparqlResult<()> {
    let subject = match ground_term_pattern(&pattern.subject, solution) {
        Some(term) => term,
        None => return Ok(()),
    };
    let predicate = match named_pattern(&pattern.predicate, solution) {
        Some(node) => node,
        None => return Ok(()),
    };
    let object = match ground_term_pattern(&pattern.object, solution) {
        Some(term) => term,
        None => return Ok(()),
    };
    let triple = match term_triple(subject, predicate, object) {
        Some(triple) => triple,
        None => return Ok(()),
    };
    let target = match graph_pattern_target(&pattern.graph_name, solution)? {
        Some(target) => target,
        None => return Ok(()),
    };

    match target {
        GraphTargetRef::Graph(graph) => {
            let quad = triple.in_graph(graph.clone());
            if shadow.remove(&quad) {
                cs.remove(graph, quad.as_triple());
            }
        }
        GraphTargetRef::Default => {
            if union_default {
                for graph in shadow.graphs() {
                    let quad = triple.clone().in_graph(graph.clone());
                    if shadow.remove(&quad) {
                        cs.remove(graph, quad.as_triple());
                    }
                }
            }
        }
    }
    Ok(())
}

fn apply_insert_pattern(
    pattern: &QuadPattern,
    solution: &Binding,
    solution_index: usize,
    shadow: &mut Dataset,
    cs: &mut ChangeSet,
) -> SparqlResult<()> {
    let subject = match term_pattern(&pattern.subject, solution, solution_index) {
        Some(term) => term,
        None => return Ok(()),
    };
    let predicate = match named_pattern(&pattern.predicate, solution) {
        Some(node) => node,
        None => return Ok(()),
    };
    let object = match term_pattern(&pattern.object, solution, solution_index) {
        Some(term) => term,
        None => return Ok(()),
    };
    let triple = match term_triple(subject, predicate, object) {
        Some(triple) => triple,
        None => return Ok(()),
    };
    let graph = match graph_pattern_target(&pattern.graph_name, solution)? {
        Some(GraphTargetRef::Graph(graph)) => graph,
        Some(GraphTargetRef::Default) => {
            return Err(SparqlError::Update(
                "INSERT into the default graph is not supported; name a graph".to_string(),
            ))
        }
        None => return Ok(()),
    };

    let quad = triple.in_graph(graph.clone());
    if shadow.insert(quad.clone()) {
        cs.add(graph, quad.as_triple());
    } else {
        cs.touch(graph);
    }
    Ok(())
}

fn clear_target(
    target: &GraphTarget,
    shadow: &mut Dataset,
    union_default: bool,
    silent: bool,
    drop: bool,
) -> SparqlResult<ChangeSet> {
    let graphs: Vec<NamedNode> = match target {
        GraphTarget::NamedNode(n) => {
            let graph = NamedNode::new(n.as_str())
                .map_err(|e| SparqlError::Update(e.to_string()))?;
            if !shadow.has_graph(&graph) {
                if silent {
                    return Ok(ChangeSet::new());
                }
                return Err(SparqlError::UnknownGraph(graph.as_str().to_string()));
            }
            vec![graph]
        }
        GraphTarget::DefaultGraph => {
            if union_default {
                shadow.graphs()
            } else {
                Vec::new()
            }
        }
        GraphTarget::NamedGraphs | GraphTarget::AllGraphs => shadow.graphs(),
    };

    let mut cs = ChangeSet::new();
    for graph in graphs {
        for triple in shadow.triples_in(&graph) {
            cs.remove(graph.clone(), triple.clone());
        }
        if drop {
            shadow.drop_graph(&graph);
        } else {
            shadow.clear(&graph);
        }
        cs.touch(graph);
    }
    Ok(cs)
}

fn scoped_view<'a>(
    dataset: &'a Dataset,
    union_default: bool,
    using: Option<&QueryDataset>,
    protocol: Option<&UpdateScoping>,
) -> DatasetView<'a> {
    let mut view = DatasetView::new(dataset, union_default);
    if let Some(using) = using {
        if !using.default.is_empty() {
            view = view.with_default_graphs(convert_graphs(&using.default));
        }
        if let Some(named) = &using.named {
            view = view.with_named_graphs(convert_graphs(named));
        }
    } else if let Some(protocol) = protocol {
        if !protocol.default.is_empty() {
            view = view.with_default_graphs(convert_graphs(&protocol.default));
        }
        if !protocol.named.is_empty() {
            view = view.with_named_graphs(convert_graphs(&protocol.named));
        }
    }
    view
}

fn convert_graphs(graphs: &[OxNamedNode]) -> Vec<NamedNode> {
    graphs.iter().map(|g| NamedNode::from(g.clone())).collect()
}

fn named_graph(name: &GraphName) -> SparqlResult<NamedNode> {
    match name {
        GraphName::NamedNode(n) => Ok(NamedNode::from(n.clone())),
        GraphName::DefaultGraph => Err(SparqlError::Update(
            "INSERT into the default graph is not supported; name a graph".to_string(),
        )),
    }
}

fn ground_term_pattern(pattern: &GroundTermPattern, solution: &Binding) -> Option<OxTerm> {
    match pattern {
        GroundTermPattern::NamedNode(n) => Some(OxTerm::NamedNode(n.clone())),
        GroundTermPattern::Literal(l) => Some(OxTerm::Literal(l.clone())),
        GroundTermPattern::Variable(v) => solution.get(v.as_str()).cloned(),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn term_pattern(
    pattern: &TermPattern,
    solution: &Binding,
    solution_index: usize,
) -> Option<OxTerm> {
    match pattern {
        TermPattern::NamedNode(n) => Some(OxTerm::NamedNode(n.clone())),
        TermPattern::Literal(l) => Some(OxTerm::Literal(l.clone())),
        TermPattern::Variable(v) => solution.get(v.as_str()).cloned(),
        TermPattern::BlankNode(b) => {
            // one fresh blank node per template blank per solution,
            // deterministic so that history replay reproduces it
            let label = format!("genb{}x{}", solution_index, b.as_str());
            oxrdf::BlankNode::new(label).ok().map(OxTerm::BlankNode)
        }
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn named_pattern(pattern: &NamedNodePattern, solution: &Binding) -> Option<NamedNode> {
    match pattern {
        NamedNodePattern::NamedNode(n) => Some(NamedNode::from(n.clone())),
        NamedNodePattern::Variable(v) => match solution.get(v.as_str()) {
            Some(OxTerm::NamedNode(n)) => Some(NamedNode::from(n.clone())),
            _ => None,
        },
    }
}

fn graph_pattern_target(
    pattern: &GraphNamePattern,
    solution: &Binding,
) -> SparqlResult<Option<GraphTargetRef>> {
    Ok(match pattern {
        GraphNamePattern::NamedNode(n) => {
            Some(GraphTargetRef::Graph(NamedNode::from(n.clone())))
        }
        GraphNamePattern::DefaultGraph => Some(GraphTargetRef::Default),
        GraphNamePattern::Variable(v) => match solution.get(v.as_str()) {
            Some(OxTerm::NamedNode(n)) => {
                Some(GraphTargetRef::Graph(NamedNode::from(n.clone())))
            }
            _ => None,
        },
    })
}

fn term_triple(subject: OxTerm, predicate: NamedNode, object: OxTerm) -> Option<Triple> {
    let subject: crate::rdf::Subject = match subject {
        OxTerm::NamedNode(n) => NamedNode::from(n).into(),
        OxTerm::BlankNode(b) => crate::rdf::BlankNode::from(b).into(),
        OxTerm::Literal(_) => return None,
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    let object: crate::rdf::Object = match object {
        OxTerm::NamedNode(n) => NamedNode::from(n).into(),
        OxTerm::BlankNode(b) => crate::rdf::BlankNode::from(b).into(),
        OxTerm::Literal(l) => crate::rdf::Literal::from(l).into(),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(Triple::new(subject, predicate, object))
}

/// Drop triples recorded as both added and removed by the same
/// operation: their net effect is nil.
fn normalize(cs: &mut ChangeSet) {
    for delta in cs.graphs.values_mut() {
        let common: Vec<Triple> = delta
            .additions
            .intersection(&delta.removals)
            .cloned()
            .collect();
        for triple in common {
            delta.additions.remove(&triple);
            delta.removals.remove(&triple);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparql::parser::parse_update;

    fn graph(iri: &str) -> NamedNode {
        NamedNode::new(iri).unwrap()
    }

    #[test]
    fn test_insert_data() {
        let mut ds = Dataset::new();
        let update = parse_update(
            "INSERT DATA { GRAPH <urn:graph> { <urn:I> <urn:II> <urn:III> } }",
            None,
        )
        .unwrap();
        let change_sets = execute_update(&update, &mut ds, false, None).unwrap();

        assert_eq!(change_sets.len(), 1);
        let delta = &change_sets[0].graphs[&graph("urn:graph")];
        assert_eq!(delta.additions.len(), 1);
        assert!(delta.removals.is_empty());
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_insert_existing_is_not_recorded() {
        let mut ds = Dataset::new();
        let update = parse_update(
            "INSERT DATA { GRAPH <urn:graph> { <urn:I> <urn:II> <urn:III> } }",
            None,
        )
        .unwrap();
        execute_update(&update, &mut ds, false, None).unwrap();
        let change_sets = execute_update(&update, &mut ds, false, None).unwrap();

        let delta = &change_sets[0].graphs[&graph("urn:graph")];
        assert!(delta.additions.is_empty());
        assert!(delta.removals.is_empty());
    }

    #[test]
    fn test_delete_data() {
        let mut ds = Dataset::new();
        let insert = parse_update(
            "INSERT DATA { GRAPH <urn:graph> { <urn:I> <urn:II> <urn:III> } }",
            None,
        )
        .unwrap();
        execute_update(&insert, &mut ds, false, None).unwrap();

        let delete = parse_update(
            "DELETE DATA { GRAPH <urn:graph> { <urn:I> <urn:II> <urn:III> } }",
            None,
        )
        .unwrap();
        let change_sets = execute_update(&delete, &mut ds, false, None).unwrap();

        let delta = &change_sets[0].graphs[&graph("urn:graph")];
        assert_eq!(delta.removals.len(), 1);
        assert_eq!(ds.len(), 0);
        // the emptied graph stays known so its file is kept
        assert!(ds.has_graph(&graph("urn:graph")));
    }

    #[test]
    fn test_delete_insert_where() {
        let mut ds = Dataset::new();
        let seed = parse_update(
            "INSERT DATA { GRAPH <urn:graph> { <urn:a> <urn:p> <urn:old> } }",
            None,
        )
        .unwrap();
        execute_update(&seed, &mut ds, false, None).unwrap();

        let rewrite = parse_update(
            "DELETE { GRAPH <urn:graph> { ?s <urn:p> <urn:old> } } \
             INSERT { GRAPH <urn:graph> { ?s <urn:p> <urn:new> } } \
             WHERE { GRAPH <urn:graph> { ?s <urn:p> <urn:old> } }",
            None,
        )
        .unwrap();
        let change_sets = execute_update(&rewrite, &mut ds, false, None).unwrap();

        let delta = &change_sets[0].graphs[&graph("urn:graph")];
        assert_eq!(delta.additions.len(), 1);
        assert_eq!(delta.removals.len(), 1);
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_delete_insert_same_triple_normalizes() {
        let mut ds = Dataset::new();
        let seed = parse_update(
            "INSERT DATA { GRAPH <urn:graph> { <urn:a> <urn:p> <urn:o> } }",
            None,
        )
        .unwrap();
        execute_update(&seed, &mut ds, false, None).unwrap();

        // delete and re-insert the identical triple: net effect nil
        let churn = parse_update(
            "DELETE { GRAPH <urn:graph> { ?s <urn:p> ?o } } \
             INSERT { GRAPH <urn:graph> { ?s <urn:p> ?o } } \
             WHERE { GRAPH <urn:graph> { ?s <urn:p> ?o } }",
            None,
        )
        .unwrap();
        let change_sets = execute_update(&churn, &mut ds, false, None).unwrap();

        let delta = &change_sets[0].graphs[&graph("urn:graph")];
        assert!(delta.additions.is_empty());
        assert!(delta.removals.is_empty());
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_multi_operation_order() {
        let mut ds = Dataset::new();
        let update = parse_update(
            "INSERT DATA { GRAPH <urn:g> { <urn:a> <urn:b> <urn:c> } } ; \
             DELETE DATA { GRAPH <urn:g> { <urn:a> <urn:b> <urn:c> } }",
            None,
        )
        .unwrap();
        let change_sets = execute_update(&update, &mut ds, false, None).unwrap();

        assert_eq!(change_sets.len(), 2);
        assert_eq!(change_sets[0].graphs[&graph("urn:g")].additions.len(), 1);
        assert_eq!(change_sets[1].graphs[&graph("urn:g")].removals.len(), 1);
        assert_eq!(ds.len(), 0);
    }

    #[test]
    fn test_load_rejected() {
        let mut ds = Dataset::new();
        let update =
            parse_update("LOAD <http://example.org/data.nt> INTO GRAPH <urn:g>", None).unwrap();
        assert!(matches!(
            execute_update(&update, &mut ds, false, None),
            Err(SparqlError::Update(_))
        ));
    }

    #[test]
    fn test_clear_unknown_graph() {
        let mut ds = Dataset::new();
        let update = parse_update("CLEAR GRAPH <urn:missing>", None).unwrap();
        assert!(matches!(
            execute_update(&update, &mut ds, false, None),
            Err(SparqlError::UnknownGraph(_))
        ));

        let silent = parse_update("CLEAR SILENT GRAPH <urn:missing>", None).unwrap();
        assert!(execute_update(&silent, &mut ds, false, None).is_ok());
    }

    #[test]
    fn test_create_graph() {
        let mut ds = Dataset::new();
        let update = parse_update("CREATE GRAPH <urn:fresh>", None).unwrap();
        let change_sets = execute_update(&update, &mut ds, false, None).unwrap();

        assert!(ds.has_graph(&graph("urn:fresh")));
        assert!(change_sets[0].graphs.contains_key(&graph("urn:fresh")));
        // creating it again fails unless silent
        assert!(execute_update(&update, &mut ds, false, None).is_err());
    }

    #[test]
    fn test_conflicting_scoping_rejected() {
        let mut ds = Dataset::new();
        let update = parse_update(
            "DELETE { GRAPH <urn:g> { ?s ?p ?o } } USING <urn:g> WHERE { ?s ?p ?o }",
            None,
        )
        .unwrap();
        let protocol = UpdateScoping {
            default: vec![OxNamedNode::new("urn:other").unwrap()],
            named: Vec::new(),
        };
        assert!(matches!(
            execute_update(&update, &mut ds, false, Some(&protocol)),
            Err(SparqlError::Update(_))
        ));
    }
}
