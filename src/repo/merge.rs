//! Merge strategies
//!
//! Three-way merges delegate to the git tree merge over the
//! serialized blobs. Context merges are graph-aware: both sides'
//! symmetric change sets against the common ancestor are compared,
//! and the merge is rejected when the two sides touch overlapping
//! nodes.

use super::repository::Repository;
use super::{RepoError, RepoResult};
use crate::rdf::{Dataset, NamedNode, Object, Subject, Triple};
use git2::Oid;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::str::FromStr;
use tracing::{debug, info};

/// Merge strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMethod {
    ThreeWay,
    Context,
}

impl FromStr for MergeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "three-way" => Ok(MergeMethod::ThreeWay),
            "context" => Ok(MergeMethod::Context),
            other => Err(format!("unknown merge method: {}", other)),
        }
    }
}

/// Structured conflict description returned to the caller
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConflictReport {
    /// Paths with text-level conflicts (three-way)
    pub files: Vec<String>,
    /// Node overlaps per graph (context)
    pub nodes: Vec<NodeConflict>,
}

/// One overlapping node between the two sides' change sets
#[derive(Debug, Clone, Serialize)]
pub struct NodeConflict {
    pub graph: String,
    pub node: String,
}

/// Merge `source` into `target` via the git three-way tree merge.
/// On success the merge commit carries both parents and `target`'s
/// branch ref advances; on conflict nothing is written.
pub fn three_way_merge(
    repo: &Repository,
    target_branch: &str,
    target: Oid,
    source: Oid,
    message: &str,
) -> RepoResult<Oid> {
    let base = repo.merge_base(target, source)?;
    debug!("three-way merge base {}", base);
    match repo.merge_trees(base, target, source)? {
        Ok(tree) => repo.commit_tree(target_branch, tree, &[target, source], message),
        Err(files) => Err(RepoError::MergeConflict(ConflictReport {
            files,
            nodes: Vec::new(),
        })),
    }
}

/// Graph-aware merge of two datasets against their common ancestor.
///
/// Per graph, each side's symmetric delta against the base is
/// computed. The merge conflicts when a node (subject, or non-literal
/// object) of a triple changed on one side also occurs in a triple
/// changed on the other side; triples changed identically on both
/// sides trivially merge and are excluded from the comparison.
/// Otherwise the merged graph is base plus both sides' additions
/// minus both sides' removals.
pub fn context_merge(
    base: &Dataset,
    ours: &Dataset,
    theirs: &Dataset,
) -> Result<Dataset, ConflictReport> {
    let mut graphs: Vec<NamedNode> = ours.graphs();
    for graph in theirs.graphs() {
        if !graphs.contains(&graph) {
            graphs.push(graph);
        }
    }
    graphs.sort();

    let mut merged = Dataset::new();
    let mut conflicts = Vec::new();

    for graph in &graphs {
        let base_triples: FxHashSet<Triple> = base.triples_in(graph).cloned().collect();
        let our_triples: FxHashSet<Triple> = ours.triples_in(graph).cloned().collect();
        let their_triples: FxHashSet<Triple> = theirs.triples_in(graph).cloned().collect();

        let our_delta: FxHashSet<Triple> = our_triples
            .symmetric_difference(&base_triples)
            .cloned()
            .collect();
        let their_delta: FxHashSet<Triple> = their_triples
            .symmetric_difference(&base_triples)
            .cloned()
            .collect();

        // identical changes on both sides merge trivially
        let disputed_ours: Vec<&Triple> =
            our_delta.difference(&their_delta).collect();
        let disputed_theirs: Vec<&Triple> =
            their_delta.difference(&our_delta).collect();

        let our_nodes = node_set(&disputed_ours);
        let their_nodes = node_set(&disputed_theirs);
        let mut overlap: Vec<&String> = our_nodes.intersection(&their_nodes).collect();
        overlap.sort();

        for node in overlap {
            conflicts.push(NodeConflict {
                graph: graph.as_str().to_string(),
                node: node.clone(),
            });
        }

        if conflicts.is_empty() {
            // base ∪ additions(both) − removals(both)
            let mut result = base_triples.clone();
            for t in our_triples.difference(&base_triples) {
                result.insert(t.clone());
            }
            for t in their_triples.difference(&base_triples) {
                result.insert(t.clone());
            }
            for t in base_triples.difference(&our_triples) {
                result.remove(t);
            }
            for t in base_triples.difference(&their_triples) {
                result.remove(t);
            }

            merged.create_graph(graph.clone());
            for triple in result {
                merged.insert(triple.in_graph(graph.clone()));
            }
        }
    }

    if conflicts.is_empty() {
        info!("context merge clean over {} graphs", graphs.len());
        Ok(merged)
    } else {
        info!("context merge conflicts on {} nodes", conflicts.len());
        Err(ConflictReport {
            files: Vec::new(),
            nodes: conflicts,
        })
    }
}

/// Subjects and non-literal objects of a set of triples
fn node_set(triples: &[&Triple]) -> FxHashSet<String> {
    let mut nodes = FxHashSet::default();
    for triple in triples {
        match &triple.subject {
            Subject::NamedNode(n) => {
                nodes.insert(n.as_str().to_string());
            }
            Subject::BlankNode(b) => {
                nodes.insert(format!("_:{}", b.as_str()));
            }
        }
        match &triple.object {
            Object::NamedNode(n) => {
                nodes.insert(n.as_str().to_string());
            }
            Object::BlankNode(b) => {
                nodes.insert(format!("_:{}", b.as_str()));
            }
            Object::Literal(_) => {}
        }
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::Quad;

    fn nn(iri: &str) -> NamedNode {
        NamedNode::new(iri).unwrap()
    }

    fn quad(s: &str, p: &str, o: &str, g: &str) -> Quad {
        Quad::new(nn(s), nn(p), nn(o), nn(g))
    }

    fn base_dataset() -> Dataset {
        let mut ds = Dataset::new();
        ds.insert(quad(
            "http://ex.org/a",
            "http://ex.org/b",
            "http://ex.org/c",
            "http://example.org/",
        ));
        ds
    }

    #[test]
    fn test_context_merge_disjoint_subjects() {
        let base = base_dataset();

        let mut ours = base.clone();
        ours.insert(quad(
            "http://ex.org/x",
            "http://ex.org/y",
            "http://ex.org/z",
            "http://example.org/",
        ));

        let mut theirs = base.clone();
        theirs.insert(quad(
            "http://ex.org/r",
            "http://ex.org/r",
            "http://ex.org/r",
            "http://example.org/",
        ));

        let merged = context_merge(&base, &ours, &theirs).unwrap();
        let graph = nn("http://example.org/");
        assert_eq!(merged.triples_in(&graph).count(), 3);
    }

    #[test]
    fn test_context_merge_node_overlap_conflicts() {
        let base = base_dataset();

        // ours adds <x> <y> <z>: node <z> appears as object
        let mut ours = base.clone();
        ours.insert(quad(
            "http://ex.org/x",
            "http://ex.org/y",
            "http://ex.org/z",
            "http://example.org/",
        ));

        // theirs adds <z> <z> <z>: node <z> appears as subject
        let mut theirs = base.clone();
        theirs.insert(quad(
            "http://ex.org/z",
            "http://ex.org/z",
            "http://ex.org/z",
            "http://example.org/",
        ));

        let report = context_merge(&base, &ours, &theirs).unwrap_err();
        assert!(report
            .nodes
            .iter()
            .any(|c| c.node == "http://ex.org/z"));
    }

    #[test]
    fn test_context_merge_identical_change_is_clean() {
        let base = base_dataset();

        let mut ours = base.clone();
        ours.insert(quad(
            "http://ex.org/n",
            "http://ex.org/n",
            "http://ex.org/n",
            "http://example.org/",
        ));
        let theirs = ours.clone();

        let merged = context_merge(&base, &ours, &theirs).unwrap();
        let graph = nn("http://example.org/");
        assert_eq!(merged.triples_in(&graph).count(), 2);
    }

    #[test]
    fn test_context_merge_removals_apply() {
        let base = base_dataset();

        // ours removes the base triple, theirs adds an unrelated one
        let mut ours = base.clone();
        ours.remove(&quad(
            "http://ex.org/a",
            "http://ex.org/b",
            "http://ex.org/c",
            "http://example.org/",
        ));

        let mut theirs = base.clone();
        theirs.insert(quad(
            "http://ex.org/q",
            "http://ex.org/q",
            "http://ex.org/q",
            "http://example.org/",
        ));

        let merged = context_merge(&base, &ours, &theirs).unwrap();
        let graph = nn("http://example.org/");
        let remaining: Vec<_> = merged.triples_in(&graph).collect();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].subject.to_string(), "<http://ex.org/q>");
    }

    #[test]
    fn test_merge_method_parse() {
        assert_eq!(
            "three-way".parse::<MergeMethod>().unwrap(),
            MergeMethod::ThreeWay
        );
        assert_eq!("context".parse::<MergeMethod>().unwrap(), MergeMethod::Context);
        assert!("fast-forward".parse::<MergeMethod>().is_err());
    }
}
