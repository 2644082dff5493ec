//! In-memory quad dataset
//!
//! The dataset is the live state of one branch: a duplicate-free set
//! of quads, bucketed per named graph. Cloning a dataset yields the
//! shadow copy the update transaction mutates; the original stays
//! untouched until the transaction swaps it in.

use super::types::{NamedNode, Object, Quad, Subject, Triple};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

/// Quad pattern for lookups (None = wildcard)
#[derive(Debug, Clone, Default)]
pub struct QuadPattern {
    pub subject: Option<Subject>,
    pub predicate: Option<NamedNode>,
    pub object: Option<Object>,
    pub graph: Option<NamedNode>,
}

impl QuadPattern {
    /// Check if a quad matches this pattern
    pub fn matches(&self, quad: &Quad) -> bool {
        if let Some(ref s) = self.subject {
            if s != &quad.subject {
                return false;
            }
        }
        if let Some(ref p) = self.predicate {
            if p != &quad.predicate {
                return false;
            }
        }
        if let Some(ref o) = self.object {
            if o != &quad.object {
                return false;
            }
        }
        if let Some(ref g) = self.graph {
            if g != &quad.graph {
                return false;
            }
        }
        true
    }
}

/// Duplicate-free in-memory quad set, bucketed per named graph
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    graphs: FxHashMap<NamedNode, FxHashSet<Triple>>,
}

impl Dataset {
    /// Create a new empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a batch of quads, ignoring duplicates
    pub fn load(&mut self, quads: impl IntoIterator<Item = Quad>) {
        for quad in quads {
            self.insert(quad);
        }
    }

    /// Insert a quad. Returns false if it was already present.
    pub fn insert(&mut self, quad: Quad) -> bool {
        let triple = quad.as_triple();
        self.graphs.entry(quad.graph).or_default().insert(triple)
    }

    /// Remove a quad. Returns false if it was not present.
    ///
    /// The graph bucket survives the removal of its last triple: an
    /// emptied graph is still a known graph with a file on disk.
    pub fn remove(&mut self, quad: &Quad) -> bool {
        match self.graphs.get_mut(&quad.graph) {
            Some(triples) => triples.remove(&quad.as_triple()),
            None => false,
        }
    }

    /// Check if a quad exists
    pub fn contains(&self, quad: &Quad) -> bool {
        self.graphs
            .get(&quad.graph)
            .map(|t| t.contains(&quad.as_triple()))
            .unwrap_or(false)
    }

    /// Register an (initially empty) named graph
    pub fn create_graph(&mut self, graph: NamedNode) {
        self.graphs.entry(graph).or_default();
    }

    /// Remove every triple of a graph, keeping the graph itself
    pub fn clear(&mut self, graph: &NamedNode) {
        if let Some(triples) = self.graphs.get_mut(graph) {
            triples.clear();
        }
    }

    /// Drop a graph entirely
    pub fn drop_graph(&mut self, graph: &NamedNode) {
        self.graphs.remove(graph);
    }

    /// Triples of one graph
    pub fn triples_in(&self, graph: &NamedNode) -> impl Iterator<Item = &Triple> {
        self.graphs.get(graph).into_iter().flatten()
    }

    /// True if the graph is known to the dataset
    pub fn has_graph(&self, graph: &NamedNode) -> bool {
        self.graphs.contains_key(graph)
    }

    /// All named graphs, sorted for deterministic iteration
    pub fn graphs(&self) -> Vec<NamedNode> {
        let mut names: Vec<NamedNode> = self.graphs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Iterate over all quads
    pub fn quads(&self) -> impl Iterator<Item = Quad> + '_ {
        self.graphs.iter().flat_map(|(graph, triples)| {
            triples
                .iter()
                .map(move |t| t.clone().in_graph(graph.clone()))
        })
    }

    /// Quads matching a pattern
    pub fn quads_matching(&self, pattern: &QuadPattern) -> Vec<Quad> {
        self.quads().filter(|q| pattern.matches(q)).collect()
    }

    /// Total number of quads
    pub fn len(&self) -> usize {
        self.graphs.values().map(|t| t.len()).sum()
    }

    /// Check if the dataset holds no quads
    pub fn is_empty(&self) -> bool {
        self.graphs.values().all(|t| t.is_empty())
    }
}

/// Read view handed to the SPARQL engine.
///
/// The default-graph decision is carried per request instead of being
/// a process-wide switch: the default graph is the union of all named
/// graphs iff `union_default` is set, otherwise empty. Protocol or
/// FROM/FROM NAMED scoping further restricts what the engine sees.
pub struct DatasetView<'a> {
    dataset: &'a Dataset,
    union_default: bool,
    default_graphs: Option<Vec<NamedNode>>,
    named_graphs: Option<Vec<NamedNode>>,
}

impl<'a> DatasetView<'a> {
    /// View with the store-wide default-graph setting
    pub fn new(dataset: &'a Dataset, union_default: bool) -> Self {
        Self {
            dataset,
            union_default,
            default_graphs: None,
            named_graphs: None,
        }
    }

    /// Restrict the default graph to an explicit graph list
    pub fn with_default_graphs(mut self, graphs: Vec<NamedNode>) -> Self {
        self.default_graphs = Some(graphs);
        self
    }

    /// Restrict the named graphs visible to GRAPH patterns
    pub fn with_named_graphs(mut self, graphs: Vec<NamedNode>) -> Self {
        self.named_graphs = Some(graphs);
        self
    }

    /// Triples visible in the default graph
    pub fn default_graph_triples(&self) -> Vec<Triple> {
        match &self.default_graphs {
            Some(graphs) => {
                let mut seen = FxHashSet::default();
                let mut out = Vec::new();
                for g in graphs {
                    for t in self.dataset.triples_in(g) {
                        if seen.insert(t.clone()) {
                            out.push(t.clone());
                        }
                    }
                }
                out
            }
            None if self.union_default => {
                let mut seen = FxHashSet::default();
                let mut out = Vec::new();
                for g in self.dataset.graphs() {
                    for t in self.dataset.triples_in(&g) {
                        if seen.insert(t.clone()) {
                            out.push(t.clone());
                        }
                    }
                }
                out
            }
            None => Vec::new(),
        }
    }

    /// Triples of one named graph
    pub fn graph_triples(&self, graph: &NamedNode) -> Vec<Triple> {
        if let Some(named) = &self.named_graphs {
            if !named.contains(graph) {
                return Vec::new();
            }
        }
        self.dataset.triples_in(graph).cloned().collect()
    }

    /// Named graphs visible to GRAPH ?g patterns
    pub fn named_graph_names(&self) -> Vec<NamedNode> {
        match &self.named_graphs {
            Some(named) => named.clone(),
            None => self.dataset.graphs(),
        }
    }

    /// The underlying dataset
    pub fn dataset(&self) -> &Dataset {
        self.dataset
    }
}

/// Additions and removals of one graph within a change set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphDelta {
    pub additions: FxHashSet<Triple>,
    pub removals: FxHashSet<Triple>,
}

impl GraphDelta {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// Effect of one SPARQL Update sub-operation, keyed by graph IRI.
///
/// BTreeMap keeps graph iteration deterministic. After normalization
/// a triple never appears in both sets of the same graph; a graph key
/// with an empty delta records graph creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub graphs: BTreeMap<NamedNode, GraphDelta>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an effective addition
    pub fn add(&mut self, graph: NamedNode, triple: Triple) {
        self.graphs.entry(graph).or_default().additions.insert(triple);
    }

    /// Record an effective removal
    pub fn remove(&mut self, graph: NamedNode, triple: Triple) {
        self.graphs.entry(graph).or_default().removals.insert(triple);
    }

    /// Record a graph as touched without any triple change
    pub fn touch(&mut self, graph: NamedNode) {
        self.graphs.entry(graph).or_default();
    }

    /// True when no graph was touched at all
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(s: &str, p: &str, o: &str, g: &str) -> Quad {
        Quad::new(
            NamedNode::new(s).unwrap(),
            NamedNode::new(p).unwrap(),
            NamedNode::new(o).unwrap(),
            NamedNode::new(g).unwrap(),
        )
    }

    #[test]
    fn test_insert_and_contains() {
        let mut ds = Dataset::new();
        let q = quad("urn:a", "urn:b", "urn:c", "urn:g");

        assert!(ds.insert(q.clone()));
        assert!(!ds.insert(q.clone())); // duplicate
        assert_eq!(ds.len(), 1);
        assert!(ds.contains(&q));
    }

    #[test]
    fn test_remove_keeps_graph() {
        let mut ds = Dataset::new();
        let q = quad("urn:a", "urn:b", "urn:c", "urn:g");
        ds.insert(q.clone());

        assert!(ds.remove(&q));
        assert!(!ds.remove(&q));
        assert_eq!(ds.len(), 0);
        // the emptied graph is still known
        assert!(ds.has_graph(&NamedNode::new("urn:g").unwrap()));
    }

    #[test]
    fn test_clear_graph() {
        let mut ds = Dataset::new();
        ds.insert(quad("urn:a", "urn:b", "urn:c", "urn:g1"));
        ds.insert(quad("urn:a", "urn:b", "urn:c", "urn:g2"));

        ds.clear(&NamedNode::new("urn:g1").unwrap());
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.graphs().len(), 2);
    }

    #[test]
    fn test_pattern_matching() {
        let mut ds = Dataset::new();
        ds.insert(quad("urn:a", "urn:b", "urn:c", "urn:g"));
        ds.insert(quad("urn:x", "urn:b", "urn:c", "urn:g"));

        let pattern = QuadPattern {
            subject: Some(Subject::NamedNode(NamedNode::new("urn:a").unwrap())),
            ..Default::default()
        };
        assert_eq!(ds.quads_matching(&pattern).len(), 1);

        let all = QuadPattern::default();
        assert_eq!(ds.quads_matching(&all).len(), 2);
    }

    #[test]
    fn test_shadow_copy_isolation() {
        let mut ds = Dataset::new();
        ds.insert(quad("urn:a", "urn:b", "urn:c", "urn:g"));

        let mut shadow = ds.clone();
        shadow.insert(quad("urn:x", "urn:y", "urn:z", "urn:g"));

        assert_eq!(ds.len(), 1);
        assert_eq!(shadow.len(), 2);
    }

    #[test]
    fn test_union_default_view() {
        let mut ds = Dataset::new();
        ds.insert(quad("urn:a", "urn:b", "urn:c", "urn:g1"));
        ds.insert(quad("urn:x", "urn:y", "urn:z", "urn:g2"));

        let union = DatasetView::new(&ds, true);
        assert_eq!(union.default_graph_triples().len(), 2);

        let empty = DatasetView::new(&ds, false);
        assert!(empty.default_graph_triples().is_empty());
    }

    #[test]
    fn test_scoped_view() {
        let mut ds = Dataset::new();
        ds.insert(quad("urn:a", "urn:b", "urn:c", "urn:g1"));
        ds.insert(quad("urn:x", "urn:y", "urn:z", "urn:g2"));

        let g1 = NamedNode::new("urn:g1").unwrap();
        let view = DatasetView::new(&ds, false).with_default_graphs(vec![g1.clone()]);
        assert_eq!(view.default_graph_triples().len(), 1);

        let view = DatasetView::new(&ds, false).with_named_graphs(vec![g1.clone()]);
        assert_eq!(view.named_graph_names(), vec![g1]);
        assert!(view
            .graph_triples(&NamedNode::new("urn:g2").unwrap())
            .is_empty());
    }
}
