//! Provenance index
//!
//! A second dataset recording who changed what and when, derived from
//! the commit history. Rebuilding walks the commits from the root and
//! re-executes each recorded update against its parent snapshot, so a
//! rebuilt index equals the one the live pipeline extended; commits
//! without a recorded query (imports, merges) contribute the tree
//! diff against their first parent as a single update. User updates
//! never write here directly.

use crate::config::{ConfigMode, StoreConfig};
use crate::rdf::{
    ChangeSet, Dataset, GraphDelta, Literal, NamedNode, Object, Quad, Subject, Triple,
};
use crate::repo::{CommitMeta, RepoResult, Repository};
use crate::sparql::{execute_update, parse_update};
use crate::store::{QuitStore, RegistryMode};
use chrono::{DateTime, SecondsFormat};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::{debug, info, warn};

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const XSD_DATETIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

const PROV_ACTIVITY: &str = "http://www.w3.org/ns/prov#Activity";
const PROV_AGENT: &str = "http://www.w3.org/ns/prov#Agent";
const PROV_STARTED_AT: &str = "http://www.w3.org/ns/prov#startedAtTime";
const PROV_ENDED_AT: &str = "http://www.w3.org/ns/prov#endedAtTime";
const PROV_ASSOCIATED: &str = "http://www.w3.org/ns/prov#wasAssociatedWith";

const QUIT_UPDATES: &str = "http://quit.aksw.org/vocab/updates";
const QUIT_ADDITIONS: &str = "http://quit.aksw.org/vocab/additions";
const QUIT_REMOVALS: &str = "http://quit.aksw.org/vocab/removals";
const QUIT_QUERY: &str = "http://quit.aksw.org/vocab/query";
const QUIT_GRAPH: &str = "http://quit.aksw.org/vocab/graph";

const FOAF_NAME: &str = "http://xmlns.com/foaf/0.1/name";
const FOAF_MBOX: &str = "http://xmlns.com/foaf/0.1/mbox";

/// Append-only provenance dataset
pub struct ProvenanceIndex {
    namespace: String,
    dataset: Dataset,
}

impl ProvenanceIndex {
    /// Empty index rooted at a namespace
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            dataset: Dataset::new(),
        }
    }

    /// The provenance dataset, queried with a union default graph
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Rebuild the index from the full commit history
    pub fn rebuild(&mut self, repo: &Repository, config: &StoreConfig) -> RepoResult<()> {
        self.dataset = Dataset::new();
        let Some(head) = repo.head_oid() else {
            debug!("empty repository, nothing to index");
            return Ok(());
        };

        let mode = match config.mode {
            ConfigMode::Sidecar => RegistryMode::Sidecar,
            ConfigMode::ConfigFile => RegistryMode::ConfigFile(config.config_file.clone()),
        };

        let history = repo.history_from_root(head)?;
        info!("rebuilding provenance over {} commits", history.len());
        for oid in history {
            let meta = repo.commit_meta(oid)?;
            let parents = repo.parents_of(oid)?;
            let parent_dataset = match parents.first() {
                Some(parent) => {
                    QuitStore::materialize(repo, *parent, mode.clone())?.1
                }
                None => Dataset::new(),
            };
            let commit_dataset = QuitStore::materialize(repo, oid, mode.clone())?.1;

            let change_sets = match extract_query(&meta.message) {
                // merges carry two parents; their effect is only the
                // resulting diff, not a replayable query
                Some(query) if parents.len() <= 1 => {
                    replay(query, &parent_dataset, config).unwrap_or_else(|| {
                        warn!("replay failed for {}, falling back to diff", meta.id);
                        vec![diff(&parent_dataset, &commit_dataset)]
                    })
                }
                _ => vec![diff(&parent_dataset, &commit_dataset)],
            };
            self.observe(&meta, &change_sets);
        }
        Ok(())
    }

    /// Extend the index with one commit and its change sets
    pub fn observe(&mut self, meta: &CommitMeta, change_sets: &[ChangeSet]) {
        let meta_graph = match NamedNode::new(format!("{}provenance", self.namespace)) {
            Ok(graph) => graph,
            Err(e) => {
                warn!("invalid provenance namespace: {}", e);
                return;
            }
        };
        let Ok(activity) = NamedNode::new(format!("{}activity/{}", self.namespace, meta.id))
        else {
            return;
        };

        self.meta_triple(
            &meta_graph,
            activity.clone(),
            RDF_TYPE,
            named(PROV_ACTIVITY),
        );
        self.meta_triple(
            &meta_graph,
            activity.clone(),
            PROV_STARTED_AT,
            datetime_literal(meta.authored_at),
        );
        self.meta_triple(
            &meta_graph,
            activity.clone(),
            PROV_ENDED_AT,
            datetime_literal(meta.committed_at),
        );
        if let Some(query) = extract_query(&meta.message) {
            self.meta_triple(
                &meta_graph,
                activity.clone(),
                QUIT_QUERY,
                Object::Literal(Literal::new_simple_literal(query)),
            );
        }

        // attribution of the committer
        let agent_id = format!(
            "{}user/{}",
            self.namespace,
            utf8_percent_encode(&meta.committer.email, NON_ALPHANUMERIC)
        );
        if let Ok(agent) = NamedNode::new(agent_id) {
            self.meta_triple(
                &meta_graph,
                activity.clone(),
                PROV_ASSOCIATED,
                Object::NamedNode(agent.clone()),
            );
            self.meta_triple(&meta_graph, agent.clone(), RDF_TYPE, named(PROV_AGENT));
            self.meta_triple(
                &meta_graph,
                agent.clone(),
                FOAF_NAME,
                Object::Literal(Literal::new_simple_literal(&meta.committer.name)),
            );
            if let Ok(mbox) = NamedNode::new(format!("mailto:{}", meta.committer.email)) {
                self.meta_triple(&meta_graph, agent, FOAF_MBOX, Object::NamedNode(mbox));
            }
        }

        for (index, change_set) in change_sets.iter().enumerate() {
            let Ok(update) =
                NamedNode::new(format!("{}update/{}/{}", self.namespace, meta.id, index))
            else {
                continue;
            };
            self.meta_triple(
                &meta_graph,
                activity.clone(),
                QUIT_UPDATES,
                Object::NamedNode(update.clone()),
            );

            for (graph, delta) in &change_set.graphs {
                if !delta.additions.is_empty() {
                    self.record_delta(
                        &meta_graph,
                        &update,
                        QUIT_ADDITIONS,
                        "additions",
                        graph,
                        &delta.additions,
                    );
                }
                if !delta.removals.is_empty() {
                    self.record_delta(
                        &meta_graph,
                        &update,
                        QUIT_REMOVALS,
                        "removals",
                        graph,
                        &delta.removals,
                    );
                }
            }
        }
    }

    /// Link a per-graph delta to its update node and materialize the
    /// changed triples in the delta's own graph
    fn record_delta<'a>(
        &mut self,
        meta_graph: &NamedNode,
        update: &NamedNode,
        predicate: &str,
        kind: &str,
        graph: &NamedNode,
        triples: impl IntoIterator<Item = &'a Triple>,
    ) {
        let delta_id = format!(
            "{}/{}/{}",
            update.as_str(),
            kind,
            utf8_percent_encode(graph.as_str(), NON_ALPHANUMERIC)
        );
        let Ok(delta_node) = NamedNode::new(delta_id) else {
            return;
        };
        self.meta_triple(
            meta_graph,
            update.clone(),
            predicate,
            Object::NamedNode(delta_node.clone()),
        );
        self.meta_triple(
            meta_graph,
            delta_node.clone(),
            QUIT_GRAPH,
            Object::NamedNode(graph.clone()),
        );
        for triple in triples {
            self.dataset
                .insert(triple.clone().in_graph(delta_node.clone()));
        }
    }

    fn meta_triple(
        &mut self,
        meta_graph: &NamedNode,
        subject: NamedNode,
        predicate: &str,
        object: Object,
    ) {
        let Ok(predicate) = NamedNode::new(predicate) else {
            return;
        };
        self.dataset.insert(Quad::new(
            Subject::NamedNode(subject),
            predicate,
            object,
            meta_graph.clone(),
        ));
    }
}

fn named(iri: &str) -> Object {
    // constant vocabulary IRIs
    Object::NamedNode(NamedNode::new(iri).expect("vocabulary IRI"))
}

fn datetime_literal(seconds: i64) -> Object {
    let rendered = DateTime::from_timestamp(seconds, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string());
    Object::Literal(Literal::new_typed_literal(
        rendered,
        NamedNode::new(XSD_DATETIME).expect("vocabulary IRI"),
    ))
}

/// Verbatim update text recorded in a commit message
pub fn extract_query(message: &str) -> Option<&str> {
    let start = message.find("Query: \"")? + "Query: \"".len();
    let rest = &message[start..];
    let end = rest.rfind("\"\nOperationTypes: ")?;
    Some(&rest[..end])
}

/// Re-execute a recorded update against the parent snapshot
fn replay(query: &str, parent: &Dataset, config: &StoreConfig) -> Option<Vec<ChangeSet>> {
    let parsed = parse_update(query, Some(&config.namespace)).ok()?;
    let mut shadow = parent.clone();
    execute_update(&parsed, &mut shadow, config.union_default_graph, None).ok()
}

/// Change set equivalent to the difference between two snapshots
fn diff(parent: &Dataset, commit: &Dataset) -> ChangeSet {
    let mut cs = ChangeSet::new();
    let mut graphs = parent.graphs();
    for graph in commit.graphs() {
        if !graphs.contains(&graph) {
            graphs.push(graph);
        }
    }
    graphs.sort();

    for graph in graphs {
        let before: rustc_hash::FxHashSet<&Triple> = parent.triples_in(&graph).collect();
        let after: rustc_hash::FxHashSet<&Triple> = commit.triples_in(&graph).collect();
        let mut delta = GraphDelta::default();
        for triple in after.difference(&before) {
            delta.additions.insert((*triple).clone());
        }
        for triple in before.difference(&after) {
            delta.removals.insert((*triple).clone());
        }
        if !delta.is_empty() {
            cs.graphs.insert(graph, delta);
        }
    }
    cs
}
