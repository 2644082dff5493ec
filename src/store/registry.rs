//! Graph-file registry
//!
//! Maps each named-graph IRI to a file path and serialization format.
//! Bindings are discovered either from `.graph` sidecar files or from
//! a Turtle configuration document; new graphs get a filename derived
//! from the hash of their IRI, probed against everything tracked in
//! the working tree so a name is never reused.

use crate::rdf::{parse_turtle, serialize_graph, NamedNode, Object, RdfFormat, Triple};
use crate::repo::{RepoError, RepoResult, Repository};
use git2::Oid;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const CONFIG_NS: &str = "http://aksw.org/QuitStore/ConfigGraph#";

/// One graph ↔ file binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphBinding {
    pub graph: NamedNode,
    pub path: String,
    pub format: RdfFormat,
}

/// Binding discovery mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryMode {
    /// `<file>.graph` sidecars next to each data file
    Sidecar,
    /// A single Turtle document at the given path
    ConfigFile(String),
}

/// The set of graph bindings of one commit
#[derive(Debug, Clone)]
pub struct GraphRegistry {
    mode: RegistryMode,
    bindings: BTreeMap<NamedNode, GraphBinding>,
}

/// Deterministic file stem of a graph IRI: first 16 hex chars of its
/// SHA-256
pub fn iri_to_name(iri: &str) -> String {
    let digest = Sha256::digest(iri.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..16].to_string()
}

impl GraphRegistry {
    /// Empty registry (fresh repository)
    pub fn empty(mode: RegistryMode) -> Self {
        Self {
            mode,
            bindings: BTreeMap::new(),
        }
    }

    /// Discover the bindings recorded in a commit's tree
    pub fn discover(repo: &Repository, commit: Oid, mode: RegistryMode) -> RepoResult<Self> {
        let mut registry = Self::empty(mode.clone());
        match mode {
            RegistryMode::Sidecar => {
                for path in repo.tree_paths(commit)? {
                    let Some(data_path) = path.strip_suffix(".graph") else {
                        continue;
                    };
                    if !data_path.ends_with(".nt") {
                        continue;
                    }
                    let Some(content) = repo.read_blob(commit, &path)? else {
                        continue;
                    };
                    let iri = String::from_utf8_lossy(&content).trim().to_string();
                    match NamedNode::new(&iri) {
                        Ok(graph) => {
                            registry.bindings.insert(
                                graph.clone(),
                                GraphBinding {
                                    graph,
                                    path: data_path.to_string(),
                                    format: RdfFormat::NTriples,
                                },
                            );
                        }
                        Err(_) => {
                            warn!("sidecar {} does not contain a valid IRI", path);
                        }
                    }
                }
            }
            RegistryMode::ConfigFile(ref config_path) => {
                let Some(content) = repo.read_blob(commit, config_path)? else {
                    return Ok(registry);
                };
                let text = String::from_utf8_lossy(&content).to_string();
                let triples = parse_turtle(&text)
                    .map_err(|e| RepoError::Corrupt(format!("{}: {}", config_path, e)))?;
                registry.load_config_triples(&triples);
            }
        }
        debug!("discovered {} graph bindings", registry.bindings.len());
        Ok(registry)
    }

    fn load_config_triples(&mut self, triples: &[Triple]) {
        let graph_uri = format!("{}graphUri", CONFIG_NS);
        let graph_file = format!("{}graphFile", CONFIG_NS);
        let has_format = format!("{}hasFormat", CONFIG_NS);

        let mut uris: BTreeMap<String, NamedNode> = BTreeMap::new();
        let mut files: BTreeMap<String, String> = BTreeMap::new();
        let mut formats: BTreeMap<String, String> = BTreeMap::new();

        for triple in triples {
            let subject = triple.subject.to_string();
            let predicate = triple.predicate.as_str();
            if predicate == graph_uri {
                if let Object::NamedNode(n) = &triple.object {
                    uris.insert(subject, n.clone());
                }
            } else if predicate == graph_file {
                if let Object::Literal(l) = &triple.object {
                    files.insert(subject, l.value().to_string());
                }
            } else if predicate == has_format {
                if let Object::Literal(l) = &triple.object {
                    formats.insert(subject, l.value().to_string());
                }
            }
        }

        for (subject, graph) in uris {
            let Some(path) = files.get(&subject) else {
                warn!("config entry {} lacks a graphFile", subject);
                continue;
            };
            let format = formats
                .get(&subject)
                .and_then(|name| RdfFormat::from_name(name))
                .unwrap_or(RdfFormat::NTriples);
            self.bindings.insert(
                graph.clone(),
                GraphBinding {
                    graph,
                    path: path.clone(),
                    format,
                },
            );
        }
    }

    /// Binding of a graph, if one exists
    pub fn resolve(&self, graph: &NamedNode) -> Option<&GraphBinding> {
        self.bindings.get(graph)
    }

    /// All bindings, ordered by graph IRI
    pub fn bindings(&self) -> impl Iterator<Item = &GraphBinding> {
        self.bindings.values()
    }

    /// Discovery mode of this registry
    pub fn mode(&self) -> &RegistryMode {
        &self.mode
    }

    /// Create a binding for a new graph.
    ///
    /// `tracked` must list every filename currently present in the
    /// working tree, not only the bound ones: the probe never reuses
    /// an existing name. Returns the binding plus the metadata files
    /// (sidecar or updated config document) the caller must stage,
    /// where the config update builds on `current_config` when given.
    pub fn allocate(
        &mut self,
        graph: NamedNode,
        tracked: &[String],
        current_config: Option<&str>,
    ) -> (GraphBinding, Vec<(String, Vec<u8>)>) {
        let path = next_free_name(&iri_to_name(graph.as_str()), tracked);
        let binding = GraphBinding {
            graph: graph.clone(),
            path: path.clone(),
            format: RdfFormat::NTriples,
        };

        let metadata = match &self.mode {
            RegistryMode::Sidecar => vec![(
                format!("{}.graph", path),
                graph.as_str().as_bytes().to_vec(),
            )],
            RegistryMode::ConfigFile(config_path) => {
                let mut content = current_config.unwrap_or("").trim_end().to_string();
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(&format!(
                    "<{ns}graph-{stem}> <{ns}graphUri> <{iri}> ;\n    <{ns}graphFile> \"{file}\" ;\n    <{ns}hasFormat> \"nt\" .\n",
                    ns = CONFIG_NS,
                    stem = path.trim_end_matches(".nt"),
                    iri = graph.as_str(),
                    file = path,
                ));
                vec![(config_path.clone(), content.into_bytes())]
            }
        };

        debug!("allocated {} for graph {}", path, graph.as_str());
        self.bindings.insert(graph.clone(), binding.clone());
        (binding, metadata)
    }

    /// Take over a binding discovered elsewhere (merges)
    pub fn adopt(&mut self, binding: GraphBinding) {
        self.bindings.insert(binding.graph.clone(), binding);
    }

    /// Render the full configuration document for all bindings
    pub fn config_document(&self) -> String {
        let mut content = String::new();
        for binding in self.bindings.values() {
            content.push_str(&format!(
                "<{ns}graph-{stem}> <{ns}graphUri> <{iri}> ;\n    <{ns}graphFile> \"{file}\" ;\n    <{ns}hasFormat> \"{format}\" .\n",
                ns = CONFIG_NS,
                stem = binding.path.trim_end_matches(".nt"),
                iri = binding.graph.as_str(),
                file = binding.path,
                format = binding.format.name(),
            ));
        }
        content
    }

    /// Serialize a graph's triples to its canonical file content
    pub fn rewrite<'a>(
        &self,
        graph: &NamedNode,
        triples: impl IntoIterator<Item = &'a Triple>,
    ) -> Result<(String, Vec<u8>), crate::rdf::RdfError> {
        let binding = match self.resolve(graph) {
            Some(binding) => binding,
            None => {
                return Err(crate::rdf::RdfError::Serialization(format!(
                    "no binding for graph {}",
                    graph.as_str()
                )))
            }
        };
        let content = serialize_graph(triples)?;
        Ok((binding.path.clone(), content.into_bytes()))
    }
}

/// First free filename for a stem: `stem.nt` when unused, otherwise
/// `stem_<n>.nt` with n one above the highest suffix already present.
fn next_free_name(stem: &str, tracked: &[String]) -> String {
    let plain = format!("{}.nt", stem);
    if !tracked.iter().any(|p| p == &plain) {
        return plain;
    }

    let prefix = format!("{}_", stem);
    let max_suffix = tracked
        .iter()
        .filter_map(|path| {
            path.strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".nt"))
                .and_then(|n| n.parse::<u64>().ok())
        })
        .max()
        .unwrap_or(0);
    format!("{}_{}.nt", stem, max_suffix + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nn(iri: &str) -> NamedNode {
        NamedNode::new(iri).unwrap()
    }

    #[test]
    fn test_iri_to_name_deterministic() {
        let a = iri_to_name("http://aksw.org/");
        let b = iri_to_name("http://aksw.org/");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, iri_to_name("http://example.org/"));
    }

    #[test]
    fn test_next_free_name_unused_stem() {
        assert_eq!(next_free_name("abc", &[]), "abc.nt");
        assert_eq!(
            next_free_name("abc", &["other.nt".to_string()]),
            "abc.nt"
        );
    }

    #[test]
    fn test_next_free_name_first_collision() {
        let tracked = vec!["abc.nt".to_string()];
        assert_eq!(next_free_name("abc", &tracked), "abc_1.nt");
    }

    #[test]
    fn test_next_free_name_counts_past_highest_suffix() {
        // occupied: abc.nt, abc_1.nt, abc_11.nt -> next is abc_12.nt
        let tracked = vec![
            "abc.nt".to_string(),
            "abc_1.nt".to_string(),
            "abc_11.nt".to_string(),
        ];
        assert_eq!(next_free_name("abc", &tracked), "abc_12.nt");
    }

    #[test]
    fn test_allocate_sidecar() {
        let mut registry = GraphRegistry::empty(RegistryMode::Sidecar);
        let graph = nn("http://aksw.org/");
        let (binding, metadata) = registry.allocate(graph.clone(), &[], None);

        assert_eq!(binding.path, format!("{}.nt", iri_to_name("http://aksw.org/")));
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata[0].0, format!("{}.graph", binding.path));
        assert_eq!(metadata[0].1, b"http://aksw.org/");
        assert!(registry.resolve(&graph).is_some());
    }

    #[test]
    fn test_allocate_config_extends_document() {
        let mut registry =
            GraphRegistry::empty(RegistryMode::ConfigFile("config.ttl".to_string()));
        let graph = nn("http://aksw.org/");
        let existing = "<http://aksw.org/QuitStore/ConfigGraph#graph-x> <http://aksw.org/QuitStore/ConfigGraph#graphUri> <urn:old> ;\n    <http://aksw.org/QuitStore/ConfigGraph#graphFile> \"x.nt\" ;\n    <http://aksw.org/QuitStore/ConfigGraph#hasFormat> \"nt\" .\n";
        let (binding, metadata) = registry.allocate(graph, &[], Some(existing));

        assert_eq!(metadata[0].0, "config.ttl");
        let content = String::from_utf8(metadata[0].1.clone()).unwrap();
        assert!(content.contains("urn:old"));
        assert!(content.contains(&binding.path));
        assert!(content.contains("http://aksw.org/"));

        // the extended document still parses and yields both bindings
        let triples = parse_turtle(&content).unwrap();
        let mut reparsed =
            GraphRegistry::empty(RegistryMode::ConfigFile("config.ttl".to_string()));
        reparsed.load_config_triples(&triples);
        assert_eq!(reparsed.bindings().count(), 2);
    }

    #[test]
    fn test_rewrite_unknown_graph() {
        let registry = GraphRegistry::empty(RegistryMode::Sidecar);
        let graph = nn("urn:missing");
        assert!(registry.rewrite(&graph, std::iter::empty()).is_err());
    }
}
