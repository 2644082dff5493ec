//! The versioned quad store
//!
//! `QuitStore` ties the pieces together: per-branch dataset snapshots
//! over the git repository, the update transaction, branch
//! management, merging, pulling and the provenance index. Each branch
//! owns a readers-writer lock; queries take read access, the update
//! pipeline is the only writer.

mod registry;
mod transaction;

pub use registry::{iri_to_name, GraphBinding, GraphRegistry, RegistryMode};

use crate::config::{ConfigMode, StoreConfig};
use crate::error::{QuitError, QuitResult};
use crate::provenance::ProvenanceIndex;
use crate::rdf::{parse_ntriples, Dataset, DatasetView};
use crate::repo::{
    blame, context_merge, three_way_merge, BlameRow, CommitMeta, MergeMethod, RepoResult,
    Repository,
};
use crate::sparql::{parse_query, QueryEngine, QueryResults};
use git2::Oid;
use oxrdf::NamedNode as OxNamedNode;
use rustc_hash::FxHashMap;
use spargebra::algebra::QueryDataset;
use spargebra::Query;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{info, warn};

/// Protocol-level dataset scoping of a query
/// (`default-graph-uri` / `named-graph-uri`)
#[derive(Debug, Clone, Default)]
pub struct QueryScoping {
    pub default: Vec<OxNamedNode>,
    pub named: Vec<OxNamedNode>,
}

impl QueryScoping {
    pub fn is_empty(&self) -> bool {
        self.default.is_empty() && self.named.is_empty()
    }
}

/// Live state of one branch
pub struct RefState {
    /// Commit the snapshot was loaded from; None before the first
    /// commit on an unborn branch
    pub commit: Option<Oid>,
    pub dataset: Dataset,
    pub registry: GraphRegistry,
}

/// Version-controlled RDF quad store over a git repository
pub struct QuitStore {
    config: StoreConfig,
    repo: Mutex<Repository>,
    refs: RwLock<FxHashMap<String, Arc<RwLock<RefState>>>>,
    /// Short global lock held only around filename allocation so two
    /// branches never race for the same fresh filename
    allocate_lock: Mutex<()>,
    provenance: Option<RwLock<ProvenanceIndex>>,
}

impl QuitStore {
    /// Open the store: open or init the repository, load the HEAD
    /// snapshot, and rebuild the provenance index when enabled.
    pub fn open(config: StoreConfig) -> QuitResult<Self> {
        let repo = Repository::open_or_init(&config.target_dir)?;
        let provenance = if config.features.provenance {
            let mut index = ProvenanceIndex::new(&config.namespace);
            if let Err(e) = index.rebuild(&repo, &config) {
                // a broken provenance index never blocks the store
                warn!("provenance rebuild failed: {}", e);
            }
            Some(RwLock::new(index))
        } else {
            None
        };

        let store = Self {
            config,
            repo: Mutex::new(repo),
            refs: RwLock::new(FxHashMap::default()),
            allocate_lock: Mutex::new(()),
            provenance,
        };
        // warm the HEAD snapshot
        let head = store.head_branch()?;
        store.ref_state(&head)?;
        info!("store opened on branch {}", head);
        Ok(store)
    }

    /// Store configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn registry_mode(&self) -> RegistryMode {
        match self.config.mode {
            ConfigMode::Sidecar => RegistryMode::Sidecar,
            ConfigMode::ConfigFile => RegistryMode::ConfigFile(self.config.config_file.clone()),
        }
    }

    /// Registry and dataset of an arbitrary commit
    pub fn materialize(
        repo: &Repository,
        commit: Oid,
        mode: RegistryMode,
    ) -> RepoResult<(GraphRegistry, Dataset)> {
        let registry = GraphRegistry::discover(repo, commit, mode)?;
        let mut dataset = Dataset::new();
        for binding in registry.bindings() {
            dataset.create_graph(binding.graph.clone());
            let Some(content) = repo.read_blob(commit, &binding.path)? else {
                continue;
            };
            let text = String::from_utf8_lossy(&content).to_string();
            if text.trim().is_empty() {
                continue;
            }
            let triples = parse_ntriples(&text).map_err(|e| {
                crate::repo::RepoError::Corrupt(format!("{}: {}", binding.path, e))
            })?;
            for triple in triples {
                dataset.insert(triple.in_graph(binding.graph.clone()));
            }
        }
        Ok((registry, dataset))
    }

    /// Name of the branch HEAD points to
    pub fn head_branch(&self) -> QuitResult<String> {
        Ok(self.repo().head_branch()?)
    }

    fn repo(&self) -> std::sync::MutexGuard<'_, Repository> {
        match self.repo.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Resolve an optional refspec to a local branch name. `None` and
    /// `HEAD` resolve to the checked-out branch.
    pub fn resolve_branch(&self, refspec: Option<&str>) -> QuitResult<String> {
        let repo = self.repo();
        match refspec {
            None => Ok(repo.head_branch()?),
            Some("HEAD") => Ok(repo.head_branch()?),
            Some(name) => {
                if repo.branch_names()?.iter().any(|b| b == name) {
                    Ok(name.to_string())
                } else {
                    Err(QuitError::UnknownRef(name.to_string()))
                }
            }
        }
    }

    /// Snapshot handle of a branch, loading or refreshing it when the
    /// branch has moved underneath the cache.
    pub(crate) fn ref_state(&self, branch: &str) -> QuitResult<Arc<RwLock<RefState>>> {
        let current = {
            let repo = self.repo();
            match repo.branch_oid(branch) {
                Ok(oid) => Some(oid),
                Err(e) => {
                    // the unborn HEAD branch has no commit yet
                    let unborn_head =
                        repo.head_branch()? == branch && repo.head_oid().is_none();
                    if unborn_head {
                        None
                    } else {
                        return Err(e.into());
                    }
                }
            }
        };

        {
            let refs = self.refs.read().map_err(|_| poisoned())?;
            if let Some(entry) = refs.get(branch) {
                let in_sync = entry.read().map_err(|_| poisoned())?.commit == current;
                if in_sync {
                    return Ok(Arc::clone(entry));
                }
            }
        }

        let state = match current {
            Some(oid) => {
                let repo = self.repo();
                let (registry, dataset) = Self::materialize(&repo, oid, self.registry_mode())?;
                RefState {
                    commit: Some(oid),
                    dataset,
                    registry,
                }
            }
            None => RefState {
                commit: None,
                dataset: Dataset::new(),
                registry: GraphRegistry::empty(self.registry_mode()),
            },
        };

        let entry = Arc::new(RwLock::new(state));
        self.refs
            .write()
            .map_err(|_| poisoned())?
            .insert(branch.to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Execute a query against a branch snapshot
    pub fn query(
        &self,
        refspec: Option<&str>,
        query_text: &str,
        scoping: &QueryScoping,
    ) -> QuitResult<QueryResults> {
        let branch = self.resolve_branch(refspec)?;
        let query = parse_query(query_text, Some(&self.config.namespace))?;

        let in_query = query_dataset(&query).is_some();
        if in_query && !scoping.is_empty() {
            return Err(QuitError::BadRequest(
                "both FROM and protocol dataset parameters given".to_string(),
            ));
        }

        let state = self.ref_state(&branch)?;
        let state = state.read().map_err(|_| poisoned())?;

        let mut view = DatasetView::new(&state.dataset, self.config.union_default_graph);
        if let Some(dataset) = query_dataset(&query) {
            if !dataset.default.is_empty() {
                view = view.with_default_graphs(
                    dataset.default.iter().map(|g| g.clone().into()).collect(),
                );
            }
            if let Some(named) = &dataset.named {
                view = view
                    .with_named_graphs(named.iter().map(|g| g.clone().into()).collect());
            }
        } else if !scoping.is_empty() {
            if !scoping.default.is_empty() {
                view = view.with_default_graphs(
                    scoping.default.iter().map(|g| g.clone().into()).collect(),
                );
            }
            if !scoping.named.is_empty() {
                view = view
                    .with_named_graphs(scoping.named.iter().map(|g| g.clone().into()).collect());
            }
        }

        let engine = QueryEngine::new(&view);
        Ok(engine.evaluate(&query)?)
    }

    /// Execute a query against the provenance dataset
    pub fn provenance_query(&self, query_text: &str) -> QuitResult<QueryResults> {
        let Some(provenance) = &self.provenance else {
            return Err(QuitError::FeatureDisabled("provenance"));
        };
        let query = parse_query(query_text, Some(&self.config.namespace))?;
        let index = provenance.read().map_err(|_| poisoned())?;
        // provenance queries always see the union default graph
        let view = DatasetView::new(index.dataset(), true);
        let engine = QueryEngine::new(&view);
        Ok(engine.evaluate(&query)?)
    }

    pub(crate) fn observe_commit(
        &self,
        meta: &CommitMeta,
        change_sets: &[crate::rdf::ChangeSet],
    ) {
        if let Some(provenance) = &self.provenance {
            match provenance.write() {
                Ok(mut index) => index.observe(meta, change_sets),
                Err(_) => warn!("provenance index lock poisoned; skipping commit"),
            }
        }
    }

    /// Create a branch at another ref's commit
    pub fn create_branch(&self, from: Option<&str>, name: &str) -> QuitResult<()> {
        let repo = self.repo();
        let from_oid = match from {
            Some(refspec) => repo.resolve(refspec)?,
            None => repo
                .head_oid()
                .ok_or_else(|| QuitError::UnknownRef("HEAD".to_string()))?,
        };
        repo.create_branch(name, from_oid)?;
        Ok(())
    }

    /// Delete a branch that is not the current HEAD
    pub fn delete_branch(&self, name: &str) -> QuitResult<()> {
        self.repo().delete_branch(name)?;
        self.refs.write().map_err(|_| poisoned())?.remove(name);
        Ok(())
    }

    /// All local branches
    pub fn branches(&self) -> QuitResult<Vec<String>> {
        Ok(self.repo().branch_names()?)
    }

    /// Switch HEAD to a branch and rebind the live dataset
    pub fn switch(&self, name: &str) -> QuitResult<()> {
        let branch = self.resolve_branch(Some(name))?;
        self.repo().checkout_branch(&branch)?;
        self.ref_state(&branch)?;
        Ok(())
    }

    /// Merge `source` into `target` with the chosen strategy. On
    /// success returns the merge commit id; on conflict nothing is
    /// committed and the conflict report is returned as an error.
    pub fn merge(
        &self,
        target: &str,
        source: &str,
        method: MergeMethod,
    ) -> QuitResult<String> {
        let target_branch = self.resolve_branch(Some(target))?;
        let state = self.ref_state(&target_branch)?;
        let mut state = state.write().map_err(|_| poisoned())?;

        let oid = {
            let repo = self.repo();
            let target_oid = repo
                .branch_oid(&target_branch)
                .map_err(|_| QuitError::UnknownRef(target.to_string()))?;
            let source_oid = repo.resolve(source)?;

            match method {
                MergeMethod::ThreeWay => {
                    let message = format!("Merge {} into {}", source, target_branch);
                    three_way_merge(&repo, &target_branch, target_oid, source_oid, &message)?
                }
                MergeMethod::Context => self.context_merge_commit(
                    &repo,
                    &target_branch,
                    target_oid,
                    source_oid,
                    source,
                )?,
            }
        };

        // reload the snapshot from the merge commit
        let repo = self.repo();
        let (registry, dataset) = Self::materialize(&repo, oid, self.registry_mode())?;
        state.commit = Some(oid);
        state.dataset = dataset;
        state.registry = registry;
        if repo.head_branch()? == target_branch {
            repo.checkout_branch(&target_branch)?;
        }
        info!("merged {} into {} at {}", source, target_branch, oid);
        Ok(oid.to_string())
    }

    fn context_merge_commit(
        &self,
        repo: &Repository,
        target_branch: &str,
        target_oid: Oid,
        source_oid: Oid,
        source_name: &str,
    ) -> QuitResult<Oid> {
        let base_oid = repo.merge_base(target_oid, source_oid)?;
        let mode = self.registry_mode();
        let (_, base) = Self::materialize(repo, base_oid, mode.clone())?;
        let (target_registry, ours) = Self::materialize(repo, target_oid, mode.clone())?;
        let (source_registry, theirs) = Self::materialize(repo, source_oid, mode)?;

        let merged = context_merge(&base, &ours, &theirs)
            .map_err(|report| QuitError::MergeConflict(report))?;

        // bindings from both sides; graphs only the source knows need
        // their metadata staged into the target tree as well
        let mut registry = target_registry;
        let mut files: Vec<(String, Vec<u8>)> = Vec::new();
        for binding in source_registry.bindings() {
            if registry.resolve(&binding.graph).is_none() {
                registry.adopt(binding.clone());
                match registry.mode() {
                    RegistryMode::Sidecar => {
                        files.push((
                            format!("{}.graph", binding.path),
                            binding.graph.as_str().as_bytes().to_vec(),
                        ));
                    }
                    RegistryMode::ConfigFile(path) => {
                        files.push((path.clone(), registry.config_document().into_bytes()));
                    }
                }
            }
        }

        for graph in merged.graphs() {
            let (path, content) = registry
                .rewrite(&graph, merged.triples_in(&graph))
                .map_err(QuitError::from)?;
            files.push((path, content));
        }

        let message = format!("Merge {} into {}", source_name, target_branch);
        Ok(repo.commit_files(target_branch, &[target_oid, source_oid], &files, &message)?)
    }

    /// Fetch a remote and fast-forward or merge the branch
    pub fn pull(&self, remote: &str, refspec: Option<&str>) -> QuitResult<()> {
        let branch = match refspec {
            Some(name) => name.to_string(),
            None => self.head_branch()?,
        };

        let (local, remote_oid) = {
            let repo = self.repo();
            repo.fetch(remote)?;
            let remote_oid = repo.remote_branch_oid(remote, &branch)?;
            (repo.branch_oid(&branch).ok(), remote_oid)
        };

        match local {
            None => {
                // nothing local yet: adopt the remote state
                let repo = self.repo();
                repo.update_branch(&branch, remote_oid)?;
                if repo.head_branch()? == branch {
                    repo.checkout_branch(&branch)?;
                }
            }
            Some(local) if local == remote_oid => {}
            Some(local) => {
                let fast_forward = self.repo().is_ancestor(local, remote_oid)?;
                if fast_forward {
                    let repo = self.repo();
                    repo.update_branch(&branch, remote_oid)?;
                    if repo.head_branch()? == branch {
                        repo.checkout_branch(&branch)?;
                    }
                } else {
                    self.merge(&branch, &remote_oid.to_string(), MergeMethod::ThreeWay)?;
                }
            }
        }

        // rebind the snapshot to whatever the branch now points to
        self.ref_state(&branch)?;
        info!("pulled {} from {}", branch, remote);
        Ok(())
    }

    /// Push a branch to a remote
    pub fn push(&self, remote: &str, refspec: Option<&str>) -> QuitResult<()> {
        let branch = match refspec {
            Some(name) => name.to_string(),
            None => self.head_branch()?,
        };
        self.repo().push(remote, &branch)?;
        Ok(())
    }

    /// Commit log of HEAD, newest first; empty for a fresh repository
    pub fn commits(&self) -> QuitResult<Vec<CommitMeta>> {
        let repo = self.repo();
        match repo.head_oid() {
            Some(oid) => Ok(repo.log(oid)?),
            None => Ok(Vec::new()),
        }
    }

    /// Attribute every quad at a ref or commit id to the commit that
    /// introduced it
    pub fn blame(&self, refspec: &str) -> QuitResult<Vec<BlameRow>> {
        let repo = self.repo();
        let oid = repo.resolve(refspec)?;
        let mode = self.registry_mode();
        let rows = blame(&repo, oid, |commit| {
            Self::materialize(&repo, commit, mode.clone()).map(|(_, dataset)| dataset)
        })?;
        Ok(rows)
    }
}

/// FROM / FROM NAMED clause of a query, when present
fn query_dataset(query: &Query) -> Option<&QueryDataset> {
    match query {
        Query::Select { dataset, .. }
        | Query::Construct { dataset, .. }
        | Query::Describe { dataset, .. }
        | Query::Ask { dataset, .. } => dataset.as_ref(),
    }
}

fn poisoned() -> QuitError {
    QuitError::IoFailure("store lock poisoned".to_string())
}
