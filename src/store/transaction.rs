//! The update transaction
//!
//! One SPARQL update against one branch: resolve the branch, run
//! every sub-operation against a shadow copy of the snapshot, rewrite
//! the touched graph files, commit, advance the ref, swap the live
//! dataset, and hand the change sets to the provenance index.
//!
//! Multi-operation updates are atomic: if any sub-operation fails,
//! no file, no commit and no ref change happens and the live dataset
//! is untouched. Disk failures after the commit leave the commit
//! standing; the snapshot is reloaded from the repository.

use super::{poisoned, QuitStore, RegistryMode};
use crate::error::{QuitError, QuitResult};
use crate::rdf::NamedNode;
use crate::sparql::{execute_update, parse_update, update_label, UpdateScoping};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

impl QuitStore {
    /// Run a SPARQL update against a branch. Returns the new commit
    /// id, or None when the update had no effect to record.
    pub fn update(
        &self,
        refspec: Option<&str>,
        update_text: &str,
        scoping: Option<&UpdateScoping>,
    ) -> QuitResult<Option<String>> {
        let branch = self.resolve_branch(refspec)?;
        let parsed = parse_update(update_text, Some(&self.config().namespace))?;
        let label = update_label(&parsed);

        // per-branch writer lock for the whole transaction
        let state = self.ref_state(&branch)?;
        let mut state = state.write().map_err(|_| poisoned())?;

        // make sure the snapshot matches the branch tip
        let current = {
            let repo = self.repo();
            match repo.branch_oid(&branch) {
                Ok(oid) => Some(oid),
                Err(_) => None,
            }
        };
        if state.commit != current {
            debug!("snapshot of {} out of sync, reloading", branch);
            if let Some(oid) = current {
                let repo = self.repo();
                let (registry, dataset) =
                    Self::materialize(&repo, oid, self.registry_mode())?;
                state.registry = registry;
                state.dataset = dataset;
            }
            state.commit = current;
        }

        let mut shadow = state.dataset.clone();
        let change_sets = execute_update(
            &parsed,
            &mut shadow,
            self.config().union_default_graph,
            scoping,
        )
        .map_err(QuitError::from)?;
        // abort path: the error above drops the shadow; nothing on
        // disk or in the live dataset has changed

        let touched: BTreeSet<NamedNode> = change_sets
            .iter()
            .flat_map(|cs| cs.graphs.keys().cloned())
            .collect();
        if touched.is_empty() {
            debug!("update touched no graph; nothing to commit");
            return Ok(None);
        }

        let mut registry = state.registry.clone();
        let mut staged: BTreeMap<String, Vec<u8>> = BTreeMap::new();

        // bind new graphs first; the filename probe must see every
        // tracked file, and allocation is serialized store-wide
        let new_graphs: Vec<NamedNode> = touched
            .iter()
            .filter(|g| registry.resolve(g).is_none())
            .cloned()
            .collect();
        if !new_graphs.is_empty() {
            let _allocating = self.allocate_lock.lock().map_err(|_| poisoned())?;
            let mut tracked = self.tracked_names(current)?;
            let mut config_content = self.current_config_document(current)?;
            for graph in new_graphs {
                let (binding, metadata) =
                    registry.allocate(graph, &tracked, config_content.as_deref());
                tracked.push(binding.path.clone());
                for (path, content) in metadata {
                    if let RegistryMode::ConfigFile(config_path) = registry.mode() {
                        if &path == config_path {
                            config_content =
                                Some(String::from_utf8_lossy(&content).to_string());
                        }
                    }
                    staged.insert(path, content);
                }
            }
        }

        for graph in &touched {
            let (path, content) = registry
                .rewrite(graph, shadow.triples_in(graph))
                .map_err(QuitError::from)?;
            staged.insert(path, content);
        }

        let message = format!(
            "New Commit from QuitStore\nQuery: \"{}\"\nOperationTypes: \"{}\"",
            update_text, label
        );
        let files: Vec<(String, Vec<u8>)> = staged.into_iter().collect();

        let (oid, meta) = {
            let repo = self.repo();
            // committing implies checking out the updated branch
            if repo.head_branch()? != branch {
                repo.checkout_branch(&branch)?;
            }
            let parents: Vec<git2::Oid> = current.into_iter().collect();
            let oid = repo.commit_files(&branch, &parents, &files, &message)?;

            // mirror the commit into the working tree and index; a
            // failure here cannot undo the commit, so the snapshot is
            // restored from the repository instead
            let mut synced = true;
            for (path, content) in &files {
                let target = repo.workdir().join(path);
                if let Some(parent) = target.parent() {
                    if std::fs::create_dir_all(parent).is_err() {
                        synced = false;
                    }
                }
                if std::fs::write(&target, content).is_err() {
                    synced = false;
                }
            }
            if synced {
                let paths: Vec<String> = files.iter().map(|(p, _)| p.clone()).collect();
                if repo.stage_paths(&paths).is_err() {
                    synced = false;
                }
            }
            if !synced {
                warn!("working tree out of sync after commit {}, forcing checkout", oid);
                repo.checkout_branch(&branch)?;
            }

            (oid, repo.commit_meta(oid)?)
        };

        state.commit = Some(oid);
        state.dataset = shadow;
        state.registry = registry;
        info!("update committed {} on {} ({})", oid, branch, label);

        self.observe_commit(&meta, &change_sets);
        Ok(Some(oid.to_string()))
    }

    /// Every filename present in the branch tip's tree plus the
    /// working tree root, for the allocation probe
    fn tracked_names(&self, current: Option<git2::Oid>) -> QuitResult<Vec<String>> {
        let repo = self.repo();
        let mut names: Vec<String> = match current {
            Some(oid) => repo.tree_paths(oid)?,
            None => Vec::new(),
        };
        if let Ok(entries) = std::fs::read_dir(repo.workdir()) {
            for entry in entries.flatten() {
                if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    let name = entry.file_name().to_string_lossy().to_string();
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        Ok(names)
    }

    /// Current content of the config document (config mode only)
    fn current_config_document(
        &self,
        current: Option<git2::Oid>,
    ) -> QuitResult<Option<String>> {
        let RegistryMode::ConfigFile(path) = self.registry_mode() else {
            return Ok(None);
        };
        let repo = self.repo();
        if let Some(oid) = current {
            if let Some(content) = repo.read_blob(oid, &path)? {
                return Ok(Some(String::from_utf8_lossy(&content).to_string()));
            }
        }
        let workdir_path = repo.workdir().join(&path);
        match std::fs::read_to_string(workdir_path) {
            Ok(content) => Ok(Some(content)),
            Err(_) => Ok(Some(String::new())),
        }
    }
}
