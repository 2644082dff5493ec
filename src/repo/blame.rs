//! Per-quad commit attribution
//!
//! Walks the first-parent chain of a commit and attributes every quad
//! of its dataset to the most recent commit that introduced it.

use super::repository::{CommitMeta, Repository};
use super::RepoResult;
use crate::rdf::{Dataset, Quad};
use git2::Oid;
use rustc_hash::FxHashSet;
use tracing::debug;

/// One attributed quad
#[derive(Debug, Clone)]
pub struct BlameRow {
    pub quad: Quad,
    pub commit: CommitMeta,
}

/// Attribute every quad of the dataset at `tip` to the commit that
/// last introduced it. `materialize` loads the dataset of an
/// arbitrary commit.
pub fn blame<F>(repo: &Repository, tip: Oid, materialize: F) -> RepoResult<Vec<BlameRow>>
where
    F: Fn(Oid) -> RepoResult<Dataset>,
{
    let mut rows = Vec::new();
    let mut unattributed: FxHashSet<Quad> = materialize(tip)?.quads().collect();
    debug!("blaming {} quads from {}", unattributed.len(), tip);

    let mut current = Some(tip);
    while let Some(oid) = current {
        if unattributed.is_empty() {
            break;
        }
        let parent = repo.parents_of(oid)?.first().copied();
        let parent_quads: FxHashSet<Quad> = match parent {
            Some(parent) => materialize(parent)?.quads().collect(),
            None => FxHashSet::default(),
        };

        let introduced: Vec<Quad> = unattributed
            .iter()
            .filter(|q| !parent_quads.contains(q))
            .cloned()
            .collect();
        if !introduced.is_empty() {
            let meta = repo.commit_meta(oid)?;
            for quad in introduced {
                unattributed.remove(&quad);
                rows.push(BlameRow {
                    quad,
                    commit: meta.clone(),
                });
            }
        }
        current = parent;
    }

    rows.sort_by_key(|row| row.quad.to_string());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::parse_ntriples;
    use crate::rdf::NamedNode;
    use tempfile::TempDir;

    fn materialize_graph_nt(repo: &Repository) -> impl Fn(Oid) -> RepoResult<Dataset> + '_ {
        |oid| {
            let mut ds = Dataset::new();
            let graph = NamedNode::new("http://example.org/").unwrap();
            if let Some(content) = repo.read_blob(oid, "graph.nt")? {
                let text = String::from_utf8_lossy(&content).to_string();
                for triple in parse_ntriples(&text).unwrap_or_default() {
                    ds.insert(triple.in_graph(graph.clone()));
                }
            }
            Ok(ds)
        }
    }

    #[test]
    fn test_blame_attributes_to_introducing_commit() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open_or_init(dir.path()).unwrap();
        let branch = repo.head_branch().unwrap();

        let first = repo
            .commit_files(
                &branch,
                &[],
                &[(
                    "graph.nt".to_string(),
                    b"<urn:a> <urn:b> <urn:c> .\n".to_vec(),
                )],
                "one",
            )
            .unwrap();
        let second = repo
            .commit_files(
                &branch,
                &[first],
                &[(
                    "graph.nt".to_string(),
                    b"<urn:a> <urn:b> <urn:c> .\n<urn:x> <urn:y> <urn:z> .\n".to_vec(),
                )],
                "two",
            )
            .unwrap();

        let rows = blame(&repo, second, materialize_graph_nt(&repo)).unwrap();
        assert_eq!(rows.len(), 2);

        let by_subject = |s: &str| {
            rows.iter()
                .find(|r| r.quad.subject.to_string() == s)
                .unwrap()
        };
        assert_eq!(by_subject("<urn:a>").commit.id, first.to_string());
        assert_eq!(by_subject("<urn:x>").commit.id, second.to_string());
    }
}
