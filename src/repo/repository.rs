//! Thin contract over the git object store
//!
//! Commits are exposed as immutable snapshots keyed by object id.
//! Every operation either applies fully or leaves the repository
//! unchanged; tree construction for commits starts from the parent
//! tree and replaces only the paths the caller explicitly staged, so
//! unrelated working-tree edits survive in the committed tree.

use super::{RepoError, RepoResult};
use git2::build::{CheckoutBuilder, TreeUpdateBuilder};
use git2::{BranchType, FileMode, Oid, Sort};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Author/committer identity
#[derive(Debug, Clone, Serialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

/// Commit metadata exposed to the log and provenance layers
#[derive(Debug, Clone, Serialize)]
pub struct CommitMeta {
    pub id: String,
    pub parents: Vec<String>,
    pub author: Signature,
    pub committer: Signature,
    /// Author time, seconds since epoch
    pub authored_at: i64,
    /// Commit time, seconds since epoch
    pub committed_at: i64,
    pub message: String,
}

/// Git repository adapter
pub struct Repository {
    inner: git2::Repository,
    workdir: PathBuf,
}

impl Repository {
    /// Open an existing repository or initialize a fresh one
    pub fn open_or_init(path: impl AsRef<Path>) -> RepoResult<Self> {
        let path = path.as_ref();
        let inner = match git2::Repository::open(path) {
            Ok(repo) => {
                debug!("opened git repository at {}", path.display());
                repo
            }
            Err(_) => {
                info!("initializing git repository at {}", path.display());
                git2::Repository::init(path)?
            }
        };
        let workdir = inner
            .workdir()
            .ok_or_else(|| RepoError::Corrupt("bare repositories are not supported".to_string()))?
            .to_path_buf();
        Ok(Self { inner, workdir })
    }

    /// Working tree root
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Name of the branch HEAD points to, even before the first commit
    pub fn head_branch(&self) -> RepoResult<String> {
        match self.inner.head() {
            Ok(head) => Ok(head
                .shorthand()
                .unwrap_or("HEAD")
                .to_string()),
            Err(_) => {
                // unborn HEAD still names its target branch
                let head = self.inner.find_reference("HEAD")?;
                let target = head
                    .symbolic_target()
                    .ok_or_else(|| RepoError::Corrupt("detached empty HEAD".to_string()))?;
                Ok(target.trim_start_matches("refs/heads/").to_string())
            }
        }
    }

    /// Commit id HEAD points to, None before the first commit
    pub fn head_oid(&self) -> Option<Oid> {
        self.inner
            .head()
            .ok()
            .and_then(|h| h.target())
    }

    /// Resolve a branch name, `HEAD`, or commit id to a commit id
    pub fn resolve(&self, refspec: &str) -> RepoResult<Oid> {
        self.inner
            .revparse_single(refspec)
            .and_then(|obj| obj.peel_to_commit())
            .map(|c| c.id())
            .map_err(|_| RepoError::UnknownRef(refspec.to_string()))
    }

    /// Commit id a local branch points to
    pub fn branch_oid(&self, name: &str) -> RepoResult<Oid> {
        let branch = self
            .inner
            .find_branch(name, BranchType::Local)
            .map_err(|_| RepoError::UnknownRef(name.to_string()))?;
        branch
            .get()
            .target()
            .ok_or_else(|| RepoError::UnknownRef(name.to_string()))
    }

    /// All local branch names
    pub fn branch_names(&self) -> RepoResult<Vec<String>> {
        let mut names = Vec::new();
        for branch in self.inner.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Create a branch pointing at `from`; fails if the name exists
    pub fn create_branch(&self, name: &str, from: Oid) -> RepoResult<()> {
        if self.inner.find_branch(name, BranchType::Local).is_ok() {
            return Err(RepoError::RefExists(name.to_string()));
        }
        let commit = self.inner.find_commit(from)?;
        self.inner.branch(name, &commit, false)?;
        info!("created branch {} at {}", name, from);
        Ok(())
    }

    /// Delete a branch; the checked-out branch cannot be deleted
    pub fn delete_branch(&self, name: &str) -> RepoResult<()> {
        if self.head_branch()? == name {
            return Err(RepoError::CannotDeleteHead(name.to_string()));
        }
        let mut branch = self
            .inner
            .find_branch(name, BranchType::Local)
            .map_err(|_| RepoError::UnknownRef(name.to_string()))?;
        branch.delete()?;
        info!("deleted branch {}", name);
        Ok(())
    }

    /// Point a branch at a commit, creating the ref if needed
    pub fn update_branch(&self, name: &str, oid: Oid) -> RepoResult<()> {
        self.inner
            .reference(&format!("refs/heads/{}", name), oid, true, "quit: update ref")?;
        Ok(())
    }

    /// Check out a branch into the working tree and move HEAD
    pub fn checkout_branch(&self, name: &str) -> RepoResult<()> {
        self.inner.set_head(&format!("refs/heads/{}", name))?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.inner.checkout_head(Some(&mut checkout))?;
        debug!("checked out {}", name);
        Ok(())
    }

    /// All blob paths of a commit's tree
    pub fn tree_paths(&self, oid: Oid) -> RepoResult<Vec<String>> {
        let commit = self.inner.find_commit(oid)?;
        let tree = commit.tree()?;
        let mut paths = Vec::new();
        tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    paths.push(format!("{}{}", root, name));
                }
            }
            git2::TreeWalkResult::Ok
        })?;
        Ok(paths)
    }

    /// Read a blob at a path within a commit's tree
    pub fn read_blob(&self, oid: Oid, path: &str) -> RepoResult<Option<Vec<u8>>> {
        let commit = self.inner.find_commit(oid)?;
        let tree = commit.tree()?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(_) => return Ok(None),
        };
        let object = entry.to_object(&self.inner)?;
        let blob = object
            .peel_to_blob()
            .map_err(|_| RepoError::Corrupt(format!("{} is not a blob", path)))?;
        Ok(Some(blob.content().to_vec()))
    }

    /// Commit staged file contents on a branch.
    ///
    /// The new tree is the first parent's tree with exactly the given
    /// paths replaced; files the caller did not stage keep whatever
    /// state the parent tree has. The branch ref advances to the new
    /// commit. With no parent the commit becomes the branch root.
    pub fn commit_files(
        &self,
        branch: &str,
        parents: &[Oid],
        files: &[(String, Vec<u8>)],
        message: &str,
    ) -> RepoResult<Oid> {
        let base_tree = match parents.first() {
            Some(parent) => Some(self.inner.find_commit(*parent)?.tree()?),
            None => None,
        };

        let tree_oid = match base_tree {
            Some(base) => {
                let mut builder = TreeUpdateBuilder::new();
                for (path, content) in files {
                    let blob = self.inner.blob(content)?;
                    builder.upsert(path.as_str(), blob, FileMode::Blob);
                }
                builder.create_updated(&self.inner, &base)?
            }
            None => {
                // no parent: build the root tree from scratch
                let empty = self.inner.treebuilder(None)?.write()?;
                let empty_tree = self.inner.find_tree(empty)?;
                let mut builder = TreeUpdateBuilder::new();
                for (path, content) in files {
                    let blob = self.inner.blob(content)?;
                    builder.upsert(path.as_str(), blob, FileMode::Blob);
                }
                builder.create_updated(&self.inner, &empty_tree)?
            }
        };

        self.commit_tree(branch, tree_oid, parents, message)
    }

    /// Commit an already-built tree on a branch
    pub fn commit_tree(
        &self,
        branch: &str,
        tree: Oid,
        parents: &[Oid],
        message: &str,
    ) -> RepoResult<Oid> {
        let tree = self.inner.find_tree(tree)?;
        let parent_commits: Vec<git2::Commit> = parents
            .iter()
            .map(|p| self.inner.find_commit(*p))
            .collect::<Result<_, _>>()?;
        let parent_refs: Vec<&git2::Commit> = parent_commits.iter().collect();
        let signature = self.signature()?;

        let oid = self.inner.commit(
            Some(&format!("refs/heads/{}", branch)),
            &signature,
            &signature,
            message,
            &tree,
            &parent_refs,
        )?;
        info!("committed {} on {}", oid, branch);
        Ok(oid)
    }

    /// Stage working-tree files in the index so `git status` agrees
    /// with the commit the pipeline just made
    pub fn stage_paths(&self, paths: &[String]) -> RepoResult<()> {
        let mut index = self.inner.index()?;
        for path in paths {
            index.add_path(Path::new(path))?;
        }
        index.write()?;
        Ok(())
    }

    /// Best common ancestor of two commits
    pub fn merge_base(&self, a: Oid, b: Oid) -> RepoResult<Oid> {
        Ok(self.inner.merge_base(a, b)?)
    }

    /// True when `ancestor` is reachable from `descendant`
    pub fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> RepoResult<bool> {
        Ok(self.inner.merge_base(ancestor, descendant)? == ancestor)
    }

    /// Three-way tree merge. Ok(tree) on clean merge, Err with the
    /// conflicting paths otherwise.
    pub fn merge_trees(
        &self,
        base: Oid,
        ours: Oid,
        theirs: Oid,
    ) -> RepoResult<Result<Oid, Vec<String>>> {
        let base_tree = self.inner.find_commit(base)?.tree()?;
        let our_tree = self.inner.find_commit(ours)?.tree()?;
        let their_tree = self.inner.find_commit(theirs)?.tree()?;

        let mut index = self
            .inner
            .merge_trees(&base_tree, &our_tree, &their_tree, None)?;
        if index.has_conflicts() {
            let mut paths = Vec::new();
            for conflict in index.conflicts()? {
                let conflict = conflict?;
                if let Some(entry) = conflict.our.or(conflict.their).or(conflict.ancestor) {
                    paths.push(String::from_utf8_lossy(&entry.path).to_string());
                }
            }
            paths.sort();
            paths.dedup();
            return Ok(Err(paths));
        }
        Ok(Ok(index.write_tree_to(&self.inner)?))
    }

    /// Fetch a remote using its configured refspecs
    pub fn fetch(&self, remote: &str) -> RepoResult<()> {
        let mut remote = self
            .inner
            .find_remote(remote)
            .map_err(|_| RepoError::UnknownRef(remote.to_string()))?;
        remote.fetch(&[] as &[&str], None, None)?;
        info!("fetched {}", remote.name().unwrap_or("remote"));
        Ok(())
    }

    /// Push a branch to a remote
    pub fn push(&self, remote: &str, branch: &str) -> RepoResult<()> {
        let mut remote = self
            .inner
            .find_remote(remote)
            .map_err(|_| RepoError::UnknownRef(remote.to_string()))?;
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);
        remote.push(&[refspec.as_str()], None)?;
        info!("pushed {} to {}", branch, remote.name().unwrap_or("remote"));
        Ok(())
    }

    /// Commit id of a remote-tracking branch after a fetch
    pub fn remote_branch_oid(&self, remote: &str, branch: &str) -> RepoResult<Oid> {
        let name = format!("refs/remotes/{}/{}", remote, branch);
        self.inner
            .find_reference(&name)
            .ok()
            .and_then(|r| r.target())
            .ok_or_else(|| RepoError::UnknownRef(name))
    }

    /// Commit metadata, newest first, from a tip
    pub fn log(&self, tip: Oid) -> RepoResult<Vec<CommitMeta>> {
        let mut walk = self.inner.revwalk()?;
        walk.push(tip)?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        let mut out = Vec::new();
        for oid in walk {
            out.push(self.commit_meta(oid?)?);
        }
        Ok(out)
    }

    /// Commit ids from the history root up to the tip
    pub fn history_from_root(&self, tip: Oid) -> RepoResult<Vec<Oid>> {
        let mut walk = self.inner.revwalk()?;
        walk.push(tip)?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        walk.collect::<Result<Vec<_>, _>>().map_err(RepoError::Git)
    }

    /// Metadata of a single commit
    pub fn commit_meta(&self, oid: Oid) -> RepoResult<CommitMeta> {
        let commit = self.inner.find_commit(oid)?;
        let meta = CommitMeta {
            id: oid.to_string(),
            parents: commit.parent_ids().map(|p| p.to_string()).collect(),
            author: Signature {
                name: commit.author().name().unwrap_or("").to_string(),
                email: commit.author().email().unwrap_or("").to_string(),
            },
            committer: Signature {
                name: commit.committer().name().unwrap_or("").to_string(),
                email: commit.committer().email().unwrap_or("").to_string(),
            },
            authored_at: commit.author().when().seconds(),
            committed_at: commit.time().seconds(),
            message: commit.message().unwrap_or("").to_string(),
        };
        Ok(meta)
    }

    /// Parent commit ids of a commit
    pub fn parents_of(&self, oid: Oid) -> RepoResult<Vec<Oid>> {
        Ok(self.inner.find_commit(oid)?.parent_ids().collect())
    }

    fn signature(&self) -> RepoResult<git2::Signature<'static>> {
        match self.inner.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Ok(git2::Signature::now("QuitStore", "quit@quit.aksw.org")?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_open_or_init() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open_or_init(dir.path()).unwrap();
        assert!(repo.head_oid().is_none());
        // the unborn HEAD still names a branch
        let head = repo.head_branch().unwrap();
        assert!(head == "master" || head == "main");
    }

    #[test]
    fn test_commit_and_read_blob() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open_or_init(dir.path()).unwrap();
        let branch = repo.head_branch().unwrap();

        write_file(dir.path(), "graph.nt", "<urn:a> <urn:b> <urn:c> .\n");
        let oid = repo
            .commit_files(
                &branch,
                &[],
                &[(
                    "graph.nt".to_string(),
                    b"<urn:a> <urn:b> <urn:c> .\n".to_vec(),
                )],
                "init",
            )
            .unwrap();

        assert_eq!(repo.head_oid(), Some(oid));
        let content = repo.read_blob(oid, "graph.nt").unwrap().unwrap();
        assert_eq!(content, b"<urn:a> <urn:b> <urn:c> .\n");
        assert!(repo.read_blob(oid, "missing.nt").unwrap().is_none());
    }

    #[test]
    fn test_unstaged_paths_survive_commit() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open_or_init(dir.path()).unwrap();
        let branch = repo.head_branch().unwrap();

        let first = repo
            .commit_files(
                &branch,
                &[],
                &[
                    ("a.nt".to_string(), b"a\n".to_vec()),
                    ("b.nt".to_string(), b"b\n".to_vec()),
                ],
                "init",
            )
            .unwrap();

        // second commit rewrites only a.nt; b.nt must be preserved
        let second = repo
            .commit_files(
                &branch,
                &[first],
                &[("a.nt".to_string(), b"a2\n".to_vec())],
                "update a",
            )
            .unwrap();

        assert_eq!(repo.read_blob(second, "a.nt").unwrap().unwrap(), b"a2\n");
        assert_eq!(repo.read_blob(second, "b.nt").unwrap().unwrap(), b"b\n");
    }

    #[test]
    fn test_branch_lifecycle() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open_or_init(dir.path()).unwrap();
        let branch = repo.head_branch().unwrap();
        let oid = repo
            .commit_files(&branch, &[], &[("g.nt".to_string(), b"\n".to_vec())], "init")
            .unwrap();

        repo.create_branch("develop", oid).unwrap();
        assert!(matches!(
            repo.create_branch("develop", oid),
            Err(RepoError::RefExists(_))
        ));
        assert_eq!(repo.branch_names().unwrap().len(), 2);

        assert!(matches!(
            repo.delete_branch(&branch),
            Err(RepoError::CannotDeleteHead(_))
        ));
        repo.delete_branch("develop").unwrap();
        assert!(matches!(
            repo.delete_branch("develop"),
            Err(RepoError::UnknownRef(_))
        ));
    }

    #[test]
    fn test_resolve() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open_or_init(dir.path()).unwrap();
        let branch = repo.head_branch().unwrap();
        let oid = repo
            .commit_files(&branch, &[], &[("g.nt".to_string(), b"\n".to_vec())], "init")
            .unwrap();

        assert_eq!(repo.resolve(&branch).unwrap(), oid);
        assert_eq!(repo.resolve("HEAD").unwrap(), oid);
        assert_eq!(repo.resolve(&oid.to_string()).unwrap(), oid);
        assert!(matches!(
            repo.resolve("nonexistent"),
            Err(RepoError::UnknownRef(_))
        ));
    }

    #[test]
    fn test_history_order() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::open_or_init(dir.path()).unwrap();
        let branch = repo.head_branch().unwrap();
        let first = repo
            .commit_files(&branch, &[], &[("g.nt".to_string(), b"1\n".to_vec())], "one")
            .unwrap();
        let second = repo
            .commit_files(
                &branch,
                &[first],
                &[("g.nt".to_string(), b"2\n".to_vec())],
                "two",
            )
            .unwrap();

        assert_eq!(repo.history_from_root(second).unwrap(), vec![first, second]);
        let log = repo.log(second).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].id, second.to_string());
        assert_eq!(log[0].parents, vec![first.to_string()]);
    }
}
