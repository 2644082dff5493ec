//! Git repository backend
//!
//! The adapter is the only component that touches `.git/`. Everything
//! above it deals in commit ids, blobs and branch names.

mod blame;
mod merge;
mod repository;

pub use blame::{blame, BlameRow};
pub use merge::{context_merge, three_way_merge, ConflictReport, MergeMethod};
pub use repository::{CommitMeta, Repository, Signature};

use thiserror::Error;

/// Repository errors
#[derive(Error, Debug)]
pub enum RepoError {
    /// Underlying git failure
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// Disk failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Ref or commit id that does not resolve
    #[error("unknown ref: {0}")]
    UnknownRef(String),

    /// Branch creation target already exists
    #[error("branch already exists: {0}")]
    RefExists(String),

    /// Refusing to delete the checked-out branch
    #[error("cannot delete current HEAD: {0}")]
    CannotDeleteHead(String),

    /// Merge produced conflicts; nothing was committed
    #[error("merge conflict")]
    MergeConflict(ConflictReport),

    /// Blob or tree content the store cannot interpret
    #[error("corrupt repository content: {0}")]
    Corrupt(String),
}

pub type RepoResult<T> = Result<T, RepoError>;
