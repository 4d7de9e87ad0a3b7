//! The crate's error taxonomy.
//!
//! Driver and file-system errors are repackaged as their display text before
//! they cross this boundary. Callers get a stable set of variants to match
//! on, not `tokio_postgres` internals.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The advisory-lock query itself failed (connectivity, permissions).
    #[error("problem trying to acquire advisory lock: {0}")]
    LockQueryFailed(String),

    /// Another migrator currently holds the advisory lock. This is the
    /// normal outcome when two copies race, not a crash.
    #[error("another copy of pgmigrate is already running")]
    LockNotAcquired,

    /// The idempotent `create table if not exists` for the ledger failed.
    #[error("problem creating migrations table: {0}")]
    LedgerBootstrapFailed(String),

    /// The high-water-mark aggregate over the ledger failed.
    #[error("problem getting current status: {0}")]
    StatusQueryFailed(String),

    /// The migration directory could not be listed.
    #[error("problem reading directory {}: {}", .dir.display(), .message)]
    DirectoryReadFailed { dir: PathBuf, message: String },

    /// A pending script's body could not be read.
    #[error("problem reading file {name}: {message}")]
    ScriptReadFailed { name: String, message: String },

    /// A script executed against the database and failed. Nothing after
    /// `name` was attempted.
    #[error("problem migrating {name}: {cause}")]
    MigrationFailed { name: String, cause: String },

    /// The script ran, but its ledger row could not be inserted. The script
    /// will be re-attempted on the next run; see [`crate::migrator`].
    #[error("problem updating migrations table with {name}: {message}")]
    LedgerRecordFailed { name: String, message: String },
}
