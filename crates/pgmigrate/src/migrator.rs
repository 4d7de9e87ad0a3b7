//! The migration engine: advisory lock, ledger bootstrap, and the
//! apply-and-record loop.
//!
//! A run is strictly sequential. Each script depends on the database state
//! left by the previous one, so there is no internal parallelism, and a
//! failure aborts the run before the next script is attempted.
//!
//! One gap is accepted by design rather than papered over: if a script
//! executes successfully but the ledger insert for it fails, the next run
//! will execute that script again. Migration scripts therefore carry an
//! at-least-once execution contract and must be written idempotently.

use std::io::Write;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::discover;
use crate::error::{Error, Result};
use crate::session::Session;

/// Advisory-lock class identifier shared by every pgmigrate instance.
///
/// Together with [`ADVISORY_LOCK_OBJECT_ID`] this names the PostgreSQL
/// advisory lock that keeps two migrators off the same database. Existing
/// deployments depend on the pair staying put; changing either value
/// silently breaks mutual exclusion with older releases.
pub const ADVISORY_LOCK_CLASS_ID: i32 = 666;

/// Advisory-lock object identifier. See [`ADVISORY_LOCK_CLASS_ID`].
pub const ADVISORY_LOCK_OBJECT_ID: i32 = 999;

const CREATE_LEDGER_SQL: &str = "\
create table if not exists migrations (
  migration text constraint migrations_pk primary key not null,
  applied_on timestamp without time zone not null default now())";

const HIGH_WATER_MARK_SQL: &str = "\
select coalesce(max(migration), '') as current
  from migrations";

const RECORD_MIGRATION_SQL: &str = "insert into migrations (migration) values ($1)";

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// How many migrations this run applied.
    pub applied: usize,
    /// The ledger high-water mark observed before anything ran; empty when
    /// the ledger had no rows.
    pub prior_state: String,
}

/// Applies pending SQL migrations to one database, each exactly once.
///
/// Construction acquires the advisory lock and bootstraps the ledger table;
/// a second migrator against the same database fails with
/// [`Error::LockNotAcquired`] until the first one's session ends (or
/// [`release`](Migrator::release) is called). The migrator owns its session
/// for exactly that reason: the lock lives as long as the connection does.
#[derive(Debug)]
pub struct Migrator<S> {
    session: S,
    dir: PathBuf,
}

impl<S: Session> Migrator<S> {
    /// Acquire the advisory lock, ensure the ledger table exists, and return
    /// a migrator for `dir`.
    ///
    /// The lock is taken before the ledger bootstrap so that the bootstrap
    /// itself is guarded against concurrent creators.
    pub async fn new(session: S, dir: impl Into<PathBuf>) -> Result<Self> {
        if !try_advisory_lock(&session).await? {
            return Err(Error::LockNotAcquired);
        }
        ensure_ledger(&session).await?;

        Ok(Self {
            session,
            dir: dir.into(),
        })
    }

    /// Migrate the database to the newest script in the directory.
    ///
    /// Progress lines go to `out`; pass [`std::io::sink()`] for silence.
    pub async fn migrate<W: Write + Send>(&self, out: &mut W) -> Result<Report> {
        self.migrate_with_shutdown(out, &CancellationToken::new())
            .await
    }

    /// Like [`migrate`](Migrator::migrate), but stops cleanly when
    /// `shutdown` is cancelled.
    ///
    /// The token is only checked between scripts. A script that is already
    /// executing always runs to completion — there is no engine-level
    /// partial rollback to fall back on, so interrupting mid-script would
    /// leave it half-applied. A cancelled run returns the partial [`Report`]
    /// as success; re-running later picks up where the ledger left off.
    pub async fn migrate_with_shutdown<W: Write + Send>(
        &self,
        out: &mut W,
        shutdown: &CancellationToken,
    ) -> Result<Report> {
        let prior_state = self.current_high_water_mark().await?;
        if prior_state.is_empty() {
            let _ = writeln!(out, "No migrations yet.");
        } else {
            let _ = writeln!(out, "Current database state: {prior_state}");
        }
        tracing::debug!(high_water_mark = %prior_state, "resolved ledger state");

        let pending = discover::pending_migrations(&self.dir, &prior_state)?;

        let mut applied = 0;
        for name in &pending {
            if shutdown.is_cancelled() {
                tracing::warn!(next = %name, "shutdown requested, stopping before next migration");
                break;
            }

            let _ = writeln!(out, "Migrating {name}");
            self.apply_script(name).await?;
            self.record(name).await?;
            applied += 1;
        }

        let _ = writeln!(out, "Did {applied} migrations.");
        Ok(Report {
            applied,
            prior_state,
        })
    }

    /// Release the advisory lock without ending the session.
    ///
    /// The lock is normally released when the owning connection closes;
    /// tests that reuse a connection need the explicit form. Returns whether
    /// the lock was actually held.
    pub async fn release(&self) -> Result<bool> {
        let sql = format!(
            "select pg_advisory_unlock({ADVISORY_LOCK_CLASS_ID}, {ADVISORY_LOCK_OBJECT_ID})"
        );
        self.session
            .query_scalar_bool(&sql)
            .await
            .map_err(|e| Error::LockQueryFailed(e.0))
    }

    /// Borrow the owned session, e.g. for test cleanup after a run.
    pub fn session(&self) -> &S {
        &self.session
    }

    async fn current_high_water_mark(&self) -> Result<String> {
        self.session
            .query_scalar_text(HIGH_WATER_MARK_SQL)
            .await
            .map_err(|e| Error::StatusQueryFailed(e.0))
    }

    /// Execute one script in its entirety as a single call. PostgreSQL runs
    /// multiple semicolon-terminated statements per call; scripts must not
    /// issue their own transaction-control statements.
    async fn apply_script(&self, name: &str) -> Result<()> {
        let path = self.dir.join(name);
        let body = std::fs::read_to_string(path).map_err(|e| Error::ScriptReadFailed {
            name: name.to_string(),
            message: e.to_string(),
        })?;

        self.session
            .batch_execute(&body)
            .await
            .map_err(|e| Error::MigrationFailed {
                name: name.to_string(),
                cause: e.0,
            })?;

        tracing::info!(migration = %name, "applied migration");
        Ok(())
    }

    /// Record a successfully applied script in the ledger.
    ///
    /// A failure here, after the script already ran, is the accepted
    /// at-least-once gap: the next run will execute the script again.
    async fn record(&self, name: &str) -> Result<()> {
        self.session
            .execute_with_text(RECORD_MIGRATION_SQL, name)
            .await
            .map_err(|e| Error::LedgerRecordFailed {
                name: name.to_string(),
                message: e.0,
            })
    }
}

/// Try to grab the exclusive advisory lock. `false` means another migrator
/// holds it — the caller should stay out of its way.
async fn try_advisory_lock<S: Session>(session: &S) -> Result<bool> {
    let sql =
        format!("select pg_try_advisory_lock({ADVISORY_LOCK_CLASS_ID}, {ADVISORY_LOCK_OBJECT_ID})");
    session
        .query_scalar_bool(&sql)
        .await
        .map_err(|e| Error::LockQueryFailed(e.0))
}

/// Idempotently create the ledger table. The table will not exist on the
/// very first run, so this is safe to call on every startup.
async fn ensure_ledger<S: Session>(session: &S) -> Result<()> {
    session
        .batch_execute(CREATE_LEDGER_SQL)
        .await
        .map_err(|e| Error::LedgerBootstrapFailed(e.0))
}
