//! An in-memory stand-in for a PostgreSQL session.
//!
//! [`FakeSession`] interprets just enough of the SQL the migrator issues —
//! the advisory-lock queries, the ledger bootstrap, the status aggregate,
//! and the ledger insert. Anything else handed to `batch_execute` is
//! treated as a migration script body and logged.

// Each test binary compiles this module separately and uses a different
// subset of the helpers.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use pgmigrate::{CancellationToken, Session, SessionError};

#[derive(Debug, Default)]
struct DbState {
    lock_held: bool,
    ledger_created: bool,
    ledger: BTreeSet<String>,
    executed: Vec<String>,
    fail_scripts: Vec<(String, String)>,
    fail_ledger_insert: bool,
    cancel_on: Option<(String, CancellationToken)>,
}

/// One simulated database, shared by any number of sessions.
#[derive(Debug, Default, Clone)]
pub struct FakeDb {
    state: Arc<Mutex<DbState>>,
}

impl FakeDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> FakeSession {
        FakeSession { db: self.clone() }
    }

    /// Ledger contents in lexicographic order.
    pub fn ledger(&self) -> Vec<String> {
        self.state().ledger.iter().cloned().collect()
    }

    /// Script bodies that were executed, in execution order.
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    pub fn lock_held(&self) -> bool {
        self.state().lock_held
    }

    /// Pretend `name` was applied by an earlier run.
    pub fn seed_ledger(&self, name: &str) {
        self.state().ledger.insert(name.to_string());
    }

    /// Make any script whose body contains `needle` fail with `message`.
    pub fn fail_script_containing(&self, needle: &str, message: &str) {
        self.state()
            .fail_scripts
            .push((needle.to_string(), message.to_string()));
    }

    /// Make every ledger insert fail, as if the connection dropped between
    /// the script and its record.
    pub fn fail_ledger_insert(&self) {
        self.state().fail_ledger_insert = true;
    }

    /// Cancel `token` while the script containing `needle` is executing,
    /// simulating an interrupt that arrives mid-migration.
    pub fn cancel_when_executing(&self, needle: &str, token: CancellationToken) {
        self.state().cancel_on = Some((needle.to_string(), token));
    }

    fn state(&self) -> MutexGuard<'_, DbState> {
        self.state.lock().expect("fake db state poisoned")
    }
}

#[derive(Debug)]
pub struct FakeSession {
    db: FakeDb,
}

#[async_trait]
impl Session for FakeSession {
    async fn batch_execute(&self, sql: &str) -> Result<(), SessionError> {
        let mut state = self.db.state();

        if sql.contains("create table if not exists migrations") {
            state.ledger_created = true;
            return Ok(());
        }

        if let Some(message) = state
            .fail_scripts
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, message)| message.clone())
        {
            return Err(SessionError(message));
        }

        if let Some((needle, token)) = state.cancel_on.clone() {
            if sql.contains(&needle) {
                token.cancel();
            }
        }

        state.executed.push(sql.to_string());
        Ok(())
    }

    async fn execute_with_text(&self, sql: &str, value: &str) -> Result<(), SessionError> {
        assert!(
            sql.contains("insert into migrations"),
            "unexpected statement: {sql}"
        );

        let mut state = self.db.state();
        if state.fail_ledger_insert {
            return Err(SessionError("connection reset by peer".to_string()));
        }
        if !state.ledger.insert(value.to_string()) {
            return Err(SessionError(
                "duplicate key value violates unique constraint \"migrations_pk\"".to_string(),
            ));
        }
        Ok(())
    }

    async fn query_scalar_bool(&self, sql: &str) -> Result<bool, SessionError> {
        let mut state = self.db.state();

        if sql.contains("pg_try_advisory_lock") {
            if state.lock_held {
                return Ok(false);
            }
            state.lock_held = true;
            return Ok(true);
        }
        if sql.contains("pg_advisory_unlock") {
            let was_held = state.lock_held;
            state.lock_held = false;
            return Ok(was_held);
        }

        Err(SessionError(format!("unrecognized query: {sql}")))
    }

    async fn query_scalar_text(&self, sql: &str) -> Result<String, SessionError> {
        assert!(sql.contains("max(migration)"), "unexpected query: {sql}");

        let state = self.db.state();
        if !state.ledger_created {
            return Err(SessionError(
                "relation \"migrations\" does not exist".to_string(),
            ));
        }
        Ok(state.ledger.iter().next_back().cloned().unwrap_or_default())
    }
}
