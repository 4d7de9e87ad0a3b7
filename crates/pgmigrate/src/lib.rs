//! Ordered, one-way SQL schema migrations for PostgreSQL.
//!
//! A [`Migrator`] owns one database session and one directory of `.sql`
//! scripts. Scripts run in byte-wise lexicographic filename order, each
//! exactly once; a `migrations` ledger table records what has already been
//! applied, and a session-scoped advisory lock keeps two migrators from
//! running against the same database at the same time.
//!
//! There are no down migrations. Scripts only ever move the schema forward,
//! and naming discipline (zero-padded sequence prefixes or ISO-8601
//! timestamps) is what makes the filename order meaningful.
//!
//! # Example
//!
//! ```rust,no_run
//! use pgmigrate::Migrator;
//!
//! # async fn example(client: pgmigrate::tokio_postgres::Client) -> pgmigrate::Result<()> {
//! // `client` is a tokio_postgres::Client; the migrator takes ownership of
//! // it because the advisory lock lives for the connection's lifetime.
//! let migrator = Migrator::new(client, "./migrations").await?;
//!
//! let report = migrator.migrate(&mut std::io::stdout()).await?;
//! println!("applied {} migrations", report.applied);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod migrator;
pub mod session;

mod discover;

pub use error::{Error, Result};
pub use migrator::{Migrator, Report, ADVISORY_LOCK_CLASS_ID, ADVISORY_LOCK_OBJECT_ID};
pub use session::{Session, SessionError};

pub use tokio_postgres;
pub use tokio_util::sync::CancellationToken;
