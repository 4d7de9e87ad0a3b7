//! Command-line front end for the pgmigrate engine.
//!
//! Connects to PostgreSQL, constructs a [`Migrator`] (which takes the
//! advisory lock and bootstraps the ledger), and applies every pending
//! script in the given directory. Progress lines go to stdout; structured
//! diagnostics go to stderr via tracing.
//!
//! Exit status is zero with a summary count on success, nonzero with an
//! error message on any failure — including the "another copy is already
//! running" refusal.

use clap::{Arg, ArgAction, Command};
use color_eyre::eyre::{eyre, Context as _};
use pgmigrate::tokio_postgres::NoTls;
use pgmigrate::{CancellationToken, Migrator};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_common::setup_tracing("pgmigrate")?;

    let matches = Command::new("pgmigrate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Apply ordered, one-way SQL migrations to a PostgreSQL database")
        .arg(
            Arg::new("dir")
                .help("Directory containing .sql migration scripts")
                .default_value("migrations")
                .index(1),
        )
        .arg(
            Arg::new("database-url")
                .long("database-url")
                .help("PostgreSQL connection string (defaults to $DATABASE_URL)"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Suppress progress output"),
        )
        .get_matches();

    let dir = matches
        .get_one::<String>("dir")
        .expect("dir has a default value")
        .clone();
    let url = matches
        .get_one::<String>("database-url")
        .cloned()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or_else(|| eyre!("no connection string: pass --database-url or set DATABASE_URL"))?;

    let (client, connection) = pgmigrate::tokio_postgres::connect(&url, NoTls)
        .await
        .wrap_err("could not connect to PostgreSQL")?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "database connection task ended");
        }
    });

    // Holding the advisory lock starts here and lasts until the process
    // exits and the connection closes.
    let migrator = Migrator::new(client, &dir)
        .await
        .wrap_err_with(|| format!("could not start migrating {dir}"))?;

    // Ctrl-C lets the in-flight script finish, then stops before the next
    // one. Interrupting mid-script would leave it half-applied.
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; stopping after the current migration");
                shutdown.cancel();
            }
        });
    }

    let report = if matches.get_flag("quiet") {
        migrator
            .migrate_with_shutdown(&mut std::io::sink(), &shutdown)
            .await?
    } else {
        migrator
            .migrate_with_shutdown(&mut std::io::stdout(), &shutdown)
            .await?
    };

    tracing::info!(
        applied = report.applied,
        prior_state = %report.prior_state,
        "migration run complete"
    );

    Ok(())
}
