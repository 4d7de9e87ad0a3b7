//! Discovery and ordering of pending migration scripts.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Recognized migration-script suffix. Directory entries that do not end in
/// it are ignored, not errors.
pub(crate) const MIGRATION_SUFFIX: &str = ".sql";

/// List the scripts in `dir` that are still pending, in the order they must
/// run.
///
/// Names compare byte-wise (plain `str` ordering, no locale), and only names
/// strictly greater than `high_water_mark` are returned. Ties cannot occur:
/// ledger identifiers are unique and the boundary is exclusive.
pub(crate) fn pending_migrations(dir: &Path, high_water_mark: &str) -> Result<Vec<String>> {
    let listing_failed = |e: std::io::Error| Error::DirectoryReadFailed {
        dir: dir.to_path_buf(),
        message: e.to_string(),
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(listing_failed)? {
        let entry = entry.map_err(listing_failed)?;
        if !entry.file_type().map_err(listing_failed)?.is_file() {
            continue;
        }
        // A non-UTF-8 name cannot match the suffix or the ledger anyway.
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.ends_with(MIGRATION_SUFFIX) && name.as_str() > high_water_mark {
            names.push(name);
        }
    }

    // read_dir yields entries in platform order; the apply loop needs the
    // lexicographic one.
    names.sort_unstable();

    Ok(names)
}
