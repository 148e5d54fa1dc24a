use std::{fs, io, path::Path};

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

/// Deletes `*.mp3` files in `dir` last modified more than `max_age` ago.
///
/// Failures on individual files are logged and skipped. Returns the number
/// of files removed.
pub fn sweep_expired_files(dir: &Path, max_age: Duration) -> io::Result<usize> {
    let cutoff = Utc::now().checked_sub_signed(max_age).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("file expiry of {max_age} is out of range"),
        )
    })?;
    let mut removed = 0;

    for entry in fs::read_dir(dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(err) => {
                warn!("failed to read output entry: {err}");
                continue;
            }
        };
        if path.extension().and_then(|ext| ext.to_str()) != Some("mp3") {
            continue;
        }

        let modified = match fs::metadata(&path).and_then(|meta| meta.modified()) {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(err) => {
                warn!("failed to stat {}: {err}", path.display());
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) => warn!("failed to delete expired file {}: {err}", path.display()),
        }
    }

    Ok(removed)
}
