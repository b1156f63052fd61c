use std::path::Path;

use tracing::{debug, warn};

/// Write the current process id to `path`. Failures are logged and ignored.
pub fn write_pid(path: &Path) {
    match std::fs::write(path, format!("{}\n", std::process::id())) {
        Ok(()) => debug!(path = %path.display(), "PID file written"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to write PID file"),
    }
}

/// Remove the PID file. Failures are logged and ignored.
pub fn remove_pid(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "PID file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove PID file"),
    }
}
