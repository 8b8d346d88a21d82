//! Filesystem operations for working-copy recovery

use std::fs;
use std::io;
use std::path::Path;

use tracing::warn;

/// Remove a directory tree, tolerating read-only entries.
///
/// On a permission error the whole tree is made writable (best effort)
/// and the removal retried exactly once; any further error is returned
/// to the caller unchanged.
pub fn force_remove(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            warn!(
                path = %path.display(),
                "permission denied during delete, clearing read-only attributes and retrying"
            );
            make_writable(path);
            fs::remove_dir_all(path)
        }
        Err(e) => Err(e),
    }
}

/// Recursively clear read-only permission bits.
///
/// Individual failures are ignored; the follow-up delete reports
/// whatever still blocks.
fn make_writable(path: &Path) {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return;
    };
    let mut perms = metadata.permissions();
    if perms.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        let _ = fs::set_permissions(path, perms);
    }
    if metadata.is_dir() {
        let Ok(entries) = fs::read_dir(path) else {
            return;
        };
        for entry in entries.flatten() {
            make_writable(&entry.path());
        }
    }
}
