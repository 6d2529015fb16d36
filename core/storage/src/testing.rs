//! Test helpers.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Make `dir` read-only so entries in it cannot be removed.
///
/// Returns false, with the permissions restored, when the platform does not
/// enforce them for the current user (for example when running as root).
pub(crate) fn lock_dir(dir: &Path) -> bool {
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o555)).unwrap();
    let check = dir.join(".write-check");
    match std::fs::File::create(&check) {
        Ok(_) => {
            std::fs::remove_file(&check).unwrap();
            unlock_dir(dir);
            false
        }
        Err(_) => true,
    }
}

/// Undo [`lock_dir`].
pub(crate) fn unlock_dir(dir: &Path) {
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755)).unwrap();
}
