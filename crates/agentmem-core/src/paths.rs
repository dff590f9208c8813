use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const AGENTMEM_DIR: &str = ".agentmem";
pub const CONFIG_FILE: &str = ".agentmem/config.yaml";
pub const DEFAULT_DB_FILE: &str = ".agentmem/actions.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn agentmem_dir(root: &Path) -> PathBuf {
    root.join(AGENTMEM_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Relative store paths in the config are relative to the project root, not
/// to the process working directory.
pub fn resolve_store_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
