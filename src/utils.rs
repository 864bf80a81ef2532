use dirs::data_dir;
use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
};

const APP_DIR: &str = "event-draft";

/// Fixed storage name of the persisted draft record.
pub const DRAFT_STORAGE_NAME: &str = "event-draft-storage";

static DATA_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let base = data_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let root = base.join(APP_DIR);
    if let Err(err) = fs::create_dir_all(&root) {
        tracing::warn!("failed to create data root {:?}: {err}", root);
    }
    root
});

pub fn data_root() -> PathBuf {
    DATA_ROOT.clone()
}

pub fn draft_path() -> PathBuf {
    data_root().join(format!("{DRAFT_STORAGE_NAME}.json"))
}

pub fn config_path() -> PathBuf {
    data_root().join("config.json")
}

pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_paths_share_the_data_root() {
        let root = data_root();
        assert!(draft_path().starts_with(&root));
        assert!(config_path().starts_with(&root));
        assert_eq!(
            draft_path().file_name().and_then(|name| name.to_str()),
            Some("event-draft-storage.json")
        );
    }

    #[test]
    fn ensure_parent_creates_missing_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a").join("b").join("file.json");
        ensure_parent(&nested).expect("create parents");
        assert!(nested.parent().expect("parent").is_dir());
    }
}
