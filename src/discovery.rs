//! Enumeration of trade logs under the input directory.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::Result;
use crate::error::VolscanError;

/// Lists every regular file below `root`, sorted by path.
///
/// Hidden files and directories (names starting with `.`) are skipped, as
/// are entries that cannot be read.
///
/// # Errors
///
/// Returns [`VolscanError::RootNotFound`] if `root` is not an existing
/// directory. Nothing is scanned in that case.
pub fn discover_trade_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(VolscanError::RootNotFound(root.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .collect();

    files.sort();
    debug!(root = %root.display(), files = files.len(), "Discovered trade logs");
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("trades");
        let err = discover_trade_files(&root).unwrap_err();
        assert!(matches!(err, VolscanError::RootNotFound(ref p) if *p == root));
        assert!(!err.is_scoped());
    }

    #[test]
    fn file_as_root_is_not_found() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("TICKER.csv");
        fs::write(&file, "SECID,PRICE\n").unwrap();
        assert!(matches!(
            discover_trade_files(&file),
            Err(VolscanError::RootNotFound(_))
        ));
    }

    #[test]
    fn walks_nested_directories_sorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        fs::write(dir.path().join("b/nested/ZZZ.csv"), "").unwrap();
        fs::write(dir.path().join("AAA.csv"), "").unwrap();
        fs::write(dir.path().join("b/MMM.csv"), "").unwrap();

        let files = discover_trade_files(dir.path()).unwrap();
        let relative: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("AAA.csv"),
                PathBuf::from("b/MMM.csv"),
                PathBuf::from("b/nested/ZZZ.csv"),
            ]
        );
    }

    #[test]
    fn skips_hidden_entries() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join(".cache/OLD.csv"), "").unwrap();
        fs::write(dir.path().join(".DS_Store"), "").unwrap();
        fs::write(dir.path().join("AAA.csv"), "").unwrap();

        let files = discover_trade_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("AAA.csv")]);
    }

    #[test]
    fn empty_root_has_no_files() {
        let dir = TempDir::new().unwrap();
        assert!(discover_trade_files(dir.path()).unwrap().is_empty());
    }
}
