//! File enumeration for mock, function and body directories.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// List files with the given extension directly inside `dir`, sorted
/// lexicographically.
pub fn find_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    collect(&format!("{}/*.{}", dir.display(), extension))
}

/// List files with the given extension anywhere under `dir`, sorted
/// lexicographically. Load order (and therefore regex-mock tie-breaking)
/// follows this ordering.
pub fn find_all_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    collect(&format!("{}/**/*.{}", dir.display(), extension))
}

fn collect(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern)
        .map_err(|e| Error::config(format!("bad file pattern '{pattern}': {e}")))?;

    let mut matches = Vec::new();
    for entry in paths {
        let path =
            entry.map_err(|e| Error::config(format!("cannot read '{pattern}': {e}")))?;
        if path.is_file() {
            matches.push(path);
        }
    }
    matches.sort();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_files_sorted_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("ignored.txt"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/c.json"), "{}").unwrap();

        let flat = find_files(dir.path(), "json").unwrap();
        assert_eq!(flat.len(), 2);
        assert!(flat[0].ends_with("a.json"));
        assert!(flat[1].ends_with("b.json"));

        let all = find_all_files(dir.path(), "json").unwrap();
        assert_eq!(all.len(), 3);
    }
}
