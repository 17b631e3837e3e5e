//! File discovery: turn a configured `input_path` (a single `.nestml` file
//! or a directory) into the ordered list of source files the orchestrator
//! feeds to the pipeline, one compilation unit per file.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("input path {0} does not exist")]
    NotFound(PathBuf),

    #[error("walking directory {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
}

/// Discover every `.nestml` file under `input_path`, sorted for
/// deterministic processing order. A single file is returned as-is
/// (without requiring the `.nestml` extension — an explicit path is always
/// honored).
pub fn discover_sources(input_path: &Path) -> Result<Vec<PathBuf>, DiscoverError> {
    if !input_path.exists() {
        return Err(DiscoverError::NotFound(input_path.to_path_buf()));
    }

    if input_path.is_file() {
        return Ok(vec![input_path.to_path_buf()]);
    }

    let mut files = Vec::new();
    walk(input_path, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), DiscoverError> {
    let entries = std::fs::read_dir(dir).map_err(|e| DiscoverError::Io(dir.to_path_buf(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| DiscoverError::Io(dir.to_path_buf(), e))?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("nestml") {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_nested_nestml_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.nestml"), "").unwrap();
        std::fs::write(dir.path().join("sub/a.nestml"), "").unwrap();
        std::fs::write(dir.path().join("readme.txt"), "").unwrap();

        let found = discover_sources(dir.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("b.nestml") || found[0].ends_with("sub/a.nestml"));
    }

    #[test]
    fn single_file_is_returned_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("m.nestml");
        std::fs::write(&file, "").unwrap();
        let found = discover_sources(&file).unwrap();
        assert_eq!(found, vec![file]);
    }

    #[test]
    fn missing_path_is_an_error() {
        let result = discover_sources(Path::new("/does/not/exist"));
        assert!(matches!(result, Err(DiscoverError::NotFound(_))));
    }
}
