//! Config file discovery

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{ComposeError, Result};

/// Config files designated by `path`.
///
/// A file is returned as is. A directory is walked recursively in file name
/// order and yields every `.yaml`/`.yml` file below it.
pub fn discover_configs(path: &Path) -> Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(path).map_err(|e| ComposeError::io(path, e))?;
    if !metadata.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut configs = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let entry_path = e.path().unwrap_or(path).to_path_buf();
            ComposeError::io(entry_path, e.into())
        })?;

        if entry.file_type().is_file() && is_config(entry.path()) {
            configs.push(entry.into_path());
        }
    }

    Ok(configs)
}

fn is_config(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write;
    use tempfile::TempDir;

    #[test]
    fn test_file_yields_itself() {
        let dir = TempDir::new().unwrap();
        let file = write(dir.path(), "config.txt", "");

        assert_eq!(discover_configs(&file).unwrap(), vec![file]);
    }

    #[test]
    fn test_directory_walk() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.yaml", "");
        write(dir.path(), "a.yml", "");
        write(dir.path(), "nested/c.yaml", "");
        write(dir.path(), "README.md", "");

        let found = discover_configs(dir.path()).unwrap();

        assert_eq!(
            found,
            vec![
                dir.path().join("a.yml"),
                dir.path().join("b.yaml"),
                dir.path().join("nested/c.yaml"),
            ]
        );
    }

    #[test]
    fn test_missing_path() {
        let dir = TempDir::new().unwrap();

        let err = discover_configs(&dir.path().join("missing")).unwrap_err();

        assert!(matches!(err, ComposeError::Io { .. }));
    }
}
