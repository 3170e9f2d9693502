//! Writing rendered releases to disk

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::document::Target;
use crate::error::{ComposeError, Result};

/// File name every chart's manifests are written to
pub const MANIFEST_FILE: &str = "manifest.yaml";

/// A chart rendered for a target
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRelease {
    /// Pack name
    pub chart: String,

    /// Pack directory the release was rendered from
    pub path: PathBuf,

    /// Final manifest text, patches applied
    pub manifest: String,
}

/// Files written during a run.
///
/// The first write to a path truncates it, later writes in the same run append.
#[derive(Debug, Default)]
pub struct OutputTracker {
    created: HashSet<PathBuf>,
}

impl OutputTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `content` to `path`, creating parent directories as needed
    pub fn write(&mut self, path: &Path, content: &str) -> Result<()> {
        let key = std::path::absolute(path).map_err(|e| ComposeError::io(path, e))?;
        let first = !self.created.contains(&key);

        if first {
            if let Some(parent) = key.parent() {
                fs::create_dir_all(parent).map_err(|e| ComposeError::io(parent, e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(first)
            .append(!first)
            .open(&key)
            .map_err(|e| ComposeError::io(&key, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| ComposeError::io(&key, e))?;

        debug!(
            "{} {}",
            if first { "Created" } else { "Appended to" },
            key.display()
        );
        self.created.insert(key);
        Ok(())
    }

    /// Whether `path` was already written during this run
    pub fn contains(&self, path: &Path) -> bool {
        std::path::absolute(path)
            .map(|key| self.created.contains(&key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }
}

/// Whether `path` is relative and never climbs above where it is joined
pub(crate) fn stays_inside(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// Output file of a chart: `<output_dir>/<target>/<chart>/manifest.yaml`
pub fn manifest_path(output_dir: &Path, target: &Target, chart: &str) -> PathBuf {
    output_dir.join(&target.path).join(chart).join(MANIFEST_FILE)
}

/// Write every release of `target`, returning the paths written in release order
pub fn write_target(
    target: &Target,
    output_dir: &Path,
    tracker: &mut OutputTracker,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(target.releases.len());

    for release in &target.releases {
        let path = manifest_path(output_dir, target, &release.chart);
        tracker.write(&path, &release.manifest)?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn release(chart: &str, manifest: &str) -> RenderedRelease {
        RenderedRelease {
            chart: chart.to_string(),
            path: PathBuf::from(format!("packs/{}", chart)),
            manifest: manifest.to_string(),
        }
    }

    fn target(path: &str, releases: Vec<RenderedRelease>) -> Target {
        Target {
            path: PathBuf::from(path),
            releases,
        }
    }

    #[test]
    fn test_manifest_path() {
        let t = target("prod/eu", vec![]);
        assert_eq!(
            manifest_path(Path::new("out"), &t, "web"),
            PathBuf::from("out/prod/eu/web/manifest.yaml")
        );
    }

    #[test]
    fn test_stays_inside() {
        assert!(stays_inside(Path::new("prod/eu")));
        assert!(stays_inside(Path::new("./prod")));
        assert!(stays_inside(Path::new("")));
        assert!(!stays_inside(Path::new("/prod")));
        assert!(!stays_inside(Path::new("../prod")));
        assert!(!stays_inside(Path::new("prod/../../etc")));
    }

    #[test]
    fn test_write_target() {
        let dir = TempDir::new().unwrap();
        let mut tracker = OutputTracker::new();
        let t = target("prod", vec![release("web", "a: 1\n"), release("api", "b: 2\n")]);

        let written = write_target(&t, dir.path(), &mut tracker).unwrap();

        assert_eq!(
            written,
            vec![
                dir.path().join("prod/web/manifest.yaml"),
                dir.path().join("prod/api/manifest.yaml")
            ]
        );
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "a: 1\n");
        assert_eq!(fs::read_to_string(&written[1]).unwrap(), "b: 2\n");
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_append_within_run() {
        let dir = TempDir::new().unwrap();
        let mut tracker = OutputTracker::new();
        let t = target("prod", vec![release("web", "a: 1\n"), release("web", "a: 2\n")]);

        let written = write_target(&t, dir.path(), &mut tracker).unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(&written[0]).unwrap(),
            "a: 1\na: 2\n"
        );
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_new_run_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prod/web/manifest.yaml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale: true\nfrom: before\n").unwrap();

        let mut tracker = OutputTracker::new();
        assert!(!tracker.contains(&path));
        write_target(&target("prod", vec![release("web", "a: 1\n")]), dir.path(), &mut tracker)
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "a: 1\n");
        assert!(tracker.contains(&path));
    }
}
