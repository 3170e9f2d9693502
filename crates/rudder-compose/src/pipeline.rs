//! End-to-end processing of config inputs

use rudder_core::Values;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::document::{ChartCache, DocumentLoader};
use crate::error::Result;
use crate::render::{ChartRenderer, render_target};
use crate::state::ResolutionContext;
use crate::target::{OutputTracker, write_target};

/// Processes config inputs of one run.
///
/// Each input gets fresh global state; loaded charts and the set of written
/// files are shared by every input processed through the same pipeline.
pub struct Pipeline<R> {
    renderer: R,
    output_dir: PathBuf,
    charts: ChartCache,
    outputs: OutputTracker,
}

impl<R: ChartRenderer> Pipeline<R> {
    pub fn new(renderer: R, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            output_dir: output_dir.into(),
            charts: ChartCache::new(),
            outputs: OutputTracker::new(),
        }
    }

    /// Load, resolve, render and write one root config, returning the files written
    pub fn process(&mut self, config: &Path) -> Result<Vec<PathBuf>> {
        info!("Processing {}", config.display());

        let mut state = ResolutionContext::new();
        let mut document = DocumentLoader::new(&mut state, &mut self.charts).load(config, None)?;

        if let Some(target) = &document.target {
            state.merge_values(&Values::from(json!({
                "rudder": { "target": { "path": target.path.display().to_string() } }
            })));
        }

        state
            .resolve_global_refs()
            .map_err(|e| e.in_document(&document.path))?;
        document.resolve_chart_refs(state.values.inner())?;

        render_target(&self.renderer, &mut document, &state)?;

        let Some(target) = &document.target else {
            return Ok(Vec::new());
        };
        let written = write_target(target, &self.output_dir, &mut self.outputs)?;
        debug!("{} wrote {} files", config.display(), written.len());

        Ok(written)
    }

    /// Packs loaded so far in this run
    pub fn chart_cache(&self) -> &ChartCache {
        &self.charts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComposeError;
    use crate::testing::{write, write_pack};
    use rudder_engine::Engine;
    use std::fs;
    use tempfile::TempDir;

    fn pipeline(out: &Path) -> Pipeline<Engine> {
        Pipeline::new(Engine::default(), out)
    }

    #[test]
    fn test_single_chart() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("rendered");
        write_pack(dir.path(), "packs/web", "web");
        let config = write(
            dir.path(),
            "config.yaml",
            "charts:\n  - path: packs/web\n    values:\n      replicas: 2\ntarget:\n  path: out\n",
        );

        let written = pipeline(&out).process(&config).unwrap();

        let manifest_path = out.join("out/web/manifest.yaml");
        assert_eq!(written, vec![manifest_path.clone()]);
        let manifest = fs::read_to_string(manifest_path).unwrap();
        assert!(manifest.starts_with("---\n# Source: web/templates/deployment.yaml\n"));
        assert!(manifest.contains("replicas: 2"));
    }

    #[test]
    fn test_no_target_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("rendered");
        write_pack(dir.path(), "packs/web", "web");
        let config = write(dir.path(), "config.yaml", "charts:\n  - path: packs/web\n");

        let written = pipeline(&out).process(&config).unwrap();

        assert!(written.is_empty());
        assert!(!out.exists());
    }

    #[test]
    fn test_no_target_still_checks_references() {
        let dir = TempDir::new().unwrap();
        let config = write(dir.path(), "config.yaml", "values:\n  a:\n    $ref: \"#/b\"\n");

        let err = pipeline(dir.path()).process(&config).unwrap_err();

        assert!(matches!(err.root_cause(), ComposeError::LocalRefNotFound { .. }));
    }

    #[test]
    fn test_shared_target_disjoint_charts() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("rendered");
        write_pack(dir.path(), "packs/web", "web");
        write_pack(dir.path(), "packs/api", "api");
        let first = write(
            dir.path(),
            "a.yaml",
            "charts:\n  - path: packs/web\ntarget:\n  path: prod\n",
        );
        let second = write(
            dir.path(),
            "b.yaml",
            "charts:\n  - path: packs/api\ntarget:\n  path: prod\n",
        );

        let mut pipeline = pipeline(&out);
        pipeline.process(&first).unwrap();
        pipeline.process(&second).unwrap();

        assert!(out.join("prod/web/manifest.yaml").is_file());
        assert!(out.join("prod/api/manifest.yaml").is_file());
    }

    #[test]
    fn test_same_chart_appends_within_run_and_truncates_across_runs() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("rendered");
        write_pack(dir.path(), "packs/web", "web");
        let first = write(
            dir.path(),
            "a.yaml",
            "charts:\n  - path: packs/web\n    values:\n      replicas: 2\ntarget:\n  path: prod\n",
        );
        let second = write(
            dir.path(),
            "b.yaml",
            "charts:\n  - path: packs/web\n    values:\n      replicas: 3\ntarget:\n  path: prod\n",
        );
        let manifest_path = out.join("prod/web/manifest.yaml");

        let mut run = pipeline(&out);
        run.process(&first).unwrap();
        run.process(&second).unwrap();

        let manifest = fs::read_to_string(&manifest_path).unwrap();
        assert_eq!(manifest.matches("# Source:").count(), 2);
        assert!(manifest.find("replicas: 2").unwrap() < manifest.find("replicas: 3").unwrap());
        assert_eq!(run.chart_cache().len(), 1);

        pipeline(&out).process(&second).unwrap();

        let manifest = fs::read_to_string(&manifest_path).unwrap();
        assert_eq!(manifest.matches("# Source:").count(), 1);
        assert!(!manifest.contains("replicas: 2"));
    }

    #[test]
    fn test_values_layering_and_references() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("rendered");
        write_pack(dir.path(), "packs/web", "web");
        write(
            dir.path(),
            "packs/web/templates/config.yaml",
            "kind: ConfigMap\ndata:\n  db: {{ values.db }}\n  target: {{ values.rudder.target.path }}\n",
        );
        write(dir.path(), "shared/db.yaml", "primary: db.internal\n");
        write(
            dir.path(),
            "shared/common.yaml",
            "values:\n  replicas: 4\n  databases:\n    $ref: db.yaml\n",
        );
        let config = write(
            dir.path(),
            "config.yaml",
            "includes:\n  - path: shared/common.yaml\ncharts:\n  - path: packs/web\n    values:\n      db:\n        $ref: \"#/databases/primary\"\nvalues:\n  replicas: 1\nrelease:\n  namespace: prod\ntarget:\n  path: eu/prod\n",
        );

        pipeline(&out).process(&config).unwrap();

        let manifest = fs::read_to_string(out.join("eu/prod/web/manifest.yaml")).unwrap();
        assert!(manifest.contains("# Source: web/templates/config.yaml\nkind: ConfigMap\ndata:\n  db: db.internal\n  target: eu/prod\n"));
        assert!(manifest.contains("  namespace: prod\nspec:\n  replicas: 4\n"));
    }

    #[test]
    fn test_absolute_target_rejected() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("rendered");
        let elsewhere = dir.path().join("elsewhere");
        write_pack(dir.path(), "packs/web", "web");
        let config = write(
            dir.path(),
            "config.yaml",
            &format!(
                "charts:\n  - path: packs/web\ntarget:\n  path: {}\n",
                elsewhere.display()
            ),
        );

        let err = pipeline(&out).process(&config).unwrap_err();

        assert!(matches!(err.root_cause(), ComposeError::Parse { .. }));
        assert!(!elsewhere.exists());
        assert!(!out.exists());
    }

    #[test]
    fn test_errors_carry_document_trail() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.yaml", "includes:\n  - path: b.yaml\ntarget:\n  path: out\n");
        write(dir.path(), "b.yaml", "includes:\n  - path: a.yaml\n");

        let err = pipeline(dir.path())
            .process(&dir.path().join("a.yaml"))
            .unwrap_err();

        assert!(matches!(err.root_cause(), ComposeError::CircularInclude { .. }));
        assert_eq!(err.document_trail().len(), 2);
    }
}
