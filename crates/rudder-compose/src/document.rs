//! Config documents and the include graph
//!
//! A config document declares charts to render, values to merge into the
//! global tree and other documents to include. [`DocumentLoader`] loads a root
//! document and everything it includes, depth-first, feeding each document's
//! contributions into the [`ResolutionContext`] as it goes.

use rudder_core::{LoadedPack, Values};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{ComposeError, Result};
use crate::patch::Patch;
use crate::refs::{join_relative, resolve_external_refs, resolve_local_refs};
use crate::state::{CapabilitiesOverride, ReleaseOverride, ResolutionContext};
use crate::target::{RenderedRelease, stays_inside};

/// A config document as written on disk
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct DocumentFile {
    #[serde(default)]
    includes: Vec<IncludeFile>,

    #[serde(default)]
    charts: Vec<ChartFile>,

    #[serde(default)]
    values: Values,

    #[serde(default)]
    capabilities: Option<CapabilitiesOverride>,

    #[serde(default)]
    release: Option<ReleaseOverride>,

    #[serde(default)]
    target: Option<Target>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct IncludeFile {
    path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChartFile {
    path: PathBuf,

    #[serde(default)]
    values: Values,

    #[serde(default)]
    patches: Vec<Patch>,
}

impl DocumentFile {
    fn parse(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ComposeError::io(path, e))?;

        let file: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| ComposeError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        file.validate().map_err(|message| ComposeError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        Ok(file)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !self.values.is_mapping() {
            return Err("`values` must be a mapping".to_string());
        }

        if let Some(target) = &self.target
            && !stays_inside(&target.path)
        {
            return Err(format!(
                "target path {} must be relative and must not contain `..`",
                target.path.display()
            ));
        }

        for chart in &self.charts {
            if !chart.values.is_mapping() {
                return Err(format!(
                    "chart {}: `values` must be a mapping",
                    chart.path.display()
                ));
            }
            for patch in &chart.patches {
                patch
                    .validate()
                    .map_err(|e| format!("chart {}: {}", chart.path.display(), e))?;
            }
        }

        Ok(())
    }
}

/// Where the charts of a root document are written, relative to the output directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    pub path: PathBuf,

    /// Releases rendered for this target during the current run
    #[serde(skip)]
    pub releases: Vec<RenderedRelease>,
}

/// A loaded config document
#[derive(Debug, Clone)]
pub struct Document {
    /// Canonical path of the file
    pub path: PathBuf,

    pub includes: Vec<Include>,

    pub charts: Vec<Chart>,

    /// The document's own values, external references resolved
    pub values: Values,

    pub capabilities: Option<CapabilitiesOverride>,

    pub release: Option<ReleaseOverride>,

    pub target: Option<Target>,
}

/// An included document
#[derive(Debug, Clone)]
pub struct Include {
    /// Path as declared, relative to the including document
    pub path: PathBuf,

    pub document: Document,
}

/// A chart declared by a document
#[derive(Debug, Clone)]
pub struct Chart {
    /// Pack directory, joined to the declaring document's directory
    pub path: PathBuf,

    /// Chart-local values, overlaid on the global tree at render time
    pub values: Values,

    pub patches: Vec<Patch>,

    pub pack: Arc<LoadedPack>,
}

impl Chart {
    /// Name of the pack, also the chart's output directory name
    pub fn name(&self) -> &str {
        self.pack.name()
    }
}

impl Document {
    /// Every chart reachable from this document: own charts first, then each
    /// include's charts, depth-first in declaration order
    pub fn collect_charts(&self) -> Vec<&Chart> {
        let mut charts: Vec<&Chart> = self.charts.iter().collect();
        for include in &self.includes {
            charts.extend(include.document.collect_charts());
        }
        charts
    }

    /// Resolve `#/pointer` references in every reachable chart's values against `scope`
    pub fn resolve_chart_refs(&mut self, scope: &JsonValue) -> Result<()> {
        let path = &self.path;
        for chart in &mut self.charts {
            resolve_local_refs(chart.values.inner_mut(), scope).map_err(|e| e.in_document(path))?;
        }
        for include in &mut self.includes {
            include
                .document
                .resolve_chart_refs(scope)
                .map_err(|e| e.in_document(path))?;
        }
        Ok(())
    }
}

/// Chain of documents being loaded, from the root to the current one
#[derive(Debug, Clone, Copy)]
pub struct Lineage<'a> {
    path: &'a Path,
    parent: Option<&'a Lineage<'a>>,
}

impl<'a> Lineage<'a> {
    pub fn new(path: &'a Path, parent: Option<&'a Lineage<'a>>) -> Self {
        Self { path, parent }
    }

    /// Paths from the current document up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = &Path> + '_ {
        std::iter::successors(Some(self), |lineage| lineage.parent).map(|lineage| lineage.path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.ancestors().any(|ancestor| ancestor == path)
    }

    /// Readable include chain ending with `next`
    fn chain_to(&self, next: &Path) -> String {
        let mut chain: Vec<String> = self
            .ancestors()
            .map(|path| path.display().to_string())
            .collect();
        chain.reverse();
        chain.push(next.display().to_string());
        chain.join(" -> ")
    }
}

/// Loaded packs by canonical path
#[derive(Debug, Default)]
pub struct ChartCache {
    packs: HashMap<PathBuf, Arc<LoadedPack>>,
}

impl ChartCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the pack at `path`, or return the copy loaded earlier
    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<LoadedPack>> {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if let Some(pack) = self.packs.get(&key) {
            return Ok(Arc::clone(pack));
        }

        let pack = LoadedPack::load(&key).map_err(|source| ComposeError::ChartLoad {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded chart {} from {}", pack.name(), key.display());

        let pack = Arc::new(pack);
        self.packs.insert(key, Arc::clone(&pack));
        Ok(pack)
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }
}

/// Loads a document tree into a [`ResolutionContext`]
pub struct DocumentLoader<'a> {
    state: &'a mut ResolutionContext,
    charts: &'a mut ChartCache,
}

impl<'a> DocumentLoader<'a> {
    pub fn new(state: &'a mut ResolutionContext, charts: &'a mut ChartCache) -> Self {
        Self { state, charts }
    }

    /// Load the document at `path` and, recursively, everything it includes.
    ///
    /// `parent` is the lineage of the including document, `None` for a root.
    /// The document's values, capabilities and release are merged into the
    /// state before its includes load, so included documents override it.
    pub fn load(&mut self, path: &Path, parent: Option<&Lineage<'_>>) -> Result<Document> {
        let path = std::fs::canonicalize(path).map_err(|e| ComposeError::io(path, e))?;

        if let Some(parent) = parent
            && parent.contains(&path)
        {
            return Err(ComposeError::CircularInclude {
                chain: parent.chain_to(&path),
                path,
            });
        }

        let DocumentFile {
            includes,
            charts,
            mut values,
            capabilities,
            release,
            target,
        } = DocumentFile::parse(&path)?;

        if parent.is_some() && target.is_some() {
            return Err(ComposeError::NestedTarget { path });
        }

        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut chart_files = charts;
        resolve_external_refs(values.inner_mut(), &base_dir).map_err(|e| e.in_document(&path))?;
        for chart in &mut chart_files {
            resolve_external_refs(chart.values.inner_mut(), &base_dir)
                .map_err(|e| e.in_document(&path))?;
        }

        self.state.merge_values(&values);
        if let Some(capabilities) = &capabilities {
            self.state.merge_capabilities(capabilities);
        }
        if let Some(release) = &release {
            self.state.merge_release(release);
        }

        debug!(
            "Loaded {} ({} includes, {} charts)",
            path.display(),
            includes.len(),
            chart_files.len()
        );

        let lineage = Lineage::new(&path, parent);
        let mut loaded_includes = Vec::with_capacity(includes.len());
        for include in includes {
            let document = self
                .load(&join_relative(&base_dir, &include.path), Some(&lineage))
                .map_err(|e| e.in_document(&path))?;
            loaded_includes.push(Include {
                path: include.path,
                document,
            });
        }

        let mut loaded_charts = Vec::with_capacity(chart_files.len());
        for chart in chart_files {
            let chart_path = join_relative(&base_dir, &chart.path);
            let pack = self
                .charts
                .get_or_load(&chart_path)
                .map_err(|e| e.in_document(&path))?;
            loaded_charts.push(Chart {
                path: chart_path,
                values: chart.values,
                patches: chart.patches,
                pack,
            });
        }

        Ok(Document {
            path,
            includes: loaded_includes,
            charts: loaded_charts,
            values,
            capabilities,
            release,
            target,
        })
    }
}
