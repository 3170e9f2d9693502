//! Rudder Compose - multi-chart config resolution
//!
//! This crate turns a tree of Rudder config documents into manifests on disk:
//! - Include graph loading with cycle detection
//! - `$file` / `$ref` value references, across files and within the merged tree
//! - Containment-gated JSON patches on rendered manifests
//! - Deterministic `<target>/<chart>/manifest.yaml` output layout

pub mod discover;
pub mod document;
pub mod error;
pub mod patch;
pub mod pipeline;
pub mod refs;
pub mod render;
pub mod state;
pub mod target;

#[cfg(test)]
mod testing;

pub use discover::discover_configs;
pub use document::{Chart, ChartCache, Document, DocumentLoader, Include, Lineage, Target};
pub use error::{BoxError, ComposeError, Result};
pub use patch::{Patch, PatchOperation, contains};
pub use pipeline::Pipeline;
pub use refs::{Node, RefUri, resolve_external_refs, resolve_local_refs};
pub use render::ChartRenderer;
pub use state::{CapabilitiesOverride, KubeVersionOverride, ReleaseOverride, ResolutionContext};
pub use target::{OutputTracker, RenderedRelease};
