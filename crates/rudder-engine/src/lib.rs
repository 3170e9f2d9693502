//! Rudder Engine - Jinja2 templating for packs
//!
//! This crate provides the MiniJinja-based renderer Rudder uses for charts:
//! - Kubernetes-flavoured filters (toyaml, b64encode, nindent, ...)
//! - Release identity and capabilities exposed to templates
//! - Source-annotated diagnostics for template failures

pub mod engine;
pub mod error;
pub mod filters;
pub mod functions;

pub use engine::{Engine, RenderResult};
pub use error::{EngineError, TemplateError, TemplateErrorKind};
