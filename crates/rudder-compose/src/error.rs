//! Error types for document composition

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by chart renderers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while loading, resolving, rendering or writing a config tree
#[derive(Debug, Error, Diagnostic)]
pub enum ComposeError {
    // ============ Document Errors ============
    #[error("Failed to parse {}: {message}", .path.display())]
    #[diagnostic(code(rudder::compose::parse))]
    Parse { path: PathBuf, message: String },

    #[error("Circular include detected: {} (include chain: {chain})", .path.display())]
    #[diagnostic(code(rudder::compose::circular_include))]
    CircularInclude { path: PathBuf, chain: String },

    #[error("Included config {} declares a target, only the top-level config may", .path.display())]
    #[diagnostic(code(rudder::compose::nested_target))]
    NestedTarget { path: PathBuf },

    #[error("Error in {}", .path.display())]
    #[diagnostic(code(rudder::compose::document))]
    InDocument {
        path: PathBuf,
        #[source]
        source: Box<ComposeError>,
    },

    // ============ Reference Errors ============
    #[error("Invalid reference {reference}: {reason}")]
    #[diagnostic(code(rudder::compose::invalid_ref))]
    InvalidRef { reference: String, reason: String },

    #[error("Unsupported reference {reference}: {reason}")]
    #[diagnostic(
        code(rudder::compose::unsupported_ref),
        help("value references use `#/pointer`; file references use a relative path such as `other.yaml#/pointer`")
    )]
    UnsupportedRef { reference: String, reason: String },

    #[error("Reference {reference} not found in {}", .path.display())]
    #[diagnostic(code(rudder::compose::external_ref_not_found))]
    ExternalRefNotFound { reference: String, path: PathBuf },

    #[error("Reference {reference} does not point to an existing value")]
    #[diagnostic(code(rudder::compose::local_ref_not_found))]
    LocalRefNotFound { reference: String },

    #[error("Circular reference detected: {reference}")]
    #[diagnostic(code(rudder::compose::circular_ref))]
    CircularRef { reference: String },

    // ============ Chart Errors ============
    #[error("Failed to load chart {}", .path.display())]
    #[diagnostic(code(rudder::compose::chart_load))]
    ChartLoad {
        path: PathBuf,
        #[source]
        source: rudder_core::CoreError,
    },

    #[error("Failed to render chart {chart}")]
    #[diagnostic(code(rudder::compose::render))]
    Render {
        chart: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to apply patch to chart {chart}: {message}")]
    #[diagnostic(code(rudder::compose::patch))]
    PatchApply { chart: String, message: String },

    // ============ IO Errors ============
    #[error("IO error on {}: {source}", .path.display())]
    #[diagnostic(code(rudder::compose::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ComposeError {
    /// Wrap an error with the path of the document being processed
    pub fn in_document(self, path: impl Into<PathBuf>) -> Self {
        Self::InDocument {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Build an IO error annotated with a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The innermost error, without document path annotations
    pub fn root_cause(&self) -> &ComposeError {
        match self {
            Self::InDocument { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Document paths the error travelled through, outermost first
    pub fn document_trail(&self) -> Vec<&PathBuf> {
        let mut trail = Vec::new();
        let mut current = self;
        while let Self::InDocument { path, source } = current {
            trail.push(path);
            current = source.as_ref();
        }
        trail
    }
}

/// Result type for composition operations
pub type Result<T> = std::result::Result<T, ComposeError>;
