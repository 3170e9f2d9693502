//! Rudder Core - shared types for chart composition
//!
//! This crate provides the foundational types used throughout Rudder:
//! - `LoadedPack`: an on-disk chart artifact
//! - `Values`: Configuration values with deep merge support
//! - `ReleaseIdentity`: the name/namespace charts are rendered under
//! - `TemplateContext`: Template rendering context with capabilities

pub mod context;
pub mod error;
pub mod pack;
pub mod release;
pub mod values;

pub use context::{Capabilities, KubeVersion, PackInfo, TemplateContext};
pub use error::{CoreError, Result};
pub use pack::{LoadedPack, Pack, PackMetadata};
pub use release::{ReleaseIdentity, ReleaseInfo};
pub use values::Values;
