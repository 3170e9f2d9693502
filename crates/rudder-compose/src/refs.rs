//! Reference resolution for value trees
//!
//! Two kinds of reference nodes can appear anywhere inside a value tree:
//!
//! - `{ $file: "path" }` is replaced by the raw text of a file next to the
//!   document that declares it;
//! - `{ $ref: "uri" }` is replaced by the value the URI points to. A
//!   fragment-only URI (`#/a/b`) is a JSON pointer into the global value tree;
//!   a path (`other.yaml#/a`, `file:other.yaml`) loads another YAML file.
//!
//! Resolution happens in two passes that are never interleaved:
//! [`resolve_external_refs`] runs per document while it is loaded, and
//! [`resolve_local_refs`] runs once every document has been merged into the
//! global tree, so pointers may reference values declared anywhere.

use percent_encoding::percent_decode_str;
use serde_json::Value as JsonValue;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use url::Url;

use crate::error::{ComposeError, Result};

/// Key marking a file-content reference
pub const FILE_KEY: &str = "$file";

/// Key marking a pointer reference
pub const REF_KEY: &str = "$ref";

/// A parsed `$ref` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefUri {
    /// JSON pointer into the global value tree
    Local { pointer: String },
    /// YAML file relative to the referencing document, navigated with `pointer`
    External { path: PathBuf, pointer: String },
}

impl RefUri {
    /// Classify a reference string
    pub fn parse(reference: &str) -> Result<Self> {
        if let Some(fragment) = reference.strip_prefix('#') {
            return Ok(Self::Local {
                pointer: decode_pointer(reference, fragment)?,
            });
        }

        match Url::parse(reference) {
            // `Url::path` drops `..` segments, so the path is taken from the raw text
            Ok(url) if url.scheme() == "file" => {
                let raw = &reference[url.scheme().len() + 1..];
                let raw = match raw.strip_prefix("//") {
                    Some(authority_and_path) => authority_and_path
                        .find(['/', '#'])
                        .map_or("", |start| &authority_and_path[start..]),
                    None => raw,
                };
                let (path, fragment) = raw.split_once('#').unwrap_or((raw, ""));
                Ok(Self::External {
                    path: PathBuf::from(decode(reference, path)?.trim_start_matches('/')),
                    pointer: decode_pointer(reference, fragment)?,
                })
            }
            Ok(url) => Err(ComposeError::UnsupportedRef {
                reference: reference.to_string(),
                reason: format!("`{}` URLs cannot be resolved, only local files", url.scheme()),
            }),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let (path, fragment) = reference.split_once('#').unwrap_or((reference, ""));
                Ok(Self::External {
                    path: PathBuf::from(decode(reference, path)?),
                    pointer: decode_pointer(reference, fragment)?,
                })
            }
            Err(e) => Err(ComposeError::InvalidRef {
                reference: reference.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Join `path` under `base_dir`. Root and prefix components of `path` are
/// dropped, so an absolute path still resolves below `base_dir`.
pub(crate) fn join_relative(base_dir: &Path, path: &Path) -> PathBuf {
    let mut joined = base_dir.to_path_buf();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {}
            other => joined.push(other),
        }
    }
    joined
}

fn decode(reference: &str, raw: &str) -> Result<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| ComposeError::InvalidRef {
            reference: reference.to_string(),
            reason: e.to_string(),
        })
}

fn decode_pointer(reference: &str, fragment: &str) -> Result<String> {
    let pointer = decode(reference, fragment)?;
    if !pointer.is_empty() && !pointer.starts_with('/') {
        return Err(ComposeError::InvalidRef {
            reference: reference.to_string(),
            reason: "fragment is not a JSON pointer".to_string(),
        });
    }
    Ok(pointer)
}

/// A value tree node, classified for traversal
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar,
    Sequence,
    Mapping,
    FileRef(String),
    LocalPointerRef { reference: String, pointer: String },
    ExternalRef { reference: String, path: PathBuf, pointer: String },
}

impl Node {
    /// Classify a node. A mapping with a `$file` key is a file reference even if it
    /// also carries `$ref`; reference values must be strings.
    pub fn classify(value: &JsonValue) -> Result<Self> {
        let map = match value {
            JsonValue::Object(map) => map,
            JsonValue::Array(_) => return Ok(Self::Sequence),
            _ => return Ok(Self::Scalar),
        };

        if let Some(file) = map.get(FILE_KEY) {
            return match file {
                JsonValue::String(file) => Ok(Self::FileRef(file.clone())),
                other => Err(ComposeError::InvalidRef {
                    reference: other.to_string(),
                    reason: format!("{} value must be a string", FILE_KEY),
                }),
            };
        }

        let Some(raw) = map.get(REF_KEY) else {
            return Ok(Self::Mapping);
        };
        let reference = ref_string(raw)?;

        Ok(match RefUri::parse(reference)? {
            RefUri::Local { pointer } => Self::LocalPointerRef {
                reference: reference.to_string(),
                pointer,
            },
            RefUri::External { path, pointer } => Self::ExternalRef {
                reference: reference.to_string(),
                path,
                pointer,
            },
        })
    }
}

fn ref_string(raw: &JsonValue) -> Result<&str> {
    raw.as_str().ok_or_else(|| ComposeError::InvalidRef {
        reference: raw.to_string(),
        reason: format!("{} value must be a string", REF_KEY),
    })
}

fn lookup<'a>(scope: &'a JsonValue, reference: &str, pointer: &str) -> Result<&'a JsonValue> {
    scope
        .pointer(pointer)
        .ok_or_else(|| ComposeError::LocalRefNotFound {
            reference: reference.to_string(),
        })
}

/// Replace `$file` and external `$ref` nodes, in place, relative to `base_dir`.
///
/// Fragment-only references are left for [`resolve_local_refs`].
pub fn resolve_external_refs(value: &mut JsonValue, base_dir: &Path) -> Result<()> {
    match Node::classify(value)? {
        Node::FileRef(file) => {
            let path = join_relative(base_dir, Path::new(&file));
            let text = std::fs::read_to_string(&path).map_err(|e| ComposeError::InvalidRef {
                reference: file.clone(),
                reason: format!("cannot read {}: {}", path.display(), e),
            })?;
            debug!("Resolved {} {}", FILE_KEY, path.display());
            *value = JsonValue::String(text);
        }
        Node::ExternalRef {
            reference,
            path,
            pointer,
        } => {
            *value = load_external(&reference, &join_relative(base_dir, &path), &pointer)?;
        }
        Node::Mapping => {
            if let JsonValue::Object(map) = value {
                for child in map.values_mut() {
                    resolve_external_refs(child, base_dir)?;
                }
            }
        }
        Node::Sequence => {
            if let JsonValue::Array(items) = value {
                for item in items {
                    resolve_external_refs(item, base_dir)?;
                }
            }
        }
        Node::LocalPointerRef { .. } | Node::Scalar => {}
    }

    Ok(())
}

fn load_external(reference: &str, path: &Path, pointer: &str) -> Result<JsonValue> {
    let content = std::fs::read_to_string(path).map_err(|e| ComposeError::InvalidRef {
        reference: reference.to_string(),
        reason: format!("cannot read {}: {}", path.display(), e),
    })?;
    let document: JsonValue =
        serde_yaml::from_str(&content).map_err(|e| ComposeError::InvalidRef {
            reference: reference.to_string(),
            reason: format!("cannot parse {}: {}", path.display(), e),
        })?;

    debug!("Resolved {} {}", REF_KEY, reference);

    if pointer.is_empty() {
        return Ok(document);
    }

    document
        .pointer(pointer)
        .cloned()
        .ok_or_else(|| ComposeError::ExternalRefNotFound {
            reference: reference.to_string(),
            path: path.to_path_buf(),
        })
}

/// Replace every fragment-only `$ref` node, in place, with the value `scope`
/// holds at its pointer.
///
/// Resolved values are resolved in turn, so a reference may point at another
/// reference; a chain that comes back to a pointer it already follows fails
/// with [`ComposeError::CircularRef`]. Any other reference kind is unsupported
/// at this stage.
pub fn resolve_local_refs(value: &mut JsonValue, scope: &JsonValue) -> Result<()> {
    let mut following = Vec::new();
    resolve_local(value, scope, &mut following)
}

fn resolve_local(value: &mut JsonValue, scope: &JsonValue, following: &mut Vec<String>) -> Result<()> {
    match Node::classify(value)? {
        Node::LocalPointerRef { reference, pointer } => {
            if following.contains(&pointer) {
                return Err(ComposeError::CircularRef { reference });
            }

            let mut resolved = lookup(scope, &reference, &pointer)?.clone();
            following.push(pointer);
            resolve_local(&mut resolved, scope, following)?;
            following.pop();

            *value = resolved;
        }
        Node::FileRef(file) => {
            return Err(ComposeError::UnsupportedRef {
                reference: file,
                reason: format!("{} is only resolved while its document loads", FILE_KEY),
            });
        }
        Node::ExternalRef { reference, .. } => {
            return Err(ComposeError::UnsupportedRef {
                reference,
                reason: "only URI fragments pointing to values are supported here".to_string(),
            });
        }
        Node::Mapping => {
            if let JsonValue::Object(map) = value {
                for child in map.values_mut() {
                    resolve_local(child, scope, following)?;
                }
            }
        }
        Node::Sequence => {
            if let JsonValue::Array(items) = value {
                for item in items {
                    resolve_local(item, scope, following)?;
                }
            }
        }
        Node::Scalar => {}
    }

    Ok(())
}

/// Dereference a `{ $ref: "#/pointer" }` node against `scope`.
///
/// Returns `None` when `node` is not a mapping with a `$ref` key. Only
/// fragment-only references are accepted.
pub fn resolve_value_ref(node: &JsonValue, scope: &JsonValue) -> Result<Option<JsonValue>> {
    let Some(raw) = node.as_object().and_then(|map| map.get(REF_KEY)) else {
        return Ok(None);
    };
    let reference = ref_string(raw)?;

    match RefUri::parse(reference)? {
        RefUri::Local { pointer } => lookup(scope, reference, &pointer).map(|v| Some(v.clone())),
        RefUri::External { .. } => Err(ComposeError::UnsupportedRef {
            reference: reference.to_string(),
            reason: "patch values only support `#/pointer` references".to_string(),
        }),
    }
}
