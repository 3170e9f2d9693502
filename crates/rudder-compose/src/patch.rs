//! Manifest patching
//!
//! A [`Patch`] pairs a target fragment with RFC 6902 operations. It only
//! applies to a rendered manifest whose first YAML document contains the
//! fragment; otherwise the manifest passes through untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::ops::Range;
use tracing::{debug, warn};

use crate::error::{ComposeError, Result};
use crate::refs::resolve_value_ref;

/// Patch declared on a chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Patch {
    /// Fragment the manifest must contain; `{}` matches everything
    #[serde(default = "empty_fragment")]
    pub target: JsonValue,

    /// Operations, applied in order
    #[serde(default)]
    pub patch: Vec<PatchOperation>,
}

fn empty_fragment() -> JsonValue {
    JsonValue::Object(serde_json::Map::new())
}

/// One JSON patch operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchOperation {
    pub op: PatchOp,

    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Literal value, or `{ $ref: "#/pointer" }` into the chart's values
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<JsonValue>,
}

/// `value: null` is a value, not an absent field
fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<JsonValue>, D::Error>
where
    D: Deserializer<'de>,
{
    JsonValue::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Test => "test",
        };
        f.write_str(name)
    }
}

impl PatchOperation {
    /// Check that the fields the operation needs are present
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self.op {
            PatchOp::Add | PatchOp::Replace | PatchOp::Test if self.value.is_none() => Err(
                format!("`{}` operation on {} requires a value", self.op, self.path),
            ),
            PatchOp::Move | PatchOp::Copy if self.from.is_none() => Err(format!(
                "`{}` operation on {} requires `from`",
                self.op, self.path
            )),
            _ => Ok(()),
        }
    }

    fn to_json(&self, values: &JsonValue) -> Result<JsonValue> {
        let mut op = serde_json::Map::new();
        op.insert("op".to_string(), JsonValue::String(self.op.to_string()));
        op.insert("path".to_string(), JsonValue::String(self.path.clone()));
        if let Some(from) = &self.from {
            op.insert("from".to_string(), JsonValue::String(from.clone()));
        }
        if let Some(value) = &self.value {
            let value = resolve_value_ref(value, values)?.unwrap_or_else(|| value.clone());
            op.insert("value".to_string(), value);
        }
        Ok(JsonValue::Object(op))
    }
}

impl Patch {
    /// Check every operation
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.patch.iter().try_for_each(PatchOperation::validate)
    }

    /// Whether `document` contains the target fragment
    pub fn matches(&self, document: &JsonValue) -> bool {
        self.target.is_null() || contains(document, &self.target)
    }

    /// Apply the patch to the first document of `manifest`.
    ///
    /// `values` is the scope `$ref` operation values are looked up in. When the
    /// fragment does not match, the manifest is returned unchanged.
    pub fn apply(&self, manifest: &str, values: &JsonValue, chart: &str) -> Result<String> {
        let layout = ManifestLayout::locate(manifest);
        let body = &manifest[layout.body.clone()];

        let document: JsonValue = if body.trim().is_empty() {
            empty_fragment()
        } else {
            serde_yaml::from_str(body).map_err(|e| ComposeError::PatchApply {
                chart: chart.to_string(),
                message: format!("rendered manifest is not valid YAML: {}", e),
            })?
        };

        let matched = if document.is_object() {
            self.matches(&document)
        } else {
            self.matches(&empty_fragment())
        };
        if !matched {
            warn!(
                "Patch target {} does not match chart {}, skipping",
                self.target, chart
            );
            return Ok(manifest.to_string());
        }

        let operations = self
            .patch
            .iter()
            .map(|op| op.to_json(values))
            .collect::<Result<Vec<_>>>()?;
        let operations: json_patch::Patch = serde_json::from_value(JsonValue::Array(operations))
            .map_err(|e| ComposeError::PatchApply {
                chart: chart.to_string(),
                message: e.to_string(),
            })?;

        let mut patched = document;
        json_patch::patch(&mut patched, &operations.0).map_err(|e| ComposeError::PatchApply {
            chart: chart.to_string(),
            message: e.to_string(),
        })?;

        let serialized = serde_yaml::to_string(&patched).map_err(|e| ComposeError::PatchApply {
            chart: chart.to_string(),
            message: e.to_string(),
        })?;

        debug!("Applied {} patch operations to chart {}", self.patch.len(), chart);

        let mut out = String::with_capacity(manifest.len() + serialized.len());
        let head = &manifest[..layout.body.start];
        out.push_str(head);
        if !head.is_empty() && !head.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&serialized);
        out.push_str(&manifest[layout.body.end..]);
        Ok(out)
    }
}

/// Fragment containment.
///
/// Mappings match when every fragment key is present with a contained value,
/// sequences match index-wise over the fragment's length, scalars by equality.
pub fn contains(document: &JsonValue, fragment: &JsonValue) -> bool {
    match (document, fragment) {
        (JsonValue::Object(doc), JsonValue::Object(frag)) => frag
            .iter()
            .all(|(key, value)| doc.get(key).is_some_and(|d| contains(d, value))),
        (JsonValue::Array(doc), JsonValue::Array(frag)) => {
            frag.len() <= doc.len() && frag.iter().zip(doc).all(|(f, d)| contains(d, f))
        }
        (doc, frag) => doc == frag,
    }
}

/// Byte range of the structural document inside a multi-document manifest
struct ManifestLayout {
    body: Range<usize>,
}

impl ManifestLayout {
    /// The first document with a line that is neither blank nor a comment.
    /// Its leading comment lines stay outside the body. Without such a
    /// document the body is the empty range at the end of the text.
    fn locate(manifest: &str) -> Self {
        let end = manifest.len();

        for segment in split_documents(manifest) {
            let mut offset = segment.start;
            for line in manifest[segment.clone()].split_inclusive('\n') {
                let trimmed = line.trim();
                if !trimmed.is_empty() && !trimmed.starts_with('#') {
                    return Self {
                        body: offset..segment.end,
                    };
                }
                offset += line.len();
            }
        }

        Self { body: end..end }
    }
}

/// Ranges between `---` separator lines
fn split_documents(manifest: &str) -> Vec<Range<usize>> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in manifest.split_inclusive('\n') {
        if is_separator(line) {
            segments.push(start..offset);
            start = offset + line.len();
        }
        offset += line.len();
    }
    segments.push(start..manifest.len());

    segments
}

fn is_separator(line: &str) -> bool {
    let line = line.trim_end();
    line == "---" || line.starts_with("--- ")
}
