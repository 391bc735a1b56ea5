//! Asset descriptors.
//!
//! Modules and pages declare scripts, stylesheets, and literal markup blobs as
//! data. The page composer turns them into tags only during finalization, so a
//! descriptor restored from cache behaves exactly like a freshly declared one.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Kind of resource an [`AssetDescriptor`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Script, linked by `url` or inlined from `file`/`content`.
    #[serde(alias = "js")]
    Script,
    /// Stylesheet, linked by `url` or inlined from `file`/`content`.
    #[serde(alias = "css")]
    Style,
    /// Literal markup passed through untouched.
    Blob,
}

impl AssetKind {
    /// Lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Style => "style",
            Self::Blob => "blob",
        }
    }
}

/// Declarative record of an external or inline resource.
///
/// Wire shape: `{kind, url?, file?, content?, attributes?}`. The legacy keys
/// `type` and `attrs` are accepted when deserializing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// Resource kind.
    #[serde(alias = "type")]
    pub kind: AssetKind,
    /// External location, rendered as `src`/`href`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Local file whose contents are inlined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Literal content to inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Extra tag attributes, rendered in declaration order.
    #[serde(default, alias = "attrs", skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, String>,
}

impl AssetDescriptor {
    fn new(kind: AssetKind) -> Self {
        Self {
            kind,
            url: None,
            file: None,
            content: None,
            attributes: IndexMap::new(),
        }
    }

    /// External script at `url`.
    pub fn script(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(AssetKind::Script)
        }
    }

    /// External stylesheet at `url`.
    pub fn style(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(AssetKind::Style)
        }
    }

    /// Inline content of the given kind.
    pub fn inline(kind: AssetKind, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::new(kind)
        }
    }

    /// Content of the given kind read from `path` at finalization.
    pub fn from_file(kind: AssetKind, path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            ..Self::new(kind)
        }
    }

    /// Literal markup blob.
    pub fn blob(content: impl Into<String>) -> Self {
        Self::inline(AssetKind::Blob, content)
    }

    /// Add a tag attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }
}
