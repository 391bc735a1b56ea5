//! Page definitions: what a page is made of, independent of a render.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use quire_core::AssetDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors loading a page definition.
#[derive(Debug, Error)]
pub enum PageError {
    /// The definition file could not be read.
    #[error("failed to read page definition {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The definition is not valid JSON for a page.
    #[error("failed to parse page definition: {0}")]
    Json(#[from] serde_json::Error),
    /// The definition is structurally valid but unusable.
    #[error("invalid page definition: {0}")]
    Invalid(String),
}

/// Where a template's text comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateSource {
    /// Literal template text.
    Text(String),
    /// File read when the template is first needed.
    File(PathBuf),
}

impl TemplateSource {
    /// Treat `value` as a path when it names an existing file, else as text.
    ///
    /// Relative paths are tried against `base` when given.
    pub fn detect(value: &str, base: Option<&Path>) -> Self {
        let direct = Path::new(value);
        if direct.is_file() {
            return Self::File(direct.to_path_buf());
        }
        if let Some(base) = base {
            let joined = base.join(value);
            if direct.is_relative() && joined.is_file() {
                return Self::File(joined);
            }
        }
        Self::Text(value.to_owned())
    }

    /// Template text.
    pub fn load(&self) -> std::io::Result<String> {
        match self {
            Self::Text(text) => Ok(text.clone()),
            Self::File(path) => std::fs::read_to_string(path),
        }
    }
}

impl From<&str> for TemplateSource {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for TemplateSource {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<PathBuf> for TemplateSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

/// How a module placeholder is instantiated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Registry identifier. Defaults to the placeholder name.
    #[serde(alias = "class", skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Construction parameters.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl ModuleConfig {
    /// Config for registry identifier `module`.
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: Some(module.into()),
            params: Value::Null,
        }
    }

    /// Attach construction parameters.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Identifier to look up for placeholder `name`.
    pub fn identifier<'a>(&'a self, name: &'a str) -> &'a str {
        self.module.as_deref().unwrap_or(name)
    }
}

/// JSON page definition.
///
/// ```json
/// {
///   "template": "layout.html",
///   "subtemplates": {"header": "<h1>{{title}}</h1>"},
///   "modules": {"nav": {"module": "remote", "params": {"url": "..."}}},
///   "keys": {"title": "Home"},
///   "assets": [{"kind": "style", "url": "/site.css"}]
/// }
/// ```
///
/// Template and sub-template values name a file when one exists at that
/// path (relative to the definition file), otherwise they are literal text.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PageDefinition {
    /// Main template.
    pub template: String,
    /// Named sub-templates.
    pub subtemplates: HashMap<String, String>,
    /// Module configurations by placeholder name.
    pub modules: HashMap<String, ModuleConfig>,
    /// Initial page keys.
    pub keys: BTreeMap<String, String>,
    /// Page-level assets, emitted before module assets.
    pub assets: Vec<AssetDescriptor>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl PageDefinition {
    /// Parse a definition from JSON text.
    pub fn from_json(text: &str) -> Result<Self, PageError> {
        let definition: Self = serde_json::from_str(text)?;
        if definition.template.is_empty() {
            return Err(PageError::Invalid("template must not be empty".into()));
        }
        Ok(definition)
    }

    /// Load a definition file. Relative template paths resolve against its
    /// directory.
    pub fn load(path: &Path) -> Result<Self, PageError> {
        let text = std::fs::read_to_string(path).map_err(|source| PageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut definition = Self::from_json(&text)?;
        definition.base_dir = path.parent().map(Path::to_path_buf);
        Ok(definition)
    }

    /// Main template source.
    pub fn template_source(&self) -> TemplateSource {
        TemplateSource::detect(&self.template, self.base_dir.as_deref())
    }

    /// Sub-template sources.
    pub fn subtemplate_sources(&self) -> HashMap<String, TemplateSource> {
        self.subtemplates
            .iter()
            .map(|(name, value)| {
                (
                    name.clone(),
                    TemplateSource::detect(value, self.base_dir.as_deref()),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn detect_literal_text() {
        assert_eq!(
            TemplateSource::detect("{{title}}", None),
            TemplateSource::Text("{{title}}".into())
        );
    }

    #[test]
    fn detect_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.tpl"), "body").unwrap();

        let source = TemplateSource::detect("main.tpl", Some(dir.path()));
        assert_eq!(source, TemplateSource::File(dir.path().join("main.tpl")));
        assert_eq!(source.load().unwrap(), "body");
    }

    #[test]
    fn module_config_defaults_to_placeholder_name() {
        let config = ModuleConfig::default();
        assert_eq!(config.identifier("nav"), "nav");
        assert_eq!(ModuleConfig::new("remote").identifier("nav"), "remote");
    }

    #[test]
    fn module_config_accepts_class_alias() {
        let config: ModuleConfig =
            serde_json::from_value(json!({"class": "text", "params": {"content": "x"}})).unwrap();
        assert_eq!(config.module.as_deref(), Some("text"));
        assert_eq!(config.params["content"], "x");
    }

    #[test]
    fn parse_definition() {
        let definition = PageDefinition::from_json(
            r#"{
                "template": "{{title}}<<sub>>",
                "subtemplates": {"sub": "[[nav]]"},
                "modules": {"nav": {"module": "text", "params": {"content": "home"}}},
                "keys": {"title": "T"},
                "assets": [{"kind": "style", "url": "/a.css"}]
            }"#,
        )
        .unwrap();
        assert_eq!(definition.keys["title"], "T");
        assert_eq!(definition.modules["nav"].identifier("nav"), "text");
        assert_eq!(definition.assets.len(), 1);
        assert_eq!(
            definition.subtemplate_sources()["sub"],
            TemplateSource::Text("[[nav]]".into())
        );
    }

    #[test]
    fn empty_template_rejected() {
        assert_matches!(PageDefinition::from_json("{}"), Err(PageError::Invalid(_)));
    }

    #[test]
    fn load_resolves_relative_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("layout.tpl"), "<<body>>").unwrap();
        std::fs::write(dir.path().join("body.tpl"), "hello").unwrap();
        let page_path = dir.path().join("page.json");
        std::fs::write(
            &page_path,
            r#"{"template": "layout.tpl", "subtemplates": {"body": "body.tpl"}}"#,
        )
        .unwrap();

        let definition = PageDefinition::load(&page_path).unwrap();
        assert_eq!(definition.template_source().load().unwrap(), "<<body>>");
        assert_eq!(definition.subtemplate_sources()["body"].load().unwrap(), "hello");
    }

    #[test]
    fn load_missing_file() {
        assert_matches!(
            PageDefinition::load(Path::new("/nonexistent/page.json")),
            Err(PageError::Io { .. })
        );
    }
}
