//! Asset aggregation and markup.
//!
//! Descriptors collected during a render become tags only at finalization:
//!
//! - style url: `<link rel="stylesheet" type="text/css" href="..">`
//! - script url: `<script src=".."></script>`
//! - style/script content or file: `<style>..</style>` / `<script>..</script>`
//! - blob: the content as-is
//!
//! Identical rendered tags collapse; first declaration order wins.

use std::collections::HashSet;

use quire_core::{AssetDescriptor, AssetKind, Diagnostic, DiagnosticKind};

/// Order-preserving asset accumulator for one render.
#[derive(Debug, Default)]
pub struct AssetList {
    assets: Vec<AssetDescriptor>,
}

impl AssetList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append descriptors in declaration order.
    pub fn extend(&mut self, assets: impl IntoIterator<Item = AssetDescriptor>) {
        self.assets.extend(assets);
    }

    /// Declared descriptors, duplicates included.
    pub fn descriptors(&self) -> &[AssetDescriptor] {
        &self.assets
    }

    /// Render every descriptor, de-duplicated, joined by newlines.
    ///
    /// Descriptors without a usable source are skipped and reported.
    pub fn render(&self, diagnostics: &mut Vec<Diagnostic>) -> String {
        let mut seen = HashSet::new();
        let mut tags = Vec::new();
        for asset in &self.assets {
            match render_asset(asset) {
                Ok(Some(tag)) => {
                    if seen.insert(tag.clone()) {
                        tags.push(tag);
                    }
                }
                Ok(None) => {}
                Err(reason) => {
                    let diagnostic = Diagnostic::new(
                        DiagnosticKind::MisconfiguredAsset,
                        asset.kind.as_str(),
                        reason,
                    );
                    tracing::warn!(kind = asset.kind.as_str(), reason = %diagnostic.message, "misconfigured asset");
                    diagnostics.push(diagnostic);
                }
            }
        }
        tags.join("\n")
    }
}

/// Render one descriptor.
///
/// `Ok(None)` means the asset legitimately renders nothing (empty content).
pub fn render_asset(asset: &AssetDescriptor) -> Result<Option<String>, String> {
    match asset.kind {
        AssetKind::Blob => match &asset.content {
            Some(content) => Ok((!content.is_empty()).then(|| content.clone())),
            None => Err("blob asset has no content".to_owned()),
        },
        AssetKind::Script | AssetKind::Style => {
            if let Some(url) = &asset.url {
                return Ok(Some(linking_tag(asset.kind, url, asset)));
            }
            let content = if let Some(path) = &asset.file {
                std::fs::read_to_string(path)
                    .map_err(|e| format!("cannot read {}: {e}", path.display()))?
            } else if let Some(content) = &asset.content {
                content.clone()
            } else {
                return Err(format!("{} asset has no url, file, or content", asset.kind.as_str()));
            };
            if content.is_empty() {
                return Ok(None);
            }
            let name = if asset.kind == AssetKind::Style { "style" } else { "script" };
            Ok(Some(format!(
                "<{name}{}>{content}</{name}>",
                attributes(&[], asset)
            )))
        }
    }
}

fn linking_tag(kind: AssetKind, url: &str, asset: &AssetDescriptor) -> String {
    if kind == AssetKind::Style {
        let defaults = [("rel", "stylesheet"), ("type", "text/css"), ("href", url)];
        format!("<link{}>", attributes(&defaults, asset))
    } else {
        format!("<script{}></script>", attributes(&[("src", url)], asset))
    }
}

/// Default attributes first, then declared ones. A declared attribute named
/// like a default replaces the default's value in place.
fn attributes(defaults: &[(&str, &str)], asset: &AssetDescriptor) -> String {
    let mut out = String::new();
    for (name, value) in defaults {
        let value = asset.attributes.get(*name).map_or(*value, String::as_str);
        push_attribute(&mut out, name, value);
    }
    for (name, value) in &asset.attributes {
        if !defaults.iter().any(|(d, _)| *d == name.as_str()) {
            push_attribute(&mut out, name, value);
        }
    }
    out
}

fn push_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&html_escape::encode_double_quoted_attribute(value));
    out.push('"');
}
