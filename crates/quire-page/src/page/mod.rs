//! The page composer.
//!
//! A [`Page`] renders once. Rendering runs four phases in strict order, each
//! with its own delimiter class and resolver:
//!
//! 1. **Subtemplates** (`<<name>>`): repeated until none remain; every
//!    sub-template is consumed on first use
//! 2. **Modules** (`[[name]]`): one pass; each occurrence instantiates a
//!    module and resolves to its content or to a deferred sentinel
//! 3. **Fetch** (`~~name~~`): one scheduler batch per round, then one pass
//!    replacing the sentinels of modules that finished; skipped when no
//!    module deferred, and text that only looks like a sentinel is kept
//! 4. **Finalize** (`{{name}}`): page keys, HTML-escaped; `assets` expands
//!    to the de-duplicated asset markup
//!
//! Nothing in a render fails outright. Broken modules, failed operations,
//! and unusable assets degrade to empty output and a [`Diagnostic`].

mod lifecycle;
mod phases;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use quire_core::{AssetDescriptor, CacheAdapter, Diagnostic, DiagnosticKind};
use quire_fetch::FetchScheduler;
use quire_settings::{DelimiterSettings, QuireSettings};
use tracing::{debug, warn};

use crate::assets::AssetList;
use crate::definition::{ModuleConfig, PageDefinition, TemplateSource};
use crate::registry::ModuleRegistry;

use self::lifecycle::{ModuleSlot, PendingEntry};
pub use self::phases::Phase;

/// Default cap on fetch rounds per render.
pub const DEFAULT_MAX_ROUNDS: u32 = 16;

/// Result of [`Page::render`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderOutput {
    /// Rendered document.
    pub content: String,
    /// Page keys after every module ran.
    pub keys: BTreeMap<String, String>,
    /// Non-fatal conditions met along the way.
    pub diagnostics: Vec<Diagnostic>,
    /// Number of fetch rounds executed.
    pub rounds: u32,
}

impl RenderOutput {
    /// Whether a diagnostic of `kind` was recorded.
    pub fn has_diagnostic(&self, kind: DiagnosticKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }

    /// Diagnostics of `kind`.
    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.kind == kind).collect()
    }
}

/// Assembles a [`Page`].
pub struct PageBuilder {
    template: TemplateSource,
    subtemplates: HashMap<String, TemplateSource>,
    modules: HashMap<String, ModuleConfig>,
    keys: BTreeMap<String, String>,
    assets: Vec<AssetDescriptor>,
    registry: Arc<ModuleRegistry>,
    scheduler: Arc<dyn FetchScheduler>,
    cache: Option<Arc<dyn CacheAdapter>>,
    force_refresh: bool,
    delimiters: DelimiterSettings,
    max_rounds: u32,
}

impl PageBuilder {
    /// Builder with an empty template.
    pub fn new(registry: Arc<ModuleRegistry>, scheduler: Arc<dyn FetchScheduler>) -> Self {
        Self {
            template: TemplateSource::Text(String::new()),
            subtemplates: HashMap::new(),
            modules: HashMap::new(),
            keys: BTreeMap::new(),
            assets: Vec::new(),
            registry,
            scheduler,
            cache: None,
            force_refresh: false,
            delimiters: DelimiterSettings::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Main template.
    #[must_use]
    pub fn template(mut self, source: impl Into<TemplateSource>) -> Self {
        self.template = source.into();
        self
    }

    /// Add a named sub-template.
    #[must_use]
    pub fn subtemplate(mut self, name: impl Into<String>, source: impl Into<TemplateSource>) -> Self {
        let _ = self.subtemplates.insert(name.into(), source.into());
        self
    }

    /// Configure the module placeholder `name`.
    #[must_use]
    pub fn module(mut self, name: impl Into<String>, config: ModuleConfig) -> Self {
        let _ = self.modules.insert(name.into(), config);
        self
    }

    /// Set an initial page key.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.keys.insert(key.into(), value.into());
        self
    }

    /// Add a page-level asset. Page assets render before module assets.
    #[must_use]
    pub fn asset(mut self, asset: AssetDescriptor) -> Self {
        self.assets.push(asset);
        self
    }

    /// Take template, sub-templates, modules, keys, and assets from a definition.
    #[must_use]
    pub fn definition(mut self, definition: &PageDefinition) -> Self {
        self.template = definition.template_source();
        self.subtemplates.extend(definition.subtemplate_sources());
        self.modules
            .extend(definition.modules.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.keys
            .extend(definition.keys.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.assets.extend(definition.assets.iter().cloned());
        self
    }

    /// Shared cache offered to modules through [`init_cache`](quire_core::Module::init_cache).
    #[must_use]
    pub fn cache(mut self, cache: Option<Arc<dyn CacheAdapter>>) -> Self {
        self.cache = cache;
        self
    }

    /// Purge module cache entries before reading them.
    #[must_use]
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Force a refresh when the request flags carry `clear_key`.
    #[must_use]
    pub fn request_flags<'f>(
        mut self,
        flags: impl IntoIterator<Item = &'f str>,
        clear_key: &str,
    ) -> Self {
        if flags.into_iter().any(|flag| flag == clear_key) {
            self.force_refresh = true;
        }
        self
    }

    /// Placeholder delimiters.
    #[must_use]
    pub fn delimiters(mut self, delimiters: DelimiterSettings) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Maximum fetch rounds before deferred modules are abandoned.
    #[must_use]
    pub fn max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Apply delimiters and the round cap from settings.
    #[must_use]
    pub fn settings(self, settings: &QuireSettings) -> Self {
        self.delimiters(settings.template.delimiters.clone())
            .max_rounds(settings.fetch.max_rounds)
    }

    /// Finish the page.
    pub fn build(self) -> Page {
        let mut assets = AssetList::new();
        assets.extend(self.assets);
        Page {
            template: self.template,
            subtemplates: self.subtemplates,
            consumed: HashSet::new(),
            modules: self.modules,
            keys: self.keys,
            assets,
            rendered_assets: None,
            registry: self.registry,
            scheduler: self.scheduler,
            cache: self.cache,
            force_refresh: self.force_refresh,
            delimiters: self.delimiters,
            max_rounds: self.max_rounds,
            phase: Phase::Subtemplates,
            slots: Vec::new(),
            pending: Vec::new(),
            fetch_queue: HashMap::new(),
            diagnostics: Vec::new(),
            rounds: 0,
        }
    }
}

/// One document render. Consumed by [`Page::render`].
pub struct Page {
    template: TemplateSource,
    subtemplates: HashMap<String, TemplateSource>,
    consumed: HashSet<String>,
    modules: HashMap<String, ModuleConfig>,
    keys: BTreeMap<String, String>,
    assets: AssetList,
    // markup for `{{assets}}`, rendered on first use
    rendered_assets: Option<String>,
    registry: Arc<ModuleRegistry>,
    scheduler: Arc<dyn FetchScheduler>,
    cache: Option<Arc<dyn CacheAdapter>>,
    force_refresh: bool,
    delimiters: DelimiterSettings,
    max_rounds: u32,
    phase: Phase,
    slots: Vec<ModuleSlot>,
    pending: Vec<PendingEntry>,
    // deferred slots per module name, in template order, for the current fetch pass
    fetch_queue: HashMap<String, VecDeque<usize>>,
    diagnostics: Vec<Diagnostic>,
    rounds: u32,
}

impl Page {
    /// Start building a page.
    pub fn builder(registry: Arc<ModuleRegistry>, scheduler: Arc<dyn FetchScheduler>) -> PageBuilder {
        PageBuilder::new(registry, scheduler)
    }

    /// Render the document.
    pub async fn render(mut self) -> RenderOutput {
        let template = match self.template.load() {
            Ok(text) => text,
            Err(e) => {
                self.report(DiagnosticKind::TemplateLoadFailure, "template", e.to_string());
                String::new()
            }
        };

        let template = self.run_subtemplates(template);
        let template = self.pass(Phase::Modules, &template);
        let template = self.run_fetch(template).await;
        let content = self.pass(Phase::Finalize, &template);

        debug!(
            modules = self.slots.len(),
            rounds = self.rounds,
            diagnostics = self.diagnostics.len(),
            "page rendered"
        );

        RenderOutput {
            content,
            keys: self.keys,
            diagnostics: self.diagnostics,
            rounds: self.rounds,
        }
    }

    fn report(&mut self, kind: DiagnosticKind, subject: &str, message: impl Into<String>) {
        let diagnostic = Diagnostic::new(kind, subject, message);
        warn!(kind = kind.as_str(), subject, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }
}
