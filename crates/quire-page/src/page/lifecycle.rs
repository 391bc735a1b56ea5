//! Module instantiation and the per-module lifecycle.
//!
//! Every handling of a module follows the same steps: consult the cache on
//! the first handling only, run `get_data`, then either defer on outbound
//! operations or render, collect assets, and store the payload.

use std::collections::BTreeMap;

use quire_core::{
    CachePayload, DiagnosticKind, FetchRequest, FetchResult, Module, ModuleCache, ModuleContext,
    ModuleData, ModuleInit,
};
use serde_json::Value;
use tracing::debug;

use super::Page;
use crate::template;

/// Where a module instance stands within the render.
#[derive(Debug)]
pub(super) enum SlotState {
    /// Waiting on outbound operations; its sentinel is in the template.
    Deferred,
    /// Finished during a fetch round; content awaits substitution.
    Ready(String),
    /// Content has been placed.
    Done,
}

/// Outcome of handling a module once.
pub(super) enum Step {
    Content(String),
    Deferred,
}

/// One module instance, in template order.
pub(super) struct ModuleSlot {
    pub(super) name: String,
    module: Box<dyn Module>,
    set_keys: BTreeMap<String, String>,
    // memoized init_cache answer
    cache: Option<Option<ModuleCache>>,
    pub(super) state: SlotState,
}

/// An outstanding operation, keyed by its position in `Page::pending`.
pub(super) struct PendingEntry {
    pub(super) slot: usize,
    pub(super) request: FetchRequest,
    pub(super) name: String,
    pub(super) completed: bool,
    pub(super) response: Option<FetchResult>,
}

impl Page {
    /// Resolve one module placeholder to content or a fetch sentinel.
    pub(super) fn instantiate(&mut self, name: &str) -> String {
        let config = self.modules.get(name).cloned().unwrap_or_default();
        let identifier = config.identifier(name).to_owned();

        let Some(factory) = self.registry.get(&identifier) else {
            self.report(
                DiagnosticKind::ModuleNotFound,
                name,
                format!("no module registered as \"{identifier}\""),
            );
            return String::new();
        };

        let mut module = match factory(ModuleInit::new(name, config.params)) {
            Ok(module) => module,
            Err(e) => {
                self.report(DiagnosticKind::ModuleContractViolation, name, e.to_string());
                return String::new();
            }
        };

        if let Err(e) = module.setup() {
            self.report(DiagnosticKind::ModuleSetupFailed, name, e.to_string());
        }

        let id = self.slots.len();
        self.slots.push(ModuleSlot {
            name: name.to_owned(),
            module,
            set_keys: BTreeMap::new(),
            cache: None,
            state: SlotState::Deferred,
        });
        debug!(module = name, identifier = %identifier, slot = id, "module instantiated");

        match self.handle(id, None) {
            Step::Content(content) => {
                self.slots[id].state = SlotState::Done;
                content
            }
            Step::Deferred => template::token(&self.delimiters.fetch, name),
        }
    }

    /// Run one lifecycle step for slot `id`.
    ///
    /// `previous` is `None` on the first handling and the delivered response
    /// afterwards.
    pub(super) fn handle(&mut self, id: usize, previous: Option<FetchResult>) -> Step {
        if previous.is_none() {
            if let Some(content) = self.check_cache(id) {
                return Step::Content(content);
            }
        }

        match self.with_module(id, |module, ctx| module.get_data(previous, ctx)) {
            ModuleData::Failed(reason) => {
                let name = self.slots[id].name.clone();
                self.report(DiagnosticKind::ModuleDataFailure, &name, reason);
                Step::Content(String::new())
            }
            ModuleData::Pending(requests) if !requests.is_empty() => {
                let name = self.slots[id].name.clone();
                debug!(module = %name, operations = requests.len(), "module deferred");
                self.pending.extend(requests.into_iter().map(|request| PendingEntry {
                    slot: id,
                    request,
                    name: name.clone(),
                    completed: false,
                    response: None,
                }));
                Step::Deferred
            }
            ModuleData::Pending(_) => self.finish(id, Value::Array(Vec::new())),
            ModuleData::Final(value) => self.finish(id, value),
        }
    }

    fn finish(&mut self, id: usize, value: Value) -> Step {
        if !self.slots[id].module.is_final() {
            debug!(module = %self.slots[id].name, "module not final, waiting");
            return Step::Deferred;
        }

        let content = self.with_module(id, |module, ctx| module.render(value, ctx));
        let slot = &self.slots[id];
        let payload = CachePayload {
            content: content.clone(),
            assets: slot.module.assets(),
            keys: slot.set_keys.clone(),
        };
        self.assets.extend(payload.assets.iter().cloned());
        self.store_cache(id, &payload);
        Step::Content(content)
    }

    fn with_module<R>(
        &mut self,
        id: usize,
        f: impl FnOnce(&mut dyn Module, &mut ModuleContext<'_>) -> R,
    ) -> R {
        let slot = &mut self.slots[id];
        let mut ctx = ModuleContext::new(
            &slot.name,
            &mut self.keys,
            &mut slot.set_keys,
            self.force_refresh,
        );
        f(slot.module.as_mut(), &mut ctx)
    }

    // ── Cache ──

    fn cache_binding(&mut self, id: usize) -> Option<ModuleCache> {
        let slot = &mut self.slots[id];
        if slot.cache.is_none() {
            slot.cache = Some(slot.module.init_cache(self.cache.as_ref()));
        }
        slot.cache.clone().flatten()
    }

    fn check_cache(&mut self, id: usize) -> Option<String> {
        let binding = self.cache_binding(id)?;
        let name = self.slots[id].name.clone();

        if binding.adapter.should_bypass(self.force_refresh) {
            match binding.adapter.purge(&binding.key) {
                Ok(existed) => debug!(module = %name, key = %binding.key, existed, "cache entry purged"),
                Err(e) => self.report(DiagnosticKind::CacheFailure, &name, e.to_string()),
            }
            return None;
        }

        match binding.adapter.get(&binding.key) {
            Ok(Some(payload)) => {
                debug!(module = %name, key = %binding.key, "cache hit");
                Some(self.apply_payload(id, payload))
            }
            Ok(None) => {
                debug!(module = %name, key = %binding.key, "cache miss");
                None
            }
            Err(e) => {
                self.report(DiagnosticKind::CacheFailure, &name, e.to_string());
                None
            }
        }
    }

    /// Replay a cached payload's side effects and return its content.
    fn apply_payload(&mut self, id: usize, payload: CachePayload) -> String {
        for (key, value) in payload.keys {
            let _ = self.slots[id].set_keys.insert(key.clone(), value.clone());
            let _ = self.keys.insert(key, value);
        }
        self.assets.extend(payload.assets);
        payload.content
    }

    fn store_cache(&mut self, id: usize, payload: &CachePayload) {
        let Some(binding) = self.cache_binding(id) else {
            return;
        };
        if let Err(e) = binding.adapter.put(&binding.key, payload) {
            let name = self.slots[id].name.clone();
            self.report(DiagnosticKind::CacheFailure, &name, e.to_string());
        }
    }
}
