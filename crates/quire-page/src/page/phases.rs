//! Phase resolvers and the fetch loop.

use std::collections::{BTreeMap, VecDeque};

use quire_core::{DiagnosticKind, FetchError};
use quire_fetch::Batch;
use quire_settings::Delimiter;
use tracing::{debug, info};

use super::Page;
use super::lifecycle::{SlotState, Step};
use crate::template::{self, Resolution};

/// Render phase. Each phase owns one delimiter class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// `<<name>>` sub-template expansion.
    Subtemplates,
    /// `[[name]]` module instantiation.
    Modules,
    /// `~~name~~` deferred module completion.
    Fetch,
    /// `{{name}}` page keys and assets.
    Finalize,
}

impl Phase {
    /// Lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subtemplates => "subtemplates",
            Self::Modules => "modules",
            Self::Fetch => "fetch",
            Self::Finalize => "finalize",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Page {
    fn delimiter(&self, phase: Phase) -> Delimiter {
        let delimiters = &self.delimiters;
        match phase {
            Phase::Subtemplates => delimiters.subtemplates.clone(),
            Phase::Modules => delimiters.modules.clone(),
            Phase::Fetch => delimiters.fetch.clone(),
            Phase::Finalize => delimiters.finalize.clone(),
        }
    }

    /// One substitution pass using the resolver of `phase`.
    pub(super) fn pass(&mut self, phase: Phase, template: &str) -> String {
        self.phase = phase;
        let delimiter = self.delimiter(phase);
        template::substitute(template, &delimiter, |name| self.resolve(name))
    }

    fn resolve(&mut self, name: &str) -> Resolution {
        match self.phase {
            Phase::Subtemplates => self.resolve_subtemplate(name),
            Phase::Modules => Resolution::Replace(self.instantiate(name)),
            Phase::Fetch => self.resolve_sentinel(name),
            Phase::Finalize => self.resolve_key(name),
        }
    }

    // ── Subtemplates ──

    pub(super) fn run_subtemplates(&mut self, mut template: String) -> String {
        let delimiter = self.delimiter(Phase::Subtemplates);
        while template::contains_placeholder(&template, &delimiter) {
            template = self.pass(Phase::Subtemplates, &template);
        }
        template
    }

    fn resolve_subtemplate(&mut self, name: &str) -> Resolution {
        if let Some(source) = self.subtemplates.remove(name) {
            let _ = self.consumed.insert(name.to_owned());
            return match source.load() {
                Ok(text) => {
                    debug!(subtemplate = name, bytes = text.len(), "subtemplate expanded");
                    Resolution::Replace(text)
                }
                Err(e) => {
                    self.report(DiagnosticKind::TemplateLoadFailure, name, e.to_string());
                    Resolution::Replace(String::new())
                }
            };
        }
        if self.consumed.contains(name) {
            self.report(
                DiagnosticKind::SubtemplateConsumed,
                name,
                "sub-template already used once in this render",
            );
        } else {
            self.report(
                DiagnosticKind::SubtemplateNotFound,
                name,
                "no sub-template configured under this name",
            );
        }
        Resolution::Replace(String::new())
    }

    // ── Fetch ──

    /// Execute fetch rounds until no sentinel remains or no operation is
    /// outstanding, bounded by the round cap.
    pub(super) async fn run_fetch(&mut self, mut template: String) -> String {
        if !self.slots.iter().any(|slot| matches!(slot.state, SlotState::Deferred)) {
            return template;
        }
        let delimiter = self.delimiter(Phase::Fetch);
        let mut capped = false;

        while template::contains_placeholder(&template, &delimiter) {
            if self.pending.iter().all(|entry| entry.completed) {
                break;
            }
            if self.rounds >= self.max_rounds {
                capped = true;
                break;
            }
            self.rounds += 1;

            let batch: Batch = self
                .pending
                .iter_mut()
                .enumerate()
                .filter(|(_, entry)| !entry.completed)
                .map(|(key, entry)| {
                    entry.completed = true;
                    (key, entry.request.clone())
                })
                .collect();
            let keys: Vec<usize> = batch.keys().copied().collect();
            info!(round = self.rounds, operations = keys.len(), "fetch round");

            let mut results = self.scheduler.execute_batch(batch).await;
            for &key in &keys {
                let result = results.remove(&key).unwrap_or(Err(FetchError::Missing));
                self.pending[key].response = Some(result);
            }

            self.deliver(&keys);
            self.queue_deferred();
            template = self.pass(Phase::Fetch, &template);
        }

        if template::contains_placeholder(&template, &delimiter) {
            template = self.abandon_sentinels(&template, capped);
        }
        template
    }

    /// Hand every response of the round to its module, in batch key order.
    /// When a module receives several responses the last outcome wins.
    fn deliver(&mut self, keys: &[usize]) {
        let mut by_slot: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &key in keys {
            by_slot.entry(self.pending[key].slot).or_default().push(key);
        }

        for (slot, entries) in by_slot {
            let mut step = Step::Deferred;
            for key in entries {
                let entry = &mut self.pending[key];
                let response = entry.response.take().unwrap_or(Err(FetchError::Missing));
                if let Err(e) = &response {
                    let subject = entry.name.clone();
                    let message = format!("{} {}: {e}", e.error_kind(), entry.request.url);
                    self.report(DiagnosticKind::FetchOperationFailure, &subject, message);
                }
                step = self.handle(slot, Some(response));
            }
            if let Step::Content(content) = step {
                self.slots[slot].state = SlotState::Ready(content);
            }
        }
    }

    /// Index deferred slots by name so sentinels resolve in template order.
    fn queue_deferred(&mut self) {
        self.fetch_queue.clear();
        for (id, slot) in self.slots.iter().enumerate() {
            if matches!(slot.state, SlotState::Deferred | SlotState::Ready(_)) {
                self.fetch_queue
                    .entry(slot.name.clone())
                    .or_default()
                    .push_back(id);
            }
        }
    }

    fn resolve_sentinel(&mut self, name: &str) -> Resolution {
        let Some(id) = self.fetch_queue.get_mut(name).and_then(VecDeque::pop_front) else {
            return Resolution::Keep;
        };
        let slot = &mut self.slots[id];
        match std::mem::replace(&mut slot.state, SlotState::Done) {
            SlotState::Ready(content) => Resolution::Replace(content),
            other => {
                slot.state = other;
                Resolution::Keep
            }
        }
    }

    /// Replace the sentinels of modules still deferred with empty content.
    /// Text that merely looks like a sentinel is left alone.
    fn abandon_sentinels(&mut self, template: &str, capped: bool) -> String {
        let delimiter = self.delimiter(Phase::Fetch);
        let (kind, message) = if capped {
            (
                DiagnosticKind::FetchRoundLimit,
                format!("abandoned after {} fetch rounds", self.max_rounds),
            )
        } else {
            (
                DiagnosticKind::ModuleStalled,
                "deferred with no outstanding operation".to_owned(),
            )
        };
        self.queue_deferred();
        template::substitute(template, &delimiter, |name| {
            let Some(id) = self.fetch_queue.get_mut(name).and_then(VecDeque::pop_front) else {
                return Resolution::Keep;
            };
            match std::mem::replace(&mut self.slots[id].state, SlotState::Done) {
                SlotState::Ready(content) => Resolution::Replace(content),
                _ => {
                    self.report(kind, name, message.clone());
                    Resolution::Replace(String::new())
                }
            }
        })
    }

    // ── Finalize ──

    fn resolve_key(&mut self, name: &str) -> Resolution {
        if name == "assets" {
            let markup = match &self.rendered_assets {
                Some(markup) => markup.clone(),
                None => {
                    let markup = self.assets.render(&mut self.diagnostics);
                    self.rendered_assets = Some(markup.clone());
                    markup
                }
            };
            return Resolution::Replace(markup);
        }
        match self.keys.get(name) {
            Some(value) => Resolution::Replace(html_escape::encode_quoted_attribute(value).into_owned()),
            None => Resolution::Replace(String::new()),
        }
    }
}
