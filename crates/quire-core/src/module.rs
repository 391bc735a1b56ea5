//! The module capability contract.
//!
//! A module is a stateful unit that produces a fragment of the page, possibly
//! across several request/response rounds. The page composer drives it:
//!
//! 1. [`Module::setup`] once after construction
//! 2. [`Module::init_cache`] once, lazily, to learn whether output is cacheable
//! 3. [`Module::get_data`] with no response, then once per delivered response
//! 4. [`Module::render`] and [`Module::assets`] once the data is final
//!
//! Each round answers with a [`ModuleData`] tagged union instead of relying on
//! the caller to inspect the returned value's type.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::asset::AssetDescriptor;
use crate::cache::CacheAdapter;
use crate::fetch::{FetchRequest, FetchResult};

/// Outcome of one [`Module::get_data`] round.
#[derive(Clone, Debug, PartialEq)]
pub enum ModuleData {
    /// Data is available; render it if the module reports final.
    Final(Value),
    /// Outbound operations must complete before the next round.
    Pending(Vec<FetchRequest>),
    /// The module could not produce data. Its placeholder renders empty.
    Failed(String),
}

impl ModuleData {
    /// Final text data.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Final(Value::String(value.into()))
    }

    /// A single pending operation.
    pub fn fetch(request: FetchRequest) -> Self {
        Self::Pending(vec![request])
    }
}

impl From<FetchRequest> for ModuleData {
    fn from(request: FetchRequest) -> Self {
        Self::fetch(request)
    }
}

/// Errors a module may raise outside the data rounds.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// The construction parameters do not fit the implementation.
    #[error("invalid parameters for module {module}: {reason}")]
    InvalidParams {
        /// Placeholder name the module was configured under.
        module: String,
        /// What was wrong.
        reason: String,
    },

    /// One-time initialization failed.
    #[error("setup failed: {0}")]
    Setup(String),
}

/// Construction input handed to a module factory.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleInit {
    /// Placeholder name the module occurs under in the template.
    pub name: String,
    /// Configured construction parameters (a JSON object, or null).
    pub params: Value,
}

impl ModuleInit {
    /// Build an init record.
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// String parameter by key.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Deserialize all parameters into a typed struct.
    ///
    /// Null parameters deserialize as an empty object so that structs with
    /// all-default fields accept a module configured without `params`.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T, ModuleError> {
        let params = if self.params.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            self.params.clone()
        };
        serde_json::from_value(params).map_err(|e| ModuleError::InvalidParams {
            module: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

/// A module's cache binding: the adapter plus the key its output lives under.
#[derive(Clone)]
pub struct ModuleCache {
    /// Storage collaborator.
    pub adapter: Arc<dyn CacheAdapter>,
    /// Entry key for this module's payload.
    pub key: String,
}

impl ModuleCache {
    /// Bind `adapter` to `key`.
    pub fn new(adapter: Arc<dyn CacheAdapter>, key: impl Into<String>) -> Self {
        Self {
            adapter,
            key: key.into(),
        }
    }
}

impl std::fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCache")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// The page as seen by a module during one lifecycle call.
///
/// Replaces a back-reference to the page: modules read and write page keys
/// through it, and every key a module sets is also recorded on the module's
/// own ledger so it can travel inside the cache payload.
pub struct ModuleContext<'a> {
    name: &'a str,
    page_keys: &'a mut BTreeMap<String, String>,
    set_keys: &'a mut BTreeMap<String, String>,
    force_refresh: bool,
}

impl<'a> ModuleContext<'a> {
    /// Context for the module occurring under `name`.
    pub fn new(
        name: &'a str,
        page_keys: &'a mut BTreeMap<String, String>,
        set_keys: &'a mut BTreeMap<String, String>,
        force_refresh: bool,
    ) -> Self {
        Self {
            name,
            page_keys,
            set_keys,
            force_refresh,
        }
    }

    /// Placeholder name of the module.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Current value of a page key.
    pub fn page_key(&self, key: &str) -> Option<&str> {
        self.page_keys.get(key).map(String::as_str)
    }

    /// Set a page key, recording it for the module's cache payload.
    pub fn set_page_key(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let _ = self.set_keys.insert(key.clone(), value.clone());
        let _ = self.page_keys.insert(key, value);
    }

    /// Set the `title` page key.
    pub fn set_page_title(&mut self, title: impl Into<String>) {
        self.set_page_key("title", title);
    }

    /// Whether this render was asked to bypass caches.
    pub fn force_refresh(&self) -> bool {
        self.force_refresh
    }
}

/// A pluggable unit of page content.
///
/// Only [`get_data`](Module::get_data) is required. A module that never
/// changes [`is_final`](Module::is_final) is synchronous unless it returns
/// [`ModuleData::Pending`].
pub trait Module: Send {
    /// One-time initialization. Failure is logged and the module still runs.
    fn setup(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Cache binding for this instance, consulted once per instance.
    ///
    /// `shared` is the page's configured cache backend, if any.
    fn init_cache(&self, _shared: Option<&Arc<dyn CacheAdapter>>) -> Option<ModuleCache> {
        None
    }

    /// Produce data for the current round.
    ///
    /// Called first with `None`, then once per delivered response.
    fn get_data(&mut self, previous: Option<FetchResult>, ctx: &mut ModuleContext<'_>)
    -> ModuleData;

    /// Whether no further rounds are expected.
    fn is_final(&self) -> bool {
        true
    }

    /// Turn final data into content.
    fn render(&mut self, data: Value, _ctx: &mut ModuleContext<'_>) -> String {
        value_to_text(&data)
    }

    /// Assets required by the rendered content.
    fn assets(&self) -> Vec<AssetDescriptor> {
        Vec::new()
    }
}

/// Text form of a data value: strings verbatim, null empty, anything else as JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
