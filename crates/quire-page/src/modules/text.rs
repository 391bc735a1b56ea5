//! `text`: static content from parameters.
//!
//! ```json
//! {"module": "text", "params": {
//!     "content": "<nav>..</nav>",
//!     "keys": {"section": "docs"},
//!     "title": "Docs",
//!     "assets": [{"kind": "style", "url": "/nav.css"}],
//!     "cacheKey": "nav"
//! }}
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use quire_core::{
    AssetDescriptor, CacheAdapter, FetchResult, Module, ModuleCache, ModuleContext, ModuleData,
    ModuleError, ModuleInit,
};
use serde::Deserialize;

/// Registry identifier.
pub const IDENTIFIER: &str = "text";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct TextParams {
    content: String,
    keys: BTreeMap<String, String>,
    title: Option<String>,
    assets: Vec<AssetDescriptor>,
    cache_key: Option<String>,
}

/// Emits configured content synchronously.
#[derive(Debug)]
pub struct TextModule {
    params: TextParams,
}

impl TextModule {
    /// Factory registered under [`IDENTIFIER`].
    pub fn create(init: ModuleInit) -> Result<Box<dyn Module>, ModuleError> {
        let params: TextParams = init.params_as()?;
        Ok(Box::new(Self { params }))
    }
}

impl Module for TextModule {
    fn init_cache(&self, shared: Option<&Arc<dyn CacheAdapter>>) -> Option<ModuleCache> {
        let key = self.params.cache_key.as_ref()?;
        shared.map(|adapter| ModuleCache::new(Arc::clone(adapter), format!("text:{key}")))
    }

    fn get_data(&mut self, _previous: Option<FetchResult>, ctx: &mut ModuleContext<'_>) -> ModuleData {
        for (key, value) in &self.params.keys {
            ctx.set_page_key(key.clone(), value.clone());
        }
        if let Some(title) = &self.params.title {
            ctx.set_page_title(title.clone());
        }
        ModuleData::text(self.params.content.clone())
    }

    fn assets(&self) -> Vec<AssetDescriptor> {
        self.params.assets.clone()
    }
}
