//! # quire-page
//!
//! The staged page composer.
//!
//! - **Page**: [`Page`] and [`PageBuilder`] run the four render phases
//! - **Definition**: [`PageDefinition`] loads a page from JSON
//! - **Registry**: [`ModuleRegistry`] maps identifiers to module factories
//! - **Modules**: the built-in `text` and `remote` modules
//! - **Assets**: [`AssetList`] de-duplicates and renders asset markup
//! - **Template**: placeholder scanning shared by every phase

#![deny(unsafe_code)]

pub mod assets;
pub mod definition;
pub mod modules;
pub mod page;
pub mod registry;
pub mod template;

pub use assets::AssetList;
pub use definition::{ModuleConfig, PageDefinition, PageError, TemplateSource};
pub use page::{DEFAULT_MAX_ROUNDS, Page, PageBuilder, Phase, RenderOutput};
pub use registry::{ModuleFactory, ModuleRegistry};
