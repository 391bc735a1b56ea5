//! # quire-core
//!
//! Shared vocabulary for the quire page composer.
//!
//! - **Assets**: [`AssetDescriptor`] records emitted during finalization
//! - **Cache**: [`CachePayload`] and the [`CacheAdapter`] collaborator contract
//! - **Fetch**: [`FetchRequest`] operation handles and [`FetchResult`] outcomes
//! - **Modules**: the [`Module`] capability trait and its [`ModuleData`] round result
//! - **Diagnostics**: the non-fatal error taxonomy surfaced by a render
//! - **Logging**: `tracing` subscriber setup and test capture helpers

#![deny(unsafe_code)]

pub mod asset;
pub mod cache;
pub mod diagnostics;
pub mod fetch;
pub mod logging;
pub mod module;

pub use asset::{AssetDescriptor, AssetKind};
pub use cache::{CacheAdapter, CacheError, CachePayload};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use fetch::{FetchError, FetchRequest, FetchResult, Method, RequestBody};
pub use module::{
    Module, ModuleCache, ModuleContext, ModuleData, ModuleError, ModuleInit, value_to_text,
};
