//! Built-in module implementations.
//!
//! - [`text`]: static content, page keys, and assets from parameters
//! - [`remote`]: content fetched from a URL, optionally cached

pub mod remote;
pub mod text;

pub use remote::RemoteModule;
pub use text::TextModule;
