//! # quire-fetch
//!
//! Scatter-gather execution of outbound operations.
//!
//! - [`FetchScheduler`]: batch contract used by the page composer
//! - [`HttpScheduler`]: `reqwest`-backed implementation running every
//!   operation of a batch concurrently
//! - [`content`]: content-type normalization and response decoding

#![deny(unsafe_code)]

pub mod content;
pub mod http;
pub mod scheduler;
pub mod target;
mod xml;

pub use content::{ContentType, normalize_content_type, parse_body};
pub use http::{HttpScheduler, SchedulerConfig};
pub use scheduler::{Batch, BatchResults, FetchScheduler};
pub use target::build_url;
