//! `eggtrack` - Egg label tracking with sequential ids and QR labels
//!
//! This library provides the entry store over pluggable blob backends, the
//! sequential egg id allocator, webhook intake, label rendering and the HTTP
//! facade served by the `eggtrack` binary.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod allocator;
pub mod cli;
pub mod config;
pub mod entry;
pub mod error;
pub mod http;
pub mod ingest;
pub mod logging;
pub mod render;
pub mod storage;
pub mod view;

pub use config::Config;
pub use entry::Entry;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use storage::{AppendOutcome, EntryStore, StoreStats};
