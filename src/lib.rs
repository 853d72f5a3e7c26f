//! Grabber - capture browser network activity into HAR traces
//!
//! Events stream in from an instrumented browsing session, their bodies are
//! resolved in the background, and a consistent trace document is assembled
//! on demand.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod export;
pub mod har;
pub mod logging;
pub mod recording;
pub mod replay;
pub mod resolver;
pub mod source;

pub use error::{GrabberError, ResolveError, Result};
