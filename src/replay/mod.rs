//! Replay lookup over exported traces

mod index;

pub use index::{IndexStats, ReplayResponse, TraceIndex};
