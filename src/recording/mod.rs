//! Capture of network events into recording sessions

mod event;
mod pages;
mod recorder;
mod session;

pub use event::{CapturedEvent, ContentState, EventId};
pub use pages::PageRegistry;
pub use recorder::EventRecorder;
pub use session::RecordingSession;
