//! Trace assembly at export time

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::config::ExportConfig;
use crate::error::ResolveError;
use crate::har::TraceDocument;
use crate::recording::{ContentState, EventId, RecordingSession};

/// An event exported without content, and why
#[derive(Debug, Clone)]
pub struct ResolutionFailure {
    /// Event position in the log
    pub event: EventId,
    /// Request URL
    pub url: String,
    /// Reason the body is missing
    pub error: ResolveError,
}

/// Result of an assembly: the document plus its content gaps
#[derive(Debug, Clone)]
pub struct Assembly {
    /// The trace document
    pub document: TraceDocument,
    /// Entries whose body could not be attached, in log order
    pub failures: Vec<ResolutionFailure>,
}

/// Builds trace documents from a recording session
///
/// Reads only: assembling never changes the session, so assembling twice
/// with nothing new captured gives the same document.
pub struct TraceAssembler {
    session: Arc<RecordingSession>,
    settle_timeout: Duration,
}

impl TraceAssembler {
    /// Create an assembler using the configured settle timeout
    #[must_use]
    pub fn new(session: Arc<RecordingSession>, config: &ExportConfig) -> Self {
        Self::with_timeout(session, config.settle_timeout())
    }

    /// Create an assembler with an explicit per-event settle timeout
    #[must_use]
    pub fn with_timeout(session: Arc<RecordingSession>, settle_timeout: Duration) -> Self {
        Self {
            session,
            settle_timeout,
        }
    }

    /// Wait for every event to settle (or time out) and build the document
    pub async fn assemble(&self) -> Assembly {
        let events = self.session.events().await;

        let (states, pages_synced) = tokio::join!(
            join_all(events.iter().map(|event| event.settled(self.settle_timeout))),
            self.session.pages_synced(self.settle_timeout),
        );
        if !pages_synced {
            warn!(
                "Page snapshots still outstanding after {:?}, exporting pages seen so far",
                self.settle_timeout
            );
        }

        let mut entries = Vec::with_capacity(events.len());
        let mut failures = Vec::new();
        for (event, state) in events.iter().zip(states) {
            let state = state.unwrap_or_else(ContentState::Failed);
            if let ContentState::Failed(error) = &state {
                failures.push(ResolutionFailure {
                    event: event.id(),
                    url: event.url().to_string(),
                    error: error.clone(),
                });
            }
            entries.push(event.entry_with(&state));
        }

        let pages = self.session.pages().snapshot();
        let browser = self.session.browser().await;

        info!(
            "Assembled session {}: {} page(s), {} entries, {} without content",
            self.session.id(),
            pages.len(),
            entries.len(),
            failures.len()
        );

        Assembly {
            document: TraceDocument::new(browser, pages, entries),
            failures,
        }
    }

    /// Build the document, logging each content gap
    pub async fn export(&self) -> TraceDocument {
        let assembly = self.assemble().await;
        for failure in &assembly.failures {
            warn!(
                "Exporting {} {} without content: {}",
                failure.event, failure.url, failure.error
            );
        }
        assembly.document
    }
}
