//! Captured events and their content state

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::ResolveError;
use crate::har::Entry;
use crate::source::{Body, FetchContent, NetworkEvent};

/// Position of an event in its session's log
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where an event's body content stands
#[derive(Debug, Clone)]
pub enum ContentState {
    /// Retrieval still running
    Pending,
    /// Body attached
    Resolved(Body),
    /// Retrieval gave up; the entry is exported without text
    Failed(ResolveError),
}

impl ContentState {
    /// Whether retrieval has finished one way or the other
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// The attached body, if any
    #[must_use]
    pub fn body(&self) -> Option<&Body> {
        match self {
            Self::Resolved(body) => Some(body),
            _ => None,
        }
    }
}

/// One recorded network event
///
/// The metadata never changes after capture. The content state moves out of
/// `Pending` exactly once.
pub struct CapturedEvent {
    id: EventId,
    entry: Entry,
    fetcher: Arc<dyn FetchContent>,
    content: watch::Sender<ContentState>,
}

impl CapturedEvent {
    pub(crate) fn new(id: EventId, event: NetworkEvent) -> Self {
        let (content, _) = watch::channel(ContentState::Pending);
        Self {
            id,
            entry: event.entry,
            fetcher: event.content,
            content,
        }
    }

    /// Log position
    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Captured metadata, without resolved content
    #[must_use]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Request URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.entry.request.url
    }

    /// Whether the browser served this response from its cache
    #[must_use]
    pub fn is_from_cache(&self) -> bool {
        self.entry.is_from_cache()
    }

    pub(crate) fn fetcher(&self) -> &dyn FetchContent {
        self.fetcher.as_ref()
    }

    /// Current content state
    #[must_use]
    pub fn content_state(&self) -> ContentState {
        self.content.borrow().clone()
    }

    /// Move out of `Pending`; returns `false` if already settled
    pub(crate) fn settle(&self, outcome: Result<Body, ResolveError>) -> bool {
        self.content.send_if_modified(|state| {
            if state.is_settled() {
                return false;
            }
            *state = match outcome {
                Ok(body) => ContentState::Resolved(body),
                Err(err) => ContentState::Failed(err),
            };
            true
        })
    }

    /// Wait up to `limit` for the content state to settle
    ///
    /// Does not change the state: a timed-out event stays pending and may
    /// still resolve later.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionTimeout` if `limit` elapses first
    pub async fn settled(&self, limit: Duration) -> Result<ContentState, ResolveError> {
        let mut rx = self.content.subscribe();
        let state = match tokio::time::timeout(limit, rx.wait_for(ContentState::is_settled)).await
        {
            Ok(Ok(state)) => Ok(state.clone()),
            Ok(Err(_)) => Err(ResolveError::Cancelled),
            Err(_) => Err(ResolveError::ResolutionTimeout(limit)),
        };
        state
    }

    /// The HAR entry for this event with `state`'s body attached
    #[must_use]
    pub fn entry_with(&self, state: &ContentState) -> Entry {
        let mut entry = self.entry.clone();
        if let Some(body) = state.body() {
            entry.response.content.text = Some(body.text.clone());
            if body.encoding.is_some() {
                entry.response.content.encoding.clone_from(&body.encoding);
            }
        }
        entry
    }

    /// The HAR entry for this event as it stands now
    #[must_use]
    pub fn to_entry(&self) -> Entry {
        self.entry_with(&self.content.borrow())
    }
}

impl fmt::Debug for CapturedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedEvent")
            .field("id", &self.id)
            .field("url", &self.entry.request.url)
            .field("content", &*self.content.borrow())
            .finish_non_exhaustive()
    }
}
