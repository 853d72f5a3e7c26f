//! Browser-side collaborators
//!
//! The recorder never talks to a browser directly. Whatever instruments the
//! browsing session (a devtools bridge, a CDP client, a test double) plugs in
//! through these traits.

mod channel;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::BoxError;
use crate::har::{Entry, Page};

pub use channel::ChannelEventSource;

/// Body text as returned by a content fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    /// Body text (base64 when `encoding` says so)
    pub text: String,
    /// Non-default content encoding
    pub encoding: Option<String>,
}

impl Body {
    /// Build a body; an empty encoding is treated as the default
    pub fn new(text: impl Into<String>, encoding: Option<String>) -> Self {
        Self {
            text: text.into(),
            encoding: encoding.filter(|e| !e.is_empty()),
        }
    }

    /// Plain-text body
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, None)
    }
}

/// Something that can produce a response body on demand
#[async_trait]
pub trait FetchContent: Send + Sync {
    /// Fetch the body
    ///
    /// # Errors
    ///
    /// Returns the collaborator's failure unchanged
    async fn fetch_content(&self) -> Result<Body, BoxError>;
}

/// A finished network request as delivered by the browser
#[derive(Clone)]
pub struct NetworkEvent {
    /// Request/response metadata; `response.content.text` is normally absent
    pub entry: Entry,
    /// Direct content-fetch path for this request
    pub content: Arc<dyn FetchContent>,
}

impl NetworkEvent {
    /// Pair an entry with its content fetcher
    pub fn new(entry: Entry, content: Arc<dyn FetchContent>) -> Self {
        Self { entry, content }
    }
}

impl fmt::Debug for NetworkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkEvent")
            .field("method", &self.entry.request.method)
            .field("url", &self.entry.request.url)
            .field("from_cache", &self.entry.from_cache)
            .finish_non_exhaustive()
    }
}

/// Live "network request finished" notifications
///
/// Dropping the returned receiver unsubscribes.
pub trait EventSource: Send + Sync {
    /// Subscribe with a bounded buffer of `capacity` events
    fn subscribe(&self, capacity: usize) -> mpsc::Receiver<NetworkEvent>;
}

/// Browser-side view of the current trace metadata
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    /// Format version reported by the browser
    pub version: String,
    /// Browser identity, kept opaque
    pub browser: Option<Value>,
    /// Pages known so far
    pub pages: Vec<Page>,
}

/// On-demand page metadata
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Take a snapshot of the currently known pages
    ///
    /// # Errors
    ///
    /// Returns the collaborator's failure unchanged
    async fn page_snapshot(&self) -> Result<PageSnapshot, BoxError>;
}

/// A resource currently loaded in the inspected page
#[derive(Clone)]
pub struct Resource {
    /// Resource URL
    pub url: String,
    /// Content-fetch path for this resource
    pub content: Arc<dyn FetchContent>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// On-demand listing of loaded resources
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// List the resources loaded right now
    ///
    /// # Errors
    ///
    /// Returns the collaborator's failure unchanged
    async fn resources(&self) -> Result<Vec<Resource>, BoxError>;
}

/// The three browser-side collaborators the recorder needs
#[derive(Clone)]
pub struct Collaborators {
    /// Event subscription
    pub events: Arc<dyn EventSource>,
    /// Page metadata
    pub pages: Arc<dyn PageSource>,
    /// Loaded resources, used for cache-served responses
    pub resources: Arc<dyn ResourceSource>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_encoding_is_default() {
        assert_eq!(Body::new("abc", Some(String::new())).encoding, None);
        assert_eq!(
            Body::new("YWJj", Some("base64".to_string())).encoding.as_deref(),
            Some("base64")
        );
    }
}
