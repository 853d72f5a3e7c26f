//! Body content retrieval for captured events
//!
//! Responses fetched live expose their body through the event's own fetch
//! path. Cache-served responses do not do so reliably, so their body is
//! looked up among the resources currently loaded in the inspected page.
//! The strategy is picked once per event and a failure never falls through
//! to the other one.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::har::Entry;
use crate::recording::CapturedEvent;
use crate::source::{Body, ResourceSource};

/// How an event's body is retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    /// Ask the event's own content-fetch path
    DirectFetch,
    /// Find the loaded resource with the same URL and fetch its content
    CacheLookup,
}

impl RetrievalStrategy {
    /// Pick the strategy for a captured entry
    #[must_use]
    pub fn for_entry(entry: &Entry) -> Self {
        if entry.is_from_cache() {
            Self::CacheLookup
        } else {
            Self::DirectFetch
        }
    }
}

/// Resolves and attaches body content to captured events
pub struct ContentResolver {
    resources: Arc<dyn ResourceSource>,
}

impl ContentResolver {
    /// Create a resolver backed by `resources` for cache-served responses
    #[must_use]
    pub fn new(resources: Arc<dyn ResourceSource>) -> Self {
        Self { resources }
    }

    /// Retrieve the body for `event` without touching its state
    ///
    /// # Errors
    ///
    /// Returns `ContentUnavailable` when a cache-served event matches no
    /// loaded resource, `ContentRetrieval` when a fetch fails
    pub async fn retrieve(&self, event: &CapturedEvent) -> Result<Body, ResolveError> {
        match RetrievalStrategy::for_entry(event.entry()) {
            RetrievalStrategy::DirectFetch => event
                .fetcher()
                .fetch_content()
                .await
                .map_err(|cause| ResolveError::retrieval(event.url(), cause)),
            RetrievalStrategy::CacheLookup => self.lookup_cached(event.url()).await,
        }
    }

    /// Retrieve the body for `event` and attach the outcome to it
    ///
    /// # Errors
    ///
    /// Returns the retrieval failure after recording it on the event
    pub async fn resolve(&self, event: &CapturedEvent) -> Result<(), ResolveError> {
        let outcome = self.retrieve(event).await;
        Self::settle(event, outcome)
    }

    /// Attach a retrieval outcome to `event`
    ///
    /// # Errors
    ///
    /// Returns the failure after recording it on the event
    pub fn settle(
        event: &CapturedEvent,
        outcome: Result<Body, ResolveError>,
    ) -> Result<(), ResolveError> {
        let failure = outcome.as_ref().err().cloned();

        match &outcome {
            Ok(body) => debug!(
                "Resolved {} {} ({} bytes)",
                event.id(),
                event.url(),
                body.text.len()
            ),
            Err(err) => warn!("No content for {}: {}", event.id(), err),
        }

        if !event.settle(outcome) {
            debug!("Event {} already settled, outcome dropped", event.id());
        }

        failure.map_or(Ok(()), Err)
    }

    async fn lookup_cached(&self, url: &str) -> Result<Body, ResolveError> {
        let resources = self
            .resources
            .resources()
            .await
            .map_err(|cause| ResolveError::retrieval(url, cause))?;

        let resource = resources
            .into_iter()
            .find(|resource| resource.url == url)
            .ok_or_else(|| ResolveError::ContentUnavailable {
                url: url.to_string(),
            })?;

        resource
            .content
            .fetch_content()
            .await
            .map_err(|cause| ResolveError::retrieval(url, cause))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::BoxError;
    use crate::har::tests::entry;
    use crate::recording::{ContentState, EventId};
    use crate::source::{FetchContent, NetworkEvent, Resource};

    struct Fixed(Result<&'static str, &'static str>);

    #[async_trait]
    impl FetchContent for Fixed {
        async fn fetch_content(&self) -> Result<Body, BoxError> {
            self.0.map(Body::text).map_err(Into::into)
        }
    }

    #[derive(Default)]
    struct Loaded {
        resources: Vec<(&'static str, &'static str)>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ResourceSource for Loaded {
        async fn resources(&self) -> Result<Vec<Resource>, BoxError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(self
                .resources
                .iter()
                .map(|(url, body)| Resource {
                    url: (*url).to_string(),
                    content: Arc::new(Fixed(Ok(*body))),
                })
                .collect())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl ResourceSource for Unreachable {
        async fn resources(&self) -> Result<Vec<Resource>, BoxError> {
            Err("inspected page navigated away".into())
        }
    }

    fn captured(
        url: &str,
        from_cache: bool,
        direct: Result<&'static str, &'static str>,
    ) -> CapturedEvent {
        let mut entry = entry(url);
        if from_cache {
            entry.from_cache = Some("memory".to_string());
        }
        CapturedEvent::new(EventId(0), NetworkEvent::new(entry, Arc::new(Fixed(direct))))
    }

    #[test]
    fn test_strategy_selection() {
        let mut cached = entry("https://example.com/");
        cached.from_cache = Some("disk".to_string());

        assert_eq!(
            RetrievalStrategy::for_entry(&entry("https://example.com/")),
            RetrievalStrategy::DirectFetch
        );
        assert_eq!(RetrievalStrategy::for_entry(&cached), RetrievalStrategy::CacheLookup);
    }

    #[tokio::test]
    async fn test_direct_fetch() {
        let resources = Arc::new(Loaded::default());
        let resolver = ContentResolver::new(resources.clone());
        let event = captured("https://example.com/", false, Ok("hello"));

        resolver.resolve(&event).await.unwrap();

        assert_eq!(event.to_entry().response.content.text.as_deref(), Some("hello"));
        assert_eq!(resources.calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_direct_fetch_failure_does_not_fall_back() {
        let resources = Arc::new(Loaded {
            resources: vec![("https://example.com/", "cached-body")],
            ..Loaded::default()
        });
        let resolver = ContentResolver::new(resources.clone());
        let event = captured("https://example.com/", false, Err("connection reset"));

        let err = resolver.resolve(&event).await.unwrap_err();

        assert!(matches!(err, ResolveError::ContentRetrieval { .. }));
        assert!(matches!(event.content_state(), ContentState::Failed(_)));
        assert_eq!(resources.calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_cache_lookup_matches_url() {
        let resolver = ContentResolver::new(Arc::new(Loaded {
            resources: vec![
                ("https://example.com/other.js", "nope"),
                ("https://example.com/app.js", "cached-body"),
            ],
            ..Loaded::default()
        }));
        let event = captured("https://example.com/app.js", true, Err("not available"));

        resolver.resolve(&event).await.unwrap();

        assert_eq!(
            event.to_entry().response.content.text.as_deref(),
            Some("cached-body")
        );
    }

    #[tokio::test]
    async fn test_cache_lookup_without_match() {
        let resolver = ContentResolver::new(Arc::new(Loaded::default()));
        let event = captured("https://example.com/gone.css", true, Ok("never used"));

        let err = resolver.resolve(&event).await.unwrap_err();

        assert!(matches!(err, ResolveError::ContentUnavailable { .. }));
        assert!(event.to_entry().response.content.text.is_none());
    }

    #[tokio::test]
    async fn test_cache_lookup_listing_failure() {
        let resolver = ContentResolver::new(Arc::new(Unreachable));
        let event = captured("https://example.com/app.js", true, Ok("never used"));

        let err = resolver.resolve(&event).await.unwrap_err();

        assert!(matches!(
            err,
            ResolveError::ContentRetrieval { ref url, .. } if url == "https://example.com/app.js"
        ));
        assert!(matches!(event.content_state(), ContentState::Failed(_)));
        assert!(event.to_entry().response.content.text.is_none());
    }
}
