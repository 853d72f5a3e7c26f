//! Recording session state

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::Value;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::ResolveError;
use crate::source::{NetworkEvent, PageSnapshot};

use super::event::{CapturedEvent, EventId};
use super::pages::PageRegistry;

/// Everything captured between one `start()` and the next
///
/// The log only grows. Each session owns its own log and registry, so a
/// new session never sees writes meant for an old one.
pub struct RecordingSession {
    id: u64,
    log: RwLock<Vec<Arc<CapturedEvent>>>,
    pages: PageRegistry,
    browser: RwLock<Option<Value>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    page_syncs: watch::Sender<usize>,
    created_at: SystemTime,
}

/// A page snapshot in flight; the session counts it until dropped
pub(crate) struct PageSync {
    session: Arc<RecordingSession>,
}

impl PageSync {
    pub(crate) fn session(&self) -> &RecordingSession {
        &self.session
    }
}

impl Drop for PageSync {
    fn drop(&mut self) {
        self.session
            .page_syncs
            .send_modify(|pending| *pending = pending.saturating_sub(1));
    }
}

impl RecordingSession {
    /// Create an empty session
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            log: RwLock::new(Vec::new()),
            pages: PageRegistry::new(),
            browser: RwLock::new(None),
            tasks: Mutex::new(Vec::new()),
            page_syncs: watch::channel(0).0,
            created_at: SystemTime::now(),
        }
    }

    /// Session number, increasing across the recorder's lifetime
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get session age
    #[must_use]
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.created_at)
            .unwrap_or_default()
    }

    /// Append an event to the log and return its captured form
    pub async fn append(&self, event: NetworkEvent) -> Arc<CapturedEvent> {
        let mut log = self.log.write().await;
        let captured = Arc::new(CapturedEvent::new(EventId(log.len() as u64), event));
        log.push(Arc::clone(&captured));
        captured
    }

    /// Keep a resolution task so the session can cancel it
    pub(crate) async fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Count a page snapshot as in flight until the returned guard drops
    pub(crate) fn begin_page_sync(self: &Arc<Self>) -> PageSync {
        self.page_syncs.send_modify(|pending| *pending += 1);
        PageSync {
            session: Arc::clone(self),
        }
    }

    /// Wait up to `limit` for in-flight page snapshots to land
    ///
    /// Returns `false` if some were still outstanding at the deadline.
    pub async fn pages_synced(&self, limit: Duration) -> bool {
        let mut rx = self.page_syncs.subscribe();
        let synced = matches!(
            tokio::time::timeout(limit, rx.wait_for(|pending| *pending == 0)).await,
            Ok(Ok(_))
        );
        synced
    }

    /// Copy of the log in arrival order
    pub async fn events(&self) -> Vec<Arc<CapturedEvent>> {
        self.log.read().await.clone()
    }

    /// Number of captured events
    pub async fn len(&self) -> usize {
        self.log.read().await.len()
    }

    /// Whether nothing has been captured
    pub async fn is_empty(&self) -> bool {
        self.log.read().await.is_empty()
    }

    /// Number of events whose content has not settled
    pub async fn pending_count(&self) -> usize {
        self.log
            .read()
            .await
            .iter()
            .filter(|event| !event.content_state().is_settled())
            .count()
    }

    /// Page metadata seen so far
    #[must_use]
    pub fn pages(&self) -> &PageRegistry {
        &self.pages
    }

    /// Latest browser identity reported with a page snapshot
    pub async fn browser(&self) -> Option<Value> {
        self.browser.read().await.clone()
    }

    /// Fold a page snapshot into the session
    pub async fn apply_snapshot(&self, snapshot: PageSnapshot) {
        let added = self.pages.merge(snapshot.pages);
        if added > 0 {
            debug!(
                "Session {}: {} new page(s), {} total (source HAR {})",
                self.id,
                added,
                self.pages.len(),
                snapshot.version
            );
        }

        if snapshot.browser.is_some() {
            *self.browser.write().await = snapshot.browser;
        }
    }

    /// Abort outstanding resolution work and mark unsettled events cancelled
    pub async fn discard(&self) {
        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        let aborted = tasks.iter().filter(|task| !task.is_finished()).count();
        for task in tasks {
            task.abort();
        }

        let cancelled = self
            .log
            .read()
            .await
            .iter()
            .filter(|event| event.settle(Err(ResolveError::Cancelled)))
            .count();

        info!(
            "Discarded session {}: {} task(s) aborted, {} event(s) cancelled",
            self.id, aborted, cancelled
        );
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::BoxError;
    use crate::har::tests::entry;
    use crate::har::{Page, PageTimings};
    use crate::recording::ContentState;
    use crate::source::{Body, FetchContent};

    struct Never;

    #[async_trait]
    impl FetchContent for Never {
        async fn fetch_content(&self) -> Result<Body, BoxError> {
            std::future::pending().await
        }
    }

    fn event(url: &str) -> NetworkEvent {
        NetworkEvent::new(entry(url), Arc::new(Never))
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let session = RecordingSession::new(1);

        for i in 0..5 {
            let captured = session.append(event(&format!("https://example.com/{i}"))).await;
            assert_eq!(captured.id(), EventId(i));
        }

        let urls: Vec<_> = session
            .events()
            .await
            .iter()
            .map(|e| e.url().to_string())
            .collect();
        assert_eq!(urls.len(), 5);
        assert_eq!(urls[0], "https://example.com/0");
        assert_eq!(urls[4], "https://example.com/4");
    }

    #[tokio::test]
    async fn test_apply_snapshot_keeps_last_browser() {
        let session = RecordingSession::new(1);
        let page = Page {
            started_date_time: "2024-01-01T00:00:00.000Z".to_string(),
            id: "page_1".to_string(),
            title: "Example".to_string(),
            page_timings: PageTimings::default(),
        };

        session
            .apply_snapshot(PageSnapshot {
                version: "1.2".to_string(),
                browser: Some(serde_json::json!({"name": "WebInspector", "version": "537.36"})),
                pages: vec![page.clone()],
            })
            .await;
        session
            .apply_snapshot(PageSnapshot {
                version: "1.2".to_string(),
                browser: None,
                pages: vec![page],
            })
            .await;

        assert_eq!(session.pages().len(), 1);
        assert_eq!(session.browser().await.unwrap()["name"], "WebInspector");
    }

    #[tokio::test]
    async fn test_pages_synced_waits_for_guards() {
        let session = Arc::new(RecordingSession::new(1));
        assert!(session.pages_synced(Duration::from_millis(10)).await);

        let sync = session.begin_page_sync();
        assert!(!session.pages_synced(Duration::from_millis(10)).await);

        let waiter = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.pages_synced(Duration::from_secs(5)).await }
        });
        drop(sync);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_discard_cancels_pending() {
        let session = RecordingSession::new(1);
        let captured = session.append(event("https://example.com/")).await;
        let task_event = Arc::clone(&captured);
        let handle = tokio::spawn(async move {
            let outcome = task_event
                .fetcher()
                .fetch_content()
                .await
                .map_err(|e| ResolveError::retrieval("https://example.com/", e));
            task_event.settle(outcome);
        });
        session.track(handle).await;

        assert_eq!(session.pending_count().await, 1);
        session.discard().await;

        assert_eq!(session.pending_count().await, 0);
        assert!(matches!(
            captured.content_state(),
            ContentState::Failed(ResolveError::Cancelled)
        ));
    }
}
