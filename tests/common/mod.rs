//! Browser collaborator doubles shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};

use grabber::config::Config;
use grabber::error::BoxError;
use grabber::har::{Content, Entry, Header, Page, PageTimings, Request, Response, Timings};
use grabber::recording::EventRecorder;
use grabber::source::{
    Body, ChannelEventSource, Collaborators, FetchContent, NetworkEvent, PageSnapshot, PageSource,
    Resource, ResourceSource,
};

/// Content fetch with a fixed outcome after an optional delay
pub struct Fetch {
    outcome: Result<Body, String>,
    delay: Duration,
}

impl Fetch {
    pub fn ok(text: &str) -> Arc<Self> {
        Self::delayed(text, Duration::ZERO)
    }

    pub fn delayed(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(Body::text(text)),
            delay,
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(message.to_string()),
            delay: Duration::ZERO,
        })
    }
}

#[async_trait]
impl FetchContent for Fetch {
    async fn fetch_content(&self) -> Result<Body, BoxError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone().map_err(Into::into)
    }
}

/// Content fetch that never completes
pub struct Hang;

#[async_trait]
impl FetchContent for Hang {
    async fn fetch_content(&self) -> Result<Body, BoxError> {
        std::future::pending().await
    }
}

/// Page snapshot source whose page set tests can change
#[derive(Default)]
pub struct Pages {
    pages: DashMap<String, Page>,
    pub snapshots: AtomicUsize,
}

impl Pages {
    pub fn set(&self, id: &str, title: &str) {
        self.pages.insert(id.to_string(), page(id, title));
    }
}

#[async_trait]
impl PageSource for Pages {
    async fn page_snapshot(&self) -> Result<PageSnapshot, BoxError> {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
        Ok(PageSnapshot {
            version: "1.2".to_string(),
            browser: Some(browser()),
            pages: self.pages.iter().map(|p| p.value().clone()).collect(),
        })
    }
}

/// Loaded-resource listing whose contents tests can change
#[derive(Default)]
pub struct Resources {
    resources: DashMap<String, String>,
}

impl Resources {
    pub fn set(&self, url: &str, body: &str) {
        self.resources.insert(url.to_string(), body.to_string());
    }
}

#[async_trait]
impl ResourceSource for Resources {
    async fn resources(&self) -> Result<Vec<Resource>, BoxError> {
        Ok(self
            .resources
            .iter()
            .map(|r| Resource {
                url: r.key().clone(),
                content: Fetch::ok(r.value()),
            })
            .collect())
    }
}

pub struct Harness {
    pub recorder: EventRecorder,
    pub events: Arc<ChannelEventSource>,
    pub pages: Arc<Pages>,
    pub resources: Arc<Resources>,
}

pub fn harness(settle_timeout_ms: u64) -> Harness {
    let events = Arc::new(ChannelEventSource::new());
    let pages = Arc::new(Pages::default());
    let resources = Arc::new(Resources::default());

    let mut config = Config::default();
    config.export.settle_timeout_ms = settle_timeout_ms;

    let recorder = EventRecorder::new(
        Collaborators {
            events: events.clone(),
            pages: pages.clone(),
            resources: resources.clone(),
        },
        config,
    );

    Harness {
        recorder,
        events,
        pages,
        resources,
    }
}

pub fn browser() -> Value {
    json!({"name": "WebInspector", "version": "537.36"})
}

pub fn page(id: &str, title: &str) -> Page {
    Page {
        started_date_time: "2024-01-01T00:00:00.000Z".to_string(),
        id: id.to_string(),
        title: title.to_string(),
        page_timings: PageTimings {
            on_content_load: 120.0,
            on_load: 250.0,
        },
    }
}

pub fn entry(url: &str, from_cache: bool) -> Entry {
    Entry {
        pageref: Some("page_1".to_string()),
        started_date_time: "2024-01-01T00:00:00.100Z".to_string(),
        time: 42.0,
        request: Request {
            method: "GET".to_string(),
            url: url.to_string(),
            http_version: "HTTP/1.1".to_string(),
            headers: vec![Header::new("Accept", "*/*")],
            query_string: vec![],
            cookies: vec![],
            headers_size: -1,
            body_size: 0,
            post_data: None,
        },
        response: Response {
            status: 200,
            status_text: "OK".to_string(),
            http_version: "HTTP/1.1".to_string(),
            headers: vec![Header::new("Content-Type", "text/plain")],
            cookies: vec![],
            content: Content {
                size: 0,
                mime_type: "text/plain".to_string(),
                text: None,
                encoding: None,
            },
            redirect_url: String::new(),
            headers_size: -1,
            body_size: -1,
        },
        cache: json!({}),
        timings: Timings::default(),
        server_ip_address: None,
        connection: None,
        from_cache: from_cache.then(|| "memory".to_string()),
    }
}

pub fn direct(url: &str, content: Arc<dyn FetchContent>) -> NetworkEvent {
    NetworkEvent::new(entry(url, false), content)
}

pub fn cached(url: &str) -> NetworkEvent {
    NetworkEvent::new(entry(url, true), Arc::new(Hang))
}
