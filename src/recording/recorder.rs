//! Event recorder driving capture sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::export::TraceAssembler;
use crate::har::TraceDocument;
use crate::resolver::ContentResolver;
use crate::source::{Collaborators, NetworkEvent, PageSource};

use super::event::EventId;
use super::session::RecordingSession;

/// Routes events of one session to its log, registry and resolver
#[derive(Clone)]
struct Dispatcher {
    session: Arc<RecordingSession>,
    pages: Arc<dyn PageSource>,
    resolver: Arc<ContentResolver>,
}

impl Dispatcher {
    async fn dispatch(&self, event: NetworkEvent) -> EventId {
        let captured = self.session.append(event).await;
        let id = captured.id();

        debug!(
            "Captured {} {} {} (session {})",
            id,
            captured.entry().request.method,
            captured.url(),
            self.session.id()
        );

        let page_sync = self.session.begin_page_sync();
        let pages = Arc::clone(&self.pages);
        let resolver = Arc::clone(&self.resolver);

        let handle = tokio::spawn(async move {
            let sync_pages = async move {
                match pages.page_snapshot().await {
                    Ok(snapshot) => page_sync.session().apply_snapshot(snapshot).await,
                    Err(e) => warn!("Page snapshot failed for {}: {}", id, e),
                }
            };
            let resolve = async {
                let outcome = resolver.retrieve(&captured).await;
                ContentResolver::settle(&captured, outcome).ok();
            };

            tokio::join!(resolve, sync_pages);
        });

        self.session.track(handle).await;
        id
    }
}

struct ActiveCapture {
    shutdown_tx: oneshot::Sender<()>,
    pump: JoinHandle<()>,
}

/// Records network events into sessions
///
/// `start()` opens a fresh session and subscribes to the event source,
/// `stop()` unsubscribes. The last session stays available for export until
/// the next `start()`.
pub struct EventRecorder {
    collaborators: Collaborators,
    resolver: Arc<ContentResolver>,
    config: Config,
    session: RwLock<Arc<RecordingSession>>,
    active: Mutex<Option<ActiveCapture>>,
    next_session_id: AtomicU64,
}

impl EventRecorder {
    /// Create an idle recorder
    #[must_use]
    pub fn new(collaborators: Collaborators, config: Config) -> Self {
        let resolver = Arc::new(ContentResolver::new(Arc::clone(&collaborators.resources)));

        Self {
            collaborators,
            resolver,
            config,
            session: RwLock::new(Arc::new(RecordingSession::new(0))),
            active: Mutex::new(None),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Begin a new session; a no-op while already recording
    ///
    /// Returns `true` if a session was started.
    pub async fn start(&self) -> bool {
        let mut active = self.active.lock().await;
        if active.is_some() {
            debug!("start() ignored: already recording");
            return false;
        }

        let session = Arc::new(RecordingSession::new(
            self.next_session_id.fetch_add(1, Ordering::Relaxed),
        ));
        let previous = std::mem::replace(&mut *self.session.write().await, Arc::clone(&session));
        previous.discard().await;

        let events = self
            .collaborators
            .events
            .subscribe(self.config.recording.event_buffer);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let dispatcher = self.dispatcher(session.clone());
        let pump = tokio::spawn(pump_events(dispatcher, events, shutdown_rx));

        *active = Some(ActiveCapture { shutdown_tx, pump });
        info!("Recording session {} started", session.id());
        true
    }

    /// End the current session; a no-op while not recording
    ///
    /// Returns `true` if a session was stopped. Content resolution already
    /// under way keeps running so export can collect it.
    pub async fn stop(&self) -> bool {
        let Some(capture) = self.active.lock().await.take() else {
            debug!("stop() ignored: not recording");
            return false;
        };

        capture.shutdown_tx.send(()).ok();
        if let Err(e) = capture.pump.await {
            error!("Event pump failed: {}", e);
        }

        let session = self.session().await;
        info!(
            "Recording session {} stopped: {} event(s), {} pending",
            session.id(),
            session.len().await,
            session.pending_count().await
        );
        true
    }

    /// Whether a session is currently subscribed to events
    pub async fn is_recording(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Record one event into the active session
    ///
    /// Returns `None` when not recording.
    pub async fn on_event(&self, event: NetworkEvent) -> Option<EventId> {
        if !self.is_recording().await {
            debug!("Dropping event for {}: not recording", event.entry.request.url);
            return None;
        }
        let session = self.session().await;
        Some(self.dispatcher(session).dispatch(event).await)
    }

    /// The current (or most recently stopped) session
    pub async fn session(&self) -> Arc<RecordingSession> {
        Arc::clone(&*self.session.read().await)
    }

    /// Assembler over the current session
    pub async fn assembler(&self) -> TraceAssembler {
        TraceAssembler::new(self.session().await, &self.config.export)
    }

    /// Export the current session as a trace document
    pub async fn export(&self) -> TraceDocument {
        self.assembler().await.export().await
    }

    /// Export the current session and serialize it to `writer`
    ///
    /// Indentation follows `export.pretty`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn export_to<W: std::io::Write>(&self, writer: W) -> crate::Result<()> {
        let document = self.export().await;
        document.write_to(writer, self.config.export.pretty)?;
        info!("Exported {} entries", document.log.entries.len());
        Ok(())
    }

    fn dispatcher(&self, session: Arc<RecordingSession>) -> Dispatcher {
        Dispatcher {
            session,
            pages: Arc::clone(&self.collaborators.pages),
            resolver: Arc::clone(&self.resolver),
        }
    }
}

async fn pump_events(
    dispatcher: Dispatcher,
    mut events: mpsc::Receiver<NetworkEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                events.close();
                let mut drained = 0;
                while let Some(event) = events.recv().await {
                    dispatcher.dispatch(event).await;
                    drained += 1;
                }
                debug!(
                    "Event pump for session {} shutting down ({} buffered event(s) recorded)",
                    dispatcher.session.id(),
                    drained
                );
                break;
            }
            event = events.recv() => match event {
                Some(event) => {
                    dispatcher.dispatch(event).await;
                }
                None => {
                    warn!("Event source closed during session {}", dispatcher.session.id());
                    break;
                }
            }
        }
    }
}
