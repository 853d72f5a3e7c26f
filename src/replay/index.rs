//! URL index over recorded trace entries

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::engine::general_purpose::STANDARD as Base64;
use base64::Engine as _;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::config::ReplayConfig;
use crate::har::{Content, Entry, TraceDocument};
use crate::{GrabberError, Result};

/// Response rebuilt from a recorded entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayResponse {
    /// Response status code
    pub status: u16,
    /// Passthrough headers only
    pub headers: Vec<(String, String)>,
    /// Decoded response body
    pub body: Vec<u8>,
}

/// Index statistics
#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    /// Lookup hits
    pub hits: usize,
    /// Lookup misses
    pub misses: usize,
    /// Hit rate (0.0 to 1.0)
    pub hit_rate: f64,
    /// Number of distinct URLs
    pub size: usize,
}

/// Recorded entries keyed by request URL
pub struct TraceIndex {
    entries: DashMap<String, Entry>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    config: ReplayConfig,
}

impl TraceIndex {
    /// Create an empty index
    #[must_use]
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            config,
        }
    }

    /// Create an index over one document
    #[must_use]
    pub fn from_document(document: &TraceDocument, config: ReplayConfig) -> Self {
        let index = Self::new(config);
        index.load_document(document);
        index
    }

    /// Add every entry of `document`; later entries win for a repeated URL
    ///
    /// Returns the number of entries read.
    pub fn load_document(&self, document: &TraceDocument) -> usize {
        for entry in &document.log.entries {
            self.entries.insert(entry.request.url.clone(), entry.clone());
        }
        debug!(
            "Indexed {} entries ({} distinct URLs)",
            document.log.entries.len(),
            self.entries.len()
        );
        document.log.entries.len()
    }

    /// Load a `.har` file into the index
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load_file(&self, path: &Path) -> Result<usize> {
        let document = TraceDocument::from_file(path)?;
        let count = self.load_document(&document);
        info!("Loaded trace '{}': {} entries", path.display(), count);
        Ok(count)
    }

    /// Find the recorded entry for `url`
    ///
    /// Falls back to the `https://` form of an `http://` URL when enabled.
    #[must_use]
    pub fn find_entry(&self, url: &str) -> Option<Entry> {
        let found = self.entries.get(url).map(|entry| entry.value().clone()).or_else(|| {
            let rest = url.strip_prefix("http://")?;
            if !self.config.upgrade_http {
                return None;
            }
            let upgraded = format!("https://{rest}");
            self.entries.get(&upgraded).map(|entry| entry.value().clone())
        });

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Rebuild the recorded response for `url`
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` on a miss, `InvalidDocument` if the recorded
    /// body cannot be decoded
    pub fn lookup(&self, url: &str) -> Result<ReplayResponse> {
        let Some(entry) = self.find_entry(url) else {
            warn!("No recorded entry for {}", url);
            return Err(GrabberError::EntryNotFound(url.to_string()));
        };
        debug!("Matched {} -> {}", url, entry.request.url);

        let headers = entry
            .response
            .headers
            .iter()
            .filter(|header| {
                self.config
                    .passthrough_headers
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(&header.name))
            })
            .map(|header| (header.name.clone(), header.value.clone()))
            .collect();

        Ok(ReplayResponse {
            status: entry.response.status,
            headers,
            body: decode_body(&entry.response.content)?,
        })
    }

    /// Get index hit count
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get index miss count
    #[must_use]
    pub fn miss_count(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get hit rate (0.0 to 1.0)
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hit_count();
        let total = hits + self.miss_count();

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Number of distinct URLs
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Get index statistics
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            hits: self.hit_count(),
            misses: self.miss_count(),
            hit_rate: self.hit_rate(),
            size: self.size(),
        }
    }

    /// Clear entries and counters
    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Recorded body as bytes; a missing body is empty
fn decode_body(content: &Content) -> Result<Vec<u8>> {
    let Some(text) = &content.text else {
        return Ok(Vec::new());
    };

    match content.encoding.as_deref() {
        Some("base64") => Base64
            .decode(text.trim())
            .map_err(|e| GrabberError::InvalidDocument(format!("Invalid base64 body: {e}"))),
        _ => Ok(text.as_bytes().to_vec()),
    }
}
