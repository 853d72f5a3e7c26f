//! HAR 1.2 trace document model
//!
//! Field names follow the HTTP Archive format so an exported trace can be
//! opened by any HAR viewer and read back by [`crate::replay::TraceIndex`].

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{GrabberError, Result};

/// HAR format version written into every exported trace
pub const HAR_VERSION: &str = "1.2";

/// Tool name written into `log.creator`
pub const CREATOR_NAME: &str = "Grabber";

/// Tool version written into `log.creator`
pub const CREATOR_VERSION: &str = "1.0";

/// Top-level trace document (`{"log": {...}}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceDocument {
    /// The archive body
    pub log: TraceLog,
}

/// The `log` object of a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceLog {
    /// Format version
    pub version: String,
    /// Tool that produced the trace
    pub creator: Creator,
    /// Browser metadata, passed through as reported by the browser
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<Value>,
    /// Pages seen during the session
    #[serde(default)]
    pub pages: Vec<Page>,
    /// Entries in arrival order
    #[serde(default)]
    pub entries: Vec<Entry>,
}

/// Name and version of a producing tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    /// Tool name
    pub name: String,
    /// Tool version
    pub version: String,
}

impl Creator {
    /// Identity of this crate as a trace producer
    #[must_use]
    pub fn grabber() -> Self {
        Self {
            name: CREATOR_NAME.to_string(),
            version: CREATOR_VERSION.to_string(),
        }
    }
}

/// One navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Navigation start, ISO 8601
    pub started_date_time: String,
    /// Unique page identifier, referenced by `Entry::pageref`
    pub id: String,
    /// Page title (usually the URL while loading)
    pub title: String,
    /// Load milestones
    #[serde(default)]
    pub page_timings: PageTimings,
}

/// Page load milestones in milliseconds since `started_date_time`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTimings {
    /// `DOMContentLoaded` milestone, -1 if unknown
    #[serde(default = "unknown_timing")]
    pub on_content_load: f64,
    /// `load` milestone, -1 if unknown
    #[serde(default = "unknown_timing")]
    pub on_load: f64,
}

fn unknown_timing() -> f64 {
    -1.0
}

/// One completed request/response pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Owning page identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pageref: Option<String>,
    /// Request start, ISO 8601
    pub started_date_time: String,
    /// Total elapsed time in milliseconds
    pub time: f64,
    /// Request descriptor
    pub request: Request,
    /// Response descriptor
    pub response: Response,
    /// Cache usage, kept opaque
    #[serde(default)]
    pub cache: Value,
    /// Timing breakdown
    #[serde(default)]
    pub timings: Timings,
    /// Remote address
    #[serde(
        default,
        rename = "serverIPAddress",
        skip_serializing_if = "Option::is_none"
    )]
    pub server_ip_address: Option<String>,
    /// Connection identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    /// Browser cache marker (`"memory"` or `"disk"`) for cache-served responses
    #[serde(
        default,
        rename = "_fromCache",
        skip_serializing_if = "Option::is_none"
    )]
    pub from_cache: Option<String>,
}

impl Entry {
    /// Whether the response was served from the browser cache
    #[must_use]
    pub fn is_from_cache(&self) -> bool {
        self.from_cache.is_some()
    }
}

/// Request descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// HTTP method
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// Protocol version
    #[serde(default)]
    pub http_version: String,
    /// Request headers
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Parsed query string
    #[serde(default)]
    pub query_string: Vec<QueryParam>,
    /// Request cookies
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    /// Header block size, -1 if unknown
    #[serde(default = "unknown_size")]
    pub headers_size: i64,
    /// Body size, -1 if unknown
    #[serde(default = "unknown_size")]
    pub body_size: i64,
    /// Posted body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostData>,
}

/// Response descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Status code
    pub status: u16,
    /// Reason phrase
    #[serde(default)]
    pub status_text: String,
    /// Protocol version
    #[serde(default)]
    pub http_version: String,
    /// Response headers
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Response cookies
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    /// Body content
    #[serde(default)]
    pub content: Content,
    /// Location target for redirects
    #[serde(default, rename = "redirectURL")]
    pub redirect_url: String,
    /// Header block size, -1 if unknown
    #[serde(default = "unknown_size")]
    pub headers_size: i64,
    /// Body size on the wire, -1 if unknown
    #[serde(default = "unknown_size")]
    pub body_size: i64,
}

fn unknown_size() -> i64 {
    -1
}

/// Response body
///
/// `text` stays `None` when the body could not be retrieved, which is how a
/// consumer tells a gap apart from an empty body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// Decoded body size in bytes
    #[serde(default)]
    pub size: i64,
    /// MIME type
    #[serde(default)]
    pub mime_type: String,
    /// Body text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Encoding of `text`, e.g. `"base64"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// Name/value header pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name
    pub name: String,
    /// Header value
    pub value: String,
}

impl Header {
    /// Build a header pair
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Query string parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    /// Parameter name
    pub name: String,
    /// Parameter value
    pub value: String,
}

/// Cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Path attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Domain attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Expiry, ISO 8601
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    /// `HttpOnly` flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    /// `Secure` flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
}

/// Posted request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostData {
    /// MIME type of the body
    pub mime_type: String,
    /// Body text
    #[serde(default)]
    pub text: String,
}

/// Timing breakdown in milliseconds, -1 where not applicable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    /// Queueing
    pub blocked: f64,
    /// DNS resolution
    pub dns: f64,
    /// TLS handshake
    pub ssl: f64,
    /// TCP connect, including `ssl`
    pub connect: f64,
    /// Sending the request
    pub send: f64,
    /// Waiting for the first byte
    pub wait: f64,
    /// Reading the response
    pub receive: f64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            blocked: -1.0,
            dns: -1.0,
            ssl: -1.0,
            connect: -1.0,
            send: 0.0,
            wait: 0.0,
            receive: 0.0,
        }
    }
}

impl TraceDocument {
    /// Build a document stamped with this tool's version and creator
    #[must_use]
    pub fn new(browser: Option<Value>, pages: Vec<Page>, entries: Vec<Entry>) -> Self {
        Self {
            log: TraceLog {
                version: HAR_VERSION.to_string(),
                creator: Creator::grabber(),
                browser,
                pages,
                entries,
            },
        }
    }

    /// Serialize to compact JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the document to `writer`
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails
    pub fn write_to<W: Write>(&self, mut writer: W, pretty: bool) -> Result<()> {
        if pretty {
            serde_json::to_writer_pretty(&mut writer, self)?;
        } else {
            serde_json::to_writer(&mut writer, self)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Parse a document from JSON text
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a HAR document
    pub fn from_json(text: &str) -> Result<Self> {
        let document: Self = serde_json::from_str(text)?;
        document.validate()?;
        Ok(document)
    }

    /// Parse a document from a reader
    ///
    /// # Errors
    ///
    /// Returns error if the input is not a HAR document
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let document: Self = serde_json::from_reader(reader)?;
        document.validate()?;
        Ok(document)
    }

    /// Load a document from a `.har` file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Number of entries whose body text is missing
    #[must_use]
    pub fn missing_content_count(&self) -> usize {
        self.log
            .entries
            .iter()
            .filter(|entry| entry.response.content.text.is_none())
            .count()
    }

    fn validate(&self) -> Result<()> {
        if self.log.version.is_empty() {
            return Err(GrabberError::InvalidDocument(
                "log.version cannot be empty".to_string(),
            ));
        }

        for (i, entry) in self.log.entries.iter().enumerate() {
            if entry.request.url.is_empty() {
                return Err(GrabberError::InvalidDocument(format!(
                    "Entry {i}: request.url cannot be empty"
                )));
            }
        }

        Ok(())
    }
}
