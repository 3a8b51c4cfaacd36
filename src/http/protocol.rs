//! # HTTP Protocol
//!
//! Minimal HTTP/1.1 framing for the API facade plus the JSON body types.
//!
//! One request per connection:
//! - request head terminated by CRLF CRLF, at most 16 KiB
//! - body read by Content-Length, at most 1 MiB
//! - responses always carry `Connection: close`

use crate::core::{ReminderError, ReminderResult};
use crate::features::reminders::{Reminder, ReminderSpec, SchedulerStats};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

pub const MAX_HEADER_BYTES: usize = 16 * 1024;
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

const READ_CHUNK: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Peer closed the connection before sending anything
    #[error("connection closed")]
    ConnectionClosed,

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("request headers exceed 16384 bytes")]
    HeadersTooLarge,

    #[error("request body of {0} bytes exceeds 1048576 bytes")]
    BodyTooLarge(usize),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    pub fn status_code(&self) -> u16 {
        match self {
            ProtocolError::HeadersTooLarge | ProtocolError::BodyTooLarge(_) => 413,
            _ => 400,
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    /// Header names are lowercased
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: &str, path: &str, body: impl Into<Vec<u8>>) -> Self {
        HttpRequest {
            method: method.to_string(),
            path: path.to_string(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Read one request from the stream
pub async fn read_request<R>(reader: &mut R) -> Result<HttpRequest, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Err(ProtocolError::HeadersTooLarge);
        }

        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Err(ProtocolError::ConnectionClosed);
            }
            return Err(ProtocolError::Malformed(
                "connection closed before end of headers".to_string(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    if head_end > MAX_HEADER_BYTES {
        return Err(ProtocolError::HeadersTooLarge);
    }

    let head = std::str::from_utf8(&buf[..head_end])
        .map_err(|_| ProtocolError::Malformed("request head is not UTF-8".to_string()))?;
    let mut request = parse_head(head)?;

    if request
        .header("transfer-encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    {
        return Err(ProtocolError::Malformed(
            "chunked request bodies are not supported".to_string(),
        ));
    }

    let content_length = match request.header("content-length") {
        Some(value) => value.parse::<usize>().map_err(|_| {
            ProtocolError::Malformed(format!("invalid Content-Length '{value}'"))
        })?,
        None => 0,
    };
    if content_length > MAX_BODY_BYTES {
        return Err(ProtocolError::BodyTooLarge(content_length));
    }

    let mut body = buf.split_off(head_end + 4);
    while body.len() < content_length {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(ProtocolError::Malformed(format!(
                "body ended after {} of {content_length} bytes",
                body.len()
            )));
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);
    request.body = body;

    Ok(request)
}

fn parse_head(head: &str) -> Result<HttpRequest, ProtocolError> {
    let mut lines = head.split("\r\n");
    let request_line = lines
        .next()
        .ok_or_else(|| ProtocolError::Malformed("empty request".to_string()))?;

    let mut parts = request_line.split_whitespace();
    let (method, target, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v)) => (m, t, v),
        _ => {
            return Err(ProtocolError::Malformed(format!(
                "bad request line '{request_line}'"
            )))
        }
    };
    if !version.starts_with("HTTP/1.") {
        return Err(ProtocolError::Malformed(format!(
            "unsupported version '{version}'"
        )));
    }

    // Query strings are not used by any route
    let path = target.split_once('?').map_or(target, |(path, _)| path);

    let mut headers = Vec::new();
    for line in lines.filter(|l| !l.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ProtocolError::Malformed(format!("bad header line '{line}'")))?;
        headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
    }

    Ok(HttpRequest {
        method: method.to_ascii_uppercase(),
        path: path.to_string(),
        headers,
        body: Vec::new(),
    })
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

impl HttpResponse {
    pub fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => HttpResponse {
                status,
                body: Some(value),
            },
            Err(e) => {
                log::error!("Failed to serialize response body: {e}");
                Self::failure(500, "Internal server error")
            }
        }
    }

    pub fn failure(status: u16, error: &str) -> Self {
        HttpResponse {
            status,
            body: Some(serde_json::json!({ "success": false, "error": error })),
        }
    }

    pub fn no_content() -> Self {
        HttpResponse {
            status: 204,
            body: None,
        }
    }

    pub fn from_error(error: &ReminderError) -> Self {
        Self::failure(error.status_code(), &error.to_string())
    }

    /// Serialize status line, headers and body
    pub fn encode(&self) -> Vec<u8> {
        let body = self
            .body
            .as_ref()
            .map(|v| v.to_string().into_bytes())
            .unwrap_or_default();

        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        if self.body.is_some() {
            head.push_str("Content-Type: application/json; charset=utf-8\r\n");
        }
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        head.push_str("Access-Control-Allow-Origin: *\r\n");
        if self.status == 204 {
            head.push_str("Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n");
            head.push_str("Access-Control-Allow-Headers: Content-Type\r\n");
        }
        head.push_str("Connection: close\r\n\r\n");

        let mut out = head.into_bytes();
        out.extend_from_slice(&body);
        out
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

// ============================================================================
// JSON bodies
// ============================================================================

/// Body of `POST /reminders`
#[derive(Debug, Default, Deserialize)]
pub struct CreateTimedRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub seconds: Option<f64>,
}

impl CreateTimedRequest {
    pub fn into_spec(self) -> ReminderResult<ReminderSpec> {
        match (non_empty(self.message), self.seconds) {
            (Some(message), Some(seconds)) => Ok(ReminderSpec::Timed { message, seconds }),
            _ => Err(ReminderError::validation(
                "Message and seconds are required.",
            )),
        }
    }
}

/// Body of `POST /reminders/event`
#[derive(Debug, Default, Deserialize)]
pub struct CreateEventRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "eventName", default)]
    pub event_name: Option<String>,
}

impl CreateEventRequest {
    pub fn into_spec(self) -> ReminderResult<ReminderSpec> {
        match (non_empty(self.message), non_empty(self.event_name)) {
            (Some(message), Some(event_name)) => Ok(ReminderSpec::Event {
                message,
                event_name,
            }),
            _ => Err(ReminderError::validation(
                "Both message and eventName are required.",
            )),
        }
    }
}

/// Body of `POST /reminders/recurring`
#[derive(Debug, Default, Deserialize)]
pub struct CreateRecurringRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub recurrences: Option<f64>,
    #[serde(default)]
    pub interval: Option<String>,
}

impl CreateRecurringRequest {
    pub fn into_spec(self) -> ReminderResult<ReminderSpec> {
        let (Some(message), Some(duration_seconds), Some(recurrences)) =
            (non_empty(self.message), self.duration_seconds, self.recurrences)
        else {
            return Err(ReminderError::validation(
                "Message, duration_seconds, and recurrences are required.",
            ));
        };

        // JSON numbers carry no integer type, so 3.0 counts as 3
        if recurrences.fract() != 0.0 || !(1.0..=f64::from(u32::MAX)).contains(&recurrences) {
            return Err(ReminderError::validation(format!(
                "recurrences must be a whole number between 1 and {}.",
                u32::MAX
            )));
        }
        let recurrences = recurrences as u32;

        Ok(ReminderSpec::Recurring {
            message,
            duration_seconds,
            recurrences,
            interval: non_empty(self.interval),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub reminder: Reminder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub event: String,
    #[serde(rename = "remindersTriggered")]
    pub reminders_triggered: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusErrorResponse {
    pub status: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub stats: SchedulerStats,
}
