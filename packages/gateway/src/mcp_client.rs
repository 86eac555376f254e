//! MCP SSE client: one long-lived GET to `/sse` carrying the session-id
//! handshake, JSON-RPC `tools/call` requests POSTed to `/messages/`, and
//! responses matched back to pending requests as they arrive on the same
//! SSE stream. `packages/arbiter/src/bin/server.rs` supplies the
//! axum/reqwest/tokio idiom this adapts to a client role.
//!
//! The single-iterator invariant is load-bearing:
//! the handshake and the response-matching loop both read from the same
//! `bytes_stream()` iterator. Re-opening the GET after extracting the
//! session id would start a second, distinct SSE stream and silently drop
//! every subsequent `event: message` frame.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};

use crate::error::GatewayError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

struct Pending {
    tx: oneshot::Sender<Result<Value, GatewayError>>,
}

/// One connected MCP server (KG, quality, or governance). Holds the
/// session id from the SSE handshake and a map of in-flight JSON-RPC
/// requests awaiting their `event: message` response frame.
pub struct McpClient {
    http: reqwest::Client,
    base_url: String,
    session_id: String,
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<u64, Pending>>>,
    _reader: tokio::task::JoinHandle<()>,
}

impl McpClient {
    /// Opens the SSE stream, reads the handshake `session_id=` line, sends
    /// `initialize` + `notifications/initialized`, and spawns the
    /// background reader that completes pending calls as frames arrive.
    pub async fn connect(base_url: impl Into<String>) -> Result<Self, GatewayError> {
        let base_url = base_url.into();
        let http = reqwest::Client::new();

        let response = http.get(format!("{base_url}/sse")).send().await.map_err(|e| GatewayError::McpTransport(e.to_string()))?;
        let mut stream = response.bytes_stream();

        let mut buf = String::new();
        let session_id = loop {
            let Some(chunk) = stream.next().await else {
                return Err(GatewayError::McpTransport("sse stream closed before handshake".into()));
            };
            let chunk = chunk.map_err(|e| GatewayError::McpTransport(e.to_string()))?;
            buf.push_str(&String::from_utf8_lossy(&chunk));
            if let Some(id) = extract_session_id(&buf) {
                break id;
            }
        };

        let pending: Arc<Mutex<HashMap<u64, Pending>>> = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = pending.clone();
        let reader = tokio::spawn(async move {
            let mut buf = buf;
            loop {
                match stream.next().await {
                    Some(Ok(chunk)) => {
                        buf.push_str(&String::from_utf8_lossy(&chunk));
                        while let Some((frame, rest)) = split_sse_frame(&buf) {
                            buf = rest;
                            if let Some(value) = parse_message_frame(&frame) {
                                if let Some(id) = value.get("id").and_then(Value::as_u64) {
                                    if let Some(p) = reader_pending.lock().await.remove(&id) {
                                        let _ = p.tx.send(Ok(value));
                                    }
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "mcp sse stream error");
                        break;
                    }
                    None => break,
                }
            }
            // Connection closed: reject everyone still waiting.
            for (_, p) in reader_pending.lock().await.drain() {
                let _ = p.tx.send(Err(GatewayError::McpTransport("sse connection closed".into())));
            }
        });

        let client = Self { http, base_url, session_id, next_id: AtomicU64::new(1), pending, _reader: reader };
        client.notify("initialize", serde_json::json!({"protocolVersion": "2024-11-05"})).await?;
        client.send_notification("notifications/initialized", serde_json::json!({})).await?;
        Ok(client)
    }

    fn messages_url(&self) -> String {
        format!("{}/messages/?session_id={}", self.base_url, self.session_id)
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), GatewayError> {
        let body = serde_json::json!({"jsonrpc": "2.0", "method": method, "params": params});
        self.http.post(self.messages_url()).json(&body).send().await.map_err(|e| GatewayError::McpTransport(e.to_string()))?;
        Ok(())
    }

    async fn notify(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        self.call_raw(method, params, DEFAULT_TIMEOUT).await
    }

    async fn call_raw(&self, method: &str, params: Value, timeout: Duration) -> Result<Value, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, Pending { tx });

        let body = serde_json::json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        self.http.post(self.messages_url()).json(&body).send().await.map_err(|e| GatewayError::McpTransport(e.to_string()))?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GatewayError::McpTransport("response channel dropped".into())),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(GatewayError::McpTimeout)
            }
        }
    }

    /// Calls `tools/call` on `tool_name` with `arguments` and returns the
    /// tool result's content, unwrapping the JSON-RPC envelope and
    /// surfacing remote errors as [`GatewayError::McpRemote`].
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value, GatewayError> {
        let params = serde_json::json!({"name": tool_name, "arguments": arguments});
        let envelope = self.call_raw("tools/call", params, DEFAULT_TIMEOUT).await?;
        if let Some(error) = envelope.get("error") {
            return Err(GatewayError::McpRemote(error.to_string()));
        }
        Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn extract_session_id(buf: &str) -> Option<String> {
    for line in buf.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            if let Some(idx) = data.find("session_id=") {
                return Some(data[idx + "session_id=".len()..].split(['&', ' ']).next().unwrap_or_default().to_string());
            }
        }
    }
    None
}

/// Splits the next complete SSE frame (terminated by a blank line) off the
/// front of `buf`, returning `(frame, remainder)`.
fn split_sse_frame(buf: &str) -> Option<(String, String)> {
    let idx = buf.find("\n\n")?;
    let frame = buf[..idx].to_string();
    let rest = buf[idx + 2..].to_string();
    Some((frame, rest))
}

/// Parses an `event: message` frame's `data:` payload as JSON.
fn parse_message_frame(frame: &str) -> Option<Value> {
    let mut is_message = false;
    let mut data = String::new();
    for line in frame.lines() {
        if let Some(event) = line.strip_prefix("event:") {
            is_message = event.trim() == "message";
        } else if let Some(d) = line.strip_prefix("data:") {
            data.push_str(d.trim());
        }
    }
    if !is_message || data.is_empty() {
        return None;
    }
    serde_json::from_str(&data).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_session_id_from_handshake_line() {
        let buf = "event: endpoint\ndata: /messages/?session_id=abc123\n\n";
        assert_eq!(extract_session_id(buf), Some("abc123".to_string()));
    }

    #[test]
    fn split_sse_frame_finds_blank_line_boundary() {
        let buf = "event: message\ndata: {\"id\":1}\n\nleftover";
        let (frame, rest) = split_sse_frame(buf).unwrap();
        assert!(frame.contains("\"id\":1"));
        assert_eq!(rest, "leftover");
    }

    #[test]
    fn parse_message_frame_requires_message_event() {
        let frame = "event: ping\ndata: {\"id\":1}";
        assert!(parse_message_frame(frame).is_none());

        let frame = "event: message\ndata: {\"id\":1,\"result\":{}}";
        let parsed = parse_message_frame(frame).unwrap();
        assert_eq!(parsed["id"], 1);
    }
}
