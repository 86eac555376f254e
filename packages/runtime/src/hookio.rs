//! Stdin/stdout JSON plumbing shared by every hook binary. The host agent's
//! hook transport (exact JSON-RPC/CLI framing) is out of scope; these
//! binaries speak the minimal stdin/stdout JSON contract any host-agent hook
//! transport: read one JSON object from stdin, always exit 0, and log
//! failures instead of propagating them to the host agent.

use std::io::Read;

use serde::Serialize;

/// Reads all of stdin and parses it as JSON. Returns `Value::Null` (never an
/// error) on empty input or parse failure, so callers can treat every field
/// as optional with `serde_json::Value::get`.
pub fn read_stdin_json() -> serde_json::Value {
    let mut buf = String::new();
    if std::io::stdin().read_to_string(&mut buf).is_err() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(buf.trim()).unwrap_or(serde_json::Value::Null)
}

/// Writes `value` to stdout as a single compact JSON line. Never panics: a
/// serialization failure falls back to `{}`.
pub fn write_stdout_json(value: &impl Serialize) {
    let body = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    println!("{body}");
}

/// Every hook boundary rule: failures never propagate to the
/// host agent. Runs `body`, logs any error at `warn`, and always returns
/// success regardless of outcome.
pub async fn run_hook_safely<F, Fut>(hook_name: &'static str, body: F)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<()>>,
{
    if let Err(e) = body().await {
        tracing::warn!(hook = hook_name, error = %e, "hook body failed; suppressing at hook boundary");
    }
}

pub fn str_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(str::to_string)
}
