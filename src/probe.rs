//! Tool-count probing of a running MCP worker.
//!
//! Tries the worker's `/tools` listing first and falls back to its
//! `openapi.json`, where a `x-windsurf-tools` extension wins over counting
//! `paths`.

use std::time::Duration;

use serde_json::Value;

use crate::error::CascadeError;

/// Tool count of a listing reply: a bare array, or an object with a `tools` array.
pub fn count_tools_in_listing(reply: &Value) -> Option<usize> {
    match reply {
        Value::Array(tools) => Some(tools.len()),
        Value::Object(map) => map.get("tools").and_then(Value::as_array).map(Vec::len),
        _ => None,
    }
}

/// Tool count of an OpenAPI document.
pub fn count_tools_in_openapi(doc: &Value) -> Option<usize> {
    let len = |v: &Value| match v {
        Value::Array(a) => Some(a.len()),
        Value::Object(o) => Some(o.len()),
        _ => None,
    };
    doc.get("x-windsurf-tools")
        .and_then(len)
        .or_else(|| doc.get("paths").and_then(len))
}

async fn get_json(client: &reqwest::Client, url: &str) -> crate::Result<Value> {
    let probe_err = |e: reqwest::Error| CascadeError::Probe(url.to_string(), e.to_string());
    client
        .get(url)
        .send()
        .await
        .map_err(probe_err)?
        .error_for_status()
        .map_err(probe_err)?
        .json::<Value>()
        .await
        .map_err(probe_err)
}

/// Ask the MCP server rooted at `base_url` (e.g. `http://127.0.0.1:8000/mcp`)
/// how many tools it exposes.
pub async fn fetch_tool_count(base_url: &str, timeout: Duration) -> crate::Result<usize> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .no_proxy()
        .build()
        .map_err(|e| CascadeError::Probe(base_url.to_string(), e.to_string()))?;
    let base = base_url.trim_end_matches('/');

    let tools_url = format!("{base}/tools");
    match get_json(&client, &tools_url).await {
        Ok(reply) => {
            if let Some(count) = count_tools_in_listing(&reply) {
                tracing::debug!(url = %tools_url, tool_count = count, "tool count from listing");
                return Ok(count);
            }
            tracing::debug!(url = %tools_url, "unrecognized tools listing, trying openapi.json");
        }
        Err(e) => tracing::debug!(error = %e, "tools listing unavailable, trying openapi.json"),
    }

    let openapi_url = format!("{base}/openapi.json");
    let doc = get_json(&client, &openapi_url).await?;
    count_tools_in_openapi(&doc).ok_or_else(|| {
        CascadeError::Probe(openapi_url, "unrecognized openapi.json format".to_string())
    })
}
