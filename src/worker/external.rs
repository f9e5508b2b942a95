//! Short-lived external MCP worker processes.
//!
//! A worker is launched per request from its catalog entry, asked for its tool
//! count, sent exactly one `call_tool` relay, and then killed. The process is
//! owned by [`WorkerProcess`]; `shutdown` kills and reaps it, and
//! `kill_on_drop` covers a request future that is dropped mid-call.

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::{resolve_env_vars, WorkerSpec};
use crate::error::CascadeError;
use crate::probe;

/// Lines of stderr kept per worker.
const STDERR_LINES: usize = 50;

/// Lines of stderr attached to a relay error.
const STDERR_TAIL: usize = 5;

/// Rolling buffer of a worker's most recent stderr lines.
pub struct StderrBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl StderrBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity,
        }
    }

    /// Push a line, evicting the oldest at capacity.
    pub fn push(&mut self, line: String) {
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn lines(&self) -> &VecDeque<String> {
        &self.lines
    }

    /// The last `n` lines joined with `" | "`.
    pub fn tail(&self, n: usize) -> String {
        let skip = self.lines.len().saturating_sub(n);
        self.lines
            .iter()
            .skip(skip)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// A running worker subprocess.
pub struct WorkerProcess {
    name: String,
    child: Child,
    stderr: Arc<Mutex<StderrBuffer>>,
    drains: CancellationToken,
}

impl WorkerProcess {
    /// Launch `spec` with its env overrides layered over the inherited environment.
    pub fn spawn(name: &str, spec: &WorkerSpec) -> crate::Result<Self> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args);
        if !spec.env.is_empty() {
            cmd.envs(resolve_env_vars(&spec.env));
        }
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| CascadeError::WorkerSpawn(name.to_string(), e.to_string()))?;
        tracing::info!(worker = %name, pid = ?child.id(), command = %spec.command, "worker spawned");

        let stderr = Arc::new(Mutex::new(StderrBuffer::new(STDERR_LINES)));
        let drains = CancellationToken::new();
        if let Some(out) = child.stdout.take() {
            start_drain(out, name.to_string(), "stdout", None, drains.clone());
        }
        if let Some(err) = child.stderr.take() {
            start_drain(
                err,
                name.to_string(),
                "stderr",
                Some(stderr.clone()),
                drains.clone(),
            );
        }

        Ok(Self {
            name: name.to_string(),
            child,
            stderr,
            drains,
        })
    }

    /// OS process id, `None` once the process has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Recent stderr output, oldest first.
    pub async fn stderr_tail(&self) -> String {
        self.stderr.lock().await.tail(STDERR_TAIL)
    }

    /// Kill the process and wait for it to exit.
    pub async fn shutdown(mut self) {
        match self.child.kill().await {
            Ok(()) => tracing::info!(worker = %self.name, "worker stopped"),
            // Already exited on its own; reap it.
            Err(e) => {
                tracing::debug!(worker = %self.name, error = %e, "worker kill failed, waiting");
                let _ = self.child.wait().await;
            }
        }
        self.drains.cancel();
    }
}

/// Forward each line of a worker pipe to the log, and optionally into `buf`.
fn start_drain<R>(
    pipe: R,
    worker: String,
    stream: &'static str,
    buf: Option<Arc<Mutex<StderrBuffer>>>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        loop {
            tokio::select! {
                line_result = lines.next_line() => {
                    match line_result {
                        Ok(Some(line)) => {
                            tracing::debug!(worker = %worker, stream, line = %line, "worker output");
                            if let Some(buf) = &buf {
                                buf.lock().await.push(line);
                            }
                        }
                        Ok(None) | Err(_) => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    });
}

/// Ask the worker at `base_url` how many tools it serves. Any failure is 0.
pub async fn probe_tool_count(client: &reqwest::Client, base_url: &str, name: &str) -> usize {
    let url = format!("{base_url}/list_tools");
    let reply = async {
        client
            .post(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    }
    .await;
    match reply {
        Ok(value) => {
            let count = probe::count_tools_in_listing(&value).unwrap_or(0);
            tracing::debug!(worker = %name, tool_count = count, "worker tool count");
            count
        }
        Err(e) => {
            tracing::warn!(worker = %name, error = %e, "list_tools failed, counting 0 tools");
            0
        }
    }
}

/// Send `payload` to the worker's `call_tool` endpoint and return its JSON reply.
pub async fn relay_call(
    client: &reqwest::Client,
    base_url: &str,
    name: &str,
    payload: &Value,
) -> crate::Result<Value> {
    let url = format!("{base_url}/call_tool");
    let relay_err = |e: reqwest::Error| CascadeError::WorkerRelay(name.to_string(), e.to_string());
    client
        .post(&url)
        .json(payload)
        .send()
        .await
        .map_err(relay_err)?
        .error_for_status()
        .map_err(relay_err)?
        .json::<Value>()
        .await
        .map_err(relay_err)
}
