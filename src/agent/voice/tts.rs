// SYNOID Voice Clone Session
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Long-lived voice cloning worker (tools/synoid_clone.py --serve). The model
// is loaded once when the session opens; requests go over stdin/stdout as one
// JSON object per line and are serialized, one synthesis at a time. Every
// request carries an id the worker echoes back, so a reply left in the pipe by
// an abandoned request is skipped rather than taken for the next one.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::agent::collaborators::VoiceCloner;

#[derive(Debug, Serialize)]
struct CloneRequest<'a> {
    id: u64,
    text: &'a str,
    speaker: &'a Path,
    output: &'a Path,
}

#[derive(Debug, Deserialize)]
struct CloneReply {
    #[serde(default)]
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

struct Worker {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    /// A write was cut off part way; the worker may hold half a request.
    torn: bool,
}

impl Worker {
    async fn read_reply(&mut self) -> Result<CloneReply> {
        let line = self
            .stdout
            .next_line()
            .await
            .context("Read from clone worker")?
            .context("Clone worker exited")?;
        serde_json::from_str(&line)
            .with_context(|| format!("Unexpected clone worker output: {}", line.trim()))
    }

    async fn request(&mut self, text: &str, speaker: &Path, output: &Path) -> Result<CloneReply> {
        if self.torn {
            anyhow::bail!("Clone worker stream was interrupted mid-request; reopen the session");
        }
        self.next_id += 1;
        let id = self.next_id;

        let mut line = serde_json::to_string(&CloneRequest {
            id,
            text,
            speaker,
            output,
        })?;
        line.push('\n');

        self.torn = true;
        self.stdin
            .write_all(line.as_bytes())
            .await
            .context("Write to clone worker")?;
        self.stdin.flush().await?;
        self.torn = false;

        loop {
            let reply = self.read_reply().await?;
            if reply.id == Some(id) {
                return Ok(reply);
            }
            debug!(
                "[TTS] Discarding stale worker reply {:?} (waiting for {})",
                reply.id, id
            );
        }
    }
}

pub struct VoiceCloneSession {
    worker: Mutex<Worker>,
    script_path: PathBuf,
}

/// Locate the worker script: as given, then relative to the executable.
pub fn locate_clone_script(configured: &Path) -> PathBuf {
    if configured.exists() || configured.is_absolute() {
        return configured.to_path_buf();
    }
    // Running from target/debug
    let beside_exe = std::env::current_exe().ok().and_then(|exe| {
        exe.parent()
            .map(|dir| dir.join("../..").join(configured))
            .filter(|p| p.exists())
    });
    match beside_exe {
        Some(p) => p,
        None => {
            warn!(
                "[TTS] Warning: {:?} not found. Voice cloning will fail.",
                configured
            );
            configured.to_path_buf()
        }
    }
}

impl VoiceCloneSession {
    /// Start the worker and wait until it reports the model is loaded.
    pub async fn open(python: &str, script_path: &Path) -> Result<Self> {
        let script_path = locate_clone_script(script_path);
        info!("[TTS] Starting voice clone worker: {} {:?}", python, script_path);

        let mut child = Command::new(python)
            .arg(&script_path)
            .arg("--serve")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {} {:?}", python, script_path))?;

        let stdin = child.stdin.take().context("Clone worker has no stdin")?;
        let stdout = child.stdout.take().context("Clone worker has no stdout")?;
        let mut worker = Worker {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            torn: false,
        };

        let ready = worker.read_reply().await.context("Clone worker failed to start")?;
        if !ready.ok {
            anyhow::bail!(
                "Clone worker failed to load: {}",
                ready.error.unwrap_or_default()
            );
        }

        info!("[TTS] Voice clone session ready.");
        Ok(Self {
            worker: Mutex::new(worker),
            script_path,
        })
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// Shut the worker down. It exits on stdin EOF; killed if it lingers.
    pub async fn close(self) -> Result<()> {
        let Worker {
            mut child, stdin, ..
        } = self.worker.into_inner();
        drop(stdin);

        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!("[TTS] Voice clone worker exited: {}", status);
            }
            Err(_) => {
                warn!("[TTS] Voice clone worker did not exit, killing it.");
                child.kill().await?;
            }
        }
        Ok(())
    }

    pub async fn speak(&self, text: &str, voice_sample: &Path, output_path: &Path) -> Result<()> {
        info!("[TTS] Cloning: \"{}\" -> {:?}", text, output_path);

        let reply = {
            let mut worker = self.worker.lock().await;
            worker.request(text, voice_sample, output_path).await?
        };

        if !reply.ok {
            anyhow::bail!(
                "Voice cloning failed: {}",
                reply.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        let size = tokio::fs::metadata(output_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if size == 0 {
            anyhow::bail!("Clone worker reported success but {:?} is empty", output_path);
        }
        debug!("[TTS] Wrote {} bytes to {:?}", size, output_path);
        Ok(())
    }
}

impl VoiceCloner for VoiceCloneSession {
    async fn synthesize(&self, text: &str, voice_sample: &Path, output_path: &Path) -> Result<()> {
        self.speak(text, voice_sample, output_path).await
    }
}
