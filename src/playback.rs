//! Playback Controller
//!
//! Owns the single "now playing" slot. Starting a new playback preempts any
//! in-flight renderer process (graceful terminate, bounded grace, force kill)
//! so at most one announcement is ever audible. The renderer runs detached
//! from the caller: a watcher task waits for completion with a hard timeout
//! and clears the slot in every outcome.

use crate::error::{VoiceError, VoiceResult};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

/// Hard limit on renderer runtime
const PLAY_TIMEOUT: Duration = Duration::from_secs(30);
/// How long a terminated renderer gets to exit before SIGKILL
const STOP_GRACE: Duration = Duration::from_secs(2);

/// The live handle for in-flight playback
struct ActivePlayback {
    kind: String,
    pid: u32,
    generation: u64,
    /// Resolved by the watcher once the renderer process has exited
    done_rx: oneshot::Receiver<()>,
}

pub struct PlaybackController {
    slot: Arc<Mutex<Option<ActivePlayback>>>,
    generation: AtomicU64,
    play_timeout: Duration,
    stop_grace: Duration,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::with_timeouts(PLAY_TIMEOUT, STOP_GRACE)
    }

    /// Controller with custom timeouts (tests shrink these)
    pub fn with_timeouts(play_timeout: Duration, stop_grace: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
            play_timeout,
            stop_grace,
        }
    }

    /// Kind of the announcement currently rendering, if any
    pub async fn current_kind(&self) -> Option<String> {
        self.slot.lock().await.as_ref().map(|a| a.kind.clone())
    }

    pub async fn is_playing(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Launch the renderer for a resolved resource, preempting any prior
    /// playback first. Returns once the process is launched; completion is
    /// observed asynchronously by the watcher task.
    pub async fn start(&self, kind: &str, program: &str, args: &[String]) -> VoiceResult<()> {
        let mut slot = self.slot.lock().await;
        self.stop_locked(&mut slot).await;

        debug!("Executing audio command: {} {}", program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VoiceError::Playback(format!("failed to spawn {}: {}", program, e)))?;

        let Some(pid) = child.id() else {
            return Err(VoiceError::Playback(format!(
                "{} exited before it could be tracked",
                program
            )));
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (done_tx, done_rx) = oneshot::channel();
        *slot = Some(ActivePlayback {
            kind: kind.to_string(),
            pid,
            generation,
            done_rx,
        });
        drop(slot);

        info!("Started audio playback: {} -> {} (pid {})", kind, program, pid);

        let slot = self.slot.clone();
        let kind = kind.to_string();
        let play_timeout = self.play_timeout;
        tokio::spawn(async move {
            watch(child, kind, generation, play_timeout, slot, done_tx).await;
        });

        Ok(())
    }

    /// Stop in-flight playback; no-op when idle
    pub async fn stop(&self) {
        let mut slot = self.slot.lock().await;
        self.stop_locked(&mut slot).await;
    }

    /// Called once on host teardown
    pub async fn shutdown(&self) {
        debug!("Playback controller shutting down");
        self.stop().await;
    }

    /// Terminate the active renderer with the slot lock held. The handle is
    /// cleared unconditionally, even if termination itself errors.
    async fn stop_locked(&self, slot: &mut Option<ActivePlayback>) {
        let Some(mut active) = slot.take() else {
            return;
        };

        // Already exited, nothing to signal
        if active.done_rx.try_recv().is_ok() {
            return;
        }

        debug!("Stopping current audio playback ({})", active.kind);
        send_signal(active.pid, Signal::Term);

        // The watcher resolves done_rx as soon as the process exits; it only
        // touches the slot afterwards, so waiting here cannot deadlock.
        match tokio::time::timeout(self.stop_grace, active.done_rx).await {
            Ok(_) => {}
            Err(_) => {
                warn!(
                    "Playback did not terminate within grace period, killing (pid {})",
                    active.pid
                );
                send_signal(active.pid, Signal::Kill);
            }
        }
    }
}

/// Waits for renderer completion and clears the live handle in all paths.
/// This is the only place the handle is cleared on the worker side.
async fn watch(
    mut child: Child,
    kind: String,
    generation: u64,
    play_timeout: Duration,
    slot: Arc<Mutex<Option<ActivePlayback>>>,
    done_tx: oneshot::Sender<()>,
) {
    let stderr = child.stderr.take();

    match tokio::time::timeout(play_timeout, child.wait()).await {
        Err(_) => {
            warn!("Audio playback timeout: {}", kind);
            if let Err(e) = child.kill().await {
                error!("Failed to kill timed-out renderer: {}", e);
            }
        }
        Ok(Ok(status)) if status.success() => {
            debug!("Audio playback completed: {}", kind);
        }
        Ok(Ok(status)) => {
            warn!("Audio playback failed: {} ({})", kind, status);
            if let Some(mut err) = stderr {
                let mut output = String::new();
                let _ = err.read_to_string(&mut output).await;
                if !output.trim().is_empty() {
                    warn!("Renderer error output: {}", output.trim());
                }
            }
        }
        Ok(Err(e)) => {
            error!("Audio playback error: {} - {}", kind, e);
        }
    }

    // Signal before touching the slot: stop() waits on this while holding
    // the slot lock.
    let _ = done_tx.send(());

    let mut slot = slot.lock().await;
    if slot.as_ref().map(|a| a.generation) == Some(generation) {
        *slot = None;
    }
}

enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) {
    let sig = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // ESRCH just means the process already exited
    unsafe {
        libc::kill(pid as libc::pid_t, sig);
    }
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signal: Signal) {
    // No graceful termination off Unix; the watcher's timeout kill applies
}
