//! Readiness probing for a ComfyUI instance.
//!
//! [`ReadinessProber::probe`] polls `/system_stats` at a fixed interval
//! until the server answers successfully or the caller's timeout
//! elapses. A successful probe latches the shared readiness flag read by
//! health checks. Probing is idempotent, so several callers (the startup
//! task and any number of requests) may probe concurrently.

use std::sync::Arc;
use std::time::Duration;

use relay_core::clock::Clock;
use relay_core::state::ServiceState;

use crate::backend::ComfyBackend;

/// Default delay between two status requests.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Attempts between two "still waiting" log lines.
const LOG_EVERY_ATTEMPTS: u32 = 10;

/// Why a probe gave up.
///
/// A server that is reachable but answering with errors keeps being
/// polled; it only surfaces here, as `last_error`, once time runs out.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("ComfyUI not ready after {} seconds", .timeout.as_secs())]
    TimedOut {
        timeout: Duration,
        attempts: u32,
        /// The last failure observed, if any request completed.
        last_error: Option<String>,
    },
}

/// Polls a ComfyUI instance until it reports ready.
pub struct ReadinessProber {
    backend: Arc<dyn ComfyBackend>,
    clock: Arc<dyn Clock>,
    state: Arc<ServiceState>,
    interval: Duration,
}

impl ReadinessProber {
    pub fn new(
        backend: Arc<dyn ComfyBackend>,
        clock: Arc<dyn Clock>,
        state: Arc<ServiceState>,
    ) -> Self {
        Self {
            backend,
            clock,
            state,
            interval: DEFAULT_PROBE_INTERVAL,
        }
    }

    /// Override the delay between status requests.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Shared state this prober updates.
    pub fn state(&self) -> &Arc<ServiceState> {
        &self.state
    }

    /// Return immediately if the instance is already known to be ready,
    /// otherwise [`probe`](Self::probe) it.
    pub async fn ensure_ready(&self, timeout: Duration) -> Result<(), ProbeError> {
        if self.state.is_ready() {
            return Ok(());
        }
        self.probe(timeout).await.map(|_| ())
    }

    /// Poll until the instance answers successfully or `timeout` elapses.
    ///
    /// Returns the time it took to become ready. Each request is itself
    /// bounded by the remaining budget, so the call never outlives
    /// `timeout` by more than scheduling slack.
    pub async fn probe(&self, timeout: Duration) -> Result<Duration, ProbeError> {
        let start = self.clock.now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let remaining = timeout.saturating_sub(self.elapsed_since(start));

            let status = tokio::time::timeout(remaining, self.backend.system_stats()).await;
            let last_error = match status {
                Ok(Ok(())) => {
                    let elapsed = self.elapsed_since(start);
                    self.state.mark_ready();
                    tracing::info!(
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "ComfyUI is ready",
                    );
                    return Ok(elapsed);
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => "status request timed out".to_string(),
            };

            let elapsed = self.elapsed_since(start);
            if elapsed >= timeout {
                tracing::warn!(
                    attempts,
                    timeout_secs = timeout.as_secs(),
                    last_error = %last_error,
                    "ComfyUI readiness probe timed out",
                );
                return Err(ProbeError::TimedOut {
                    timeout,
                    attempts,
                    last_error: Some(last_error),
                });
            }

            if attempts % LOG_EVERY_ATTEMPTS == 1 {
                tracing::info!(
                    attempts,
                    elapsed_secs = elapsed.as_secs(),
                    timeout_secs = timeout.as_secs(),
                    "Waiting for ComfyUI...",
                );
            }

            self.clock.sleep(self.interval.min(timeout - elapsed)).await;
        }
    }

    fn elapsed_since(&self, start: Duration) -> Duration {
        self.clock.now().saturating_sub(start)
    }
}
