//! Throttled outbound channel - burst then back off

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::application::errors::{panic_message, BotError};
use crate::domain::entities::Outgoing;
use crate::domain::traits::RawSend;

/// Throttle tuning, the `throttle` config section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ThrottleConfig {
    /// Sends allowed per window before backing off
    pub burst_limit: u32,
    pub window_ms: u64,
    /// Maximum deviation from `window_ms`, applied with a random sign
    pub jitter_ms: u64,
    /// Backlog length that triggers a warning
    pub backlog_warning: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            burst_limit: 5,
            window_ms: 1000,
            jitter_ms: 500,
            backlog_warning: 100,
        }
    }
}

impl ThrottleConfig {
    /// Pick the delay before the next refill
    pub fn refill_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        let jitter = self.jitter_ms.min(self.window_ms);
        let magnitude = rng.random_range(0..=jitter);
        let millis = if rng.random_bool(0.5) {
            self.window_ms - magnitude
        } else {
            self.window_ms + magnitude
        };
        Duration::from_millis(millis)
    }
}

#[derive(Default)]
struct ThrottleState {
    queue: VecDeque<Outgoing>,
    /// Tokens consumed in the current window, at most `burst_limit`
    consumed: u32,
    refill: Option<JoinHandle<()>>,
    delivered: u64,
    failed: u64,
    backlog_warned: bool,
}

struct Shared {
    state: Mutex<ThrottleState>,
    raw: RawSend,
    config: ThrottleConfig,
    runtime: Handle,
}

/// Rate-limited handle over a raw send primitive.
///
/// Cloning is cheap; every clone feeds the same queue. The raw sender runs
/// while the queue lock is held, so it must not call back into the channel.
#[derive(Clone)]
pub struct ThrottledChannel {
    shared: Arc<Shared>,
}

/// Send handle passed to every listener
pub type Say = ThrottledChannel;

impl ThrottledChannel {
    /// Wrap `raw`. Must be called from within a tokio runtime, which hosts the refill timer.
    pub fn new(raw: RawSend, config: ThrottleConfig) -> Result<Self, BotError> {
        if config.burst_limit == 0 {
            return Err(BotError::Internal("throttle burst-limit must be at least 1".to_string()));
        }
        let runtime = Handle::try_current()
            .map_err(|e| BotError::Internal(format!("throttled channel needs a tokio runtime: {}", e)))?;

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ThrottleState::default()),
                raw,
                config,
                runtime,
            }),
        })
    }

    /// Queue a line for `target`
    pub fn say(&self, target: impl Into<String>, text: impl Into<String>) {
        self.send(Outgoing::new(target, text));
    }

    pub fn send(&self, outgoing: Outgoing) {
        let mut state = self.shared.lock();
        state.queue.push_back(outgoing);
        Shared::drain(&self.shared, &mut state);
    }

    /// Messages waiting for allowance
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Messages handed to the raw sender so far
    pub fn delivered(&self) -> u64 {
        self.shared.lock().delivered
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.shared.config
    }

    /// Messages whose raw send panicked
    pub fn failed(&self) -> u64 {
        self.shared.lock().failed
    }

    /// Wait until the backlog has been handed to the raw sender.
    ///
    /// Polls once per worst-case refill delay; the refill task does the sending.
    pub async fn flush(&self) {
        let config = &self.shared.config;
        let step = Duration::from_millis(config.window_ms + config.jitter_ms.min(config.window_ms));
        loop {
            let backlog = self.pending();
            if backlog == 0 {
                return;
            }
            tracing::debug!("Waiting for {} queued messages", backlog);
            tokio::time::sleep(step).await;
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ThrottleState> {
        // A panicking raw sender must not wedge every later send.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn drain(this: &Arc<Shared>, state: &mut ThrottleState) {
        let limit = this.config.burst_limit;

        while state.consumed < limit {
            let Some(oldest) = state.queue.pop_front() else {
                break;
            };
            state.consumed += 1;
            match panic::catch_unwind(AssertUnwindSafe(|| (this.raw)(&oldest))) {
                Ok(()) => state.delivered += 1,
                Err(payload) => {
                    tracing::error!("Raw send to {} panicked: {}", oldest.target, panic_message(payload.as_ref()));
                    state.failed += 1;
                }
            }
        }

        let backlog = state.queue.len();
        if backlog >= this.config.backlog_warning {
            if !state.backlog_warned {
                tracing::warn!("Outbound backlog reached {} messages", backlog);
                state.backlog_warned = true;
            }
        } else {
            state.backlog_warned = false;
        }

        if backlog == 0 || state.refill.is_some() {
            return;
        }

        let delay = this.config.refill_delay(&mut rand::rng());
        tracing::debug!("Throttling {} queued messages for {:?}", backlog, delay);

        let shared = Arc::clone(this);
        state.refill = Some(this.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = shared.lock();
            state.refill = None;
            state.consumed = state.consumed.saturating_sub(shared.config.burst_limit);
            Shared::drain(&shared, &mut state);
        }));
    }
}
