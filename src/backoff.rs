//! Adaptive backoff and origin protection.
//!
//! A single controller observes every fetch outcome. Server errors and
//! response-time degradation escalate an exponential per-worker delay;
//! repeated 403 responses inside a sliding window cancel the whole run.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Number of recent response times tracked for the latency baseline. The
/// baseline is fixed once half this many samples have accumulated.
const RESPONSE_TIME_WINDOW: usize = 20;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub degradation_threshold: f64,
    pub forbidden_threshold: usize,
    pub forbidden_window: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            degradation_threshold: 0.5,
            forbidden_threshold: 5,
            forbidden_window: Duration::from_secs(5),
        }
    }
}

/// Verdict for a single observed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    Proceed,
    Pause(Duration),
}

/// Point-in-time view of the controller, for debug logging and monitoring.
#[derive(Debug, Clone)]
pub struct BackoffSnapshot {
    pub active: bool,
    pub current_delay: Duration,
    pub baseline_response_time: Duration,
    pub current_average_response_time: Duration,
    pub forbidden_count: usize,
    pub cancelled: bool,
}

pub struct BackoffController {
    config: BackoffConfig,
    cancel: CancellationToken,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    active: bool,
    current_delay: Duration,
    baseline: Duration,
    recent: VecDeque<Duration>,
    forbidden: Vec<Instant>,
    cancelled: bool,
}

impl BackoffController {
    pub fn new(config: BackoffConfig, cancel: CancellationToken) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            cancel,
            state: Mutex::new(State {
                active: false,
                current_delay: initial_delay,
                baseline: Duration::ZERO,
                recent: VecDeque::with_capacity(RESPONSE_TIME_WINDOW),
                forbidden: Vec::new(),
                cancelled: false,
            }),
        }
    }

    /// Observes one fetch outcome and decides whether the worker should
    /// pause before its next URL.
    ///
    /// Crossing the 403 threshold returns `Error::ForbiddenLimit`, fires the
    /// shared cancellation token, and makes every later observation return
    /// the same error. Transport failures (no status) leave all state
    /// untouched.
    pub async fn observe(
        &self,
        status: Option<u16>,
        duration: Duration,
    ) -> Result<BackoffDecision> {
        if !self.config.enabled {
            return Ok(BackoffDecision::Proceed);
        }

        let mut state = self.state.lock().await;

        if state.cancelled {
            return Err(self.forbidden_error(&state));
        }

        if status == Some(403) {
            let now = Instant::now();
            state.forbidden.push(now);
            Self::expunge_forbidden(&mut state.forbidden, now, self.config.forbidden_window);

            if state.forbidden.len() >= self.config.forbidden_threshold {
                state.cancelled = true;
                log::error!(
                    "too many forbidden responses ({} within {}), cancelling crawl",
                    state.forbidden.len(),
                    humantime::format_duration(self.config.forbidden_window)
                );
                self.cancel.cancel();
                return Err(self.forbidden_error(&state));
            }
        }

        if let Some(code) = status {
            if (500..600).contains(&code) {
                let delay = Self::advance(&mut state, &self.config);
                log::warn!("server error {code} observed, backing off for {delay:?}");
                return Ok(BackoffDecision::Pause(delay));
            }
        }

        if status.is_some() {
            Self::track_response_time(&mut state, duration);

            if Self::is_degraded(&state, &self.config) {
                let average = Self::current_average(&state.recent);
                let delay = Self::advance(&mut state, &self.config);
                log::warn!(
                    "response time degraded (avg {average:?} vs baseline {:?}), backing off for {delay:?}",
                    state.baseline
                );
                return Ok(BackoffDecision::Pause(delay));
            }

            if matches!(status, Some(code) if (200..400).contains(&code)) && state.active {
                log::info!(
                    "server recovered, resetting backoff from {:?}",
                    state.current_delay
                );
                state.active = false;
                state.current_delay = self.config.initial_delay;
            }
        }

        Ok(BackoffDecision::Proceed)
    }

    pub async fn is_active(&self) -> bool {
        self.state.lock().await.active
    }

    pub async fn is_cancelled(&self) -> bool {
        self.state.lock().await.cancelled
    }

    pub async fn snapshot(&self) -> BackoffSnapshot {
        let state = self.state.lock().await;
        BackoffSnapshot {
            active: state.active,
            current_delay: state.current_delay,
            baseline_response_time: state.baseline,
            current_average_response_time: Self::current_average(&state.recent),
            forbidden_count: state.forbidden.len(),
            cancelled: state.cancelled,
        }
    }

    fn forbidden_error(&self, state: &State) -> Error {
        Error::ForbiddenLimit {
            count: state.forbidden.len(),
            window: self.config.forbidden_window,
        }
    }

    /// Activates backoff at the initial delay, or escalates an active delay
    /// by the multiplier up to the configured maximum.
    fn advance(state: &mut State, config: &BackoffConfig) -> Duration {
        if !state.active {
            state.active = true;
            state.current_delay = config.initial_delay;
        } else {
            let scaled = state.current_delay.mul_f64(config.multiplier);
            state.current_delay = scaled.min(config.max_delay);
        }
        state.current_delay
    }

    fn track_response_time(state: &mut State, duration: Duration) {
        if state.recent.len() == RESPONSE_TIME_WINDOW {
            state.recent.pop_front();
        }
        state.recent.push_back(duration);

        if state.baseline.is_zero() && state.recent.len() >= RESPONSE_TIME_WINDOW / 2 {
            state.baseline = Self::current_average(&state.recent);
            log::debug!("established baseline response time: {:?}", state.baseline);
        }
    }

    fn current_average(recent: &VecDeque<Duration>) -> Duration {
        if recent.is_empty() {
            return Duration::ZERO;
        }
        recent.iter().sum::<Duration>() / recent.len() as u32
    }

    fn is_degraded(state: &State, config: &BackoffConfig) -> bool {
        if state.baseline.is_zero() || state.recent.len() < RESPONSE_TIME_WINDOW / 2 {
            return false;
        }
        let limit = state.baseline.mul_f64(1.0 + config.degradation_threshold);
        Self::current_average(&state.recent) > limit
    }

    fn expunge_forbidden(forbidden: &mut Vec<Instant>, now: Instant, window: Duration) {
        if let Some(cutoff) = now.checked_sub(window) {
            forbidden.retain(|stamp| *stamp > cutoff);
        }
    }
}
