//! Fault injection policy.
//!
//! Decides, before any method handler runs, whether a request should be
//! answered with an injected error. Checks run in a fixed order and the
//! first one that fires wins:
//!
//! 1. `429-retry` scenario, once per server instance
//! 2. `401-unauthorized` scenario, `getUpdates` only
//! 3. forced status code, every method
//! 4. random failure at `fail_rate`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::MockConfig;
use crate::error::ApiError;
use crate::scenario::Scenario;

/// Seconds advertised in `Retry-After` by the `429-retry` scenario.
pub const RETRY_AFTER_SECS: u64 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Random source
// ─────────────────────────────────────────────────────────────────────────────

/// Source of uniform samples in `[0, 1)` for the random failure check.
pub trait FaultSource: Send + Sync {
    fn sample(&self) -> f64;
}

/// Shared fault source.
pub type SharedFaultSource = Arc<dyn FaultSource>;

/// Thread-local RNG. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSource;

impl FaultSource for ThreadRngSource {
    fn sample(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Deterministic RNG seeded from a `u64`, for reproducible runs.
#[derive(Debug)]
pub struct SeededSource {
    rng: Mutex<StdRng>,
}

impl SeededSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl FaultSource for SeededSource {
    fn sample(&self) -> f64 {
        self.rng.lock().random::<f64>()
    }
}

/// Always returns the same sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource(pub f64);

impl FaultSource for FixedSource {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// Whether a request should fail at `fail_rate`.
///
/// A rate of zero or below never fails and a rate of one or above always
/// fails, without consulting `source`.
pub fn should_fail(fail_rate: f64, source: &dyn FaultSource) -> bool {
    if fail_rate <= 0.0 {
        return false;
    }
    if fail_rate >= 1.0 {
        return true;
    }
    source.sample() < fail_rate
}

// ─────────────────────────────────────────────────────────────────────────────
// Session state
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable state that lives as long as one server instance.
#[derive(Debug, Default)]
pub struct SessionState {
    retry_sent: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the one-shot 429. Returns `true` for exactly one caller.
    pub fn take_retry_slot(&self) -> bool {
        !self.retry_sent.swap(true, Ordering::AcqRel)
    }

    /// Whether the one-shot 429 has been sent.
    pub fn retry_sent(&self) -> bool {
        self.retry_sent.load(Ordering::Acquire)
    }
}

/// True the first time it is called for the `429-retry` scenario on this state.
pub fn is_retry_scenario_first_hit(scenario: Option<Scenario>, state: &SessionState) -> bool {
    scenario == Some(Scenario::Retry429) && state.take_retry_slot()
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Fault policy bound to one server instance.
#[derive(Clone)]
pub struct FaultPolicy {
    config: Arc<MockConfig>,
    session: Arc<SessionState>,
    source: SharedFaultSource,
}

impl FaultPolicy {
    pub fn new(config: Arc<MockConfig>, session: Arc<SessionState>, source: SharedFaultSource) -> Self {
        Self {
            config,
            session,
            source,
        }
    }

    /// The injected error for a request to `method`, if any.
    pub fn evaluate(&self, method: &str) -> Option<ApiError> {
        let scenario = self.config.scenario;

        if is_retry_scenario_first_hit(scenario, &self.session) {
            return Some(ApiError::TooManyRequests {
                retry_after: RETRY_AFTER_SECS,
            });
        }

        if scenario == Some(Scenario::Unauthorized) && method == "getUpdates" {
            return Some(ApiError::Unauthorized);
        }

        if let Some(status) = self.config.forced_status {
            return Some(ApiError::Forced(status));
        }

        if should_fail(self.config.fail_rate, self.source.as_ref()) {
            return Some(ApiError::Internal);
        }

        None
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }
}

impl std::fmt::Debug for FaultPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultPolicy")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
