//! Mock server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Result, ServerError};
use crate::scenario::Scenario;

/// Bot token expected in request paths.
pub const DEFAULT_TOKEN: &str = "TESTTOKEN123";

/// Sleep applied by the `slow-response` scenario. Longer than any sane client timeout.
pub const DEFAULT_SLOW_RESPONSE_DELAY: Duration = Duration::from_secs(35);

/// Default max request body size (1 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Whether `status` can be forced on every reply.
///
/// The error envelope must reach the client, so informational statuses and
/// the bodiless 204, 205 and 304 are excluded.
pub fn is_forceable_status(status: u16) -> bool {
    (200..=599).contains(&status) && !matches!(status, 204 | 205 | 304)
}

/// Mock server configuration.
///
/// Immutable once handed to [`MockServer`](crate::MockServer).
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Address to bind to. Port 0 lets the OS pick one.
    pub bind_address: SocketAddr,

    /// Token matched in the `/bot<token>/` path prefix.
    pub token: String,

    /// Probability in `[0, 1]` of answering with a 500.
    pub fail_rate: f64,

    /// Added to every request before anything else happens.
    pub delay: Duration,

    /// When set, every routed method fails with this status.
    pub forced_status: Option<u16>,

    /// Active failure scenario.
    pub scenario: Option<Scenario>,

    /// Log each request.
    pub verbose: bool,

    /// How long `slow-response` sleeps before answering `getUpdates`.
    pub slow_response_delay: Duration,

    /// Request bodies beyond this size are treated as empty.
    pub max_body_size: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            token: DEFAULT_TOKEN.to_string(),
            fail_rate: 0.0,
            delay: Duration::ZERO,
            forced_status: None,
            scenario: None,
            verbose: false,
            slow_response_delay: DEFAULT_SLOW_RESPONSE_DELAY,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl MockConfig {
    /// Create a config with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Bind to `127.0.0.1:<port>`.
    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_address = SocketAddr::from(([127, 0, 0, 1], port));
        self
    }

    /// Set the path token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Set the random failure probability.
    pub fn with_fail_rate(mut self, rate: f64) -> Self {
        self.fail_rate = rate;
        self
    }

    /// Set the per-request delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Force every routed request to fail with `status`.
    pub fn with_forced_status(mut self, status: u16) -> Self {
        self.forced_status = Some(status);
        self
    }

    /// Activate a scenario.
    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = Some(scenario);
        self
    }

    /// Enable or disable per-request logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the `slow-response` sleep.
    pub fn with_slow_response_delay(mut self, delay: Duration) -> Self {
        self.slow_response_delay = delay;
        self
    }

    /// Set the maximum request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// The path prefix every Bot API request must start with.
    pub fn path_prefix(&self) -> String {
        format!("/bot{}/", self.token)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fail_rate) {
            return Err(ServerError::Config(format!(
                "fail rate must be between 0.0 and 1.0, got {}",
                self.fail_rate
            )));
        }

        if let Some(status) = self.forced_status {
            if !is_forceable_status(status) {
                return Err(ServerError::Config(format!(
                    "forced status code must be 200-599 and allow a body (not 204, 205 or 304), got {}",
                    status
                )));
            }
        }

        if self.token.is_empty() || self.token.contains('/') {
            return Err(ServerError::Config(format!(
                "token must be non-empty and contain no '/', got {:?}",
                self.token
            )));
        }

        Ok(())
    }
}
