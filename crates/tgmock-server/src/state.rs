//! State shared across requests.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::MockConfig;
use crate::policy::{FaultPolicy, SessionState, SharedFaultSource, ThreadRngSource};

/// Per-instance state handed to every request.
///
/// Two servers never share a `MockState`, so one-shot scenarios on one
/// instance do not leak into another.
#[derive(Clone, Debug)]
pub struct MockState {
    /// Immutable configuration.
    pub config: Arc<MockConfig>,

    /// Fault policy, holding the session's one-shot flag.
    pub policy: FaultPolicy,

    /// Cached `/bot<token>/` prefix.
    pub path_prefix: Arc<str>,

    /// Cancelled when the server is told to stop. Stalled requests watch it.
    pub shutdown: CancellationToken,
}

impl MockState {
    /// Create state using the thread-local RNG for random failures.
    pub fn new(config: MockConfig) -> Self {
        Self::with_fault_source(config, Arc::new(ThreadRngSource))
    }

    /// Create state with a specific random source.
    pub fn with_fault_source(config: MockConfig, source: SharedFaultSource) -> Self {
        let path_prefix: Arc<str> = config.path_prefix().into();
        let config = Arc::new(config);
        let session = Arc::new(SessionState::new());
        Self {
            policy: FaultPolicy::new(Arc::clone(&config), session, source),
            config,
            path_prefix,
            shutdown: CancellationToken::new(),
        }
    }

    /// The session's mutable state.
    pub fn session(&self) -> &SessionState {
        self.policy.session()
    }
}
