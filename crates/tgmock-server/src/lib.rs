//! Mock Telegram Bot API server for client integration tests.
//!
//! Answers a handful of Bot API methods with canned data and can be told to
//! misbehave: random 500s, forced status codes, added latency, and a set of
//! named [`Scenario`]s (duplicate or out-of-order updates, a one-shot 429, a
//! 401 on `getUpdates`, a truncated body, a stalled response).
//!
//! # Example
//!
//! ```no_run
//! use tgmock_server::{MockConfig, MockServer, Scenario};
//!
//! # async fn example() -> tgmock_server::Result<()> {
//! let config = MockConfig::new().with_scenario(Scenario::Retry429);
//! let handle = MockServer::new(config)?.start().await?;
//!
//! println!("{}", handle.bot_url("getMe"));
//!
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod methods;
pub mod policy;
pub mod scenario;
pub mod state;
pub mod types;

pub use config::MockConfig;
pub use error::{ApiError, Result, ServerError};
pub use methods::{BotMethod, MethodReply};
pub use policy::{
    FaultPolicy, FaultSource, FixedSource, SeededSource, SessionState, SharedFaultSource,
    ThreadRngSource, should_fail,
};
pub use scenario::{Scenario, UnknownScenario};
pub use state::MockState;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// How long shutdown waits for open connections before aborting them.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// The mock server, configured but not yet listening.
pub struct MockServer {
    state: MockState,
}

impl MockServer {
    /// Create a server. Fails if the configuration does not validate.
    pub fn new(config: MockConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: MockState::new(config),
        })
    }

    /// Replace the random source used for `fail_rate`.
    pub fn with_fault_source(self, source: SharedFaultSource) -> Self {
        let config = MockConfig::clone(&self.state.config);
        Self {
            state: MockState::with_fault_source(config, source),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &MockConfig {
        &self.state.config
    }

    /// This instance's session state.
    pub fn session(&self) -> &SessionState {
        self.state.session()
    }

    /// Build the router. Every path goes to the dispatcher.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(dispatch::dispatch)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ))
            .layer(middleware::map_response(logging::server_header))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the listener and serve in the background.
    ///
    /// Returns once the socket is bound, so the port is known and requests
    /// can be sent straight away.
    pub async fn start(self) -> Result<ServerHandle> {
        let addr = self.state.config.bind_address;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, scenario = ?self.state.config.scenario, "Mock server listening");

        let router = self.router();
        let shutdown = self.state.shutdown.clone();
        let task = tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
        });

        Ok(ServerHandle {
            addr: local_addr,
            path_prefix: Arc::clone(&self.state.path_prefix),
            shutdown: self.state.shutdown.clone(),
            task,
        })
    }
}

/// Handle to a running mock server.
///
/// Dropping the handle also stops the server.
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    path_prefix: Arc<str>,
    shutdown: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bound port. Never 0, even when port 0 was requested.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// `http://<addr>`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Full URL for a Bot API method on this server.
    pub fn bot_url(&self, method: &str) -> String {
        format!("http://{}{}{}", self.addr, self.path_prefix, method)
    }

    /// Stop accepting connections and wait for the server task to end.
    ///
    /// Stalled requests (`delay`, `slow-response`) are cut off and their
    /// connections dropped. Anything still open after [`SHUTDOWN_GRACE`] is
    /// aborted.
    pub async fn shutdown(mut self) -> Result<()> {
        self.shutdown.cancel();
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut self.task).await {
            Ok(joined) => self.finish(joined),
            Err(_) => {
                warn!(addr = %self.addr, "Connections still open after grace period, aborting");
                self.task.abort();
                let joined = (&mut self.task).await;
                self.finish(joined)
            }
        }
    }

    /// Wait for the server task to end without signalling it.
    pub async fn wait(mut self) -> Result<()> {
        self.join().await
    }

    async fn join(&mut self) -> Result<()> {
        let joined = (&mut self.task).await;
        self.finish(joined)
    }

    fn finish(
        &self,
        joined: std::result::Result<std::io::Result<()>, tokio::task::JoinError>,
    ) -> Result<()> {
        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => return Err(ServerError::Io(std::io::Error::other(e))),
        };
        info!(addr = %self.addr, "Mock server stopped");
        Ok(result?)
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
