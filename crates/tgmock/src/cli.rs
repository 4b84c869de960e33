//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tgmock_server::{
    MockConfig, Scenario,
    config::{DEFAULT_TOKEN, is_forceable_status},
};

/// tgmock - mock Telegram Bot API server with fault injection
///
/// Prints the listening port on stdout, then serves until interrupted.
#[derive(Parser, Debug)]
#[command(name = "tgmock")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Port to listen on (0 = random)
    #[arg(short, long, default_value_t = 0, env = "TGMOCK_PORT")]
    pub port: u16,

    /// Probability of returning 500 (0.0-1.0)
    #[arg(long, default_value_t = 0.0, value_parser = parse_rate, env = "TGMOCK_FAIL_RATE")]
    pub fail_rate: f64,

    /// Response delay in milliseconds, applied to every request
    #[arg(long, default_value_t = 0, env = "TGMOCK_DELAY_MS")]
    pub delay_ms: u64,

    /// Force this HTTP status code on every method (200-599, not 204, 205 or 304)
    #[arg(long, value_parser = parse_status, env = "TGMOCK_STATUS_CODE")]
    pub status_code: Option<u16>,

    /// Test scenario to activate: duplicate-updates, out-of-order, 429-retry,
    /// partial-read, slow-response, 401-unauthorized
    #[arg(long, env = "TGMOCK_SCENARIO")]
    pub scenario: Option<Scenario>,

    /// Seconds the slow-response scenario stalls before answering
    #[arg(long, default_value_t = 35, env = "TGMOCK_SLOW_RESPONSE_SECS")]
    pub slow_response_secs: u64,

    /// Bot token expected in request paths
    #[arg(long, default_value = DEFAULT_TOKEN, env = "TGMOCK_TOKEN")]
    pub token: String,

    /// Seed for the random failure source (reproducible --fail-rate runs)
    #[arg(long, env = "TGMOCK_SEED")]
    pub seed: Option<u64>,

    /// Enable request logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write JSON logs to a daily-rotated file in this directory
    #[arg(long, env = "TGMOCK_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    /// Server configuration described by these arguments.
    pub fn to_config(&self) -> MockConfig {
        let mut config = MockConfig::new()
            .with_port(self.port)
            .with_token(self.token.clone())
            .with_fail_rate(self.fail_rate)
            .with_delay(Duration::from_millis(self.delay_ms))
            .with_slow_response_delay(Duration::from_secs(self.slow_response_secs))
            .with_verbose(self.verbose);

        if let Some(status) = self.status_code {
            config = config.with_forced_status(status);
        }
        if let Some(scenario) = self.scenario {
            config = config.with_scenario(scenario);
        }
        config
    }
}

fn parse_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s.parse().map_err(|e| format!("not a number: {e}"))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("{rate} is not in 0.0..=1.0"))
    }
}

fn parse_status(s: &str) -> Result<u16, String> {
    let status: u16 = s.parse().map_err(|e| format!("not a status code: {e}"))?;
    if is_forceable_status(status) {
        Ok(status)
    } else {
        Err(format!(
            "{status} cannot carry an error body; use 200-599 except 204, 205 and 304"
        ))
    }
}
