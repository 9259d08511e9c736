//! Dispatcher configuration and CLI argument parsing
//!
//! Every option can be given on the command line or through an environment
//! variable with the `KEYRELAY_` prefix.
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # Two keys against a local mock exchange, for one minute
//! keyrelay --api-keys KEY1,KEY2 --mock-exchange --duration-secs 60
//!
//! # Using environment variables
//! export KEYRELAY_API_KEYS=KEY1,KEY2
//! export KEYRELAY_STRATEGY=pool
//! keyrelay --log-file run.log
//!
//! # Summarize a previous run
//! keyrelay --analyze run.log
//! ```

use crate::bridge::DEFAULT_POOL_SIZE;
use crate::limiter::DEFAULT_POLL_INTERVAL;
use crate::source::{ArrivalPattern, DEFAULT_ARRIVAL_FACTOR};
use crate::ttl::TtlPolicy;
use crate::worker::DispatchStrategy;
use anyhow::{Result, anyhow};
use clap::Parser;
use keyrelay::{AdmissionError, Rate, RateLimiter};
use std::path::PathBuf;
use std::time::Duration;

/// Validated settings for one run
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote endpoint every call is sent to
    pub url: String,
    /// One channel per key
    pub api_keys: Vec<String>,
    pub strategy: DispatchStrategy,
    pub limiter: LimiterConfig,
    /// Maximum request age before it is dropped
    pub ttl: Duration,
    /// Extra slack added to `ttl`
    pub ttl_grace: Duration,
    /// Upper bound on one transport call
    pub call_timeout: Duration,
    /// Blocking slots per channel for the pool strategy
    pub pool_size: usize,
    pub arrival: ArrivalConfig,
    /// Stop after this long; run until Ctrl-C when unset
    pub duration: Option<Duration>,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    /// Serve a mock exchange in-process
    pub mock_exchange: Option<MockExchangeConfig>,
    /// Answer calls in-process instead of over HTTP
    pub loopback: bool,
    /// Analyze this log file instead of dispatching
    pub analyze: Option<PathBuf>,
}

/// Per-channel admission settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterConfig {
    /// Admissions allowed per trailing second
    pub per_second_rate: usize,
    /// Gap between admissions; `None` means `1s / per_second_rate`
    pub min_spacing: Option<Duration>,
    pub poll_interval: Duration,
}

/// Request generation settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrivalConfig {
    /// Production rate relative to total capacity
    pub factor: f64,
    /// Constant inter-arrival time instead of uniform jitter
    pub fixed: bool,
}

/// In-process mock exchange settings
#[derive(Debug, Clone, PartialEq)]
pub struct MockExchangeConfig {
    pub host: String,
    pub port: u16,
    /// Per-key cap the exchange enforces
    pub per_second_rate: usize,
}

/// Command-line arguments for the dispatcher
///
/// All arguments can also be set via environment variables with the
/// KEYRELAY_ prefix. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(
    name = "keyrelay",
    about = "Rate-limited API request dispatcher",
    long_about = "Dispatches a stream of API requests across several API keys, keeping each key under its request-rate cap and dropping requests that outlive their TTL.\n\nEnvironment variables with KEYRELAY_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // Remote
    #[arg(
        long,
        value_name = "URL",
        help = "Endpoint for outbound calls",
        default_value = "http://127.0.0.1:9999/api/request",
        env = "KEYRELAY_URL"
    )]
    pub url: String,
    #[arg(
        long,
        value_name = "KEYS",
        help = "Comma-separated API keys, one channel each",
        value_delimiter = ',',
        env = "KEYRELAY_API_KEYS"
    )]
    pub api_keys: Vec<String>,

    // Dispatch
    #[arg(
        long,
        value_name = "STRATEGY",
        help = "Dispatch strategy: async, pool",
        default_value = "async",
        env = "KEYRELAY_STRATEGY"
    )]
    pub strategy: DispatchStrategy,
    #[arg(
        long,
        value_name = "N",
        help = "Requests allowed per key per second",
        default_value_t = 20,
        env = "KEYRELAY_PER_SECOND_RATE"
    )]
    pub per_second_rate: usize,
    #[arg(
        long,
        value_name = "MS",
        help = "Minimum gap between two calls on one key [default: 1000 / rate]",
        env = "KEYRELAY_MIN_SPACING_MS"
    )]
    pub min_spacing_ms: Option<u64>,
    #[arg(
        long,
        value_name = "MS",
        help = "Request time-to-live",
        default_value_t = 1000,
        env = "KEYRELAY_TTL_MS"
    )]
    pub ttl_ms: u64,
    #[arg(
        long,
        value_name = "MS",
        help = "Extra slack added to the TTL",
        default_value_t = 0,
        env = "KEYRELAY_TTL_GRACE_MS"
    )]
    pub ttl_grace_ms: u64,
    #[arg(
        long,
        value_name = "MS",
        help = "Upper bound on a single call",
        default_value_t = 1000,
        env = "KEYRELAY_CALL_TIMEOUT_MS"
    )]
    pub call_timeout_ms: u64,
    #[arg(
        long,
        value_name = "N",
        help = "Blocking slots per key for the pool strategy",
        default_value_t = DEFAULT_POOL_SIZE,
        env = "KEYRELAY_POOL_SIZE"
    )]
    pub pool_size: usize,
    #[arg(
        long,
        value_name = "US",
        help = "Rate limiter polling interval in microseconds",
        default_value_t = DEFAULT_POLL_INTERVAL.as_micros() as u64,
        env = "KEYRELAY_POLL_INTERVAL_US"
    )]
    pub poll_interval_us: u64,

    // Request source
    #[arg(
        long,
        value_name = "FACTOR",
        help = "Request production rate relative to total capacity",
        default_value_t = DEFAULT_ARRIVAL_FACTOR,
        env = "KEYRELAY_ARRIVAL_FACTOR"
    )]
    pub arrival_factor: f64,
    #[arg(
        long,
        help = "Produce requests at a constant rate instead of with random delays",
        env = "KEYRELAY_FIXED_ARRIVAL"
    )]
    pub fixed_arrival: bool,
    #[arg(
        long,
        value_name = "SECS",
        help = "Stop after this many seconds [default: run until Ctrl-C]",
        env = "KEYRELAY_DURATION_SECS"
    )]
    pub duration_secs: Option<u64>,

    // Logging
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "KEYRELAY_LOG_LEVEL"
    )]
    pub log_level: String,
    #[arg(
        long,
        value_name = "PATH",
        help = "Also append log lines to this file",
        env = "KEYRELAY_LOG_FILE"
    )]
    pub log_file: Option<PathBuf>,

    // Mock exchange
    #[arg(
        long,
        help = "Serve a mock exchange in-process",
        env = "KEYRELAY_MOCK_EXCHANGE"
    )]
    pub mock_exchange: bool,
    #[arg(
        long,
        value_name = "HOST",
        help = "Mock exchange host",
        default_value = "127.0.0.1",
        env = "KEYRELAY_MOCK_HOST"
    )]
    pub mock_host: String,
    #[arg(
        long,
        value_name = "PORT",
        help = "Mock exchange port",
        default_value_t = 9999,
        env = "KEYRELAY_MOCK_PORT"
    )]
    pub mock_port: u16,
    #[arg(
        long,
        value_name = "N",
        help = "Per-key rate the mock exchange enforces [default: --per-second-rate]",
        env = "KEYRELAY_MOCK_RATE"
    )]
    pub mock_rate: Option<usize>,
    #[arg(
        long,
        help = "Answer calls in-process instead of over HTTP",
        env = "KEYRELAY_LOOPBACK"
    )]
    pub loopback: bool,

    // Utility options
    #[arg(long, value_name = "LOG", help = "Summarize a log file and exit")]
    pub analyze: Option<PathBuf>,
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        Self::from_args(args)
    }

    /// Fold parsed arguments into a validated configuration
    pub fn from_args(args: Args) -> Result<Self> {
        let api_keys = args
            .api_keys
            .into_iter()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect();

        let mock_exchange = args.mock_exchange.then(|| MockExchangeConfig {
            host: args.mock_host,
            port: args.mock_port,
            per_second_rate: args.mock_rate.unwrap_or(args.per_second_rate),
        });

        let config = Config {
            url: args.url,
            api_keys,
            strategy: args.strategy,
            limiter: LimiterConfig {
                per_second_rate: args.per_second_rate,
                min_spacing: args.min_spacing_ms.map(Duration::from_millis),
                poll_interval: Duration::from_micros(args.poll_interval_us),
            },
            ttl: Duration::from_millis(args.ttl_ms),
            ttl_grace: Duration::from_millis(args.ttl_grace_ms),
            call_timeout: Duration::from_millis(args.call_timeout_ms),
            pool_size: args.pool_size,
            arrival: ArrivalConfig {
                factor: args.arrival_factor,
                fixed: args.fixed_arrival,
            },
            duration: args.duration_secs.map(Duration::from_secs),
            log_level: args.log_level,
            log_file: args.log_file,
            mock_exchange,
            loopback: args.loopback,
            analyze: args.analyze,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Analysis reads a log and needs nothing else
        if self.analyze.is_some() {
            return Ok(());
        }

        if self.api_keys.is_empty() {
            return Err(anyhow!(
                "At least one API key must be specified.\n\n\
                Example:\n  \
                keyrelay --api-keys KEY1,KEY2\n  \
                KEYRELAY_API_KEYS=KEY1,KEY2 keyrelay\n\n\
                For more information, try '--help'"
            ));
        }
        if self.limiter.per_second_rate == 0 {
            return Err(anyhow!("--per-second-rate must be positive"));
        }
        if self.limiter.poll_interval.is_zero() {
            return Err(anyhow!("--poll-interval-us must be positive"));
        }
        if self.ttl.is_zero() {
            return Err(anyhow!("--ttl-ms must be positive"));
        }
        if self.call_timeout.is_zero() {
            return Err(anyhow!("--call-timeout-ms must be positive"));
        }
        if self.pool_size == 0 {
            return Err(anyhow!("--pool-size must be positive"));
        }
        if !self.arrival.factor.is_finite() || self.arrival.factor <= 0.0 {
            return Err(anyhow!("--arrival-factor must be a positive number"));
        }
        if let Some(mock) = &self.mock_exchange {
            if mock.per_second_rate == 0 {
                return Err(anyhow!("--mock-rate must be positive"));
            }
        }

        Ok(())
    }

    /// Total calls per second the channels may make together
    pub fn capacity_per_second(&self) -> usize {
        self.api_keys.len() * self.limiter.per_second_rate
    }

    /// Gap between admissions on one channel
    pub fn spacing(&self) -> Duration {
        self.limiter.min_spacing.unwrap_or_else(|| {
            let rate = u32::try_from(self.limiter.per_second_rate).unwrap_or(u32::MAX);
            Rate::per_second(rate).spacing()
        })
    }

    /// A fresh limiter for one channel
    pub fn build_limiter(&self) -> Result<RateLimiter, AdmissionError> {
        RateLimiter::builder()
            .per_second(self.limiter.per_second_rate)
            .min_spacing(self.spacing())
            .build()
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy::new(self.ttl).with_grace(self.ttl_grace)
    }

    pub fn arrival_pattern(&self) -> ArrivalPattern {
        ArrivalPattern::for_capacity(
            self.api_keys.len(),
            self.limiter.per_second_rate,
            self.arrival.factor,
            !self.arrival.fixed,
        )
    }

    /// Print all available environment variables and their descriptions
    fn print_env_vars() {
        println!("keyrelay Environment Variables");
        println!("==============================");
        println!();
        println!("All environment variables use the KEYRELAY_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Remote:");
        println!(
            "  KEYRELAY_URL=<url>                    Endpoint for outbound calls [default: http://127.0.0.1:9999/api/request]"
        );
        println!("  KEYRELAY_API_KEYS=<k1,k2,...>         Comma-separated API keys (required)");
        println!();

        println!("Dispatch:");
        println!("  KEYRELAY_STRATEGY=<strategy>          async or pool [default: async]");
        println!("  KEYRELAY_PER_SECOND_RATE=<n>          Requests per key per second [default: 20]");
        println!("  KEYRELAY_MIN_SPACING_MS=<ms>          Minimum gap between calls [default: 1000 / rate]");
        println!("  KEYRELAY_TTL_MS=<ms>                  Request time-to-live [default: 1000]");
        println!("  KEYRELAY_TTL_GRACE_MS=<ms>            Extra TTL slack [default: 0]");
        println!("  KEYRELAY_CALL_TIMEOUT_MS=<ms>         Upper bound on a single call [default: 1000]");
        println!("  KEYRELAY_POOL_SIZE=<n>                Blocking slots per key [default: 20]");
        println!("  KEYRELAY_POLL_INTERVAL_US=<us>        Limiter polling interval [default: 500]");
        println!();

        println!("Request Source:");
        println!("  KEYRELAY_ARRIVAL_FACTOR=<f>           Production rate / capacity [default: 1.05]");
        println!("  KEYRELAY_FIXED_ARRIVAL=true|false     Constant arrival rate [default: false]");
        println!("  KEYRELAY_DURATION_SECS=<secs>         Stop after this long [default: until Ctrl-C]");
        println!();

        println!("Logging:");
        println!(
            "  KEYRELAY_LOG_LEVEL=<level>            Log level: error, warn, info, debug, trace [default: info]"
        );
        println!("  KEYRELAY_LOG_FILE=<path>              Also append log lines to this file");
        println!();

        println!("Mock Exchange:");
        println!("  KEYRELAY_MOCK_EXCHANGE=true|false     Serve a mock exchange in-process");
        println!("  KEYRELAY_MOCK_HOST=<host>             Mock exchange host [default: 127.0.0.1]");
        println!("  KEYRELAY_MOCK_PORT=<port>             Mock exchange port [default: 9999]");
        println!("  KEYRELAY_MOCK_RATE=<n>                Per-key cap of the mock [default: rate]");
        println!("  KEYRELAY_LOOPBACK=true|false          Answer calls in-process, no HTTP");
        println!();

        println!("Examples:");
        println!("  # Two keys against the built-in mock exchange");
        println!("  export KEYRELAY_API_KEYS=KEY1,KEY2");
        println!("  export KEYRELAY_MOCK_EXCHANGE=true");
        println!();
        println!("  # Run (CLI args override env vars)");
        println!("  keyrelay --strategy pool  # Uses the pool strategy whatever KEYRELAY_STRATEGY says");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config> {
        let argv = std::iter::once("keyrelay").chain(args.iter().copied());
        Config::from_args(Args::try_parse_from(argv)?)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--api-keys", "KEY1,KEY2"]).unwrap();

        assert_eq!(config.api_keys, vec!["KEY1", "KEY2"]);
        assert_eq!(config.strategy, DispatchStrategy::Async);
        assert_eq!(config.limiter.per_second_rate, 20);
        assert_eq!(config.spacing(), Duration::from_millis(50));
        assert_eq!(config.ttl, Duration::from_millis(1000));
        assert_eq!(config.ttl_grace, Duration::ZERO);
        assert_eq!(config.call_timeout, Duration::from_millis(1000));
        assert_eq!(config.pool_size, 20);
        assert_eq!(config.limiter.poll_interval, Duration::from_micros(500));
        assert_eq!(config.capacity_per_second(), 40);
        assert!(config.mock_exchange.is_none());
        assert!(config.duration.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--api-keys",
            "A, B ,,C",
            "--strategy",
            "pool",
            "--per-second-rate",
            "10",
            "--min-spacing-ms",
            "80",
            "--ttl-grace-ms",
            "5",
            "--fixed-arrival",
            "--duration-secs",
            "30",
            "--mock-exchange",
            "--mock-port",
            "8123",
        ])
        .unwrap();

        assert_eq!(config.api_keys, vec!["A", "B", "C"]);
        assert_eq!(config.strategy, DispatchStrategy::Pool);
        assert_eq!(config.spacing(), Duration::from_millis(80));
        assert_eq!(config.ttl_policy().grace, Duration::from_millis(5));
        assert_eq!(config.duration, Some(Duration::from_secs(30)));
        assert_eq!(
            config.mock_exchange,
            Some(MockExchangeConfig {
                host: "127.0.0.1".to_string(),
                port: 8123,
                per_second_rate: 10,
            })
        );
        assert!(matches!(
            config.arrival_pattern(),
            ArrivalPattern::Fixed { .. }
        ));

        let limiter = config.build_limiter().unwrap();
        assert_eq!(limiter.per_second_rate(), 10);
        assert_eq!(limiter.min_spacing(), Duration::from_millis(80));
    }

    #[test]
    fn test_validation() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--api-keys", " , "]).is_err());
        assert!(parse(&["--api-keys", "K", "--per-second-rate", "0"]).is_err());
        assert!(parse(&["--api-keys", "K", "--ttl-ms", "0"]).is_err());
        assert!(parse(&["--api-keys", "K", "--pool-size", "0"]).is_err());
        assert!(parse(&["--api-keys", "K", "--arrival-factor", "-1"]).is_err());
        assert!(parse(&["--api-keys", "K", "--mock-exchange", "--mock-rate", "0"]).is_err());
        assert!(parse(&["--api-keys", "K", "--strategy", "threads"]).is_err());

        // Analysis mode needs no keys
        assert!(parse(&["--analyze", "run.log"]).is_ok());
    }
}
