//! Server configuration and CLI argument parsing
//!
//! Settings come from four layers:
//! - Command-line arguments
//! - Environment variables (with TIERGATE_ prefix)
//! - An optional TOML file passed with `--config`, holding the tier table
//! - Built-in defaults
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # Header-tiered limiting with two tiers
//! tiergate --tier free=1/5 --tier pro=20/40
//!
//! # Credential-gated limiting through the environment
//! export TIERGATE_POLICY=credential
//! export TIERGATE_RATE=5
//! export TIERGATE_BURST=10
//! tiergate
//!
//! # Tier table from a file, one tier overridden on the command line
//! tiergate --config tiers.toml --tier pro=50/100
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! [tiers]
//! free = { rate = 2, burst = 5 }
//! pro = { rate = 20, burst = 40 }
//! ```

use anyhow::{Context, Result, anyhow};
use axum::http::HeaderName;
use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tiergate::{
    CredentialGate, Governor, HeaderTier, LimiterRegistry, TierLimits, TierSpec, TierTable,
};

/// Main configuration structure for the server
#[derive(Debug, Clone)]
pub struct Config {
    /// Listener configuration
    pub listen: ListenConfig,
    /// How requests are classified and which limits apply
    pub policy: PolicyConfig,
    /// Idle bucket eviction settings
    pub eviction: EvictionConfig,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

/// Classification policy with its limits
#[derive(Debug, Clone)]
pub enum PolicyConfig {
    /// Meter only requests carrying one basic-auth credential
    Credential {
        username: String,
        password: String,
        limits: TierLimits,
    },
    /// Meter every request in the tier named by a header
    Header {
        header: String,
        default_tier: String,
        tiers: TierTable,
    },
}

/// Idle bucket eviction settings
#[derive(Debug, Clone, Copy)]
pub struct EvictionConfig {
    /// Seconds a bucket must be idle before it may be dropped (0 disables eviction)
    pub idle_timeout: u64,
    /// Seconds between sweeps
    pub sweep_interval: u64,
}

/// Available classification policies
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Basic-auth credential gate
    Credential,
    /// Tier-selector header
    Header,
}

impl std::str::FromStr for PolicyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "credential" => Ok(PolicyKind::Credential),
            "header" => Ok(PolicyKind::Header),
            _ => Err(anyhow!(
                "Invalid policy: {}. Valid options are: credential, header",
                s
            )),
        }
    }
}

/// Command-line arguments for the server
///
/// All arguments can also be set via environment variables with the
/// TIERGATE_ prefix. CLI arguments take precedence over environment variables.
///
/// # Examples
///
/// Header tiers with the built-in table:
/// ```bash
/// tiergate --port 9000
/// ```
///
/// Credential gate with debug logging:
/// ```bash
/// tiergate --policy credential --username trial --password s3cret --log-level debug
/// ```
#[derive(Parser, Debug)]
#[command(
    name = "tiergate",
    about = "Tiered token-bucket rate limiting service",
    long_about = "A tiered token-bucket rate limiting service for reverse-proxy forward-auth hooks.\n\nEnvironment variables with TIERGATE_ prefix are supported. CLI arguments take precedence over environment variables, which take precedence over the --config file."
)]
pub struct Args {
    // Listener
    #[arg(
        long,
        value_name = "HOST",
        help = "Listen host",
        default_value = "127.0.0.1",
        env = "TIERGATE_HOST"
    )]
    pub host: String,
    #[arg(
        long,
        value_name = "PORT",
        help = "Listen port",
        default_value_t = 8080,
        env = "TIERGATE_PORT"
    )]
    pub port: u16,

    // Policy
    #[arg(
        long,
        value_name = "POLICY",
        help = "Classification policy: credential, header",
        default_value = "header",
        env = "TIERGATE_POLICY"
    )]
    pub policy: PolicyKind,

    // Credential policy
    #[arg(
        long,
        value_name = "USER",
        help = "Username of the metered credential",
        default_value = "free",
        env = "TIERGATE_USERNAME"
    )]
    pub username: String,
    #[arg(
        long,
        value_name = "PASS",
        help = "Password of the metered credential",
        default_value = "free",
        env = "TIERGATE_PASSWORD"
    )]
    pub password: String,
    #[arg(
        long,
        value_name = "N",
        help = "Tokens per second for the credential policy",
        default_value_t = 10.0,
        env = "TIERGATE_RATE"
    )]
    pub rate: f64,
    #[arg(
        long,
        value_name = "N",
        help = "Bucket capacity for the credential policy",
        default_value_t = 20,
        env = "TIERGATE_BURST"
    )]
    pub burst: u32,

    // Header policy
    #[arg(
        long,
        value_name = "NAME",
        help = "Header carrying the tier name",
        default_value = "X-User-Category",
        env = "TIERGATE_TIER_HEADER"
    )]
    pub tier_header: String,
    #[arg(
        long,
        value_name = "TIER",
        help = "Tier used when the tier header is missing or blank",
        default_value = "free",
        env = "TIERGATE_DEFAULT_TIER"
    )]
    pub default_tier: String,
    #[arg(
        long = "tier",
        value_name = "NAME=RATE/BURST",
        help = "Tier limits (repeatable)",
        env = "TIERGATE_TIERS",
        value_delimiter = ','
    )]
    pub tiers: Vec<TierSpec>,
    #[arg(
        long,
        value_name = "PATH",
        help = "TOML file with a [tiers] table",
        env = "TIERGATE_CONFIG"
    )]
    pub config: Option<PathBuf>,

    // Eviction
    #[arg(
        long,
        value_name = "SECS",
        help = "Drop buckets idle for this long, 0 keeps them forever",
        default_value_t = 0,
        env = "TIERGATE_IDLE_TIMEOUT"
    )]
    pub idle_timeout: u64,
    #[arg(
        long,
        value_name = "SECS",
        help = "Interval between idle bucket sweeps",
        default_value_t = 60,
        env = "TIERGATE_SWEEP_INTERVAL"
    )]
    pub sweep_interval: u64,

    // General options
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "TIERGATE_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

/// Contents of the `--config` file
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    #[serde(default)]
    tiers: HashMap<String, FileTier>,
}

#[derive(Debug, Deserialize)]
struct FileTier {
    rate: f64,
    burst: u32,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or any
    /// value fails validation.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        Self::from_args(args)
    }

    /// Build configuration from already parsed arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let policy = match args.policy {
            PolicyKind::Credential => PolicyConfig::Credential {
                username: args.username,
                password: args.password,
                limits: TierLimits::new(args.rate, args.burst),
            },
            PolicyKind::Header => {
                let file = match &args.config {
                    Some(path) => Some(load_file(path)?),
                    None => None,
                };
                PolicyConfig::Header {
                    header: args.tier_header,
                    default_tier: args.default_tier,
                    tiers: resolve_tiers(file, args.tiers),
                }
            }
        };

        let config = Config {
            listen: ListenConfig {
                host: args.host,
                port: args.port,
            },
            policy,
            eviction: EvictionConfig {
                idle_timeout: args.idle_timeout,
                sweep_interval: args.sweep_interval,
            },
            log_level: args.log_level,
        };

        config.validate()?;

        Ok(config)
    }

    /// Socket address to bind
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.listen.host, self.listen.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid listen address {}:{}",
                    self.listen.host, self.listen.port
                )
            })
    }

    /// Build the bucket registry described by the eviction settings
    pub fn registry(&self) -> LimiterRegistry {
        let mut builder = LimiterRegistry::builder();
        if self.eviction.idle_timeout > 0 {
            builder = builder
                .idle_timeout(Duration::from_secs(self.eviction.idle_timeout))
                .sweep_interval(Duration::from_secs(self.eviction.sweep_interval.max(1)));
        }
        builder.build()
    }

    /// Build the admission engine for this configuration
    pub fn governor(&self) -> Governor {
        let registry = self.registry();
        match &self.policy {
            PolicyConfig::Credential {
                username,
                password,
                limits,
            } => {
                let gate = CredentialGate::new(username, password);
                let tiers = TierTable::single(gate.tier(), *limits);
                Governor::with_registry(gate, tiers, registry)
            }
            PolicyConfig::Header {
                header,
                default_tier,
                tiers,
            } => Governor::with_registry(
                HeaderTier::new(header.as_str(), default_tier.as_str()),
                tiers.clone(),
                registry,
            ),
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the port is zero or the tier header is not a
    /// valid HTTP header name.
    fn validate(&self) -> Result<()> {
        if self.listen.port == 0 {
            return Err(anyhow!("Port must be between 1 and 65535"));
        }

        if let PolicyConfig::Header { header, .. } = &self.policy {
            HeaderName::from_bytes(header.as_bytes())
                .map_err(|_| anyhow!("Invalid tier header name: {:?}", header))?;
        }

        Ok(())
    }

    /// Print all available environment variables and their descriptions
    fn print_env_vars() {
        println!("tiergate Environment Variables");
        println!("==============================");
        println!();
        println!("All environment variables use the TIERGATE_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Listener Configuration:");
        println!("  TIERGATE_HOST=<host>               Listen host [default: 127.0.0.1]");
        println!("  TIERGATE_PORT=<port>               Listen port [default: 8080]");
        println!();

        println!("Policy Configuration:");
        println!(
            "  TIERGATE_POLICY=<policy>           Classification policy: credential, header [default: header]"
        );
        println!();
        println!("  For credential policy:");
        println!("    TIERGATE_USERNAME=<user>         Metered username [default: free]");
        println!("    TIERGATE_PASSWORD=<pass>         Metered password [default: free]");
        println!("    TIERGATE_RATE=<n>                Tokens per second [default: 10]");
        println!("    TIERGATE_BURST=<n>               Bucket capacity [default: 20]");
        println!();
        println!("  For header policy:");
        println!(
            "    TIERGATE_TIER_HEADER=<name>      Header carrying the tier [default: X-User-Category]"
        );
        println!("    TIERGATE_DEFAULT_TIER=<tier>     Tier for blank headers [default: free]");
        println!(
            "    TIERGATE_TIERS=<list>            Comma list of name=rate/burst [default: free=2/5,pro=20/40,enterprise=100/200]"
        );
        println!("    TIERGATE_CONFIG=<path>           TOML file with a [tiers] table");
        println!();

        println!("Eviction Configuration:");
        println!(
            "  TIERGATE_IDLE_TIMEOUT=<secs>       Idle time before a bucket may be dropped, 0 = never [default: 0]"
        );
        println!("  TIERGATE_SWEEP_INTERVAL=<secs>     Interval between sweeps [default: 60]");
        println!();

        println!("General Configuration:");
        println!(
            "  TIERGATE_LOG_LEVEL=<level>         Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("Examples:");
        println!("  # Three tiers behind a reverse proxy");
        println!("  export TIERGATE_TIERS=free=1/5,pro=10/20,enterprise=100/200");
        println!();
        println!("  # Meter a single shared trial account");
        println!("  export TIERGATE_POLICY=credential");
        println!("  export TIERGATE_USERNAME=trial");
        println!();
        println!("  # Run server (CLI args override env vars)");
        println!("  tiergate --port 9090  # Will use port 9090 whatever TIERGATE_PORT says");
    }
}

fn load_file(path: &Path) -> Result<FileSettings> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    settings
        .try_deserialize()
        .with_context(|| format!("Invalid config file {}", path.display()))
}

/// Merge the tier sources: file entries first, then CLI/env specs on top.
/// With neither source present the built-in table applies.
fn resolve_tiers(file: Option<FileSettings>, specs: Vec<TierSpec>) -> TierTable {
    let file_tiers = file.map(|f| f.tiers).unwrap_or_default();
    if file_tiers.is_empty() && specs.is_empty() {
        return TierTable::standard();
    }

    file_tiers
        .into_iter()
        .map(|(name, tier)| TierSpec {
            name,
            limits: TierLimits::new(tier.rate, tier.burst),
        })
        .chain(specs)
        .collect()
}
