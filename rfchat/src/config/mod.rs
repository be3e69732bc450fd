//! Configuration for the `rfchat` binary.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/rfchat/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use crate::session::SessionConfig;
use crate::transport::Endpoint;
use crate::transport::endpoint::MAX_RFCOMM_CHANNEL;

/// Default TCP listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:12345";

/// Default RFCOMM channel.
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The endpoint to connect to could not be parsed.
    #[error("invalid endpoint {0:?} (expected host:port or rfcomm://AA:BB:CC:DD:EE:FF/channel)")]
    InvalidEndpoint(String),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    network: NetworkFileConfig,
    session: SessionFileConfig,
    ui: UiFileConfig,
}

/// `[network]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct NetworkFileConfig {
    bind: Option<String>,
    rfcomm_channel: Option<u8>,
    connect_timeout_secs: Option<u64>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    local_label: Option<String>,
    peer_label: Option<String>,
    poll_interval_ms: Option<u64>,
    preview_chars: Option<usize>,
    event_buffer: Option<usize>,
    input_buffer: Option<usize>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    timestamp_format: Option<String>,
    show_timestamps: Option<bool>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Where `listen` accepts its single connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenOn {
    /// A TCP address.
    Tcp(String),
    /// An RFCOMM channel on the local adapter.
    Rfcomm(u8),
}

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Wait for one peer, then chat.
    Listen(ListenOn),
    /// Connect to a peer, then chat.
    Connect(Endpoint),
    /// Round-trip a sample message through the encryption layer.
    SelfTest,
}

impl Mode {
    /// Default `(local, peer)` labels for this role.
    const fn labels(&self) -> (&'static str, &'static str) {
        match self {
            Self::Listen(_) => ("Server", "Client"),
            Self::Connect(_) | Self::SelfTest => ("Client", "Server"),
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Selected command.
    pub mode: Mode,
    /// Shared password; `None` chats in plaintext.
    pub password: Option<String>,
    /// Bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// Session engine settings, labels included.
    pub session: SessionConfig,
    /// Capacity of the local input channel.
    pub input_buffer: usize,
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,
    /// Whether console lines carry a timestamp.
    pub show_timestamps: bool,
}

impl ChatConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path
    /// (`~/.config/rfchat/config.toml`) is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or if the `connect` endpoint is malformed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. Separated from `load()` so it can be
    /// tested without touching the filesystem.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let mode = match &cli.command {
            Command::Listen {
                bind,
                rfcomm,
                channel,
            } => Mode::Listen(if *rfcomm {
                ListenOn::Rfcomm(
                    channel
                        .or(file.network.rfcomm_channel)
                        .unwrap_or(DEFAULT_RFCOMM_CHANNEL),
                )
            } else {
                ListenOn::Tcp(
                    bind.clone()
                        .or_else(|| file.network.bind.clone())
                        .unwrap_or_else(|| DEFAULT_BIND.to_string()),
                )
            }),
            Command::Connect { endpoint } => Mode::Connect(
                endpoint
                    .parse()
                    .map_err(|_| ConfigError::InvalidEndpoint(endpoint.clone()))?,
            ),
            Command::Selftest => Mode::SelfTest,
        };

        let (local_default, peer_default) = mode.labels();
        let defaults = SessionConfig::default();
        let session = SessionConfig {
            local_label: cli
                .name
                .clone()
                .or_else(|| file.session.local_label.clone())
                .unwrap_or_else(|| local_default.to_string()),
            peer_label: file
                .session
                .peer_label
                .clone()
                .unwrap_or_else(|| peer_default.to_string()),
            poll_interval: file
                .session
                .poll_interval_ms
                .filter(|&ms| ms > 0)
                .map_or(defaults.poll_interval, Duration::from_millis),
            preview_chars: file
                .session
                .preview_chars
                .unwrap_or(defaults.preview_chars),
            event_buffer: file.session.event_buffer.unwrap_or(defaults.event_buffer),
        };

        Ok(Self {
            mode,
            password: cli.password.clone().filter(|p| !p.is_empty()),
            connect_timeout: file
                .network
                .connect_timeout_secs
                .map_or(Duration::from_secs(10), Duration::from_secs),
            session,
            input_buffer: file.session.input_buffer.unwrap_or(16),
            timestamp_format: file
                .ui
                .timestamp_format
                .clone()
                .unwrap_or_else(|| "%H:%M:%S".to_string()),
            show_timestamps: file.ui.show_timestamps.unwrap_or(false),
        })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug)]
#[command(version, about = "Peer-to-peer encrypted chat over Bluetooth RFCOMM or TCP")]
pub struct CliArgs {
    /// Path to config file (default: `~/.config/rfchat/config.toml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Shared password. Omit to chat without encryption.
    #[arg(short, long, env = "RFCHAT_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Label for your own messages.
    #[arg(short, long, global = true)]
    pub name: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "RFCHAT_LOG", global = true)]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/rfchat.log`).
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Wait for one incoming connection and chat with it.
    Listen {
        /// TCP address to listen on.
        #[arg(long)]
        bind: Option<String>,

        /// Listen on Bluetooth RFCOMM instead of TCP.
        #[arg(long)]
        rfcomm: bool,

        /// RFCOMM channel (with `--rfcomm`).
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=i64::from(MAX_RFCOMM_CHANNEL)))]
        channel: Option<u8>,
    },
    /// Connect to a listening peer (`host:port` or
    /// `rfcomm://AA:BB:CC:DD:EE:FF/channel`).
    Connect {
        /// Endpoint to connect to.
        endpoint: String,
    },
    /// Check that encryption round-trips with the given password.
    Selftest,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("rfchat").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
