//! `rfchat`: one-to-one chat over Bluetooth RFCOMM or TCP.
//!
//! ```bash
//! # Wait for a peer on TCP, with encryption
//! RFCHAT_PASSWORD=secret123 cargo run --bin rfchat -- listen
//!
//! # Connect to it from another terminal
//! cargo run --bin rfchat -- --password secret123 connect 127.0.0.1:12345
//!
//! # Bluetooth (Linux, needs the `bluetooth` feature)
//! cargo run --features bluetooth --bin rfchat -- listen --rfcomm --channel 1
//! cargo run --features bluetooth --bin rfchat -- connect rfcomm://AA:BB:CC:DD:EE:FF/1
//! ```

use std::io::{self, Stdout};
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use rfchat::config::{ChatConfig, CliArgs, ListenOn, Mode};
use rfchat::console::Console;
use rfchat::crypto::{CryptoError, EncryptionContext};
use rfchat::session::{Session, SessionError, input};
use rfchat::transport::{Endpoint, Transport, TransportError, tcp};

/// Password used by `selftest` when none is configured.
const SELFTEST_PASSWORD: &str = "test_password_123";

const SELFTEST_MESSAGE: &str = "Hello, this is a secret message!";

/// Failures that end the program with a non-zero exit code.
#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("terminal output failed: {0}")]
    Io(#[from] io::Error),

    #[error("could not read local input: {0}")]
    Input(#[source] io::Error),

    #[error("key derivation task failed")]
    KeyTask,

    #[error("encryption self-test failed")]
    SelfTest,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ChatConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to a file; the terminal belongs to the chat.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!(mode = ?config.mode, "rfchat starting");

    let mut console = Console::stdout(&config);
    let result = run(&config, &mut console).await;

    tracing::info!("rfchat exiting");
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "rfchat failed");
            if console.error(&format!("Error: {e}")).is_err() {
                eprintln!("Error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("rfchat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(config: &ChatConfig, console: &mut Console<Stdout>) -> Result<(), AppError> {
    if config.mode == Mode::SelfTest {
        let password = config.password.as_deref().unwrap_or(SELFTEST_PASSWORD);
        return self_test(&derive(password).await?, console);
    }

    let encryption = match config.password.as_deref() {
        Some(password) => Some(derive(password).await?),
        None => None,
    };

    match &config.mode {
        Mode::Listen(ListenOn::Tcp(addr)) => {
            let acceptor = tcp::TcpAcceptor::bind(addr.as_str()).await?;
            console.info(&format!(
                "Waiting for a connection on {}...",
                acceptor.local_addr()?
            ))?;
            let Some(transport) = until_ctrl_c(acceptor.accept()).await? else {
                return Ok(());
            };
            chat(transport, encryption, config, console).await
        }
        Mode::Listen(ListenOn::Rfcomm(channel)) => {
            listen_rfcomm(*channel, encryption, config, console).await
        }
        Mode::Connect(Endpoint::Tcp(addr)) => {
            console.info(&format!("Connecting to {addr}..."))?;
            let connect = tcp::connect(addr, config.connect_timeout);
            let Some(transport) = until_ctrl_c(connect).await? else {
                return Ok(());
            };
            chat(transport, encryption, config, console).await
        }
        Mode::Connect(Endpoint::Rfcomm { address, channel }) => {
            connect_rfcomm(address, *channel, encryption, config, console).await
        }
        Mode::SelfTest => Ok(()),
    }
}

/// Derive the key on a blocking thread; PBKDF2 at 100k rounds is slow.
async fn derive(password: &str) -> Result<EncryptionContext, AppError> {
    let password = zeroize::Zeroizing::new(password.to_owned());
    let context = tokio::task::spawn_blocking(move || EncryptionContext::derive(&password))
        .await
        .map_err(|_| AppError::KeyTask)??;
    Ok(context)
}

/// Await `fut`, or `None` if Ctrl-C arrives first.
async fn until_ctrl_c<T>(
    fut: impl Future<Output = Result<T, TransportError>>,
) -> Result<Option<T>, TransportError> {
    tokio::select! {
        result = fut => result.map(Some),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("cancelled before connecting");
            Ok(None)
        }
    }
}

#[cfg(feature = "bluetooth")]
async fn listen_rfcomm(
    channel: u8,
    encryption: Option<EncryptionContext>,
    config: &ChatConfig,
    console: &mut Console<Stdout>,
) -> Result<(), AppError> {
    use rfchat::transport::rfcomm::RfcommAcceptor;

    let acceptor = RfcommAcceptor::bind(channel).await?;
    console.info(&format!("Waiting for a connection on RFCOMM channel {channel}..."))?;
    let Some(transport) = until_ctrl_c(acceptor.accept()).await? else {
        return Ok(());
    };
    chat(transport, encryption, config, console).await
}

#[cfg(not(feature = "bluetooth"))]
async fn listen_rfcomm(
    _channel: u8,
    _encryption: Option<EncryptionContext>,
    _config: &ChatConfig,
    _console: &mut Console<Stdout>,
) -> Result<(), AppError> {
    Err(TransportError::Unsupported(rfchat::transport::TransportType::Rfcomm).into())
}

#[cfg(feature = "bluetooth")]
async fn connect_rfcomm(
    address: &str,
    channel: u8,
    encryption: Option<EncryptionContext>,
    config: &ChatConfig,
    console: &mut Console<Stdout>,
) -> Result<(), AppError> {
    console.info(&format!("Connecting to {address} on channel {channel}..."))?;
    let connect = rfchat::transport::rfcomm::connect(address, channel, config.connect_timeout);
    let Some(transport) = until_ctrl_c(connect).await? else {
        return Ok(());
    };
    chat(transport, encryption, config, console).await
}

#[cfg(not(feature = "bluetooth"))]
async fn connect_rfcomm(
    _address: &str,
    _channel: u8,
    _encryption: Option<EncryptionContext>,
    _config: &ChatConfig,
    _console: &mut Console<Stdout>,
) -> Result<(), AppError> {
    Err(TransportError::Unsupported(rfchat::transport::TransportType::Rfcomm).into())
}

/// Run one session over `transport`, rendering its events until it closes.
async fn chat<T: Transport>(
    transport: T,
    encryption: Option<EncryptionContext>,
    config: &ChatConfig,
    console: &mut Console<Stdout>,
) -> Result<(), AppError> {
    console.banner(
        transport.peer(),
        transport.transport_type(),
        encryption.is_some(),
    )?;

    let input = input::spawn_stdin_reader(config.input_buffer).map_err(AppError::Input)?;
    let (session, mut events) = Session::new(transport, encryption, config.session.clone());
    let handle = session.handle();
    tracing::info!(session = %session.id(), "chat started");

    let interrupt = async {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() && handle.interrupt() {
                    tracing::info!("interrupted by user");
                }
            }
            () = handle.closed() => {}
        }
    };
    let render = console.follow(&mut events, &handle);
    let (outcome, rendered, ()) = tokio::join!(session.run(input), render, interrupt);
    let reason = outcome?;
    tracing::info!(reason = ?reason, "chat finished");
    rendered?;
    Ok(())
}

/// Round-trip a sample message through the encryption layer.
fn self_test(context: &EncryptionContext, console: &mut Console<Stdout>) -> Result<(), AppError> {
    console.info("Testing encryption functionality...")?;
    console.notice(&format!("Original: {SELFTEST_MESSAGE}"))?;

    let wire = context.try_encrypt(SELFTEST_MESSAGE)?;
    console.info(&format!("Encrypted: {wire}"))?;

    let decrypted = context.decrypt(&wire)?;
    console.success(&format!("Decrypted: {decrypted}"))?;

    if decrypted == SELFTEST_MESSAGE {
        console.success("Encryption test passed!")?;
        Ok(())
    } else {
        Err(AppError::SelfTest)
    }
}
