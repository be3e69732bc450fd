//! Line-oriented terminal rendering of session events.
//!
//! The chat shares the terminal with the line the user is typing, so output
//! is plain coloured lines rather than a full-screen UI. When stdout is a
//! terminal the local echo replaces the raw typed line.

use std::io::{self, IsTerminal, Stdout, Write};

use crossterm::{
    cursor::MoveToPreviousLine,
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};

use tokio::sync::mpsc;

use crate::config::ChatConfig;
use crate::session::{SessionEvent, SessionHandle, Termination};
use crate::transport::TransportType;

const PEER: Color = Color::Blue;
const LOCAL: Color = Color::Green;
const ERROR: Color = Color::Red;
const NOTICE: Color = Color::Yellow;
const INFO: Color = Color::Cyan;

const LOCK: &str = "\u{1f512}";

/// One line of output: colour and text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    color: Color,
    text: String,
}

impl Line {
    fn new(color: Color, text: impl Into<String>) -> Self {
        Self {
            color,
            text: text.into(),
        }
    }
}

/// Writes chat output to a terminal (or any writer).
pub struct Console<W: Write> {
    out: W,
    overwrite_echo: bool,
    timestamp_format: Option<String>,
}

impl Console<Stdout> {
    /// A console on stdout, configured from `config`.
    #[must_use]
    pub fn stdout(config: &ChatConfig) -> Self {
        let out = io::stdout();
        let overwrite_echo = out.is_terminal();
        Self {
            out,
            overwrite_echo,
            timestamp_format: config
                .show_timestamps
                .then(|| config.timestamp_format.clone()),
        }
    }
}

impl<W: Write> Console<W> {
    /// A console on an arbitrary writer, without echo overwrite or
    /// timestamps.
    pub const fn new(out: W) -> Self {
        Self {
            out,
            overwrite_echo: false,
            timestamp_format: None,
        }
    }

    /// Give the writer back.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print an informational line.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn info(&mut self, text: &str) -> io::Result<()> {
        self.write_line(&Line::new(INFO, text))
    }

    /// Print a notice.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        self.write_line(&Line::new(NOTICE, text))
    }

    /// Print a success line.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn success(&mut self, text: &str) -> io::Result<()> {
        self.write_line(&Line::new(LOCAL, text))
    }

    /// Print an error line.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn error(&mut self, text: &str) -> io::Result<()> {
        self.write_line(&Line::new(ERROR, text))
    }

    /// Announce a new connection and how to leave it.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn banner(&mut self, peer: &str, kind: TransportType, encrypted: bool) -> io::Result<()> {
        self.success(&format!("Connected to {peer} over {kind}"))?;
        if encrypted {
            self.success(&format!("{LOCK} Encryption enabled"))?;
        } else {
            self.notice("No encryption - messages will be sent in plaintext")?;
        }
        self.success("Chat started! Type your messages below.")?;
        self.notice("Type 'quit' or 'exit' to close the connection.")?;
        self.write_line(&Line::new(Color::Reset, "-".repeat(50)))
    }

    /// Render one session event.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn render(&mut self, event: &SessionEvent) -> io::Result<()> {
        if self.overwrite_echo && matches!(event, SessionEvent::LocalEcho { .. }) {
            queue!(self.out, MoveToPreviousLine(1), Clear(ClearType::CurrentLine))?;
        }
        for line in lines_for(event) {
            self.write_line(&line)?;
        }
        Ok(())
    }

    /// Render events until the session closes its event channel.
    ///
    /// If output fails the session is interrupted, since nobody could see
    /// it any more.
    ///
    /// # Errors
    ///
    /// Returns the first error from the underlying writer.
    pub async fn follow(
        &mut self,
        events: &mut mpsc::Receiver<SessionEvent>,
        handle: &SessionHandle,
    ) -> io::Result<()> {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.render(&event) {
                tracing::error!(error = %e, "console output failed, ending session");
                handle.interrupt();
                return Err(e);
            }
        }
        Ok(())
    }

    fn write_line(&mut self, line: &Line) -> io::Result<()> {
        let stamp = self
            .timestamp_format
            .as_deref()
            .map(|fmt| format!("[{}] ", chrono::Local::now().format(fmt)))
            .unwrap_or_default();
        queue!(
            self.out,
            SetForegroundColor(line.color),
            Print(stamp),
            Print(&line.text),
            ResetColor,
            Print("\n"),
        )?;
        self.out.flush()
    }
}

fn lines_for(event: &SessionEvent) -> Vec<Line> {
    match event {
        SessionEvent::PeerMessage {
            label,
            text,
            encrypted,
        } => vec![Line::new(PEER, with_lock(format!("{label}: {text}"), *encrypted))],
        SessionEvent::Undecryptable { label, preview } => vec![
            Line::new(ERROR, format!("Failed to decrypt message from {label}")),
            Line::new(PEER, format!("{label} (encrypted): {preview}")),
        ],
        SessionEvent::LocalEcho {
            label,
            text,
            encrypted,
        } => vec![Line::new(LOCAL, with_lock(format!("{label}: {text}"), *encrypted))],
        SessionEvent::Closed(reason) => {
            let color = match reason {
                Termination::ConnectionLost => ERROR,
                _ => NOTICE,
            };
            vec![Line::new(color, format!("Chat ended: {reason}."))]
        }
    }
}

fn with_lock(text: String, encrypted: bool) -> String {
    if encrypted {
        format!("{text} {LOCK}")
    } else {
        text
    }
}
