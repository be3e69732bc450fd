//! Local input source for the send loop.
//!
//! Reading stdin blocks, so lines are pulled on a dedicated OS thread that
//! never keeps the runtime alive at shutdown.

use std::io::{self, BufRead};

use tokio::sync::mpsc;

/// Spawn a thread that forwards stdin lines into a bounded channel.
///
/// Line terminators are stripped. The channel closes at end of input or on
/// a read error. The thread exits on its next line once the receiver is
/// dropped; it is detached and never joined.
///
/// # Errors
///
/// Returns the OS error if the reader thread cannot be started.
pub fn spawn_stdin_reader(capacity: usize) -> io::Result<mpsc::Receiver<String>> {
    spawn_line_reader(capacity, || io::stdin().lock())
}

/// Spawn a thread that forwards the lines of the reader built by `open`.
///
/// The reader is created on the new thread, so it need not be `Send`.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be started.
pub fn spawn_line_reader<R, F>(capacity: usize, open: F) -> io::Result<mpsc::Receiver<String>>
where
    R: BufRead,
    F: FnOnce() -> R + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    std::thread::Builder::new()
        .name("rfchat-input".to_string())
        .spawn(move || forward_lines(open(), &tx))?;
    Ok(rx)
}

/// Forward each line of `reader` to `tx` until either side ends.
fn forward_lines(reader: impl BufRead, tx: &mpsc::Sender<String>) {
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if tx.blocking_send(line).is_err() {
                    tracing::debug!("input receiver dropped");
                    return;
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "stdin read failed");
                return;
            }
        }
    }
    tracing::debug!("stdin reached end of input");
}
