//! Output surfaces for translated lines.
//!
//! The pipeline only ever talks to a [`DisplaySink`]. [`TerminalSink`] writes
//! lines to any writer (stdout in the binary); [`ChannelSink`] forwards events
//! to whatever front end owns the receiving half, so a window that is not yet
//! ready still receives every line in order.

use std::{
    io::{self, Write},
    sync::{Mutex, PoisonError},
};

use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised by a display surface.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// Writing to the underlying device failed.
    #[error("display write failed: {0}")]
    Io(#[from] io::Error),
    /// The receiving front end has gone away.
    #[error("display closed")]
    Closed,
}

/// Where translated lines are shown.
pub trait DisplaySink: Send + Sync {
    /// Show one more line after the existing ones.
    ///
    /// # Errors
    ///
    /// Returns [`DisplayError`] if the line could not be shown.
    fn append(&self, line: &str) -> Result<(), DisplayError>;

    /// Remove every line currently shown.
    ///
    /// # Errors
    ///
    /// Returns [`DisplayError`] if the surface could not be cleared.
    fn clear(&self) -> Result<(), DisplayError>;
}

/// ANSI sequence clearing the screen and homing the cursor.
const CLEAR_SCREEN: &[u8] = b"\x1b[2J\x1b[H";

/// Line-oriented sink over a writer.
#[derive(Debug)]
pub struct TerminalSink<W> {
    out: Mutex<W>,
}

impl TerminalSink<io::Stdout> {
    /// Sink writing to standard output.
    #[must_use]
    pub fn stdout() -> Self { Self::new(io::stdout()) }
}

impl<W: Write> TerminalSink<W> {
    #[must_use]
    pub fn new(out: W) -> Self { Self { out: Mutex::new(out) } }

    /// Recover the writer, for inspection.
    pub fn into_inner(self) -> W { self.out.into_inner().unwrap_or_else(PoisonError::into_inner) }
}

impl<W: Write + Send> DisplaySink for TerminalSink<W> {
    fn append(&self, line: &str) -> Result<(), DisplayError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }

    fn clear(&self) -> Result<(), DisplayError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(CLEAR_SCREEN)?;
        out.flush()?;
        Ok(())
    }
}

/// Event forwarded by a [`ChannelSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayEvent {
    Append(String),
    Clear,
}

/// Sink forwarding events over an unbounded channel.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<DisplayEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver a front end drains.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DisplayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: DisplayEvent) -> Result<(), DisplayError> {
        self.tx.send(event).map_err(|_| DisplayError::Closed)
    }
}

impl DisplaySink for ChannelSink {
    fn append(&self, line: &str) -> Result<(), DisplayError> {
        self.send(DisplayEvent::Append(line.to_owned()))
    }

    fn clear(&self) -> Result<(), DisplayError> { self.send(DisplayEvent::Clear) }
}
