//! Notification sink
//!
//! Short operator messages: phase announcements, countdowns, warnings. The
//! sequence treats delivery as fire-and-forget; a failed notification is
//! logged by the caller and otherwise ignored.
//!
//! A notifier is created once before the loop and closed explicitly when
//! the sequence ends.

pub mod speech;

pub use speech::SpeechNotifier;

use std::io::Write;
use std::sync::Mutex;

use crate::error::NotifyError;

/// Delivers text messages to the operator.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one message.
    ///
    /// # Errors
    ///
    /// Returns a [`NotifyError`] when the message could not be delivered.
    async fn say(&self, text: &str) -> Result<(), NotifyError>;

    /// Releases whatever the notifier holds. Further calls to `say` fail
    /// with [`NotifyError::Closed`] where that matters.
    ///
    /// # Errors
    ///
    /// Returns a [`NotifyError`] when shutdown did not go cleanly.
    async fn close(&self) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Prints messages, one per line.
pub struct ConsoleNotifier {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleNotifier {
    /// Writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    /// Writes to stderr, keeping stdout free for machine-readable output.
    #[must_use]
    pub fn stderr() -> Self {
        Self::with_writer(Box::new(std::io::stderr()))
    }

    /// Writes to an arbitrary writer.
    #[must_use]
    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl std::fmt::Debug for ConsoleNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleNotifier").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Notifier for ConsoleNotifier {
    async fn say(&self, text: &str) -> Result<(), NotifyError> {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        writeln!(out, "{text}")?;
        out.flush()?;
        Ok(())
    }
}
