//! Spoken notifications through a Festival-compatible synthesiser.
//!
//! The synthesiser runs for the whole sequence as one child process fed
//! `(SayText "...")` forms on stdin. Messages are echoed to the console as
//! well, so nothing is lost if the speaker is muted.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{ConsoleNotifier, Notifier};
use crate::error::NotifyError;

/// How long `close` waits for the synthesiser to finish speaking.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Quotes `text` as a Scheme string literal.
#[must_use]
pub fn say_text_form(text: &str) -> String {
    let mut form = String::with_capacity(text.len() + 16);
    form.push_str("(SayText \"");
    for c in text.chars() {
        match c {
            '"' | '\\' => {
                form.push('\\');
                form.push(c);
            }
            '\n' | '\r' => form.push(' '),
            _ => form.push(c),
        }
    }
    form.push_str("\")\n");
    form
}

struct Synth {
    child: Child,
    stdin: ChildStdin,
}

/// Speaks messages aloud and echoes them to the console.
pub struct SpeechNotifier {
    program: String,
    synth: Mutex<Option<Synth>>,
    echo: ConsoleNotifier,
}

impl SpeechNotifier {
    /// Starts the synthesiser, e.g. `["festival", "--pipe"]`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::SpawnFailed`] if the command is empty or
    /// cannot be started.
    pub fn spawn(command: &[String], echo: ConsoleNotifier) -> Result<Self, NotifyError> {
        let Some((program, args)) = command.split_first() else {
            return Err(NotifyError::SpawnFailed {
                program: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| NotifyError::SpawnFailed {
                program: program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| NotifyError::SpawnFailed {
            program: program.clone(),
            source: std::io::Error::other("stdin not captured"),
        })?;

        debug!(program = %program, "speech synthesiser started");
        Ok(Self {
            program: program.clone(),
            synth: Mutex::new(Some(Synth { child, stdin })),
            echo,
        })
    }
}

impl std::fmt::Debug for SpeechNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechNotifier")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Notifier for SpeechNotifier {
    async fn say(&self, text: &str) -> Result<(), NotifyError> {
        // echo first so the message survives a dead synthesiser
        self.echo.say(text).await?;

        let mut guard = self.synth.lock().await;
        let synth = guard.as_mut().ok_or(NotifyError::Closed)?;
        synth.stdin.write_all(say_text_form(text).as_bytes()).await?;
        synth.stdin.flush().await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), NotifyError> {
        let Some(Synth { mut child, stdin }) = self.synth.lock().await.take() else {
            return Ok(());
        };
        // EOF lets the synthesiser finish the queue and exit
        drop(stdin);
        match tokio::time::timeout(CLOSE_GRACE, child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(%status, "speech synthesiser exited");
            }
            Err(_) => {
                warn!(program = %self.program, "speech synthesiser did not exit; killing it");
                child.kill().await?;
            }
        }
        Ok(())
    }
}
