//! Structured event stream for `umbra`.
//!
//! Discrete, typed events emitted while a sequence runs. Events are
//! serialized as newline-delimited JSON (JSONL) with a monotonically
//! increasing sequence number.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::phase::{Bracketing, PhaseKind};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Why a sequence stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Fourth contact has passed.
    FourthContact,
    /// Started after fourth contact; the loop never ran.
    NothingToDo,
    /// Cancelled by a signal.
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FourthContact => "fourth contact over",
            Self::NothingToDo => "nothing to do",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Summary statistics emitted when the sequence stops.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Capture requests issued, per phase.
    pub captures: BTreeMap<PhaseKind, u64>,
    /// Capture requests the camera reported as failed.
    pub failed_captures: u64,
    /// Phase transitions observed, including the initial one.
    pub phase_transitions: u64,
    /// Notifications that could not be delivered.
    pub failed_notifications: u64,
    /// Clock time between start and stop, in seconds.
    pub elapsed_secs: f64,
}

impl RunSummary {
    /// Capture requests across all phases.
    #[must_use]
    pub fn total_captures(&self) -> u64 {
        self.captures.values().sum()
    }

    /// Capture requests issued during `phase`.
    #[must_use]
    pub fn captures_in(&self, phase: PhaseKind) -> u64 {
        self.captures.get(&phase).copied().unwrap_or(0)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "captures={} failed={} transitions={} notify_failures={} elapsed={:.1}s",
            self.total_captures(),
            self.failed_captures,
            self.phase_transitions,
            self.failed_notifications,
            self.elapsed_secs,
        )?;
        for (phase, count) in &self.captures {
            write!(f, " {phase}={count}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a sequence.
///
/// Each variant is tagged with `"type"` when serialized so consumers can
/// dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The control loop has started.
    SequenceStarted {
        /// Clock time at start.
        timestamp: DateTime<Utc>,
        /// Camera backend name.
        backend: String,
        /// Phase the loop starts in.
        phase: PhaseKind,
    },

    /// The control loop has stopped.
    SequenceStopped {
        /// Clock time at stop.
        timestamp: DateTime<Utc>,
        /// Why it stopped.
        reason: StopReason,
        /// Run summary statistics.
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<RunSummary>,
    },

    /// A new phase has been entered.
    PhaseEntered {
        /// When the transition was observed.
        timestamp: DateTime<Utc>,
        /// Phase that was entered.
        phase: PhaseKind,
        /// Phase of the previous tick, absent on the first tick.
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<PhaseKind>,
        /// Cycle index the phase resumes at.
        cycle_index: u64,
    },

    /// A capture request was handed to the camera.
    CaptureRequested {
        /// Request timestamp.
        timestamp: DateTime<Utc>,
        /// Phase the capture belongs to.
        phase: PhaseKind,
        /// Cycle index the setting was taken from.
        cycle_index: u64,
        /// Aperture token.
        aperture: String,
        /// Shutter speed token.
        speed: String,
        /// ISO token.
        iso: String,
        /// Bracketing mode.
        bracketing: Bracketing,
        /// Why the trigger gate fired.
        reason: String,
    },

    /// The camera reported a capture failure.
    CaptureFailed {
        /// Request timestamp.
        timestamp: DateTime<Utc>,
        /// Phase the capture belonged to.
        phase: PhaseKind,
        /// Cycle index that was consumed.
        cycle_index: u64,
        /// Error text.
        error: String,
    },

    /// An operator notification was sent.
    Notification {
        /// When it was sent.
        timestamp: DateTime<Utc>,
        /// Message text.
        message: String,
        /// Whether the notifier accepted it.
        delivered: bool,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) increments the sequence counter,
/// serializes the event as a single JSON line, and flushes the underlying
/// writer. Serialization or I/O failures are dropped; a broken event sink
/// must never stop the camera.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock()
            && let Ok(line) = serde_json::to_string(&envelope)
        {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-04-08T18:16:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn sample_event() -> Event {
        Event::SequenceStarted {
            timestamp: t0(),
            backend: "dry-run".to_owned(),
            phase: PhaseKind::Partial,
        }
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_string(&sample_event()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "SequenceStarted");
        assert_eq!(parsed["phase"], "partial");
        assert_eq!(parsed["backend"], "dry-run");
    }

    #[test]
    fn emitter_increments_sequence() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(sample_event());
        emitter.emit(Event::SequenceStopped {
            timestamp: t0(),
            reason: StopReason::FourthContact,
            summary: None,
        });

        assert_eq!(emitter.event_count(), 2);

        let lines: Vec<serde_json::Value> = tw
            .contents()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["reason"], "fourth_contact");
        assert!(lines[1].get("summary").is_none());
    }

    #[test]
    fn capture_event_carries_the_setting() {
        let event = Event::CaptureRequested {
            timestamp: t0(),
            phase: PhaseKind::DiamondRing,
            cycle_index: 3,
            aperture: "11".to_owned(),
            speed: "1/4000".to_owned(),
            iso: "200".to_owned(),
            bracketing: Bracketing::OneAndThird,
            reason: "continuous".to_owned(),
        };
        let parsed = serde_json::to_value(&event).unwrap();
        assert_eq!(parsed["type"], "CaptureRequested");
        assert_eq!(parsed["phase"], "diamond_ring");
        assert_eq!(parsed["speed"], "1/4000");
        assert_eq!(parsed["cycle_index"], 3);
    }

    #[test]
    fn summary_counts_per_phase() {
        let mut summary = RunSummary::default();
        summary.captures.insert(PhaseKind::Partial, 4);
        summary.captures.insert(PhaseKind::Totality, 16);
        summary.failed_captures = 1;
        assert_eq!(summary.total_captures(), 20);
        assert_eq!(summary.captures_in(PhaseKind::BaileysBeads), 0);

        let parsed = serde_json::to_value(&summary).unwrap();
        assert_eq!(parsed["captures"]["totality"], 16);

        let text = summary.to_string();
        assert!(text.contains("captures=20"));
        assert!(text.contains("partial=4"));
    }

    #[test]
    fn envelope_flattens_event_fields() {
        let envelope = EventEnvelope {
            sequence: 7,
            event: sample_event(),
        };
        let parsed = serde_json::to_value(&envelope).unwrap();
        assert_eq!(parsed["sequence"], 7);
        assert_eq!(parsed["type"], "SequenceStarted");
        assert!(parsed.get("event").is_none());
    }
}
