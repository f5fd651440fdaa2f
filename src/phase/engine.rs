//! Control loop
//!
//! A single cooperative loop: read the clock, classify, announce phase
//! changes, consult the trigger gate, capture, sleep. Nothing in one
//! iteration is fatal; camera and notification failures are reported and
//! the next tick carries on.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::camera::Camera;
use crate::clock::Clock;
use crate::config::TimingSection;
use crate::notify::Notifier;
use crate::observability::events::{Event, EventEmitter, RunSummary, StopReason};
use crate::observability::metrics;
use crate::progress::{NoProgress, ProgressSink, ProgressStage};
use crate::schedule::{ContactSchedule, classify};

use super::descriptor::{PhaseDescriptor, PhaseTable};
use super::exposure::CaptureRequest;
use super::state::{PhaseTransition, SequencerState};
use super::trigger::{self, FireReason, TriggerPolicy, TriggerResult};
use super::{PhaseKind, sequencer};

/// Spoken once per run of consecutive capture failures.
const CAPTURE_FAILED_MESSAGE: &str = "Encountered exception!";

/// Spoken when the loop ends after fourth contact.
const FINISHED_MESSAGE: &str = "Fourth contact over. Exiting program";

/// Result of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Sleep for `sleep`, then tick again.
    Continue {
        /// Phase active during this tick.
        phase: PhaseKind,
        /// Whether a capture was requested.
        fired: bool,
        /// How long to sleep before the next tick.
        sleep: Duration,
    },
    /// Fourth contact has passed.
    Finished,
}

/// Drives the camera from first to fourth contact.
pub struct ControlLoop {
    schedule: ContactSchedule,
    phases: Arc<PhaseTable>,
    timing: TimingSection,
    state: SequencerState,
    clock: Arc<dyn Clock>,
    camera: Arc<dyn Camera>,
    notifier: Arc<dyn Notifier>,
    progress: Arc<dyn ProgressSink>,
    events: Arc<EventEmitter>,
    cancel: CancellationToken,
    countdown_spoken: BTreeSet<i64>,
    stage: Option<(ProgressStage, DateTime<Utc>)>,
    capture_failing: bool,
    summary: RunSummary,
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("schedule", &self.schedule)
            .field("state", &self.state)
            .field("backend", &self.camera.backend())
            .finish_non_exhaustive()
    }
}

impl ControlLoop {
    /// Creates a loop with default timing, no progress display and no
    /// event output.
    #[must_use]
    pub fn new(
        schedule: ContactSchedule,
        phases: PhaseTable,
        clock: Arc<dyn Clock>,
        camera: Arc<dyn Camera>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            schedule,
            phases: Arc::new(phases),
            timing: TimingSection::default(),
            state: SequencerState::new(),
            clock,
            camera,
            notifier,
            progress: Arc::new(NoProgress),
            events: Arc::new(EventEmitter::noop()),
            cancel: CancellationToken::new(),
            countdown_spoken: BTreeSet::new(),
            stage: None,
            capture_failing: false,
            summary: RunSummary::default(),
        }
    }

    /// Overrides the poll granularities.
    #[must_use]
    pub const fn with_timing(mut self, timing: TimingSection) -> Self {
        self.timing = timing;
        self
    }

    /// Sends progress updates to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Emits structured events to `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<EventEmitter>) -> Self {
        self.events = events;
        self
    }

    /// Stops the loop when `cancel` fires.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sequencer state, for inspection.
    #[must_use]
    pub const fn state(&self) -> &SequencerState {
        &self.state
    }

    /// Counters gathered so far.
    #[must_use]
    pub const fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Runs until fourth contact has passed or the loop is cancelled.
    pub async fn run(&mut self) -> (StopReason, RunSummary) {
        let started = self.clock.now();
        let initial = classify(started, &self.schedule);
        info!(phase = %initial, backend = self.camera.backend(), "sequence started");
        self.events.emit(Event::SequenceStarted {
            timestamp: started,
            backend: self.camera.backend().to_owned(),
            phase: initial,
        });

        let reason = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            match self.tick().await {
                TickOutcome::Finished => break StopReason::FourthContact,
                TickOutcome::Continue { sleep, .. } => {
                    tokio::select! {
                        () = self.cancel.cancelled() => break StopReason::Cancelled,
                        () = self.clock.sleep(sleep) => {}
                    }
                }
            }
        };

        if let Some((stage, _)) = self.stage.take() {
            self.progress.finish(stage);
        }
        if reason == StopReason::FourthContact {
            self.notify(FINISHED_MESSAGE).await;
        }

        let stopped = self.clock.now();
        self.summary.elapsed_secs = (stopped - started)
            .to_std()
            .map_or(0.0, |d| d.as_secs_f64());
        info!(%reason, summary = %self.summary, "sequence stopped");
        self.events.emit(Event::SequenceStopped {
            timestamp: stopped,
            reason,
            summary: Some(self.summary.clone()),
        });
        (reason, self.summary.clone())
    }

    /// One iteration of the loop, without the sleep.
    pub async fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now();
        let phase = classify(now, &self.schedule);
        if phase.is_resting() && now > self.schedule.c4() {
            return TickOutcome::Finished;
        }

        if let Some(transition) = self.state.enter(phase) {
            self.on_transition(transition, now).await;
        }
        self.report_progress(now, phase);

        let phases = Arc::clone(&self.phases);
        let mut fired = false;
        let mut cycle_complete = false;
        if let Some(descriptor) = phases.get(phase) {
            if self.state.bracketing_pending() {
                self.configure_bracketing(descriptor).await;
            }
            if let TriggerResult::Fired(reason) =
                trigger::evaluate(descriptor, self.state.latch_mut(), now)
            {
                fired = true;
                cycle_complete = self.capture(descriptor, reason, now).await;
            }
            if phase == PhaseKind::Partial {
                self.countdown(now).await;
            }
        }

        let sleep = self.sleep_after(phase, phases.get(phase), cycle_complete);
        TickOutcome::Continue {
            phase,
            fired,
            sleep,
        }
    }

    async fn on_transition(&mut self, transition: PhaseTransition, now: DateTime<Utc>) {
        let PhaseTransition { from, to } = transition;
        info!(from = ?from, to = %to, "phase transition");
        self.summary.phase_transitions += 1;
        metrics::record_phase_transition(from, to);
        metrics::set_current_phase(to, from);
        self.events.emit(Event::PhaseEntered {
            timestamp: now,
            phase: to,
            from,
            cycle_index: self.state.cycle_index(to),
        });
        // starting out before C1 is not worth announcing
        if from.is_some() || !to.is_resting() {
            self.notify(to.announcement()).await;
        }
    }

    async fn configure_bracketing(&mut self, descriptor: &PhaseDescriptor) {
        match self.camera.set_bracketing(descriptor.bracketing).await {
            Ok(()) => {
                debug!(phase = %descriptor.kind, bracketing = %descriptor.bracketing, "bracketing configured");
                self.state.bracketing_configured();
            }
            Err(e) => {
                warn!(phase = %descriptor.kind, error = %e, "failed to configure bracketing, retrying next tick");
                metrics::record_error("camera");
            }
        }
    }

    /// Requests one capture. Returns `true` when it completed a periodic cycle.
    async fn capture(
        &mut self,
        descriptor: &PhaseDescriptor,
        reason: FireReason,
        now: DateTime<Utc>,
    ) -> bool {
        let phase = descriptor.kind;
        let cycle_index = self.state.cycle_index(phase);
        let setting = sequencer::next(descriptor, &mut self.state);
        let cycle_complete = self.state.latch_mut().record_shot();

        let request = CaptureRequest {
            setting,
            bracketing: descriptor.bracketing,
            phase,
            cycle_index,
            timestamp: now,
        };
        match request.setting.exposure_value() {
            Some(ev) => debug!(%phase, cycle_index, setting = %request.setting, ev, %reason, "capture"),
            None => debug!(%phase, cycle_index, setting = %request.setting, %reason, "capture"),
        }
        self.events.emit(Event::CaptureRequested {
            timestamp: now,
            phase,
            cycle_index,
            aperture: request.setting.aperture.clone(),
            speed: request.setting.speed.clone(),
            iso: request.setting.iso.clone(),
            bracketing: request.bracketing,
            reason: reason.to_string(),
        });
        metrics::record_capture(phase, request.bracketing);
        *self.summary.captures.entry(phase).or_default() += 1;

        let result = self.camera.capture(&request).await;
        if let Ok(took) = (self.clock.now() - now).to_std() {
            metrics::record_capture_duration(phase, took);
        }
        metrics::set_cycle_index(phase, self.state.cycle_index(phase));

        match result {
            Ok(()) => self.capture_failing = false,
            Err(e) => {
                error!(%phase, cycle_index, error = %e, "capture failed");
                self.summary.failed_captures += 1;
                metrics::record_capture_failure(phase);
                metrics::record_error("camera");
                self.events.emit(Event::CaptureFailed {
                    timestamp: now,
                    phase,
                    cycle_index,
                    error: e.to_string(),
                });
                if !self.capture_failing {
                    self.capture_failing = true;
                    self.notify(CAPTURE_FAILED_MESSAGE).await;
                }
            }
        }
        cycle_complete
    }

    /// Fire-and-forget: a failed delivery is logged and counted, never raised.
    async fn notify(&mut self, message: &str) {
        let delivered = match self.notifier.say(message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, message, "notification failed");
                metrics::record_notification_failure();
                self.summary.failed_notifications += 1;
                false
            }
        };
        self.events.emit(Event::Notification {
            timestamp: self.clock.now(),
            message: message.to_owned(),
            delivered,
        });
    }

    /// Reminds the operator to take the filter off while C2_DR approaches.
    async fn countdown(&mut self, now: DateTime<Utc>) {
        let c2_dr = self.schedule.c2_dr();
        if now >= c2_dr {
            return;
        }
        let seconds = (c2_dr - now).num_seconds();
        if seconds > 0 && seconds < 60 && seconds % 10 == 0 && self.countdown_spoken.insert(seconds)
        {
            self.notify(&format!("Prepare camera for filter off in {seconds} seconds"))
                .await;
        }
    }

    fn report_progress(&mut self, now: DateTime<Utc>, phase: PhaseKind) {
        let current = ProgressStage::at(now, phase, &self.schedule);
        let stage = match (self.stage, current) {
            (Some((old, _)), Some((new, _))) if old == new => self.stage,
            (old, new) => {
                if let Some((old, _)) = old {
                    self.progress.finish(old);
                }
                new.map(|(stage, _)| (stage, now))
            }
        };
        self.stage = stage;

        if let (Some((stage, start)), Some((_, end))) = (self.stage, current) {
            let total = (end - start).to_std().unwrap_or_default();
            let elapsed = (now - start).to_std().unwrap_or_default();
            self.progress.update(stage, elapsed, total);
        }
    }

    fn sleep_after(
        &self,
        phase: PhaseKind,
        descriptor: Option<&PhaseDescriptor>,
        cycle_complete: bool,
    ) -> Duration {
        let timing = &self.timing;
        match phase {
            PhaseKind::Resting => {
                let until_c1 = (self.schedule.c1() - self.clock.now()).to_std().ok();
                until_c1.map_or(timing.resting_poll, |d| d.min(timing.resting_poll))
            }
            PhaseKind::Partial => timing.partial_poll,
            PhaseKind::DiamondRing | PhaseKind::BaileysBeads => timing.hot_poll,
            PhaseKind::Totality => match descriptor {
                Some(d) if cycle_complete => self.totality_sleep(d),
                _ => timing.totality_poll,
            },
        }
    }

    /// Sleep after a completed totality cycle: wake on the next interval
    /// boundary, but never later than just after the beads return.
    fn totality_sleep(&self, descriptor: &PhaseDescriptor) -> Duration {
        let TriggerPolicy::Periodic { interval } = descriptor.policy() else {
            return self.timing.totality_poll;
        };
        let now = self.clock.now();
        let compensated = trigger::compensated_sleep(
            self.schedule.c3_bb2() - now,
            Duration::from_secs(interval),
            descriptor.delay_compensation,
            self.timing.totality_margin,
            self.timing.totality_poll,
        );
        compensated.min(until_next_boundary(now, interval))
    }
}

/// Time from `now` to the next whole second divisible by `interval`.
fn until_next_boundary(now: DateTime<Utc>, interval: u64) -> Duration {
    #[allow(clippy::cast_possible_wrap)]
    let interval = interval as i64;
    let second = now.timestamp();
    let next = second - second.rem_euclid(interval) + interval;
    let subsec = TimeDelta::nanoseconds(i64::from(now.timestamp_subsec_nanos()));
    (TimeDelta::seconds(next - second) - subsec)
        .to_std()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;
    use crate::camera::CameraSetting;
    use crate::clock::SimulatedClock;
    use crate::error::{CameraError, NotifyError};
    use crate::phase::{Bracketing, ValueSequence};
    use crate::schedule::ContactTime;

    // ---- fakes ----

    #[derive(Default)]
    struct MockCamera {
        captures: Mutex<Vec<CaptureRequest>>,
        bracketing: Mutex<Vec<Bracketing>>,
        fail_captures: bool,
        fail_bracketing_once: Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl Camera for MockCamera {
        async fn current_value(&self, _setting: CameraSetting) -> Result<String, CameraError> {
            Ok("Manual".to_owned())
        }

        async fn set_bracketing(&self, mode: Bracketing) -> Result<(), CameraError> {
            self.bracketing.lock().unwrap().push(mode);
            let mut fail = self.fail_bracketing_once.lock().unwrap();
            if *fail {
                *fail = false;
                return Err(CameraError::InvalidResponse("busy".to_owned()));
            }
            Ok(())
        }

        async fn capture(&self, request: &CaptureRequest) -> Result<(), CameraError> {
            self.captures.lock().unwrap().push(request.clone());
            if self.fail_captures {
                Err(CameraError::NonZeroExit {
                    code: Some(1),
                    stderr: "I/O in progress".to_owned(),
                })
            } else {
                Ok(())
            }
        }

        fn backend(&self) -> &'static str {
            "mock"
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        async fn say(&self, text: &str) -> Result<(), NotifyError> {
            self.messages.lock().unwrap().push(text.to_owned());
            Ok(())
        }
    }

    struct Fixture {
        clock: Arc<SimulatedClock>,
        camera: Arc<MockCamera>,
        notifier: Arc<RecordingNotifier>,
        schedule: ContactSchedule,
    }

    impl Fixture {
        fn new(camera: MockCamera, start: impl FnOnce(&ContactSchedule) -> DateTime<Utc>) -> Self {
            let schedule = worked_example();
            Self {
                clock: Arc::new(SimulatedClock::new(start(&schedule))),
                camera: Arc::new(camera),
                notifier: Arc::new(RecordingNotifier::default()),
                schedule,
            }
        }

        fn control_loop(&self) -> ControlLoop {
            self.control_loop_with(PhaseTable::default())
        }

        fn control_loop_with(&self, phases: PhaseTable) -> ControlLoop {
            ControlLoop::new(
                self.schedule.clone(),
                phases,
                self.clock.clone(),
                self.camera.clone(),
                self.notifier.clone(),
            )
        }

        fn captures(&self) -> Vec<CaptureRequest> {
            self.camera.captures.lock().unwrap().clone()
        }
    }

    // C1=00:00:00 C2=00:10:00 C3=00:10:30 C4=00:20:00, ring 30s, beads 10s
    fn worked_example() -> ContactSchedule {
        let hms = |h, m, s| ContactTime::new(h, m, s).unwrap();
        ContactSchedule::on_date(
            NaiveDate::from_ymd_opt(2024, 4, 8).unwrap(),
            [hms(0, 0, 0), hms(0, 10, 0), hms(0, 10, 30), hms(0, 20, 0)],
            TimeDelta::seconds(30),
            TimeDelta::seconds(10),
        )
    }

    // ---- whole sequence ----

    #[tokio::test]
    async fn full_sequence_walks_every_phase() {
        let fx = Fixture::new(MockCamera::default(), |s| s.c1() - TimeDelta::seconds(60));
        let (reason, summary) = fx.control_loop().run().await;

        assert_eq!(reason, StopReason::FourthContact);
        // initial resting + 7 changes
        assert_eq!(summary.phase_transitions, 8);
        assert_eq!(summary.failed_captures, 0);
        assert_eq!(summary.captures_in(PhaseKind::Totality), 16);
        assert!((9..=10).contains(&summary.captures_in(PhaseKind::Partial)));
        assert!(summary.captures_in(PhaseKind::DiamondRing) > 0);
        assert!(summary.captures_in(PhaseKind::BaileysBeads) > 0);
        assert_eq!(summary.captures_in(PhaseKind::Resting), 0);

        let announcements: Vec<String> = fx
            .notifier
            .messages()
            .into_iter()
            .filter(|m| m.starts_with("Camera entering"))
            .collect();
        let expected: Vec<String> = [
            PhaseKind::Partial,
            PhaseKind::DiamondRing,
            PhaseKind::BaileysBeads,
            PhaseKind::Totality,
            PhaseKind::BaileysBeads,
            PhaseKind::DiamondRing,
            PhaseKind::Partial,
        ]
        .iter()
        .map(|p| p.announcement().to_owned())
        .collect();
        assert_eq!(announcements, expected);
        assert_eq!(
            fx.notifier.messages().last().map(String::as_str),
            Some(FINISHED_MESSAGE)
        );
        assert!(fx.clock.now() > fx.schedule.c4());
    }

    #[tokio::test]
    async fn totality_cycles_through_the_whole_table_twice() {
        let fx = Fixture::new(MockCamera::default(), |s| s.c2_bb2());
        let mut control = fx.control_loop();
        while fx.clock.now() < fx.schedule.c3_bb() {
            if let TickOutcome::Continue { sleep, .. } = control.tick().await {
                fx.clock.advance(sleep);
            }
        }

        let totality: Vec<CaptureRequest> = fx
            .captures()
            .into_iter()
            .filter(|r| r.phase == PhaseKind::Totality)
            .collect();
        let table = PhaseTable::default().totality;
        assert_eq!(totality.len(), 2 * table.cycle_len());
        for (i, request) in totality.iter().enumerate() {
            assert_eq!(request.setting, table.setting_at(i as u64));
            assert!(request.timestamp < fx.schedule.c3_bb2());
        }
    }

    #[tokio::test]
    async fn cycle_index_resumes_after_reentry() {
        let fx = Fixture::new(MockCamera::default(), |s| s.c2_dr() - TimeDelta::seconds(1));
        let mut control = fx.control_loop();
        // run through the rising side into totality
        while fx.clock.now() <= fx.schedule.c2_bb2() {
            if let TickOutcome::Continue { sleep, .. } = control.tick().await {
                fx.clock.advance(sleep);
            }
        }
        let ring_index = control.state().cycle_index(PhaseKind::DiamondRing);
        assert!(ring_index > 0);

        fx.clock.set(fx.schedule.c3_bb());
        control.tick().await;
        let first_again = fx.captures().last().cloned().unwrap();
        assert_eq!(first_again.phase, PhaseKind::DiamondRing);
        assert_eq!(first_again.cycle_index, ring_index);
    }

    #[tokio::test]
    async fn partial_fires_a_full_cycle_on_each_boundary() {
        let mut phases = PhaseTable::default();
        phases.partial.aperture = ValueSequence::new(vec!["8".into(), "10".into(), "11".into()])
            .unwrap();
        assert_eq!(phases.partial.interval, 120);

        let fx = Fixture::new(MockCamera::default(), |s| s.c1() - TimeDelta::seconds(5));
        let mut control = fx.control_loop_with(phases);
        while fx.clock.now() < fx.schedule.c2_dr() {
            if let TickOutcome::Continue { sleep, .. } = control.tick().await {
                fx.clock.advance(sleep);
            }
        }

        let partial: Vec<CaptureRequest> = fx
            .captures()
            .into_iter()
            .filter(|r| r.phase == PhaseKind::Partial)
            .collect();
        // boundaries at C1 + 0, 120, 240, 360 and 480 s before C2_DR at 570 s
        assert_eq!(partial.len(), 5 * 3);
        for (group, shots) in partial.chunks(3).enumerate() {
            let apertures: Vec<&str> = shots.iter().map(|r| r.setting.aperture.as_str()).collect();
            assert_eq!(apertures, ["8", "10", "11"]);
            for shot in shots {
                let offset = (shot.timestamp - fx.schedule.c1()).num_seconds();
                assert_eq!(offset / 120, group as i64, "shot at C1 + {offset}s");
            }
        }
        assert_eq!(control.state().cycle_index(PhaseKind::Partial), 15);
    }

    // ---- failures ----

    #[tokio::test]
    async fn capture_failures_do_not_stop_the_loop() {
        let camera = MockCamera {
            fail_captures: true,
            ..MockCamera::default()
        };
        let fx = Fixture::new(camera, |s| s.c2_dr());
        let mut control = fx.control_loop();
        for _ in 0..5 {
            match control.tick().await {
                TickOutcome::Continue { fired, sleep, .. } => {
                    assert!(fired);
                    fx.clock.advance(sleep);
                }
                TickOutcome::Finished => panic!("finished early"),
            }
        }

        assert_eq!(control.summary().failed_captures, 5);
        // failed captures still consume their setting
        assert_eq!(control.state().cycle_index(PhaseKind::DiamondRing), 5);
        let failures = fx
            .notifier
            .messages()
            .iter()
            .filter(|m| *m == CAPTURE_FAILED_MESSAGE)
            .count();
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn bracketing_is_retried_until_it_sticks() {
        let camera = MockCamera {
            fail_bracketing_once: Mutex::new(true),
            ..MockCamera::default()
        };
        let fx = Fixture::new(camera, |s| s.c2_dr());
        let mut control = fx.control_loop();
        control.tick().await;
        assert!(control.state().bracketing_pending());
        control.tick().await;
        assert!(!control.state().bracketing_pending());
        control.tick().await;

        let modes = fx.camera.bracketing.lock().unwrap().clone();
        assert_eq!(modes, vec![Bracketing::OneAndThird, Bracketing::OneAndThird]);
    }

    // ---- timing ----

    #[tokio::test]
    async fn resting_sleep_stops_at_first_contact() {
        let fx = Fixture::new(MockCamera::default(), |s| s.c1() - TimeDelta::seconds(2));
        let mut control = fx.control_loop();
        assert_eq!(
            control.tick().await,
            TickOutcome::Continue {
                phase: PhaseKind::Resting,
                fired: false,
                sleep: Duration::from_secs(2),
            }
        );
        assert!(fx.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn after_fourth_contact_there_is_nothing_to_do() {
        let fx = Fixture::new(MockCamera::default(), |s| s.c4() + TimeDelta::minutes(5));
        let mut control = fx.control_loop();
        assert_eq!(control.tick().await, TickOutcome::Finished);
        assert!(fx.captures().is_empty());
    }

    #[tokio::test]
    async fn countdown_is_spoken_once_per_mark() {
        let fx = Fixture::new(MockCamera::default(), |s| s.c2_dr() - TimeDelta::seconds(65));
        let mut control = fx.control_loop();
        while fx.clock.now() < fx.schedule.c2_dr() {
            if let TickOutcome::Continue { sleep, .. } = control.tick().await {
                fx.clock.advance(sleep);
            }
        }
        let countdown: Vec<String> = fx
            .notifier
            .messages()
            .into_iter()
            .filter(|m| m.starts_with("Prepare camera"))
            .collect();
        assert_eq!(
            countdown,
            [50, 40, 30, 20, 10]
                .iter()
                .map(|n| format!("Prepare camera for filter off in {n} seconds"))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn next_boundary_is_strictly_ahead() {
        let at = |s: i64, ms: i64| DateTime::from_timestamp(s, 0).unwrap() + TimeDelta::milliseconds(ms);
        assert_eq!(until_next_boundary(at(1000, 0), 5), Duration::from_secs(5));
        assert_eq!(until_next_boundary(at(1000, 750), 5), Duration::from_millis(4250));
        assert_eq!(until_next_boundary(at(1004, 999), 5), Duration::from_millis(1));
    }

    // ---- cancellation ----

    #[tokio::test]
    async fn cancelled_before_start() {
        let fx = Fixture::new(MockCamera::default(), |s| s.c1());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (reason, summary) = fx.control_loop().with_cancel(cancel).run().await;
        assert_eq!(reason, StopReason::Cancelled);
        assert_eq!(summary.total_captures(), 0);
        assert!(!fx.notifier.messages().contains(&FINISHED_MESSAGE.to_owned()));
    }
}
