use std::collections::VecDeque;

use chrono::Utc;
use log::{debug, info, warn};

use crate::modules::config::{RaceConfig, RaceSetup, RankingMethod};
use crate::modules::helpers::lap::{LapHelper, RaceSummary};
use crate::modules::models::lap::{AverageWindow, Lap};
use crate::modules::models::overlay::{OverlaySnapshot, RaceStatus};
use crate::modules::models::race::Race;
use crate::modules::overlay::{OverlayPublisher, OverlaySink};
use crate::modules::timing::lap_timer::LapTimer;
use crate::modules::timing::race_timer::RaceTimer;
use crate::modules::timing::reset_counter::ResetCounter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceState {
    ReadyToStart,
    Running,
    Paused,
    /// Transient, only observable while a capture is being processed.
    CapturingLap,
    RaceOver,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceEvent {
    /// Start/pause button.
    Toggle,
    End,
    CaptureLap { is_valid: bool },
    /// Lap signal from the automated timer.
    CaptureAutLap,
    DidNotFinish,
    Expire,
    /// Cancel the end-race confirmation.
    Resume,
    UndoLap,
    IncrementReset,
    DecrementReset,
    ToggleLapValidity { lap_id: usize },
    SetModel { model_id: String, car_name: String },
    SetCar { car_id: String },
    AutoTimerConnection { connected: bool },
    SubmitRequested,
    SubmissionSucceeded,
    SubmissionFailed { reason: String },
    Discard,
}

impl RaceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RaceEvent::Toggle => "TOGGLE",
            RaceEvent::End => "END",
            RaceEvent::CaptureLap { .. } => "CAPTURE_LAP",
            RaceEvent::CaptureAutLap => "CAPTURE_AUT_LAP",
            RaceEvent::DidNotFinish => "DID_NOT_FINISH",
            RaceEvent::Expire => "EXPIRE",
            RaceEvent::Resume => "RESUME",
            RaceEvent::UndoLap => "UNDO_LAP",
            RaceEvent::IncrementReset => "INCREMENT_RESET",
            RaceEvent::DecrementReset => "DECREMENT_RESET",
            RaceEvent::ToggleLapValidity { .. } => "TOGGLE_LAP_VALIDITY",
            RaceEvent::SetModel { .. } => "SET_MODEL",
            RaceEvent::SetCar { .. } => "SET_CAR",
            RaceEvent::AutoTimerConnection { .. } => "AUTO_TIMER_CONNECTION",
            RaceEvent::SubmitRequested => "SUBMIT_REQUESTED",
            RaceEvent::SubmissionSucceeded => "SUBMISSION_SUCCEEDED",
            RaceEvent::SubmissionFailed { .. } => "SUBMISSION_FAILED",
            RaceEvent::Discard => "DISCARD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    /// The event has no handler in the current state.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    Idle,
    Pending,
    Failed(String),
}

/// Read-only view of a session for the operator display.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub state: RaceState,
    pub laps: Vec<Lap>,
    pub average_laps: Vec<AverageWindow>,
    pub current_lap_time_ms: u64,
    pub time_left_ms: u64,
    pub resets: u32,
    pub race_time_is_expired: bool,
    pub auto_timer_connected: bool,
    pub end_confirmation_pending: bool,
    pub submission: SubmissionStatus,
    pub summary: RaceSummary,
}

/// Lifecycle of one live race.
///
/// Owns the race, both timers and the reset counter. Events are handled one
/// at a time; events raised while handling one (DNF raising a capture, the
/// race clock running out) are queued and handled before `dispatch` returns.
pub struct RaceMachine {
    state: RaceState,
    config: RaceConfig,
    setup: RaceSetup,
    race: Race,
    lap_timer: LapTimer,
    race_timer: RaceTimer,
    resets: ResetCounter,
    did_not_finish: bool,
    race_time_is_expired: bool,
    auto_timer_connected: bool,
    end_confirmation_pending: bool,
    submission: SubmissionStatus,
    pending_submission: Option<Race>,
    overlay: OverlayPublisher,
    overlay_interval_ms: u64,
    raised: VecDeque<RaceEvent>,
}

impl RaceMachine {
    /// # create race machine
    /// create a machine in `ReadyToStart`, publishing the ready overlay
    ///
    /// ## Arguments
    /// * `config` - the race rules of the event
    /// * `setup` - the racer and car
    /// * `sink` - where overlay snapshots go
    /// * `overlay_interval_ms` - cadence of the in-progress overlay
    /// * `now_ms` - the current clock reading
    pub fn new(
        config: RaceConfig,
        setup: RaceSetup,
        sink: Box<dyn OverlaySink>,
        overlay_interval_ms: u64,
        now_ms: u64,
    ) -> RaceMachine {
        let mut machine = RaceMachine {
            state: RaceState::ReadyToStart,
            race: Race::new(&setup),
            race_timer: RaceTimer::new(config.race_time_ms()),
            config,
            setup,
            lap_timer: LapTimer::new(),
            resets: ResetCounter::new(),
            did_not_finish: false,
            race_time_is_expired: false,
            auto_timer_connected: false,
            end_confirmation_pending: false,
            submission: SubmissionStatus::Idle,
            pending_submission: None,
            overlay: OverlayPublisher::new(sink),
            overlay_interval_ms,
            raised: VecDeque::new(),
        };
        machine.enter_ready_to_start(now_ms);
        machine
    }

    /// Handle one event, then everything it raised.
    pub fn dispatch(&mut self, event: RaceEvent, now_ms: u64) -> Outcome {
        let outcome = self.handle(event, now_ms);
        self.drain_raised(now_ms);
        outcome
    }

    pub fn tick_lap_timer(&mut self, now_ms: u64) {
        self.lap_timer.tick(now_ms);
    }

    /// Advance the race clock; an expiry ends the race.
    pub fn tick_race_timer(&mut self, now_ms: u64) {
        if self.race_timer.tick(now_ms) {
            self.on_race_time_expired();
        }
        self.drain_raised(now_ms);
    }

    /// Periodic in-progress overlay, rate limited to the overlay interval.
    pub fn publish_progress(&mut self, now_ms: u64) {
        if self.state != RaceState::Running {
            return;
        }
        let snapshot = self.overlay_snapshot(RaceStatus::RaceInProgress);
        self.overlay.publish(snapshot, Some(self.overlay_interval_ms), now_ms);
    }

    /// The race to hand to persistence, set by a submit request.
    pub fn take_pending_submission(&mut self) -> Option<Race> {
        self.pending_submission.take()
    }

    pub fn state(&self) -> RaceState {
        self.state
    }

    pub fn race(&self) -> &Race {
        &self.race
    }

    pub fn lap_timer_running(&self) -> bool {
        self.lap_timer.is_running()
    }

    pub fn race_timer_running(&self) -> bool {
        self.race_timer.is_running()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.state,
            laps: self.race.laps.clone(),
            average_laps: self.race.average_laps.clone(),
            current_lap_time_ms: self.lap_timer.current_time_ms(),
            time_left_ms: self.race_timer.current_time_ms(),
            resets: self.resets.value(),
            race_time_is_expired: self.race_time_is_expired,
            auto_timer_connected: self.auto_timer_connected,
            end_confirmation_pending: self.end_confirmation_pending,
            submission: self.submission.clone(),
            summary: LapHelper::race_summary(&self.race, &self.config),
        }
    }

    fn raise(&mut self, event: RaceEvent) {
        self.raised.push_back(event);
    }

    fn drain_raised(&mut self, now_ms: u64) {
        while let Some(event) = self.raised.pop_front() {
            self.handle(event, now_ms);
        }
    }

    fn handle(&mut self, event: RaceEvent, now_ms: u64) -> Outcome {
        use RaceState::*;

        let name = event.name();
        let state = self.state;
        let submission_open = self.submission != SubmissionStatus::Pending;

        match (state, event) {
            (ReadyToStart, RaceEvent::Toggle) | (ReadyToStart, RaceEvent::CaptureAutLap) => {
                info!(target: "race_machine:start", "race started by {}", name);
                self.enter_running(now_ms);
            }
            (Running, RaceEvent::Toggle) => self.enter_paused(now_ms),
            (Paused, RaceEvent::Toggle) if !self.race_time_is_expired => self.enter_running(now_ms),

            (ReadyToStart, RaceEvent::End) | (Running, RaceEvent::End) | (Paused, RaceEvent::End) => {
                self.enter_race_over(now_ms)
            }

            (Running, RaceEvent::CaptureLap { is_valid }) => self.capture_lap(is_valid, now_ms),
            (Running, RaceEvent::CaptureAutLap) => self.capture_lap(true, now_ms),
            (Running, RaceEvent::DidNotFinish) => {
                self.did_not_finish = true;
                self.raise(RaceEvent::CaptureLap { is_valid: false });
            }
            (Running, RaceEvent::Expire) => self.on_race_time_expired(),

            (RaceOver, RaceEvent::Resume) if submission_open => {
                self.end_confirmation_pending = false;
                self.submission = SubmissionStatus::Idle;
                self.enter_paused(now_ms);
            }

            (Running, RaceEvent::UndoLap) | (Paused, RaceEvent::UndoLap) if !self.race.laps.is_empty() => {
                self.undo_lap(now_ms)
            }
            (RaceOver, RaceEvent::UndoLap) if submission_open && !self.race.laps.is_empty() => {
                self.undo_lap(now_ms)
            }

            (ReadyToStart | Running | Paused, RaceEvent::IncrementReset) => self.resets.increment(),
            (ReadyToStart | Running | Paused, RaceEvent::DecrementReset) => self.resets.decrement(),

            (_, RaceEvent::ToggleLapValidity { lap_id }) if state != CapturingLap && submission_open => {
                if !self.toggle_lap_validity(lap_id, now_ms) {
                    warn!(target: "race_machine:toggle_lap", "no lap with id {}", lap_id);
                    return Outcome::Ignored;
                }
            }

            // the selection outlives the session, the next race starts with it
            (ReadyToStart, RaceEvent::SetModel { model_id, car_name }) => {
                self.setup.model_id = Some(model_id);
                self.setup.car_name = car_name;
                self.race.current_model_id = self.setup.model_id.clone();
            }
            (ReadyToStart, RaceEvent::SetCar { car_id }) => {
                self.setup.car_id = Some(car_id);
                self.race.current_car_id = self.setup.car_id.clone();
            }

            (_, RaceEvent::AutoTimerConnection { connected }) => {
                if connected != self.auto_timer_connected {
                    info!(target: "race_machine:auto_timer", "automated timer connected: {}", connected);
                }
                self.auto_timer_connected = connected;
            }

            (RaceOver, RaceEvent::SubmitRequested) if submission_open => {
                let mut race = self.race.clone();
                race.submitted_at = Some(Utc::now());
                info!(
                    target: "race_machine:submit",
                    "submitting race of {} ({} laps)", race.username, race.laps.len()
                );
                self.pending_submission = Some(race);
                self.submission = SubmissionStatus::Pending;
            }
            (RaceOver, RaceEvent::SubmissionSucceeded) if !submission_open => {
                info!(target: "race_machine:submit", "race of {} submitted", self.race.username);
                let snapshot = self.overlay_snapshot(RaceStatus::RaceFinished);
                self.overlay.publish(snapshot, None, now_ms);
                self.enter_ready_to_start(now_ms);
            }
            (RaceOver, RaceEvent::SubmissionFailed { reason }) if !submission_open => {
                warn!(target: "race_machine:submit", "race submission failed: {}", reason);
                self.submission = SubmissionStatus::Failed(reason);
            }
            (RaceOver, RaceEvent::Discard) if submission_open => {
                info!(target: "race_machine:discard", "race of {} discarded", self.race.username);
                self.enter_ready_to_start(now_ms);
            }

            _ => {
                debug!(target: "race_machine:dispatch", "ignored {} in {:?}", name, state);
                return Outcome::Ignored;
            }
        }

        Outcome::Handled
    }

    fn enter_ready_to_start(&mut self, now_ms: u64) {
        self.state = RaceState::ReadyToStart;
        self.race = Race::new(&self.setup);
        self.lap_timer.reset(0);
        self.race_timer.reset(self.config.race_time_ms());
        self.resets.reset(0);
        self.did_not_finish = false;
        self.race_time_is_expired = false;
        self.end_confirmation_pending = false;
        self.submission = SubmissionStatus::Idle;
        self.pending_submission = None;

        let snapshot = self.overlay_snapshot(RaceStatus::ReadyToStart);
        self.overlay.publish(snapshot, None, now_ms);
    }

    fn enter_running(&mut self, now_ms: u64) {
        self.state = RaceState::Running;
        self.lap_timer.start(now_ms);
        self.race_timer.start(now_ms);

        let snapshot = self.overlay_snapshot(RaceStatus::RaceInProgress);
        self.overlay.publish(snapshot, None, now_ms);
    }

    fn enter_paused(&mut self, now_ms: u64) {
        self.state = RaceState::Paused;
        self.pause_timers(now_ms);

        let snapshot = self.overlay_snapshot(RaceStatus::RacePaused);
        self.overlay.publish(snapshot, None, now_ms);
    }

    fn enter_race_over(&mut self, now_ms: u64) {
        self.state = RaceState::RaceOver;
        self.pause_timers(now_ms);
        self.end_confirmation_pending = true;

        let summary = LapHelper::race_summary(&self.race, &self.config);
        info!(
            target: "race_machine:end",
            "race over for {}: {} laps ({} valid), fastest {:?}ms",
            self.race.username,
            summary.total_laps,
            summary.valid_laps,
            summary.fastest_lap.map(|lap| lap.time)
        );

        let snapshot = self.overlay_snapshot(RaceStatus::RacePaused);
        self.overlay.publish(snapshot, None, now_ms);
    }

    fn pause_timers(&mut self, now_ms: u64) {
        self.lap_timer.pause(now_ms);
        if self.race_timer.pause(now_ms) {
            self.on_race_time_expired();
        }
    }

    /// Bring both timers up to `now_ms` without waiting for their ticks.
    fn sync_timers(&mut self, now_ms: u64) {
        self.lap_timer.tick(now_ms);
        if self.race_timer.tick(now_ms) {
            self.on_race_time_expired();
        }
    }

    fn on_race_time_expired(&mut self) {
        if self.race_time_is_expired {
            return;
        }
        info!(target: "race_machine:expire", "race time is up");
        self.race_time_is_expired = true;
        // a capture in flight finishes first and ends the race on its way out
        if matches!(self.state, RaceState::Running | RaceState::Paused) {
            self.raise(RaceEvent::End);
        }
    }

    fn capture_lap(&mut self, is_valid: bool, now_ms: u64) {
        self.state = RaceState::CapturingLap;
        self.sync_timers(now_ms);

        let resets = self.resets.value();
        let within_resets = resets <= self.config.number_of_resets_per_lap;
        let lap = Lap {
            lap_id: self.race.laps.len(),
            time: self.lap_timer.current_time_ms(),
            resets,
            is_valid: is_valid && !self.did_not_finish && within_resets,
            car_name: self.setup.car_name.clone(),
            model_id: self.race.current_model_id.clone().unwrap_or_default(),
            auto_timer_connected: self.auto_timer_connected,
        };
        info!(
            target: "race_machine:capture_lap",
            "lap {} captured: {}ms, {} resets, valid: {}", lap.lap_id, lap.time, lap.resets, lap.is_valid
        );

        self.race.laps.push(lap);
        self.resets.reset(0);
        self.lap_timer.reset(0);
        self.update_average_laps();

        let did_not_finish = std::mem::take(&mut self.did_not_finish);
        if self.race_time_is_expired {
            self.enter_race_over(now_ms);
        } else if did_not_finish {
            self.enter_paused(now_ms);
        } else {
            self.enter_running(now_ms);
        }
    }

    fn undo_lap(&mut self, now_ms: u64) {
        let was_running = self.lap_timer.is_running();
        self.lap_timer.tick(now_ms);

        let lap = match self.race.laps.pop() {
            Some(lap) => lap,
            None => return,
        };
        self.lap_timer.reset(self.lap_timer.current_time_ms() + lap.time);
        if was_running {
            self.lap_timer.start(now_ms);
        }
        self.resets.reset(lap.resets);
        self.update_average_laps();
        info!(target: "race_machine:undo_lap", "lap {} undone", lap.lap_id);

        self.publish_current(now_ms);
    }

    fn toggle_lap_validity(&mut self, lap_id: usize, now_ms: u64) -> bool {
        let lap = match self.race.laps.get_mut(lap_id) {
            Some(lap) => lap,
            None => return false,
        };
        lap.is_valid = !lap.is_valid;
        info!(target: "race_machine:toggle_lap", "lap {} valid: {}", lap_id, lap.is_valid);

        self.update_average_laps();
        self.publish_current(now_ms);
        true
    }

    fn update_average_laps(&mut self) {
        self.race.average_laps = match self.config.ranking_method {
            RankingMethod::BestAverageLapTimeX => {
                LapHelper::compute_average_windows(&self.race.laps, self.config.average_laps_window)
            }
            RankingMethod::BestLapTime => Vec::new(),
        };
    }

    fn publish_current(&mut self, now_ms: u64) {
        let status = match self.state {
            RaceState::ReadyToStart => RaceStatus::ReadyToStart,
            RaceState::Running | RaceState::CapturingLap => RaceStatus::RaceInProgress,
            RaceState::Paused | RaceState::RaceOver => RaceStatus::RacePaused,
        };
        let snapshot = self.overlay_snapshot(status);
        self.overlay.publish(snapshot, None, now_ms);
    }

    fn overlay_snapshot(&self, race_status: RaceStatus) -> OverlaySnapshot {
        OverlaySnapshot {
            event_id: self.setup.event_id.clone(),
            event_name: self.setup.event_name.clone(),
            track_id: self.setup.track_id.clone(),
            username: self.setup.username.clone(),
            user_id: self.setup.user_id.clone(),
            laps: self.race.laps.clone(),
            average_laps: self.race.average_laps.clone(),
            time_left_in_ms: self.race_timer.current_time_ms(),
            current_lap_time_in_ms: self.lap_timer.current_time_ms(),
            race_status,
        }
    }
}
