use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::errors::{CustomResult, Error, SessionClosedSnafu};
use crate::modules::auto_timer::AutoTimerListener;
use crate::modules::config::Cadence;
use crate::modules::models::race::Race;
use crate::modules::race_machine::{Outcome, RaceEvent, RaceMachine, RaceState, SessionView};
use crate::modules::submission::RaceSubmitter;
use crate::modules::timing::clock::Clock;

pub enum Command {
    Event(RaceEvent, Option<oneshot::Sender<Outcome>>),
    View(oneshot::Sender<SessionView>),
    Shutdown,
}

/// Cloneable way into a running session. Every command lands on the same
/// queue as the timer ticks, so nothing mutates the race concurrently.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    /// Queue an event without waiting for it to be handled.
    pub fn send(&self, event: RaceEvent) -> CustomResult<()> {
        self.sender
            .send(Command::Event(event, None))
            .map_err(|_| SessionClosedSnafu.build())
    }

    /// Queue an event and wait for the machine's verdict.
    pub async fn dispatch(&self, event: RaceEvent) -> CustomResult<Outcome> {
        let (reply, outcome) = oneshot::channel();
        self.sender
            .send(Command::Event(event, Some(reply)))
            .map_err(|_| SessionClosedSnafu.build())?;
        outcome.await.map_err(|_| Error::SessionClosedError)
    }

    pub async fn view(&self) -> CustomResult<SessionView> {
        let (reply, view) = oneshot::channel();
        self.sender
            .send(Command::View(reply))
            .map_err(|_| SessionClosedSnafu.build())?;
        view.await.map_err(|_| Error::SessionClosedError)
    }

    pub fn shutdown(&self) {
        if self.sender.send(Command::Shutdown).is_err() {
            debug!(target: "session:shutdown", "session already stopped");
        }
    }
}

/// Runs one race machine on a single task.
pub struct RaceSession {
    machine: RaceMachine,
    clock: Arc<dyn Clock>,
    submitter: Arc<dyn RaceSubmitter>,
    cadence: Cadence,
    commands: mpsc::UnboundedReceiver<Command>,
    submissions: mpsc::UnboundedReceiver<Result<(), String>>,
    submission_sender: mpsc::UnboundedSender<Result<(), String>>,
    auto_timer: Option<JoinHandle<()>>,
}

impl RaceSession {
    pub fn new(
        machine: RaceMachine,
        clock: Arc<dyn Clock>,
        submitter: Arc<dyn RaceSubmitter>,
        cadence: Cadence,
    ) -> (RaceSession, SessionHandle) {
        let (sender, commands) = mpsc::unbounded_channel();
        let (submission_sender, submissions) = mpsc::unbounded_channel();

        let session = RaceSession {
            machine,
            clock,
            submitter,
            cadence,
            commands,
            submissions,
            submission_sender,
            auto_timer: None,
        };
        (session, SessionHandle { sender })
    }

    /// # subscribe to the automated timer
    /// forward lap signals of the listener into this session's queue.
    /// The listener task is aborted when the session stops.
    pub fn subscribe_auto_timer(&mut self, listener: AutoTimerListener, handle: SessionHandle) {
        if let Some(previous) = self.auto_timer.take() {
            previous.abort();
        }
        self.auto_timer = Some(tokio::spawn(listener.run(handle)));
    }

    /// Run the session on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process ticks and commands until shut down or every handle is dropped.
    pub async fn run(mut self) {
        let mut lap_ticker = interval(self.cadence.lap_tick);
        lap_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut race_ticker = interval(self.cadence.race_tick);
        race_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut overlay_ticker = interval(self.cadence.overlay_interval);
        overlay_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(target: "session:run", "race session started");

        loop {
            tokio::select! {
                biased;

                _ = race_ticker.tick(), if self.machine.race_timer_running() => {
                    self.machine.tick_race_timer(self.clock.now_ms());
                }
                _ = lap_ticker.tick(), if self.machine.lap_timer_running() => {
                    self.machine.tick_lap_timer(self.clock.now_ms());
                }
                _ = overlay_ticker.tick(), if self.machine.state() == RaceState::Running => {
                    self.machine.publish_progress(self.clock.now_ms());
                }
                Some(result) = self.submissions.recv() => {
                    let event = match result {
                        Ok(()) => RaceEvent::SubmissionSucceeded,
                        Err(reason) => RaceEvent::SubmissionFailed { reason },
                    };
                    self.handle_event(event);
                }
                command = self.commands.recv() => match command {
                    Some(Command::Event(event, reply)) => {
                        let outcome = self.handle_event(event);
                        if let Some(reply) = reply {
                            let _ = reply.send(outcome);
                        }
                    }
                    Some(Command::View(reply)) => {
                        let _ = reply.send(self.machine.view());
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        if let Some(auto_timer) = self.auto_timer.take() {
            auto_timer.abort();
        }
        info!(target: "session:run", "race session stopped");
    }

    fn handle_event(&mut self, event: RaceEvent) -> Outcome {
        let outcome = self.machine.dispatch(event, self.clock.now_ms());
        if let Some(race) = self.machine.take_pending_submission() {
            self.submit(race);
        }
        outcome
    }

    fn submit(&self, race: Race) {
        let submitter = Arc::clone(&self.submitter);
        let results = self.submission_sender.clone();

        tokio::spawn(async move {
            let result = match tokio::task::spawn_blocking(move || submitter.submit_race(&race)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(error)) => {
                    error!(target: "session:submit", "error submitting race: {}", error);
                    Err(error.to_string())
                }
                Err(error) => {
                    error!(target: "session:submit", "submission task failed: {}", error);
                    Err(error.to_string())
                }
            };
            if results.send(result).is_err() {
                warn!(target: "session:submit", "session stopped before the submission finished");
            }
        });
    }
}
