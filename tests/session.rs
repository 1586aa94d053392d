use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use race_timekeeper::errors::{CustomResult, Error};
use race_timekeeper::modules::auto_timer::AutoTimerListener;
use race_timekeeper::modules::config::{Cadence, RaceConfig, RaceSetup, RankingMethod};
use race_timekeeper::modules::models::overlay::RaceStatus;
use race_timekeeper::modules::models::race::Race;
use race_timekeeper::modules::overlay::MemoryOverlaySink;
use race_timekeeper::modules::race_machine::SubmissionStatus;
use race_timekeeper::modules::submission::RaceSubmitter;
use race_timekeeper::modules::timing::clock::{Clock, TokioClock};
use race_timekeeper::{Outcome, RaceEvent, RaceMachine, RaceSession, RaceState, SessionHandle};

#[derive(Clone, Default)]
struct RecordingSubmitter {
    races: Arc<Mutex<Vec<Race>>>,
    fail: Arc<Mutex<bool>>,
}

impl RaceSubmitter for RecordingSubmitter {
    fn submit_race(&self, race: &Race) -> CustomResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(Error::SubmissionError {
                reason: "backend unavailable".to_string(),
            });
        }
        self.races.lock().unwrap().push(race.clone());
        Ok(())
    }
}

fn setup() -> RaceSetup {
    RaceSetup {
        event_id: "event-1".to_string(),
        event_name: "Summit".to_string(),
        track_id: "1".to_string(),
        username: "racer".to_string(),
        user_id: "user-1".to_string(),
        car_name: "car-1".to_string(),
        ..RaceSetup::default()
    }
}

fn start_session(config: RaceConfig) -> (SessionHandle, MemoryOverlaySink, RecordingSubmitter, SessionTask) {
    let sink = MemoryOverlaySink::new();
    let submitter = RecordingSubmitter::default();
    let clock = Arc::new(TokioClock::new());
    let cadence = Cadence::default();

    let machine = RaceMachine::new(
        config,
        setup(),
        Box::new(sink.clone()),
        cadence.overlay_interval.as_millis() as u64,
        clock.now_ms(),
    );
    let (session, handle) = RaceSession::new(machine, clock, Arc::new(submitter.clone()), cadence);
    let task = session.spawn();
    (handle, sink, submitter, SessionTask(task))
}

struct SessionTask(tokio::task::JoinHandle<()>);

fn config() -> RaceConfig {
    RaceConfig {
        race_time_in_min: 3,
        number_of_resets_per_lap: 2,
        ranking_method: RankingMethod::BestAverageLapTimeX,
        average_laps_window: Some(3),
    }
}

async fn advance(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    tokio::task::yield_now().await;
}

#[tokio::test(start_paused = true)]
async fn race_clock_pauses_at_the_right_value() {
    let (handle, _, _, _task) = start_session(config());

    assert_eq!(handle.dispatch(RaceEvent::Toggle).await.unwrap(), Outcome::Handled);
    advance(1500).await;
    handle.dispatch(RaceEvent::Toggle).await.unwrap();

    let view = handle.view().await.unwrap();
    assert_eq!(view.state, RaceState::Paused);
    assert!(view.time_left_ms <= 178_500 && view.time_left_ms >= 178_400);
    assert!(view.current_lap_time_ms >= 1500);
}

#[tokio::test(start_paused = true)]
async fn captured_laps_feed_average_windows() {
    let (handle, _, _, _task) = start_session(config());
    handle.dispatch(RaceEvent::Toggle).await.unwrap();

    for lap_time in [30_000, 32_000, 31_000] {
        advance(lap_time).await;
        handle.dispatch(RaceEvent::CaptureLap { is_valid: true }).await.unwrap();
    }

    let view = handle.view().await.unwrap();
    let times: Vec<u64> = view.laps.iter().map(|lap| lap.time).collect();
    assert_eq!(times, vec![30_000, 32_000, 31_000]);
    assert_eq!(view.average_laps.len(), 1);
    assert_eq!(view.average_laps[0].avg_time, 31_000);

    handle.dispatch(RaceEvent::ToggleLapValidity { lap_id: 1 }).await.unwrap();
    assert!(handle.view().await.unwrap().average_laps.is_empty());
}

#[tokio::test(start_paused = true)]
async fn race_ends_when_time_runs_out() {
    let (handle, sink, _, _task) = start_session(RaceConfig {
        race_time_in_min: 1,
        ..config()
    });
    handle.dispatch(RaceEvent::Toggle).await.unwrap();

    for _ in 0..61 {
        advance(1000).await;
    }

    let view = handle.view().await.unwrap();
    assert_eq!(view.state, RaceState::RaceOver);
    assert_eq!(view.time_left_ms, 0);
    assert!(view.race_time_is_expired);
    assert!(view.end_confirmation_pending);

    // ran long enough for the periodic in-progress overlay
    let in_progress = sink
        .statuses()
        .iter()
        .filter(|status| **status == RaceStatus::RaceInProgress)
        .count();
    assert!(in_progress > 10);
    assert_eq!(sink.statuses().last(), Some(&RaceStatus::RacePaused));

    assert_eq!(
        handle.dispatch(RaceEvent::CaptureLap { is_valid: true }).await.unwrap(),
        Outcome::Ignored
    );
}

// submissions run on the blocking pool, so this one runs in real time
#[tokio::test]
async fn submission_result_comes_back_on_the_queue() {
    let (handle, sink, submitter, _task) = start_session(config());
    handle.dispatch(RaceEvent::Toggle).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.dispatch(RaceEvent::CaptureLap { is_valid: true }).await.unwrap();
    handle.dispatch(RaceEvent::End).await.unwrap();

    *submitter.fail.lock().unwrap() = true;
    handle.dispatch(RaceEvent::SubmitRequested).await.unwrap();
    let view = wait_for(&handle, |view| matches!(view.submission, SubmissionStatus::Failed(_))).await;
    assert_eq!(view.state, RaceState::RaceOver);
    assert_eq!(view.laps.len(), 1);

    *submitter.fail.lock().unwrap() = false;
    handle.dispatch(RaceEvent::SubmitRequested).await.unwrap();
    let view = wait_for(&handle, |view| view.state == RaceState::ReadyToStart).await;
    assert!(view.laps.is_empty());

    let races = submitter.races.lock().unwrap().clone();
    assert_eq!(races.len(), 1);
    assert_eq!(races[0].laps.len(), 1);
    assert!(races[0].laps[0].time >= 20);
    assert!(races[0].submitted_at.is_some());
    assert!(sink.statuses().contains(&RaceStatus::RaceFinished));
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_the_session() {
    let (handle, _, _, task) = start_session(config());
    handle.shutdown();
    task.0.await.unwrap();

    assert!(matches!(handle.view().await, Err(Error::SessionClosedError)));
    assert!(handle.send(RaceEvent::Toggle).is_err());
}

#[tokio::test]
async fn shutdown_stops_listening_for_the_automated_timer() {
    let clock = Arc::new(TokioClock::new());
    let machine = RaceMachine::new(config(), setup(), Box::new(MemoryOverlaySink::new()), 2000, clock.now_ms());
    let (mut session, handle) =
        RaceSession::new(machine, clock, Arc::new(RecordingSubmitter::default()), Cadence::default());

    let listener = AutoTimerListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    session.subscribe_auto_timer(listener, handle.clone());
    let task = session.spawn();

    let timer = TcpStream::connect(addr).await.unwrap();
    wait_for(&handle, |view| view.auto_timer_connected).await;
    drop(timer);

    handle.shutdown();
    task.await.unwrap();

    let mut refused = false;
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_err() {
            refused = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(refused, "listener still accepts connections after shutdown");
}

#[tokio::test]
async fn automated_timer_starts_and_captures_laps() {
    let sink = MemoryOverlaySink::new();
    let clock = Arc::new(TokioClock::new());
    let machine = RaceMachine::new(config(), setup(), Box::new(sink), 2000, clock.now_ms());
    let (mut session, handle) =
        RaceSession::new(machine, clock, Arc::new(RecordingSubmitter::default()), Cadence::default());

    let listener = AutoTimerListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    session.subscribe_auto_timer(listener, handle.clone());
    let _task = session.spawn();

    let mut timer = TcpStream::connect(addr).await.unwrap();
    timer.write_all(b"lap\n").await.unwrap();
    wait_for(&handle, |view| view.state == RaceState::Running).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    timer.write_all(b"\nlap\n").await.unwrap();
    let view = wait_for(&handle, |view| view.laps.len() == 1).await;
    assert!(view.auto_timer_connected);
    assert!(view.laps[0].is_valid);
    assert!(view.laps[0].auto_timer_connected);
    assert!(view.laps[0].time >= 50);

    drop(timer);
    let view = wait_for(&handle, |view| !view.auto_timer_connected).await;
    assert_eq!(view.state, RaceState::Running);
    handle.shutdown();
}

async fn wait_for<F>(handle: &SessionHandle, ready: F) -> race_timekeeper::SessionView
where
    F: Fn(&race_timekeeper::SessionView) -> bool,
{
    for _ in 0..500 {
        let view = handle.view().await.unwrap();
        if ready(&view) {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session never reached the expected state");
}
