use std::sync::Arc;

use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use race_timekeeper::errors::CustomResult;
use race_timekeeper::modules::auto_timer::AutoTimerListener;
use race_timekeeper::modules::config::{RaceSetup, Settings};
use race_timekeeper::modules::helpers::format::{format_countdown, format_lap_time};
use race_timekeeper::modules::helpers::logging::setup_logging;
use race_timekeeper::modules::overlay::{LogOverlaySink, OverlaySink, RedisOverlaySink};
use race_timekeeper::modules::submission::{LogRaceSubmitter, RaceSubmitter, RedisRaceStore};
use race_timekeeper::modules::timing::clock::{Clock, TokioClock};
use race_timekeeper::{Outcome, RaceEvent, RaceMachine, RaceSession, SessionHandle, SessionView};

const HELP: &str = "commands: start | pause | lap | invalid | dnf | reset+ | reset- | undo | \
                    toggle <lap> | end | resume | submit | discard | status | quit";

#[tokio::main]
async fn main() {
    if let Err(error) = setup_logging() {
        eprintln!("{}", error);
        return;
    }

    if let Err(error) = run().await {
        error!(target: "timekeeper", "{}", error);
    }
}

async fn run() -> CustomResult<()> {
    let settings = Settings::from_env()?;
    let setup = RaceSetup::from_env()?;
    info!(
        target: "timekeeper",
        "timekeeping {} on track {} ({} min, {} resets per lap)",
        setup.username, setup.track_id, settings.race.race_time_in_min, settings.race.number_of_resets_per_lap
    );

    let (sink, submitter): (Box<dyn OverlaySink>, Arc<dyn RaceSubmitter>) = match &settings.redis_url {
        Some(url) => (
            Box::new(RedisOverlaySink::spawn(url, &settings.overlay_channel)?),
            Arc::new(RedisRaceStore::new(url, &settings.race_store_key)?),
        ),
        None => {
            warn!(target: "timekeeper", "REDIS_URL not set, overlay and results are only logged");
            (Box::new(LogOverlaySink), Arc::new(LogRaceSubmitter))
        }
    };

    let clock = Arc::new(TokioClock::new());
    let machine = RaceMachine::new(
        settings.race.clone(),
        setup,
        sink,
        settings.cadence.overlay_interval.as_millis() as u64,
        clock.now_ms(),
    );
    let (mut session, handle) = RaceSession::new(machine, clock, submitter, settings.cadence);

    if let Some(addr) = &settings.auto_timer_addr {
        let listener = AutoTimerListener::bind(addr).await?;
        session.subscribe_auto_timer(listener, handle.clone());
    }

    let session_task = session.spawn();
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" => break,
            "status" => print_view(&handle.view().await?),
            _ => match parse_command(line) {
                Some(event) => report(&handle, event).await?,
                None => println!("{}", HELP),
            },
        }
    }

    handle.shutdown();
    if let Err(error) = session_task.await {
        error!(target: "timekeeper", "session task failed: {}", error);
    }
    Ok(())
}

fn parse_command(line: &str) -> Option<RaceEvent> {
    let mut parts = line.split_whitespace();
    let event = match parts.next()? {
        "start" | "pause" => RaceEvent::Toggle,
        "lap" => RaceEvent::CaptureLap { is_valid: true },
        "invalid" => RaceEvent::CaptureLap { is_valid: false },
        "dnf" => RaceEvent::DidNotFinish,
        "reset+" => RaceEvent::IncrementReset,
        "reset-" => RaceEvent::DecrementReset,
        "undo" => RaceEvent::UndoLap,
        "toggle" => RaceEvent::ToggleLapValidity {
            lap_id: parts.next()?.parse().ok()?,
        },
        "end" => RaceEvent::End,
        "resume" => RaceEvent::Resume,
        "submit" => RaceEvent::SubmitRequested,
        "discard" => RaceEvent::Discard,
        _ => return None,
    };
    Some(event)
}

async fn report(handle: &SessionHandle, event: RaceEvent) -> CustomResult<()> {
    let name = event.name();
    if handle.dispatch(event).await? == Outcome::Ignored {
        println!("{} is not available right now", name);
    }
    print_view(&handle.view().await?);
    Ok(())
}

fn print_view(view: &SessionView) {
    println!(
        "{:?} | time left {} | lap {} | resets {} | auto timer {}",
        view.state,
        format_countdown(view.time_left_ms),
        format_lap_time(view.current_lap_time_ms),
        view.resets,
        if view.auto_timer_connected { "connected" } else { "offline" }
    );
    for lap in &view.laps {
        println!(
            "  #{} {} resets {}{}",
            lap.lap_id + 1,
            format_lap_time(lap.time),
            lap.resets,
            if lap.is_valid { "" } else { " (invalid)" }
        );
    }
    for window in &view.average_laps {
        println!(
            "  avg #{}-#{} {}",
            window.start_lap_id + 1,
            window.end_lap_id + 1,
            format_lap_time(window.avg_time)
        );
    }
    if view.end_confirmation_pending {
        println!("race over: submit, discard or resume ({:?})", view.submission);
    }
}
