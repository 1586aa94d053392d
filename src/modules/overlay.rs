use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use log::{debug, error, info, warn};
use snafu::ResultExt;

use crate::errors::{CustomResult, SerializationSnafu};
use crate::modules::models::overlay::{OverlaySnapshot, RaceStatus};
use crate::modules::redis::Redis;

/// Outbound channel for overlay snapshots. Delivery is fire-and-forget.
pub trait OverlaySink: Send {
    fn publish(&mut self, snapshot: &OverlaySnapshot) -> CustomResult<()>;
}

/// Rate limits snapshots before they reach the sink.
///
/// A snapshot is dropped when it arrives within `min_interval_ms` of the
/// previous one and carries the same status. A status change always goes out.
pub struct OverlayPublisher {
    sink: Box<dyn OverlaySink>,
    last_published_ms: Option<u64>,
    last_status: Option<RaceStatus>,
}

impl OverlayPublisher {
    pub fn new(sink: Box<dyn OverlaySink>) -> Self {
        OverlayPublisher {
            sink,
            last_published_ms: None,
            last_status: None,
        }
    }

    /// # publish snapshot
    /// hand a snapshot to the sink unless it is rate limited
    ///
    /// ## Arguments
    /// * `snapshot` - the race status to show
    /// * `min_interval_ms` - minimum time since the previous publish, `None` to always publish
    /// * `now_ms` - the current clock reading
    ///
    /// ## Returns
    /// * `bool` - true if the snapshot was handed to the sink
    pub fn publish(&mut self, snapshot: OverlaySnapshot, min_interval_ms: Option<u64>, now_ms: u64) -> bool {
        if let (Some(min_interval), Some(last)) = (min_interval_ms, self.last_published_ms) {
            let same_status = self.last_status == Some(snapshot.race_status);
            if same_status && now_ms.saturating_sub(last) < min_interval {
                debug!(target: "overlay:publish", "rate limited {:?} snapshot", snapshot.race_status);
                return false;
            }
        }

        self.last_published_ms = Some(now_ms);
        self.last_status = Some(snapshot.race_status);

        if let Err(error) = self.sink.publish(&snapshot) {
            warn!(target: "overlay:publish", "failed to publish overlay: {}", error);
        }
        true
    }
}

/// Writes snapshots to the log only.
pub struct LogOverlaySink;

impl OverlaySink for LogOverlaySink {
    fn publish(&mut self, snapshot: &OverlaySnapshot) -> CustomResult<()> {
        info!(
            target: "overlay:log",
            "{:?} laps: {}, time left: {}ms, lap time: {}ms",
            snapshot.race_status,
            snapshot.laps.len(),
            snapshot.time_left_in_ms,
            snapshot.current_lap_time_in_ms
        );
        Ok(())
    }
}

/// Publishes snapshots as JSON on a redis channel.
///
/// The redis round trip happens on a background thread so the race loop
/// never waits on the network.
pub struct RedisOverlaySink {
    sender: mpsc::Sender<String>,
}

impl RedisOverlaySink {
    pub fn spawn(redis_url: &str, channel: &str) -> CustomResult<RedisOverlaySink> {
        let client = Redis::client(redis_url)?;
        let mut conn = Redis::connect(&client)?;
        let (sender, receiver) = mpsc::channel::<String>();
        info!(target: "overlay:redis", "publishing overlay on channel {}", channel);

        let channel = channel.to_string();
        thread::spawn(move || {
            for payload in receiver {
                if let Err(error) = Redis::publish(&mut conn, &channel, payload) {
                    error!(target: "overlay:redis", "error publishing to {}: {}", channel, error);
                    match Redis::connect(&client) {
                        Ok(fresh) => conn = fresh,
                        Err(error) => {
                            error!(target: "overlay:redis", "error reconnecting to redis: {}", error);
                        }
                    }
                }
            }
            debug!(target: "overlay:redis", "overlay publisher stopped");
        });

        Ok(RedisOverlaySink { sender })
    }
}

impl OverlaySink for RedisOverlaySink {
    fn publish(&mut self, snapshot: &OverlaySnapshot) -> CustomResult<()> {
        let payload = serde_json::to_string(snapshot).context(SerializationSnafu)?;
        if self.sender.send(payload).is_err() {
            warn!(target: "overlay:redis", "overlay publisher thread is gone, snapshot dropped");
        }
        Ok(())
    }
}

/// Keeps every published snapshot in memory.
#[derive(Clone, Default)]
pub struct MemoryOverlaySink {
    published: Arc<Mutex<Vec<OverlaySnapshot>>>,
}

impl MemoryOverlaySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<OverlaySnapshot> {
        match self.published.lock() {
            Ok(published) => published.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn statuses(&self) -> Vec<RaceStatus> {
        self.snapshots().iter().map(|s| s.race_status).collect()
    }
}

impl OverlaySink for MemoryOverlaySink {
    fn publish(&mut self, snapshot: &OverlaySnapshot) -> CustomResult<()> {
        match self.published.lock() {
            Ok(mut published) => published.push(snapshot.clone()),
            Err(poisoned) => poisoned.into_inner().push(snapshot.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(status: RaceStatus) -> OverlaySnapshot {
        OverlaySnapshot {
            event_id: "event".to_string(),
            event_name: "Event".to_string(),
            track_id: "1".to_string(),
            username: "racer".to_string(),
            user_id: "user".to_string(),
            laps: vec![],
            average_laps: vec![],
            time_left_in_ms: 180_000,
            current_lap_time_in_ms: 0,
            race_status: status,
        }
    }

    #[test]
    fn redis_sink_reports_unreachable_server() {
        assert!(RedisOverlaySink::spawn("redis://127.0.0.1:1/", "overlay").is_err());
        assert!(RedisOverlaySink::spawn("not a url", "overlay").is_err());
    }

    #[test]
    fn rate_limits_same_status() {
        let sink = MemoryOverlaySink::new();
        let mut publisher = OverlayPublisher::new(Box::new(sink.clone()));

        assert!(publisher.publish(snapshot(RaceStatus::RaceInProgress), Some(2000), 0));
        assert!(!publisher.publish(snapshot(RaceStatus::RaceInProgress), Some(2000), 1999));
        assert!(publisher.publish(snapshot(RaceStatus::RaceInProgress), Some(2000), 2000));
        assert_eq!(sink.snapshots().len(), 2);
    }

    #[test]
    fn status_change_and_forced_publish_pass() {
        let sink = MemoryOverlaySink::new();
        let mut publisher = OverlayPublisher::new(Box::new(sink.clone()));

        publisher.publish(snapshot(RaceStatus::RaceInProgress), Some(2000), 0);
        assert!(publisher.publish(snapshot(RaceStatus::RacePaused), Some(2000), 10));
        assert!(publisher.publish(snapshot(RaceStatus::RacePaused), None, 20));
        assert_eq!(
            sink.statuses(),
            vec![RaceStatus::RaceInProgress, RaceStatus::RacePaused, RaceStatus::RacePaused]
        );
    }
}
