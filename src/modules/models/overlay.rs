use serde::{Deserialize, Serialize};

use crate::modules::models::lap::{AverageWindow, Lap};

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaceStatus {
    ReadyToStart,
    RaceInProgress,
    RacePaused,
    RaceFinished,
}

/// Race status as shown on the public stream overlay.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySnapshot {
    pub event_id: String,
    pub event_name: String,
    pub track_id: String,
    pub username: String,
    pub user_id: String,
    pub laps: Vec<Lap>,
    pub average_laps: Vec<AverageWindow>,
    pub time_left_in_ms: u64,
    pub current_lap_time_in_ms: u64,
    pub race_status: RaceStatus,
}
