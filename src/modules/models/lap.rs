use serde::{Deserialize, Serialize};

/// One timed segment of a race, as captured by the timekeeper.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Lap {
    pub lap_id: usize,
    pub time: u64,
    pub resets: u32,
    pub is_valid: bool,
    pub car_name: String,
    pub model_id: String,
    pub auto_timer_connected: bool,
}

/// Average over a run of consecutive valid laps.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AverageWindow {
    pub start_lap_id: usize,
    pub end_lap_id: usize,
    pub avg_time: u64,
}
