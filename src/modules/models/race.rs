use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::modules::config::RaceSetup;
use crate::modules::models::lap::{AverageWindow, Lap};

/// Everything recorded during one timekeeping session.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Race {
    pub event_id: String,
    pub track_id: String,
    pub username: String,
    pub user_id: String,
    pub raced_by_proxy: bool,
    pub laps: Vec<Lap>,
    pub average_laps: Vec<AverageWindow>,
    pub current_model_id: Option<String>,
    pub current_car_id: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Race {
    /// # create race
    /// create an empty race for the racer described by the setup
    ///
    /// ## Arguments
    /// * `setup` - who is racing, where, and with which car
    ///
    /// ## Returns
    /// * `Race` - a race without laps
    pub fn new(setup: &RaceSetup) -> Race {
        Race {
            event_id: setup.event_id.clone(),
            track_id: setup.track_id.clone(),
            username: setup.username.clone(),
            user_id: setup.user_id.clone(),
            raced_by_proxy: setup.raced_by_proxy,
            laps: Vec::new(),
            average_laps: Vec::new(),
            current_model_id: setup.model_id.clone(),
            current_car_id: setup.car_id.clone(),
            submitted_at: None,
        }
    }

    pub fn valid_laps(&self) -> impl Iterator<Item = &Lap> {
        self.laps.iter().filter(|lap| lap.is_valid)
    }
}
