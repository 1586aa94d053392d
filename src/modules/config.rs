use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigSnafu, CustomResult};

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RankingMethod {
    BestLapTime,
    BestAverageLapTimeX,
}

impl FromStr for RankingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BEST_LAP_TIME" => Ok(RankingMethod::BestLapTime),
            "BEST_AVERAGE_LAP_TIME_X" => Ok(RankingMethod::BestAverageLapTimeX),
            _ => Err(format!("unknown ranking method {s}")),
        }
    }
}

/// Per event/track race rules. Read-only while a race runs.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RaceConfig {
    pub race_time_in_min: u64,
    pub number_of_resets_per_lap: u32,
    pub ranking_method: RankingMethod,
    pub average_laps_window: Option<usize>,
}

impl Default for RaceConfig {
    fn default() -> Self {
        RaceConfig {
            race_time_in_min: 3,
            number_of_resets_per_lap: 2,
            ranking_method: RankingMethod::BestLapTime,
            average_laps_window: Some(3),
        }
    }
}

impl RaceConfig {
    pub fn race_time_ms(&self) -> u64 {
        self.race_time_in_min.saturating_mul(60 * 1000)
    }

    pub fn from_env() -> CustomResult<RaceConfig> {
        dotenv().ok();
        let defaults = RaceConfig::default();

        Ok(RaceConfig {
            race_time_in_min: env_or("RACE_TIME_IN_MIN", defaults.race_time_in_min)?,
            number_of_resets_per_lap: env_or("RESETS_PER_LAP", defaults.number_of_resets_per_lap)?,
            ranking_method: env_or("RANKING_METHOD", defaults.ranking_method)?,
            average_laps_window: Some(env_or("AVERAGE_LAPS_WINDOW", 3usize)?),
        })
    }
}

/// Who is racing, where, and with which car.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RaceSetup {
    pub event_id: String,
    pub event_name: String,
    pub track_id: String,
    pub username: String,
    pub user_id: String,
    pub raced_by_proxy: bool,
    pub car_name: String,
    pub model_id: Option<String>,
    pub car_id: Option<String>,
}

impl RaceSetup {
    pub fn from_env() -> CustomResult<RaceSetup> {
        dotenv().ok();

        Ok(RaceSetup {
            event_id: env::var("EVENT_ID").unwrap_or_default(),
            event_name: env::var("EVENT_NAME").unwrap_or_default(),
            track_id: env::var("TRACK_ID").unwrap_or_else(|_| "1".to_string()),
            username: env::var("RACER_NAME").unwrap_or_default(),
            user_id: env::var("RACER_ID").unwrap_or_default(),
            raced_by_proxy: env_or("RACED_BY_PROXY", false)?,
            car_name: env::var("CAR_NAME").unwrap_or_default(),
            model_id: env::var("MODEL_ID").ok(),
            car_id: env::var("CAR_ID").ok(),
        })
    }
}

/// Tick and broadcast intervals of a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub lap_tick: Duration,
    pub race_tick: Duration,
    pub overlay_interval: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Cadence {
            lap_tick: Duration::from_millis(10),
            race_tick: Duration::from_millis(100),
            overlay_interval: Duration::from_millis(2000),
        }
    }
}

/// Process level settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub redis_url: Option<String>,
    pub overlay_channel: String,
    pub race_store_key: String,
    pub auto_timer_addr: Option<String>,
    pub cadence: Cadence,
    pub race: RaceConfig,
}

impl Settings {
    pub fn from_env() -> CustomResult<Settings> {
        dotenv().ok();
        let defaults = Cadence::default();

        let cadence = Cadence {
            lap_tick: env_millis("LAP_TICK_MS", defaults.lap_tick)?,
            race_tick: env_millis("RACE_TICK_MS", defaults.race_tick)?,
            overlay_interval: env_millis("OVERLAY_INTERVAL_MS", defaults.overlay_interval)?,
        };

        Ok(Settings {
            redis_url: env::var("REDIS_URL").ok(),
            overlay_channel: env::var("OVERLAY_CHANNEL").unwrap_or_else(|_| "overlay".to_string()),
            race_store_key: env::var("RACE_STORE_KEY").unwrap_or_else(|_| "races".to_string()),
            auto_timer_addr: env::var("AUTO_TIMER_ADDR").ok(),
            cadence,
            race: RaceConfig::from_env()?,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> CustomResult<T> {
    match env::var(key) {
        Ok(value) => parse_value(key, &value),
        Err(_) => Ok(default),
    }
}

/// A non-zero interval in milliseconds.
fn env_millis(key: &str, default: Duration) -> CustomResult<Duration> {
    let millis: u64 = env_or(key, default.as_millis() as u64)?;
    if millis == 0 {
        return ConfigSnafu {
            key: key.to_string(),
            value: millis.to_string(),
        }
        .fail();
    }
    Ok(Duration::from_millis(millis))
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> CustomResult<T> {
    value.trim().parse::<T>().map_err(|_| {
        ConfigSnafu {
            key: key.to_string(),
            value: value.to_string(),
        }
        .build()
    })
}
