use log::info;
use redis::Client;
use snafu::ResultExt;

use crate::errors::{CustomResult, SerializationSnafu};
use crate::modules::models::race::Race;
use crate::modules::redis::Redis;

/// Persistence of finished races. Called once per operator confirmation,
/// failures are reported back to the operator and never retried here.
pub trait RaceSubmitter: Send + Sync + 'static {
    fn submit_race(&self, race: &Race) -> CustomResult<()>;
}

/// Stores each race as JSON in redis and appends its key to a list.
pub struct RedisRaceStore {
    client: Client,
    key_prefix: String,
}

impl RedisRaceStore {
    pub fn new(redis_url: &str, key_prefix: &str) -> CustomResult<RedisRaceStore> {
        Ok(RedisRaceStore {
            client: Redis::client(redis_url)?,
            key_prefix: key_prefix.to_string(),
        })
    }

    /// # race key
    /// the key a race is stored under: `{prefix}:{event}:{user}:{submitted timestamp}`
    pub fn race_key(&self, race: &Race) -> String {
        let timestamp = race.submitted_at.map(|at| at.timestamp_millis()).unwrap_or_default();
        format!("{}:{}:{}:{}", self.key_prefix, race.event_id, race.user_id, timestamp)
    }
}

impl RaceSubmitter for RedisRaceStore {
    fn submit_race(&self, race: &Race) -> CustomResult<()> {
        let payload = serde_json::to_string(race).context(SerializationSnafu)?;
        let key = self.race_key(race);

        let conn = &mut Redis::connect(&self.client)?;
        Redis::set_data(conn, &key, payload)?;
        Redis::push(conn, &self.key_prefix, &key)?;

        info!(target: "submission:redis", "stored race {} ({} laps)", key, race.laps.len());
        Ok(())
    }
}

/// Logs the race instead of storing it, for runs without redis.
pub struct LogRaceSubmitter;

impl RaceSubmitter for LogRaceSubmitter {
    fn submit_race(&self, race: &Race) -> CustomResult<()> {
        let payload = serde_json::to_string(race).context(SerializationSnafu)?;
        info!(target: "submission:log", "race submitted: {}", payload);
        Ok(())
    }
}
