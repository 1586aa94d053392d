use redis::{Client, Commands, Connection, ToRedisArgs};
use snafu::ResultExt;

use crate::errors::{CustomResult, RedisSnafu};

pub struct Redis {}

impl Redis {
    pub fn client(redis_url: &str) -> CustomResult<Client> {
        Client::open(redis_url).context(RedisSnafu)
    }

    pub fn connect(client: &Client) -> CustomResult<Connection> {
        client.get_connection().context(RedisSnafu)
    }

    pub fn publish<C: ToRedisArgs, D: ToRedisArgs>(conn: &mut Connection, channel: C, data: D) -> CustomResult<i64> {
        conn.publish::<C, D, i64>(channel, data).context(RedisSnafu)
    }

    pub fn set_data<K: ToRedisArgs, D: ToRedisArgs>(conn: &mut Connection, key: K, data: D) -> CustomResult<()> {
        conn.set::<K, D, ()>(key, data).context(RedisSnafu)
    }

    pub fn push<K: ToRedisArgs, D: ToRedisArgs>(conn: &mut Connection, key: K, data: D) -> CustomResult<i64> {
        conn.rpush::<K, D, i64>(key, data).context(RedisSnafu)
    }
}
