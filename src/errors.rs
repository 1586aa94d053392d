use snafu::Snafu;

pub type CustomResult<T> = Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("invalid value for {}: {:?}", key, value))]
    ConfigError { key: String, value: String },

    #[snafu(display("redis error: {}", source))]
    RedisError { source: redis::RedisError },

    #[snafu(display("could not serialize payload: {}", source))]
    SerializationError { source: serde_json::Error },

    #[snafu(display("race submission failed: {}", reason))]
    SubmissionError { reason: String },

    #[snafu(display("the race session has been shut down"))]
    SessionClosedError,

    #[snafu(display("io error: {}", source))]
    IoError { source: std::io::Error },

    #[snafu(display("failed to setup logging: {}", source))]
    LoggingError { source: fern::InitError },
}
