//! Environment-driven configuration.
//!
//! Values are read from the process environment (after `.env` is loaded by
//! `dotenvy`) through `figment`. Durations accept either an integer number of
//! seconds or any `fundu` duration string such as `500ms` or `2m`.

use figment::{Figment, providers::Env};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::utils::fmt_duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Postgres connection string. Parsed lazily by the session provider so
    /// that a malformed value is reported by the connectivity endpoint.
    pub database_url: String,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Level for this crate's logs. Numeric values (`1`..`5`) are accepted
    /// as well as names, matching `tracing`'s level syntax.
    #[serde(
        default = "default_log_level",
        deserialize_with = "deserialize_log_level"
    )]
    pub log_level: String,
    /// Grace period for in-flight requests once a shutdown signal arrives.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,
    /// Upper bound on one connectivity check (acquire + `SELECT 1`). Must be
    /// shorter than `request_timeout` so a stalled check still produces a
    /// JSON report instead of a bare timeout response.
    #[serde(
        default = "default_check_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub check_timeout: Duration,
    #[serde(
        default = "default_db_acquire_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub db_acquire_timeout: Duration,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, figment::Error> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), figment::Error> {
        if self.check_timeout >= self.request_timeout {
            return Err(figment::Error::from(format!(
                "CHECK_TIMEOUT ({}) must be shorter than REQUEST_TIMEOUT ({})",
                fmt_duration(self.check_timeout),
                fmt_duration(self.request_timeout)
            )));
        }
        Ok(())
    }

    /// The figment used by [`Config::load`], exposed for tests.
    pub fn figment() -> Figment {
        Figment::new().merge(Env::raw())
    }

    /// Address the web server binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_check_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_db_acquire_timeout() -> Duration {
    Duration::from_secs(4)
}

fn default_db_max_connections() -> u32 {
    4
}

/// Parse a human-readable duration. Bare numbers are seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let parser = DurationParser::builder()
        .time_units(&[
            TimeUnit::MilliSecond,
            TimeUnit::Second,
            TimeUnit::Minute,
            TimeUnit::Hour,
        ])
        .allow_time_unit_delimiter()
        .disable_exponent()
        .build();

    let parsed = parser
        .parse(input.trim())
        .map_err(|e| format!("invalid duration '{input}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{input}': {e}"))
}

/// Figment parses `LOG_LEVEL=5` as an integer; keep it as its string form.
fn deserialize_log_level<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct LevelVisitor;

    impl Visitor<'_> for LevelVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a log level name or number")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(value.to_string())
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            Ok(value.to_string())
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(LevelVisitor)
}

/// Accepts integer seconds (figment turns `SHUTDOWN_TIMEOUT=8` into an int)
/// or a duration string.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a duration string or a number of seconds")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| E::custom(format!("duration cannot be negative: {value}")))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            parse_duration(value).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
