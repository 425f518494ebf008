use std::env;
use std::str::FromStr;

use serde::Deserialize;


/// How finished spans leave the instrumented process.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Direct bounded-timeout POST to the collector; drop on failure.
    #[default]
    Http,
    /// Enqueue batches on the durable queue for the relay to drain.
    Queue,
}

impl FromStr for ReportMode {
    type Err = String;

    fn from_str(value: &str) -> Result<ReportMode, String> {
        match value.to_ascii_lowercase().as_str() {
            "http" => Ok(ReportMode::Http),
            "queue" => Ok(ReportMode::Queue),
            other => Err(format!("unknown report mode '{}'", other)),
        }
    }
}


/// Tracing and delivery configuration.
///
/// Defaults mirror a local collector setup; every field can be set from
/// the environment with `Config::from_env`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Service name attached to every reported span.
    pub service_name: String,
    /// Collector span-batch endpoint.
    pub endpoint_url: String,
    /// Probability in `[0, 1]` that a new trace is sampled.
    pub sample_rate: f64,
    /// Maximum HTTP body size captured as a tag, in bytes.
    pub body_size: usize,
    /// Timeout for outbound collector and index pushes, in milliseconds.
    pub timeout_ms: u64,
    /// Name of the durable span queue.
    pub queue_name: String,
    /// Identifier of the queue connection to use.
    pub queue_connection: String,
    /// Bulk endpoint of the search index; empty disables indexing.
    pub index_url: String,
    pub report_mode: ReportMode,
    /// Relay sleep between poll iterations, in milliseconds.
    pub relay_interval_ms: u64,
    /// Relay flush threshold, in poll iterations.
    pub relay_frequency: u32,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            service_name: String::from("zipkin-relay"),
            endpoint_url: String::from("http://localhost:9411/api/v2/spans"),
            sample_rate: 0.0,
            body_size: 5000,
            timeout_ms: 1000,
            queue_name: String::from("queue:zipkin:span"),
            queue_connection: String::from("zipkin"),
            index_url: String::new(),
            report_mode: ReportMode::Http,
            relay_interval_ms: 5,
            relay_frequency: 100,
        }
    }
}

impl Config {
    /// Load configuration from `ZIPKIN_*` environment variables.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    pub fn from_env() -> Config {
        let defaults = Config::default();
        Config {
            service_name: env_string("ZIPKIN_SERVICE_NAME", defaults.service_name),
            endpoint_url: env_string("ZIPKIN_ENDPOINT_URL", defaults.endpoint_url),
            sample_rate: env_parse("ZIPKIN_SAMPLE_RATE", defaults.sample_rate),
            body_size: env_parse("ZIPKIN_BODY_SIZE", defaults.body_size),
            timeout_ms: env_parse("ZIPKIN_TIMEOUT_MS", defaults.timeout_ms),
            queue_name: env_string("ZIPKIN_QUEUE_NAME", defaults.queue_name),
            queue_connection: env_string(
                "ZIPKIN_QUEUE_CONNECTION",
                defaults.queue_connection,
            ),
            index_url: env_string("ZIPKIN_INDEX_URL", defaults.index_url),
            report_mode: env_parse("ZIPKIN_REPORT_MODE", defaults.report_mode),
            relay_interval_ms: env_parse(
                "ZIPKIN_RELAY_INTERVAL_MS",
                defaults.relay_interval_ms,
            ),
            relay_frequency: env_parse(
                "ZIPKIN_RELAY_FREQUENCY",
                defaults.relay_frequency,
            ),
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
