use std::{
    env::var,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

pub type Config = Arc<Configuration>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    #[error("Unable to parse the value of the {name} environment variable: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Configuration {
    /// The address to listen on.
    pub listen_address: SocketAddr,
    // The port to listen on.
    pub app_port: u16,

    /// Base URL of the ingestion and search service.
    pub upstream_url: String,
    pub upstream_timeout: Duration,

    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
    pub clear_after_success: Duration,
    pub clear_after_failure: Duration,

    pub default_top_k: u32,
}

impl Configuration {
    pub fn new() -> Result<Config, ConfigError> {
        let app_port = parse("PORT")?.ok_or(ConfigError::Missing("PORT"))?;
        let upstream_url = var("UPSTREAM_URL").map_err(|_| ConfigError::Missing("UPSTREAM_URL"))?;

        let upstream_timeout = Duration::from_secs(parse("UPSTREAM_TIMEOUT_SECS")?.unwrap_or(120));
        let poll_interval = Duration::from_millis(parse("POLL_INTERVAL_MS")?.unwrap_or(1000));
        let poll_max_attempts = parse("POLL_MAX_ATTEMPTS")?.unwrap_or(300);
        let clear_after_success =
            Duration::from_millis(parse("CLEAR_AFTER_SUCCESS_MS")?.unwrap_or(3000));
        let clear_after_failure =
            Duration::from_millis(parse("CLEAR_AFTER_FAILURE_MS")?.unwrap_or(10_000));
        let default_top_k = parse("DEFAULT_TOP_K")?.unwrap_or(5);

        let listen_address = SocketAddr::from((Ipv6Addr::UNSPECIFIED, app_port));

        Ok(Arc::new(Configuration {
            listen_address,
            app_port,
            upstream_url,
            upstream_timeout,
            poll_interval,
            poll_max_attempts,
            clear_after_success,
            clear_after_failure,
            default_top_k,
        }))
    }
}

fn parse<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match var(name) {
        Ok(value) => match value.trim().parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::Invalid { name, value }),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reports_invalid_values() {
        std::env::set_var("RETRIEVAL_DESK_TEST_NUMBER", "12");
        assert_eq!(
            parse::<u32>("RETRIEVAL_DESK_TEST_NUMBER").unwrap(),
            Some(12)
        );

        std::env::set_var("RETRIEVAL_DESK_TEST_BAD", "twelve");
        let err = parse::<u32>("RETRIEVAL_DESK_TEST_BAD").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to parse the value of the RETRIEVAL_DESK_TEST_BAD environment variable: twelve"
        );

        assert_eq!(parse::<u32>("RETRIEVAL_DESK_TEST_UNSET").unwrap(), None);
    }
}
