use std::collections::HashMap;
use std::env;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HTTP_PUSH_URL is required but not set")]
    UrlMissing,

    #[error("HTTP_PUSH_URL is not a valid URL: {0}")]
    UrlInvalid(String),

    #[error("HTTP_PUSH_MAC is required but not set")]
    MacMissing,

    #[error("{0} has invalid value: {1}")]
    InvalidNumeric(String, String),

    #[error("HTTP_PUSH_POLL_INTERVAL_MS must be greater than zero")]
    ZeroPollInterval,

    #[error("HTTP_PUSH_HEADERS has an invalid header: {0}")]
    InvalidHeader(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub url: Url,
    pub mac: String,
    pub headers: Vec<(String, String)>,
    pub poll_interval: Duration,
    pub listener_port: u16,
    /// `None` leaves outbound requests without a deadline.
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with("HTTP_PUSH_"))
            .collect();
        Self::parse(&vars)
    }

    fn parse(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let url = parse_url(vars)?;
        let mac = parse_mac(vars)?;
        let headers = parse_headers(vars)?;
        let poll_interval = parse_poll_interval(vars, "HTTP_PUSH_POLL_INTERVAL_MS", 10_000)?;
        let listener_port = parse_port(vars, "HTTP_PUSH_LISTENER_PORT", 4320)?;
        let request_timeout = parse_optional_ms(vars, "HTTP_PUSH_REQUEST_TIMEOUT_MS")?;

        Ok(Self {
            url,
            mac,
            headers,
            poll_interval,
            listener_port,
            request_timeout,
        })
    }
}

fn parse_url(vars: &HashMap<String, String>) -> Result<Url, ConfigError> {
    let raw = vars
        .get("HTTP_PUSH_URL")
        .filter(|s| !s.is_empty())
        .ok_or(ConfigError::UrlMissing)?;

    Url::parse(raw).map_err(|_| ConfigError::UrlInvalid(raw.clone()))
}

fn parse_mac(vars: &HashMap<String, String>) -> Result<String, ConfigError> {
    vars.get("HTTP_PUSH_MAC")
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .ok_or(ConfigError::MacMissing)
}

fn parse_port(
    vars: &HashMap<String, String>,
    name: &str,
    default: u16,
) -> Result<u16, ConfigError> {
    match vars.get(name) {
        Some(val) => val
            .parse()
            .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.clone())),
        None => Ok(default),
    }
}

fn parse_ms(name: &str, val: &str) -> Result<u64, ConfigError> {
    val.parse()
        .map_err(|_| ConfigError::InvalidNumeric(name.to_owned(), val.to_owned()))
}

fn parse_poll_interval(
    vars: &HashMap<String, String>,
    name: &str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    let ms = match vars.get(name) {
        Some(val) => parse_ms(name, val)?,
        None => default_ms,
    };
    if ms == 0 {
        return Err(ConfigError::ZeroPollInterval);
    }
    Ok(Duration::from_millis(ms))
}

fn parse_optional_ms(
    vars: &HashMap<String, String>,
    name: &str,
) -> Result<Option<Duration>, ConfigError> {
    match vars.get(name).filter(|s| !s.is_empty()) {
        Some(val) => match parse_ms(name, val)? {
            0 => Ok(None),
            ms => Ok(Some(Duration::from_millis(ms))),
        },
        None => Ok(None),
    }
}

/// One `Name=Value` entry per line. Order is kept; duplicates are resolved
/// when the headers are applied to a request. Lines are the separator because
/// commas and semicolons are legal inside header values.
fn parse_headers(vars: &HashMap<String, String>) -> Result<Vec<(String, String)>, ConfigError> {
    let Some(raw) = vars.get("HTTP_PUSH_HEADERS").filter(|s| !s.is_empty()) else {
        return Ok(Vec::new());
    };

    let mut headers = Vec::new();
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((k, v)) = line.split_once('=') else {
            return Err(ConfigError::InvalidHeader(line.to_owned()));
        };
        let k = k.trim();
        let v = v.trim();
        if k.is_empty() {
            return Err(ConfigError::InvalidHeader(line.to_owned()));
        }
        HeaderName::from_bytes(k.as_bytes())
            .map_err(|_| ConfigError::InvalidHeader(k.to_owned()))?;
        HeaderValue::from_str(v).map_err(|_| ConfigError::InvalidHeader(k.to_owned()))?;
        headers.push((k.to_owned(), v.to_owned()));
    }
    Ok(headers)
}
