use std::env;
use std::str::FromStr;
use std::time::Duration;

use bcmrng_hal::{GenerationMode, RngConfig};
use runtime::device::DEFAULT_RATE;
use runtime::PollOptions;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
  #[error("{name}: invalid value {value:?}")]
  Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
  /// Number of random bytes to print.
  pub bytes: usize,
  pub rng: RngConfig,
  pub poll: PollOptions,
  /// Words the simulated hardware produces per STATUS read.
  pub rate: u32,
  pub seed: Option<u64>,
}

impl Config {
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|name| env::var(name).ok())
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
    let mode = if parse_bool(&lookup, "RNGD_DOUBLE_SPEED")?.unwrap_or(false) {
      GenerationMode::DoubleSpeed
    } else {
      GenerationMode::Normal
    };

    let mut poll = PollOptions::default();
    if let Some(micros) = parse::<u64>(&lookup, "RNGD_POLL_INTERVAL_US")? {
      poll = poll.interval(Duration::from_micros(micros));
    }
    if let Some(millis) = parse::<u64>(&lookup, "RNGD_MAX_WAIT_MS")? {
      poll = poll.max_wait(Duration::from_millis(millis));
    }

    Ok(Self {
      bytes: parse(&lookup, "RNGD_BYTES")?.unwrap_or(32),
      rng: RngConfig::new(mode),
      poll,
      rate: parse(&lookup, "RNGD_SIM_RATE")?.unwrap_or(DEFAULT_RATE),
      seed: parse(&lookup, "RNGD_SEED")?,
    })
  }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<T>, ConfigError> {
  match lookup(name) {
    None => Ok(None),
    Some(value) => value.trim().parse().map(Some).map_err(|_| ConfigError::Invalid { name, value }),
  }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<bool>, ConfigError> {
  match lookup(name) {
    None => Ok(None),
    Some(value) => match value.trim().to_ascii_lowercase().as_str() {
      "1" | "true" | "yes" | "on" => Ok(Some(true)),
      "0" | "false" | "no" | "off" => Ok(Some(false)),
      _ => Err(ConfigError::Invalid { name, value }),
    },
  }
}
