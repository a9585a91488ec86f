//! Retry and dispatch tuning.

use std::str::FromStr;
use std::time::Duration;

use crate::EngineError;

/// Retry policy for a single alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total submission attempts, at least 1.
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 6,
            retry_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }
}

/// Slicing and worker pool settings for a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Alphas per slice, at least 1.
    pub batch_size: usize,
    /// Alphas in flight at once, at least 1.
    pub max_workers: usize,
    /// Pause between consecutive slices.
    pub batch_pause: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_workers: 5,
            batch_pause: Duration::from_secs(5),
        }
    }
}

impl DispatchConfig {
    pub fn new(batch_size: usize, max_workers: usize, batch_pause: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_workers: max_workers.max(1),
            batch_pause,
        }
    }
}

/// Combined engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub retry: RetryConfig,
    pub dispatch: DispatchConfig,
}

impl EngineConfig {
    /// Build a config from environment variables.
    ///
    /// - `SIM_MAX_RETRIES` (default: 6)
    /// - `SIM_RETRY_DELAY_SECS` (default: 10)
    /// - `SIM_BATCH_SIZE` (default: 1000)
    /// - `SIM_MAX_WORKERS` (default: 5)
    /// - `SIM_BATCH_PAUSE_SECS` (default: 5)
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let retry = RetryConfig::default();
        let dispatch = DispatchConfig::default();

        let max_retries = parse_var(&lookup, "SIM_MAX_RETRIES")?.unwrap_or(retry.max_retries);
        let retry_delay = parse_var(&lookup, "SIM_RETRY_DELAY_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(retry.retry_delay);
        let batch_size = parse_var(&lookup, "SIM_BATCH_SIZE")?.unwrap_or(dispatch.batch_size);
        let max_workers = parse_var(&lookup, "SIM_MAX_WORKERS")?.unwrap_or(dispatch.max_workers);
        let batch_pause = parse_var(&lookup, "SIM_BATCH_PAUSE_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(dispatch.batch_pause);

        Ok(Self {
            retry: RetryConfig::new(max_retries, retry_delay),
            dispatch: DispatchConfig::new(batch_size, max_workers, batch_pause),
        })
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, EngineError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    raw.parse()
        .map(Some)
        .map_err(|_| EngineError::Config(format!("{name} is not a valid number: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() -> Result<(), EngineError> {
        let config = EngineConfig::from_vars(|_| None)?;

        assert_eq!(config.retry.max_retries, 6);
        assert_eq!(config.retry.retry_delay, Duration::from_secs(10));
        assert_eq!(config.dispatch.batch_size, 1000);
        assert_eq!(config.dispatch.max_workers, 5);
        assert_eq!(config.dispatch.batch_pause, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn zero_sizes_are_clamped() -> Result<(), EngineError> {
        let config = EngineConfig::from_vars(|name| match name {
            "SIM_MAX_RETRIES" | "SIM_BATCH_SIZE" | "SIM_MAX_WORKERS" => Some("0".into()),
            "SIM_BATCH_PAUSE_SECS" => Some(" 1 ".into()),
            _ => None,
        })?;

        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.dispatch.batch_size, 1);
        assert_eq!(config.dispatch.max_workers, 1);
        assert_eq!(config.dispatch.batch_pause, Duration::from_secs(1));
        Ok(())
    }

    #[test]
    fn unparseable_values_are_reported() {
        let result = EngineConfig::from_vars(|name| {
            (name == "SIM_MAX_WORKERS").then(|| "many".to_string())
        });

        assert!(matches!(result, Err(EngineError::Config(msg)) if msg.contains("SIM_MAX_WORKERS")));
    }
}
