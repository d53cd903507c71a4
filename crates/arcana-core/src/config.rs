//! Engine configuration.
//!
//! Sources, lowest precedence first: built-in defaults, a TOML file, then
//! `ARCANA_*` environment variables.

use std::path::Path;
use std::str::FromStr;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::backoff::BackoffPolicy;
use crate::entropy::EntropyConfig;
use crate::interpret::OrchestratorConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub entropy: EntropyConfig,
    pub orchestrator: OrchestratorConfig,
}

/// Environment variables read by [`EngineConfig::apply_env`].
pub const ENV_OVERRIDES: &[&str] = &[
    "ARCANA_LOOKAHEAD_SLOTS",
    "ARCANA_FINALITY_TIMEOUT_MS",
    "ARCANA_CHAIN_MAX_ATTEMPTS",
    "ARCANA_PROVIDER_TIMEOUT_MS",
    "ARCANA_PROVIDER_MAX_ATTEMPTS",
    "ARCANA_POOL_SIZE",
    "ARCANA_PREMIUM_RESERVED",
    "ARCANA_CACHE_CAPACITY",
];

impl EngineConfig {
    /// Load config from a TOML file. Missing keys take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Save config to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("failed to write config file {}", path.as_ref().display()))
    }

    /// Defaults, then `path` if given, then the environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        check_backoff("entropy.backoff", &self.entropy.backoff)?;
        check_backoff(
            "orchestrator.execution.backoff",
            &self.orchestrator.execution.backoff,
        )?;
        Ok(())
    }

    /// Apply `ARCANA_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_with(&lookup, "ARCANA_LOOKAHEAD_SLOTS", &mut self.entropy.lookahead_slots)?;
        override_with(
            &lookup,
            "ARCANA_FINALITY_TIMEOUT_MS",
            &mut self.entropy.finality_timeout_ms,
        )?;
        override_with(&lookup, "ARCANA_CHAIN_MAX_ATTEMPTS", &mut self.entropy.max_attempts)?;

        let orchestrator = &mut self.orchestrator;
        override_with(
            &lookup,
            "ARCANA_PROVIDER_TIMEOUT_MS",
            &mut orchestrator.execution.timeout_ms,
        )?;
        override_with(
            &lookup,
            "ARCANA_PROVIDER_MAX_ATTEMPTS",
            &mut orchestrator.execution.max_attempts,
        )?;
        override_with(&lookup, "ARCANA_POOL_SIZE", &mut orchestrator.pool.pool_size)?;
        override_with(
            &lookup,
            "ARCANA_PREMIUM_RESERVED",
            &mut orchestrator.pool.premium_reserved,
        )?;
        override_with(&lookup, "ARCANA_CACHE_CAPACITY", &mut orchestrator.cache_capacity)?;
        Ok(())
    }
}

fn check_backoff(section: &str, policy: &BackoffPolicy) -> Result<()> {
    ensure!(
        policy.jitter_factor.is_finite() && (0.0..=1.0).contains(&policy.jitter_factor),
        "{section}.jitter_factor must be between 0 and 1, got {}",
        policy.jitter_factor
    );
    Ok(())
}

fn override_with<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}"))?;
    }
    Ok(())
}
