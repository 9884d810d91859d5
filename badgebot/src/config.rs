// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Bot configuration document.
//!
//! Every field is optional in YAML and falls back to the built-in behavior,
//! so an empty document (or no document at all) configures the stock bot.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    badge::Badge,
    cache::DEFAULT_TTL,
    coords::{CoordinateParser, UrlSettings},
    error::{self, Error},
    gateway::DEFAULT_MAX_WAIT,
    orchestrator::{BotTexts, ReadinessPolicy},
    process::DEFAULT_EXIT_TIMEOUT,
};

/// Default directory forks are cloned into.
pub const DEFAULT_FORKS_DIR: &str = "forks";

/// Root configuration document.
///
/// # Examples
///
/// ```
/// use badgebot::BotConfig;
///
/// let yaml = r#"
/// badge:
///   label: Open in Example
/// cache_ttl_secs: 60
/// "#;
/// let config: BotConfig = serde_yaml::from_str(yaml,).expect("valid configuration",);
/// assert_eq!(config.badge.label, "Open in Example");
/// assert_eq!(config.cache_ttl().as_secs(), 60);
/// assert_eq!(config.fork_readiness.attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default)]
pub struct BotConfig
{
    /// Badge inserted into READMEs.
    pub badge:           Badge,
    /// Commit message and pull request texts.
    pub texts:           BotTexts,
    /// Prefixes of the URL grammars.
    pub urls:            UrlSettings,
    /// Lifetime of cached repository and README lookups.
    pub cache_ttl_secs:  u64,
    /// Longest rate-limit wait before a retry.
    pub max_wait_secs:   u64,
    /// Grace period for a clone to exit after its output closes.
    pub exit_timeout_ms: u64,
    /// Directory receiving fork clones.
    pub forks_dir:       PathBuf,
    /// Polling of freshly created forks.
    pub fork_readiness:  ReadinessSettings,
}

/// Serialized form of [`ReadinessPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default)]
pub struct ReadinessSettings
{
    /// Total number of attempts, at least one.
    pub attempts:   u32,
    /// Pause between attempts, in seconds.
    pub delay_secs: u64,
}

impl Default for ReadinessSettings
{
    fn default() -> Self
    {
        let policy = ReadinessPolicy::default();
        Self {
            attempts:   policy.attempts,
            delay_secs: policy.delay.as_secs(),
        }
    }
}

impl Default for BotConfig
{
    fn default() -> Self
    {
        Self {
            badge:           Badge::default(),
            texts:           BotTexts::default(),
            urls:            UrlSettings::default(),
            cache_ttl_secs:  DEFAULT_TTL.as_secs(),
            max_wait_secs:   DEFAULT_MAX_WAIT.as_secs(),
            exit_timeout_ms: DEFAULT_EXIT_TIMEOUT.as_millis() as u64,
            forks_dir:       PathBuf::from(DEFAULT_FORKS_DIR,),
            fork_readiness:  ReadinessSettings::default(),
        }
    }
}

impl BotConfig
{
    pub fn cache_ttl(&self,) -> Duration
    {
        Duration::from_secs(self.cache_ttl_secs,)
    }

    pub fn max_wait(&self,) -> Duration
    {
        Duration::from_secs(self.max_wait_secs,)
    }

    pub fn exit_timeout(&self,) -> Duration
    {
        Duration::from_millis(self.exit_timeout_ms,)
    }

    pub fn readiness(&self,) -> ReadinessPolicy
    {
        ReadinessPolicy {
            attempts: self.fork_readiness.attempts,
            delay:    Duration::from_secs(self.fork_readiness.delay_secs,),
        }
    }

    /// Checks values the defaults cannot repair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for blank badge fields, a zero attempt
    /// count, or URL prefixes the parser rejects.
    pub fn validate(&self,) -> Result<(), Error,>
    {
        if self.badge.image_url.trim().is_empty() {
            return Err(Error::validation("badge image URL cannot be empty",),);
        }
        if self.badge.label.trim().is_empty() {
            return Err(Error::validation("badge label cannot be empty",),);
        }
        if self.fork_readiness.attempts == 0 {
            return Err(Error::validation("fork readiness attempts must be at least 1",),);
        }

        CoordinateParser::new(self.urls.clone(),).map(|_| (),)
    }
}

/// Loads and validates a configuration file.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read and the errors of
/// [`parse_config`] otherwise.
pub fn load_config(path: &Path,) -> Result<BotConfig, Error,>
{
    let contents = fs::read_to_string(path,).map_err(|source| error::io_error(path, source,),)?;
    parse_config(&contents,)
}

/// Parses and validates a configuration document. Blank documents yield the
/// defaults.
///
/// # Errors
///
/// Returns [`Error::Parse`] for malformed YAML and [`Error::Validation`]
/// when [`BotConfig::validate`] fails.
pub fn parse_config(contents: &str,) -> Result<BotConfig, Error,>
{
    let config = if contents.trim().is_empty() {
        BotConfig::default()
    } else {
        serde_yaml::from_str::<BotConfig,>(contents,)?
    };

    config.validate()?;
    Ok(config,)
}
