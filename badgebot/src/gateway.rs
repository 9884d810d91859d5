// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Rate-limit recovery for calls against the hosting service.
//!
//! Every remote call goes through [`RateLimitedGateway::call`]. When the
//! service reports an exhausted limit, the gateway asks for the reset time of
//! the corresponding [`LimitClass`], sleeps until then and retries exactly
//! once; a second rate-limit failure is returned to the caller.
use std::{fmt, future::Future, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{error::Error, host::RepositoryHost};

/// Longest wait accepted before retrying a rate-limited call.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60 * 60,);

/// Independently tracked rate-limit buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,)]
#[serde(rename_all = "snake_case")]
pub enum LimitClass
{
    /// Repository, content, fork and pull request operations.
    Core,
    /// User and code search operations.
    Search,
}

impl fmt::Display for LimitClass
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        match self {
            Self::Core => f.write_str("core",),
            Self::Search => f.write_str("search",),
        }
    }
}

/// Computes how long to wait for a limit that resets at `reset`.
///
/// The wait is `ceil(reset - now) + 1` seconds, never negative and never
/// longer than `max_wait`.
pub fn backoff_delay(reset: DateTime<Utc,>, now: DateTime<Utc,>, max_wait: Duration,) -> Duration
{
    let remaining_ms = (reset - now).num_milliseconds() as f64;
    let seconds = (remaining_ms / 1000.0).ceil() + 1.0;
    if seconds <= 0.0 {
        return Duration::ZERO;
    }

    Duration::from_secs_f64(seconds,).min(max_wait,)
}

/// Wraps a [`RepositoryHost`] with single-retry rate-limit recovery.
#[derive(Debug,)]
pub struct RateLimitedGateway<H,>
{
    host:     H,
    max_wait: Duration,
}

impl<H: RepositoryHost,> RateLimitedGateway<H,>
{
    /// Creates a gateway that waits at most `max_wait` for a limit reset.
    pub fn new(host: H, max_wait: Duration,) -> Self
    {
        Self {
            host, max_wait,
        }
    }

    /// Returns the wrapped host.
    pub fn host(&self,) -> &H
    {
        &self.host
    }

    /// Runs `f` against the host, recovering once from a rate-limit error.
    ///
    /// # Arguments
    ///
    /// * `class` - Limit bucket consumed by the operation
    /// * `operation_name` - Name of the operation for logging
    /// * `f` - Remote call to run; invoked at most twice
    ///
    /// # Errors
    ///
    /// Returns the error of the first attempt unless it is
    /// [`Error::RateLimited`], and the error of the retry otherwise. Failing
    /// to read the rate-limit window is returned as well.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::time::Duration;
    ///
    /// use badgebot::{GitHubHost, LimitClass, RateLimitedGateway, RepositoryHost};
    ///
    /// # async fn example() -> Result<(), badgebot::Error> {
    /// let gateway = RateLimitedGateway::new(GitHubHost::new("token",)?, Duration::from_secs(60,),);
    /// let repository = gateway
    ///     .call(LimitClass::Core, "get acme/widgets", |host| host.repository("acme", "widgets",),)
    ///     .await?;
    /// println!("{}", repository.default_branch);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<'h, F, Fut, T,>(
        &'h self,
        class: LimitClass,
        operation_name: &str,
        mut f: F,
    ) -> Result<T, Error,>
    where
        F: FnMut(&'h H,) -> Fut,
        Fut: Future<Output = Result<T, Error,>,>,
    {
        match f(&self.host,).await {
            Err(error @ Error::RateLimited { .. },) => {
                let window = self.host.rate_limit(class,).await?;
                let wait = backoff_delay(window.reset, Utc::now(), self.max_wait,);
                warn!(
                    "{} failed: {}. Waiting {}s for the {} limit to reset...",
                    operation_name,
                    error,
                    wait.as_secs(),
                    class
                );

                sleep(wait,).await;
                let result = f(&self.host,).await;
                if result.is_ok() {
                    debug!("{} succeeded after waiting for the {} limit", operation_name, class);
                }
                result
            }
            other => other,
        }
    }
}
