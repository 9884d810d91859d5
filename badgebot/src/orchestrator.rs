// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Fork, edit, commit and pull request sequence for one repository.
//!
//! The sequence relies on the service treating a repeated fork as a no-op,
//! commits only when the badge edit changes the README, and reports rejected
//! pull requests as statuses instead of errors so a batch keeps going.
use std::{fmt, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    badge::{Badge, BadgeEdit, insert_badge},
    cache::{RepositoryCache, RepositoryHandle},
    coords::RepoCoordinate,
    error::Error,
    gateway::LimitClass,
    host::{FileUpdate, PullRequestSpec, RemoteRepository, RepositoryHost},
    process::{CommandRunner, clone_command},
    status::ProcessingStatus,
};

/// Commit message of the badge edit.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Added Streamlit app badge for discoverability";
/// Title of the pull request.
pub const DEFAULT_PULL_REQUEST_TITLE: &str = "Add a Streamlit app badge to README";
/// Body of the pull request.
pub const DEFAULT_PULL_REQUEST_BODY: &str = "
Hi 👋!

Thank you for making this awesome Streamlit app!

I noticed that your project's README doesn't have a Streamlit badge.
Adding one would let people directly click into your app when
browsing your GitHub repo. Cool, right?!

This pull request automatically adds a beautiful Streamlit badge to your
README. Just go ahead and click `Merge pull request` below to get it!

Happy app creating 🎈

~ StreamlitBadgeBot 🤖
___
For more information about how pull requests work, please [click here](https://docs.github.com/en/free-pro-team@latest/github/collaborating-with-issues-and-pull-requests/merging-a-pull-request).
";

/// Reason recorded when the README changed between read and commit.
pub const CONCURRENT_MODIFICATION: &str = "concurrent modification";

/// Texts attached to commits and pull requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default)]
pub struct BotTexts
{
    /// Message of the badge commit.
    pub commit_message:     String,
    /// Pull request title.
    pub pull_request_title: String,
    /// Pull request description.
    pub pull_request_body:  String,
}

impl Default for BotTexts
{
    fn default() -> Self
    {
        Self {
            commit_message:     DEFAULT_COMMIT_MESSAGE.to_owned(),
            pull_request_title: DEFAULT_PULL_REQUEST_TITLE.to_owned(),
            pull_request_body:  DEFAULT_PULL_REQUEST_BODY.to_owned(),
        }
    }
}

/// How long to wait for a fresh fork to report its branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct ReadinessPolicy
{
    /// Total number of attempts, at least one.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay:    Duration,
}

impl Default for ReadinessPolicy
{
    fn default() -> Self
    {
        Self {
            attempts: 3,
            delay:    Duration::from_secs(10,),
        }
    }
}

/// Progress of one orchestration, reported in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub enum OrchestrationState
{
    Start,
    Forked,
    ReadmeComputed,
    Unchanged,
    Committed,
    Skipped,
    PullRequestSubmitted,
    PullRequestFailed,
}

impl fmt::Display for OrchestrationState
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        let name = match self {
            Self::Start => "start",
            Self::Forked => "forked",
            Self::ReadmeComputed => "readme-computed",
            Self::Unchanged => "unchanged",
            Self::Committed => "committed",
            Self::Skipped => "skipped",
            Self::PullRequestSubmitted => "pr-submitted",
            Self::PullRequestFailed => "pr-failed",
        };
        f.write_str(name,)
    }
}

/// Inputs of one orchestration.
#[derive(Debug, Clone, Copy,)]
pub struct OrchestrationRequest<'a,>
{
    /// Coordinate the record resolved to.
    pub coordinate:         &'a RepoCoordinate,
    /// App URL the badge links to.
    pub app_url:            &'a str,
    /// Repository the pull request targets.
    pub original:           &'a RepositoryHandle,
    /// Whether the original README already carried the badge.
    pub original_has_badge: bool,
    /// Open a pull request after the commit.
    pub send_pull_request:  bool,
    /// Clone the fork into the forks directory.
    pub clone_fork:         bool,
}

/// Runs the fork-edit-PR sequence.
#[derive(Debug, Clone,)]
pub struct Orchestrator
{
    texts:     BotTexts,
    badge:     Badge,
    readiness: ReadinessPolicy,
    forks_dir: PathBuf,
}

impl Orchestrator
{
    pub fn new(texts: BotTexts, badge: Badge, readiness: ReadinessPolicy, forks_dir: impl Into<PathBuf,>,) -> Self
    {
        Self {
            texts,
            badge,
            readiness,
            forks_dir: forks_dir.into(),
        }
    }

    /// Returns the badge this orchestrator inserts.
    pub fn badge(&self,) -> &Badge
    {
        &self.badge
    }

    /// Directory a fork of `owner/name` is cloned into.
    pub fn clone_destination(&self, owner: &str, name: &str,) -> PathBuf
    {
        self.forks_dir.join(owner,).join(name,)
    }

    /// Forks `request.original`, inserts the badge into the fork README and
    /// opens a pull request back to the original.
    ///
    /// Returns the statuses to append to the record history: a
    /// [`ProcessingStatus::ForkCreated`] followed by the pull request outcome
    /// when that step runs, or by [`ProcessingStatus::NoReadme`] when the fork
    /// has no README.
    ///
    /// # Errors
    ///
    /// Propagates fork, README, clone and unexpected pull request failures.
    /// A stale README sha and rejected pull requests are reported as
    /// [`ProcessingStatus::PullRequestFailed`].
    pub async fn process<H: RepositoryHost, R: CommandRunner,>(
        &self,
        cache: &mut RepositoryCache<H,>,
        runner: &R,
        request: OrchestrationRequest<'_,>,
    ) -> Result<Vec<ProcessingStatus,>, Error,>
    {
        let original = request.original;
        let mut state = OrchestrationState::Start;
        debug!("{} [{}]", request.coordinate, state);

        let remote = cache
            .gateway()
            .call(LimitClass::Core, &format!("fork {}", original.full_name()), |host| {
                host.create_fork(&original.owner, &original.name,)
            },)
            .await?;
        let fork = self.await_fork(cache, remote,).await?;
        state = OrchestrationState::Forked;
        info!("Forked {} to {}", original.full_name(), fork.full_name());
        debug!("{} [{}]", request.coordinate, state);

        if request.clone_fork {
            self.clone_fork(runner, &fork,).await?;
        }

        let Some(readme,) = cache.get_readme(&fork,).await? else {
            return Ok(vec![
                ProcessingStatus::ForkCreated {
                    fork:      fork.full_name(),
                    committed: false,
                },
                ProcessingStatus::NoReadme,
            ],);
        };

        let edit = insert_badge(&readme.text, request.app_url, &self.badge,);
        state = OrchestrationState::ReadmeComputed;
        debug!("{} [{}]", request.coordinate, state);

        let committed = match edit {
            BadgeEdit::Unchanged => {
                state = OrchestrationState::Unchanged;
                false
            }
            BadgeEdit::Updated(content,) => {
                let update = FileUpdate {
                    path:    &readme.path,
                    message: &self.texts.commit_message,
                    content: &content,
                    sha:     &readme.sha,
                    branch:  Some(&fork.default_branch,),
                };
                let updated = cache
                    .gateway()
                    .call(LimitClass::Core, &format!("update {} of {}", readme.path, fork.full_name()), |host| {
                        host.update_file(&fork.owner, &fork.name, &update,)
                    },)
                    .await;

                match updated {
                    Ok((),) => {}
                    Err(Error::StaleSha {
                        message, ..
                    },) => {
                        warn!("{} of {} changed before commit: {}", readme.path, fork.full_name(), message);
                        debug!("{} [{}]", request.coordinate, OrchestrationState::PullRequestFailed);
                        return Ok(vec![
                            ProcessingStatus::ForkCreated {
                                fork:      fork.full_name(),
                                committed: false,
                            },
                            ProcessingStatus::PullRequestFailed {
                                reason:  CONCURRENT_MODIFICATION.to_owned(),
                                payload: None,
                            },
                        ],);
                    }
                    Err(error,) => return Err(error,),
                }

                cache.invalidate(&fork.owner, &fork.name,);
                info!("Committed badge to {}", fork.full_name());
                state = OrchestrationState::Committed;
                true
            }
        };
        debug!("{} [{}]", request.coordinate, state);

        let mut statuses = vec![ProcessingStatus::ForkCreated {
            fork: fork.full_name(),
            committed,
        }];

        if !request.send_pull_request || (!committed && request.original_has_badge) {
            debug!("{} [{}]", request.coordinate, OrchestrationState::Skipped);
            return Ok(statuses,);
        }

        statuses.push(self.open_pull_request(cache, original, &fork,).await?,);
        Ok(statuses,)
    }

    async fn await_fork<H: RepositoryHost,>(
        &self,
        cache: &mut RepositoryCache<H,>,
        remote: RemoteRepository,
    ) -> Result<RepositoryHandle, Error,>
    {
        let attempts = self.readiness.attempts.max(1,);
        let mut attempt = 1;
        loop {
            match cache.annotate(remote.clone(),).await {
                Err(Error::RepoHasNoBranches {
                    repository,
                },) if attempt < attempts => {
                    warn!(
                        "Fork {} has no branches yet (attempt {}/{}); retrying in {}s",
                        repository,
                        attempt,
                        attempts,
                        self.readiness.delay.as_secs()
                    );
                    sleep(self.readiness.delay,).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn clone_fork<R: CommandRunner,>(&self, runner: &R, fork: &RepositoryHandle,) -> Result<(), Error,>
    {
        let destination = self.clone_destination(&fork.owner, &fork.name,);
        if destination.exists() {
            debug!("{} already cloned to {}", fork.full_name(), destination.display());
            return Ok((),);
        }

        let clone_url = fork
            .raw
            .clone_url
            .as_deref()
            .ok_or_else(|| Error::validation(format!("{} has no clone URL", fork.full_name()),),)?;
        let argv = clone_command(clone_url, &destination,);
        let code = runner.run(&argv,).await?;
        if code != 0 {
            return Err(Error::Command {
                command: argv.join(" ",),
                message: format!("exited with status {code}"),
            },);
        }

        Ok((),)
    }

    async fn open_pull_request<H: RepositoryHost,>(
        &self,
        cache: &RepositoryCache<H,>,
        original: &RepositoryHandle,
        fork: &RepositoryHandle,
    ) -> Result<ProcessingStatus, Error,>
    {
        let request = PullRequestSpec {
            title: self.texts.pull_request_title.clone(),
            head:  format!("{}:{}", fork.owner, original.default_branch),
            base:  original.default_branch.clone(),
            body:  self.texts.pull_request_body.clone(),
        };

        let created = cache
            .gateway()
            .call(LimitClass::Core, &format!("open pull request on {}", original.full_name()), |host| {
                host.create_pull_request(&original.owner, &original.name, &request,)
            },)
            .await;

        match created {
            Ok(pull,) => {
                info!("Opened pull request #{} on {}", pull.number, original.full_name());
                debug!("{} [{}]", original.full_name(), OrchestrationState::PullRequestSubmitted);
                Ok(ProcessingStatus::PullRequestOpened {
                    number: pull.number,
                    url:    pull.html_url,
                    head:   request.head,
                    base:   request.base,
                },)
            }
            Err(Error::ValidationFailed {
                message,
                payload,
            }
            | Error::Api {
                message,
                payload,
                ..
            },) => {
                warn!("Pull request on {} rejected: {}", original.full_name(), message);
                debug!("{} [{}]", original.full_name(), OrchestrationState::PullRequestFailed);
                Ok(ProcessingStatus::PullRequestFailed {
                    reason: message,
                    payload,
                },)
            }
            Err(error,) => Err(error,),
        }
    }
}
