// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Per-app processing outcomes recorded by the batch driver.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Outcome recorded for one app record.
///
/// Statuses are appended to an entry's history and never retracted; the last
/// one is the entry's final status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize,)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessingStatus
{
    /// The record carries no usable URL.
    NoUrl,
    /// The URL has a known prefix but a malformed remainder.
    UnparsableUrl
    {
        reason: String,
    },
    /// The repository does not exist or is not accessible.
    RepoNotFound,
    /// The repository exists but has no readable branches.
    RepoHasNoBranches,
    /// The repository has no README in its root directory.
    NoReadme,
    /// The repository is itself a fork and is never forked again.
    IsForkOfAnother,
    /// The README already carries the badge.
    HasBadge,
    /// The README lacks the badge.
    NoBadge,
    /// The repository was forked; `committed` tells whether the badge edit was
    /// pushed to the fork.
    ForkCreated
    {
        fork:      String,
        committed: bool,
    },
    /// A pull request was opened against the original repository.
    PullRequestOpened
    {
        number: u64,
        url:    Option<String,>,
        head:   String,
        base:   String,
    },
    /// The pull request step was rejected; `payload` is the service's
    /// structured error body.
    PullRequestFailed
    {
        reason:  String,
        payload: Option<Value,>,
    },
    /// An unexpected error aborted the record.
    Failed
    {
        category: String,
        message:  String,
    },
}

impl ProcessingStatus
{
    /// Converts an unexpected per-item error into a terminal status.
    pub fn failed(error: &Error,) -> Self
    {
        Self::Failed {
            category: error.category().to_owned(),
            message:  error.to_display_string(),
        }
    }

    /// Short human readable label used for statistics.
    pub fn label(&self,) -> &'static str
    {
        match self {
            Self::NoUrl => "No URL",
            Self::UnparsableUrl {
                ..
            } => "Unparsable URL",
            Self::RepoNotFound => "Repo not found",
            Self::RepoHasNoBranches => "Repo has no branches",
            Self::NoReadme => "No README",
            Self::IsForkOfAnother => "Is fork of another",
            Self::HasBadge => "Has badge",
            Self::NoBadge => "No badge",
            Self::ForkCreated {
                ..
            } => "Fork created",
            Self::PullRequestOpened {
                ..
            } => "Pull request opened",
            Self::PullRequestFailed {
                ..
            } => "Pull request failed",
            Self::Failed {
                ..
            } => "Failed",
        }
    }
}

impl fmt::Display for ProcessingStatus
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        match self {
            Self::UnparsableUrl {
                reason,
            } => write!(f, "{}: {}", self.label(), reason),
            Self::ForkCreated {
                fork,
                committed,
            } => {
                let edit = if *committed { "badge committed" } else { "no commit" };
                write!(f, "{} ({fork}, {edit})", self.label())
            }
            Self::PullRequestOpened {
                number,
                head,
                base,
                ..
            } => write!(f, "{} #{number} ({head} -> {base})", self.label()),
            Self::PullRequestFailed {
                reason,
                ..
            } => write!(f, "{}: {}", self.label(), reason),
            Self::Failed {
                category,
                message,
            } => write!(f, "{} [{category}]: {message}", self.label()),
            other => f.write_str(other.label(),),
        }
    }
}
