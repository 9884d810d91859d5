#![allow(non_shorthand_field_patterns)]
#![doc = "Error handling primitives shared across the badgebot crate."]
// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! The derive emitted by [`masterror::Error`] expands pattern matches that
//! trigger the `non_shorthand_field_patterns` lint. The lint is disabled for
//! the module to keep the generated implementations warning-free.
//!
//! Variants fall into the groups the batch driver cares about: input errors
//! (`Io`, `Parse`, `Validation`, `EmptySelection`, `UrlParse`), outcomes
//! reported by the hosting service (`NotFound`, `BadCredentials`,
//! `ValidationFailed`, `RateLimited`, `StaleSha`, `Api`), repository state
//! (`RepoHasNoBranches`, `Decode`) and local environment failures
//! (`Output`, `Command`, `CommandTimeout`).

use std::{
    path::{Path, PathBuf},
    time::Duration
};

use crate::gateway::LimitClass;

/// Unified error type returned by the library and the CLI.
#[derive(Debug, masterror::Error)]
pub enum Error {
    /// Wraps I/O errors that occur while reading configuration or input files.
    #[error("failed to read {path:?}: {source}")]
    Io {
        /// Location of the file.
        path:   PathBuf,
        /// Underlying I/O error.
        source: std::io::Error
    },
    /// Wraps I/O errors raised while writing command output.
    #[error("failed to write output: {source}")]
    Output {
        /// Underlying I/O error.
        source: std::io::Error
    },
    /// Wraps YAML decoding errors.
    #[error("failed to parse document: {source}")]
    Parse {
        /// Source decoding error from serde_yaml.
        source: serde_yaml::Error
    },
    /// Wraps serialization errors when writing reports.
    #[error("failed to serialize report: {source}")]
    Serialize {
        /// Underlying serialization error.
        source: serde_json::Error
    },
    /// Returned when user input violates invariants.
    #[error("invalid input: {message}")]
    Validation {
        /// Human readable message describing the validation problem.
        message: String
    },
    /// Returned when an operator range selects no items.
    #[error("selection {start}..{end} of {total} apps is empty; select at least one app")]
    EmptySelection {
        /// First selected index (inclusive).
        start: usize,
        /// Last selected index (exclusive).
        end:   usize,
        /// Number of items available for selection.
        total: usize
    },
    /// The URL carries a known prefix but does not match its grammar.
    #[error("unable to parse {url} as a {grammar} URL")]
    UrlParse {
        /// URL after percent-decoding and normalization.
        url:     String,
        /// Grammar that was applied.
        grammar: &'static str
    },
    /// The hosting service reported that a resource does not exist.
    #[error("{resource} was not found")]
    NotFound {
        /// Description of the missing resource.
        resource: String
    },
    /// The access token was rejected.
    #[error("bad credentials: {message}")]
    BadCredentials {
        /// Message reported by the service.
        message: String
    },
    /// The service rejected the request as invalid.
    #[error("validation failed: {message}")]
    ValidationFailed {
        /// Message reported by the service.
        message: String,
        /// Structured error payload, when present.
        payload: Option<serde_json::Value>
    },
    /// A rate limit was exceeded.
    #[error("{class} rate limit exceeded: {message}")]
    RateLimited {
        /// Limit bucket that was exhausted.
        class:   LimitClass,
        /// Message reported by the service.
        message: String
    },
    /// A content update was rejected because the supplied sha is stale.
    #[error("stale sha for {path}: {message}")]
    StaleSha {
        /// Path of the file being updated.
        path:    String,
        /// Message reported by the service.
        message: String
    },
    /// Any other error response from the hosting service.
    #[error("service responded with {status}: {message}")]
    Api {
        /// HTTP status code of the response.
        status:  u16,
        /// Message reported by the service.
        message: String,
        /// Structured error payload, when present.
        payload: Option<serde_json::Value>
    },
    /// The repository has no branches with readable commits.
    #[error("repository {repository} has no branches")]
    RepoHasNoBranches {
        /// Repository in `owner/name` form.
        repository: String
    },
    /// File content could not be decoded as UTF-8 text.
    #[error("failed to decode {path}: {message}")]
    Decode {
        /// Path of the file inside the repository.
        path:    String,
        /// Description of the decoding failure.
        message: String
    },
    /// A local command could not be run or exited unsuccessfully.
    #[error("command `{command}` failed: {message}")]
    Command {
        /// Command line that was executed.
        command: String,
        /// Description of the failure.
        message: String
    },
    /// A local command kept running after its output closed.
    #[error("command `{command}` did not exit within {timeout:?}")]
    CommandTimeout {
        /// Command line that was executed.
        command: String,
        /// Wait applied after end-of-stream.
        timeout: Duration
    },
    /// Transport or client errors when interacting with external APIs.
    #[error("service error: {message}")]
    Service {
        /// Human readable message describing the service error.
        message: String
    }
}

impl Error {
    /// Constructs a validation error from the provided displayable value.
    ///
    /// # Parameters
    ///
    /// * `message` - Human-readable description of the validation failure.
    pub fn validation<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Validation {
            message: message.into()
        }
    }

    /// Constructs a service error from the provided displayable value.
    ///
    /// # Parameters
    ///
    /// * `message` - Human-readable description of the service error.
    pub fn service<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Service {
            message: message.into()
        }
    }

    /// Constructs a not-found error for the described resource.
    pub fn not_found<M>(resource: M) -> Self
    where
        M: Into<String>
    {
        Self::NotFound {
            resource: resource.into()
        }
    }

    /// Returns `true` when the service reported the resource as missing or
    /// inaccessible with the current credentials.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::BadCredentials { .. })
    }

    /// Stable snake_case label used in per-item batch statuses.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Output { .. } => "output",
            Self::Parse { .. } => "parse",
            Self::Serialize { .. } => "serialize",
            Self::Validation { .. } => "validation",
            Self::EmptySelection { .. } => "empty_selection",
            Self::UrlParse { .. } => "url_parse",
            Self::NotFound { .. } => "not_found",
            Self::BadCredentials { .. } => "bad_credentials",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::RateLimited { .. } => "rate_limited",
            Self::StaleSha { .. } => "stale_sha",
            Self::Api { .. } => "api",
            Self::RepoHasNoBranches { .. } => "repo_has_no_branches",
            Self::Decode { .. } => "decode",
            Self::Command { .. } => "command",
            Self::CommandTimeout { .. } => "command_timeout",
            Self::Service { .. } => "service"
        }
    }

    /// Formats the error for diagnostics without the variant name.
    ///
    /// The returned string matches the [`std::fmt::Display`] implementation.
    pub fn to_display_string(&self) -> String {
        format!("{self}")
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(source: serde_yaml::Error) -> Self {
        Self::Parse {
            source
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        if source.is_io() {
            return Self::Output {
                source: source.into()
            };
        }
        Self::Serialize {
            source
        }
    }
}

/// Creates an [`Error::Io`] variant capturing the failing path and source.
///
/// # Parameters
///
/// * `path` - Location of the file that triggered the error.
/// * `source` - I/O error reported by the operating system.
pub fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Output {
            source
        }
    }
}
