//! Automation that adds hosted-app badges to repository READMEs.
//!
//! The library turns app and repository-file URLs into repository
//! coordinates, inspects READMEs for the badge through a rate-limit aware
//! and cached view of the hosting service, and drives the fork, commit and
//! pull request sequence for repositories still missing it. Network access
//! goes through the [`RepositoryHost`] trait so every phase can run against
//! an in-memory host in tests.

mod badge;
mod batch;
mod cache;
mod config;
mod coords;
mod discover;
mod error;
mod gateway;
mod github;
mod host;
mod input;
mod inspector;
mod orchestrator;
mod process;
mod report;
mod status;

pub use badge::{Badge, BadgeEdit, DEFAULT_BADGE_IMAGE_URL, DEFAULT_BADGE_LABEL, insert_badge};
pub use batch::{BatchDriver, BatchEntry, BatchReport, ConfirmationGate, FixedAnswer, RunOptions};
pub use cache::{DEFAULT_TTL, ReadmeFile, RepositoryCache, RepositoryHandle};
pub use config::{BotConfig, DEFAULT_FORKS_DIR, ReadinessSettings, load_config, parse_config};
pub use coords::{
    CoordinateParser, DEFAULT_APP_PREFIX, DEFAULT_APP_SCRIPT, DEFAULT_REPOSITORY_PREFIX, RepoCoordinate,
    UrlSettings,
};
pub use discover::{
    DiscoveredRepository, MAX_SEARCH_PAGES, app_search_query, discover_app_files, find_user_by_email,
    user_search_query,
};
pub use error::{Error, io_error};
pub use gateway::{DEFAULT_MAX_WAIT, LimitClass, RateLimitedGateway, backoff_delay};
pub use github::{GitHubHost, classify, classify_response, decode_content};
pub use host::{
    BranchHead, CodeHit, ContentEntry, EntryKind, FileContent, FileUpdate, PullRequestRef, PullRequestSpec,
    RateWindow, RemoteRepository, RepositoryHost,
};
pub use input::{AppRecord, DEBUG_REPOSITORY_URL, Selection, debug_apps, filter_apps, load_apps, parse_apps};
pub use inspector::{BadgeInspection, inspect};
pub use orchestrator::{
    BotTexts, CONCURRENT_MODIFICATION, DEFAULT_COMMIT_MESSAGE, DEFAULT_PULL_REQUEST_BODY,
    DEFAULT_PULL_REQUEST_TITLE, OrchestrationRequest, OrchestrationState, Orchestrator, ReadinessPolicy,
};
pub use process::{CommandRunner, DEFAULT_EXIT_TIMEOUT, SystemCommandRunner, clone_command};
pub use report::{StatusCount, render_summary, status_counts, write_report};
pub use status::ProcessingStatus;
