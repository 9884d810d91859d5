// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Abstraction over the remote repository-hosting service.
//!
//! The batch pipeline only needs the handful of operations declared by
//! [`RepositoryHost`]. [`crate::GitHubHost`] implements them with octocrab;
//! tests substitute an in-memory host.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::Error, gateway::LimitClass};

/// Repository metadata as reported by the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct RemoteRepository
{
    /// Login of the owning account.
    pub owner:          String,
    /// Repository name.
    pub name:           String,
    /// Default branch name.
    pub default_branch: String,
    /// Whether the repository is itself a fork.
    pub fork:           bool,
    /// HTTPS clone URL, when reported.
    pub clone_url:      Option<String,>,
    /// Browser URL, when reported.
    pub html_url:       Option<String,>,
}

impl RemoteRepository
{
    /// Returns the repository in `owner/name` form.
    pub fn full_name(&self,) -> String
    {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Branch name with the timestamp of its head commit.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct BranchHead
{
    /// Branch name.
    pub name:        String,
    /// Committer date of the head commit; `None` when it could not be read.
    pub last_commit: Option<DateTime<Utc,>,>,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub enum EntryKind
{
    File,
    Dir,
    Other,
}

/// Entry of a repository directory listing.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct ContentEntry
{
    /// File or directory name.
    pub name: String,
    /// Path from the repository root.
    pub path: String,
    /// Blob or tree sha.
    pub sha:  String,
    /// Entry type.
    pub kind: EntryKind,
}

/// Decoded content of a repository file.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct FileContent
{
    /// Path from the repository root.
    pub path: String,
    /// Blob sha, required to update the file.
    pub sha:  String,
    /// Content decoded as UTF-8.
    pub text: String,
}

/// Content update guarded by the sha of the version being replaced.
#[derive(Debug, Clone, Copy,)]
pub struct FileUpdate<'a,>
{
    /// Path of the file to replace.
    pub path:    &'a str,
    /// Commit message.
    pub message: &'a str,
    /// New file content.
    pub content: &'a str,
    /// Sha the update was computed against.
    pub sha:     &'a str,
    /// Branch receiving the commit; the default branch when `None`.
    pub branch:  Option<&'a str,>,
}

/// Pull request to open against a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct PullRequestSpec
{
    /// Pull request title.
    pub title: String,
    /// Source in `owner:branch` form.
    pub head:  String,
    /// Target branch of the original repository.
    pub base:  String,
    /// Markdown description.
    pub body:  String,
}

/// Pull request reported back by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct PullRequestRef
{
    /// Pull request number.
    pub number:   u64,
    /// Browser URL, when reported.
    pub html_url: Option<String,>,
}

/// Rate-limit window for one limit class.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct RateWindow
{
    /// Requests allowed per window.
    pub limit:     u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Moment the window resets.
    pub reset:     DateTime<Utc,>,
}

/// Code search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct CodeHit
{
    /// Login of the repository owner.
    pub owner:      String,
    /// Repository name.
    pub repository: String,
    /// Path of the matching file.
    pub path:       String,
}

/// Operations consumed from the repository-hosting service.
///
/// Implementations report service failures through the [`Error`] variants
/// `NotFound`, `BadCredentials`, `ValidationFailed`, `RateLimited`,
/// `StaleSha` and `Api`; the gateway and cache rely on that mapping.
pub trait RepositoryHost
{
    /// Fetches repository metadata.
    fn repository(&self, owner: &str, name: &str,)
    -> impl Future<Output = Result<RemoteRepository, Error,>,>;

    /// Lists branches together with their head commit timestamps.
    fn branches(&self, owner: &str, name: &str,)
    -> impl Future<Output = Result<Vec<BranchHead,>, Error,>,>;

    /// Lists the root directory of the default branch.
    fn root_contents(
        &self,
        owner: &str,
        name: &str,
    ) -> impl Future<Output = Result<Vec<ContentEntry,>, Error,>,>;

    /// Fetches and decodes a file, optionally at a specific ref.
    fn file(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        reference: Option<&str,>,
    ) -> impl Future<Output = Result<FileContent, Error,>,>;

    /// Replaces file content; fails with [`Error::StaleSha`] when `update.sha`
    /// no longer matches the stored version.
    fn update_file(
        &self,
        owner: &str,
        name: &str,
        update: &FileUpdate<'_,>,
    ) -> impl Future<Output = Result<(), Error,>,>;

    /// Forks the repository into the authenticated account. Forking an
    /// already forked repository returns the existing fork.
    fn create_fork(&self, owner: &str, name: &str,)
    -> impl Future<Output = Result<RemoteRepository, Error,>,>;

    /// Opens a pull request against `owner/name`.
    fn create_pull_request(
        &self,
        owner: &str,
        name: &str,
        request: &PullRequestSpec,
    ) -> impl Future<Output = Result<PullRequestRef, Error,>,>;

    /// Reports the current window of a limit class.
    fn rate_limit(&self, class: LimitClass,) -> impl Future<Output = Result<RateWindow, Error,>,>;

    /// Runs a code search and returns one page of hits.
    fn search_code(
        &self,
        query: &str,
        page: u32,
    ) -> impl Future<Output = Result<Vec<CodeHit,>, Error,>,>;

    /// Runs a user search and returns matching logins.
    fn search_users(&self, query: &str,) -> impl Future<Output = Result<Vec<String,>, Error,>,>;

    /// Returns the login of the authenticated account.
    fn authenticated_login(&self,) -> impl Future<Output = Result<String, Error,>,>;
}

#[cfg(test)]
pub(crate) mod fake
{
    //! In-memory host used by unit tests across the crate.

    use std::{
        cell::RefCell,
        collections::{HashMap, VecDeque},
    };

    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    /// Mutable state behind [`FakeHost`].
    #[derive(Debug, Default,)]
    pub(crate) struct FakeState
    {
        pub repositories:  HashMap<(String, String,), RemoteRepository,>,
        pub branches:      HashMap<(String, String,), Vec<BranchHead,>,>,
        pub files:         HashMap<(String, String, String,), FileContent,>,
        /// Errors returned by the next calls of the named operation.
        pub failures:      HashMap<&'static str, VecDeque<Error,>,>,
        pub calls:         Vec<String,>,
        pub updates:       Vec<(String, String,),>,
        pub pull_requests: Vec<(String, PullRequestSpec,),>,
        pub fork_owner:    String,
        pub next_sha:      u64,
        pub code_hits:     Vec<CodeHit,>,
        pub users:         Vec<String,>,
        pub reset:         Option<DateTime<Utc,>,>,
    }

    /// Single-threaded in-memory [`RepositoryHost`].
    #[derive(Debug, Default,)]
    pub(crate) struct FakeHost
    {
        pub state: RefCell<FakeState,>,
    }

    pub(crate) fn at(hour: u32,) -> DateTime<Utc,>
    {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0,).single().expect("valid timestamp",)
    }

    fn key(owner: &str, name: &str,) -> (String, String,)
    {
        (owner.to_owned(), name.to_owned(),)
    }

    impl FakeHost
    {
        pub(crate) fn new(fork_owner: &str,) -> Self
        {
            let host = Self::default();
            host.state.borrow_mut().fork_owner = fork_owner.to_owned();
            host
        }

        /// Registers a repository with a single `main` branch and an
        /// optional README.
        pub(crate) fn with_repository(
            self,
            owner: &str,
            name: &str,
            fork: bool,
            readme: Option<&str,>,
        ) -> Self
        {
            {
                let mut state = self.state.borrow_mut();
                state.repositories.insert(key(owner, name,), RemoteRepository {
                    owner:          owner.to_owned(),
                    name:           name.to_owned(),
                    default_branch: "main".to_owned(),
                    fork,
                    clone_url:      Some(format!("https://github.com/{owner}/{name}.git"),),
                    html_url:       Some(format!("https://github.com/{owner}/{name}"),),
                },);
                state.branches.insert(key(owner, name,), vec![BranchHead {
                    name:        "main".to_owned(),
                    last_commit: Some(at(1,),),
                }],);
                if let Some(text,) = readme {
                    state.files.insert(
                        (owner.to_owned(), name.to_owned(), "README.md".to_owned(),),
                        FileContent {
                            path: "README.md".to_owned(),
                            sha:  "sha-0".to_owned(),
                            text: text.to_owned(),
                        },
                    );
                }
            }
            self
        }

        pub(crate) fn fail_next(&self, operation: &'static str, error: Error,)
        {
            self.state.borrow_mut().failures.entry(operation,).or_default().push_back(error,);
        }

        pub(crate) fn set_branches(&self, owner: &str, name: &str, branches: Vec<BranchHead,>,)
        {
            self.state.borrow_mut().branches.insert(key(owner, name,), branches,);
        }

        pub(crate) fn calls_to(&self, operation: &str,) -> usize
        {
            self.state.borrow().calls.iter().filter(|call| call.as_str() == operation,).count()
        }

        fn enter(&self, operation: &'static str,) -> Result<(), Error,>
        {
            let mut state = self.state.borrow_mut();
            state.calls.push(operation.to_owned(),);
            match state.failures.get_mut(operation,).and_then(VecDeque::pop_front,) {
                Some(error,) => Err(error,),
                None => Ok((),),
            }
        }
    }

    impl RepositoryHost for FakeHost
    {
        async fn repository(&self, owner: &str, name: &str,) -> Result<RemoteRepository, Error,>
        {
            self.enter("repository",)?;
            self.state
                .borrow()
                .repositories
                .get(&key(owner, name,),)
                .cloned()
                .ok_or_else(|| Error::not_found(format!("repository {owner}/{name}"),),)
        }

        async fn branches(&self, owner: &str, name: &str,) -> Result<Vec<BranchHead,>, Error,>
        {
            self.enter("branches",)?;
            Ok(self.state.borrow().branches.get(&key(owner, name,),).cloned().unwrap_or_default(),)
        }

        async fn root_contents(&self, owner: &str, name: &str,) -> Result<Vec<ContentEntry,>, Error,>
        {
            self.enter("root_contents",)?;
            let state = self.state.borrow();
            if !state.repositories.contains_key(&key(owner, name,),) {
                return Err(Error::not_found(format!("contents of {owner}/{name}"),),);
            }
            Ok(state
                .files
                .iter()
                .filter(|((file_owner, file_repo, _,), _,)| file_owner == owner && file_repo == name,)
                .map(|(_, file,)| ContentEntry {
                    name: file.path.clone(),
                    path: file.path.clone(),
                    sha:  file.sha.clone(),
                    kind: EntryKind::File,
                },)
                .collect(),)
        }

        async fn file(
            &self,
            owner: &str,
            name: &str,
            path: &str,
            _reference: Option<&str,>,
        ) -> Result<FileContent, Error,>
        {
            self.enter("file",)?;
            self.state
                .borrow()
                .files
                .get(&(owner.to_owned(), name.to_owned(), path.to_owned(),),)
                .cloned()
                .ok_or_else(|| Error::not_found(format!("{owner}/{name}/{path}"),),)
        }

        async fn update_file(
            &self,
            owner: &str,
            name: &str,
            update: &FileUpdate<'_,>,
        ) -> Result<(), Error,>
        {
            self.enter("update_file",)?;
            let mut state = self.state.borrow_mut();
            state.next_sha += 1;
            let sha = format!("sha-{}", state.next_sha);
            let file_key = (owner.to_owned(), name.to_owned(), update.path.to_owned(),);
            let current = state
                .files
                .get(&file_key,)
                .cloned()
                .ok_or_else(|| Error::not_found(format!("{owner}/{name}/{}", update.path),),)?;
            if current.sha != update.sha {
                return Err(Error::StaleSha {
                    path:    update.path.to_owned(),
                    message: "does not match".to_owned(),
                },);
            }
            state.files.insert(file_key, FileContent {
                path: update.path.to_owned(),
                sha,
                text: update.content.to_owned(),
            },);
            state.updates.push((format!("{owner}/{name}"), update.content.to_owned(),),);
            if let Some(branches,) = state.branches.get_mut(&key(owner, name,),) {
                for branch in branches.iter_mut() {
                    branch.last_commit = Some(at(2,),);
                }
            }
            Ok((),)
        }

        async fn create_fork(&self, owner: &str, name: &str,) -> Result<RemoteRepository, Error,>
        {
            self.enter("create_fork",)?;
            let mut state = self.state.borrow_mut();
            let original = state
                .repositories
                .get(&key(owner, name,),)
                .cloned()
                .ok_or_else(|| Error::not_found(format!("repository {owner}/{name}"),),)?;
            let fork_owner = state.fork_owner.clone();
            let fork_key = key(&fork_owner, name,);
            if let Some(existing,) = state.repositories.get(&fork_key,) {
                return Ok(existing.clone(),);
            }

            let fork = RemoteRepository {
                owner: fork_owner.clone(),
                fork: true,
                clone_url: Some(format!("https://github.com/{fork_owner}/{name}.git"),),
                html_url: Some(format!("https://github.com/{fork_owner}/{name}"),),
                ..original
            };
            state.repositories.insert(fork_key.clone(), fork.clone(),);
            if let Some(branches,) = state.branches.get(&key(owner, name,),).cloned() {
                state.branches.entry(fork_key,).or_insert(branches,);
            }
            let copied: Vec<_,> = state
                .files
                .iter()
                .filter(|((file_owner, file_repo, _,), _,)| file_owner == owner && file_repo == name,)
                .map(|((_, _, path,), file,)| {
                    ((fork_owner.clone(), name.to_owned(), path.clone(),), file.clone(),)
                },)
                .collect();
            state.files.extend(copied,);
            Ok(fork,)
        }

        async fn create_pull_request(
            &self,
            owner: &str,
            name: &str,
            request: &PullRequestSpec,
        ) -> Result<PullRequestRef, Error,>
        {
            self.enter("create_pull_request",)?;
            let mut state = self.state.borrow_mut();
            state.pull_requests.push((format!("{owner}/{name}"), request.clone(),),);
            let number = state.pull_requests.len() as u64;
            Ok(PullRequestRef {
                number,
                html_url: Some(format!("https://github.com/{owner}/{name}/pull/{number}"),),
            },)
        }

        async fn rate_limit(&self, _class: LimitClass,) -> Result<RateWindow, Error,>
        {
            self.enter("rate_limit",)?;
            Ok(RateWindow {
                limit:     30,
                remaining: 0,
                reset:     self.state.borrow().reset.unwrap_or_else(Utc::now,),
            },)
        }

        async fn search_code(&self, _query: &str, page: u32,) -> Result<Vec<CodeHit,>, Error,>
        {
            self.enter("search_code",)?;
            if page > 1 {
                return Ok(Vec::new(),);
            }
            Ok(self.state.borrow().code_hits.clone(),)
        }

        async fn search_users(&self, _query: &str,) -> Result<Vec<String,>, Error,>
        {
            self.enter("search_users",)?;
            Ok(self.state.borrow().users.clone(),)
        }

        async fn authenticated_login(&self,) -> Result<String, Error,>
        {
            self.enter("authenticated_login",)?;
            Ok(self.state.borrow().fork_owner.clone(),)
        }
    }
}
