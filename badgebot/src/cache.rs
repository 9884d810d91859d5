// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Memoized repository and README lookups.
//!
//! The cache sits on top of the gateway: every miss goes through
//! [`RateLimitedGateway::call`]. Repository entries expire after a fixed TTL.
//! Each handle carries `last_modified`, the newest head-commit timestamp over
//! all branches, and README entries are only served for the exact
//! `last_modified` they were fetched under, so any push to any branch forces a
//! fresh README.

use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::{
    badge::Badge,
    coords::RepoCoordinate,
    error::Error,
    gateway::{LimitClass, RateLimitedGateway},
    host::{BranchHead, EntryKind, RemoteRepository, RepositoryHost},
};

/// Lifetime of cached entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60,);

/// Repository retrieved from the hosting service, stamped with its most
/// recent modification time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct RepositoryHandle
{
    /// Login of the owning account.
    pub owner:          String,
    /// Repository name.
    pub name:           String,
    /// Default branch name.
    pub default_branch: String,
    /// Whether the repository is itself a fork.
    pub is_fork:        bool,
    /// Newest head-commit timestamp across all branches.
    pub last_modified:  DateTime<Utc,>,
    /// Metadata as reported by the service.
    pub raw:            RemoteRepository,
}

impl RepositoryHandle
{
    fn new(raw: RemoteRepository, last_modified: DateTime<Utc,>,) -> Self
    {
        Self {
            owner: raw.owner.clone(),
            name: raw.name.clone(),
            default_branch: raw.default_branch.clone(),
            is_fork: raw.fork,
            last_modified,
            raw,
        }
    }

    /// Returns the repository in `owner/name` form.
    pub fn full_name(&self,) -> String
    {
        format!("{}/{}", self.owner, self.name)
    }

    fn key(&self,) -> (String, String,)
    {
        cache_key(&self.owner, &self.name,)
    }
}

/// README of a repository. `sha` guards the later update call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct ReadmeFile
{
    /// Path of the README inside the repository.
    pub path: String,
    /// Blob sha of the README version read.
    pub sha:  String,
    /// Decoded README text.
    pub text: String,
}

#[derive(Debug,)]
struct CachedRepository
{
    handle:     RepositoryHandle,
    fetched_at: Instant,
}

#[derive(Debug,)]
struct CachedReadme
{
    last_modified: DateTime<Utc,>,
    readme:        Option<ReadmeFile,>,
    fetched_at:    Instant,
}

/// Repository and README cache layered over the gateway.
#[derive(Debug,)]
pub struct RepositoryCache<H,>
{
    gateway:      RateLimitedGateway<H,>,
    ttl:          Duration,
    repositories: HashMap<(String, String,), CachedRepository,>,
    readmes:      HashMap<(String, String,), CachedReadme,>,
}

/// Owner and repository names are case-insensitive on the service.
fn cache_key(owner: &str, name: &str,) -> (String, String,)
{
    (owner.to_ascii_lowercase(), name.to_ascii_lowercase(),)
}

/// Returns the newest head-commit timestamp, or
/// [`Error::RepoHasNoBranches`] when there is none to read.
fn latest_commit(
    repository: &RemoteRepository,
    branches: &[BranchHead],
) -> Result<DateTime<Utc,>, Error,>
{
    let no_branches = || Error::RepoHasNoBranches {
        repository: repository.full_name(),
    };

    let mut latest: Option<DateTime<Utc,>,> = None;
    for branch in branches {
        let committed = branch.last_commit.ok_or_else(no_branches,)?;
        latest = Some(latest.map_or(committed, |current| current.max(committed,),),);
    }

    latest.ok_or_else(no_branches,)
}

impl<H: RepositoryHost,> RepositoryCache<H,>
{
    /// Creates an empty cache whose entries live for `ttl`.
    pub fn new(gateway: RateLimitedGateway<H,>, ttl: Duration,) -> Self
    {
        Self {
            gateway,
            ttl,
            repositories: HashMap::new(),
            readmes: HashMap::new(),
        }
    }

    /// Returns the gateway used for cache misses.
    pub fn gateway(&self,) -> &RateLimitedGateway<H,>
    {
        &self.gateway
    }

    /// Returns the repository addressed by `coordinate`.
    ///
    /// `Ok(None)` means the repository does not exist or is not accessible
    /// with the current credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RepoHasNoBranches`] for repositories without readable
    /// branches and propagates other service errors.
    pub async fn get_repository(
        &mut self,
        coordinate: &RepoCoordinate,
    ) -> Result<Option<RepositoryHandle,>, Error,>
    {
        let key = cache_key(&coordinate.owner, &coordinate.repo,);
        if let Some(entry,) = self.repositories.get(&key,)
            && entry.fetched_at.elapsed() < self.ttl
        {
            debug!("Cache hit for {}", entry.handle.full_name());
            return Ok(Some(entry.handle.clone(),),);
        }

        self.refresh_repository(&coordinate.owner, &coordinate.repo,).await
    }

    /// Fetches the repository regardless of any cached entry.
    ///
    /// # Errors
    ///
    /// Same as [`get_repository`](Self::get_repository).
    pub async fn refresh_repository(
        &mut self,
        owner: &str,
        name: &str,
    ) -> Result<Option<RepositoryHandle,>, Error,>
    {
        debug!("Fetching repository {}/{}", owner, name);
        let fetched = self
            .gateway
            .call(LimitClass::Core, &format!("get repository {owner}/{name}"), |host| {
                host.repository(owner, name,)
            },)
            .await;

        let remote = match fetched {
            Ok(remote,) => remote,
            Err(error,) if error.is_absent() => {
                debug!("Repository {}/{} is not accessible: {}", owner, name, error);
                self.invalidate(owner, name,);
                return Ok(None,);
            }
            Err(error,) => return Err(error,),
        };

        self.annotate_as(cache_key(owner, name,), remote,).await.map(Some,)
    }

    /// Stamps `remote` with its last modification time and caches the
    /// resulting handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RepoHasNoBranches`] when no branch head can be read.
    pub async fn annotate(&mut self, remote: RemoteRepository,) -> Result<RepositoryHandle, Error,>
    {
        let key = cache_key(&remote.owner, &remote.name,);
        self.annotate_as(key, remote,).await
    }

    /// Stamps `remote` and caches it under `key`, the name it was requested
    /// by, which may differ from the canonical one after a rename or
    /// transfer.
    async fn annotate_as(
        &mut self,
        key: (String, String,),
        remote: RemoteRepository,
    ) -> Result<RepositoryHandle, Error,>
    {
        let listed = self
            .gateway
            .call(LimitClass::Core, &format!("list branches of {}", remote.full_name()), |host| {
                host.branches(&remote.owner, &remote.name,)
            },)
            .await;

        let branches = match listed {
            Ok(branches,) => branches,
            Err(Error::NotFound {
                ..
            },) => Vec::new(),
            Err(error,) => return Err(error,),
        };

        let last_modified = latest_commit(&remote, &branches,)?;
        let handle = RepositoryHandle::new(remote, last_modified,);
        self.store(key, handle.clone(),);
        Ok(handle,)
    }

    fn store(&mut self, key: (String, String,), handle: RepositoryHandle,)
    {
        if let Some(previous,) = self.repositories.get(&key,)
            && handle.last_modified > previous.handle.last_modified
        {
            debug!(
                "{} changed since {}; dropping cached README",
                handle.full_name(),
                previous.handle.last_modified
            );
            self.readmes.remove(&handle.key(),);
        }

        self.repositories.insert(key, CachedRepository {
            handle,
            fetched_at: Instant::now(),
        },);
    }

    /// Drops cached state for `owner/name`.
    pub fn invalidate(&mut self, owner: &str, name: &str,)
    {
        let key = cache_key(owner, name,);
        self.repositories.remove(&key,);
        self.readmes.remove(&key,);
    }

    /// Returns the README of the repository's root directory.
    ///
    /// The first root entry named `readme.md`, compared case-insensitively,
    /// wins. `Ok(None)` means there is no such file or the listing was not
    /// found.
    ///
    /// # Errors
    ///
    /// Propagates service errors other than not-found.
    pub async fn get_readme(
        &mut self,
        handle: &RepositoryHandle,
    ) -> Result<Option<ReadmeFile,>, Error,>
    {
        let key = handle.key();
        if let Some(entry,) = self.readmes.get(&key,)
            && entry.last_modified == handle.last_modified
            && entry.fetched_at.elapsed() < self.ttl
        {
            debug!("README cache hit for {}", handle.full_name());
            return Ok(entry.readme.clone(),);
        }

        let readme = self.fetch_readme(handle,).await?;
        self.readmes.insert(key, CachedReadme {
            last_modified: handle.last_modified,
            readme:        readme.clone(),
            fetched_at:    Instant::now(),
        },);
        Ok(readme,)
    }

    async fn fetch_readme(&self, handle: &RepositoryHandle,) -> Result<Option<ReadmeFile,>, Error,>
    {
        let listed = self
            .gateway
            .call(LimitClass::Core, &format!("list contents of {}", handle.full_name()), |host| {
                host.root_contents(&handle.owner, &handle.name,)
            },)
            .await;

        let entries = match listed {
            Ok(entries,) => entries,
            Err(Error::NotFound {
                ..
            },) => return Ok(None,),
            Err(error,) => return Err(error,),
        };

        let Some(entry,) = entries
            .iter()
            .find(|entry| entry.kind != EntryKind::Dir && entry.name.eq_ignore_ascii_case("readme.md",),)
        else {
            debug!("{} has no README", handle.full_name());
            return Ok(None,);
        };

        let file = self
            .gateway
            .call(LimitClass::Core, &format!("get {} of {}", entry.path, handle.full_name()), |host| {
                host.file(&handle.owner, &handle.name, &entry.path, None,)
            },)
            .await?;

        Ok(Some(ReadmeFile {
            path: file.path, sha: file.sha, text: file.text,
        },),)
    }

    /// Returns `true` when the README references the badge image.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`get_readme`](Self::get_readme).
    pub async fn has_badge(&mut self, handle: &RepositoryHandle, badge: &Badge,) -> Result<bool, Error,>
    {
        Ok(self
            .get_readme(handle,)
            .await?
            .is_some_and(|readme| badge.is_present_in(&readme.text,),),)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::{
        gateway::DEFAULT_MAX_WAIT,
        host::{
            FileContent, FileUpdate,
            fake::{FakeHost, at},
        },
    };

    fn cache(host: FakeHost,) -> RepositoryCache<FakeHost,>
    {
        RepositoryCache::new(RateLimitedGateway::new(host, DEFAULT_MAX_WAIT,), DEFAULT_TTL,)
    }

    fn coordinate(owner: &str, repo: &str,) -> RepoCoordinate
    {
        RepoCoordinate::new(owner, repo, Some("main".to_owned(),), "README.md",)
    }

    fn host(cache: &RepositoryCache<FakeHost,>,) -> &FakeHost
    {
        cache.gateway().host()
    }

    #[tokio::test(start_paused = true)]
    async fn repository_lookups_are_cached()
    {
        let mut cache = cache(FakeHost::new("bot",).with_repository("acme", "widgets", false, Some("# W",),),);

        let first = cache.get_repository(&coordinate("acme", "widgets",),).await.expect("lookup",);
        let second = cache.get_repository(&coordinate("acme", "widgets",),).await.expect("lookup",);

        let handle = first.expect("repository exists",);
        assert_eq!(Some(handle.clone()), second);
        assert_eq!(handle.last_modified, at(1,));
        assert_eq!(handle.default_branch, "main");
        assert!(!handle.is_fork);
        assert_eq!(host(&cache,).calls_to("repository",), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl()
    {
        let mut cache = cache(FakeHost::new("bot",).with_repository("acme", "widgets", false, None,),);

        cache.get_repository(&coordinate("acme", "widgets",),).await.expect("lookup",);
        tokio::time::advance(DEFAULT_TTL + Duration::from_secs(1,),).await;
        cache.get_repository(&coordinate("acme", "widgets",),).await.expect("lookup",);

        assert_eq!(host(&cache,).calls_to("repository",), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_repository_is_none()
    {
        let mut cache = cache(FakeHost::new("bot",),);

        let result = cache.get_repository(&coordinate("acme", "ghost",),).await.expect("lookup",);
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn bad_credentials_are_none()
    {
        let fake = FakeHost::new("bot",).with_repository("acme", "widgets", false, None,);
        fake.fail_next("repository", Error::BadCredentials {
            message: "Bad credentials".to_owned(),
        },);
        let mut cache = cache(fake,);

        let result = cache.get_repository(&coordinate("acme", "widgets",),).await.expect("lookup",);
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn repository_without_branches_is_reported()
    {
        let fake = FakeHost::new("bot",).with_repository("acme", "empty", false, None,);
        fake.set_branches("acme", "empty", Vec::new(),);
        let mut cache = cache(fake,);

        let error = cache
            .get_repository(&coordinate("acme", "empty",),)
            .await
            .expect_err("no branches",);
        assert!(matches!(error, Error::RepoHasNoBranches { ref repository } if repository == "acme/empty"));
    }

    #[tokio::test(start_paused = true)]
    async fn last_modified_is_newest_branch_head()
    {
        let fake = FakeHost::new("bot",).with_repository("acme", "widgets", false, None,);
        fake.set_branches("acme", "widgets", vec![
            BranchHead {
                name: "main".to_owned(), last_commit: Some(at(3,),),
            },
            BranchHead {
                name: "dev".to_owned(), last_commit: Some(at(7,),),
            },
        ],);
        let mut cache = cache(fake,);

        let handle = cache
            .get_repository(&coordinate("acme", "widgets",),)
            .await
            .expect("lookup",)
            .expect("exists",);
        assert_eq!(handle.last_modified, at(7,));
    }

    #[tokio::test(start_paused = true)]
    async fn readme_is_found_case_insensitively_and_cached()
    {
        let fake = FakeHost::new("bot",).with_repository("acme", "widgets", false, None,);
        fake.state.borrow_mut().files.insert(
            ("acme".to_owned(), "widgets".to_owned(), "ReadMe.MD".to_owned(),),
            FileContent {
                path: "ReadMe.MD".to_owned(), sha: "abc".to_owned(), text: "# Hello".to_owned(),
            },
        );
        let mut cache = cache(fake,);
        let handle = cache
            .get_repository(&coordinate("acme", "widgets",),)
            .await
            .expect("lookup",)
            .expect("exists",);

        let readme = cache.get_readme(&handle,).await.expect("readme",).expect("present",);
        cache.get_readme(&handle,).await.expect("readme",);

        assert_eq!(readme.path, "ReadMe.MD");
        assert_eq!(readme.sha, "abc");
        assert_eq!(host(&cache,).calls_to("root_contents",), 1);
        assert_eq!(host(&cache,).calls_to("file",), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repository_without_readme_has_no_badge()
    {
        let mut cache = cache(FakeHost::new("bot",).with_repository("acme", "widgets", false, None,),);
        let handle = cache
            .get_repository(&coordinate("acme", "widgets",),)
            .await
            .expect("lookup",)
            .expect("exists",);

        assert!(cache.get_readme(&handle,).await.expect("readme",).is_none());
        assert!(!cache.has_badge(&handle, &Badge::default(),).await.expect("badge",));
    }

    #[tokio::test(start_paused = true)]
    async fn has_badge_checks_image_url()
    {
        let badge = Badge::default();
        let text = format!("# W {}", badge.markup("https://share.streamlit.io/acme/widgets/",));
        let mut cache =
            cache(FakeHost::new("bot",).with_repository("acme", "widgets", false, Some(&text,),),);
        let handle = cache
            .get_repository(&coordinate("acme", "widgets",),)
            .await
            .expect("lookup",)
            .expect("exists",);

        assert!(cache.has_badge(&handle, &badge,).await.expect("badge",));
    }

    #[tokio::test(start_paused = true)]
    async fn newer_last_modified_invalidates_readme()
    {
        let mut cache =
            cache(FakeHost::new("bot",).with_repository("acme", "widgets", false, Some("# Old",),),);
        let handle = cache
            .get_repository(&coordinate("acme", "widgets",),)
            .await
            .expect("lookup",)
            .expect("exists",);
        let before = cache.get_readme(&handle,).await.expect("readme",).expect("present",);
        assert_eq!(before.text, "# Old");

        host(&cache,)
            .update_file("acme", "widgets", &FileUpdate {
                path:    "README.md",
                message: "edit",
                content: "# New",
                sha:     &before.sha,
                branch:  None,
            },)
            .await
            .expect("update",);

        let refreshed = cache
            .refresh_repository("acme", "widgets",)
            .await
            .expect("lookup",)
            .expect("exists",);
        assert!(refreshed.last_modified > handle.last_modified);

        let after = cache.get_readme(&refreshed,).await.expect("readme",).expect("present",);
        assert_eq!(after.text, "# New");
        assert_eq!(host(&cache,).calls_to("file",), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_forces_refetch()
    {
        let mut cache = cache(FakeHost::new("bot",).with_repository("acme", "widgets", false, None,),);

        cache.get_repository(&coordinate("acme", "widgets",),).await.expect("lookup",);
        cache.invalidate("acme", "widgets",);
        cache.get_repository(&coordinate("acme", "widgets",),).await.expect("lookup",);

        assert_eq!(host(&cache,).calls_to("repository",), 2);
    }

    fn alias(fake: &FakeHost, owner: &str, name: &str, canonical: (&str, &str,),)
    {
        let mut state = fake.state.borrow_mut();
        let remote = state.repositories[&(canonical.0.to_owned(), canonical.1.to_owned(),)].clone();
        state.repositories.insert((owner.to_owned(), name.to_owned(),), remote,);
    }

    #[tokio::test(start_paused = true)]
    async fn differently_cased_coordinate_is_served_from_cache()
    {
        let fake = FakeHost::new("bot",).with_repository("acme", "widgets", false, None,);
        alias(&fake, "Acme", "Widgets", ("acme", "widgets",),);
        let mut cache = cache(fake,);

        let first = cache.get_repository(&coordinate("Acme", "Widgets",),).await.expect("lookup",);
        let second = cache.get_repository(&coordinate("Acme", "Widgets",),).await.expect("lookup",);

        assert_eq!(first.expect("exists",).full_name(), "acme/widgets");
        assert!(second.is_some());
        assert_eq!(host(&cache,).calls_to("repository",), 1);
        assert_eq!(host(&cache,).calls_to("branches",), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn renamed_repository_is_cached_under_requested_name()
    {
        let fake = FakeHost::new("bot",).with_repository("acme", "widgets", false, None,);
        alias(&fake, "acme", "old-widgets", ("acme", "widgets",),);
        let mut cache = cache(fake,);

        cache.get_repository(&coordinate("acme", "old-widgets",),).await.expect("lookup",);
        let again = cache
            .get_repository(&coordinate("acme", "old-widgets",),)
            .await
            .expect("lookup",)
            .expect("exists",);

        assert_eq!(again.name, "widgets");
        assert_eq!(host(&cache,).calls_to("repository",), 1);
    }
}
