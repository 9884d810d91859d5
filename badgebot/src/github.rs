// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! GitHub implementation of [`RepositoryHost`] built on octocrab.
//!
//! Requests go through the raw route helpers of [`Octocrab`] with small
//! response structs, so only the fields the bot consumes are decoded. Error
//! responses are classified into the crate [`Error`] variants the gateway and
//! cache match on.
use std::future::Future;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, TimeZone, Utc};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::Error,
    gateway::LimitClass,
    host::{
        BranchHead, CodeHit, ContentEntry, EntryKind, FileContent, FileUpdate, PullRequestRef,
        PullRequestSpec, RateWindow, RemoteRepository, RepositoryHost,
    },
};

const PER_PAGE: u32 = 100;

/// [`RepositoryHost`] talking to the GitHub REST API.
#[derive(Clone,)]
pub struct GitHubHost
{
    octocrab: Octocrab,
}

impl GitHubHost
{
    /// Creates a client authenticated with a personal access token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank token and
    /// [`Error::Service`] when the HTTP client cannot be built.
    pub fn new(token: &str,) -> Result<Self, Error,>
    {
        if token.trim().is_empty() {
            return Err(Error::validation("access token cannot be empty",),);
        }

        let octocrab = Octocrab::builder()
            .personal_token(token.trim().to_owned(),)
            .build()
            .map_err(|e| Error::service(format!("failed to build GitHub client: {e}"),),)?;

        Ok(Self {
            octocrab,
        },)
    }

    /// Wraps an already configured octocrab client.
    pub fn with_client(octocrab: Octocrab,) -> Self
    {
        Self {
            octocrab,
        }
    }
}

#[derive(Debug, Deserialize,)]
struct AccountPayload
{
    login: String,
}

#[derive(Debug, Deserialize,)]
struct RepositoryPayload
{
    name:           String,
    owner:          AccountPayload,
    #[serde(default)]
    default_branch: Option<String,>,
    #[serde(default)]
    fork:           bool,
    #[serde(default)]
    clone_url:      Option<String,>,
    #[serde(default)]
    html_url:       Option<String,>,
}

impl From<RepositoryPayload,> for RemoteRepository
{
    fn from(payload: RepositoryPayload,) -> Self
    {
        Self {
            owner:          payload.owner.login,
            name:           payload.name,
            default_branch: payload.default_branch.unwrap_or_else(|| "main".to_owned(),),
            fork:           payload.fork,
            clone_url:      payload.clone_url,
            html_url:       payload.html_url,
        }
    }
}

#[derive(Debug, Deserialize,)]
struct BranchPayload
{
    name:   String,
    commit: CommitRefPayload,
}

#[derive(Debug, Deserialize,)]
struct CommitRefPayload
{
    sha: String,
}

#[derive(Debug, Deserialize,)]
struct CommitPayload
{
    commit: CommitDetailPayload,
}

#[derive(Debug, Deserialize,)]
struct CommitDetailPayload
{
    #[serde(default)]
    committer: Option<SignaturePayload,>,
}

#[derive(Debug, Deserialize,)]
struct SignaturePayload
{
    #[serde(default)]
    date: Option<DateTime<Utc,>,>,
}

#[derive(Debug, Deserialize,)]
struct ContentEntryPayload
{
    name:  String,
    path:  String,
    sha:   String,
    #[serde(rename = "type")]
    kind:  String,
}

#[derive(Debug, Deserialize,)]
struct FilePayload
{
    path:     String,
    sha:      String,
    #[serde(default)]
    content:  Option<String,>,
    #[serde(default)]
    encoding: Option<String,>,
}

#[derive(Debug, Serialize,)]
struct RefQuery<'a,>
{
    #[serde(rename = "ref")]
    reference: &'a str,
}

#[derive(Debug, Serialize,)]
struct PageQuery<'a,>
{
    q:        &'a str,
    per_page: u32,
    page:     u32,
}

#[derive(Debug, Serialize,)]
struct ListQuery
{
    per_page: u32,
    page:     u32,
}

#[derive(Debug, Serialize,)]
struct UpdateBody<'a,>
{
    message: &'a str,
    content: String,
    sha:     &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch:  Option<&'a str,>,
}

#[derive(Debug, Serialize,)]
struct EmptyBody {}

#[derive(Debug, Deserialize,)]
struct PullPayload
{
    number:   u64,
    #[serde(default)]
    html_url: Option<String,>,
}

#[derive(Debug, Deserialize,)]
struct RateLimitPayload
{
    resources: RateResourcesPayload,
}

#[derive(Debug, Deserialize,)]
struct RateResourcesPayload
{
    core:   RateWindowPayload,
    search: RateWindowPayload,
}

#[derive(Debug, Deserialize,)]
struct RateWindowPayload
{
    limit:     u64,
    remaining: u64,
    reset:     i64,
}

#[derive(Debug, Deserialize,)]
struct SearchPayload<T,>
{
    #[serde(default = "Vec::new")]
    items: Vec<T,>,
}

#[derive(Debug, Deserialize,)]
struct CodeItemPayload
{
    path:       String,
    repository: CodeRepositoryPayload,
}

#[derive(Debug, Deserialize,)]
struct CodeRepositoryPayload
{
    name:  String,
    owner: AccountPayload,
}

/// Percent-encodes every segment of a repository path.
fn encode_path(path: &str,) -> String
{
    path.split('/',).map(|segment| urlencoding::encode(segment,).into_owned(),).collect::<Vec<_,>>().join("/",)
}

/// Fetches numbered pages, starting at 1, until one comes back with fewer
/// than `per_page` items.
async fn collect_pages<T, F, Fut,>(per_page: u32, mut fetch: F,) -> Result<Vec<T,>, Error,>
where
    F: FnMut(u32,) -> Fut,
    Fut: Future<Output = Result<Vec<T,>, Error,>,>,
{
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let batch = fetch(page,).await?;
        let full = batch.len() >= per_page as usize;
        items.extend(batch,);
        if !full {
            return Ok(items,);
        }
        page += 1;
    }
}

/// Decodes base64 file content as returned by the contents API.
///
/// The service wraps the encoded payload every 60 characters; all whitespace
/// is stripped before decoding.
pub fn decode_content(path: &str, encoded: &str,) -> Result<String, Error,>
{
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace(),).collect();
    let bytes = STANDARD.decode(compact.as_bytes(),).map_err(|e| Error::Decode {
        path:    path.to_owned(),
        message: format!("invalid base64: {e}"),
    },)?;

    String::from_utf8(bytes,).map_err(|e| Error::Decode {
        path:    path.to_owned(),
        message: format!("not UTF-8 text: {e}"),
    },)
}

/// Maps an octocrab error to the crate error model.
///
/// `class` is the limit bucket of the failing call and `resource` describes
/// what was requested.
pub fn classify(error: octocrab::Error, class: LimitClass, resource: &str,) -> Error
{
    match error {
        octocrab::Error::GitHub {
            source, ..
        } => classify_response(
            source.status_code.as_u16(),
            source.message.clone(),
            source.errors.clone(),
            class,
            resource,
        ),
        other => Error::service(format!("{resource}: {other}"),),
    }
}

/// Maps an error response to the crate error model.
pub fn classify_response(
    status: u16,
    message: String,
    errors: Option<Vec<Value,>,>,
    class: LimitClass,
    resource: &str,
) -> Error
{
    let payload = errors.map(Value::Array,);
    match status {
        401 => Error::BadCredentials {
            message,
        },
        404 => Error::not_found(resource,),
        409 => Error::StaleSha {
            path: resource.to_owned(),
            message,
        },
        403 | 429 if message.to_lowercase().contains("rate limit",) => Error::RateLimited {
            class,
            message,
        },
        422 => Error::ValidationFailed {
            message,
            payload,
        },
        _ => Error::Api {
            status,
            message,
            payload,
        },
    }
}

impl GitHubHost
{
    async fn latest_commit(&self, owner: &str, name: &str, sha: &str,) -> Result<Option<DateTime<Utc,>,>, Error,>
    {
        let route = format!("/repos/{owner}/{name}/commits/{sha}");
        let commit: CommitPayload = self
            .octocrab
            .get(&route, None::<&(),>,)
            .await
            .map_err(|e| classify(e, LimitClass::Core, &route,),)?;

        Ok(commit.commit.committer.and_then(|committer| committer.date,),)
    }
}

impl RepositoryHost for GitHubHost
{
    async fn repository(&self, owner: &str, name: &str,) -> Result<RemoteRepository, Error,>
    {
        let route = format!("/repos/{owner}/{name}");
        let payload: RepositoryPayload = self
            .octocrab
            .get(&route, None::<&(),>,)
            .await
            .map_err(|e| classify(e, LimitClass::Core, &format!("repository {owner}/{name}"),),)?;

        Ok(payload.into(),)
    }

    async fn branches(&self, owner: &str, name: &str,) -> Result<Vec<BranchHead,>, Error,>
    {
        let route = format!("/repos/{owner}/{name}/branches");
        let resource = format!("branches of {owner}/{name}");
        let branches: Vec<BranchPayload,> = collect_pages(PER_PAGE, |page| {
            let query = ListQuery {
                per_page: PER_PAGE,
                page,
            };
            let (route, resource,) = (&route, &resource,);
            async move {
                self.octocrab
                    .get(route, Some(&query,),)
                    .await
                    .map_err(|e| classify(e, LimitClass::Core, resource,),)
            }
        },)
        .await?;

        let mut heads = Vec::with_capacity(branches.len(),);
        for branch in branches {
            let last_commit = self.latest_commit(owner, name, &branch.commit.sha,).await?;
            debug!("{}/{} branch {} last commit {:?}", owner, name, branch.name, last_commit);
            heads.push(BranchHead {
                name: branch.name,
                last_commit,
            },);
        }

        Ok(heads,)
    }

    async fn root_contents(&self, owner: &str, name: &str,) -> Result<Vec<ContentEntry,>, Error,>
    {
        let route = format!("/repos/{owner}/{name}/contents");
        let entries: Vec<ContentEntryPayload,> = self
            .octocrab
            .get(&route, None::<&(),>,)
            .await
            .map_err(|e| classify(e, LimitClass::Core, &format!("contents of {owner}/{name}"),),)?;

        Ok(entries
            .into_iter()
            .map(|entry| ContentEntry {
                kind: match entry.kind.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Dir,
                    _ => EntryKind::Other,
                },
                name: entry.name,
                path: entry.path,
                sha:  entry.sha,
            },)
            .collect(),)
    }

    async fn file(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        reference: Option<&str,>,
    ) -> Result<FileContent, Error,>
    {
        let route = format!("/repos/{owner}/{name}/contents/{}", encode_path(path,));
        let query = reference.map(|reference| RefQuery {
            reference,
        },);
        let payload: FilePayload = self
            .octocrab
            .get(&route, query.as_ref(),)
            .await
            .map_err(|e| classify(e, LimitClass::Core, &format!("{owner}/{name}/{path}"),),)?;

        match payload.encoding.as_deref() {
            None | Some("base64",) => {}
            Some(encoding,) => {
                return Err(Error::Decode {
                    path:    payload.path.clone(),
                    message: format!("unsupported encoding {encoding}"),
                },);
            }
        }

        let text = decode_content(&payload.path, payload.content.as_deref().unwrap_or_default(),)?;
        Ok(FileContent {
            path: payload.path,
            sha: payload.sha,
            text,
        },)
    }

    async fn update_file(&self, owner: &str, name: &str, update: &FileUpdate<'_,>,) -> Result<(), Error,>
    {
        let route = format!("/repos/{owner}/{name}/contents/{}", encode_path(update.path,));
        let body = UpdateBody {
            message: update.message,
            content: STANDARD.encode(update.content.as_bytes(),),
            sha:     update.sha,
            branch:  update.branch,
        };
        let _: Value = self.octocrab.put(&route, Some(&body,),).await.map_err(|e| {
            classify(e, LimitClass::Core, update.path,)
        },)?;

        Ok((),)
    }

    async fn create_fork(&self, owner: &str, name: &str,) -> Result<RemoteRepository, Error,>
    {
        let route = format!("/repos/{owner}/{name}/forks");
        let payload: RepositoryPayload = self
            .octocrab
            .post(&route, Some(&EmptyBody {},),)
            .await
            .map_err(|e| classify(e, LimitClass::Core, &format!("fork of {owner}/{name}"),),)?;

        Ok(payload.into(),)
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        name: &str,
        request: &PullRequestSpec,
    ) -> Result<PullRequestRef, Error,>
    {
        let route = format!("/repos/{owner}/{name}/pulls");
        let payload: PullPayload = self
            .octocrab
            .post(&route, Some(request,),)
            .await
            .map_err(|e| classify(e, LimitClass::Core, &format!("pull request on {owner}/{name}"),),)?;

        Ok(PullRequestRef {
            number:   payload.number,
            html_url: payload.html_url,
        },)
    }

    async fn rate_limit(&self, class: LimitClass,) -> Result<RateWindow, Error,>
    {
        let payload: RateLimitPayload = self
            .octocrab
            .get("/rate_limit", None::<&(),>,)
            .await
            .map_err(|e| classify(e, class, "rate limit",),)?;

        let window = match class {
            LimitClass::Core => payload.resources.core,
            LimitClass::Search => payload.resources.search,
        };
        let reset = Utc
            .timestamp_opt(window.reset, 0,)
            .single()
            .ok_or_else(|| Error::service(format!("invalid reset timestamp {}", window.reset),),)?;

        Ok(RateWindow {
            limit: window.limit,
            remaining: window.remaining,
            reset,
        },)
    }

    async fn search_code(&self, query: &str, page: u32,) -> Result<Vec<CodeHit,>, Error,>
    {
        let params = PageQuery {
            q: query,
            per_page: PER_PAGE,
            page,
        };
        let payload: SearchPayload<CodeItemPayload,> = self
            .octocrab
            .get("/search/code", Some(&params,),)
            .await
            .map_err(|e| classify(e, LimitClass::Search, "code search",),)?;

        Ok(payload
            .items
            .into_iter()
            .map(|item| CodeHit {
                owner:      item.repository.owner.login,
                repository: item.repository.name,
                path:       item.path,
            },)
            .collect(),)
    }

    async fn search_users(&self, query: &str,) -> Result<Vec<String,>, Error,>
    {
        let params = PageQuery {
            q:        query,
            per_page: PER_PAGE,
            page:     1,
        };
        let payload: SearchPayload<AccountPayload,> = self
            .octocrab
            .get("/search/users", Some(&params,),)
            .await
            .map_err(|e| classify(e, LimitClass::Search, "user search",),)?;

        Ok(payload.items.into_iter().map(|account| account.login,).collect(),)
    }

    async fn authenticated_login(&self,) -> Result<String, Error,>
    {
        let account: AccountPayload = self
            .octocrab
            .get("/user", None::<&(),>,)
            .await
            .map_err(|e| classify(e, LimitClass::Core, "authenticated user",),)?;

        Ok(account.login,)
    }
}
