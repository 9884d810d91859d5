// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Discovers app repositories through the hosting service search API.
//!
//! Code search looks for Python entry points importing the app framework
//! under a given account; user search resolves an e-mail address to a login.
//! Both run on the [`LimitClass::Search`] bucket, and a "Validation Failed"
//! response (unknown user, unsearchable account) means "no results".
use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::Error,
    gateway::{LimitClass, RateLimitedGateway},
    host::RepositoryHost,
};

/// Upper bound on code search pages fetched for one account.
pub const MAX_SEARCH_PAGES: u32 = 10;

/// Repository containing at least one app entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct DiscoveredRepository
{
    /// Login of the owning account.
    pub owner:      String,
    /// Repository name.
    pub repository: String,
    /// Entry point files found in the repository, in search order.
    pub paths:      Vec<String,>,
}

impl fmt::Display for DiscoveredRepository
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        write!(f, "{}/{}", self.owner, self.repository)
    }
}

/// Builds the code search query for app entry points owned by `login`.
pub fn app_search_query(login: &str,) -> String
{
    format!("extension:py \"import streamlit as st\" user:{login}")
}

/// Builds the user search query matching a public e-mail address.
pub fn user_search_query(email: &str,) -> String
{
    format!("type:user {email} in:email")
}

/// Lists repositories of `login` containing app entry points.
///
/// Pages are fetched until one comes back empty or [`MAX_SEARCH_PAGES`] is
/// reached. Hits are grouped per repository in first-seen order.
///
/// # Errors
///
/// Propagates search failures other than a validation failure, which ends
/// the search with the results collected so far.
///
/// # Example
///
/// ```no_run
/// use badgebot::{GitHubHost, RateLimitedGateway, discover_app_files};
///
/// # async fn example() -> Result<(), badgebot::Error> {
/// let token = std::env::var("GITHUB_TOKEN",).unwrap_or_default();
/// let gateway = RateLimitedGateway::new(GitHubHost::new(&token,)?, badgebot::DEFAULT_MAX_WAIT,);
/// for repository in discover_app_files(&gateway, "acme",).await? {
///     println!("Found: {}", repository);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn discover_app_files<H: RepositoryHost,>(
    gateway: &RateLimitedGateway<H,>,
    login: &str,
) -> Result<Vec<DiscoveredRepository,>, Error,>
{
    let query = app_search_query(login,);
    let mut discovered: Vec<DiscoveredRepository,> = Vec::new();
    let mut index: HashMap<(String, String,), usize,> = HashMap::new();
    let mut page = 1u32;

    loop {
        let hits = match gateway
            .call(LimitClass::Search, "code search", |host| host.search_code(&query, page,),)
            .await
        {
            Ok(hits,) => hits,
            Err(Error::ValidationFailed {
                message, ..
            },) => {
                debug!("code search for {} rejected: {}", login, message);
                break;
            }
            Err(error,) => return Err(error,),
        };

        if hits.is_empty() {
            break;
        }

        for hit in hits {
            let key = (hit.owner.clone(), hit.repository.clone(),);
            match index.get(&key,) {
                Some(&position,) => {
                    let paths = &mut discovered[position].paths;
                    if !paths.contains(&hit.path,) {
                        paths.push(hit.path,);
                    }
                }
                None => {
                    index.insert(key, discovered.len(),);
                    discovered.push(DiscoveredRepository {
                        owner:      hit.owner,
                        repository: hit.repository,
                        paths:      vec![hit.path],
                    },);
                }
            }
        }

        if page >= MAX_SEARCH_PAGES {
            break;
        }
        page += 1;
    }

    info!("Found {} app repositories for {}", discovered.len(), login);
    Ok(discovered,)
}

/// Resolves a public e-mail address to a single login.
///
/// # Errors
///
/// Returns [`Error::Validation`] when more than one account matches, and
/// propagates search failures other than a validation failure.
pub async fn find_user_by_email<H: RepositoryHost,>(
    gateway: &RateLimitedGateway<H,>,
    email: &str,
) -> Result<Option<String,>, Error,>
{
    let query = user_search_query(email,);
    let logins = match gateway.call(LimitClass::Search, "user search", |host| host.search_users(&query,),).await {
        Ok(logins,) => logins,
        Err(Error::ValidationFailed {
            ..
        },) => return Ok(None,),
        Err(error,) => return Err(error,),
    };

    match logins.as_slice() {
        [] => Ok(None,),
        [login,] => Ok(Some(login.clone(),),),
        many => Err(Error::validation(format!("{} accounts match {email}", many.len()),),),
    }
}
