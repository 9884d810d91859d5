// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Badge presence check that keeps the README around for editing.

use crate::{
    badge::Badge,
    cache::{ReadmeFile, RepositoryCache, RepositoryHandle},
    error::Error,
    host::RepositoryHost,
};

/// README content together with the badge verdict.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct BadgeInspection
{
    /// README of the repository root, if any.
    pub readme:    Option<ReadmeFile,>,
    /// Whether the README references the badge image.
    pub has_badge: bool,
}

/// Reads the README of `handle` once and checks it for `badge`.
///
/// A repository without a README never has the badge.
///
/// # Errors
///
/// Propagates errors from [`RepositoryCache::get_readme`].
pub async fn inspect<H: RepositoryHost,>(
    cache: &mut RepositoryCache<H,>,
    handle: &RepositoryHandle,
    badge: &Badge,
) -> Result<BadgeInspection, Error,>
{
    let readme = cache.get_readme(handle,).await?;
    let has_badge = readme.as_ref().is_some_and(|readme| badge.is_present_in(&readme.text,),);

    Ok(BadgeInspection {
        readme, has_badge,
    },)
}
