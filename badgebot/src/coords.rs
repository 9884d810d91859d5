// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Parsing of hosted-app and repository-file URLs into repository
//! coordinates.
//!
//! Two grammars are supported. App URLs have the shape
//! `<app_prefix>owner/repo[/branch]/path.py`; the branch is optional and the
//! entry point defaults to `streamlit_app.py`. Repository-file URLs have the
//! shape `<repository_prefix>owner/repo/blob/branch/path.md` with every
//! segment mandatory.
//!
//! Each parser returns `Ok(None)` when the URL does not start with its
//! prefix, so callers can try the other grammar, and an
//! [`Error::UrlParse`] when the prefix matches but the remainder does not.

use std::{borrow::Cow, fmt};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Default prefix of hosted-app URLs.
pub const DEFAULT_APP_PREFIX: &str = "https://share.streamlit.io/";
/// Default prefix of repository-file URLs.
pub const DEFAULT_REPOSITORY_PREFIX: &str = "https://github.com/";
/// Entry point assumed when an app URL names a directory.
pub const DEFAULT_APP_SCRIPT: &str = "streamlit_app.py";

const APP_GRAMMAR: &str = "app";
const REPOSITORY_FILE_GRAMMAR: &str = "repository file";

/// Canonical locator of a single file within a repository.
///
/// `branch` is `None` when the source URL omitted it; use
/// [`resolved_branch`](Self::resolved_branch) once the repository default
/// branch is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize,)]
pub struct RepoCoordinate
{
    /// Account owning the repository.
    pub owner:  String,
    /// Repository name.
    pub repo:   String,
    /// Branch named by the URL, if any.
    pub branch: Option<String,>,
    /// Path of the file inside the repository.
    pub path:   String,
}

impl RepoCoordinate
{
    /// Creates a coordinate from its parts.
    pub fn new(
        owner: impl Into<String,>,
        repo: impl Into<String,>,
        branch: Option<String,>,
        path: impl Into<String,>,
    ) -> Self
    {
        Self {
            owner: owner.into(), repo: repo.into(), branch, path: path.into(),
        }
    }

    /// Returns the repository in `owner/repo` form.
    pub fn full_name(&self,) -> String
    {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Returns the branch named by the URL or `default_branch` when absent.
    pub fn resolved_branch<'a,>(&'a self, default_branch: &'a str,) -> &'a str
    {
        self.branch.as_deref().unwrap_or(default_branch,)
    }
}

impl fmt::Display for RepoCoordinate
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        match &self.branch {
            Some(branch,) => write!(f, "{}/{}@{}:{}", self.owner, self.repo, branch, self.path),
            None => write!(f, "{}/{}:{}", self.owner, self.repo, self.path),
        }
    }
}

/// URL prefixes recognized by [`CoordinateParser`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default)]
pub struct UrlSettings
{
    /// Prefix of hosted-app URLs, including the trailing slash.
    pub app_prefix:        String,
    /// Prefix of repository-file URLs, including the trailing slash.
    pub repository_prefix: String,
}

impl Default for UrlSettings
{
    fn default() -> Self
    {
        Self {
            app_prefix:        DEFAULT_APP_PREFIX.to_owned(),
            repository_prefix: DEFAULT_REPOSITORY_PREFIX.to_owned(),
        }
    }
}

/// Compiled URL grammars.
#[derive(Debug, Clone,)]
pub struct CoordinateParser
{
    settings:        UrlSettings,
    app_url:         Regex,
    repository_file: Regex,
}

impl CoordinateParser
{
    /// Compiles the grammars for the supplied prefixes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when a prefix is empty or a grammar
    /// fails to compile.
    pub fn new(settings: UrlSettings,) -> Result<Self, Error,>
    {
        if settings.app_prefix.trim().is_empty() || settings.repository_prefix.trim().is_empty() {
            return Err(Error::validation("URL prefixes cannot be empty",),);
        }

        let app_url = compile(&format!(
            r"^{}(?P<owner>\w[\w\-]*)/(?P<repo>\w[\w\-]*)/((?P<branch>\w[\w\-\.]*)/)?(?P<path>\w[\w\-/\.]*\w\.py)$",
            regex::escape(&settings.app_prefix,)
        ),)?;
        let repository_file = compile(&format!(
            r"^{}(?P<owner>[\w\-]+)/(?P<repo>[\w\-]+)/blob/(?P<branch>[\w\-\.]+)/(?P<path>[\w\-\./]*[\w\-]\.md)$",
            regex::escape(&settings.repository_prefix,)
        ),)?;

        Ok(Self {
            settings,
            app_url,
            repository_file,
        },)
    }

    /// Returns the prefixes this parser was built with.
    pub fn settings(&self,) -> &UrlSettings
    {
        &self.settings
    }

    /// Parses a hosted-app URL.
    ///
    /// A trailing `/` means the app runs `streamlit_app.py` from that
    /// directory; a URL without a `.py` suffix gets `/streamlit_app.py`
    /// appended before matching.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UrlParse`] when the URL carries the app prefix but
    /// does not match the grammar.
    ///
    /// # Examples
    ///
    /// ```
    /// use badgebot::{CoordinateParser, UrlSettings};
    ///
    /// let parser = CoordinateParser::new(UrlSettings::default(),)?;
    /// let coordinate = parser
    ///     .parse_app_url("https://share.streamlit.io/acme/widgets/",)?
    ///     .expect("app URL",);
    /// assert_eq!(coordinate.path, "streamlit_app.py");
    /// assert_eq!(coordinate.branch, None);
    /// # Ok::<(), badgebot::Error>(())
    /// ```
    pub fn parse_app_url(&self, url: &str,) -> Result<Option<RepoCoordinate,>, Error,>
    {
        let mut url = normalize(url,).into_owned();
        if !url.starts_with(&self.settings.app_prefix,) {
            return Ok(None,);
        }

        if url.ends_with('/',) {
            url.push_str(DEFAULT_APP_SCRIPT,);
        } else if !url.ends_with(".py",) {
            url.push('/',);
            url.push_str(DEFAULT_APP_SCRIPT,);
        }

        let captures = self.app_url.captures(&url,).ok_or_else(|| Error::UrlParse {
            url:     url.clone(),
            grammar: APP_GRAMMAR,
        },)?;

        Ok(Some(RepoCoordinate::new(
            &captures["owner"],
            &captures["repo"],
            captures.name("branch",).map(|branch| branch.as_str().to_owned(),),
            &captures["path"],
        ),),)
    }

    /// Parses a direct repository-file URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UrlParse`] when the URL carries the repository prefix
    /// but does not match `owner/repo/blob/branch/path.md`.
    pub fn parse_repo_file_url(&self, url: &str,) -> Result<Option<RepoCoordinate,>, Error,>
    {
        let url = normalize(url,);
        if !url.starts_with(&self.settings.repository_prefix,) {
            return Ok(None,);
        }

        let captures = self.repository_file.captures(&url,).ok_or_else(|| Error::UrlParse {
            url:     url.to_string(),
            grammar: REPOSITORY_FILE_GRAMMAR,
        },)?;

        Ok(Some(RepoCoordinate::new(
            &captures["owner"],
            &captures["repo"],
            Some(captures["branch"].to_owned(),),
            &captures["path"],
        ),),)
    }

    /// Tries the app grammar first and falls back to the repository-file
    /// grammar.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::UrlParse`] from whichever grammar recognized the
    /// prefix.
    pub fn parse(&self, url: &str,) -> Result<Option<RepoCoordinate,>, Error,>
    {
        match self.parse_app_url(url,)? {
            Some(coordinate,) => Ok(Some(coordinate,),),
            None => self.parse_repo_file_url(url,),
        }
    }
}

fn compile(pattern: &str,) -> Result<Regex, Error,>
{
    Regex::new(pattern,).map_err(|e| Error::validation(format!("invalid URL grammar: {e}"),),)
}

/// Trims and percent-decodes the URL. Invalid UTF-8 sequences are replaced
/// rather than rejected so parsing stays total.
fn normalize(url: &str,) -> Cow<'_, str,>
{
    let trimmed = url.trim();
    match urlencoding::decode(trimmed,) {
        Ok(decoded,) => decoded,
        Err(_,) => {
            let bytes = urlencoding::decode_binary(trimmed.as_bytes(),);
            Cow::Owned(String::from_utf8_lossy(&bytes,).into_owned(),)
        }
    }
}

#[cfg(test)]
mod tests
{
    use proptest::prelude::*;

    use super::*;

    fn parser() -> CoordinateParser
    {
        CoordinateParser::new(UrlSettings::default(),).expect("default grammars compile",)
    }

    #[test]
    fn app_url_with_trailing_slash_uses_default_script()
    {
        let coordinate = parser()
            .parse_app_url("https://share.streamlit.io/acme/widgets/",)
            .expect("parse",)
            .expect("app url",);

        assert_eq!(coordinate, RepoCoordinate::new("acme", "widgets", None, "streamlit_app.py"));
    }

    #[test]
    fn app_url_without_script_appends_default_script()
    {
        let coordinate = parser()
            .parse_app_url("https://share.streamlit.io/acme/widgets/dev",)
            .expect("parse",)
            .expect("app url",);

        assert_eq!(
            coordinate,
            RepoCoordinate::new("acme", "widgets", Some("dev".to_owned()), "streamlit_app.py")
        );
    }

    #[test]
    fn app_url_with_branch_and_nested_path()
    {
        let coordinate = parser()
            .parse_app_url("https://share.streamlit.io/acme/widgets/v1.2/apps/main_page.py",)
            .expect("parse",)
            .expect("app url",);

        assert_eq!(coordinate.branch.as_deref(), Some("v1.2"));
        assert_eq!(coordinate.path, "apps/main_page.py");
    }

    #[test]
    fn app_url_without_branch_keeps_branch_absent()
    {
        let coordinate = parser()
            .parse_app_url("https://share.streamlit.io/acme/widgets/app.py",)
            .expect("parse",)
            .expect("app url",);

        assert_eq!(coordinate.branch, None);
        assert_eq!(coordinate.path, "app.py");
        assert_eq!(coordinate.resolved_branch("main"), "main");
    }

    #[test]
    fn app_url_is_percent_decoded()
    {
        let coordinate = parser()
            .parse_app_url("https://share.streamlit.io/acme/widgets/main/my%2Dapp.py",)
            .expect("parse",)
            .expect("app url",);

        assert_eq!(coordinate.path, "my-app.py");
    }

    #[test]
    fn custom_app_prefix_is_honoured()
    {
        let parser = CoordinateParser::new(UrlSettings {
            app_prefix:        "https://share.example.io/".to_owned(),
            repository_prefix: DEFAULT_REPOSITORY_PREFIX.to_owned(),
        },)
        .expect("grammars compile",);

        let coordinate = parser
            .parse_app_url("https://share.example.io/acme/widgets/",)
            .expect("parse",)
            .expect("app url",);
        assert_eq!(coordinate.path, "streamlit_app.py");
        assert_eq!(coordinate.branch, None);
    }

    #[test]
    fn foreign_prefix_yields_none()
    {
        assert!(parser().parse_app_url("https://example.com/acme/widgets/",).expect("parse",).is_none());
        assert!(
            parser()
                .parse_repo_file_url("https://share.streamlit.io/acme/widgets/",)
                .expect("parse",)
                .is_none()
        );
    }

    #[test]
    fn malformed_app_url_is_a_hard_error()
    {
        let error = parser()
            .parse_app_url("https://share.streamlit.io/acme",)
            .expect_err("expected parse error",);

        match error {
            Error::UrlParse {
                url,
                grammar,
            } => {
                assert_eq!(url, "https://share.streamlit.io/acme/streamlit_app.py");
                assert_eq!(grammar, "app");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn repo_file_url_parses_all_segments()
    {
        let coordinate = parser()
            .parse_repo_file_url("https://github.com/acme/widgets/blob/main/README.md",)
            .expect("parse",)
            .expect("repo url",);

        assert_eq!(
            coordinate,
            RepoCoordinate::new("acme", "widgets", Some("main".to_owned()), "README.md")
        );
    }

    #[test]
    fn repo_file_url_accepts_dotted_branch_and_nested_path()
    {
        let coordinate = parser()
            .parse_repo_file_url("https://github.com/acme/widgets/blob/release-1.2/docs/intro.md",)
            .expect("parse",)
            .expect("repo url",);

        assert_eq!(coordinate.branch.as_deref(), Some("release-1.2"));
        assert_eq!(coordinate.path, "docs/intro.md");
    }

    #[test]
    fn repo_file_url_without_blob_segment_is_a_hard_error()
    {
        let error = parser()
            .parse_repo_file_url("https://github.com/acme/widgets",)
            .expect_err("expected parse error",);
        assert!(matches!(error, Error::UrlParse { grammar: "repository file", .. }));
    }

    #[test]
    fn parse_falls_back_to_repository_grammar()
    {
        let coordinate = parser()
            .parse("https://github.com/acme/widgets/blob/main/README.md",)
            .expect("parse",)
            .expect("coordinate",);
        assert_eq!(coordinate.owner, "acme");

        assert!(parser().parse("ftp://elsewhere/file",).expect("parse",).is_none());
    }

    #[test]
    fn display_includes_branch_when_known()
    {
        let with_branch = RepoCoordinate::new("acme", "widgets", Some("main".to_owned(),), "README.md",);
        let without_branch = RepoCoordinate::new("acme", "widgets", None, "app.py",);

        assert_eq!(with_branch.to_string(), "acme/widgets@main:README.md");
        assert_eq!(without_branch.to_string(), "acme/widgets:app.py");
        assert_eq!(with_branch.full_name(), "acme/widgets");
    }

    proptest! {
        #[test]
        fn parsers_are_total(input in ".{0,80}") {
            let parser = parser();
            let _ = parser.parse_app_url(&input);
            let _ = parser.parse_repo_file_url(&input);
        }

        #[test]
        fn trailing_slash_app_urls_resolve_default_script(
            owner in "[a-z][a-z0-9-]{0,10}",
            repo in "[a-z][a-z0-9-]{0,10}",
        ) {
            let url = format!("https://share.streamlit.io/{owner}/{repo}/");
            let coordinate = parser().parse_app_url(&url).expect("parse").expect("app url");
            prop_assert_eq!(coordinate.path, DEFAULT_APP_SCRIPT);
            prop_assert_eq!(coordinate.owner, owner);
            prop_assert_eq!(coordinate.repo, repo);
        }

        #[test]
        fn extensionless_app_urls_get_default_script(
            owner in "[a-z][a-z0-9-]{0,10}",
            repo in "[a-z][a-z0-9-]{0,10}",
            branch in "[a-z][a-z0-9]{0,6}(\\.[0-9]{1,2})?",
        ) {
            let url = format!("https://share.streamlit.io/{owner}/{repo}/{branch}");
            let coordinate = parser().parse_app_url(&url).expect("parse").expect("app url");
            prop_assert_eq!(coordinate.path, DEFAULT_APP_SCRIPT);
            prop_assert_eq!(coordinate.branch, Some(branch));
        }
    }
}
