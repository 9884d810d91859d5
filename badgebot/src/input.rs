// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Loading and narrowing of the app list fed to the batch driver.
//!
//! The list is a YAML document (JSON works too, being a YAML subset) holding
//! either a bare sequence of records or a mapping with an `apps` key. Each
//! record carries an `app_url`, a `github_url`, or both.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{self, Error};

/// Repository-file URL used when running against the debug list.
pub const DEBUG_REPOSITORY_URL: &str = "https://github.com/tester-burner/test1/blob/main/README.md";

/// One row of the input list.
///
/// # Examples
///
/// ```
/// use badgebot::AppRecord;
///
/// let record = AppRecord {
///     app_url:    Some("None".to_owned(),),
///     github_url: Some("https://github.com/acme/widgets/blob/main/README.md".to_owned(),),
/// };
/// assert_eq!(record.url(), Some("https://github.com/acme/widgets/blob/main/README.md"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize,)]
pub struct AppRecord
{
    /// Hosted-app URL.
    #[serde(default, alias = "appUrl", alias = "app-url")]
    pub app_url:    Option<String,>,
    /// Direct URL of a README in the repository.
    #[serde(default, alias = "githubUrl", alias = "github-url")]
    pub github_url: Option<String,>,
}

impl AppRecord
{
    /// Creates a record from a hosted-app URL.
    pub fn from_app_url(url: impl Into<String,>,) -> Self
    {
        Self {
            app_url:    Some(url.into(),),
            github_url: None,
        }
    }

    /// Creates a record from a repository-file URL.
    pub fn from_github_url(url: impl Into<String,>,) -> Self
    {
        Self {
            app_url:    None,
            github_url: Some(url.into(),),
        }
    }

    /// Returns the URL to process: `app_url` when usable, else `github_url`.
    ///
    /// Blank values and the literal `None` left behind by spreadsheet exports
    /// are not usable.
    pub fn url(&self,) -> Option<&str,>
    {
        usable(self.app_url.as_deref(),).or_else(|| usable(self.github_url.as_deref(),),)
    }
}

fn usable(value: Option<&str,>,) -> Option<&str,>
{
    value.map(str::trim,).filter(|value| !value.is_empty() && *value != "None",)
}

#[derive(Debug, Deserialize,)]
#[serde(untagged)]
enum AppsDocument
{
    List(Vec<AppRecord,>,),
    Wrapped
    {
        apps: Vec<AppRecord,>,
    },
}

/// Loads the app list from disk.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read and the errors of
/// [`parse_apps`] otherwise.
pub fn load_apps(path: &Path,) -> Result<Vec<AppRecord,>, Error,>
{
    let contents = fs::read_to_string(path,).map_err(|source| error::io_error(path, source,),)?;
    parse_apps(&contents,)
}

/// Parses an app list document.
///
/// # Errors
///
/// Returns [`Error::Parse`] for malformed documents and
/// [`Error::Validation`] for an empty list.
pub fn parse_apps(contents: &str,) -> Result<Vec<AppRecord,>, Error,>
{
    let apps = match serde_yaml::from_str::<AppsDocument,>(contents,)? {
        AppsDocument::List(apps,) => apps,
        AppsDocument::Wrapped {
            apps,
        } => apps,
    };

    if apps.is_empty() {
        return Err(Error::validation("app list must include at least one app",),);
    }

    Ok(apps,)
}

/// Keeps the records whose URL contains `needle`.
///
/// Matching is case-sensitive; records without a usable URL never match a
/// non-empty needle.
pub fn filter_apps(apps: Vec<AppRecord,>, needle: &str,) -> Vec<AppRecord,>
{
    if needle.is_empty() {
        return apps;
    }

    apps.into_iter().filter(|app| app.url().is_some_and(|url| url.contains(needle,),),).collect()
}

/// Built-in list used to exercise the bot against a throwaway repository.
pub fn debug_apps() -> Vec<AppRecord,>
{
    vec![AppRecord::from_github_url(DEBUG_REPOSITORY_URL,)]
}

/// Half-open index range chosen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,)]
pub struct Selection
{
    /// First index, inclusive.
    pub start: usize,
    /// Last index, exclusive.
    pub end:   usize,
}

impl Default for Selection
{
    fn default() -> Self
    {
        Self {
            start: 0, end: 1,
        }
    }
}

impl Selection
{
    pub fn new(start: usize, end: usize,) -> Self
    {
        Self {
            start, end,
        }
    }

    /// Returns the selected slice; `end` is clamped to the slice length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySelection`] when the clamped range selects
    /// nothing.
    pub fn apply<'a, T,>(&self, items: &'a [T],) -> Result<&'a [T], Error,>
    {
        let end = self.end.min(items.len(),);
        if self.start >= end {
            return Err(Error::EmptySelection {
                start: self.start,
                end:   self.end,
                total: items.len(),
            },);
        }

        Ok(&items[self.start..end],)
    }
}

#[cfg(test)]
mod tests
{
    use std::io::Write;

    use super::*;

    #[test]
    fn bare_list_and_wrapped_documents_parse()
    {
        let bare = parse_apps("- app_url: https://share.streamlit.io/acme/widgets/\n",).expect("bare list",);
        let wrapped = parse_apps(
            "apps:\n  - github_url: https://github.com/acme/widgets/blob/main/README.md\n  - appUrl: None\n",
        )
        .expect("wrapped list",);

        assert_eq!(bare, vec![AppRecord::from_app_url("https://share.streamlit.io/acme/widgets/",)]);
        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[1].app_url.as_deref(), Some("None"));
    }

    #[test]
    fn json_documents_parse()
    {
        let apps = parse_apps(r#"{"apps": [{"app_url": "https://share.streamlit.io/a/b/"}]}"#,).expect("json",);
        assert_eq!(apps.len(), 1);
    }

    #[test]
    fn empty_list_is_rejected()
    {
        assert!(matches!(parse_apps("[]",), Err(Error::Validation { .. })));
        assert!(matches!(parse_apps("apps: [",), Err(Error::Parse { .. })));
    }

    #[test]
    fn url_prefers_app_url_and_skips_placeholders()
    {
        let both = AppRecord {
            app_url:    Some(" https://share.streamlit.io/a/b/ ".to_owned(),),
            github_url: Some("https://github.com/a/b/blob/main/README.md".to_owned(),),
        };
        assert_eq!(both.url(), Some("https://share.streamlit.io/a/b/"));

        let placeholder = AppRecord {
            app_url:    Some("None".to_owned(),),
            github_url: Some("  ".to_owned(),),
        };
        assert_eq!(placeholder.url(), None);
        assert_eq!(AppRecord::default().url(), None);
    }

    #[test]
    fn filter_is_case_sensitive_substring()
    {
        let apps = vec![
            AppRecord::from_app_url("https://share.streamlit.io/acme/widgets/",),
            AppRecord::from_app_url("https://share.streamlit.io/Acme/gadgets/",),
            AppRecord::default(),
        ];

        assert_eq!(filter_apps(apps.clone(), "acme",).len(), 1);
        assert_eq!(filter_apps(apps, "",).len(), 3);
    }

    #[test]
    fn selection_clamps_end_and_rejects_empty_ranges()
    {
        let items = [1, 2, 3, 4, 5,];

        assert_eq!(Selection::new(1, 3,).apply(&items,).expect("range",), &[2, 3]);
        assert_eq!(Selection::new(3, 99,).apply(&items,).expect("range",), &[4, 5]);
        assert_eq!(Selection::default().apply(&items,).expect("range",), &[1]);

        let error = Selection::new(2, 2,).apply(&items,).expect_err("empty",);
        assert!(matches!(error, Error::EmptySelection { start: 2, end: 2, total: 5 }));
        assert!(Selection::new(7, 9,).apply(&items,).is_err());
    }

    #[test]
    fn debug_list_points_at_test_repository()
    {
        assert_eq!(debug_apps()[0].url(), Some(DEBUG_REPOSITORY_URL));
    }

    #[test]
    fn load_apps_reads_from_disk()
    {
        let mut file = tempfile::NamedTempFile::new().expect("expected temp file",);
        write!(file, "- app_url: https://share.streamlit.io/acme/widgets/\n").expect("expected write to succeed",);

        let apps = load_apps(file.path(),).expect("expected load to succeed",);
        assert_eq!(apps.len(), 1);
    }

    #[test]
    fn load_apps_reports_io_errors()
    {
        let error = load_apps(Path::new("/nonexistent/apps.yaml",),).expect_err("expected io error",);
        assert!(matches!(error, Error::Io { .. }));
    }
}
