// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Badge markup and README insertion.
//!
//! [`insert_badge`] is a pure function: it never touches the network and can
//! be exercised in isolation. The placement heuristic keeps the badge next to
//! the title when the README opens with a plain heading, and otherwise puts it
//! on its own paragraph at the very top.

use serde::{Deserialize, Serialize};

/// Image URL of the default badge.
pub const DEFAULT_BADGE_IMAGE_URL: &str =
    "https://static.streamlit.io/badges/streamlit_badge_black_white.svg";
/// Alt text of the default badge.
pub const DEFAULT_BADGE_LABEL: &str = "Open in Streamlit";

/// Badge advertised in READMEs.
///
/// # Examples
///
/// ```
/// use badgebot::Badge;
///
/// let badge = Badge::default();
/// assert_eq!(
///     badge.markup("https://share.streamlit.io/acme/widgets/",),
///     "[![Open in Streamlit](https://static.streamlit.io/badges/streamlit_badge_black_white.svg)](https://share.streamlit.io/acme/widgets/)"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default)]
pub struct Badge
{
    /// Alt text of the badge image.
    pub label:     String,
    /// Image URL; its presence in a README means the badge is there.
    pub image_url: String,
}

impl Default for Badge
{
    fn default() -> Self
    {
        Self {
            label:     DEFAULT_BADGE_LABEL.to_owned(),
            image_url: DEFAULT_BADGE_IMAGE_URL.to_owned(),
        }
    }
}

impl Badge
{
    /// Renders the Markdown linking the badge image to `app_url`.
    pub fn markup(&self, app_url: &str,) -> String
    {
        format!("[![{}]({})]({})", self.label, self.image_url, app_url)
    }

    /// Returns `true` when `text` already references the badge image.
    pub fn is_present_in(&self, text: &str,) -> bool
    {
        text.contains(self.image_url.as_str(),)
    }
}

/// Outcome of [`insert_badge`].
#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum BadgeEdit
{
    /// The README already carries the badge.
    Unchanged,
    /// New README content.
    Updated(String,),
}

impl BadgeEdit
{
    /// Returns the updated text, if any.
    pub fn into_updated(self,) -> Option<String,>
    {
        match self {
            Self::Unchanged => None,
            Self::Updated(text,) => Some(text,),
        }
    }
}

/// Inserts the badge for `app_url` into README `text`.
///
/// 1. Text already containing the badge image URL is left alone.
/// 2. Text with a carriage return gets the badge prepended.
/// 3. A first line starting with `#` and containing no `[` gets the badge
///    appended after a single space; every other line is kept verbatim.
/// 4. Anything else gets the badge prepended, followed by a blank line.
///
/// # Examples
///
/// ```
/// use badgebot::{Badge, BadgeEdit, insert_badge};
///
/// let badge = Badge::default();
/// let edit = insert_badge("# Widgets\nSome text", "https://share.streamlit.io/acme/widgets/", &badge,);
/// let BadgeEdit::Updated(text,) = edit else { panic!("expected an edit") };
/// assert!(text.starts_with("# Widgets [![Open in Streamlit]"));
/// assert!(text.ends_with("\nSome text"));
/// ```
pub fn insert_badge(text: &str, app_url: &str, badge: &Badge,) -> BadgeEdit
{
    if badge.is_present_in(text,) {
        return BadgeEdit::Unchanged;
    }

    let markup = badge.markup(app_url,);
    if text.contains('\r',) {
        return BadgeEdit::Updated(prepend(&markup, text,),);
    }

    let Some(first_line,) = text.split('\n',).next() else {
        return BadgeEdit::Updated(prepend(&markup, text,),);
    };

    if first_line.starts_with('#',) && !first_line.contains('[',) {
        let rest = &text[first_line.len()..];
        return BadgeEdit::Updated(format!("{first_line} {markup}{rest}"),);
    }

    BadgeEdit::Updated(prepend(&markup, text,),)
}

fn prepend(markup: &str, text: &str,) -> String
{
    format!("{markup}\n\n{text}")
}
