//! Page entity and its create/update payloads.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::{PageId, SiteId};

/// Publication state of a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum PageStatus {
    #[default]
    Draft,
    Published,
}

impl PageStatus {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Draft => "draft",
            PageStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A content page within a site.
///
/// `published_at` is `Some` exactly when `status` is `Published`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub site_id: SiteId,
    pub title: String,
    /// Unique within `site_id`.
    pub slug: String,
    pub status: PageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<u64>,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub h1_tag: String,
    /// Render the H1 inside the hero block instead of above it.
    #[serde(default)]
    pub use_h1_in_hero: bool,
    #[serde(default)]
    pub canonical_url: String,
    /// Raw HTML injected into `<head>`.
    #[serde(default)]
    pub custom_head_html: String,
    /// Newline-separated keyword list.
    #[serde(default)]
    pub keywords: String,
    /// Newline-separated LSI phrases.
    #[serde(default)]
    pub lsi_phrases: String,
    /// Display order in navigation menus.
    #[serde(default)]
    pub nav_order: i64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Page {
    /// Whether the page is currently published.
    pub fn is_published(&self) -> bool {
        self.status == PageStatus::Published
    }

    /// Keywords as trimmed, non-empty lines.
    pub fn keywords_list(&self) -> Vec<&str> {
        non_blank_lines(&self.keywords)
    }

    /// LSI phrases as trimmed, non-empty lines.
    pub fn lsi_phrases_list(&self) -> Vec<&str> {
        non_blank_lines(&self.lsi_phrases)
    }
}

fn non_blank_lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

/// Data required to create a page. New pages are always drafts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPage {
    pub site_id: Option<SiteId>,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub h1_tag: String,
    #[serde(default)]
    pub use_h1_in_hero: bool,
    #[serde(default)]
    pub canonical_url: String,
    #[serde(default)]
    pub custom_head_html: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub lsi_phrases: String,
    #[serde(default)]
    pub nav_order: i64,
}

impl NewPage {
    /// Minimal create payload.
    pub fn new(site_id: SiteId, title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            site_id: Some(site_id),
            title: title.into(),
            slug: slug.into(),
            ..Self::default()
        }
    }
}

/// Partial update of page metadata. `None` leaves a field unchanged.
///
/// Status is not patchable here; it moves only through publish/unpublish.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h1_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_h1_in_hero: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_head_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lsi_phrases: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nav_order: Option<i64>,
}

impl PagePatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch to a page in place. Does not touch timestamps.
    pub fn apply_to(&self, page: &mut Page) {
        if let Some(title) = &self.title {
            page.title = title.clone();
        }
        if let Some(slug) = &self.slug {
            page.slug = slug.clone();
        }
        if let Some(meta) = &self.meta_description {
            page.meta_description = meta.clone();
        }
        if let Some(h1) = &self.h1_tag {
            page.h1_tag = h1.clone();
        }
        if let Some(in_hero) = self.use_h1_in_hero {
            page.use_h1_in_hero = in_hero;
        }
        if let Some(url) = &self.canonical_url {
            page.canonical_url = url.clone();
        }
        if let Some(html) = &self.custom_head_html {
            page.custom_head_html = html.clone();
        }
        if let Some(keywords) = &self.keywords {
            page.keywords = keywords.clone();
        }
        if let Some(phrases) = &self.lsi_phrases {
            page.lsi_phrases = phrases.clone();
        }
        if let Some(nav_order) = self.nav_order {
            page.nav_order = nav_order;
        }
    }
}
