//! Block kinds, per-kind content shapes, and the block entity.
//!
//! ## Design: BlockKind + BlockContent
//!
//! `BlockKind` is the immutable type tag of a block. `BlockContent` is a tagged
//! union with one variant per kind, each carrying a struct whose fields are
//! statically known. Every content struct is `deny_unknown_fields` and
//! `default`: omitted fields resolve to the kind's defaults, stray fields are
//! rejected at deserialization.
//!
//! Storage keeps the kind and the inner payload in separate columns, so the
//! payload JSON never carries its own tag. [`BlockContent::from_value`] and
//! [`BlockContent::to_value`] convert between the two forms.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::{BlockId, PageId};

/// What a block *is* (content type). Fixed at creation.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum BlockKind {
    /// Banner with title, subtitle, background, and call to action.
    Hero,
    /// Titled text section.
    Text,
    /// Single image with alt text and caption.
    Image,
    /// Ordered list of images.
    Gallery,
    /// Carousel of slides. Older payloads call it "swiper".
    #[serde(alias = "swiper")]
    #[strum(serialize = "slider", serialize = "swiper")]
    Slider,
}

impl BlockKind {
    /// Every kind, in palette order.
    pub const ALL: [BlockKind; 5] = [
        BlockKind::Hero,
        BlockKind::Text,
        BlockKind::Image,
        BlockKind::Gallery,
        BlockKind::Slider,
    ];

    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Hero => "hero",
            BlockKind::Text => "text",
            BlockKind::Image => "image",
            BlockKind::Gallery => "gallery",
            BlockKind::Slider => "slider",
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Horizontal alignment of a text block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// A content struct bound to exactly one [`BlockKind`].
///
/// `FIELDS` lists every accepted top-level key, aliases included. Validators
/// use it to tell a stray field apart from another kind's shape.
pub trait KindContent: Default + Serialize + DeserializeOwned + Into<BlockContent> {
    const KIND: BlockKind;
    const FIELDS: &'static [&'static str];
}

// ── Per-kind content ────────────────────────────────────────────────────────

/// Hero banner content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeroContent {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub background_image: Option<String>,
    pub cta_text: Option<String>,
    pub cta_url: Option<String>,
}

impl Default for HeroContent {
    fn default() -> Self {
        Self {
            title: Some("Hero Title".into()),
            subtitle: Some("Subtitle".into()),
            background_image: None,
            cta_text: None,
            cta_url: None,
        }
    }
}

impl KindContent for HeroContent {
    const KIND: BlockKind = BlockKind::Hero;
    const FIELDS: &'static [&'static str] =
        &["title", "subtitle", "background_image", "cta_text", "cta_url"];
}

/// Text section content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextContent {
    pub title: Option<String>,
    /// Body text. Accepted as `text` on input.
    #[serde(alias = "text")]
    pub body: Option<String>,
    pub alignment: Alignment,
}

impl Default for TextContent {
    fn default() -> Self {
        Self {
            title: Some("Section Title".into()),
            body: Some("Your text here".into()),
            alignment: Alignment::Left,
        }
    }
}

impl KindContent for TextContent {
    const KIND: BlockKind = BlockKind::Text;
    const FIELDS: &'static [&'static str] = &["title", "body", "text", "alignment"];
}

/// Single image content. URLs are opaque; nothing checks they resolve.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageContent {
    pub image_url: Option<String>,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
}

impl KindContent for ImageContent {
    const KIND: BlockKind = BlockKind::Image;
    const FIELDS: &'static [&'static str] = &["image_url", "alt_text", "caption"];
}

/// One gallery entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryImage {
    pub url: String,
    pub alt: String,
}

/// Gallery content: images in display order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryContent {
    pub images: Vec<GalleryImage>,
}

impl KindContent for GalleryContent {
    const KIND: BlockKind = BlockKind::Gallery;
    const FIELDS: &'static [&'static str] = &["images"];
}

/// One slider entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Slide {
    pub title: String,
    pub image: String,
    pub description: String,
}

/// Slider content: slides in display order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SliderContent {
    pub slides: Vec<Slide>,
}

impl KindContent for SliderContent {
    const KIND: BlockKind = BlockKind::Slider;
    const FIELDS: &'static [&'static str] = &["slides"];
}

// ── Tagged union ────────────────────────────────────────────────────────────

/// Block content, tagged by kind.
///
/// Serialized adjacently tagged: `{"type": "text", "content": {...}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum BlockContent {
    Hero(HeroContent),
    Text(TextContent),
    Image(ImageContent),
    Gallery(GalleryContent),
    #[serde(alias = "swiper")]
    Slider(SliderContent),
}

impl BlockContent {
    /// The kind this content belongs to.
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockContent::Hero(_) => BlockKind::Hero,
            BlockContent::Text(_) => BlockKind::Text,
            BlockContent::Image(_) => BlockKind::Image,
            BlockContent::Gallery(_) => BlockKind::Gallery,
            BlockContent::Slider(_) => BlockKind::Slider,
        }
    }

    /// Default content for a kind (what a freshly added block shows).
    pub fn default_for(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Hero => HeroContent::default().into(),
            BlockKind::Text => TextContent::default().into(),
            BlockKind::Image => ImageContent::default().into(),
            BlockKind::Gallery => GalleryContent::default().into(),
            BlockKind::Slider => SliderContent::default().into(),
        }
    }

    /// Decode an untagged payload as content of `kind`.
    pub fn from_value(kind: BlockKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            BlockKind::Hero => BlockContent::Hero(serde_json::from_value(value)?),
            BlockKind::Text => BlockContent::Text(serde_json::from_value(value)?),
            BlockKind::Image => BlockContent::Image(serde_json::from_value(value)?),
            BlockKind::Gallery => BlockContent::Gallery(serde_json::from_value(value)?),
            BlockKind::Slider => BlockContent::Slider(serde_json::from_value(value)?),
        })
    }

    /// Encode the payload without its tag.
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            BlockContent::Hero(c) => serde_json::to_value(c),
            BlockContent::Text(c) => serde_json::to_value(c),
            BlockContent::Image(c) => serde_json::to_value(c),
            BlockContent::Gallery(c) => serde_json::to_value(c),
            BlockContent::Slider(c) => serde_json::to_value(c),
        }
    }
}

impl From<HeroContent> for BlockContent {
    fn from(c: HeroContent) -> Self {
        BlockContent::Hero(c)
    }
}

impl From<TextContent> for BlockContent {
    fn from(c: TextContent) -> Self {
        BlockContent::Text(c)
    }
}

impl From<ImageContent> for BlockContent {
    fn from(c: ImageContent) -> Self {
        BlockContent::Image(c)
    }
}

impl From<GalleryContent> for BlockContent {
    fn from(c: GalleryContent) -> Self {
        BlockContent::Gallery(c)
    }
}

impl From<SliderContent> for BlockContent {
    fn from(c: SliderContent) -> Self {
        BlockContent::Slider(c)
    }
}

// ── Block entity ────────────────────────────────────────────────────────────

/// A content block, exclusively owned by one page.
///
/// `order` is the block's position on its page. Across a page's blocks the
/// values are always exactly `0..N`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub page_id: PageId,
    pub order: u32,
    #[serde(flatten)]
    pub content: BlockContent,
    /// Unix millis.
    pub created_at: u64,
    /// Unix millis.
    pub updated_at: u64,
}

impl Block {
    /// The block's type tag (derived from its content).
    pub fn kind(&self) -> BlockKind {
        self.content.kind()
    }
}

// ============================================================================
// Tests
// ============================================================================
