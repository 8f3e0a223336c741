//! Shared identity, page, and block types for pagewright.
//!
//! This crate is the leaf of the workspace: typed IDs, the per-kind block
//! content shapes, pages, and identities. It has **no internal pagewright
//! dependencies**; the kernel, client, and CLI all build on it.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Site (SiteId) ← owned by the external site service
//!     └── contains Page (PageId, slug unique per site)
//!
//! Page (PageId)
//!     └── status: draft | published
//!     └── owns Block (BlockId), exclusively, in dense order 0..N
//!
//! Block (BlockId)
//!     └── kind fixed at creation (hero, text, image, gallery, slider)
//!     └── content: BlockContent, one variant per kind
//!
//! Identity (PrincipalId) ← handed in by the session service
//!     └── admin, or owner of a set of sites
//! ```
//!
//! # Key Types
//!
//! |------------------|-----------------------------------------------|
//! | Type             | Purpose                                       |
//! |------------------|-----------------------------------------------|
//! | [`Page`]         | Page entity (site, slug, lifecycle)           |
//! | [`Block`]        | Block entity (page, order, typed content)     |
//! | [`BlockKind`]    | The immutable type tag of a block             |
//! | [`BlockContent`] | Tagged union of per-kind content              |
//! | [`Identity`]     | Authorized caller, scoped to sites            |
//! |------------------|-----------------------------------------------|

pub mod block;
pub mod identity;
pub mod ids;
pub mod page;

// Re-export primary types at crate root for convenience.
pub use block::{
    Alignment, Block, BlockContent, BlockKind, GalleryContent, GalleryImage, HeroContent,
    ImageContent, KindContent, Slide, SliderContent, TextContent,
};
pub use identity::{Identity, IdentityRole};
pub use ids::{BlockId, PageId, PrincipalId, SiteId};
pub use page::{NewPage, Page, PagePatch, PageStatus};

/// Current time as Unix milliseconds. Used by constructors throughout the workspace.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
