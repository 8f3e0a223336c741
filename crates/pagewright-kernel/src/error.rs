//! Error taxonomy for kernel operations.
//!
//! Every public operation returns [`KernelError`]. Storage failures never
//! surface as their own variant: they are reported through [`crate::fault`]
//! and collapse into `Internal`.

use std::fmt;

use thiserror::Error;

use pagewright_types::{BlockId, BlockKind, PageId};

/// Which kind of entity a lookup failed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Page,
    Block,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Page => write!(f, "page"),
            Entity::Block => write!(f, "block"),
        }
    }
}

/// Block content that does not fit its kind's schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Payload was not a JSON object.
    #[error("{kind} content must be a JSON object")]
    NotAnObject { kind: BlockKind },

    /// Field not defined for this kind, nor for any other.
    #[error("unknown field `{field}` for {kind} content")]
    UnknownField { kind: BlockKind, field: String },

    /// Payload is shaped like another kind's content.
    #[error("{kind} block was given {found} content (field `{field}`)")]
    ForeignShape {
        kind: BlockKind,
        found: BlockKind,
        field: String,
    },

    /// Known fields with the wrong primitive or array shape.
    #[error("invalid {kind} content: {message}")]
    InvalidShape { kind: BlockKind, message: String },

    /// Typed content whose variant disagrees with the block's kind.
    #[error("expected {expected} content, got {got}")]
    KindMismatch { expected: BlockKind, got: BlockKind },

    /// No schema registered for this kind.
    #[error("no schema registered for {0}")]
    Unregistered(BlockKind),
}

/// A reorder request whose id-set differs from the current one.
///
/// `Id` is [`BlockId`] for a page's blocks and [`PageId`] for a site's pages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "reorder rejected: {} missing, {} foreign, {} duplicated",
    missing.len(),
    foreign.len(),
    duplicated.len()
)]
pub struct ReorderConflict<Id = BlockId> {
    /// Current ids absent from the request.
    pub missing: Vec<Id>,
    /// Requested ids outside the current set.
    pub foreign: Vec<Id>,
    /// Ids listed more than once.
    pub duplicated: Vec<Id>,
}

impl<Id> Default for ReorderConflict<Id> {
    fn default() -> Self {
        Self {
            missing: Vec::new(),
            foreign: Vec::new(),
            duplicated: Vec::new(),
        }
    }
}

impl<Id> ReorderConflict<Id> {
    /// True when the request matched the current id-set exactly.
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.foreign.is_empty() && self.duplicated.is_empty()
    }
}

/// Errors returned by kernel operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Malformed or missing fields, slug collisions.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Block content violates its kind's schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Unresolvable page or block id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// Block reorder id-set mismatch.
    #[error(transparent)]
    Conflict(#[from] ReorderConflict),

    /// Page reorder id-set mismatch.
    #[error(transparent)]
    PageConflict(#[from] ReorderConflict<PageId>),

    /// Identity not entitled to the site.
    #[error("{identity} may not access site {site}")]
    Authorization { identity: String, site: String },

    /// Unexpected fault (storage, corrupt rows). Already reported.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KernelError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        KernelError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
        KernelError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether a detail view should fall back to the listing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KernelError::NotFound { .. })
    }

    /// Whether this is a reorder id-set conflict, of blocks or of pages.
    pub fn is_conflict(&self) -> bool {
        matches!(self, KernelError::Conflict(_) | KernelError::PageConflict(_))
    }
}

impl From<rusqlite::Error> for KernelError {
    fn from(e: rusqlite::Error) -> Self {
        crate::fault::report("storage", &e);
        KernelError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(e: serde_json::Error) -> Self {
        crate::fault::report("encode", &e);
        KernelError::Internal(e.to_string())
    }
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
