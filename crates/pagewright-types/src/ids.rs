//! Typed identifiers for sites, pages, blocks, and principals.
//!
//! All ID types wrap UUIDv7 (time-ordered, globally unique). They display as
//! standard UUID text for logging and storage. The `short()` form (first 8 hex
//! chars) is for human-facing output only, never used as a lookup key.
//!
//! `PrincipalId` also has a deterministic sentinel via `PrincipalId::system()`,
//! derived from UUIDv5, for the local operator identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A site identifier (UUIDv7). Sites themselves live in an external service.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(uuid::Uuid);

/// A page identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(uuid::Uuid);

/// A block identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(uuid::Uuid);

/// A principal identifier (UUIDv7, or UUIDv5 for sentinels).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(uuid::Uuid);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters, for human display only, not lookup.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Full 32-character hex string (no hyphens).
            pub fn to_hex(&self) -> String {
                self.0.as_simple().to_string()
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }

            /// A nil / zero ID, for sentinel values only.
            pub fn nil() -> Self {
                Self(uuid::Uuid::nil())
            }

            /// Check if this is the nil ID.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> uuid::Uuid {
                id.0
            }
        }

        impl FromStr for $T {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full UUID with hyphens; this is also the storage form
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(SiteId, "SiteId");
impl_typed_id!(PageId, "PageId");
impl_typed_id!(BlockId, "BlockId");
impl_typed_id!(PrincipalId, "PrincipalId");

// ── PrincipalId sentinels ───────────────────────────────────────────────────

/// Fixed namespace for deriving deterministic PrincipalIds via UUIDv5.
const PAGEWRIGHT_PRINCIPAL_NS: uuid::Uuid =
    uuid::uuid!("3f6c2a9e-58d1-4b7a-9e0c-7d2b41a6f583");

impl PrincipalId {
    /// The well-known "system" principal.
    ///
    /// Used for the local operator (CLI, maintenance jobs).
    /// Deterministic: same value every time (UUIDv5 derived from `b"system"`).
    pub fn system() -> Self {
        Self(uuid::Uuid::new_v5(&PAGEWRIGHT_PRINCIPAL_NS, b"system"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_unique() {
        let a = PageId::new();
        let b = PageId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_is_8_chars() {
        let id = BlockId::new();
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_parse_hex_and_uuid_format() {
        let id = PageId::new();
        assert_eq!(PageId::parse(&id.to_hex()).unwrap(), id);
        assert_eq!(PageId::parse(&id.to_string()).unwrap(), id);
        assert_eq!(id.to_string().parse::<PageId>().unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(BlockId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_nil() {
        let id = SiteId::nil();
        assert!(id.is_nil());
        assert!(!SiteId::new().is_nil());
    }

    #[test]
    fn test_ordering_is_time_ordered() {
        let a = BlockId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = BlockId::new();
        assert!(a < b);
    }

    #[test]
    fn test_system_principal_is_deterministic() {
        assert_eq!(PrincipalId::system(), PrincipalId::system());
        assert_ne!(PrincipalId::system(), PrincipalId::new());
    }

    #[test]
    fn test_debug_uses_short_form() {
        let id = PageId::new();
        assert_eq!(format!("{:?}", id), format!("PageId({})", id.short()));
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = SiteId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: SiteId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
