//! # pagewright-kernel
//!
//! Authoritative store for block-based pages.
//!
//! Each page owns an ordered sequence of typed content blocks. The kernel
//! keeps that sequence dense (orders `0..N`), validates every block's
//! content against its kind, and commits reorders only when the caller's
//! view of the page is current.
//!
//! Components, leaves first:
//! - [`BlockRegistry`]: kind → schema, validation, defaults
//! - [`BlockStore`]: list, append, update, remove (with compaction)
//! - [`ReorderCoordinator`]: set-checked whole-page permutations
//! - [`PageStore`]: page lifecycle, duplicate, cascade delete
//!
//! [`Kernel`] wires them to one database and one event bus;
//! [`Kernel::scoped`] adds per-site authorization.

pub mod auth;
pub mod block_store;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod fault;
pub mod kernel;
pub mod pages;
pub mod registry;
pub mod reorder;

pub use auth::ScopedKernel;
pub use block_store::BlockStore;
pub use config::{ConfigError, DuplicateNaming, KernelConfig};
pub use db::{PageDb, SharedDb};
pub use error::{Entity, KernelError, ReorderConflict, Result, SchemaError};
pub use events::{EventBus, PageEvent};
pub use kernel::Kernel;
pub use pages::{validate_slug, PageStore};
pub use registry::{BlockRegistry, BlockSchema, TypedSchema};
pub use reorder::ReorderCoordinator;
