//! The Kernel: authoritative owner of pages and blocks.
//!
//! A kernel owns:
//! - The SQLite database (one connection behind a mutex)
//! - The block content registry
//! - The page event bus
//!
//! and hands out the stores that operate on them. Every store operation is
//! one transaction; the mutex is held for exactly that transaction.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use pagewright_types::Identity;

use crate::auth::ScopedKernel;
use crate::block_store::BlockStore;
use crate::config::{ConfigError, KernelConfig};
use crate::db::{PageDb, SharedDb};
use crate::events::{EventBus, PageEvent};
use crate::pages::PageStore;
use crate::registry::BlockRegistry;
use crate::reorder::ReorderCoordinator;

/// The page composition kernel.
///
/// `Send + Sync`; share it behind an `Arc`.
pub struct Kernel {
    db: SharedDb,
    events: EventBus,
    blocks: BlockStore,
    reorder: ReorderCoordinator,
    pages: PageStore,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("db", &"<locked>")
            .field("registry", self.blocks.registry())
            .finish()
    }
}

impl Kernel {
    /// Open the kernel described by `config`, creating the database file
    /// and its directory if needed.
    pub fn open(config: &KernelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let db = match config.resolved_db_path()? {
            Some(path) => {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                        path: dir.to_path_buf(),
                        source,
                    })?;
                }
                info!(path = %path.display(), "opening page database");
                PageDb::open(&path)?
            }
            None => {
                info!("opening in-memory page database");
                PageDb::in_memory()?
            }
        };
        Ok(Self::with_registry(db, BlockRegistry::builtin(), config))
    }

    /// An in-memory kernel with default settings.
    pub fn in_memory() -> Result<Self, ConfigError> {
        Self::open(&KernelConfig::in_memory())
    }

    /// Assemble a kernel around an open database and a custom registry.
    pub fn with_registry(db: PageDb, registry: BlockRegistry, config: &KernelConfig) -> Self {
        let db: SharedDb = Arc::new(Mutex::new(db));
        let registry = Arc::new(registry);
        let events = EventBus::new(config.event_capacity);
        Self {
            blocks: BlockStore::new(db.clone(), registry, events.clone()),
            reorder: ReorderCoordinator::new(db.clone(), events.clone()),
            pages: PageStore::new(db.clone(), events.clone(), config.duplicate.clone()),
            db,
            events,
        }
    }

    /// Block collections (list, append, update, remove).
    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    /// Whole-page block reordering.
    pub fn reorder(&self) -> &ReorderCoordinator {
        &self.reorder
    }

    /// Page lifecycle.
    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    /// The content registry blocks are validated against.
    pub fn registry(&self) -> &BlockRegistry {
        self.blocks.registry()
    }

    /// Subscribe to committed page changes.
    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    /// A handle that checks `identity`'s site entitlement on every call.
    pub fn scoped(&self, identity: Identity) -> ScopedKernel<'_> {
        ScopedKernel::new(self, identity)
    }

    pub(crate) fn db(&self) -> &SharedDb {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagewright_types::{BlockKind, NewPage, SiteId};

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_kernel_is_send_sync() {
        assert_send_sync::<Kernel>();
    }

    #[test]
    fn test_stores_share_one_database() {
        let kernel = Kernel::in_memory().unwrap();
        let page = kernel
            .pages()
            .create(NewPage::new(SiteId::new(), "Home", "home"))
            .unwrap();
        let block = kernel
            .blocks()
            .append_default_block(page.id, BlockKind::Hero)
            .unwrap();
        let blocks = kernel.reorder().reorder(page.id, &[block.id]).unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn test_open_rejects_invalid_naming() {
        let mut config = KernelConfig::in_memory();
        config.duplicate.slug_suffix = String::new();
        assert!(matches!(
            Kernel::open(&config),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pages.db");
        let kernel = Kernel::open(&KernelConfig::with_db_path(&path)).unwrap();
        kernel
            .pages()
            .create(NewPage::new(SiteId::new(), "Home", "home"))
            .unwrap();
        assert!(path.exists());
    }
}
