//! Block collection manager.
//!
//! Owns the ordered blocks of every page. Content goes through the
//! [`BlockRegistry`] before it reaches storage; order values are assigned
//! here on append and compacted here on removal, so for a page with N blocks
//! the stored orders are always exactly `0..N`.
//!
//! Each method is one transaction. Reordering lives in
//! [`crate::reorder::ReorderCoordinator`].

use std::sync::Arc;

use rusqlite::Connection;
use serde_json::Value;
use tracing::debug;

use pagewright_types::{now_millis, Block, BlockContent, BlockId, BlockKind, PageId};

use crate::db::{self, SharedDb, BLOCK_COLUMNS};
use crate::error::{Entity, KernelError, Result, SchemaError};
use crate::events::{EventBus, PageEvent};
use crate::registry::BlockRegistry;

/// Ordered block collections, one per page.
#[derive(Clone)]
pub struct BlockStore {
    db: SharedDb,
    registry: Arc<BlockRegistry>,
    events: EventBus,
}

impl BlockStore {
    pub fn new(db: SharedDb, registry: Arc<BlockRegistry>, events: EventBus) -> Self {
        Self {
            db,
            registry,
            events,
        }
    }

    /// The registry used for validation.
    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Blocks of a page in render order.
    pub fn list_blocks(&self, page_id: PageId) -> Result<Vec<Block>> {
        let db = self.db.lock();
        let tx = db.transaction()?;
        require_page(&tx, page_id)?;
        let blocks = db::load_blocks(&tx, page_id)?;
        tx.commit()?;
        Ok(blocks)
    }

    /// A single block.
    pub fn get_block(&self, block_id: BlockId) -> Result<Block> {
        let db = self.db.lock();
        let tx = db.transaction()?;
        let block = load_block(&tx, block_id)?;
        tx.commit()?;
        Ok(block)
    }

    /// Append a block with raw JSON content, validated for `kind`.
    pub fn append_block(&self, page_id: PageId, kind: BlockKind, content: &Value) -> Result<Block> {
        let content = self.registry.validate(kind, content)?;
        self.insert(page_id, content)
    }

    /// Append a block with typed content. The variant must match `kind`.
    pub fn append_content(
        &self,
        page_id: PageId,
        kind: BlockKind,
        content: BlockContent,
    ) -> Result<Block> {
        let content = self.registry.validate_typed(kind, content)?;
        self.insert(page_id, content)
    }

    /// Append a block showing the kind's default content.
    pub fn append_default_block(&self, page_id: PageId, kind: BlockKind) -> Result<Block> {
        let content = self.registry.default_content(kind)?;
        self.insert(page_id, content)
    }

    fn insert(&self, page_id: PageId, content: BlockContent) -> Result<Block> {
        let db = self.db.lock();
        let tx = db.transaction()?;
        require_page(&tx, page_id)?;

        let order: u32 = tx.query_row(
            "SELECT COALESCE(MAX(order_idx) + 1, 0) FROM blocks WHERE page_id = ?1",
            [page_id.to_string()],
            |row| row.get(0),
        )?;
        let now = now_millis();
        let block = Block {
            id: BlockId::new(),
            page_id,
            order,
            content,
            created_at: now,
            updated_at: now,
        };
        db::insert_block(&tx, &block)?;
        tx.commit()?;

        debug!(page = %page_id, block = %block.id, kind = %block.kind(), order, "block appended");
        self.events.emit(PageEvent::BlockAdded {
            page_id,
            block_id: block.id,
            kind: block.kind(),
            order,
        });
        Ok(block)
    }

    /// Replace a block's content, validated against its existing kind.
    pub fn update_block_content(&self, block_id: BlockId, content: &Value) -> Result<Block> {
        self.replace(block_id, |registry, kind| registry.validate(kind, content))
    }

    /// Replace a block's content with typed content of the same kind.
    pub fn update_block_typed(&self, block_id: BlockId, content: BlockContent) -> Result<Block> {
        self.replace(block_id, move |registry, kind| {
            registry.validate_typed(kind, content)
        })
    }

    fn replace<F>(&self, block_id: BlockId, validate: F) -> Result<Block>
    where
        F: FnOnce(&BlockRegistry, BlockKind) -> std::result::Result<BlockContent, SchemaError>,
    {
        let db = self.db.lock();
        let tx = db.transaction()?;
        let mut block = load_block(&tx, block_id)?;
        block.content = validate(self.registry.as_ref(), block.kind())?;
        block.updated_at = now_millis();

        tx.execute(
            "UPDATE blocks SET content = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![
                block.content.to_value()?.to_string(),
                block.updated_at as i64,
                block_id.to_string(),
            ],
        )?;
        tx.commit()?;

        debug!(page = %block.page_id, block = %block_id, "block content replaced");
        self.events.emit(PageEvent::BlockUpdated {
            page_id: block.page_id,
            block_id,
        });
        Ok(block)
    }

    /// Delete a block and close the gap it leaves.
    ///
    /// Returns the page's remaining blocks in render order.
    pub fn remove_block(&self, block_id: BlockId) -> Result<Vec<Block>> {
        let db = self.db.lock();
        let tx = db.transaction()?;
        let removed = load_block(&tx, block_id)?;

        tx.execute("DELETE FROM blocks WHERE id = ?1", [block_id.to_string()])?;
        let shifted = tx.execute(
            "UPDATE blocks SET order_idx = order_idx - 1
             WHERE page_id = ?1 AND order_idx > ?2",
            rusqlite::params![removed.page_id.to_string(), removed.order],
        )?;
        let remaining = db::load_blocks(&tx, removed.page_id)?;
        tx.commit()?;

        debug!(
            page = %removed.page_id,
            block = %block_id,
            order = removed.order,
            shifted,
            "block removed"
        );
        self.events.emit(PageEvent::BlockRemoved {
            page_id: removed.page_id,
            block_id,
        });
        Ok(remaining)
    }
}

// ============================================================================
// Transaction helpers
// ============================================================================

pub(crate) fn require_page(conn: &Connection, page_id: PageId) -> Result<()> {
    if db::page_exists(conn, page_id)? {
        Ok(())
    } else {
        Err(KernelError::not_found(Entity::Page, page_id))
    }
}

fn load_block(conn: &Connection, block_id: BlockId) -> Result<Block> {
    let sql = format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map([block_id.to_string()], db::block_from_row)?;
    match rows.next().transpose()? {
        Some(block) => Ok(block),
        None => Err(KernelError::not_found(Entity::Block, block_id)),
    }
}

/// Copy every block of `source` onto `target` with fresh ids.
///
/// Kind, content, and order are kept as-is. Runs inside the caller's
/// transaction.
pub(crate) fn clone_blocks(conn: &Connection, source: PageId, target: PageId) -> Result<usize> {
    let now = now_millis();
    let blocks = db::load_blocks(conn, source)?;
    for block in &blocks {
        let copy = Block {
            id: BlockId::new(),
            page_id: target,
            order: block.order,
            content: block.content.clone(),
            created_at: now,
            updated_at: now,
        };
        db::insert_block(conn, &copy)?;
    }
    Ok(blocks.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PageDb;
    use pagewright_types::{now_millis, Page, PageStatus, SiteId, TextContent};
    use parking_lot::Mutex;
    use serde_json::json;

    fn setup() -> (BlockStore, PageId) {
        let db = PageDb::in_memory().unwrap();
        let now = now_millis();
        let page = Page {
            id: PageId::new(),
            site_id: SiteId::new(),
            title: "Home".into(),
            slug: "home".into(),
            status: PageStatus::Draft,
            published_at: None,
            meta_description: String::new(),
            h1_tag: String::new(),
            use_h1_in_hero: false,
            canonical_url: String::new(),
            custom_head_html: String::new(),
            keywords: String::new(),
            lsi_phrases: String::new(),
            nav_order: 0,
            created_at: now,
            updated_at: now,
        };
        {
            let tx = db.transaction().unwrap();
            db::insert_page(&tx, &page).unwrap();
            tx.commit().unwrap();
        }
        let store = BlockStore::new(
            Arc::new(Mutex::new(db)),
            Arc::new(BlockRegistry::builtin()),
            EventBus::default(),
        );
        (store, page.id)
    }

    fn orders(blocks: &[Block]) -> Vec<u32> {
        blocks.iter().map(|b| b.order).collect()
    }

    #[test]
    fn test_append_assigns_dense_order() {
        let (store, page) = setup();
        for kind in [BlockKind::Hero, BlockKind::Text, BlockKind::Image] {
            store.append_default_block(page, kind).unwrap();
        }
        let blocks = store.list_blocks(page).unwrap();
        assert_eq!(orders(&blocks), vec![0, 1, 2]);
        assert_eq!(blocks[1].kind(), BlockKind::Text);
    }

    #[test]
    fn test_append_text_on_empty_page_resolves_defaults() {
        let (store, page) = setup();
        let block = store
            .append_block(page, BlockKind::Text, &json!({"title": "x"}))
            .unwrap();
        assert_eq!(block.order, 0);
        assert_eq!(
            block.content,
            BlockContent::Text(TextContent {
                title: Some("x".into()),
                ..TextContent::default()
            })
        );
    }

    #[test]
    fn test_append_to_unknown_page() {
        let (store, _) = setup();
        let err = store
            .append_default_block(PageId::new(), BlockKind::Hero)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_append_rejects_invalid_content() {
        let (store, page) = setup();
        let err = store
            .append_block(page, BlockKind::Image, &json!({"slides": []}))
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::Schema(SchemaError::ForeignShape { .. })
        ));
        assert!(store.list_blocks(page).unwrap().is_empty());
    }

    #[test]
    fn test_remove_compacts_following_blocks() {
        let (store, page) = setup();
        let a = store.append_default_block(page, BlockKind::Hero).unwrap();
        let b = store.append_default_block(page, BlockKind::Text).unwrap();
        let c = store.append_default_block(page, BlockKind::Image).unwrap();

        let remaining = store.remove_block(b.id).unwrap();
        let ids: Vec<_> = remaining.iter().map(|blk| blk.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert_eq!(orders(&remaining), vec![0, 1]);
        assert!(store.get_block(b.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_keeps_kind_and_order() {
        let (store, page) = setup();
        store.append_default_block(page, BlockKind::Hero).unwrap();
        let text = store.append_default_block(page, BlockKind::Text).unwrap();

        let updated = store
            .update_block_content(text.id, &json!({"body": "new", "alignment": "right"}))
            .unwrap();
        assert_eq!(updated.order, 1);
        assert_eq!(updated.kind(), BlockKind::Text);
        assert_eq!(store.get_block(text.id).unwrap().content, updated.content);

        // Full replace: omitted title falls back to the default, not the old value.
        let BlockContent::Text(content) = updated.content else {
            panic!("expected text");
        };
        assert_eq!(content.title.as_deref(), Some("Section Title"));
    }

    #[test]
    fn test_update_cannot_change_kind() {
        let (store, page) = setup();
        let hero = store.append_default_block(page, BlockKind::Hero).unwrap();
        let err = store
            .update_block_typed(hero.id, BlockContent::default_for(BlockKind::Gallery))
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::Schema(SchemaError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_events_follow_commits() {
        let (store, page) = setup();
        let mut rx = store.events.subscribe();
        let block = store.append_default_block(page, BlockKind::Gallery).unwrap();
        store.remove_block(block.id).unwrap();

        assert!(matches!(rx.try_recv().unwrap(), PageEvent::BlockAdded { order: 0, .. }));
        assert!(matches!(rx.try_recv().unwrap(), PageEvent::BlockRemoved { .. }));
    }
}
