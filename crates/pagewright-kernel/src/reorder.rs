//! Reorder coordinator.
//!
//! `reorder` is the only way to change block order besides append and
//! remove. The caller submits the page's complete id-set in the wanted
//! top-to-bottom order. The submitted set is checked against the set stored
//! at commit time; any difference (a block deleted or added since the caller
//! last listed, a duplicated id) rejects the whole request and nothing is
//! written.

use std::collections::HashSet;
use std::hash::Hash;

use tracing::{debug, warn};

use pagewright_types::{now_millis, Block, BlockId, PageId};

use crate::block_store::require_page;
use crate::db::{self, SharedDb};
use crate::error::{ReorderConflict, Result};
use crate::events::{EventBus, PageEvent};

/// Commits whole-page permutations.
#[derive(Clone)]
pub struct ReorderCoordinator {
    db: SharedDb,
    events: EventBus,
}

impl ReorderCoordinator {
    pub fn new(db: SharedDb, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Apply `ordered` as the page's new block order.
    ///
    /// Returns the committed sequence.
    pub fn reorder(&self, page_id: PageId, ordered: &[BlockId]) -> Result<Vec<Block>> {
        let db = self.db.lock();
        let tx = db.transaction()?;
        require_page(&tx, page_id)?;

        let current = current_ids(&tx, page_id)?;
        let conflict = diff_id_sets(&current, ordered);
        if !conflict.is_empty() {
            warn!(
                page = %page_id,
                missing = conflict.missing.len(),
                foreign = conflict.foreign.len(),
                duplicated = conflict.duplicated.len(),
                "stale reorder rejected"
            );
            return Err(conflict.into());
        }

        let now = now_millis() as i64;
        let mut moved = 0usize;
        {
            let mut stmt = tx.prepare(
                "UPDATE blocks SET order_idx = ?1, updated_at = ?2
                 WHERE id = ?3 AND page_id = ?4 AND order_idx != ?1",
            )?;
            let page = page_id.to_string();
            for (idx, id) in ordered.iter().enumerate() {
                moved += stmt.execute(rusqlite::params![idx as u32, now, id.to_string(), page])?;
            }
        }
        let blocks = db::load_blocks(&tx, page_id)?;
        tx.commit()?;

        debug!(page = %page_id, blocks = blocks.len(), moved, "blocks reordered");
        self.events.emit(PageEvent::Reordered {
            page_id,
            order: ordered.to_vec(),
        });
        Ok(blocks)
    }
}

fn current_ids(conn: &rusqlite::Connection, page_id: PageId) -> Result<Vec<BlockId>> {
    let mut stmt = conn.prepare("SELECT id FROM blocks WHERE page_id = ?1 ORDER BY order_idx")?;
    let rows = stmt.query_map([page_id.to_string()], |row| row.get::<_, String>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        let text = row?;
        let id = BlockId::parse(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        ids.push(id);
    }
    Ok(ids)
}

/// Compare a requested order against the stored id-set.
///
/// Each list keeps first-seen order and holds each id once.
pub(crate) fn diff_id_sets<Id>(current: &[Id], requested: &[Id]) -> ReorderConflict<Id>
where
    Id: Copy + Eq + Hash,
{
    let current_set: HashSet<Id> = current.iter().copied().collect();
    let mut seen = HashSet::with_capacity(requested.len());
    let mut conflict = ReorderConflict::default();

    for id in requested {
        if !seen.insert(*id) {
            if !conflict.duplicated.contains(id) {
                conflict.duplicated.push(*id);
            }
        } else if !current_set.contains(id) {
            conflict.foreign.push(*id);
        }
    }
    conflict.missing = current
        .iter()
        .filter(|id| !seen.contains(*id))
        .copied()
        .collect();
    conflict
}
