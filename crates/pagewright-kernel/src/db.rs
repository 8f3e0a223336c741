//! SQLite persistence for pages and their blocks.
//!
//! One connection, guarded by the kernel's mutex. Every public kernel
//! operation opens exactly one transaction through [`PageDb::transaction`];
//! an uncommitted transaction rolls back when dropped.
//!
//! Block content is stored as its untagged JSON payload next to a `kind`
//! column. Order is a plain integer column: no UNIQUE constraint, because a
//! reorder rewrites every row and passes through duplicate values before it
//! commits.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction};

use pagewright_types::{
    Block, BlockContent, BlockId, BlockKind, Page, PageId, PageStatus, SiteId,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pages (
    id TEXT PRIMARY KEY,
    site_id TEXT NOT NULL,
    slug TEXT NOT NULL,
    title TEXT NOT NULL,
    meta_description TEXT NOT NULL DEFAULT '',
    h1_tag TEXT NOT NULL DEFAULT '',
    use_h1_in_hero INTEGER NOT NULL DEFAULT 0,
    canonical_url TEXT NOT NULL DEFAULT '',
    custom_head_html TEXT NOT NULL DEFAULT '',
    keywords TEXT NOT NULL DEFAULT '',
    lsi_phrases TEXT NOT NULL DEFAULT '',
    nav_order INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'draft',
    published_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (site_id, slug)
);
CREATE INDEX IF NOT EXISTS idx_pages_site ON pages(site_id, nav_order);

CREATE TABLE IF NOT EXISTS blocks (
    id TEXT PRIMARY KEY,
    page_id TEXT NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    order_idx INTEGER NOT NULL,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_blocks_page ON blocks(page_id, order_idx);
"#;

/// Column list matching [`page_from_row`].
pub(crate) const PAGE_COLUMNS: &str = "id, site_id, slug, title, meta_description, h1_tag, \
     use_h1_in_hero, canonical_url, custom_head_html, keywords, lsi_phrases, nav_order, \
     status, published_at, created_at, updated_at";

/// Column list matching [`block_from_row`].
pub(crate) const BLOCK_COLUMNS: &str =
    "id, page_id, kind, order_idx, content, created_at, updated_at";

/// Database handle shared by the stores. Locked for one transaction at a time.
pub type SharedDb = Arc<Mutex<PageDb>>;

/// Database handle for page persistence.
pub struct PageDb {
    conn: Connection,
}

impl PageDb {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Create an in-memory database (for testing and scratch use).
    pub fn in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> rusqlite::Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Begin the transaction for one kernel operation.
    pub fn transaction(&self) -> rusqlite::Result<Transaction<'_>> {
        self.conn.unchecked_transaction()
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn conversion(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn id_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion(idx, e))
}

pub(crate) fn page_from_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    let status: String = row.get(12)?;
    let status = PageStatus::from_str(&status)
        .ok_or_else(|| conversion(12, format!("unknown page status `{status}`")))?;

    Ok(Page {
        id: id_column::<PageId>(row, 0)?,
        site_id: id_column::<SiteId>(row, 1)?,
        slug: row.get(2)?,
        title: row.get(3)?,
        meta_description: row.get(4)?,
        h1_tag: row.get(5)?,
        use_h1_in_hero: row.get(6)?,
        canonical_url: row.get(7)?,
        custom_head_html: row.get(8)?,
        keywords: row.get(9)?,
        lsi_phrases: row.get(10)?,
        nav_order: row.get(11)?,
        status,
        published_at: row.get::<_, Option<i64>>(13)?.map(|t| t as u64),
        created_at: row.get::<_, i64>(14)? as u64,
        updated_at: row.get::<_, i64>(15)? as u64,
    })
}

pub(crate) fn block_from_row(row: &Row<'_>) -> rusqlite::Result<Block> {
    let kind: String = row.get(2)?;
    let kind = BlockKind::from_str(&kind)
        .ok_or_else(|| conversion(2, format!("unknown block kind `{kind}`")))?;

    let raw: String = row.get(4)?;
    let content = serde_json::from_str(&raw)
        .and_then(|value| BlockContent::from_value(kind, value))
        .map_err(|e| conversion(4, e))?;

    Ok(Block {
        id: id_column::<BlockId>(row, 0)?,
        page_id: id_column::<PageId>(row, 1)?,
        order: row.get(3)?,
        content,
        created_at: row.get::<_, i64>(5)? as u64,
        updated_at: row.get::<_, i64>(6)? as u64,
    })
}

// ============================================================================
// Shared queries
// ============================================================================
//
// Used by more than one store. Each takes the caller's connection or
// transaction so it joins the caller's atomic unit.

/// Load a page by id.
pub(crate) fn load_page(conn: &Connection, id: PageId) -> rusqlite::Result<Option<Page>> {
    let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map([id.to_string()], page_from_row)?;
    rows.next().transpose()
}

/// Whether a page exists.
pub(crate) fn page_exists(conn: &Connection, id: PageId) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pages WHERE id = ?1",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Site owning a page.
pub(crate) fn site_of_page(conn: &Connection, id: PageId) -> rusqlite::Result<Option<SiteId>> {
    let mut stmt = conn.prepare("SELECT site_id FROM pages WHERE id = ?1")?;
    let mut rows = stmt.query_map([id.to_string()], |row| id_column::<SiteId>(row, 0))?;
    rows.next().transpose()
}

/// Site owning a block's page.
pub(crate) fn site_of_block(conn: &Connection, id: BlockId) -> rusqlite::Result<Option<SiteId>> {
    let mut stmt = conn.prepare(
        "SELECT p.site_id FROM blocks b JOIN pages p ON p.id = b.page_id WHERE b.id = ?1",
    )?;
    let mut rows = stmt.query_map([id.to_string()], |row| id_column::<SiteId>(row, 0))?;
    rows.next().transpose()
}

/// A page's blocks in render order.
pub(crate) fn load_blocks(conn: &Connection, page: PageId) -> rusqlite::Result<Vec<Block>> {
    let sql = format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE page_id = ?1 ORDER BY order_idx");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([page.to_string()], block_from_row)?;
    rows.collect()
}

/// Insert a block row as-is.
pub(crate) fn insert_block(conn: &Connection, block: &Block) -> rusqlite::Result<()> {
    let content = block
        .content
        .to_value()
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO blocks (id, page_id, kind, order_idx, content, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            block.id.to_string(),
            block.page_id.to_string(),
            block.kind().as_str(),
            block.order,
            content.to_string(),
            block.created_at as i64,
            block.updated_at as i64,
        ],
    )?;
    Ok(())
}

/// Insert a page row as-is.
pub(crate) fn insert_page(conn: &Connection, page: &Page) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO pages (id, site_id, slug, title, meta_description, h1_tag,
                            use_h1_in_hero, canonical_url, custom_head_html, keywords,
                            lsi_phrases, nav_order, status, published_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        rusqlite::params![
            page.id.to_string(),
            page.site_id.to_string(),
            page.slug,
            page.title,
            page.meta_description,
            page.h1_tag,
            page.use_h1_in_hero,
            page.canonical_url,
            page.custom_head_html,
            page.keywords,
            page.lsi_phrases,
            page.nav_order,
            page.status.as_str(),
            page.published_at.map(|t| t as i64),
            page.created_at as i64,
            page.updated_at as i64,
        ],
    )?;
    Ok(())
}
