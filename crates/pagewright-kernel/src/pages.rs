//! Page entity store.
//!
//! Page lifecycle (create, update, publish, unpublish, delete) and the
//! page-level operations that touch blocks: `duplicate` clones the whole
//! block sequence, `delete` takes every block with it through the
//! `ON DELETE CASCADE` foreign key. Both run in one transaction.
//!
//! `reorder_pages` rewrites a site's navigation order the way the reorder
//! coordinator rewrites a page's block order: the submitted id-set must match
//! the site's pages exactly.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};

use pagewright_types::{now_millis, NewPage, Page, PageId, PagePatch, PageStatus, SiteId};

use crate::block_store::clone_blocks;
use crate::config::DuplicateNaming;
use crate::db::{self, SharedDb, PAGE_COLUMNS};
use crate::error::{Entity, KernelError, Result};
use crate::events::{EventBus, PageEvent};
use crate::reorder::diff_id_sets;

/// Longest slug, title or H1, in characters.
pub const MAX_TEXT_LEN: usize = 255;

/// Longest canonical URL, in characters.
pub const MAX_URL_LEN: usize = 500;

fn check_len(field: &'static str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(KernelError::validation(
            field,
            format!("{len} characters, at most {max} allowed"),
        ));
    }
    Ok(())
}

/// Check a slug: lowercase ASCII letters, digits, and inner hyphens.
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() {
        return Err(KernelError::validation("slug", "must not be empty"));
    }
    check_len("slug", slug, MAX_TEXT_LEN)?;
    if let Some(c) = slug
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(KernelError::validation(
            "slug",
            format!("invalid character `{c}`; use a-z, 0-9 and -"),
        ));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(KernelError::validation(
            "slug",
            "must not start or end with a hyphen",
        ));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(KernelError::validation("title", "is required"));
    }
    check_len("title", title, MAX_TEXT_LEN)?;
    Ok(title.to_string())
}

fn validate_h1(h1: &str) -> Result<()> {
    check_len("h1_tag", h1, MAX_TEXT_LEN)
}

fn validate_canonical_url(url: &str) -> Result<()> {
    check_len("canonical_url", url, MAX_URL_LEN)
}

/// Page lifecycle and page-level operations.
#[derive(Clone)]
pub struct PageStore {
    db: SharedDb,
    events: EventBus,
    naming: DuplicateNaming,
}

impl PageStore {
    pub fn new(db: SharedDb, events: EventBus, naming: DuplicateNaming) -> Self {
        Self { db, events, naming }
    }

    /// Create a draft page.
    pub fn create(&self, new: NewPage) -> Result<Page> {
        let site_id = new
            .site_id
            .ok_or_else(|| KernelError::validation("site_id", "is required"))?;
        let title = validate_title(&new.title)?;
        validate_slug(&new.slug)?;
        validate_h1(&new.h1_tag)?;
        validate_canonical_url(&new.canonical_url)?;

        let db = self.db.lock();
        let tx = db.transaction()?;
        ensure_slug_free(&tx, site_id, &new.slug, None)?;

        let now = now_millis();
        let page = Page {
            id: PageId::new(),
            site_id,
            title,
            slug: new.slug,
            status: PageStatus::Draft,
            published_at: None,
            meta_description: new.meta_description,
            h1_tag: new.h1_tag,
            use_h1_in_hero: new.use_h1_in_hero,
            canonical_url: new.canonical_url,
            custom_head_html: new.custom_head_html,
            keywords: new.keywords,
            lsi_phrases: new.lsi_phrases,
            nav_order: new.nav_order,
            created_at: now,
            updated_at: now,
        };
        db::insert_page(&tx, &page)?;
        tx.commit()?;

        debug!(page = %page.id, site = %site_id, slug = %page.slug, "page created");
        self.events.emit(PageEvent::Created { page: page.clone() });
        Ok(page)
    }

    /// A page by id.
    pub fn get(&self, page_id: PageId) -> Result<Page> {
        let db = self.db.lock();
        let tx = db.transaction()?;
        let page = require(&tx, page_id)?;
        tx.commit()?;
        Ok(page)
    }

    /// Pages, optionally limited to one site.
    ///
    /// Ordered by site, then navigation order, newest first within a slot.
    pub fn list(&self, site: Option<SiteId>) -> Result<Vec<Page>> {
        let db = self.db.lock();
        let tx = db.transaction()?;
        let pages = list_pages(&tx, site)?;
        tx.commit()?;
        Ok(pages)
    }

    /// Apply a metadata patch. An empty patch returns the page unchanged.
    pub fn update(&self, page_id: PageId, patch: PagePatch) -> Result<Page> {
        let mut patch = patch;
        if let Some(title) = &patch.title {
            patch.title = Some(validate_title(title)?);
        }
        if let Some(slug) = &patch.slug {
            validate_slug(slug)?;
        }
        if let Some(h1) = &patch.h1_tag {
            validate_h1(h1)?;
        }
        if let Some(url) = &patch.canonical_url {
            validate_canonical_url(url)?;
        }

        let db = self.db.lock();
        let tx = db.transaction()?;
        let mut page = require(&tx, page_id)?;
        if patch.is_empty() {
            return Ok(page);
        }
        if let Some(slug) = &patch.slug {
            ensure_slug_free(&tx, page.site_id, slug, Some(page_id))?;
        }

        patch.apply_to(&mut page);
        page.updated_at = now_millis();
        tx.execute(
            "UPDATE pages SET title = ?1, slug = ?2, meta_description = ?3, h1_tag = ?4,
                              use_h1_in_hero = ?5, canonical_url = ?6, custom_head_html = ?7,
                              keywords = ?8, lsi_phrases = ?9, nav_order = ?10, updated_at = ?11
             WHERE id = ?12",
            rusqlite::params![
                page.title,
                page.slug,
                page.meta_description,
                page.h1_tag,
                page.use_h1_in_hero,
                page.canonical_url,
                page.custom_head_html,
                page.keywords,
                page.lsi_phrases,
                page.nav_order,
                page.updated_at as i64,
                page_id.to_string(),
            ],
        )?;
        tx.commit()?;

        debug!(page = %page_id, "page updated");
        self.events.emit(PageEvent::Updated { page: page.clone() });
        Ok(page)
    }

    /// Delete a page and all of its blocks.
    pub fn delete(&self, page_id: PageId) -> Result<Page> {
        let db = self.db.lock();
        let tx = db.transaction()?;
        let page = require(&tx, page_id)?;
        let blocks: i64 = tx.query_row(
            "SELECT COUNT(*) FROM blocks WHERE page_id = ?1",
            [page_id.to_string()],
            |row| row.get(0),
        )?;
        tx.execute("DELETE FROM pages WHERE id = ?1", [page_id.to_string()])?;
        tx.commit()?;

        debug!(page = %page_id, blocks, "page deleted");
        self.events.emit(PageEvent::Deleted {
            page_id,
            site_id: page.site_id,
        });
        Ok(page)
    }

    /// Publish a page. Publishing a published page changes nothing.
    pub fn publish(&self, page_id: PageId) -> Result<Page> {
        self.set_status(page_id, PageStatus::Published)
    }

    /// Return a page to draft. Unpublishing a draft changes nothing.
    pub fn unpublish(&self, page_id: PageId) -> Result<Page> {
        self.set_status(page_id, PageStatus::Draft)
    }

    fn set_status(&self, page_id: PageId, status: PageStatus) -> Result<Page> {
        let db = self.db.lock();
        let tx = db.transaction()?;
        let mut page = require(&tx, page_id)?;
        if page.status == status {
            return Ok(page);
        }

        let now = now_millis();
        page.status = status;
        page.published_at = match status {
            PageStatus::Published => Some(now),
            PageStatus::Draft => None,
        };
        page.updated_at = now;
        tx.execute(
            "UPDATE pages SET status = ?1, published_at = ?2, updated_at = ?3 WHERE id = ?4",
            rusqlite::params![
                status.as_str(),
                page.published_at.map(|t| t as i64),
                now as i64,
                page_id.to_string(),
            ],
        )?;
        tx.commit()?;

        debug!(page = %page_id, %status, "page status changed");
        self.events.emit(match status {
            PageStatus::Published => PageEvent::Published { page: page.clone() },
            PageStatus::Draft => PageEvent::Unpublished { page: page.clone() },
        });
        Ok(page)
    }

    /// Copy a page and its blocks into a new draft on the same site.
    ///
    /// Blocks get fresh ids and keep kind, content, and order. The copy sits
    /// one navigation slot after its source.
    pub fn duplicate(&self, page_id: PageId) -> Result<Page> {
        let db = self.db.lock();
        let tx = db.transaction()?;
        let source = require(&tx, page_id)?;
        let slug = self.free_copy_slug(&tx, &source)?;
        let title = validate_title(&format!("{}{}", source.title, self.naming.title_suffix))?;

        let now = now_millis();
        let copy = Page {
            id: PageId::new(),
            site_id: source.site_id,
            title,
            slug,
            status: PageStatus::Draft,
            published_at: None,
            meta_description: source.meta_description.clone(),
            h1_tag: source.h1_tag.clone(),
            use_h1_in_hero: source.use_h1_in_hero,
            canonical_url: source.canonical_url.clone(),
            custom_head_html: source.custom_head_html.clone(),
            keywords: source.keywords.clone(),
            lsi_phrases: source.lsi_phrases.clone(),
            nav_order: source.nav_order.saturating_add(1),
            created_at: now,
            updated_at: now,
        };
        db::insert_page(&tx, &copy)?;
        let blocks = clone_blocks(&tx, source.id, copy.id)?;
        tx.commit()?;

        debug!(source = %page_id, page = %copy.id, slug = %copy.slug, blocks, "page duplicated");
        self.events.emit(PageEvent::Created { page: copy.clone() });
        Ok(copy)
    }

    /// `<slug>-copy`, then `<slug>-copy-2`, `<slug>-copy-3`, ...
    fn free_copy_slug(&self, conn: &Connection, source: &Page) -> Result<String> {
        let base = format!("{}-{}", source.slug, self.naming.slug_suffix);
        validate_slug(&base)?;
        if !slug_taken(conn, source.site_id, &base, None)? {
            return Ok(base);
        }
        let mut n = 2u32;
        loop {
            let candidate = format!("{base}-{n}");
            validate_slug(&candidate)?;
            if !slug_taken(conn, source.site_id, &candidate, None)? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Set a site's navigation order to `ordered`, top to bottom.
    ///
    /// `ordered` must hold every page of the site exactly once; otherwise the
    /// request fails with [`KernelError::PageConflict`] and nothing is
    /// written. Pages get `nav_order` `0..N`; only pages whose slot changed
    /// are touched. Returns the site's pages in their new order.
    pub fn reorder_pages(&self, site_id: SiteId, ordered: &[PageId]) -> Result<Vec<Page>> {
        let db = self.db.lock();
        let tx = db.transaction()?;

        let current = site_page_ids(&tx, site_id)?;
        let conflict = diff_id_sets(&current, ordered);
        if !conflict.is_empty() {
            warn!(
                site = %site_id,
                missing = conflict.missing.len(),
                foreign = conflict.foreign.len(),
                duplicated = conflict.duplicated.len(),
                "stale page reorder rejected"
            );
            return Err(conflict.into());
        }

        let now = now_millis() as i64;
        let mut moved = Vec::new();
        {
            let mut stmt = tx.prepare(
                "UPDATE pages SET nav_order = ?1, updated_at = ?2
                 WHERE id = ?3 AND site_id = ?4 AND nav_order != ?1",
            )?;
            let site = site_id.to_string();
            for (idx, id) in ordered.iter().enumerate() {
                if stmt.execute(rusqlite::params![idx as i64, now, id.to_string(), site])? > 0 {
                    moved.push(*id);
                }
            }
        }
        let pages = list_pages(&tx, Some(site_id))?;
        tx.commit()?;

        debug!(site = %site_id, pages = pages.len(), moved = moved.len(), "pages reordered");
        for page in pages.iter().filter(|p| moved.contains(&p.id)) {
            self.events.emit(PageEvent::Updated { page: page.clone() });
        }
        Ok(pages)
    }
}

// ============================================================================
// Transaction helpers
// ============================================================================

fn require(conn: &Connection, page_id: PageId) -> Result<Page> {
    db::load_page(conn, page_id)?.ok_or_else(|| KernelError::not_found(Entity::Page, page_id))
}

fn site_page_ids(conn: &Connection, site_id: SiteId) -> Result<Vec<PageId>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM pages WHERE site_id = ?1 ORDER BY nav_order, created_at DESC",
    )?;
    let rows = stmt.query_map([site_id.to_string()], |row| row.get::<_, String>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        let text = row?;
        let id = PageId::parse(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        ids.push(id);
    }
    Ok(ids)
}

fn slug_taken(
    conn: &Connection,
    site_id: SiteId,
    slug: &str,
    except: Option<PageId>,
) -> Result<bool> {
    let owner: Option<String> = conn
        .query_row(
            "SELECT id FROM pages WHERE site_id = ?1 AND slug = ?2",
            [site_id.to_string(), slug.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match (owner, except) {
        (None, _) => false,
        (Some(owner), Some(except)) => owner != except.to_string(),
        (Some(_), None) => true,
    })
}

fn ensure_slug_free(
    conn: &Connection,
    site_id: SiteId,
    slug: &str,
    except: Option<PageId>,
) -> Result<()> {
    if slug_taken(conn, site_id, slug, except)? {
        return Err(KernelError::validation(
            "slug",
            format!("`{slug}` is already used on this site"),
        ));
    }
    Ok(())
}

fn list_pages(conn: &Connection, site: Option<SiteId>) -> Result<Vec<Page>> {
    let pages = match site {
        Some(site) => {
            let sql = format!(
                "SELECT {PAGE_COLUMNS} FROM pages WHERE site_id = ?1
                 ORDER BY nav_order, created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([site.to_string()], db::page_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let sql = format!(
                "SELECT {PAGE_COLUMNS} FROM pages ORDER BY site_id, nav_order, created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], db::page_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(pages)
}
