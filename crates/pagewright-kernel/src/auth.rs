//! Site-scoped access to the kernel.
//!
//! [`ScopedKernel`] wraps the kernel with an [`Identity`] supplied by the
//! session service and checks, before every operation, that the identity is
//! entitled to the site owning the target page or block. Unknown ids report
//! `NotFound` before any entitlement check.

use serde_json::Value;
use tracing::warn;

use pagewright_types::{
    Block, BlockId, BlockKind, Identity, NewPage, Page, PageId, PagePatch, SiteId,
};

use crate::db;
use crate::error::{Entity, KernelError, Result};
use crate::kernel::Kernel;

/// A kernel handle acting on behalf of one identity.
pub struct ScopedKernel<'k> {
    kernel: &'k Kernel,
    identity: Identity,
}

impl<'k> ScopedKernel<'k> {
    pub(crate) fn new(kernel: &'k Kernel, identity: Identity) -> Self {
        Self { kernel, identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    fn authorize(&self, site: SiteId) -> Result<()> {
        if self.identity.can_access(site) {
            return Ok(());
        }
        warn!(identity = %self.identity, site = %site, "site access denied");
        Err(KernelError::Authorization {
            identity: self.identity.to_string(),
            site: site.to_string(),
        })
    }

    fn authorize_page(&self, page_id: PageId) -> Result<()> {
        let site = {
            let db = self.kernel.db().lock();
            let tx = db.transaction()?;
            db::site_of_page(&tx, page_id)?
        };
        let site = site.ok_or_else(|| KernelError::not_found(Entity::Page, page_id))?;
        self.authorize(site)
    }

    fn authorize_block(&self, block_id: BlockId) -> Result<()> {
        let site = {
            let db = self.kernel.db().lock();
            let tx = db.transaction()?;
            db::site_of_block(&tx, block_id)?
        };
        let site = site.ok_or_else(|| KernelError::not_found(Entity::Block, block_id))?;
        self.authorize(site)
    }

    // ── Pages ───────────────────────────────────────────────────────────────

    pub fn create_page(&self, new: NewPage) -> Result<Page> {
        if let Some(site) = new.site_id {
            self.authorize(site)?;
        }
        self.kernel.pages().create(new)
    }

    pub fn get_page(&self, page_id: PageId) -> Result<Page> {
        self.authorize_page(page_id)?;
        self.kernel.pages().get(page_id)
    }

    /// Pages of `site`, or of every site this identity may see.
    pub fn list_pages(&self, site: Option<SiteId>) -> Result<Vec<Page>> {
        if let Some(site) = site {
            self.authorize(site)?;
            return self.kernel.pages().list(Some(site));
        }
        let mut pages = self.kernel.pages().list(None)?;
        pages.retain(|p| self.identity.can_access(p.site_id));
        Ok(pages)
    }

    pub fn update_page(&self, page_id: PageId, patch: PagePatch) -> Result<Page> {
        self.authorize_page(page_id)?;
        self.kernel.pages().update(page_id, patch)
    }

    pub fn delete_page(&self, page_id: PageId) -> Result<Page> {
        self.authorize_page(page_id)?;
        self.kernel.pages().delete(page_id)
    }

    pub fn publish(&self, page_id: PageId) -> Result<Page> {
        self.authorize_page(page_id)?;
        self.kernel.pages().publish(page_id)
    }

    pub fn unpublish(&self, page_id: PageId) -> Result<Page> {
        self.authorize_page(page_id)?;
        self.kernel.pages().unpublish(page_id)
    }

    pub fn duplicate(&self, page_id: PageId) -> Result<Page> {
        self.authorize_page(page_id)?;
        self.kernel.pages().duplicate(page_id)
    }

    pub fn reorder_pages(&self, site: SiteId, ordered: &[PageId]) -> Result<Vec<Page>> {
        self.authorize(site)?;
        self.kernel.pages().reorder_pages(site, ordered)
    }

    // ── Blocks ──────────────────────────────────────────────────────────────

    pub fn list_blocks(&self, page_id: PageId) -> Result<Vec<Block>> {
        self.authorize_page(page_id)?;
        self.kernel.blocks().list_blocks(page_id)
    }

    pub fn get_block(&self, block_id: BlockId) -> Result<Block> {
        self.authorize_block(block_id)?;
        self.kernel.blocks().get_block(block_id)
    }

    pub fn append_block(&self, page_id: PageId, kind: BlockKind, content: &Value) -> Result<Block> {
        self.authorize_page(page_id)?;
        self.kernel.blocks().append_block(page_id, kind, content)
    }

    pub fn append_default_block(&self, page_id: PageId, kind: BlockKind) -> Result<Block> {
        self.authorize_page(page_id)?;
        self.kernel.blocks().append_default_block(page_id, kind)
    }

    pub fn update_block_content(&self, block_id: BlockId, content: &Value) -> Result<Block> {
        self.authorize_block(block_id)?;
        self.kernel.blocks().update_block_content(block_id, content)
    }

    pub fn remove_block(&self, block_id: BlockId) -> Result<Vec<Block>> {
        self.authorize_block(block_id)?;
        self.kernel.blocks().remove_block(block_id)
    }

    // ── Reorder ─────────────────────────────────────────────────────────────

    pub fn reorder(&self, page_id: PageId, ordered: &[BlockId]) -> Result<Vec<Block>> {
        self.authorize_page(page_id)?;
        self.kernel.reorder().reorder(page_id, ordered)
    }
}
