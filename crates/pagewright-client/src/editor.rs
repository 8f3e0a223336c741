//! Async driver for the client mirror.
//!
//! [`PageEditor`] owns a [`MirrorState`] and a backend. It feeds events into
//! the state machine and runs the effects that come back. Moves can be
//! driven in one call (`move_up`, `move_down`, `move_to`, `permute`) or split
//! into `begin_*` and [`PageEditor::complete`] when the caller wants several
//! requests in flight at once.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use pagewright_types::{Block, BlockId, BlockKind, PageId};

use crate::backend::{ClientError, PageBackend};
use crate::mirror::{
    self, Direction, Effect, IdSnapshot, MirrorEvent, MirrorState, Notice, Ticket, Transition,
};

/// A reorder that has been applied locally and still needs submitting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingReorder {
    pub page_id: PageId,
    pub ticket: Ticket,
    pub snapshot: IdSnapshot,
    pub order: Vec<BlockId>,
}

/// Editing session for one page at a time.
pub struct PageEditor<B: PageBackend> {
    backend: Arc<B>,
    state: MirrorState,
}

impl<B: PageBackend> PageEditor<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            state: MirrorState::default(),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn state(&self) -> &MirrorState {
        &self.state
    }

    /// Blocks as the user should see them.
    pub fn blocks(&self) -> &[Block] {
        self.state.displayed()
    }

    fn step(&mut self, event: MirrorEvent) -> (Option<Effect>, Option<Notice>) {
        let state = std::mem::take(&mut self.state);
        let Transition {
            state,
            effect,
            notice,
        } = state.apply(event);
        self.state = state;
        (effect, notice)
    }

    fn current_page(&self) -> Result<PageId, ClientError> {
        self.state
            .page_id()
            .ok_or_else(|| ClientError::InvalidMove("no page open".into()))
    }

    /// Load a page's authoritative sequence.
    pub async fn open(&mut self, page_id: PageId) -> Result<&[Block], ClientError> {
        let blocks = self.backend.list_blocks(page_id).await?;
        debug!(page = %page_id, blocks = blocks.len(), "page opened");
        self.step(MirrorEvent::Loaded { page_id, blocks });
        Ok(self.blocks())
    }

    /// Re-read the open page.
    pub async fn refresh(&mut self) -> Result<&[Block], ClientError> {
        let page_id = self.current_page()?;
        self.open(page_id).await
    }

    /// Leave the page. In-flight requests keep running; their answers are
    /// dropped.
    pub fn abandon(&mut self) {
        self.step(MirrorEvent::Abandoned);
    }

    // ── Split-phase moves ───────────────────────────────────────────────────

    /// Apply `order` locally. `None` when it matches what is shown already.
    pub fn begin_permute(
        &mut self,
        order: Vec<BlockId>,
    ) -> Result<Option<PendingReorder>, ClientError> {
        match self.step(MirrorEvent::Permute { order }) {
            (
                Some(Effect::Reorder {
                    page_id,
                    ticket,
                    snapshot,
                    order,
                }),
                _,
            ) => Ok(Some(PendingReorder {
                page_id,
                ticket,
                snapshot,
                order,
            })),
            (_, Some(Notice::InvalidMove { reason })) => Err(ClientError::InvalidMove(reason)),
            _ => Ok(None),
        }
    }

    /// Swap `block` with its neighbour. `None` at the edge.
    pub fn begin_swap(
        &mut self,
        block: BlockId,
        direction: Direction,
    ) -> Result<Option<PendingReorder>, ClientError> {
        match mirror::swap_adjacent(&self.state.displayed_ids(), block, direction) {
            Some(order) => self.begin_permute(order),
            None if self.state.displayed().iter().any(|b| b.id == block) => Ok(None),
            None => Err(ClientError::InvalidMove(format!("{block:?} is not on this page"))),
        }
    }

    /// Move `block` to position `to`.
    pub fn begin_move_to(
        &mut self,
        block: BlockId,
        to: usize,
    ) -> Result<Option<PendingReorder>, ClientError> {
        match mirror::move_to(&self.state.displayed_ids(), block, to) {
            Some(order) => self.begin_permute(order),
            None => Err(ClientError::InvalidMove(format!("{block:?} is not on this page"))),
        }
    }

    /// Submit a pending reorder. Does not touch local state.
    pub async fn submit(&self, pending: &PendingReorder) -> Result<Vec<Block>, ClientError> {
        self.backend
            .reorder(pending.page_id, pending.order.clone())
            .await
    }

    /// Feed a reorder's outcome back into the mirror.
    ///
    /// A failure of the latest request rolls the order back, refetches, and
    /// is returned as the error. A superseded success refetches when its
    /// committed order differs from the confirmed one; other superseded
    /// outcomes are dropped.
    pub async fn complete(
        &mut self,
        pending: PendingReorder,
        result: Result<Vec<Block>, ClientError>,
    ) -> Result<(), ClientError> {
        let event = match result {
            Ok(blocks) => MirrorEvent::ReorderSucceeded {
                ticket: pending.ticket,
                snapshot: pending.snapshot,
                blocks,
            },
            Err(error) => MirrorEvent::ReorderFailed {
                ticket: pending.ticket,
                snapshot: pending.snapshot,
                error,
            },
        };

        let (effect, notice) = self.step(event);
        if let Some(Effect::Refetch { page_id }) = effect {
            match self.backend.list_blocks(page_id).await {
                Ok(blocks) => {
                    self.step(MirrorEvent::Loaded { page_id, blocks });
                }
                Err(e) => warn!(page = %page_id, error = %e, "refetch after reorder"),
            }
        }

        match notice {
            Some(Notice::Failed(error)) => {
                warn!(ticket = %pending.ticket, error = %error, "reorder failed, order restored");
                Err(error)
            }
            Some(Notice::Stale { ticket }) => {
                debug!(%ticket, "stale reorder response ignored");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn drive(&mut self, pending: Option<PendingReorder>) -> Result<(), ClientError> {
        let Some(pending) = pending else {
            return Ok(());
        };
        let result = self.submit(&pending).await;
        self.complete(pending, result).await
    }

    // ── One-shot moves ──────────────────────────────────────────────────────

    pub async fn permute(&mut self, order: Vec<BlockId>) -> Result<(), ClientError> {
        let pending = self.begin_permute(order)?;
        self.drive(pending).await
    }

    pub async fn move_up(&mut self, block: BlockId) -> Result<(), ClientError> {
        let pending = self.begin_swap(block, Direction::Up)?;
        self.drive(pending).await
    }

    pub async fn move_down(&mut self, block: BlockId) -> Result<(), ClientError> {
        let pending = self.begin_swap(block, Direction::Down)?;
        self.drive(pending).await
    }

    pub async fn move_to(&mut self, block: BlockId, to: usize) -> Result<(), ClientError> {
        let pending = self.begin_move_to(block, to)?;
        self.drive(pending).await
    }

    // ── Content edits ───────────────────────────────────────────────────────
    //
    // Not speculative: the mirror reloads from the server's answer.

    pub async fn append(&mut self, kind: BlockKind, content: Value) -> Result<Block, ClientError> {
        let page_id = self.current_page()?;
        let block = self.backend.append_block(page_id, kind, content).await?;
        let blocks = self.backend.list_blocks(page_id).await?;
        self.step(MirrorEvent::Loaded { page_id, blocks });
        Ok(block)
    }

    pub async fn update(&mut self, block: BlockId, content: Value) -> Result<Block, ClientError> {
        let page_id = self.current_page()?;
        let updated = self.backend.update_block_content(block, content).await?;
        let blocks = self.backend.list_blocks(page_id).await?;
        self.step(MirrorEvent::Loaded { page_id, blocks });
        Ok(updated)
    }

    pub async fn remove(&mut self, block: BlockId) -> Result<(), ClientError> {
        let page_id = self.current_page()?;
        let blocks = self.backend.remove_block(block).await?;
        self.step(MirrorEvent::Loaded { page_id, blocks });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use async_trait::async_trait;
    use pagewright_kernel::{Kernel, KernelError};
    use pagewright_types::{Identity, NewPage, SiteId};
    use serde_json::json;

    async fn editor_with_blocks(n: usize) -> (PageEditor<LocalBackend>, Vec<BlockId>) {
        let kernel = Arc::new(Kernel::in_memory().unwrap());
        let page = kernel
            .pages()
            .create(NewPage::new(SiteId::new(), "Home", "home"))
            .unwrap();
        let ids = (0..n)
            .map(|i| {
                let kind = BlockKind::ALL[i % BlockKind::ALL.len()];
                kernel.blocks().append_default_block(page.id, kind).unwrap().id
            })
            .collect();
        let mut editor = PageEditor::new(Arc::new(LocalBackend::new(kernel, Identity::system())));
        editor.open(page.id).await.unwrap();
        (editor, ids)
    }

    fn shown(editor: &PageEditor<impl PageBackend>) -> Vec<BlockId> {
        editor.state().displayed_ids()
    }

    #[tokio::test]
    async fn test_move_up_and_down() {
        let (mut editor, ids) = editor_with_blocks(3).await;

        editor.move_up(ids[2]).await.unwrap();
        assert_eq!(shown(&editor), vec![ids[0], ids[2], ids[1]]);
        editor.move_down(ids[0]).await.unwrap();
        assert_eq!(shown(&editor), vec![ids[2], ids[0], ids[1]]);
        assert!(!editor.state().is_speculative());

        // Edges are no-ops.
        editor.move_up(ids[2]).await.unwrap();
        assert_eq!(shown(&editor), vec![ids[2], ids[0], ids[1]]);

        let page = editor.state().page_id().unwrap();
        let stored: Vec<_> = editor
            .backend()
            .list_blocks(page)
            .await
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(stored, shown(&editor));
    }

    #[tokio::test]
    async fn test_optimistic_order_visible_before_submit() {
        let (mut editor, ids) = editor_with_blocks(3).await;
        let pending = editor.begin_move_to(ids[0], 2).unwrap().unwrap();
        assert_eq!(shown(&editor), vec![ids[1], ids[2], ids[0]]);
        assert!(editor.state().is_speculative());

        let result = editor.submit(&pending).await;
        editor.complete(pending, result).await.unwrap();
        assert!(!editor.state().is_speculative());
        assert_eq!(shown(&editor), vec![ids[1], ids[2], ids[0]]);
    }

    #[tokio::test]
    async fn test_conflict_restores_authoritative_order() {
        let (mut editor, ids) = editor_with_blocks(3).await;
        let pending = editor.begin_swap(ids[1], Direction::Up).unwrap().unwrap();

        // Someone else deletes a block before the request lands.
        editor.backend().kernel().blocks().remove_block(ids[2]).unwrap();

        let result = editor.submit(&pending).await;
        let err = editor.complete(pending, result).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(shown(&editor), vec![ids[0], ids[1]]);
        assert!(!editor.state().is_speculative());
    }

    #[tokio::test]
    async fn test_out_of_order_responses() {
        let (mut editor, ids) = editor_with_blocks(3).await;
        let first = editor.begin_swap(ids[0], Direction::Down).unwrap().unwrap();
        let second = editor.begin_swap(ids[2], Direction::Up).unwrap().unwrap();
        let expected = vec![ids[1], ids[2], ids[0]];
        assert_eq!(shown(&editor), expected);

        let first_result = editor.submit(&first).await;
        let second_result = editor.submit(&second).await;

        // Newest answer first, then the superseded one.
        editor.complete(second, second_result).await.unwrap();
        editor.complete(first, first_result).await.unwrap();
        assert_eq!(shown(&editor), expected);
        assert!(!editor.state().is_speculative());
    }

    #[tokio::test]
    async fn test_requests_applied_in_reverse_converge_on_server_order() {
        let (mut editor, ids) = editor_with_blocks(3).await;
        let first = editor.begin_swap(ids[0], Direction::Down).unwrap().unwrap();
        let second = editor.begin_swap(ids[2], Direction::Up).unwrap().unwrap();

        // The server applies the newer request first, so the older one wins.
        let second_result = editor.submit(&second).await;
        let first_result = editor.submit(&first).await;

        editor.complete(second, second_result).await.unwrap();
        editor.complete(first, first_result).await.unwrap();

        let page = editor.state().page_id().unwrap();
        let stored: Vec<_> = editor
            .backend()
            .list_blocks(page)
            .await
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(stored, vec![ids[1], ids[0], ids[2]]);
        assert_eq!(shown(&editor), stored);
        assert!(!editor.state().is_speculative());
    }

    #[tokio::test]
    async fn test_abandon_discards_local_order() {
        let (mut editor, ids) = editor_with_blocks(2).await;
        let pending = editor.begin_swap(ids[1], Direction::Up).unwrap().unwrap();
        editor.abandon();
        assert!(editor.blocks().is_empty());

        // The server call still completes; the mirror ignores it.
        let result = editor.submit(&pending).await;
        assert!(result.is_ok());
        editor.complete(pending, result).await.unwrap();
        assert!(editor.blocks().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_move() {
        let (mut editor, _) = editor_with_blocks(2).await;
        let err = editor.move_up(BlockId::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidMove(_)));
    }

    #[tokio::test]
    async fn test_content_edits_reload() {
        let (mut editor, ids) = editor_with_blocks(2).await;
        let block = editor
            .append(BlockKind::Text, json!({"title": "x"}))
            .await
            .unwrap();
        assert_eq!(block.order, 2);
        assert_eq!(editor.blocks().len(), 3);

        editor.remove(ids[0]).await.unwrap();
        let orders: Vec<_> = editor.blocks().iter().map(|b| b.order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    /// Backend whose reorders always fail in transit.
    struct FlakyBackend {
        inner: LocalBackend,
    }

    #[async_trait]
    impl PageBackend for FlakyBackend {
        async fn list_blocks(&self, page_id: PageId) -> Result<Vec<Block>, ClientError> {
            self.inner.list_blocks(page_id).await
        }

        async fn reorder(&self, _: PageId, _: Vec<BlockId>) -> Result<Vec<Block>, ClientError> {
            Err(ClientError::Transport("connection reset".into()))
        }

        async fn append_block(
            &self,
            page_id: PageId,
            kind: BlockKind,
            content: Value,
        ) -> Result<Block, ClientError> {
            self.inner.append_block(page_id, kind, content).await
        }

        async fn update_block_content(
            &self,
            block_id: BlockId,
            content: Value,
        ) -> Result<Block, ClientError> {
            self.inner.update_block_content(block_id, content).await
        }

        async fn remove_block(&self, block_id: BlockId) -> Result<Vec<Block>, ClientError> {
            self.inner.remove_block(block_id).await
        }
    }

    #[tokio::test]
    async fn test_transport_failure_rolls_back() {
        let kernel = Arc::new(Kernel::in_memory().unwrap());
        let page = kernel
            .pages()
            .create(NewPage::new(SiteId::new(), "Home", "home"))
            .unwrap();
        let a = kernel.blocks().append_default_block(page.id, BlockKind::Hero).unwrap();
        let b = kernel.blocks().append_default_block(page.id, BlockKind::Text).unwrap();

        let backend = FlakyBackend {
            inner: LocalBackend::new(kernel, Identity::system()),
        };
        let mut editor = PageEditor::new(Arc::new(backend));
        editor.open(page.id).await.unwrap();

        let err = editor.move_up(b.id).await.unwrap_err();
        assert_eq!(err, ClientError::Transport("connection reset".into()));
        assert_eq!(shown(&editor), vec![a.id, b.id]);
        assert!(!matches!(err, ClientError::Rejected(KernelError::Conflict(_))));
    }
}
