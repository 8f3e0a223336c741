//! Backends the editor talks to.
//!
//! [`PageBackend`] is the seam between the client mirror and wherever the
//! authoritative kernel lives. [`LocalBackend`] runs the kernel in-process;
//! remote transports implement the same trait and map their failures to
//! [`ClientError::Transport`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use pagewright_kernel::{Kernel, KernelError};
use pagewright_types::{Block, BlockId, BlockKind, Identity, PageId};

/// Errors seen by the client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The kernel refused the operation.
    #[error(transparent)]
    Rejected(#[from] KernelError),

    /// The request never got a verdict (connection lost, task died).
    #[error("transport error: {0}")]
    Transport(String),

    /// A local move that does not fit the displayed blocks.
    #[error("invalid move: {0}")]
    InvalidMove(String),
}

impl ClientError {
    /// Reorder raced a concurrent change.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Rejected(e) if e.is_conflict())
    }

    /// The page or block is gone; fall back to the listing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Rejected(e) if e.is_not_found())
    }
}

/// Block operations the editor needs from the authoritative side.
#[async_trait]
pub trait PageBackend: Send + Sync {
    async fn list_blocks(&self, page_id: PageId) -> Result<Vec<Block>, ClientError>;

    async fn reorder(&self, page_id: PageId, order: Vec<BlockId>)
    -> Result<Vec<Block>, ClientError>;

    async fn append_block(
        &self,
        page_id: PageId,
        kind: BlockKind,
        content: Value,
    ) -> Result<Block, ClientError>;

    async fn update_block_content(
        &self,
        block_id: BlockId,
        content: Value,
    ) -> Result<Block, ClientError>;

    async fn remove_block(&self, block_id: BlockId) -> Result<Vec<Block>, ClientError>;
}

/// In-process backend over a shared kernel, acting as one identity.
///
/// Kernel calls hold a SQLite transaction, so they run on the blocking pool.
#[derive(Clone)]
pub struct LocalBackend {
    kernel: Arc<Kernel>,
    identity: Identity,
}

impl LocalBackend {
    pub fn new(kernel: Arc<Kernel>, identity: Identity) -> Self {
        Self { kernel, identity }
    }

    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    async fn run<T, F>(&self, op: F) -> Result<T, ClientError>
    where
        T: Send + 'static,
        F: FnOnce(&Kernel, Identity) -> Result<T, KernelError> + Send + 'static,
    {
        let kernel = self.kernel.clone();
        let identity = self.identity.clone();
        tokio::task::spawn_blocking(move || op(kernel.as_ref(), identity))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?
            .map_err(ClientError::from)
    }
}

#[async_trait]
impl PageBackend for LocalBackend {
    async fn list_blocks(&self, page_id: PageId) -> Result<Vec<Block>, ClientError> {
        self.run(move |k, who| k.scoped(who).list_blocks(page_id))
            .await
    }

    async fn reorder(
        &self,
        page_id: PageId,
        order: Vec<BlockId>,
    ) -> Result<Vec<Block>, ClientError> {
        self.run(move |k, who| k.scoped(who).reorder(page_id, &order))
            .await
    }

    async fn append_block(
        &self,
        page_id: PageId,
        kind: BlockKind,
        content: Value,
    ) -> Result<Block, ClientError> {
        self.run(move |k, who| k.scoped(who).append_block(page_id, kind, &content))
            .await
    }

    async fn update_block_content(
        &self,
        block_id: BlockId,
        content: Value,
    ) -> Result<Block, ClientError> {
        self.run(move |k, who| k.scoped(who).update_block_content(block_id, &content))
            .await
    }

    async fn remove_block(&self, block_id: BlockId) -> Result<Vec<Block>, ClientError> {
        self.run(move |k, who| k.scoped(who).remove_block(block_id))
            .await
    }
}
