//! Page events broadcast after each committed mutation.
//!
//! Events are sent only after the transaction commits, so a subscriber never
//! sees a change that could still roll back. Sends ignore the no-subscriber
//! case; a lagging receiver loses old events per `tokio::sync::broadcast`.
//!
//! The deployment pipeline listens for [`PageEvent::Published`], which fires
//! only on an actual draft → published transition.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use pagewright_types::{BlockId, BlockKind, Page, PageId, SiteId};

/// Default broadcast capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Something changed on a page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PageEvent {
    /// A page was created (including as a duplicate).
    Created { page: Page },
    /// Page metadata changed.
    Updated { page: Page },
    /// A page and all its blocks were deleted.
    Deleted { page_id: PageId, site_id: SiteId },
    /// Draft → published. Not sent for a repeated publish.
    Published { page: Page },
    /// Published → draft. Not sent for a repeated unpublish.
    Unpublished { page: Page },
    /// A block was appended.
    BlockAdded {
        page_id: PageId,
        block_id: BlockId,
        kind: BlockKind,
        order: u32,
    },
    /// A block's content was replaced.
    BlockUpdated { page_id: PageId, block_id: BlockId },
    /// A block was removed and the rest compacted.
    BlockRemoved { page_id: PageId, block_id: BlockId },
    /// A page's blocks were reordered.
    Reordered { page_id: PageId, order: Vec<BlockId> },
}

impl PageEvent {
    /// The page this event concerns.
    pub fn page_id(&self) -> PageId {
        match self {
            PageEvent::Created { page }
            | PageEvent::Updated { page }
            | PageEvent::Published { page }
            | PageEvent::Unpublished { page } => page.id,
            PageEvent::Deleted { page_id, .. }
            | PageEvent::BlockAdded { page_id, .. }
            | PageEvent::BlockUpdated { page_id, .. }
            | PageEvent::BlockRemoved { page_id, .. }
            | PageEvent::Reordered { page_id, .. } => *page_id,
        }
    }
}

/// Sending half shared by the stores.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<PageEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: PageEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
