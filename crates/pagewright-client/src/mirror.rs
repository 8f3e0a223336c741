//! Optimistic local replica of one page's block order.
//!
//! This module is pure: no I/O, no async. [`MirrorState::apply`] consumes the
//! current state and a [`MirrorEvent`] and returns a [`Transition`] carrying
//! the next state, at most one [`Effect`] for the driver to run, and at most
//! one [`Notice`] for the caller. The async driver lives in
//! [`crate::editor`].
//!
//! # State Machine
//!
//! ```text
//! +----------------+
//! |     Closed     | no page
//! +-------+--------+
//!         | Loaded
//!         v
//! +----------------+   Permute (valid)    +----------------+
//! |    Settled     | -------------------> |  Speculative   | displayed != confirmed
//! | displayed ==   | <------------------- |  ticket N in   |
//! |   confirmed    |  Succeeded(N)        |    flight      |
//! +----------------+  Failed(N) + Refetch +----------------+
//! ```
//!
//! Each reorder request carries a monotonically increasing [`Ticket`] and
//! the [`IdSnapshot`] of the id-set it was computed from. A response whose
//! ticket is not the latest, or whose snapshot no longer matches, does not
//! settle the mirror. A superseded *success* still committed something: the
//! server may have applied it after the newer request, so when its sequence
//! differs from what the mirror confirmed, the mirror asks for a refetch.

use std::collections::BTreeSet;

use pagewright_types::{Block, BlockId, PageId};

use crate::backend::ClientError;

/// Sequence number of a reorder request. Later requests have larger tickets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The block-id set a request was computed against. Order-insensitive.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct IdSnapshot(BTreeSet<BlockId>);

impl IdSnapshot {
    pub fn of(blocks: &[Block]) -> Self {
        Self(blocks.iter().map(|b| b.id).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.0.contains(&id)
    }
}

/// A reorder request waiting for the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InFlight {
    pub ticket: Ticket,
    pub snapshot: IdSnapshot,
    pub order: Vec<BlockId>,
}

/// Inputs to the mirror.
#[derive(Clone, Debug)]
pub enum MirrorEvent {
    /// Authoritative sequence for a page (initial load or refetch).
    Loaded { page_id: PageId, blocks: Vec<Block> },
    /// User asked for a new top-to-bottom order of the displayed blocks.
    Permute { order: Vec<BlockId> },
    /// The server committed a reorder.
    ReorderSucceeded {
        ticket: Ticket,
        snapshot: IdSnapshot,
        blocks: Vec<Block>,
    },
    /// The server (or transport) rejected a reorder.
    ReorderFailed {
        ticket: Ticket,
        snapshot: IdSnapshot,
        error: ClientError,
    },
    /// The edit session was left. Any in-flight call keeps running; its
    /// response will be ignored.
    Abandoned,
}

/// Work for the driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Submit a full permutation to the reorder coordinator.
    Reorder {
        page_id: PageId,
        ticket: Ticket,
        snapshot: IdSnapshot,
        order: Vec<BlockId>,
    },
    /// Fetch the authoritative sequence and feed it back as `Loaded`.
    Refetch { page_id: PageId },
}

/// Something the caller should know about.
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    /// A reorder failed; the displayed order was rolled back.
    Failed(ClientError),
    /// A response arrived for a request that is no longer current.
    Stale { ticket: Ticket },
    /// A permutation that does not match the displayed blocks.
    InvalidMove { reason: String },
}

/// Result of [`MirrorState::apply`].
#[derive(Debug)]
pub struct Transition {
    pub state: MirrorState,
    pub effect: Option<Effect>,
    pub notice: Option<Notice>,
}

impl Transition {
    fn quiet(state: MirrorState) -> Self {
        Self {
            state,
            effect: None,
            notice: None,
        }
    }
}

/// Last-known block sequence of the page being edited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MirrorState {
    page_id: Option<PageId>,
    /// Last sequence the server confirmed.
    confirmed: Vec<Block>,
    /// What the UI shows; may be ahead of `confirmed`.
    displayed: Vec<Block>,
    in_flight: Option<InFlight>,
    last_ticket: u64,
}

impl MirrorState {
    pub fn page_id(&self) -> Option<PageId> {
        self.page_id
    }

    /// Blocks in display order.
    pub fn displayed(&self) -> &[Block] {
        &self.displayed
    }

    /// Blocks in the last server-confirmed order.
    pub fn confirmed(&self) -> &[Block] {
        &self.confirmed
    }

    pub fn displayed_ids(&self) -> Vec<BlockId> {
        self.displayed.iter().map(|b| b.id).collect()
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    /// Whether the displayed order still awaits confirmation.
    pub fn is_speculative(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Advance the state machine.
    pub fn apply(self, event: MirrorEvent) -> Transition {
        match event {
            MirrorEvent::Loaded { page_id, blocks } => Transition::quiet(Self {
                page_id: Some(page_id),
                confirmed: blocks.clone(),
                displayed: blocks,
                in_flight: None,
                last_ticket: self.last_ticket,
            }),
            MirrorEvent::Permute { order } => self.permute(order),
            MirrorEvent::ReorderSucceeded {
                ticket,
                snapshot,
                blocks,
            } => {
                if !self.is_current(ticket, &snapshot) {
                    return self.stale_success(ticket, &blocks);
                }
                Transition::quiet(Self {
                    confirmed: blocks.clone(),
                    displayed: blocks,
                    in_flight: None,
                    ..self
                })
            }
            MirrorEvent::ReorderFailed {
                ticket,
                snapshot,
                error,
            } => {
                if !self.is_current(ticket, &snapshot) {
                    return self.stale(ticket);
                }
                let effect = self.page_id.map(|page_id| Effect::Refetch { page_id });
                Transition {
                    state: Self {
                        displayed: self.confirmed.clone(),
                        in_flight: None,
                        ..self
                    },
                    effect,
                    notice: Some(Notice::Failed(error)),
                }
            }
            MirrorEvent::Abandoned => Transition::quiet(Self {
                last_ticket: self.last_ticket,
                ..Self::default()
            }),
        }
    }

    fn permute(self, order: Vec<BlockId>) -> Transition {
        let Some(page_id) = self.page_id else {
            return self.invalid("no page loaded");
        };
        if let Err(reason) = check_permutation(&self.displayed, &order) {
            return self.invalid(reason);
        }
        if order == self.displayed_ids() {
            return Transition::quiet(self);
        }

        let displayed = arrange(&self.displayed, &order);
        let ticket = Ticket(self.last_ticket + 1);
        let snapshot = IdSnapshot::of(&displayed);
        let in_flight = InFlight {
            ticket,
            snapshot: snapshot.clone(),
            order: order.clone(),
        };
        Transition {
            state: Self {
                displayed,
                in_flight: Some(in_flight),
                last_ticket: ticket.0,
                ..self
            },
            effect: Some(Effect::Reorder {
                page_id,
                ticket,
                snapshot,
                order,
            }),
            notice: None,
        }
    }

    fn is_current(&self, ticket: Ticket, snapshot: &IdSnapshot) -> bool {
        match &self.in_flight {
            Some(pending) => {
                pending.ticket == ticket
                    && &pending.snapshot == snapshot
                    && IdSnapshot::of(&self.displayed) == *snapshot
            }
            None => false,
        }
    }

    fn stale(self, ticket: Ticket) -> Transition {
        Transition {
            state: self,
            effect: None,
            notice: Some(Notice::Stale { ticket }),
        }
    }

    /// A superseded success whose committed order may be the one the server
    /// kept. Refetch unless it matches what is already confirmed.
    fn stale_success(self, ticket: Ticket, blocks: &[Block]) -> Transition {
        let effect = match self.page_id {
            Some(page_id)
                if !blocks.is_empty()
                    && blocks.iter().all(|b| b.page_id == page_id)
                    && !same_order(blocks, &self.confirmed) =>
            {
                Some(Effect::Refetch { page_id })
            }
            _ => None,
        };
        Transition {
            state: self,
            effect,
            notice: Some(Notice::Stale { ticket }),
        }
    }

    fn invalid(self, reason: impl Into<String>) -> Transition {
        Transition {
            state: self,
            effect: None,
            notice: Some(Notice::InvalidMove {
                reason: reason.into(),
            }),
        }
    }
}

fn same_order(a: &[Block], b: &[Block]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.id == y.id)
}

fn check_permutation(blocks: &[Block], order: &[BlockId]) -> Result<(), String> {
    if blocks.len() != order.len() {
        return Err(format!(
            "expected {} ids, got {}",
            blocks.len(),
            order.len()
        ));
    }
    let have = IdSnapshot::of(blocks);
    let mut seen = BTreeSet::new();
    for id in order {
        if !have.contains(*id) {
            return Err(format!("{id:?} is not on this page"));
        }
        if !seen.insert(*id) {
            return Err(format!("{id:?} listed twice"));
        }
    }
    Ok(())
}

/// Blocks rearranged into `order`, renumbered `0..N`.
fn arrange(blocks: &[Block], order: &[BlockId]) -> Vec<Block> {
    order
        .iter()
        .enumerate()
        .filter_map(|(idx, id)| {
            blocks.iter().find(|b| b.id == *id).map(|b| Block {
                order: idx as u32,
                ..b.clone()
            })
        })
        .collect()
}

// ============================================================================
// Move helpers
// ============================================================================

/// Direction of an adjacent swap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// `order` with `id` swapped with its neighbour. `None` at the edges or when
/// `id` is absent.
pub fn swap_adjacent(order: &[BlockId], id: BlockId, direction: Direction) -> Option<Vec<BlockId>> {
    let idx = order.iter().position(|b| *b == id)?;
    let other = match direction {
        Direction::Up => idx.checked_sub(1)?,
        Direction::Down => Some(idx + 1).filter(|i| *i < order.len())?,
    };
    let mut next = order.to_vec();
    next.swap(idx, other);
    Some(next)
}

/// `order` with `id` moved to position `to` (clamped to the end).
pub fn move_to(order: &[BlockId], id: BlockId, to: usize) -> Option<Vec<BlockId>> {
    let idx = order.iter().position(|b| *b == id)?;
    let mut next = order.to_vec();
    let moved = next.remove(idx);
    next.insert(to.min(next.len()), moved);
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagewright_kernel::KernelError;
    use pagewright_types::{BlockContent, BlockKind};

    fn block(page_id: PageId, order: u32, kind: BlockKind) -> Block {
        Block {
            id: BlockId::new(),
            page_id,
            order,
            content: BlockContent::default_for(kind),
            created_at: 1,
            updated_at: 1,
        }
    }

    fn loaded() -> (MirrorState, PageId, Vec<BlockId>) {
        let page_id = PageId::new();
        let blocks = vec![
            block(page_id, 0, BlockKind::Hero),
            block(page_id, 1, BlockKind::Text),
            block(page_id, 2, BlockKind::Image),
        ];
        let ids = blocks.iter().map(|b| b.id).collect();
        let t = MirrorState::default().apply(MirrorEvent::Loaded { page_id, blocks });
        (t.state, page_id, ids)
    }

    fn reorder_effect(t: &Transition) -> (Ticket, IdSnapshot) {
        match &t.effect {
            Some(Effect::Reorder {
                ticket, snapshot, ..
            }) => (*ticket, snapshot.clone()),
            other => panic!("expected reorder effect, got {other:?}"),
        }
    }

    #[test]
    fn test_permute_is_visible_before_response() {
        let (state, _, ids) = loaded();
        let order = vec![ids[2], ids[0], ids[1]];
        let t = state.apply(MirrorEvent::Permute {
            order: order.clone(),
        });

        assert_eq!(t.state.displayed_ids(), order);
        assert!(t.state.is_speculative());
        let orders: Vec<_> = t.state.displayed().iter().map(|b| b.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        // Confirmed stays put until the server answers.
        let confirmed: Vec<_> = t.state.confirmed().iter().map(|b| b.id).collect();
        assert_eq!(confirmed, ids);
    }

    #[test]
    fn test_success_settles() {
        let (state, _, ids) = loaded();
        let t = state.apply(MirrorEvent::Permute {
            order: vec![ids[1], ids[0], ids[2]],
        });
        let (ticket, snapshot) = reorder_effect(&t);
        let committed = t.state.displayed().to_vec();

        let t = t.state.apply(MirrorEvent::ReorderSucceeded {
            ticket,
            snapshot,
            blocks: committed.clone(),
        });
        assert!(t.notice.is_none());
        assert!(!t.state.is_speculative());
        assert_eq!(t.state.confirmed(), committed.as_slice());
        assert_eq!(t.state.displayed(), committed.as_slice());
    }

    #[test]
    fn test_failure_rolls_back_and_refetches() {
        let (state, page_id, ids) = loaded();
        let t = state.apply(MirrorEvent::Permute {
            order: vec![ids[2], ids[1], ids[0]],
        });
        let (ticket, snapshot) = reorder_effect(&t);

        let error = ClientError::Rejected(KernelError::Conflict(Default::default()));
        let t = t.state.apply(MirrorEvent::ReorderFailed {
            ticket,
            snapshot,
            error: error.clone(),
        });
        assert_eq!(t.state.displayed_ids(), ids);
        assert_eq!(t.effect, Some(Effect::Refetch { page_id }));
        assert_eq!(t.notice, Some(Notice::Failed(error)));
        assert!(!t.state.is_speculative());
    }

    #[test]
    fn test_older_ticket_is_ignored() {
        let (state, _, ids) = loaded();
        let first = state.apply(MirrorEvent::Permute {
            order: vec![ids[1], ids[0], ids[2]],
        });
        let (old_ticket, old_snapshot) = reorder_effect(&first);
        let second = first.state.apply(MirrorEvent::Permute {
            order: vec![ids[1], ids[2], ids[0]],
        });
        let (new_ticket, _) = reorder_effect(&second);
        assert!(new_ticket > old_ticket);
        let shown = second.state.displayed_ids();

        let t = second.state.apply(MirrorEvent::ReorderSucceeded {
            ticket: old_ticket,
            snapshot: old_snapshot,
            blocks: vec![],
        });
        assert_eq!(t.notice, Some(Notice::Stale { ticket: old_ticket }));
        assert_eq!(t.state.displayed_ids(), shown);
        assert_eq!(t.state.in_flight().map(|f| f.ticket), Some(new_ticket));
    }

    #[test]
    fn test_superseded_success_applied_last_refetches() {
        let (state, page_id, ids) = loaded();
        let first = state.apply(MirrorEvent::Permute {
            order: vec![ids[1], ids[0], ids[2]],
        });
        let (old_ticket, old_snapshot) = reorder_effect(&first);
        let first_order = first.state.displayed().to_vec();
        let second = first.state.apply(MirrorEvent::Permute {
            order: vec![ids[1], ids[2], ids[0]],
        });
        let (new_ticket, new_snapshot) = reorder_effect(&second);
        let second_order = second.state.displayed().to_vec();

        // The newer request settles first...
        let t = second.state.apply(MirrorEvent::ReorderSucceeded {
            ticket: new_ticket,
            snapshot: new_snapshot,
            blocks: second_order,
        });
        assert!(!t.state.is_speculative());

        // ...then the server reports the older one committed after it.
        let t = t.state.apply(MirrorEvent::ReorderSucceeded {
            ticket: old_ticket,
            snapshot: old_snapshot,
            blocks: first_order,
        });
        assert_eq!(t.notice, Some(Notice::Stale { ticket: old_ticket }));
        assert_eq!(t.effect, Some(Effect::Refetch { page_id }));
    }

    #[test]
    fn test_superseded_success_matching_confirmed_is_quiet() {
        let (state, _, ids) = loaded();
        let first = state.apply(MirrorEvent::Permute {
            order: vec![ids[1], ids[0], ids[2]],
        });
        let (old_ticket, old_snapshot) = reorder_effect(&first);
        let second = first.state.apply(MirrorEvent::Permute {
            order: vec![ids[1], ids[2], ids[0]],
        });
        let (new_ticket, new_snapshot) = reorder_effect(&second);
        let committed = second.state.displayed().to_vec();

        let t = second.state.apply(MirrorEvent::ReorderSucceeded {
            ticket: new_ticket,
            snapshot: new_snapshot,
            blocks: committed.clone(),
        });
        let t = t.state.apply(MirrorEvent::ReorderSucceeded {
            ticket: old_ticket,
            snapshot: old_snapshot,
            blocks: committed,
        });
        assert_eq!(t.notice, Some(Notice::Stale { ticket: old_ticket }));
        assert!(t.effect.is_none());
    }

    #[test]
    fn test_different_snapshot_is_ignored() {
        let (state, _, ids) = loaded();
        let t = state.apply(MirrorEvent::Permute {
            order: vec![ids[1], ids[0], ids[2]],
        });
        let (ticket, _) = reorder_effect(&t);
        let shown = t.state.displayed_ids();

        let t = t.state.apply(MirrorEvent::ReorderFailed {
            ticket,
            snapshot: IdSnapshot::default(),
            error: ClientError::Transport("reset".into()),
        });
        assert_eq!(t.notice, Some(Notice::Stale { ticket }));
        assert!(t.effect.is_none());
        assert_eq!(t.state.displayed_ids(), shown);
    }

    #[test]
    fn test_abandon_drops_speculation() {
        let (state, _, ids) = loaded();
        let t = state.apply(MirrorEvent::Permute {
            order: vec![ids[1], ids[0], ids[2]],
        });
        let (ticket, snapshot) = reorder_effect(&t);

        let t = t.state.apply(MirrorEvent::Abandoned);
        assert!(t.state.displayed().is_empty());
        assert_eq!(t.state.page_id(), None);

        // The orphaned response lands on a closed mirror.
        let t = t.state.apply(MirrorEvent::ReorderSucceeded {
            ticket,
            snapshot,
            blocks: vec![],
        });
        assert_eq!(t.notice, Some(Notice::Stale { ticket }));
    }

    #[test]
    fn test_tickets_keep_increasing_after_abandon() {
        let (state, page_id, ids) = loaded();
        let t = state.apply(MirrorEvent::Permute {
            order: vec![ids[1], ids[0], ids[2]],
        });
        let (first, _) = reorder_effect(&t);
        let blocks = t.state.confirmed().to_vec();

        let t = t.state.apply(MirrorEvent::Abandoned);
        let t = t.state.apply(MirrorEvent::Loaded { page_id, blocks });
        let t = t.state.apply(MirrorEvent::Permute {
            order: vec![ids[2], ids[0], ids[1]],
        });
        let (second, _) = reorder_effect(&t);
        assert!(second > first);
    }

    #[test]
    fn test_invalid_permutations_rejected() {
        let (state, _, ids) = loaded();
        for order in [
            vec![ids[0], ids[1]],
            vec![ids[0], ids[0], ids[1]],
            vec![ids[0], ids[1], BlockId::new()],
        ] {
            let t = state.clone().apply(MirrorEvent::Permute { order });
            assert!(matches!(t.notice, Some(Notice::InvalidMove { .. })));
            assert!(t.effect.is_none());
            assert_eq!(t.state, state);
        }
    }

    #[test]
    fn test_identity_permutation_is_a_no_op() {
        let (state, _, ids) = loaded();
        let t = state.clone().apply(MirrorEvent::Permute { order: ids });
        assert!(t.effect.is_none());
        assert!(t.notice.is_none());
        assert_eq!(t.state, state);
    }

    #[test]
    fn test_swap_adjacent() {
        let ids: Vec<_> = (0..3).map(|_| BlockId::new()).collect();
        assert_eq!(
            swap_adjacent(&ids, ids[1], Direction::Up),
            Some(vec![ids[1], ids[0], ids[2]])
        );
        assert_eq!(
            swap_adjacent(&ids, ids[1], Direction::Down),
            Some(vec![ids[0], ids[2], ids[1]])
        );
        assert_eq!(swap_adjacent(&ids, ids[0], Direction::Up), None);
        assert_eq!(swap_adjacent(&ids, ids[2], Direction::Down), None);
        assert_eq!(swap_adjacent(&ids, BlockId::new(), Direction::Up), None);
    }

    #[test]
    fn test_move_to() {
        let ids: Vec<_> = (0..4).map(|_| BlockId::new()).collect();
        assert_eq!(
            move_to(&ids, ids[3], 0),
            Some(vec![ids[3], ids[0], ids[1], ids[2]])
        );
        assert_eq!(
            move_to(&ids, ids[0], 99),
            Some(vec![ids[1], ids[2], ids[3], ids[0]])
        );
    }
}
