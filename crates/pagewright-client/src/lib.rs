//! pagewright client library
//!
//! Optimistic editing of a page's block order. [`MirrorState`] is the pure
//! state machine; [`PageEditor`] drives it against a [`PageBackend`].
//! [`LocalBackend`] runs the kernel in-process.

pub mod backend;
pub mod editor;
pub mod mirror;

pub use backend::{ClientError, LocalBackend, PageBackend};
pub use editor::{PageEditor, PendingReorder};
pub use mirror::{
    Direction, Effect, IdSnapshot, InFlight, MirrorEvent, MirrorState, Notice, Ticket, Transition,
    move_to, swap_adjacent,
};
