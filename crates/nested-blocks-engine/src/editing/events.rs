//! Synchronous event delivery between the engine and its host.
//!
//! Two event families exist: [`InputEvent`] for list-level changes and [`BlockEvent`] for a
//! single block's lifecycle. Both are delivered through an [`EventBus`], which calls
//! listeners in subscription order before `emit` returns.

use crate::editing::list::Placement;
use crate::models::block_id::BlockId;
use serde::Serialize;
use std::fmt;

/// Payloads that carry a dotted subject, used for log lines
pub trait HasSubject {
    fn subject(&self) -> &'static str;
}

/// Snapshot of a block handed to listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    pub id: BlockId,
    pub block_type: String,
    pub depth: usize,
    pub enabled: bool,
    pub expanded: bool,
    pub modified: bool,
}

/// List-level events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InputEvent {
    BlockAdded {
        block: BlockSummary,
        index: usize,
        placement: Placement,
    },
    BlockRemoved {
        block: BlockSummary,
    },
    OrderChanged {
        sequence: Vec<BlockSummary>,
    },
    SelectionChanged {
        ids: Vec<BlockId>,
    },
}

impl HasSubject for InputEvent {
    fn subject(&self) -> &'static str {
        match self {
            Self::BlockAdded { .. } => "block.added",
            Self::BlockRemoved { .. } => "block.removed",
            Self::OrderChanged { .. } => "order.changed",
            Self::SelectionChanged { .. } => "selection.changed",
        }
    }
}

/// Events raised by one block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BlockEvent {
    InitUi,
    ToggleEnabled { enabled: bool },
    ToggleExpansion { expanded: bool },
    DepthChanged { depth: usize },
    Modified,
    Destroy,
}

impl HasSubject for BlockEvent {
    fn subject(&self) -> &'static str {
        match self {
            Self::InitUi => "block.init_ui",
            Self::ToggleEnabled { .. } => "block.toggle_enabled",
            Self::ToggleExpansion { .. } => "block.toggle_expansion",
            Self::DepthChanged { .. } => "block.depth_changed",
            Self::Modified => "block.modified",
            Self::Destroy => "block.destroy",
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener<E> = Box<dyn FnMut(&E)>;

pub struct EventBus<E> {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener<E>)>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl<E: HasSubject> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false when the subscription was not found
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    /// Deliver `event` to every listener, returning how many were called
    pub fn emit(&mut self, event: &E) -> usize {
        log::trace!("emit {} to {} listener(s)", event.subject(), self.listeners.len());
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
        self.listeners.len()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_emit_reaches_listeners_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        let first = seen.clone();
        bus.subscribe(move |e: &BlockEvent| first.borrow_mut().push(("first", *e)));
        let second = seen.clone();
        bus.subscribe(move |e: &BlockEvent| second.borrow_mut().push(("second", *e)));

        let called = bus.emit(&BlockEvent::Modified);

        assert_eq!(called, 2);
        assert_eq!(
            *seen.borrow(),
            vec![("first", BlockEvent::Modified), ("second", BlockEvent::Modified)]
        );
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        let counter = count.clone();
        let id = bus.subscribe(move |_: &BlockEvent| *counter.borrow_mut() += 1);

        bus.emit(&BlockEvent::InitUi);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&BlockEvent::InitUi);

        assert_eq!(*count.borrow(), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_subjects_are_dotted() {
        assert_eq!(BlockEvent::DepthChanged { depth: 2 }.subject(), "block.depth_changed");
        assert_eq!(
            InputEvent::SelectionChanged { ids: vec![] }.subject(),
            "selection.changed"
        );
    }

    #[test]
    fn test_block_event_serializes_with_tag() {
        let json = serde_json::to_string(&BlockEvent::ToggleExpansion { expanded: false }).unwrap();
        assert_eq!(json, r#"{"event":"toggle_expansion","expanded":false}"#);
    }
}
