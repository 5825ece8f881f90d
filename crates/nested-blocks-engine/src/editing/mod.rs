/*!
# Block list editing

The editing layer keeps a tree of blocks as a flat list and lets a host mutate it the way a
drag-and-drop block editor does.

## Architecture

- **[`BlockList`](list::BlockList)**: the ordered sequence with a depth per block. Owns every
  structural mutation and every tree-shaped query.
- **[`BlockNode`](block::BlockNode)**: one block with its flags, field data, child menu and
  change detection.
- **[`InsertionMenu`](buttons::InsertionMenu)**: candidate block types for one insertion point,
  gated by [`QuotaGate`](quota::QuotaGate).
- **[`BlockInput`](input::BlockInput)**: the coordinator hosts talk to. It turns menu choices
  into inserts, fans settings actions out over the [`Selection`](selection::Selection) and
  publishes [`InputEvent`](events::InputEvent)s.

## Invariants

- The list is always a valid pre-order encoding: the first block is at depth 0 and each block
  is at most one level deeper than the one before it.
- Requested depths are clamped, never rejected.
- Quota state is derived from the list on demand, so it is never stale.
- Once a loaded block is seen to differ from its initial state it stays modified.

## Host loop

A host builds a [`BlockInput`](input::BlockInput) from [`InputSettings`](input::InputSettings),
subscribes to events, forwards user actions, and calls `tick` periodically when change
detection falls back to polling.
*/

pub mod block;
pub mod buttons;
pub mod commands;
pub mod events;
pub mod input;
pub mod list;
pub mod quota;
pub mod selection;
pub mod snapshot;
pub mod watcher;

pub use block::{BlockData, BlockNode};
pub use buttons::{InsertionMenu, MenuEntry, MenuTarget, NewBlockIntent};
pub use commands::BlockAction;
pub use events::{BlockEvent, BlockSummary, EventBus, HasSubject, InputEvent, SubscriptionId};
pub use input::{BlockInput, InputSettings, DEFAULT_NAMESPACE};
pub use list::{BlockList, Placement};
pub use quota::{ActionStates, QuotaCounts, QuotaGate};
pub use selection::Selection;
pub use snapshot::{BlockContent, ContentNode};
pub use watcher::{
    ChangeWatcher, HostCapabilities, IntervalPoll, MutationObserver, WatchStrategy,
    DEFAULT_POLL_INTERVAL,
};
