use crate::editing::list::BlockList;
use crate::models::block_id::BlockId;
use std::collections::BTreeSet;

/// Multi-selection over the block list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    selected: BTreeSet<BlockId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the id was not already selected
    pub fn select(&mut self, id: BlockId) -> bool {
        self.selected.insert(id)
    }

    pub fn deselect(&mut self, id: BlockId) -> bool {
        self.selected.remove(&id)
    }

    /// Flip membership and return whether `id` is now selected
    pub fn toggle(&mut self, id: BlockId) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    /// Returns true if anything was selected
    pub fn clear(&mut self) -> bool {
        let had_any = !self.selected.is_empty();
        self.selected.clear();
        had_any
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.selected.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn ids(&self) -> Vec<BlockId> {
        self.selected.iter().copied().collect()
    }

    /// Selected ids present in `list`, in display order
    pub fn in_display_order(&self, list: &BlockList) -> Vec<BlockId> {
        list.iter()
            .map(|block| block.id())
            .filter(|id| self.contains(*id))
            .collect()
    }

    /// Blocks an action triggered from `origin` applies to.
    ///
    /// A selected origin fans out to the whole selection; otherwise only the origin is hit.
    pub fn batch_targets(&self, origin: BlockId, list: &BlockList) -> Vec<BlockId> {
        if self.contains(origin) {
            self.in_display_order(list)
        } else {
            vec![origin]
        }
    }

    /// Drop ids no longer in `list`. Returns true if anything was dropped.
    pub fn retain_present(&mut self, list: &BlockList) -> bool {
        let before = self.selected.len();
        self.selected.retain(|id| list.contains(*id));
        self.selected.len() != before
    }
}
