//! Ordered block sequence that encodes a forest.
//!
//! Blocks are kept in display order, which is a pre-order traversal of the forest, and each
//! block carries its depth. Every adjacent pair satisfies `depth[i + 1] <= depth[i] + 1` and
//! the first block sits at depth 0. A block's parent is the nearest preceding block one level
//! shallower; its descendants are the run of following blocks that are deeper than it.
//!
//! All tree-shaped questions are answered here from that encoding alone. Requested depths
//! are clamped into the valid range, never rejected, so no mutation can leave the sequence
//! malformed.

use crate::editing::block::BlockNode;
use crate::editing::quota::QuotaCounts;
use crate::error::{EngineError, EngineResult};
use crate::models::block_id::BlockId;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Where a block sits relative to its neighbours, for hosts that render nested containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Placement {
    /// First block of the list
    Start,
    /// Directly after this sibling's subtree
    After(BlockId),
    /// First child of this block
    FirstChildOf(BlockId),
}

#[derive(Debug, Default)]
pub struct BlockList {
    blocks: Vec<BlockNode>,
}

/// Depth for a block placed between `prev` and `next`
fn clamp_depth(prev: Option<&BlockNode>, next: Option<&BlockNode>, desired: usize) -> usize {
    let Some(prev) = prev else {
        return 0;
    };
    let min = next.map_or(0, BlockNode::depth);
    let max = prev.depth() + usize::from(prev.block_type().is_parent());
    // `min` wins if the neighbours disagree
    desired.min(max).max(min)
}

/// Whether a depth sequence is a valid pre-order encoding
pub fn depths_well_formed(depths: impl IntoIterator<Item = usize>) -> bool {
    let mut prev: Option<usize> = None;
    for depth in depths {
        let max = prev.map_or(0, |p| p + 1);
        if depth > max {
            return false;
        }
        prev = Some(depth);
    }
    true
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks in display order
    pub fn iter(&self) -> impl Iterator<Item = &BlockNode> {
        self.blocks.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut BlockNode> {
        self.blocks.iter_mut()
    }

    pub fn ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(BlockNode::id).collect()
    }

    pub fn index_of(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|block| block.id() == id)
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn get(&self, id: BlockId) -> Option<&BlockNode> {
        self.blocks.iter().find(|block| block.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: BlockId) -> Option<&mut BlockNode> {
        self.blocks.iter_mut().find(|block| block.id() == id)
    }

    pub fn at(&self, index: usize) -> Option<&BlockNode> {
        self.blocks.get(index)
    }

    pub fn count_of_type(&self, handle: &str) -> usize {
        self.blocks
            .iter()
            .filter(|block| block.type_handle() == handle)
            .count()
    }

    pub fn quota_counts(&self) -> QuotaCounts {
        QuotaCounts::from_handles(self.blocks.iter().map(BlockNode::type_handle))
    }

    pub fn is_well_formed(&self) -> bool {
        depths_well_formed(self.blocks.iter().map(BlockNode::depth))
    }

    /// Exclusive end of the subtree rooted at `index`
    fn subtree_end(&self, index: usize) -> usize {
        let depth = self.blocks[index].depth();
        self.blocks[index + 1..]
            .iter()
            .position(|block| block.depth() <= depth)
            .map_or(self.blocks.len(), |offset| index + 1 + offset)
    }

    /// Append a block loaded from host data, keeping its stored depth.
    ///
    /// Loaded data must already be a valid encoding.
    pub(crate) fn push_loaded(&mut self, node: BlockNode) -> EngineResult<()> {
        if self.contains(node.id()) {
            return Err(EngineError::DuplicateBlockId(node.id()));
        }
        let max = self.blocks.last().map_or(0, |last| last.depth() + 1);
        if node.depth() > max {
            return Err(EngineError::InvalidInitialDepth {
                id: node.id(),
                depth: node.depth(),
                max,
            });
        }
        self.blocks.push(node);
        Ok(())
    }

    /// Splice `node` in at `index` (clamped to the list length) and return its actual depth
    pub fn insert(
        &mut self,
        mut node: BlockNode,
        index: usize,
        desired_depth: usize,
    ) -> EngineResult<usize> {
        if self.contains(node.id()) {
            return Err(EngineError::DuplicateBlockId(node.id()));
        }

        let index = index.min(self.blocks.len());
        let prev = index.checked_sub(1).and_then(|i| self.blocks.get(i));
        let depth = clamp_depth(prev, self.blocks.get(index), desired_depth);

        log::debug!(
            "insert {} at {index}: desired depth {desired_depth}, actual {depth}",
            node.id()
        );
        node.set_depth(depth);
        self.blocks.insert(index, node);
        Ok(depth)
    }

    /// Remove a block and all of its descendants.
    ///
    /// Removed blocks come back with every descendant ahead of its ancestors and the target
    /// last. Removing an absent id returns nothing.
    pub fn remove(&mut self, id: BlockId) -> Vec<BlockNode> {
        let Some(index) = self.index_of(id) else {
            return Vec::new();
        };
        let end = self.subtree_end(index);
        let mut removed: Vec<BlockNode> = self.blocks.drain(index..end).collect();
        removed.reverse();

        log::debug!("removed {id} with {} descendant(s)", removed.len() - 1);
        removed
    }

    pub fn find_parent(&self, id: BlockId) -> Option<&BlockNode> {
        let index = self.index_of(id)?;
        let depth = self.blocks[index].depth().checked_sub(1)?;
        self.blocks[..index]
            .iter()
            .rev()
            .find(|block| block.depth() == depth)
    }

    /// Ancestors from the parent outwards
    pub fn find_ancestors(&self, id: BlockId) -> Vec<&BlockNode> {
        let Some(index) = self.index_of(id) else {
            return Vec::new();
        };
        let mut lowest = self.blocks[index].depth();
        let mut ancestors = Vec::new();
        for block in self.blocks[..index].iter().rev() {
            if lowest == 0 {
                break;
            }
            if block.depth() < lowest {
                lowest = block.depth();
                ancestors.push(block);
            }
        }
        ancestors
    }

    /// Direct children in display order
    pub fn find_children(&self, id: BlockId) -> Vec<&BlockNode> {
        let Some(index) = self.index_of(id) else {
            return Vec::new();
        };
        let child_depth = self.blocks[index].depth() + 1;
        self.blocks[index + 1..self.subtree_end(index)]
            .iter()
            .filter(|block| block.depth() == child_depth)
            .collect()
    }

    /// Every descendant in display order
    pub fn find_descendants(&self, id: BlockId) -> Vec<&BlockNode> {
        let Some(index) = self.index_of(id) else {
            return Vec::new();
        };
        self.blocks[index + 1..self.subtree_end(index)].iter().collect()
    }

    /// Nearest block before `index` at exactly `depth`, unless a shallower block comes first
    pub fn find_preceding_sibling_at_depth(
        &self,
        index: usize,
        depth: usize,
    ) -> Option<&BlockNode> {
        let index = index.min(self.blocks.len());
        let mut lowest = usize::MAX;

        for block in self.blocks[..index].iter().rev() {
            if block.depth() < lowest {
                if block.depth() == depth {
                    return Some(block);
                }
                lowest = block.depth();
            }
        }
        None
    }

    /// How a host should attach the block with `id` to its rendered neighbours
    pub fn placement_of(&self, id: BlockId) -> Option<Placement> {
        let index = self.index_of(id)?;
        if index == 0 {
            return Some(Placement::Start);
        }
        let depth = self.blocks[index].depth();
        let placement = match self.find_preceding_sibling_at_depth(index, depth) {
            Some(sibling) => Placement::After(sibling.id()),
            None => Placement::FirstChildOf(self.blocks[index - 1].id()),
        };
        Some(placement)
    }

    /// Re-level a block and its subtree. Returns the block's actual depth.
    pub fn set_depth(&mut self, id: BlockId, desired_depth: usize) -> Option<usize> {
        let index = self.index_of(id)?;
        let end = self.subtree_end(index);
        let prev = index.checked_sub(1).map(|i| &self.blocks[i]);
        let depth = clamp_depth(prev, self.blocks.get(end), desired_depth);

        let old = self.blocks[index].depth();
        if depth != old {
            log::debug!("set depth of {id} from {old} to {depth}");
            for block in &mut self.blocks[index..end] {
                let relative = block.depth() - old;
                block.set_depth(depth + relative);
            }
        }
        Some(depth)
    }

    /// Move a block with its subtree so it lands at `to_index` of the remaining sequence.
    ///
    /// The block's depth is clamped as on insert and descendants follow by the same delta.
    pub fn move_subtree(
        &mut self,
        id: BlockId,
        to_index: usize,
        desired_depth: usize,
    ) -> Option<usize> {
        let index = self.index_of(id)?;
        let end = self.subtree_end(index);
        let mut run: Vec<BlockNode> = self.blocks.drain(index..end).collect();

        let to = to_index.min(self.blocks.len());
        let prev = to.checked_sub(1).map(|i| &self.blocks[i]);
        let depth = clamp_depth(prev, self.blocks.get(to), desired_depth);

        let old = run[0].depth();
        for block in &mut run {
            let relative = block.depth() - old;
            block.set_depth(depth + relative);
        }

        log::debug!(
            "moved {id} with {} descendant(s) from {index} to {to} at depth {depth}",
            run.len() - 1
        );
        self.blocks.splice(to..to, run);
        Some(depth)
    }

    /// Reorder to match `order`, keeping every block's depth.
    ///
    /// Refused, leaving the list untouched, when `order` is not a permutation of the current
    /// ids or when the resulting depths would not be a valid encoding.
    pub fn reconcile(&mut self, order: &[BlockId]) -> bool {
        if order.len() != self.blocks.len() {
            log::warn!(
                "reorder rejected: {} ids given for {} blocks",
                order.len(),
                self.blocks.len()
            );
            return false;
        }

        let positions: HashMap<BlockId, usize> = self
            .blocks
            .iter()
            .enumerate()
            .map(|(i, block)| (block.id(), i))
            .collect();

        let mut seen = HashSet::with_capacity(order.len());
        let mut mapping = Vec::with_capacity(order.len());
        for id in order {
            match positions.get(id) {
                Some(&position) if seen.insert(*id) => mapping.push(position),
                _ => {
                    log::warn!("reorder rejected: {id} is unknown or repeated");
                    return false;
                }
            }
        }

        if !depths_well_formed(mapping.iter().map(|&i| self.blocks[i].depth())) {
            log::warn!("reorder rejected: depths would break nesting");
            return false;
        }

        let mut slots: Vec<Option<BlockNode>> =
            std::mem::take(&mut self.blocks).into_iter().map(Some).collect();
        self.blocks = mapping
            .into_iter()
            .filter_map(|position| slots[position].take())
            .collect();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{leaf_type, node, outline, parent_type};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// Build a list straight from (id, depth) pairs of parent-capable blocks
    fn list(layout: &[(u64, usize)]) -> BlockList {
        let mut list = BlockList::new();
        for &(id, depth) in layout {
            let mut block = node(id, parent_type());
            block.set_depth(depth);
            list.push_loaded(block).unwrap();
        }
        list
    }

    fn id(n: u64) -> BlockId {
        BlockId::Persisted(n)
    }

    fn ids(blocks: &[&BlockNode]) -> Vec<BlockId> {
        blocks.iter().map(|b| b.id()).collect()
    }

    #[rstest]
    #[case::empty(vec![], true)]
    #[case::flat(vec![0, 0, 0], true)]
    #[case::nested(vec![0, 1, 2, 1, 0], true)]
    #[case::deep_drop(vec![0, 1, 2, 3, 0], true)]
    #[case::first_not_root(vec![1, 0], false)]
    #[case::jump(vec![0, 2], false)]
    fn test_depths_well_formed(#[case] depths: Vec<usize>, #[case] expected: bool) {
        assert_eq!(depths_well_formed(depths), expected);
    }

    #[test]
    fn test_insert_at_zero_forces_root() {
        let mut list = list(&[(1, 0), (2, 1)]);
        let depth = list.insert(node(3, parent_type()), 0, 4).unwrap();

        assert_eq!(depth, 0);
        assert!(list.is_well_formed());
    }

    #[test]
    fn test_insert_clamps_below_leaf() {
        // Given [A@0, B@1] where B may not have children
        let mut list = list(&[(1, 0)]);
        list.insert(node(2, leaf_type()), 1, 1).unwrap();

        // When inserting after B asking for depth 5
        let depth = list.insert(node(3, parent_type()), 2, 5).unwrap();

        // Then the depth is capped at B's level
        assert_eq!(depth, 1);
        assert_eq!(outline(&list), "1@0 2@1 3@1");
    }

    #[test]
    fn test_insert_keeps_following_block_attached() {
        // Inserting before a child can't be shallower than that child
        let mut list = list(&[(1, 0), (2, 1)]);
        let depth = list.insert(node(3, parent_type()), 1, 0).unwrap();

        assert_eq!(depth, 1);
        assert_eq!(list.find_parent(id(2)).map(|b| b.id()), Some(id(1)));
    }

    #[test]
    fn test_insert_index_past_end_appends() {
        let mut list = list(&[(1, 0)]);
        list.insert(node(2, parent_type()), 99, 1).unwrap();

        assert_eq!(outline(&list), "1@0 2@1");
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut list = list(&[(1, 0)]);
        let result = list.insert(node(1, parent_type()), 1, 0);

        assert_eq!(result, Err(EngineError::DuplicateBlockId(id(1))));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_children_and_cascade_remove() {
        let mut list = list(&[(1, 0), (2, 1), (3, 1), (4, 0)]);

        assert_eq!(ids(&list.find_children(id(1))), vec![id(2), id(3)]);

        let removed = list.remove(id(1));

        assert_eq!(
            removed.iter().map(BlockNode::id).collect::<Vec<_>>(),
            vec![id(3), id(2), id(1)]
        );
        assert_eq!(outline(&list), "4@0");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut list = list(&[(1, 0), (2, 1)]);

        assert_eq!(list.remove(id(1)).len(), 2);
        assert!(list.remove(id(1)).is_empty());
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_length_matches_descendants() {
        let mut list = list(&[(1, 0), (2, 1), (3, 2), (4, 1), (5, 0), (6, 1)]);
        let before = list.len();
        let descendants = list.find_descendants(id(2)).len();

        list.remove(id(2));

        assert_eq!(list.len(), before - 1 - descendants);
        assert!(list.is_well_formed());
    }

    #[test]
    fn test_find_descendants_and_parent() {
        let list = list(&[(1, 0), (2, 1), (3, 2), (4, 1), (5, 0)]);

        assert_eq!(ids(&list.find_descendants(id(1))), vec![id(2), id(3), id(4)]);
        assert_eq!(list.find_parent(id(3)).map(|b| b.id()), Some(id(2)));
        assert_eq!(list.find_parent(id(4)).map(|b| b.id()), Some(id(1)));
        assert!(list.find_parent(id(5)).is_none());
        assert!(list.find_parent(id(99)).is_none());
    }

    #[test]
    fn test_find_ancestors_nearest_first() {
        let list = list(&[(1, 0), (2, 1), (3, 2), (4, 1), (5, 2), (6, 3)]);

        assert_eq!(ids(&list.find_ancestors(id(6))), vec![id(5), id(4), id(1)]);
        assert!(list.find_ancestors(id(1)).is_empty());
    }

    #[test]
    fn test_preceding_sibling_stops_at_shallower_block() {
        let list = list(&[(1, 0), (2, 1), (3, 2), (4, 0), (5, 1)]);

        // From index 5, depth 1: block 5 is found before the root 4
        assert_eq!(
            list.find_preceding_sibling_at_depth(5, 1).map(|b| b.id()),
            Some(id(5))
        );
        // From index 3, depth 1: 3 is deeper, 2 matches
        assert_eq!(
            list.find_preceding_sibling_at_depth(3, 1).map(|b| b.id()),
            Some(id(2))
        );
        // From index 4, depth 1: the root 4 is shallower and comes first
        assert!(list.find_preceding_sibling_at_depth(4, 1).is_none());
        assert!(list.find_preceding_sibling_at_depth(5, 2).is_none());
    }

    #[test]
    fn test_placement() {
        let list = list(&[(1, 0), (2, 1), (3, 1), (4, 0)]);

        assert_eq!(list.placement_of(id(1)), Some(Placement::Start));
        assert_eq!(list.placement_of(id(2)), Some(Placement::FirstChildOf(id(1))));
        assert_eq!(list.placement_of(id(3)), Some(Placement::After(id(2))));
        assert_eq!(list.placement_of(id(4)), Some(Placement::After(id(1))));
    }

    #[test]
    fn test_set_depth_moves_subtree() {
        let mut list = list(&[(1, 0), (2, 0), (3, 1), (4, 0)]);

        assert_eq!(list.set_depth(id(2), 1), Some(1));
        assert_eq!(outline(&list), "1@0 2@1 3@2 4@0");

        // Can't go deeper than one below the previous block
        assert_eq!(list.set_depth(id(2), 7), Some(1));
        assert_eq!(list.set_depth(id(1), 3), Some(0));
        assert!(list.is_well_formed());
    }

    #[test]
    fn test_move_subtree_recomputes_depth() {
        // Given [1@0, 2@1, 3@2, 4@0]
        let mut list = list(&[(1, 0), (2, 1), (3, 2), (4, 0)]);

        // When 2 (with child 3) is dragged below 4 as its child
        let depth = list.move_subtree(id(2), 2, 1);

        // Then the whole run is re-levelled under 4
        assert_eq!(depth, Some(1));
        assert_eq!(outline(&list), "1@0 4@0 2@1 3@2");
    }

    #[test]
    fn test_move_subtree_to_front_becomes_root() {
        let mut list = list(&[(1, 0), (2, 1), (3, 2)]);

        assert_eq!(list.move_subtree(id(2), 0, 1), Some(0));
        assert_eq!(outline(&list), "2@0 3@1 1@0");
        assert!(list.move_subtree(id(99), 0, 0).is_none());
    }

    #[test]
    fn test_reconcile_preserves_depths() {
        let mut list = list(&[(1, 0), (2, 1), (3, 0)]);

        assert!(list.reconcile(&[id(3), id(1), id(2)]));
        assert_eq!(outline(&list), "3@0 1@0 2@1");
    }

    #[rstest]
    #[case::missing(vec![1, 2])]
    #[case::repeated(vec![1, 1, 3])]
    #[case::unknown(vec![1, 2, 9])]
    #[case::child_first(vec![2, 1, 3])]
    fn test_reconcile_rejects(#[case] order: Vec<u64>) {
        let mut list = list(&[(1, 0), (2, 1), (3, 0)]);
        let order: Vec<BlockId> = order.into_iter().map(id).collect();

        assert!(!list.reconcile(&order));
        assert_eq!(outline(&list), "1@0 2@1 3@0");
    }

    #[test]
    fn test_push_loaded_validates_depth() {
        let mut list = BlockList::new();
        let mut deep = node(1, parent_type());
        deep.set_depth(1);

        assert_eq!(
            list.push_loaded(deep),
            Err(EngineError::InvalidInitialDepth {
                id: id(1),
                depth: 1,
                max: 0
            })
        );
    }

    #[test]
    fn test_invariant_holds_under_mixed_mutations() {
        let mut list = list(&[(1, 0)]);
        let mut next = 2;

        // A deterministic walk over inserts, moves and removals
        for step in 0..60usize {
            match step % 5 {
                0 | 1 => {
                    let index = (step * 7) % (list.len() + 1);
                    list.insert(node(next, parent_type()), index, step % 4).unwrap();
                    next += 1;
                }
                2 => {
                    if let Some(block) = list.at(step % list.len().max(1)) {
                        let target = block.id();
                        list.set_depth(target, (step / 3) % 3);
                    }
                }
                3 => {
                    if let Some(block) = list.at((step * 3) % list.len().max(1)) {
                        let target = block.id();
                        list.move_subtree(target, step % (list.len() + 1), step % 3);
                    }
                }
                _ => {
                    if list.len() > 3
                        && let Some(block) = list.at((step * 5) % list.len())
                    {
                        let target = block.id();
                        list.remove(target);
                    }
                }
            }
            assert!(list.is_well_formed(), "step {step}: {}", outline(&list));
        }
    }
}
