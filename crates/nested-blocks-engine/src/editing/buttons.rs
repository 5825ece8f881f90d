use crate::editing::quota::{QuotaCounts, QuotaGate};
use crate::models::block_id::BlockId;
use crate::models::block_type::BlockTypeDef;
use crate::models::registry::MenuItem;

/// Which menu an insertion request comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuTarget {
    /// The input's own menu, appending top-level blocks
    Root,
    /// A block's child menu
    ChildrenOf(BlockId),
    /// The temporary menu shown above a block
    Above(BlockId),
}

/// Request to create a block of `block_type` at `index` (append when `None`) and `depth`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlockIntent {
    pub block_type: String,
    pub index: Option<usize>,
    pub depth: usize,
}

/// A rendered menu row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Group {
        name: String,
    },
    BlockType {
        handle: String,
        name: String,
        gate: QuotaGate,
    },
}

impl MenuEntry {
    pub fn is_insertable(&self) -> bool {
        matches!(self, MenuEntry::BlockType { gate, .. } if gate.insertable)
    }
}

/// Candidate types and groups of one insertion point
#[derive(Debug, Clone, Default)]
pub struct InsertionMenu {
    items: Vec<MenuItem>,
    max_blocks: usize,
}

impl InsertionMenu {
    pub fn new(items: Vec<MenuItem>, max_blocks: usize) -> Self {
        Self { items, max_blocks }
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// True when no block type is listed
    pub fn is_empty(&self) -> bool {
        self.items.iter().all(|item| item.block_type().is_none())
    }

    fn find(&self, handle: &str) -> Option<&BlockTypeDef> {
        self.items
            .iter()
            .filter_map(MenuItem::block_type)
            .find(|def| def.handle() == handle)
            .map(|def| def.as_ref())
    }

    fn gate(
        &self,
        def: &BlockTypeDef,
        counts: &QuotaCounts,
        parent: Option<&BlockTypeDef>,
    ) -> QuotaGate {
        let parent_allows = parent.is_none_or(|p| p.child_blocks().allows(def.handle()));
        QuotaGate::evaluate(counts, def, self.max_blocks, parent_allows)
    }

    /// Menu rows with a freshly evaluated gate per block type
    pub fn entries(&self, counts: &QuotaCounts, parent: Option<&BlockTypeDef>) -> Vec<MenuEntry> {
        self.items
            .iter()
            .map(|item| match item {
                MenuItem::Group(group) => MenuEntry::Group {
                    name: group.name.clone(),
                },
                MenuItem::BlockType(def) => MenuEntry::BlockType {
                    handle: def.handle().to_string(),
                    name: def.name().to_string(),
                    gate: self.gate(def, counts, parent),
                },
            })
            .collect()
    }

    /// Handles that may be inserted right now
    pub fn insertable(&self, counts: &QuotaCounts, parent: Option<&BlockTypeDef>) -> Vec<String> {
        self.entries(counts, parent)
            .into_iter()
            .filter_map(|entry| match entry {
                MenuEntry::BlockType { handle, gate, .. } if gate.insertable => Some(handle),
                _ => None,
            })
            .collect()
    }

    /// Emit an intent for `handle` unless it is unlisted or gated off
    pub fn request(
        &self,
        handle: &str,
        counts: &QuotaCounts,
        parent: Option<&BlockTypeDef>,
        index: Option<usize>,
        depth: usize,
    ) -> Option<NewBlockIntent> {
        let Some(def) = self.find(handle) else {
            log::warn!("menu does not list block type '{handle}'");
            return None;
        };

        if !self.gate(def, counts, parent).insertable {
            log::debug!("block type '{handle}' is not insertable here");
            return None;
        }

        Some(NewBlockIntent {
            block_type: handle.to_string(),
            index,
            depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::block_type::{ChildBlocks, GroupDef};
    use std::sync::Arc;

    fn menu(max_blocks: usize) -> InsertionMenu {
        InsertionMenu::new(
            vec![
                MenuItem::Group(GroupDef::new("Basics", 0)),
                MenuItem::BlockType(Arc::new(BlockTypeDef::new("a", "A").with_max_blocks(1))),
                MenuItem::BlockType(Arc::new(BlockTypeDef::new("b", "B"))),
            ],
            max_blocks,
        )
    }

    #[test]
    fn test_entries_reflect_quota() {
        let counts = QuotaCounts::from_handles(["a"]);
        let entries = menu(0).entries(&counts, None);

        assert_eq!(entries.len(), 3);
        assert!(matches!(&entries[0], MenuEntry::Group { name } if name == "Basics"));
        assert!(!entries[1].is_insertable());
        assert!(entries[2].is_insertable());
    }

    #[test]
    fn test_parent_restricts_insertable() {
        let parent =
            BlockTypeDef::new("p", "P").with_child_blocks(ChildBlocks::Only(vec!["b".into()]));

        let insertable = menu(0).insertable(&QuotaCounts::default(), Some(&parent));

        assert_eq!(insertable, vec!["b".to_string()]);
    }

    #[test]
    fn test_request_refuses_unlisted_or_blocked() {
        let menu = menu(2);
        let counts = QuotaCounts::from_handles(["a"]);

        assert_eq!(menu.request("missing", &counts, None, None, 0), None);
        assert_eq!(menu.request("a", &counts, None, None, 0), None);
        assert_eq!(
            menu.request("b", &counts, None, Some(1), 1),
            Some(NewBlockIntent {
                block_type: "b".into(),
                index: Some(1),
                depth: 1
            })
        );

        let full = QuotaCounts::from_handles(["a", "b"]);
        assert_eq!(menu.request("b", &full, None, None, 0), None);
    }

    #[test]
    fn test_menu_without_types_is_empty() {
        let groups_only = InsertionMenu::new(vec![MenuItem::Group(GroupDef::new("G", 0))], 0);

        assert!(groups_only.is_empty());
        assert!(!menu(0).is_empty());
    }
}
