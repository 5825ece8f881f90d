use crate::error::{EngineError, EngineResult};
use crate::models::block_type::{BlockTypeDef, ChildBlocks, GroupDef};
use std::collections::HashMap;
use std::sync::Arc;

/// One entry of an insertion menu before quota is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    Group(GroupDef),
    BlockType(Arc<BlockTypeDef>),
}

impl MenuItem {
    pub fn sort_order(&self) -> i32 {
        match self {
            MenuItem::Group(group) => group.sort_order,
            MenuItem::BlockType(def) => def.sort_order(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MenuItem::Group(group) => &group.name,
            MenuItem::BlockType(def) => def.name(),
        }
    }

    pub fn block_type(&self) -> Option<&Arc<BlockTypeDef>> {
        match self {
            MenuItem::BlockType(def) => Some(def),
            MenuItem::Group(_) => None,
        }
    }
}

/// Immutable catalog of block types and groups
#[derive(Debug, Clone, Default)]
pub struct BlockTypeRegistry {
    types: Vec<Arc<BlockTypeDef>>,
    by_handle: HashMap<String, usize>,
    groups: Vec<GroupDef>,
}

impl BlockTypeRegistry {
    pub fn new(types: Vec<BlockTypeDef>, groups: Vec<GroupDef>) -> EngineResult<Self> {
        let mut by_handle = HashMap::with_capacity(types.len());
        for (index, def) in types.iter().enumerate() {
            if by_handle.insert(def.handle().to_string(), index).is_some() {
                return Err(EngineError::DuplicateBlockType(def.handle().to_string()));
            }
        }

        Ok(Self {
            types: types.into_iter().map(Arc::new).collect(),
            by_handle,
            groups,
        })
    }

    pub fn get(&self, handle: &str) -> Option<&Arc<BlockTypeDef>> {
        self.by_handle.get(handle).map(|&index| &self.types[index])
    }

    pub fn block_types(&self) -> &[Arc<BlockTypeDef>] {
        &self.types
    }

    pub fn groups(&self) -> &[GroupDef] {
        &self.groups
    }

    /// Types then groups, stably sorted by sort order
    pub fn items(&self) -> Vec<MenuItem> {
        let mut items: Vec<MenuItem> = self
            .types
            .iter()
            .cloned()
            .map(MenuItem::BlockType)
            .chain(self.groups.iter().cloned().map(MenuItem::Group))
            .collect();
        items.sort_by_key(MenuItem::sort_order);
        items
    }

    /// Items offered as children of `parent`.
    ///
    /// A group survives an explicit child list only while at least one of the types it heads
    /// is in that list.
    pub fn child_items(&self, parent: &BlockTypeDef) -> Vec<MenuItem> {
        match parent.child_blocks() {
            ChildBlocks::None => Vec::new(),
            ChildBlocks::All => self.items(),
            ChildBlocks::Only(handles) => {
                let mut result = Vec::new();
                let mut pending_group = None;

                for item in self.items() {
                    let listed = item
                        .block_type()
                        .map(|def| handles.iter().any(|h| h == def.handle()));

                    match listed {
                        None => pending_group = Some(item),
                        Some(true) => {
                            if let Some(group) = pending_group.take() {
                                result.push(group);
                            }
                            result.push(item);
                        }
                        Some(false) => {}
                    }
                }

                result
            }
        }
    }
}
