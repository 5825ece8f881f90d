//! Shared fixtures for unit tests

use crate::editing::block::{BlockData, BlockNode};
use crate::editing::buttons::InsertionMenu;
use crate::editing::input::InputSettings;
use crate::editing::list::BlockList;
use crate::models::block_id::BlockId;
use crate::models::block_type::{BlockTypeDef, ChildBlocks, FieldDef, FieldLayout, GroupDef, TabDef};
use crate::models::content::Namespace;
use std::sync::Arc;

/// A block type that accepts any child
pub fn parent_type() -> Arc<BlockTypeDef> {
    Arc::new(BlockTypeDef::new("container", "Container").with_child_blocks(ChildBlocks::All))
}

/// A block type that accepts no children
pub fn leaf_type() -> Arc<BlockTypeDef> {
    Arc::new(BlockTypeDef::new("leaf", "Leaf"))
}

/// A detached, persisted block at depth 0
pub fn node(id: u64, block_type: Arc<BlockTypeDef>) -> BlockNode {
    let data = BlockData::new(BlockId::Persisted(id), block_type.handle(), 0);
    BlockNode::from_data(
        data,
        block_type,
        &Namespace::parse("fields[blocks]"),
        InsertionMenu::default(),
    )
}

/// `id@depth` for every block in display order
pub fn outline(list: &BlockList) -> String {
    list.iter()
        .map(|block| format!("{}@{}", block.id(), block.depth()))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn data(id: u64, handle: &str, depth: usize) -> BlockData {
    BlockData::new(BlockId::Persisted(id), handle, depth)
}

/// Catalog used by input tests:
/// `section` takes `text` and `quote` children, `text` is a leaf, `quote` is limited to one
pub fn settings(blocks: Vec<BlockData>) -> InputSettings {
    let body = FieldLayout {
        id: Some(1),
        tabs: vec![TabDef {
            name: "Content".into(),
            fields: vec![FieldDef {
                handle: "body".into(),
                label: "Body".into(),
                field_type: "PlainText".into(),
            }],
        }],
    };

    InputSettings {
        block_types: vec![
            BlockTypeDef::new("section", "Section")
                .with_sort_order(1)
                .with_child_blocks(ChildBlocks::Only(vec!["text".into(), "quote".into()])),
            BlockTypeDef::new("text", "Text")
                .with_sort_order(2)
                .with_field_layout(body),
            BlockTypeDef::new("quote", "Quote")
                .with_sort_order(3)
                .with_max_blocks(1),
        ],
        groups: vec![GroupDef::new("Content", 0)],
        blocks,
        ..InputSettings::default()
    }
}
