// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
use nested_blocks_engine::{
    BlockData, BlockId, BlockTypeDef, ChildBlocks, FieldDef, FieldLayout, InputSettings, TabDef,
};
use serde_json::json;

#[allow(dead_code)]
pub fn block_types() -> Vec<BlockTypeDef> {
    vec![
        BlockTypeDef::new("section", "Section").with_child_blocks(ChildBlocks::All),
        BlockTypeDef::new("text", "Text").with_field_layout(FieldLayout {
            id: None,
            tabs: vec![TabDef {
                name: "Content".into(),
                fields: vec![FieldDef {
                    handle: "body".into(),
                    label: "Body".into(),
                    field_type: "PlainText".into(),
                }],
            }],
        }),
    ]
}

/// `sections` roots, each holding a chain of nested sections `depth` deep with a text at
/// every level
#[allow(dead_code)]
pub fn generate_blocks(sections: usize, depth: usize) -> Vec<BlockData> {
    let mut blocks = Vec::new();
    let mut next_id = 1;

    for _ in 0..sections {
        for level in 0..depth {
            blocks.push(BlockData::new(BlockId::Persisted(next_id), "section", level));
            next_id += 1;

            let mut text = BlockData::new(BlockId::Persisted(next_id), "text", level + 1);
            text.content.insert(
                format!("fields[blocks][{next_id}][fields][body]"),
                json!(format!("Paragraph {next_id} with some content")),
            );
            blocks.push(text);
            next_id += 1;
        }
    }

    blocks
}

#[allow(dead_code)]
pub fn generate_settings(sections: usize, depth: usize) -> InputSettings {
    InputSettings {
        block_types: block_types(),
        blocks: generate_blocks(sections, depth),
        ..InputSettings::default()
    }
}
