use crate::editing::block::BlockNode;
use crate::models::block_id::BlockId;
use serde::Serialize;
use serde_json::Value;

/// Submitted state of one block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockContent {
    pub id: BlockId,
    pub block_type: String,
    pub depth: usize,
    pub enabled: bool,
    pub collapsed: bool,
    pub modified: bool,
    pub content: Value,
}

impl From<&BlockNode> for BlockContent {
    fn from(block: &BlockNode) -> Self {
        Self {
            id: block.id(),
            block_type: block.type_handle().to_string(),
            depth: block.depth(),
            enabled: block.is_enabled(),
            collapsed: block.is_collapsed(),
            modified: block.is_modified(),
            content: block.content(),
        }
    }
}

/// A block with its children nested under it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentNode {
    #[serde(flatten)]
    pub block: BlockContent,
    pub children: Vec<ContentNode>,
}

/// Rebuild the forest from flat blocks in display order
pub fn build_content_tree(blocks: impl IntoIterator<Item = BlockContent>) -> Vec<ContentNode> {
    let mut result = Vec::new();

    for block in blocks {
        let depth = block.depth;
        let node = ContentNode {
            block,
            children: Vec::new(),
        };
        insert_at_depth(&mut result, node, depth);
    }

    result
}

fn insert_at_depth(items: &mut Vec<ContentNode>, node: ContentNode, depth: usize) {
    if depth == 0 {
        items.push(node);
    } else if let Some(last) = items.last_mut() {
        insert_at_depth(&mut last.children, node, depth - 1);
    } else {
        // No parent at this level, keep it rather than drop it
        items.push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(id: u64, depth: usize) -> BlockContent {
        BlockContent {
            id: BlockId::Persisted(id),
            block_type: "text".into(),
            depth,
            enabled: true,
            collapsed: false,
            modified: false,
            content: json!({}),
        }
    }

    fn shape(nodes: &[ContentNode]) -> String {
        nodes
            .iter()
            .map(|n| {
                if n.children.is_empty() {
                    n.block.id.to_string()
                } else {
                    format!("{}({})", n.block.id, shape(&n.children))
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_tree_from_flat_depths() {
        let tree = build_content_tree(vec![
            content(1, 0),
            content(2, 1),
            content(3, 2),
            content(4, 1),
            content(5, 0),
        ]);

        assert_eq!(shape(&tree), "1(2(3) 4) 5");
    }

    #[test]
    fn test_tree_serializes_flat_fields() {
        let tree = build_content_tree(vec![content(1, 0)]);
        let json = serde_json::to_value(&tree).unwrap();

        assert_eq!(
            json,
            json!([{
                "id": "1",
                "block_type": "text",
                "depth": 0,
                "enabled": true,
                "collapsed": false,
                "modified": false,
                "content": {},
                "children": []
            }])
        );
    }
}
