use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which block types may be nested directly under a block of a given type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ChildBlocksRepr", into = "ChildBlocksRepr")]
pub enum ChildBlocks {
    #[default]
    None,
    All,
    Only(Vec<String>),
}

impl ChildBlocks {
    /// Whether a block of `handle` may be a direct child
    pub fn allows(&self, handle: &str) -> bool {
        match self {
            ChildBlocks::None => false,
            ChildBlocks::All => true,
            ChildBlocks::Only(handles) => handles.iter().any(|h| h == handle),
        }
    }

    /// Whether any child at all is permitted
    pub fn allows_any(&self) -> bool {
        match self {
            ChildBlocks::None => false,
            ChildBlocks::All => true,
            ChildBlocks::Only(handles) => !handles.is_empty(),
        }
    }
}

/// Accepted spellings: `"all"`, `"none"`, `true`, `false`, or a list of handles
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ChildBlocksRepr {
    Flag(bool),
    Keyword(String),
    Handles(Vec<String>),
}

impl TryFrom<ChildBlocksRepr> for ChildBlocks {
    type Error = String;

    fn try_from(repr: ChildBlocksRepr) -> Result<Self, Self::Error> {
        match repr {
            ChildBlocksRepr::Flag(true) => Ok(ChildBlocks::All),
            ChildBlocksRepr::Flag(false) => Ok(ChildBlocks::None),
            ChildBlocksRepr::Keyword(word) => match word.as_str() {
                "all" => Ok(ChildBlocks::All),
                "none" => Ok(ChildBlocks::None),
                other => Err(format!(
                    "child_blocks must be \"all\", \"none\" or a list of handles, got {other:?}"
                )),
            },
            ChildBlocksRepr::Handles(handles) => Ok(ChildBlocks::Only(handles)),
        }
    }
}

impl From<ChildBlocks> for ChildBlocksRepr {
    fn from(children: ChildBlocks) -> Self {
        match children {
            ChildBlocks::None => ChildBlocksRepr::Keyword("none".to_string()),
            ChildBlocks::All => ChildBlocksRepr::Keyword("all".to_string()),
            ChildBlocks::Only(handles) => ChildBlocksRepr::Handles(handles),
        }
    }
}

/// A single field inside a block type's layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub handle: String,
    #[serde(default)]
    pub label: String,
    pub field_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TabDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

/// Tabbed field layout of a block type. Only preview formatting looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub tabs: Vec<TabDef>,
}

impl FieldLayout {
    /// All fields in tab order
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.tabs.iter().flat_map(|tab| tab.fields.iter())
    }

    /// Field handle to field type
    pub fn field_types(&self) -> BTreeMap<&str, &str> {
        self.fields()
            .map(|field| (field.handle.as_str(), field.field_type.as_str()))
            .collect()
    }
}

/// Definition of a kind of block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTypeDef {
    handle: String,
    name: String,
    #[serde(default)]
    max_blocks: usize,
    #[serde(default)]
    sort_order: i32,
    #[serde(default)]
    child_blocks: ChildBlocks,
    #[serde(default)]
    field_layout: FieldLayout,
}

impl BlockTypeDef {
    pub fn new(handle: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            name: name.into(),
            max_blocks: 0,
            sort_order: 0,
            child_blocks: ChildBlocks::None,
            field_layout: FieldLayout::default(),
        }
    }

    pub fn with_max_blocks(mut self, max_blocks: usize) -> Self {
        self.max_blocks = max_blocks;
        self
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_child_blocks(mut self, child_blocks: ChildBlocks) -> Self {
        self.child_blocks = child_blocks;
        self
    }

    pub fn with_field_layout(mut self, field_layout: FieldLayout) -> Self {
        self.field_layout = field_layout;
        self
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 0 means unlimited
    pub fn max_blocks(&self) -> usize {
        self.max_blocks
    }

    pub fn sort_order(&self) -> i32 {
        self.sort_order
    }

    pub fn child_blocks(&self) -> &ChildBlocks {
        &self.child_blocks
    }

    pub fn field_layout(&self) -> &FieldLayout {
        &self.field_layout
    }

    /// Whether blocks of this type may have children at all
    pub fn is_parent(&self) -> bool {
        self.child_blocks.allows_any()
    }
}

/// A labelled bucket that heads the block types declared after it in a menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDef {
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
}

impl GroupDef {
    pub fn new(name: impl Into<String>, sort_order: i32) -> Self {
        Self {
            name: name.into(),
            sort_order,
        }
    }
}
