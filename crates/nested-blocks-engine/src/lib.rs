pub mod editing;
pub mod error;
pub mod models;
pub mod preview;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use editing::*;
pub use error::{EngineError, EngineResult};
pub use models::block_id::BlockId;
pub use models::block_type::{BlockTypeDef, ChildBlocks, FieldDef, FieldLayout, GroupDef, TabDef};
pub use models::content::{Namespace, RawContent};
pub use models::registry::{BlockTypeRegistry, MenuItem};
pub use preview::{FieldFormatter, PreviewRegistry};
