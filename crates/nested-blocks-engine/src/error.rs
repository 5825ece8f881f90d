use crate::models::block_id::BlockId;

/// Errors raised when the engine is handed malformed input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Duplicate block id: {0}")]
    DuplicateBlockId(BlockId),

    #[error("Duplicate block type handle: {0}")]
    DuplicateBlockType(String),

    #[error("Block {id} has unknown type '{handle}'")]
    UnknownBlockType { id: BlockId, handle: String },

    #[error("Block {id} has depth {depth} but at most {max} is allowed at its position")]
    InvalidInitialDepth {
        id: BlockId,
        depth: usize,
        max: usize,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;
