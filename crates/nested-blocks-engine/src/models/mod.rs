pub mod block_id;
pub mod block_type;
pub mod content;
pub mod registry;
