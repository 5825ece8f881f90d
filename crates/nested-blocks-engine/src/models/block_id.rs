use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared by every block in the process so placeholder ids never repeat
static NEXT_NEW_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a block in the list.
///
/// Blocks loaded from a backing store carry the store's numeric id. Blocks created in the
/// editor get a placeholder `new<N>` id until the host persists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "IdRepr", into = "String")]
pub enum BlockId {
    Persisted(u64),
    New(u64),
}

impl BlockId {
    /// Mint a fresh placeholder id
    pub fn mint() -> Self {
        BlockId::New(NEXT_NEW_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether this block has never been persisted
    pub fn is_new(&self) -> bool {
        matches!(self, BlockId::New(_))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Persisted(id) => write!(f, "{id}"),
            BlockId::New(n) => write!(f, "new{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid block id: {0:?}")]
pub struct ParseBlockIdError(pub String);

impl FromStr for BlockId {
    type Err = ParseBlockIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.strip_prefix("new") {
            Some(counter) => counter.parse().map(BlockId::New),
            None => s.parse().map(BlockId::Persisted),
        };
        parsed.map_err(|_| ParseBlockIdError(s.to_string()))
    }
}

impl From<BlockId> for String {
    fn from(id: BlockId) -> Self {
        id.to_string()
    }
}

/// Hosts hand us ids either as JSON numbers or as strings
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(u64),
    Text(String),
}

impl TryFrom<IdRepr> for BlockId {
    type Error = ParseBlockIdError;

    fn try_from(repr: IdRepr) -> Result<Self, Self::Error> {
        match repr {
            IdRepr::Number(id) => Ok(BlockId::Persisted(id)),
            IdRepr::Text(text) => text.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("12", BlockId::Persisted(12))]
    #[case("new0", BlockId::New(0))]
    #[case("new42", BlockId::New(42))]
    fn test_parse_block_id(#[case] input: &str, #[case] expected: BlockId) {
        assert_eq!(input.parse::<BlockId>().unwrap(), expected);
        assert_eq!(expected.to_string(), input);
    }

    #[rstest]
    #[case("")]
    #[case("new")]
    #[case("newer")]
    #[case("-3")]
    fn test_parse_block_id_rejects_garbage(#[case] input: &str) {
        assert_eq!(
            input.parse::<BlockId>(),
            Err(ParseBlockIdError(input.to_string()))
        );
    }

    #[test]
    fn test_minted_ids_are_unique_and_new() {
        let a = BlockId::mint();
        let b = BlockId::mint();

        assert_ne!(a, b);
        assert!(a.is_new());
        assert!(!BlockId::Persisted(7).is_new());
    }

    #[test]
    fn test_deserialize_from_number_or_string() {
        let ids: Vec<BlockId> = serde_json::from_str(r#"[5, "6", "new9"]"#).unwrap();
        assert_eq!(
            ids,
            vec![BlockId::Persisted(5), BlockId::Persisted(6), BlockId::New(9)]
        );

        let json = serde_json::to_string(&BlockId::New(3)).unwrap();
        assert_eq!(json, r#""new3""#);
    }
}
