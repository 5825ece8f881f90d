use crate::models::block_type::BlockTypeDef;
use std::collections::BTreeMap;

/// Block counts derived from the current sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaCounts {
    total: usize,
    by_type: BTreeMap<String, usize>,
}

impl QuotaCounts {
    pub fn from_handles<'a>(handles: impl IntoIterator<Item = &'a str>) -> Self {
        let mut counts = Self::default();
        for handle in handles {
            counts.total += 1;
            *counts.by_type.entry(handle.to_string()).or_default() += 1;
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn of_type(&self, handle: &str) -> usize {
        self.by_type.get(handle).copied().unwrap_or(0)
    }
}

/// Whether a block type may currently be inserted somewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaGate {
    pub global_blocked: bool,
    pub type_blocked: bool,
    pub insertable: bool,
}

impl QuotaGate {
    /// `global_max` and the type's own max of 0 mean unlimited
    pub fn evaluate(
        counts: &QuotaCounts,
        block_type: &BlockTypeDef,
        global_max: usize,
        parent_allows: bool,
    ) -> Self {
        let global_blocked = global_max > 0 && counts.total() >= global_max;
        let type_max = block_type.max_blocks();
        let type_blocked = type_max > 0 && counts.of_type(block_type.handle()) >= type_max;
        let insertable = !global_blocked && !type_blocked && parent_allows;

        log::trace!(
            "gate {}: global_blocked={global_blocked} type_blocked={type_blocked} insertable={insertable}",
            block_type.handle()
        );

        Self {
            global_blocked,
            type_blocked,
            insertable,
        }
    }
}

/// Enabled state of a block's settings actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionStates {
    pub add_disabled: bool,
    pub duplicate_disabled: bool,
}

impl ActionStates {
    /// `subtree` holds the types of the block and each of its descendants, since duplicating
    /// copies all of them
    pub fn evaluate(counts: &QuotaCounts, subtree: &[&BlockTypeDef], global_max: usize) -> Self {
        let added = QuotaCounts::from_handles(subtree.iter().map(|def| def.handle()));

        let global_blocked = global_max > 0 && counts.total() >= global_max;
        let over_global = global_max > 0 && counts.total() + added.total() > global_max;
        let over_type = subtree.iter().any(|def| {
            let max = def.max_blocks();
            max > 0 && counts.of_type(def.handle()) + added.of_type(def.handle()) > max
        });

        log::trace!(
            "actions for {} block(s): global_blocked={global_blocked} over_global={over_global} over_type={over_type}",
            subtree.len()
        );

        Self {
            add_disabled: global_blocked,
            duplicate_disabled: over_global || over_type,
        }
    }
}
