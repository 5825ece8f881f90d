use crate::editing::input::BlockInput;
use crate::models::block_id::BlockId;

/// Entries of a block's settings menu, plus the toggle buttons on its header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAction {
    Collapse,
    Expand,
    ToggleExpansion,
    Disable,
    Enable,
    ToggleEnabled,
    Delete,
    Add,
    Duplicate,
}

impl BlockAction {
    /// Actions that fan out to the selection when the origin is selected
    pub fn is_batched(&self) -> bool {
        !matches!(self, BlockAction::Add | BlockAction::Duplicate)
    }
}

impl BlockInput {
    /// Run `action` chosen on `origin`. Returns true if anything changed.
    ///
    /// Disabled actions are ignored. Toggles resolve against the origin so every target
    /// ends up in the same state.
    pub fn apply(&mut self, origin: BlockId, action: BlockAction) -> bool {
        let Some(states) = self.block_actions(origin) else {
            return false;
        };
        let Some(block) = self.block(origin) else {
            return false;
        };
        let enable_to = !block.is_enabled();
        let expand_to = !block.is_expanded();

        if !action.is_batched() {
            return match action {
                BlockAction::Add if states.add_disabled => {
                    log::debug!("add above {origin} ignored: list is full");
                    false
                }
                BlockAction::Add => self.open_add_above(origin),
                BlockAction::Duplicate if states.duplicate_disabled => {
                    log::debug!("duplicate of {origin} ignored: quota reached");
                    false
                }
                BlockAction::Duplicate => self.duplicate(origin).is_some(),
                _ => false,
            };
        }

        let mut changed = false;
        for id in self.batch_targets(origin) {
            changed |= match action {
                BlockAction::Collapse => self.toggle_expansion(id, Some(false)),
                BlockAction::Expand => self.toggle_expansion(id, Some(true)),
                BlockAction::ToggleExpansion => self.toggle_expansion(id, Some(expand_to)),
                BlockAction::Disable => {
                    let disabled = self.toggle_enabled(id, Some(false));
                    self.toggle_expansion(id, Some(false)) || disabled
                }
                BlockAction::Enable => {
                    let enabled = self.toggle_enabled(id, Some(true));
                    self.toggle_expansion(id, Some(true)) || enabled
                }
                BlockAction::ToggleEnabled => self.toggle_enabled(id, Some(enable_to)),
                BlockAction::Delete => self.remove(id) > 0,
                BlockAction::Add | BlockAction::Duplicate => false,
            };
        }
        changed
    }
}
