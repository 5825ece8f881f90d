use crate::editing::block::{BlockData, BlockNode};
use crate::editing::buttons::{InsertionMenu, MenuEntry, MenuTarget, NewBlockIntent};
use crate::editing::events::{BlockEvent, EventBus, HasSubject, InputEvent, SubscriptionId};
use crate::editing::list::{BlockList, Placement};
use crate::editing::quota::ActionStates;
use crate::editing::selection::Selection;
use crate::editing::snapshot::{build_content_tree, BlockContent, ContentNode};
use crate::editing::watcher::WatchStrategy;
use crate::error::{EngineError, EngineResult};
use crate::models::block_id::BlockId;
use crate::models::block_type::{BlockTypeDef, GroupDef};
use crate::models::content::Namespace;
use crate::models::registry::BlockTypeRegistry;
use crate::preview::PreviewRegistry;
use serde_json::Value;
use std::time::Instant;

pub const DEFAULT_NAMESPACE: &str = "fields[blocks]";

/// Everything a host provides to build a [`BlockInput`]
#[derive(Debug, Clone)]
pub struct InputSettings {
    pub namespace: Namespace,
    pub block_types: Vec<BlockTypeDef>,
    pub groups: Vec<GroupDef>,
    pub blocks: Vec<BlockData>,
    /// 0 means unlimited
    pub max_blocks: usize,
    pub watch: WatchStrategy,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            namespace: Namespace::parse(DEFAULT_NAMESPACE),
            block_types: Vec::new(),
            groups: Vec::new(),
            blocks: Vec::new(),
            max_blocks: 0,
            watch: WatchStrategy::default(),
        }
    }
}

/// Coordinates the block list with menus, selection, change detection and host listeners
#[derive(Debug)]
pub struct BlockInput {
    namespace: Namespace,
    registry: BlockTypeRegistry,
    blocks: BlockList,
    selection: Selection,
    max_blocks: usize,
    watch: WatchStrategy,
    previews: PreviewRegistry,
    menu: InsertionMenu,
    add_above: Option<BlockId>,
    events: EventBus<InputEvent>,
}

impl BlockInput {
    pub fn new(settings: InputSettings) -> EngineResult<Self> {
        Self::with_previews(settings, PreviewRegistry::default())
    }

    /// Build from host data. Fails on unknown types, repeated ids or malformed depths.
    pub fn with_previews(settings: InputSettings, previews: PreviewRegistry) -> EngineResult<Self> {
        let registry = BlockTypeRegistry::new(settings.block_types, settings.groups)?;
        let menu = InsertionMenu::new(registry.items(), settings.max_blocks);

        let mut input = Self {
            namespace: settings.namespace,
            registry,
            blocks: BlockList::new(),
            selection: Selection::new(),
            max_blocks: settings.max_blocks,
            watch: settings.watch,
            previews,
            menu,
            add_above: None,
            events: EventBus::new(),
        };

        for data in settings.blocks {
            let Some(block_type) = input.registry.get(&data.block_type).cloned() else {
                return Err(EngineError::UnknownBlockType {
                    id: data.id,
                    handle: data.block_type,
                });
            };
            let menu = input.child_menu(&block_type);
            let block = BlockNode::from_data(data, block_type, &input.namespace, menu);
            input.blocks.push_loaded(block)?;
        }

        let watch = input.watch;
        let previews = &input.previews;
        for block in input.blocks.iter_mut() {
            if block.is_collapsed() {
                block.update_preview(previews);
            }
            block.init_ui(watch);
        }

        log::debug!(
            "block input ready: {} block(s), {} type(s), max {}",
            input.blocks.len(),
            input.registry.block_types().len(),
            input.max_blocks
        );
        Ok(input)
    }

    fn child_menu(&self, block_type: &BlockTypeDef) -> InsertionMenu {
        InsertionMenu::new(self.registry.child_items(block_type), self.max_blocks)
    }

    fn emit(&mut self, event: InputEvent) {
        log::debug!("{}", event.subject());
        self.events.emit(&event);
    }

    fn emit_order(&mut self) {
        let sequence = self.blocks.iter().map(BlockNode::summary).collect();
        self.emit(InputEvent::OrderChanged { sequence });
    }

    fn emit_selection(&mut self) {
        let ids = self.selection.in_display_order(&self.blocks);
        self.emit(InputEvent::SelectionChanged { ids });
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn registry(&self) -> &BlockTypeRegistry {
        &self.registry
    }

    pub fn blocks(&self) -> &BlockList {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&BlockNode> {
        self.blocks.get(id)
    }

    pub fn max_blocks(&self) -> usize {
        self.max_blocks
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&InputEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Listen to one block. `None` if the block is unknown.
    pub fn subscribe_block(
        &mut self,
        id: BlockId,
        listener: impl FnMut(&BlockEvent) + 'static,
    ) -> Option<SubscriptionId> {
        self.blocks.get_mut(id)?.subscribe(listener)
    }

    pub fn unsubscribe_block(&mut self, id: BlockId, subscription: SubscriptionId) -> bool {
        self.blocks
            .get_mut(id)
            .is_some_and(|block| block.unsubscribe(subscription))
    }

    fn mint_id(&self) -> BlockId {
        loop {
            let id = BlockId::mint();
            if !self.blocks.contains(id) {
                return id;
            }
        }
    }

    /// A new, not yet inserted block of type `handle`
    pub fn create_block(&self, handle: &str) -> Option<BlockNode> {
        let block_type = self.registry.get(handle)?.clone();
        let menu = self.child_menu(&block_type);
        Some(BlockNode::new(self.mint_id(), block_type, &self.namespace, menu))
    }

    /// Insert `block` at `index` (append when `None`). Returns the clamped depth.
    pub fn insert(
        &mut self,
        block: BlockNode,
        index: Option<usize>,
        depth: usize,
    ) -> EngineResult<usize> {
        let index = index.unwrap_or(self.blocks.len()).min(self.blocks.len());
        let id = block.id();
        let depth = self.blocks.insert(block, index, depth)?;

        let watch = self.watch;
        let Some(block) = self.blocks.get_mut(id) else {
            return Ok(depth);
        };
        block.init_ui(watch);
        let summary = block.summary();

        self.add_above = None;
        let placement = self.blocks.placement_of(id).unwrap_or(Placement::Start);
        self.emit(InputEvent::BlockAdded {
            block: summary,
            index,
            placement,
        });
        Ok(depth)
    }

    fn intent(&self, handle: &str, target: MenuTarget) -> Option<NewBlockIntent> {
        let counts = self.blocks.quota_counts();
        match target {
            MenuTarget::Root => self.menu.request(handle, &counts, None, None, 0),
            MenuTarget::ChildrenOf(parent_id) => {
                let index = self.blocks.index_of(parent_id)?;
                let parent = self.blocks.at(index)?;
                parent.menu().request(
                    handle,
                    &counts,
                    Some(parent.block_type().as_ref()),
                    Some(index + 1),
                    parent.depth() + 1,
                )
            }
            MenuTarget::Above(anchor_id) => {
                let index = self.blocks.index_of(anchor_id)?;
                let anchor = self.blocks.at(index)?;
                let parent = self.blocks.find_parent(anchor_id);
                self.menu.request(
                    handle,
                    &counts,
                    parent.map(|p| p.block_type().as_ref()),
                    Some(index),
                    anchor.depth(),
                )
            }
        }
    }

    /// Create and insert a block from a menu. `None` if the menu refuses.
    pub fn new_block(&mut self, handle: &str, target: MenuTarget) -> Option<BlockId> {
        let intent = self.intent(handle, target)?;
        let block = self.create_block(&intent.block_type)?;
        let id = block.id();
        match self.insert(block, intent.index, intent.depth) {
            Ok(_) => Some(id),
            Err(err) => {
                log::warn!("failed to insert new block: {err}");
                None
            }
        }
    }

    /// Remove a block with its descendants. Returns how many blocks went.
    pub fn remove(&mut self, id: BlockId) -> usize {
        let removed = self.blocks.remove(id);
        if removed.is_empty() {
            return 0;
        }

        self.add_above = None;
        let count = removed.len();
        for mut block in removed {
            block.destroy();
            self.emit(InputEvent::BlockRemoved {
                block: block.summary(),
            });
        }
        if self.selection.retain_present(&self.blocks) {
            self.emit_selection();
        }
        count
    }

    /// Re-level a block and its subtree
    pub fn set_depth(&mut self, id: BlockId, depth: usize) -> Option<usize> {
        let old = self.blocks.get(id)?.depth();
        let depth = self.blocks.set_depth(id, depth)?;
        if depth != old {
            self.emit_order();
        }
        Some(depth)
    }

    /// Drag a block and its subtree to `to_index` of the remaining list
    pub fn move_subtree(&mut self, id: BlockId, to_index: usize, depth: usize) -> Option<usize> {
        let before: Vec<(BlockId, usize)> =
            self.blocks.iter().map(|b| (b.id(), b.depth())).collect();
        let depth = self.blocks.move_subtree(id, to_index, depth)?;
        let changed = self
            .blocks
            .iter()
            .map(|b| (b.id(), b.depth()))
            .ne(before.into_iter());
        if changed {
            self.emit_order();
        }
        Some(depth)
    }

    /// Adopt an order produced by a drag surface. Depths are kept as they were.
    pub fn reconcile_after_external_reorder(&mut self, order: &[BlockId]) -> bool {
        let unchanged = self.blocks.ids() == order;
        if !self.blocks.reconcile(order) {
            return false;
        }
        if !unchanged {
            self.emit_order();
        }
        true
    }

    pub fn toggle_enabled(&mut self, id: BlockId, enable: Option<bool>) -> bool {
        self.blocks
            .get_mut(id)
            .is_some_and(|block| block.toggle_enabled(enable))
    }

    pub fn toggle_expansion(&mut self, id: BlockId, expand: Option<bool>) -> bool {
        let previews = &self.previews;
        self.blocks
            .get_mut(id)
            .is_some_and(|block| block.toggle_expansion(expand, previews))
    }

    /// Whether some ancestor of the block is disabled
    pub fn is_inert(&self, id: BlockId) -> bool {
        self.blocks
            .find_ancestors(id)
            .iter()
            .any(|ancestor| !ancestor.is_enabled())
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Selected ids in display order
    pub fn selected_blocks(&self) -> Vec<BlockId> {
        self.selection.in_display_order(&self.blocks)
    }

    pub fn batch_targets(&self, origin: BlockId) -> Vec<BlockId> {
        self.selection.batch_targets(origin, &self.blocks)
    }

    pub fn select(&mut self, id: BlockId) -> bool {
        if !self.blocks.contains(id) || !self.selection.select(id) {
            return false;
        }
        self.emit_selection();
        true
    }

    pub fn deselect(&mut self, id: BlockId) -> bool {
        if !self.selection.deselect(id) {
            return false;
        }
        self.emit_selection();
        true
    }

    /// Returns whether the block is selected afterwards
    pub fn toggle_selection(&mut self, id: BlockId) -> bool {
        if !self.blocks.contains(id) {
            return false;
        }
        let selected = self.selection.toggle(id);
        self.emit_selection();
        selected
    }

    pub fn clear_selection(&mut self) -> bool {
        if !self.selection.clear() {
            return false;
        }
        self.emit_selection();
        true
    }

    /// Rows of a menu with quota applied
    pub fn menu(&self, target: MenuTarget) -> Vec<MenuEntry> {
        let counts = self.blocks.quota_counts();
        match target {
            MenuTarget::Root => self.menu.entries(&counts, None),
            MenuTarget::ChildrenOf(id) => self
                .blocks
                .get(id)
                .map(|block| block.menu().entries(&counts, Some(block.block_type().as_ref())))
                .unwrap_or_default(),
            MenuTarget::Above(id) => {
                if !self.blocks.contains(id) {
                    return Vec::new();
                }
                let parent = self.blocks.find_parent(id);
                self.menu
                    .entries(&counts, parent.map(|p| p.block_type().as_ref()))
            }
        }
    }

    /// Open the temporary menu above `id`, replacing any open one
    pub fn open_add_above(&mut self, id: BlockId) -> bool {
        if !self.blocks.contains(id) {
            return false;
        }
        self.add_above = Some(id);
        true
    }

    pub fn close_add_above(&mut self) -> bool {
        self.add_above.take().is_some()
    }

    /// Block the temporary menu is open above
    pub fn add_above_target(&self) -> Option<BlockId> {
        self.add_above
    }

    pub fn block_actions(&self, id: BlockId) -> Option<ActionStates> {
        let block = self.blocks.get(id)?;
        let subtree: Vec<&BlockTypeDef> = std::iter::once(block)
            .chain(self.blocks.find_descendants(id))
            .map(|node| node.block_type().as_ref())
            .collect();
        Some(ActionStates::evaluate(
            &self.blocks.quota_counts(),
            &subtree,
            self.max_blocks,
        ))
    }

    /// Copy a block and its descendants right after its subtree. Returns the copy's id.
    ///
    /// Quota is not consulted here; the settings action checks the whole subtree first.
    pub fn duplicate(&mut self, id: BlockId) -> Option<BlockId> {
        let index = self.blocks.index_of(id)?;
        let sources: Vec<BlockId> = std::iter::once(id)
            .chain(self.blocks.find_descendants(id).iter().map(|b| b.id()))
            .collect();

        let mut insert_at = index + sources.len();
        let mut root_copy = None;
        for source in sources {
            let copy = self.blocks.get(source)?.copy_as(self.mint_id(), &self.namespace);
            let copy_id = copy.id();
            let depth = copy.depth();
            if let Err(err) = self.insert(copy, Some(insert_at), depth) {
                log::warn!("failed to duplicate {source}: {err}");
                break;
            }
            root_copy.get_or_insert(copy_id);
            insert_at += 1;
        }
        root_copy
    }

    /// Store a field value by full input name
    pub fn set_field(&mut self, id: BlockId, name: &str, value: Value) -> bool {
        self.blocks
            .get_mut(id)
            .is_some_and(|block| block.set_field(name, value))
    }

    /// Host saw a change inside the block. Returns true if it just became modified.
    pub fn notify_mutation(&mut self, id: BlockId) -> bool {
        self.blocks
            .get_mut(id)
            .is_some_and(|block| block.notify_mutation())
    }

    /// Advance polling watchers. Returns how many blocks just became modified.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.blocks
            .iter_mut()
            .map(|block| block.tick(now))
            .filter(|&modified| modified)
            .count()
    }

    /// Submitted state of every block in display order
    pub fn content(&self) -> Vec<BlockContent> {
        self.blocks.iter().map(BlockContent::from).collect()
    }

    /// Submitted state with children nested under their parents
    pub fn content_tree(&self) -> Vec<ContentNode> {
        build_content_tree(self.content())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{data, settings};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn id(n: u64) -> BlockId {
        BlockId::Persisted(n)
    }

    fn record(input: &mut BlockInput) -> Rc<RefCell<Vec<String>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        input.subscribe(move |event| sink.borrow_mut().push(event.subject().to_string()));
        seen
    }

    #[test]
    fn test_unknown_type_is_fatal() {
        let err = BlockInput::new(settings(vec![data(1, "missing", 0)])).unwrap_err();

        assert_eq!(
            err,
            EngineError::UnknownBlockType {
                id: id(1),
                handle: "missing".into()
            }
        );
    }

    #[test]
    fn test_duplicate_ids_are_fatal() {
        let settings = settings(vec![data(1, "section", 0), data(1, "text", 0)]);

        assert_eq!(
            BlockInput::new(settings).unwrap_err(),
            EngineError::DuplicateBlockId(id(1))
        );
    }

    #[test]
    fn test_depth_jump_is_fatal() {
        let settings = settings(vec![data(1, "section", 0), data(2, "text", 2)]);

        assert_eq!(
            BlockInput::new(settings).unwrap_err(),
            EngineError::InvalidInitialDepth {
                id: id(2),
                depth: 2,
                max: 1
            }
        );
    }

    #[test]
    fn test_new_block_targets() {
        let mut input = BlockInput::new(settings(vec![
            data(1, "section", 0),
            data(2, "text", 1),
            data(3, "section", 0),
        ]))
        .unwrap();

        let child = input.new_block("text", MenuTarget::ChildrenOf(id(1))).unwrap();
        let above = input.new_block("section", MenuTarget::Above(id(3))).unwrap();
        let root = input.new_block("text", MenuTarget::Root).unwrap();

        let layout: Vec<(BlockId, usize)> =
            input.blocks().iter().map(|b| (b.id(), b.depth())).collect();
        assert_eq!(
            layout,
            vec![
                (id(1), 0),
                (child, 1),
                (id(2), 1),
                (above, 0),
                (id(3), 0),
                (root, 0)
            ]
        );
    }

    #[test]
    fn test_child_menu_refuses_disallowed_type() {
        let mut input = BlockInput::new(settings(vec![data(1, "section", 0)])).unwrap();

        assert!(input
            .new_block("section", MenuTarget::ChildrenOf(id(1)))
            .is_none());
        assert_eq!(input.blocks().len(), 1);
    }

    #[test]
    fn test_events_for_remove_and_selection() {
        let mut input = BlockInput::new(settings(vec![
            data(1, "section", 0),
            data(2, "text", 1),
            data(3, "text", 0),
        ]))
        .unwrap();
        input.select(id(2));
        let seen = record(&mut input);

        assert_eq!(input.remove(id(1)), 2);
        assert_eq!(input.remove(id(1)), 0);

        assert_eq!(
            *seen.borrow(),
            vec!["block.removed", "block.removed", "selection.changed"]
        );
        assert!(input.selection().is_empty());
    }

    #[test]
    fn test_reconcile_emits_only_on_change() {
        let mut input =
            BlockInput::new(settings(vec![data(1, "text", 0), data(2, "text", 0)])).unwrap();
        let seen = record(&mut input);

        assert!(input.reconcile_after_external_reorder(&[id(1), id(2)]));
        assert!(input.reconcile_after_external_reorder(&[id(2), id(1)]));
        assert!(!input.reconcile_after_external_reorder(&[id(2)]));

        assert_eq!(*seen.borrow(), vec!["order.changed"]);
    }

    #[test]
    fn test_inert_under_disabled_ancestor() {
        let mut input = BlockInput::new(settings(vec![
            data(1, "section", 0),
            data(2, "section", 1),
            data(3, "text", 2),
        ]))
        .unwrap();

        input.toggle_enabled(id(1), Some(false));

        assert!(!input.is_inert(id(1)));
        assert!(input.is_inert(id(2)));
        assert!(input.is_inert(id(3)));
        // Stored flags are untouched
        assert!(input.block(id(3)).unwrap().is_enabled());
    }

    #[test]
    fn test_add_above_closes_on_insert() {
        let mut input = BlockInput::new(settings(vec![data(1, "text", 0)])).unwrap();

        assert!(input.open_add_above(id(1)));
        assert_eq!(input.add_above_target(), Some(id(1)));

        input.new_block("text", MenuTarget::Above(id(1))).unwrap();

        assert_eq!(input.add_above_target(), None);
        assert_eq!(input.blocks().index_of(id(1)), Some(1));
    }
}
