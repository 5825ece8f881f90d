use crate::editing::buttons::InsertionMenu;
use crate::editing::events::{BlockEvent, BlockSummary, EventBus, SubscriptionId};
use crate::editing::watcher::{ChangeWatcher, WatchStrategy};
use crate::models::block_id::BlockId;
use crate::models::block_type::BlockTypeDef;
use crate::models::content::{assemble_content, rename_namespace, Namespace, RawContent};
use crate::preview::PreviewRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// A block as handed over by the host at load time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockData {
    pub id: BlockId,
    pub block_type: String,
    #[serde(default)]
    pub depth: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub modified: bool,
    #[serde(default)]
    pub content: RawContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl BlockData {
    pub fn new(id: BlockId, block_type: impl Into<String>, depth: usize) -> Self {
        Self {
            id,
            block_type: block_type.into(),
            depth,
            enabled: true,
            collapsed: false,
            modified: false,
            content: RawContent::new(),
            errors: Vec::new(),
        }
    }
}

/// State captured when change detection starts
#[derive(Debug, Clone, PartialEq)]
struct InitialState {
    enabled: bool,
    depth: usize,
    content: RawContent,
}

/// One element of the block list.
///
/// Children are never stored here; they are the nodes following this one in the list with a
/// greater depth.
#[derive(Debug)]
pub struct BlockNode {
    id: BlockId,
    block_type: Arc<BlockTypeDef>,
    namespace: Namespace,
    depth: usize,
    enabled: bool,
    expanded: bool,
    modified: bool,
    content: RawContent,
    errors: Vec<String>,
    preview: String,
    menu: InsertionMenu,
    initial_state: Option<InitialState>,
    watcher: Option<Box<dyn ChangeWatcher>>,
    listeners: EventBus<BlockEvent>,
    initialised: bool,
    destroyed: bool,
}

impl BlockNode {
    /// A block created in the editor: modified and expanded from the start
    pub fn new(
        id: BlockId,
        block_type: Arc<BlockTypeDef>,
        input_namespace: &Namespace,
        menu: InsertionMenu,
    ) -> Self {
        Self {
            id,
            block_type,
            namespace: input_namespace.child(id),
            depth: 0,
            enabled: true,
            expanded: true,
            modified: true,
            content: RawContent::new(),
            errors: Vec::new(),
            preview: String::new(),
            menu,
            initial_state: None,
            watcher: None,
            listeners: EventBus::new(),
            initialised: false,
            destroyed: false,
        }
    }

    /// A block loaded from host data. Validation errors force it expanded.
    pub fn from_data(
        data: BlockData,
        block_type: Arc<BlockTypeDef>,
        input_namespace: &Namespace,
        menu: InsertionMenu,
    ) -> Self {
        let expanded = !data.errors.is_empty() || !data.collapsed;
        Self {
            depth: data.depth,
            enabled: data.enabled,
            expanded,
            modified: data.modified,
            content: data.content,
            errors: data.errors,
            ..Self::new(data.id, block_type, input_namespace, menu)
        }
    }

    /// A fresh copy of this block under `id`, with field names moved to the new namespace
    pub(crate) fn copy_as(&self, id: BlockId, input_namespace: &Namespace) -> Self {
        let mut copy = Self::new(id, self.block_type.clone(), input_namespace, self.menu.clone());
        copy.depth = self.depth;
        copy.enabled = self.enabled;
        copy.expanded = self.expanded;
        copy.content = rename_namespace(&self.content, &self.namespace, &copy.namespace);
        copy.preview = self.preview.clone();
        copy
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn block_type(&self) -> &Arc<BlockTypeDef> {
        &self.block_type
    }

    pub fn type_handle(&self) -> &str {
        self.block_type.handle()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_collapsed(&self) -> bool {
        !self.expanded
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_new(&self) -> bool {
        self.id.is_new()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Summary shown while collapsed
    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// What may be inserted as this block's children
    pub fn menu(&self) -> &InsertionMenu {
        &self.menu
    }

    pub fn raw_content(&self) -> &RawContent {
        &self.content
    }

    /// Field data relative to this block
    pub fn content(&self) -> Value {
        assemble_content(&self.namespace, &self.content)
    }

    /// Full input name of a field in this block
    pub fn field_name(&self, path: &[&str]) -> String {
        self.namespace.field_name(path)
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn watcher(&self) -> Option<&dyn ChangeWatcher> {
        self.watcher.as_deref()
    }

    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            id: self.id,
            block_type: self.type_handle().to_string(),
            depth: self.depth,
            enabled: self.enabled,
            expanded: self.expanded,
            modified: self.modified,
        }
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&BlockEvent) + 'static,
    ) -> Option<SubscriptionId> {
        if self.destroyed {
            return None;
        }
        Some(self.listeners.subscribe(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn emit(&mut self, event: BlockEvent) {
        if !self.destroyed {
            self.listeners.emit(&event);
        }
    }

    /// Attach the block to the UI and start change detection for pristine persisted blocks
    pub fn init_ui(&mut self, strategy: WatchStrategy) {
        if self.initialised || self.destroyed {
            return;
        }
        self.initialised = true;

        if !self.is_new() && !self.modified {
            self.initial_state = Some(self.snapshot());
            let mut watcher = strategy.watcher();
            watcher.start();
            self.watcher = Some(watcher);
        }

        self.emit(BlockEvent::InitUi);
    }

    /// Stop watching, fire the final event and drop every listener
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop_watching();
        if self.initialised {
            self.emit(BlockEvent::Destroy);
        }
        self.listeners.clear();
        self.destroyed = true;
    }

    fn stop_watching(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
    }

    fn snapshot(&self) -> InitialState {
        InitialState {
            enabled: self.enabled,
            depth: self.depth,
            content: self.content.clone(),
        }
    }

    /// Compare against the initial snapshot and latch `modified` on the first difference.
    ///
    /// Returns true only when this call flipped the flag.
    pub fn detect_change(&mut self) -> bool {
        if self.modified {
            return false;
        }
        let Some(initial) = &self.initial_state else {
            return false;
        };
        if *initial == self.snapshot() {
            return false;
        }

        log::debug!("block {} modified", self.id);
        self.modified = true;
        self.stop_watching();
        self.emit(BlockEvent::Modified);
        true
    }

    /// Host reported a change inside the block
    pub fn notify_mutation(&mut self) -> bool {
        let due = self.watcher.as_mut().is_some_and(|w| w.on_mutation());
        due && self.detect_change()
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        let due = self.watcher.as_mut().is_some_and(|w| w.on_tick(now));
        due && self.detect_change()
    }

    /// Store a field value by full input name. Returns true if the value changed.
    pub fn set_field(&mut self, name: &str, value: Value) -> bool {
        if self.content.get(name) == Some(&value) {
            return false;
        }
        self.content.insert(name.to_string(), value);
        self.notify_mutation();
        true
    }

    pub(crate) fn set_depth(&mut self, depth: usize) {
        if self.depth == depth {
            return;
        }
        self.depth = depth;
        self.emit(BlockEvent::DepthChanged { depth });
        self.notify_mutation();
    }

    /// Set or flip the enabled flag. Returns true if it changed.
    pub fn toggle_enabled(&mut self, enable: Option<bool>) -> bool {
        let enabled = enable.unwrap_or(!self.enabled);
        if enabled == self.enabled {
            return false;
        }
        self.enabled = enabled;
        self.emit(BlockEvent::ToggleEnabled { enabled });
        self.notify_mutation();
        true
    }

    /// Set or flip expansion. Collapsing refreshes the preview first.
    pub fn toggle_expansion(&mut self, expand: Option<bool>, previews: &PreviewRegistry) -> bool {
        let expanded = expand.unwrap_or(!self.expanded);
        if expanded == self.expanded {
            return false;
        }
        if !expanded {
            self.update_preview(previews);
        }
        self.expanded = expanded;
        self.emit(BlockEvent::ToggleExpansion { expanded });
        true
    }

    pub fn update_preview(&mut self, previews: &PreviewRegistry) {
        self.preview = previews.summarize(self.block_type.field_layout(), &self.content());
    }
}
