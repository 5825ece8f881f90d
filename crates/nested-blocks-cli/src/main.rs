use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use nested_blocks_config::{Config, SeedBlock};
use nested_blocks_engine::{
    BlockAction, BlockId, BlockInput, BlockNode, BlockTypeDef, ChildBlocks, FieldDef, FieldLayout,
    GroupDef, MenuEntry, MenuTarget, TabDef,
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use regex::Regex;
use serde_json::json;
use std::{
    collections::BTreeMap,
    env,
    fs::OpenOptions,
    io::{Stdout, stdout},
    path::Path,
    process,
    sync::LazyLock,
    time::{Duration, Instant},
};

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));

/// An insertion menu opened over the outline
struct InsertMenu {
    target: MenuTarget,
    entries: Vec<MenuEntry>,
    state: ListState,
}

struct App {
    input: BlockInput,
    block_list_state: ListState,
    menu: Option<InsertMenu>,
    status: String,
}

impl App {
    fn new(input: BlockInput) -> Self {
        let mut app = Self {
            input,
            block_list_state: ListState::default(),
            menu: None,
            status: String::new(),
        };

        // Select first block if available
        if !app.input.blocks().is_empty() {
            app.block_list_state.select(Some(0));
        }

        app
    }

    fn current(&self) -> Option<&BlockNode> {
        self.block_list_state
            .selected()
            .and_then(|index| self.input.blocks().at(index))
    }

    fn current_id(&self) -> Option<BlockId> {
        self.current().map(BlockNode::id)
    }

    fn focus(&mut self, id: BlockId) {
        if let Some(index) = self.input.blocks().index_of(id) {
            self.block_list_state.select(Some(index));
        }
    }

    /// Keep the cursor on a real row after blocks went away
    fn clamp_cursor(&mut self) {
        let len = self.input.blocks().len();
        let selected = match self.block_list_state.selected() {
            _ if len == 0 => None,
            Some(i) => Some(i.min(len - 1)),
            None => Some(0),
        };
        self.block_list_state.select(selected);
    }

    fn next_block(&mut self) {
        let len = self.input.blocks().len();
        if len == 0 {
            return;
        }
        let i = match self.block_list_state.selected() {
            Some(i) => (i + 1) % len,
            None => 0,
        };
        self.block_list_state.select(Some(i));
    }

    fn previous_block(&mut self) {
        let len = self.input.blocks().len();
        if len == 0 {
            return;
        }
        let i = match self.block_list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.block_list_state.select(Some(i));
    }

    fn open_menu(&mut self, target: MenuTarget) {
        let entries = self.input.menu(target);
        let Some(first) = entries.iter().position(MenuEntry::is_insertable) else {
            self.status = "Nothing can be inserted here".to_string();
            self.input.close_add_above();
            return;
        };

        let mut state = ListState::default();
        state.select(Some(first));
        self.menu = Some(InsertMenu {
            target,
            entries,
            state,
        });
    }

    fn close_menu(&mut self) {
        self.menu = None;
        self.input.close_add_above();
    }

    fn move_menu_cursor(&mut self, forward: bool) {
        let Some(menu) = self.menu.as_mut() else {
            return;
        };
        let len = menu.entries.len();
        let mut i = menu.state.selected().unwrap_or(0);
        // Skip group headings
        for _ in 0..len {
            i = if forward { (i + 1) % len } else { (i + len - 1) % len };
            if matches!(menu.entries[i], MenuEntry::BlockType { .. }) {
                break;
            }
        }
        menu.state.select(Some(i));
    }

    fn confirm_menu(&mut self) {
        let Some(menu) = self.menu.take() else {
            return;
        };
        let chosen = menu
            .state
            .selected()
            .and_then(|i| menu.entries.get(i))
            .and_then(|entry| match entry {
                MenuEntry::BlockType { handle, gate, .. } if gate.insertable => Some(handle),
                _ => None,
            });

        match chosen.and_then(|handle| self.input.new_block(handle, menu.target)) {
            Some(id) => {
                self.focus(id);
                self.status = "Block added".to_string();
            }
            None => self.status = "That block type can't be added here".to_string(),
        }
        self.input.close_add_above();
    }

    fn apply(&mut self, action: BlockAction) {
        let Some(id) = self.current_id() else {
            return;
        };

        if !self.input.apply(id, action) {
            self.status = format!("{action:?} not available");
            return;
        }

        self.status = format!("{action:?}");
        match action {
            BlockAction::Add => self.open_menu(MenuTarget::Above(id)),
            BlockAction::Delete => self.clamp_cursor(),
            _ => {}
        }
    }

    fn shift_depth(&mut self, deeper: bool) {
        let Some(block) = self.current() else {
            return;
        };
        let id = block.id();
        let desired = if deeper {
            block.depth() + 1
        } else {
            block.depth().saturating_sub(1)
        };
        if let Some(depth) = self.input.set_depth(id, desired) {
            self.status = format!("Depth {depth}");
        }
    }

    fn move_block(&mut self, down: bool) {
        let Some(block) = self.current() else {
            return;
        };
        let id = block.id();
        let depth = block.depth();
        let Some(index) = self.input.blocks().index_of(id) else {
            return;
        };

        // Indexes count the list with the moved subtree taken out
        let to_index = if down {
            let subtree = 1 + self.input.blocks().find_descendants(id).len();
            let remaining = self.input.blocks().len() - subtree;
            match self.input.blocks().at(index + subtree) {
                Some(next) => {
                    let next_subtree = 1 + self.input.blocks().find_descendants(next.id()).len();
                    (index + next_subtree).min(remaining)
                }
                None => return,
            }
        } else {
            match self.input.blocks().find_preceding_sibling_at_depth(index, depth) {
                Some(previous) => match self.input.blocks().index_of(previous.id()) {
                    Some(previous_index) => previous_index,
                    None => return,
                },
                None => return,
            }
        };

        if self.input.move_subtree(id, to_index, depth).is_some() {
            self.focus(id);
        }
    }

    fn toggle_selection(&mut self) {
        if let Some(id) = self.current_id() {
            self.input.toggle_selection(id);
            self.status = format!("{} selected", self.input.selection().len());
        }
    }
}

/// Collapsed previews are HTML; show them as plain text
fn plain_text(html: &str) -> String {
    let stripped = TAG.replace_all(html, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn block_line(input: &BlockInput, block: &BlockNode) -> ListItem<'static> {
    let indent = "  ".repeat(block.depth());
    let marker = if input.selection().contains(block.id()) {
        "● "
    } else {
        "  "
    };
    let fold = if block.is_collapsed() { "▸ " } else { "▾ " };
    let modified = if block.is_modified() { " *" } else { "" };
    let label = format!(
        "{indent}{marker}{fold}{} #{}{modified}",
        block.block_type().name(),
        block.id()
    );

    let mut style = Style::default();
    if !block.is_enabled() || input.is_inert(block.id()) {
        style = style.fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT);
    }
    if block.has_errors() {
        style = style.fg(Color::Red);
    }

    let mut spans = vec![Span::styled(label, style)];
    if block.is_collapsed() && !block.preview().is_empty() {
        spans.push(Span::styled(
            format!("  {}", plain_text(block.preview())),
            Style::default().fg(Color::DarkGray),
        ));
    }
    ListItem::new(Line::from(spans))
}

fn menu_line(entry: &MenuEntry) -> ListItem<'static> {
    match entry {
        MenuEntry::Group { name } => ListItem::new(Line::from(Span::styled(
            name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ))),
        MenuEntry::BlockType { name, gate, .. } => {
            let (suffix, style) = if gate.global_blocked {
                (" (list full)", Style::default().fg(Color::DarkGray))
            } else if gate.type_blocked {
                (" (limit reached)", Style::default().fg(Color::DarkGray))
            } else if !gate.insertable {
                (" (not allowed here)", Style::default().fg(Color::DarkGray))
            } else {
                ("", Style::default())
            };
            ListItem::new(Line::from(Span::styled(format!("  {name}{suffix}"), style)))
        }
    }
}

fn details(app: &App) -> Vec<Line<'static>> {
    let Some(block) = app.current() else {
        return vec![Line::from("No blocks yet. Press 'a' to add one.")];
    };

    let mut lines = vec![
        Line::from(format!(
            "{} ({})",
            block.block_type().name(),
            block.type_handle()
        )),
        Line::from(format!("id: {}  depth: {}", block.id(), block.depth())),
        Line::from(format!(
            "enabled: {}  inert: {}  modified: {}",
            block.is_enabled(),
            app.input.is_inert(block.id()),
            block.is_modified()
        )),
        Line::from(String::new()),
    ];

    for error in block.errors() {
        lines.push(Line::from(Span::styled(
            format!("! {error}"),
            Style::default().fg(Color::Red),
        )));
    }

    let content = serde_json::to_string_pretty(&block.content()).unwrap_or_default();
    lines.extend(content.lines().map(|line| Line::from(line.to_string())));
    lines
}

/// Block types used when no config file exists
fn demo_config() -> Config {
    let layout = |fields: &[(&str, &str)]| FieldLayout {
        id: None,
        tabs: vec![TabDef {
            name: "Content".into(),
            fields: fields
                .iter()
                .map(|(handle, label)| FieldDef {
                    handle: handle.to_string(),
                    label: label.to_string(),
                    field_type: "PlainText".into(),
                })
                .collect(),
        }],
    };
    let seed = |id: u64, block_type: &str, depth: usize, body: &str| SeedBlock {
        id: BlockId::Persisted(id),
        block_type: block_type.to_string(),
        depth,
        enabled: true,
        collapsed: false,
        fields: BTreeMap::from([("body".to_string(), json!(body))]),
    };

    Config {
        max_blocks: 12,
        block_types: vec![
            BlockTypeDef::new("section", "Section")
                .with_sort_order(1)
                .with_child_blocks(ChildBlocks::Only(vec!["text".into(), "quote".into()]))
                .with_field_layout(layout(&[("body", "Heading")])),
            BlockTypeDef::new("text", "Text")
                .with_sort_order(2)
                .with_field_layout(layout(&[("body", "Body")])),
            BlockTypeDef::new("quote", "Quote")
                .with_sort_order(3)
                .with_max_blocks(1)
                .with_field_layout(layout(&[("body", "Quote"), ("by", "Attribution")])),
        ],
        groups: vec![GroupDef::new("Content", 0)],
        blocks: vec![
            seed(1, "section", 0, "Introduction"),
            seed(2, "text", 1, "Nested blocks live in a flat list."),
            seed(3, "section", 0, "Details"),
        ],
        ..Config::default()
    }
}

fn init_logging(log_file: &Path) -> Result<()> {
    let path = Config::expand_path(log_file).unwrap_or_else(|| log_file.to_path_buf());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    // The terminal belongs to the TUI, so logs go to the file
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    // Config file from CLI args, or the default location
    let args: Vec<String> = env::args().collect();
    let config_path = Config::config_path();

    let config = match args.len() {
        1 => match Config::load() {
            Ok(Some(config)) => config,
            Ok(None) => demo_config(),
            Err(e) => {
                eprintln!("Error: Failed to load config file: {e}");
                process::exit(1);
            }
        },
        2 => match Config::load_from_path(&args[1]) {
            Ok(Some(config)) => config,
            Ok(None) => {
                eprintln!("Error: No config file found at {}", args[1]);
                eprintln!("Usage: {} [config-file]", args[0]);
                process::exit(1);
            }
            Err(e) => {
                eprintln!("Error: Failed to load config file: {e}");
                process::exit(1);
            }
        },
        _ => {
            eprintln!("Usage: {} [config-file]", args[0]);
            eprintln!("Default config file: {}", config_path.display());
            process::exit(1);
        }
    };

    init_logging(&config.log_file)?;
    log::info!("nested-blocks starting up");

    let input = match BlockInput::new(config.input_settings()) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Error: Invalid block data: {e}");
            process::exit(1);
        }
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(input);

    // Main loop
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    log::info!("nested-blocks shutting down");
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        let modified = app.input.tick(Instant::now());
        if modified > 0 {
            log::debug!("{modified} block(s) modified");
        }

        terminal.draw(|f| ui(f, app))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if app.menu.is_some() {
            match key.code {
                KeyCode::Esc | KeyCode::Char('q') => app.close_menu(),
                KeyCode::Down | KeyCode::Char('j') => app.move_menu_cursor(true),
                KeyCode::Up | KeyCode::Char('k') => app.move_menu_cursor(false),
                KeyCode::Enter => app.confirm_menu(),
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') => return Ok(()),
            KeyCode::Down | KeyCode::Char('j') => app.next_block(),
            KeyCode::Up | KeyCode::Char('k') => app.previous_block(),
            KeyCode::Char('a') => app.open_menu(MenuTarget::Root),
            KeyCode::Char('c') => {
                if let Some(id) = app.current_id() {
                    app.open_menu(MenuTarget::ChildrenOf(id));
                }
            }
            KeyCode::Char('A') => app.apply(BlockAction::Add),
            KeyCode::Char('d') => app.apply(BlockAction::Delete),
            KeyCode::Char('D') => app.apply(BlockAction::Duplicate),
            KeyCode::Char('e') => app.apply(BlockAction::ToggleEnabled),
            KeyCode::Enter => app.apply(BlockAction::ToggleExpansion),
            KeyCode::Char(' ') => app.toggle_selection(),
            KeyCode::Esc => {
                app.input.clear_selection();
            }
            KeyCode::Char('>') | KeyCode::Tab => app.shift_depth(true),
            KeyCode::Char('<') | KeyCode::BackTab => app.shift_depth(false),
            KeyCode::Char('J') => app.move_block(true),
            KeyCode::Char('K') => app.move_block(false),
            _ => {}
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(f.area());
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .margin(1)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
        .split(rows[0]);

    // Outline panel
    let block_items: Vec<ListItem> = app
        .input
        .blocks()
        .iter()
        .map(|block| block_line(&app.input, block))
        .collect();
    let count = app.input.blocks().len();
    let title = match app.input.max_blocks() {
        0 => format!("Blocks ({count})"),
        max => format!("Blocks ({count}/{max})"),
    };
    let blocks_list = List::new(block_items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::Yellow).fg(Color::Black));

    f.render_stateful_widget(blocks_list, chunks[0], &mut app.block_list_state);

    // Menu or details panel
    if let Some(menu) = app.menu.as_mut() {
        let title = match menu.target {
            MenuTarget::Root => "Add block".to_string(),
            MenuTarget::ChildrenOf(id) => format!("Add child to #{id}"),
            MenuTarget::Above(id) => format!("Add above #{id}"),
        };
        let items: Vec<ListItem> = menu.entries.iter().map(menu_line).collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().bg(Color::Cyan).fg(Color::Black));
        f.render_stateful_widget(list, chunks[1], &mut menu.state);
    } else {
        let content = Paragraph::new(details(app))
            .block(Block::default().borders(Borders::ALL).title("Block"))
            .wrap(Wrap { trim: false });
        f.render_widget(content, chunks[1]);
    }

    // Instructions
    let help_text = Line::from(vec![
        Span::raw("q: Quit | j/k: Move | a/c/A: Add root/child/above | "),
        Span::raw("d: Delete | D: Duplicate | e: Enable | Enter: Fold | "),
        Span::raw("Space: Select | >/<: Indent | J/K: Reorder"),
    ]);
    let status = Line::from(Span::styled(
        app.status.clone(),
        Style::default().fg(Color::Green),
    ));

    let help = Paragraph::new(vec![help_text, status]).block(Block::default());
    f.render_widget(help, rows[1]);
}
