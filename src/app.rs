use crate::commands::{self, CommandKind};
use crate::config::Config;
use crate::db::DraftStore;
use crate::event::{Event, EventHandler};
use crate::inventory::types::{
  Category, DashboardStats, InventoryItem, Location, PurchaseRequisition, Supplier, Unit,
};
use crate::inventory::types::Resource;
use crate::inventory::CachedInventoryClient;
use crate::query::CachedQuery;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::{draw_footer, draw_header, StatsDisplay};
use crate::ui::view::{ShortcutInfo, Status, View, ViewEvent};
use crate::ui::views::RecordListView;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::{stdout, Stdout};
use std::time::Duration;
use tracing::info;

/// Fast enough for the filter debounce to feel immediate
const TICK_RATE: Duration = Duration::from_millis(100);

/// Main application state
pub struct App {
  config: Config,
  api: CachedInventoryClient,
  drafts: DraftStore,

  /// Current root view, replaced via `:` commands
  view: Box<dyn View>,

  command: CommandInput,

  /// Header counters, refreshed after every accepted write
  dashboard: CachedQuery<DashboardStats>,

  /// Last message for the footer
  status: Option<Status>,

  should_quit: bool,
}

impl App {
  pub fn new(config: Config, api: CachedInventoryClient, drafts: DraftStore) -> Self {
    let mut dashboard = api.dashboard_query();
    dashboard.load();

    let view: Box<dyn View> =
      Box::new(RecordListView::<InventoryItem>::new(api.clone(), drafts.clone()));

    Self {
      config,
      api,
      drafts,
      view,
      command: CommandInput::new(),
      dashboard,
      status: None,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Restore the terminal even if the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !self.should_quit {
      terminal.draw(|frame| self.draw(frame))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Resize | Event::Tick) => {}
        None => break,
      }
      // Typing can starve the tick timer, so poll after every event
      self.tick();
    }

    info!("shutting down");
    Ok(())
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // The command palette must not steal ':' from a focused form or filter
    if !self.view.captures_input() {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(cmd)) => {
          self.execute_command(&cmd);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    match self.view.handle_key(key) {
      KeyResult::Event(event) => self.apply(event),
      KeyResult::Handled => {}
      KeyResult::NotHandled => {
        if key.code == KeyCode::Char('q') {
          self.should_quit = true;
        }
      }
    }
  }

  fn execute_command(&mut self, cmd: &str) {
    match commands::find(cmd).map(|c| c.kind) {
      Some(CommandKind::Quit) => self.should_quit = true,
      Some(CommandKind::Help) => {
        self.status = Some(Status::info(key_help(&self.view.shortcuts())));
      }
      Some(CommandKind::Collection(path)) => {
        if let Some(view) = open_view(path, &self.api, &self.drafts) {
          info!(view = path, "switching view");
          self.view = view;
          self.status = None;
        }
      }
      None if cmd.is_empty() => {}
      None => self.status = Some(Status::error(format!("Unknown command: {}", cmd))),
    }
  }

  fn tick(&mut self) {
    self.dashboard.poll();
    for event in self.view.tick() {
      self.apply(event);
    }
  }

  fn apply(&mut self, event: ViewEvent) {
    match event {
      ViewEvent::Notify(status) => self.status = Some(status),
      // Writes change the counters; the stats cache entry is already gone
      ViewEvent::Mutated => self.dashboard.refetch(),
    }
  }

  fn title(&self) -> &str {
    self.config.title.as_deref().unwrap_or("stockroom")
  }

  fn draw(&mut self, frame: &mut Frame) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(2), // Header
        Constraint::Min(1),    // View
        Constraint::Length(1), // Footer
      ])
      .split(frame.area());

    let stats = match self.dashboard.data() {
      Some(stats) => StatsDisplay::Ready {
        stats,
        refreshing: self.dashboard.is_revalidating() || self.dashboard.is_loading(),
      },
      None if self.dashboard.is_error() => StatsDisplay::Failed,
      None => StatsDisplay::Loading,
    };
    draw_header(
      frame,
      chunks[0],
      self.title(),
      &self.config.api.url,
      stats,
      &self.view.shortcuts(),
    );

    self.view.render(frame, chunks[1]);
    self.command.render_overlay(frame, chunks[1]);

    let breadcrumb = [self.title().to_string(), self.view.breadcrumb_label()];
    draw_footer(frame, chunks[2], &breadcrumb, self.status.as_ref());
  }
}

/// Build the list view for a collection's REST path
fn open_view(
  path: &str,
  api: &CachedInventoryClient,
  drafts: &DraftStore,
) -> Option<Box<dyn View>> {
  let (api, drafts) = (api.clone(), drafts.clone());
  let view: Box<dyn View> = match path {
    InventoryItem::PATH => Box::new(RecordListView::<InventoryItem>::new(api, drafts)),
    Category::PATH => Box::new(RecordListView::<Category>::new(api, drafts)),
    Unit::PATH => Box::new(RecordListView::<Unit>::new(api, drafts)),
    Location::PATH => Box::new(RecordListView::<Location>::new(api, drafts)),
    Supplier::PATH => Box::new(RecordListView::<Supplier>::new(api, drafts)),
    PurchaseRequisition::PATH => Box::new(RecordListView::<PurchaseRequisition>::new(api, drafts)),
    _ => return None,
  };
  Some(view)
}

/// One line listing every key, most important first
fn key_help(shortcuts: &[ShortcutInfo]) -> String {
  let mut sorted: Vec<&ShortcutInfo> = shortcuts.iter().collect();
  sorted.sort_by_key(|s| s.priority);
  sorted
    .iter()
    .map(|s| format!("{} {}", s.key, s.label))
    .collect::<Vec<_>>()
    .join("  ")
}
