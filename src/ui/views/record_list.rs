use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{
  Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
};
use serde::Serialize;
use tracing::warn;

use crate::db::{DraftStore, FormFields};
use crate::inventory::CachedInventoryClient;
use crate::optimistic::{OperationKind, OptimisticRecord, OptimisticStore, RecordKey, Settlement};
use crate::query::CachedQuery;
use crate::ui::components::{FormEvent, KeyResult, RecordForm, SearchEvent, SearchInput};
use crate::ui::debounce::Debouncer;
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, Status, View, ViewEvent};
use crate::ui::virtual_list::VirtualScroll;

use super::rows::{Cell, ListRow};

/// Rows rendered above and below the viewport
const OVERSCAN: usize = 5;

/// Virtualized, filterable list of one inventory collection.
///
/// Server data comes from a `CachedQuery` and seeds an `OptimisticStore`;
/// every edit made here goes through the store so it shows up at once and
/// is rolled back if the server refuses it.
pub struct RecordListView<T: ListRow> {
  api: CachedInventoryClient,
  drafts: DraftStore,
  query: CachedQuery<Vec<T>>,
  store: OptimisticStore<T>,
  /// Position within the filtered rows
  selected: usize,
  scroll: VirtualScroll,
  search: SearchInput,
  /// Lowercased filter currently applied
  filter: String,
  debounce: Debouncer<String>,
  form: Option<RecordForm>,
}

impl<T> RecordListView<T>
where
  T: ListRow,
  T::Patch: Serialize + Sync,
{
  pub fn new(api: CachedInventoryClient, drafts: DraftStore) -> Self {
    let mut query = api.list_query::<T>();
    query.load();

    let mut view = Self {
      api,
      drafts,
      query,
      store: OptimisticStore::new(),
      selected: 0,
      scroll: VirtualScroll::new(1, 0, OVERSCAN),
      search: SearchInput::new(),
      filter: String::new(),
      debounce: Debouncer::default(),
      form: None,
    };
    // A cache hit is published synchronously
    view.seed();
    view
  }

  fn seed(&mut self) {
    if let Some(records) = self.query.data() {
      self.store.replace_all(records.clone());
      self.clamp_selection();
    }
  }

  /// Indices into the store of the rows passing the filter
  fn visible(&self) -> Vec<usize> {
    self
      .store
      .records()
      .iter()
      .enumerate()
      .filter(|(_, entry)| self.filter.is_empty() || entry.record.matches(&self.filter))
      .map(|(i, _)| i)
      .collect()
  }

  fn selected_entry(&self) -> Option<&OptimisticRecord<T>> {
    let visible = self.visible();
    let index = *visible.get(self.selected)?;
    self.store.records().get(index)
  }

  fn clamp_selection(&mut self) {
    let len = self.visible().len();
    self.selected = self.selected.min(len.saturating_sub(1));
  }

  fn move_selection(&mut self, delta: isize) {
    let len = self.visible().len();
    self.selected = self
      .selected
      .saturating_add_signed(delta)
      .min(len.saturating_sub(1));
  }

  fn scroll_page(&self) -> isize {
    self.scroll.container_height().max(1) as isize
  }

  fn apply_filter(&mut self, filter: String) {
    self.filter = filter.trim().to_lowercase();
    self.selected = 0;
    self.scroll.scroll_to(0, 0);
  }

  fn delete_selected(&mut self) -> KeyResult<ViewEvent> {
    let Some(key) = self.selected_entry().map(|entry| entry.key) else {
      return KeyResult::Handled;
    };
    let RecordKey::Persisted(id) = key else {
      return still_saving();
    };

    let client = self.api.client().clone();
    self
      .store
      .optimistic_delete(key, move || async move { client.delete::<T>(id).await });
    self.clamp_selection();
    KeyResult::Handled
  }

  fn adjust_selected(&mut self, delta: i64) -> KeyResult<ViewEvent> {
    let Some((key, patch)) = self
      .selected_entry()
      .map(|entry| (entry.key, entry.record.adjust_quantity(delta)))
    else {
      return KeyResult::Handled;
    };
    let Some(patch) = patch else {
      return KeyResult::Handled;
    };
    let RecordKey::Persisted(id) = key else {
      return still_saving();
    };

    let client = self.api.client().clone();
    let body = patch.clone();
    self.store.optimistic_update(key, patch, move || async move {
      client.update::<T>(id, &body).await
    });
    KeyResult::Handled
  }

  fn open_form(&mut self) -> KeyResult<ViewEvent> {
    match T::FORM {
      Some(spec) => {
        let form = RecordForm::open(spec, self.drafts.clone());
        let restored = form.restored();
        self.form = Some(form);
        if restored {
          KeyResult::Event(ViewEvent::Notify(Status::info("Restored unsaved draft")))
        } else {
          KeyResult::Handled
        }
      }
      None => KeyResult::NotHandled,
    }
  }

  fn submit_form(&mut self, values: FormFields) -> KeyResult<ViewEvent> {
    let record = match T::from_form(&values) {
      Ok(record) => record,
      Err(e) => return KeyResult::Event(ViewEvent::Notify(Status::error(e.to_string()))),
    };
    self.form = None;

    let client = self.api.client().clone();
    let body = record.clone();
    self
      .store
      .optimistic_add(record, move || async move { client.create::<T>(&body).await });

    // New rows are appended; select it if the filter lets it through
    let len = self.visible().len();
    self.selected = len.saturating_sub(1);
    KeyResult::Handled
  }

  fn settled(&mut self, settlement: Settlement) -> Vec<ViewEvent> {
    match settlement {
      Settlement::Committed { kind, key } => {
        self.api.invalidate::<T>();
        if kind == OperationKind::Add {
          if let Some(spec) = T::FORM {
            if let Err(e) = self.drafts.clear(spec.id) {
              warn!(form = spec.id, error = %e, "failed to clear draft");
            }
          }
        }
        vec![
          ViewEvent::Mutated,
          ViewEvent::Notify(Status::info(format!("{}: {} of #{} saved", T::LABEL, kind, key))),
        ]
      }
      Settlement::RolledBack { kind, key, error } => {
        vec![ViewEvent::Notify(Status::error(format!(
          "{}: {} of #{} rolled back: {}",
          T::LABEL,
          kind,
          key,
          error
        )))]
      }
    }
  }

  fn title(&self, shown: usize) -> String {
    let label = T::LABEL;
    let total = self.store.len();

    let mut title = if self.query.is_loading() && total == 0 {
      format!(" {} (loading...) ", label)
    } else if self.filter.is_empty() {
      format!(" {} ({}) ", label, total)
    } else {
      format!(" {} ({}/{}) [/{}] ", label, shown, total, self.filter)
    };

    if self.query.is_revalidating() {
      title.push_str("↻ ");
    }
    if self.store.has_pending() {
      title.push_str(&format!("· {} saving ", self.store.pending_count()));
    }
    title
  }

  fn empty_message(&self) -> String {
    let label = T::LABEL.to_lowercase();
    if self.query.is_loading() {
      "Loading...".to_string()
    } else if let Some(error) = self.query.error() {
      format!("Failed to load {}: {}. Press 'r' to retry.", label, error)
    } else if !self.filter.is_empty() {
      format!("No {} match '{}'.", label, self.filter)
    } else if T::FORM.is_some() {
      format!("No {} yet. Press 'a' to add one.", label)
    } else {
      format!("No {} yet.", label)
    }
  }

  fn row_line(&self, entry: &OptimisticRecord<T>, selected: bool, width: u16) -> Line<'static> {
    let marker = if entry.is_optimistic {
      Span::styled("+ ", Style::default().fg(Color::Green))
    } else if self.store.pending_update(entry.key).is_some() {
      Span::styled("~ ", Style::default().fg(Color::Yellow))
    } else if selected {
      Span::styled("> ", Style::default().fg(Color::Cyan))
    } else {
      Span::raw("  ")
    };

    let mut spans = vec![marker];
    spans.extend(layout_cells(
      entry.record.cells(),
      T::COLUMNS,
      width.saturating_sub(2),
    ));

    let mut line = Line::from(spans);
    if selected {
      line = line.style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      );
    } else if entry.is_optimistic {
      line = line.style(Style::default().add_modifier(Modifier::ITALIC));
    }
    line
  }

  fn render_rows(&mut self, frame: &mut Frame, area: Rect, visible: &[usize]) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(0)])
      .split(area);
    let rows_area = chunks[1];

    let header: Vec<Span> = std::iter::once(Span::raw("  "))
      .chain(layout_cells(
        T::COLUMNS
          .iter()
          .map(|(name, _)| (name.to_string(), Style::default().fg(Color::Gray).bold()))
          .collect(),
        T::COLUMNS,
        area.width.saturating_sub(2),
      ))
      .collect();
    frame.render_widget(Paragraph::new(Line::from(header)), chunks[0]);

    let container = rows_area.height as usize;
    self.scroll.set_container_height(container);
    self.scroll.ensure_visible(self.selected, visible.len());

    let Some(window) = self.scroll.window(visible.len()) else {
      return;
    };

    let records = self.store.records();
    let lines: Vec<Line> = window
      .range()
      .filter_map(|pos| {
        let entry = records.get(*visible.get(pos)?)?;
        Some(self.row_line(entry, pos == self.selected, rows_area.width))
      })
      .collect();

    // Lines start at the window's offset, skip the overscan above the viewport
    let skip = self.scroll.scroll_top().saturating_sub(window.offset_y);
    let paragraph = Paragraph::new(lines).scroll((skip as u16, 0));
    frame.render_widget(paragraph, rows_area);

    if window.total_height > container {
      let mut state = ScrollbarState::new(window.total_height - container)
        .position(self.scroll.scroll_top());
      frame.render_stateful_widget(
        Scrollbar::new(ScrollbarOrientation::VerticalRight),
        rows_area,
        &mut state,
      );
    }
  }
}

fn still_saving() -> KeyResult<ViewEvent> {
  KeyResult::Event(ViewEvent::Notify(Status::error(
    "Record is still being saved, try again in a moment",
  )))
}

/// Pad or cut cells to their column widths; a zero width takes the rest.
fn layout_cells(cells: Vec<Cell>, columns: &[(&str, u16)], width: u16) -> Vec<Span<'static>> {
  let mut remaining = width as usize;
  let mut spans = Vec::with_capacity(cells.len());

  for ((text, style), (_, column_width)) in cells.into_iter().zip(columns) {
    if remaining == 0 {
      break;
    }
    let column = match *column_width as usize {
      0 => remaining,
      w => w.min(remaining),
    };
    // Keep one space between columns
    let text = truncate(&text, column.saturating_sub(1));
    let padding = column.saturating_sub(text.chars().count());
    spans.push(Span::styled(format!("{}{}", text, " ".repeat(padding)), style));
    remaining -= column;
  }

  spans
}

impl<T> View for RecordListView<T>
where
  T: ListRow,
  T::Patch: Serialize + Sync,
{
  fn handle_key(&mut self, key: KeyEvent) -> KeyResult<ViewEvent> {
    if let Some(form) = &mut self.form {
      return match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submitted(values)) => self.submit_form(values),
        KeyResult::Event(FormEvent::Cancelled) => {
          self.form = None;
          KeyResult::Handled
        }
        _ => KeyResult::Handled,
      };
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(query)) => {
        self.debounce.push(query);
        return KeyResult::Handled;
      }
      KeyResult::Event(SearchEvent::Submitted(query)) => {
        self.debounce.cancel();
        self.apply_filter(query);
        return KeyResult::Handled;
      }
      KeyResult::Event(SearchEvent::Cleared) => {
        self.debounce.cancel();
        self.apply_filter(String::new());
        return KeyResult::Handled;
      }
      KeyResult::Handled => return KeyResult::Handled,
      KeyResult::NotHandled => {}
    }

    let page = self.scroll_page();
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
      KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
      KeyCode::PageDown => self.move_selection(page),
      KeyCode::PageUp => self.move_selection(-page),
      KeyCode::Char('g') | KeyCode::Home => self.selected = 0,
      KeyCode::Char('G') | KeyCode::End => self.move_selection(isize::MAX),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('R') => {
        self.query.invalidate_cache();
        return KeyResult::Event(ViewEvent::Notify(Status::info(format!(
          "Cleared cached {}",
          T::LABEL.to_lowercase()
        ))));
      }
      KeyCode::Char('d') | KeyCode::Delete => return self.delete_selected(),
      KeyCode::Char('+') | KeyCode::Char('=') => return self.adjust_selected(1),
      KeyCode::Char('-') => return self.adjust_selected(-1),
      KeyCode::Char('a') => return self.open_form(),
      KeyCode::Esc if !self.filter.is_empty() => {
        self.search = SearchInput::new();
        self.apply_filter(String::new());
      }
      _ => return KeyResult::NotHandled,
    }
    KeyResult::Handled
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let visible = self.visible();

    let block = Block::default()
      .title(self.title(visible.len()))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if visible.is_empty() {
      let paragraph = Paragraph::new(self.empty_message()).style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, inner);
    } else {
      self.render_rows(frame, inner, &visible);
    }

    self.search.render_overlay(frame, area);
    if let Some(form) = &self.form {
      form.render(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    T::LABEL.to_string()
  }

  fn captures_input(&self) -> bool {
    self.search.is_active() || self.form.is_some()
  }

  fn tick(&mut self) -> Vec<ViewEvent> {
    let mut events = Vec::new();

    if self.query.poll() {
      match self.query.error().map(str::to_string) {
        Some(error) => events.push(ViewEvent::Notify(Status::error(format!(
          "Failed to load {}: {}",
          T::LABEL.to_lowercase(),
          error
        )))),
        None => self.seed(),
      }
    }

    if let Some(filter) = self.debounce.poll() {
      self.apply_filter(filter);
    }

    for settlement in self.store.poll() {
      events.extend(self.settled(settlement));
    }
    self.clamp_selection();

    events
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "filter").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(30),
      ShortcutInfo::new("R", "clear cache").with_priority(31),
      ShortcutInfo::new("d", "delete").with_priority(50),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ];
    if T::FORM.is_some() {
      shortcuts.push(ShortcutInfo::new("a", "add").with_priority(40));
    }
    let adjustable = self
      .selected_entry()
      .is_some_and(|entry| entry.record.adjust_quantity(1).is_some());
    if adjustable {
      shortcuts.push(ShortcutInfo::new("+/-", "quantity").with_priority(45));
    }
    shortcuts
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::QueryCache;
  use crate::config::Config;
  use crate::inventory::cached_client::InventoryQueryKey;
  use crate::inventory::types::{InventoryItem, Unit};
  use crate::inventory::InventoryClient;
  use crate::optimistic::Record;
  use crate::ui::view::StatusLevel;
  use crossterm::event::KeyModifiers;
  use std::time::Duration;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  /// Cache pre-filled with `records`; the API is unreachable.
  fn api_with<T: ListRow>(records: &[T]) -> CachedInventoryClient {
    let config: Config = serde_yaml::from_str(
      "api:\n  url: http://127.0.0.1:9\n  username: t\n  timeout_ms: 2000\n\
       cache:\n  stale_while_revalidate: false\nretry:\n  max_attempts: 1\n",
    )
    .unwrap();
    let cache = QueryCache::new();
    cache.set(
      &InventoryQueryKey::collection::<T>(),
      &records.to_vec(),
      Duration::from_secs(60),
    );
    let client = InventoryClient::new(&config).unwrap();
    CachedInventoryClient::new(client, cache, &config)
  }

  fn units() -> Vec<Unit> {
    ["Piece:pc", "Kilogram:kg", "Metre:m", "Box:box"]
      .iter()
      .enumerate()
      .map(|(i, pair)| {
        let (name, abbreviation) = pair.split_once(':').unwrap();
        Unit {
          id: i as i64 + 1,
          name: name.to_string(),
          abbreviation: abbreviation.to_string(),
        }
      })
      .collect()
  }

  fn ids<T: ListRow>(view: &RecordListView<T>) -> Vec<i64>
  where
    T::Patch: Serialize + Sync,
  {
    view
      .visible()
      .into_iter()
      .map(|i| view.store.records()[i].record.id())
      .collect()
  }

  #[tokio::test]
  async fn test_cache_hit_seeds_store_without_loading() {
    let view = RecordListView::<Unit>::new(api_with(&units()), DraftStore::in_memory().unwrap());
    assert!(!view.query.is_loading());
    assert_eq!(view.store.len(), 4);
    assert_eq!(ids(&view), vec![1, 2, 3, 4]);
  }

  #[tokio::test]
  async fn test_submitted_filter_applies_immediately() {
    let mut view =
      RecordListView::<Unit>::new(api_with(&units()), DraftStore::in_memory().unwrap());

    view.handle_key(key(KeyCode::Char('/')));
    view.handle_key(key(KeyCode::Char('K')));
    view.handle_key(key(KeyCode::Char('G')));
    // Typing alone is debounced
    assert_eq!(ids(&view).len(), 4);

    view.handle_key(key(KeyCode::Enter));
    assert_eq!(ids(&view), vec![2]);

    // Esc outside the prompt clears the filter
    view.handle_key(key(KeyCode::Esc));
    assert_eq!(ids(&view).len(), 4);
  }

  #[tokio::test(start_paused = true)]
  async fn test_typed_filter_applies_after_debounce() {
    let mut view =
      RecordListView::<Unit>::new(api_with(&units()), DraftStore::in_memory().unwrap());

    view.handle_key(key(KeyCode::Char('/')));
    view.handle_key(key(KeyCode::Char('b')));
    view.handle_key(key(KeyCode::Char('o')));
    view.tick();
    assert_eq!(ids(&view).len(), 4);

    tokio::time::advance(Duration::from_millis(300)).await;
    view.tick();
    assert_eq!(ids(&view), vec![4]);
  }

  #[tokio::test]
  async fn test_failed_delete_is_rolled_back() {
    let mut view =
      RecordListView::<Unit>::new(api_with(&units()), DraftStore::in_memory().unwrap());

    view.handle_key(key(KeyCode::Char('j')));
    assert_eq!(view.handle_key(key(KeyCode::Char('d'))), KeyResult::Handled);
    assert_eq!(ids(&view), vec![1, 3, 4]);

    let mut events = Vec::new();
    for _ in 0..500 {
      events = view.tick();
      if !events.is_empty() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(matches!(
      events.as_slice(),
      [ViewEvent::Notify(Status {
        level: StatusLevel::Error,
        ..
      })]
    ));
    assert_eq!(ids(&view), vec![1, 2, 3, 4]);
  }

  #[tokio::test]
  async fn test_quantity_keys_apply_optimistically() {
    let mut item = InventoryItem::new("Hex bolt");
    item.id = 7;
    item.quantity = 3;
    let mut view =
      RecordListView::<InventoryItem>::new(api_with(&[item]), DraftStore::in_memory().unwrap());

    view.handle_key(key(KeyCode::Char('+')));
    view.handle_key(key(KeyCode::Char('+')));
    let entry = view.selected_entry().unwrap();
    assert_eq!(entry.record.quantity, 5);
    assert!(view.store.pending_update(RecordKey::Persisted(7)).is_some());
  }

  #[tokio::test]
  async fn test_add_form_only_for_creatable_collections() {
    let mut units_view =
      RecordListView::<Unit>::new(api_with(&units()), DraftStore::in_memory().unwrap());
    assert_eq!(units_view.handle_key(key(KeyCode::Char('a'))), KeyResult::NotHandled);
    assert!(!units_view.captures_input());

    let mut items_view = RecordListView::<InventoryItem>::new(
      api_with::<InventoryItem>(&[]),
      DraftStore::in_memory().unwrap(),
    );
    assert_eq!(items_view.handle_key(key(KeyCode::Char('a'))), KeyResult::Handled);
    assert!(items_view.captures_input());

    for c in "Cable ties".chars() {
      items_view.handle_key(key(KeyCode::Char(c)));
    }
    items_view.handle_key(key(KeyCode::Enter));

    assert!(!items_view.captures_input());
    assert_eq!(items_view.store.len(), 1);
    assert!(items_view.store.records()[0].is_optimistic);
    assert_eq!(items_view.store.records()[0].record.name, "Cable ties");
  }

  #[test]
  fn test_layout_cells_pads_and_fills() {
    let cells = vec![
      ("HB-M8".to_string(), Style::default()),
      ("Hex bolt M8 zinc plated".to_string(), Style::default()),
    ];
    let spans = layout_cells(cells, &[("SKU", 8), ("NAME", 0)], 20);
    let text: Vec<&str> = spans.iter().map(|s| s.content.as_ref()).collect();
    assert_eq!(text, vec!["HB-M8   ", "Hex bolt... "]);
  }

}
