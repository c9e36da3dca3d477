use crate::ui::components::KeyResult;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
  Info,
  Error,
}

/// One-line message for the footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
  pub message: String,
  pub level: StatusLevel,
}

impl Status {
  pub fn info(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      level: StatusLevel::Info,
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      level: StatusLevel::Error,
    }
  }
}

/// Things a view reports back to the App
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
  /// Show a message in the footer
  Notify(Status),
  /// The server accepted a write; anything derived from it is stale
  Mutated,
}

/// Trait for view behavior
///
/// Views handle their own input modes (filter, forms) and report back
/// through `ViewEvent`s. App → View → Components.
///
/// Views that load data asynchronously hold `CachedQuery`s and poll them in
/// `tick()`.
pub trait View {
  /// Handle a key event. `NotHandled` lets the App apply global keys.
  fn handle_key(&mut self, key: KeyEvent) -> KeyResult<ViewEvent>;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// True while a prompt or form owns the keyboard
  fn captures_input(&self) -> bool {
    false
  }

  /// Called on each tick to poll queries and pending writes
  fn tick(&mut self) -> Vec<ViewEvent> {
    Vec::new()
  }

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "filter").with_priority(20),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
