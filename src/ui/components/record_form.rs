use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::db::{DraftStore, FormFields};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use std::collections::BTreeMap;
use tracing::warn;

/// What a field accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  /// Free text, may be empty
  Text,
  /// Free text, must not be blank
  Required,
  /// Whole number >= 0; empty means 0
  Count,
  /// Whole number > 0; empty means unset
  OptionalId,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
  pub name: &'static str,
  pub label: &'static str,
  pub kind: FieldKind,
}

/// A create form: its draft key, title and fields in display order
#[derive(Debug)]
pub struct FormSpec {
  pub id: &'static str,
  pub title: &'static str,
  pub fields: &'static [FieldSpec],
}

/// Check one raw value against its field kind.
pub fn validate_field(kind: FieldKind, raw: &str) -> Result<(), &'static str> {
  let value = raw.trim();
  match kind {
    FieldKind::Text => Ok(()),
    FieldKind::Required if value.is_empty() => Err("required"),
    FieldKind::Required => Ok(()),
    FieldKind::Count if value.is_empty() => Ok(()),
    FieldKind::Count => match value.parse::<i64>() {
      Ok(n) if n >= 0 => Ok(()),
      Ok(_) => Err("must not be negative"),
      Err(_) => Err("must be a whole number"),
    },
    FieldKind::OptionalId if value.is_empty() => Ok(()),
    FieldKind::OptionalId => match value.parse::<i64>() {
      Ok(n) if n > 0 => Ok(()),
      _ => Err("must be a positive id"),
    },
  }
}

/// Events emitted by the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  /// All fields valid; values are trimmed
  Submitted(FormFields),
  /// Closed without submitting; the draft is kept
  Cancelled,
}

/// Modal create form whose contents survive restarts.
///
/// The draft is loaded when the form opens and overwritten on every edit.
/// Clearing it is up to the owner, once the server has accepted the record.
pub struct RecordForm {
  spec: &'static FormSpec,
  inputs: Vec<TextInput>,
  focused: usize,
  errors: BTreeMap<&'static str, &'static str>,
  drafts: DraftStore,
  restored: bool,
}

impl RecordForm {
  pub fn open(spec: &'static FormSpec, drafts: DraftStore) -> Self {
    let draft = drafts.load(spec.id).unwrap_or_else(|e| {
      warn!(form = spec.id, error = %e, "ignoring unreadable draft");
      None
    });
    let restored = draft.is_some();
    let saved = draft.map(|d| d.fields).unwrap_or_default();

    let inputs = spec
      .fields
      .iter()
      .map(|field| match saved.get(field.name) {
        Some(value) => TextInput::with_value(value.clone()),
        None => TextInput::new(),
      })
      .collect();

    Self {
      spec,
      inputs,
      focused: 0,
      errors: BTreeMap::new(),
      drafts,
      restored,
    }
  }

  /// Whether the form was pre-filled from a saved draft
  pub fn restored(&self) -> bool {
    self.restored
  }

  pub fn values(&self) -> FormFields {
    self
      .spec
      .fields
      .iter()
      .zip(&self.inputs)
      .map(|(field, input)| (field.name.to_string(), input.value().to_string()))
      .collect()
  }

  pub fn error(&self, field: &str) -> Option<&'static str> {
    self.errors.get(field).copied()
  }

  fn validate(&mut self) -> bool {
    self.errors = self
      .spec
      .fields
      .iter()
      .zip(&self.inputs)
      .filter_map(|(field, input)| {
        validate_field(field.kind, input.value())
          .err()
          .map(|message| (field.name, message))
      })
      .collect();
    self.errors.is_empty()
  }

  fn save_draft(&self) {
    if let Err(e) = self.drafts.save(self.spec.id, &self.values()) {
      warn!(form = self.spec.id, error = %e, "failed to save draft");
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    let count = self.inputs.len();
    match key.code {
      KeyCode::Esc => return KeyResult::Event(FormEvent::Cancelled),
      KeyCode::Tab | KeyCode::Down => {
        self.focused = (self.focused + 1) % count.max(1);
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.focused = (self.focused + count.max(1) - 1) % count.max(1);
        return KeyResult::Handled;
      }
      KeyCode::Enter => {
        if !self.validate() {
          // Jump to the first invalid field
          if let Some(index) = self
            .spec
            .fields
            .iter()
            .position(|f| self.errors.contains_key(f.name))
          {
            self.focused = index;
          }
          return KeyResult::Handled;
        }
        let values = self
          .values()
          .into_iter()
          .map(|(name, value)| (name, value.trim().to_string()))
          .collect();
        return KeyResult::Event(FormEvent::Submitted(values));
      }
      _ => {}
    }

    let Some(input) = self.inputs.get_mut(self.focused) else {
      return KeyResult::NotHandled;
    };
    match input.handle_key(key) {
      InputResult::Consumed => {
        if let Some(field) = self.spec.fields.get(self.focused) {
          self.errors.remove(field.name);
        }
        self.save_draft();
        KeyResult::Handled
      }
      // Modal: nothing leaks to the list underneath
      _ => KeyResult::Handled,
    }
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let width = (area.width * 70 / 100).clamp(40, 72).min(area.width);
    let height = (self.inputs.len() as u16 + 4).min(area.height);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let popup = Rect::new(x, y, width, height);

    frame.render_widget(Clear, popup);

    let title = if self.restored {
      format!(" {} (draft restored) ", self.spec.title)
    } else {
      format!(" {} ", self.spec.title)
    };
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(title);
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let mut lines: Vec<Line> = self
      .spec
      .fields
      .iter()
      .zip(&self.inputs)
      .enumerate()
      .map(|(i, (field, input))| {
        let focused = i == self.focused;
        let label_style = if focused {
          Style::default().fg(Color::Yellow).bold()
        } else {
          Style::default().fg(Color::Gray)
        };
        let mut spans = vec![Span::styled(format!("{:>14}: ", field.label), label_style)];
        if focused {
          spans.extend(input.spans(Color::Yellow));
        } else {
          spans.push(Span::raw(input.value().to_string()));
        }
        if let Some(error) = self.error(field.name) {
          spans.push(Span::styled(
            format!("  {}", error),
            Style::default().fg(Color::Red),
          ));
        }
        Line::from(spans)
      })
      .collect();

    lines.push(Line::raw(""));
    lines.push(Line::styled(
      " Enter: save  Tab: next field  Esc: close (draft kept)",
      Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(lines), inner);
  }
}
