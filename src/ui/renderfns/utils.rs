use crate::inventory::types::{InventoryItem, RequisitionStatus};
use ratatui::prelude::Color;

/// Truncate to `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Color for a stock level relative to its reorder threshold
pub fn stock_color(item: &InventoryItem) -> Color {
  if item.quantity <= 0 {
    Color::Red
  } else if item.is_low_stock() {
    Color::Yellow
  } else {
    Color::Green
  }
}

pub fn requisition_color(status: RequisitionStatus) -> Color {
  match status {
    RequisitionStatus::Pending => Color::Yellow,
    RequisitionStatus::Approved => Color::Cyan,
    RequisitionStatus::Ordered => Color::Green,
    RequisitionStatus::Rejected => Color::Red,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("bolts", 10), "bolts");
    assert_eq!(truncate("bolts", 5), "bolts");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hex bolts M8", 8), "hex b...");
  }

  #[test]
  fn test_truncate_counts_characters() {
    assert_eq!(truncate("Schraubenmütter", 8), "Schra...");
    assert_eq!(truncate("m²", 2), "m²");
  }

  #[test]
  fn test_stock_color() {
    let mut item = InventoryItem::new("Bolt");
    item.min_quantity = 5;
    assert_eq!(stock_color(&item), Color::Red);
    item.quantity = 5;
    assert_eq!(stock_color(&item), Color::Yellow);
    item.quantity = 6;
    assert_eq!(stock_color(&item), Color::Green);
  }

  #[test]
  fn test_requisition_color() {
    assert_eq!(requisition_color(RequisitionStatus::Pending), Color::Yellow);
    assert_eq!(requisition_color(RequisitionStatus::Rejected), Color::Red);
  }
}
