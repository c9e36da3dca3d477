//! How each inventory collection is shown as a table row.

use color_eyre::{eyre::eyre, Result};
use ratatui::prelude::*;

use crate::db::FormFields;
use crate::inventory::types::{
  Category, InventoryItem, InventoryItemPatch, Location, PurchaseRequisition,
  PurchaseRequisitionPatch, Resource, Supplier, Unit,
};
use crate::ui::components::{FieldKind, FieldSpec, FormSpec};
use crate::ui::renderfns::{requisition_color, stock_color};

/// A rendered cell: text plus its color
pub type Cell = (String, Style);

/// A resource that `RecordListView` can list, filter and edit.
pub trait ListRow: Resource {
  /// Column titles and widths, the last column takes the remaining space
  const COLUMNS: &'static [(&'static str, u16)];

  /// Create form opened with `a`, if records can be created from the TUI
  const FORM: Option<&'static FormSpec> = None;

  /// One cell per column
  fn cells(&self) -> Vec<Cell>;

  /// Case-insensitive match against the filter; `needle` is lowercase
  fn matches(&self, needle: &str) -> bool;

  /// Patch for a `+`/`-` press, if the record has a quantity
  fn adjust_quantity(&self, _delta: i64) -> Option<Self::Patch> {
    None
  }

  /// Build a new record from validated form values
  fn from_form(_fields: &FormFields) -> Result<Self> {
    Err(eyre!("{} cannot be created here", Self::LABEL))
  }
}

fn plain(text: impl Into<String>) -> Cell {
  (text.into(), Style::default())
}

fn dim(text: impl Into<String>) -> Cell {
  (text.into(), Style::default().fg(Color::DarkGray))
}

fn contains(haystack: &str, needle: &str) -> bool {
  haystack.to_lowercase().contains(needle)
}

fn field<'a>(fields: &'a FormFields, name: &str) -> &'a str {
  fields.get(name).map(|v| v.trim()).unwrap_or("")
}

fn optional_text(fields: &FormFields, name: &str) -> Option<String> {
  Some(field(fields, name))
    .filter(|v| !v.is_empty())
    .map(str::to_string)
}

fn count(fields: &FormFields, name: &str) -> Result<i64> {
  match field(fields, name) {
    "" => Ok(0),
    raw => raw
      .parse()
      .map_err(|e| eyre!("Invalid {} '{}': {}", name, raw, e)),
  }
}

fn optional_id(fields: &FormFields, name: &str) -> Result<Option<i64>> {
  match field(fields, name) {
    "" => Ok(None),
    raw => raw
      .parse()
      .map(Some)
      .map_err(|e| eyre!("Invalid {} '{}': {}", name, raw, e)),
  }
}

fn required(fields: &FormFields, name: &str) -> Result<String> {
  optional_text(fields, name).ok_or_else(|| eyre!("{} is required", name))
}

// ============================================================================
// Items
// ============================================================================

pub const NEW_ITEM_FORM: FormSpec = FormSpec {
  id: "new_item",
  title: "New item",
  fields: &[
    FieldSpec {
      name: "name",
      label: "Name",
      kind: FieldKind::Required,
    },
    FieldSpec {
      name: "sku",
      label: "SKU",
      kind: FieldKind::Text,
    },
    FieldSpec {
      name: "quantity",
      label: "Quantity",
      kind: FieldKind::Count,
    },
    FieldSpec {
      name: "min_quantity",
      label: "Reorder at",
      kind: FieldKind::Count,
    },
    FieldSpec {
      name: "category_id",
      label: "Category id",
      kind: FieldKind::OptionalId,
    },
    FieldSpec {
      name: "location_id",
      label: "Location id",
      kind: FieldKind::OptionalId,
    },
    FieldSpec {
      name: "description",
      label: "Description",
      kind: FieldKind::Text,
    },
  ],
};

impl ListRow for InventoryItem {
  const COLUMNS: &'static [(&'static str, u16)] =
    &[("SKU", 12), ("QTY", 7), ("MIN", 6), ("NAME", 0)];
  const FORM: Option<&'static FormSpec> = Some(&NEW_ITEM_FORM);

  fn cells(&self) -> Vec<Cell> {
    vec![
      (self.sku.clone(), Style::default().fg(Color::Cyan)),
      (
        self.quantity.to_string(),
        Style::default().fg(stock_color(self)),
      ),
      dim(self.min_quantity.to_string()),
      plain(self.name.clone()),
    ]
  }

  fn matches(&self, needle: &str) -> bool {
    contains(&self.name, needle)
      || contains(&self.sku, needle)
      || self
        .description
        .as_deref()
        .is_some_and(|d| contains(d, needle))
  }

  fn adjust_quantity(&self, delta: i64) -> Option<InventoryItemPatch> {
    let quantity = self.quantity.saturating_add(delta).max(0);
    (quantity != self.quantity).then(|| InventoryItemPatch::quantity(quantity))
  }

  fn from_form(fields: &FormFields) -> Result<Self> {
    let mut item = InventoryItem::new(required(fields, "name")?);
    item.sku = field(fields, "sku").to_string();
    item.quantity = count(fields, "quantity")?;
    item.min_quantity = count(fields, "min_quantity")?;
    item.category_id = optional_id(fields, "category_id")?;
    item.location_id = optional_id(fields, "location_id")?;
    item.description = optional_text(fields, "description");
    Ok(item)
  }
}

// ============================================================================
// Reference data
// ============================================================================

pub const NEW_CATEGORY_FORM: FormSpec = FormSpec {
  id: "new_category",
  title: "New category",
  fields: &[
    FieldSpec {
      name: "name",
      label: "Name",
      kind: FieldKind::Required,
    },
    FieldSpec {
      name: "description",
      label: "Description",
      kind: FieldKind::Text,
    },
  ],
};

impl ListRow for Category {
  const COLUMNS: &'static [(&'static str, u16)] = &[("ID", 6), ("NAME", 28), ("DESCRIPTION", 0)];
  const FORM: Option<&'static FormSpec> = Some(&NEW_CATEGORY_FORM);

  fn cells(&self) -> Vec<Cell> {
    vec![
      dim(self.id.to_string()),
      plain(self.name.clone()),
      dim(self.description.clone().unwrap_or_default()),
    ]
  }

  fn matches(&self, needle: &str) -> bool {
    contains(&self.name, needle)
      || self
        .description
        .as_deref()
        .is_some_and(|d| contains(d, needle))
  }

  fn from_form(fields: &FormFields) -> Result<Self> {
    Ok(Category {
      id: 0,
      name: required(fields, "name")?,
      description: optional_text(fields, "description"),
    })
  }
}

impl ListRow for Unit {
  const COLUMNS: &'static [(&'static str, u16)] = &[("ID", 6), ("ABBR", 8), ("NAME", 0)];

  fn cells(&self) -> Vec<Cell> {
    vec![
      dim(self.id.to_string()),
      (self.abbreviation.clone(), Style::default().fg(Color::Cyan)),
      plain(self.name.clone()),
    ]
  }

  fn matches(&self, needle: &str) -> bool {
    contains(&self.name, needle) || contains(&self.abbreviation, needle)
  }
}

impl ListRow for Location {
  const COLUMNS: &'static [(&'static str, u16)] = &[("ID", 6), ("NAME", 28), ("DESCRIPTION", 0)];

  fn cells(&self) -> Vec<Cell> {
    vec![
      dim(self.id.to_string()),
      plain(self.name.clone()),
      dim(self.description.clone().unwrap_or_default()),
    ]
  }

  fn matches(&self, needle: &str) -> bool {
    contains(&self.name, needle)
      || self
        .description
        .as_deref()
        .is_some_and(|d| contains(d, needle))
  }
}

// ============================================================================
// Suppliers and requisitions
// ============================================================================

impl ListRow for Supplier {
  const COLUMNS: &'static [(&'static str, u16)] =
    &[("NAME", 24), ("CONTACT", 20), ("PHONE", 16), ("EMAIL", 0)];

  fn cells(&self) -> Vec<Cell> {
    vec![
      plain(self.name.clone()),
      plain(self.contact_person.clone().unwrap_or_default()),
      dim(self.phone.clone().unwrap_or_default()),
      dim(self.email.clone().unwrap_or_default()),
    ]
  }

  fn matches(&self, needle: &str) -> bool {
    [
      Some(self.name.as_str()),
      self.contact_person.as_deref(),
      self.email.as_deref(),
      self.phone.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|value| contains(value, needle))
  }
}

impl ListRow for PurchaseRequisition {
  const COLUMNS: &'static [(&'static str, u16)] =
    &[("ID", 6), ("STATUS", 10), ("QTY", 6), ("ITEM", 28), ("REQUESTED BY", 0)];

  fn cells(&self) -> Vec<Cell> {
    let item = self
      .item_name
      .clone()
      .unwrap_or_else(|| format!("item #{}", self.item_id));
    vec![
      dim(self.id.to_string()),
      (
        self.status.to_string(),
        Style::default().fg(requisition_color(self.status)),
      ),
      plain(self.quantity.to_string()),
      plain(item),
      dim(self.requested_by.clone().unwrap_or_default()),
    ]
  }

  fn matches(&self, needle: &str) -> bool {
    contains(&self.status.to_string(), needle)
      || self
        .item_name
        .as_deref()
        .is_some_and(|n| contains(n, needle))
      || self
        .requested_by
        .as_deref()
        .is_some_and(|r| contains(r, needle))
  }

  /// Requisitions always ask for at least one unit
  fn adjust_quantity(&self, delta: i64) -> Option<PurchaseRequisitionPatch> {
    let quantity = self.quantity.saturating_add(delta).max(1);
    (quantity != self.quantity).then(|| PurchaseRequisitionPatch {
      quantity: Some(quantity),
      ..Default::default()
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::inventory::types::RequisitionStatus;
  use crate::optimistic::Record;

  fn form(pairs: &[(&str, &str)]) -> FormFields {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn test_item_from_form() {
    let item = InventoryItem::from_form(&form(&[
      ("name", "Hex bolt M8"),
      ("sku", "HB-M8"),
      ("quantity", "40"),
      ("min_quantity", ""),
      ("category_id", "3"),
      ("location_id", ""),
      ("description", ""),
    ]))
    .unwrap();

    assert_eq!(item.name, "Hex bolt M8");
    assert_eq!(item.quantity, 40);
    assert_eq!(item.min_quantity, 0);
    assert_eq!(item.category_id, Some(3));
    assert_eq!(item.location_id, None);
    assert_eq!(item.description, None);
  }

  #[test]
  fn test_item_from_form_rejects_missing_name() {
    assert!(InventoryItem::from_form(&form(&[("name", "  ")])).is_err());
  }

  #[test]
  fn test_item_form_lists_core_fields() {
    let names: Vec<&str> = NEW_ITEM_FORM.fields.iter().map(|f| f.name).collect();
    assert!(names.contains(&"name"));
    assert!(names.contains(&"quantity"));
  }

  #[test]
  fn test_item_quantity_never_goes_negative() {
    let mut item = InventoryItem::new("Washers");
    item.quantity = 1;

    let patch = item.adjust_quantity(-1).unwrap();
    item.apply(&patch);
    assert_eq!(item.quantity, 0);

    assert_eq!(item.adjust_quantity(-1), None);
    assert_eq!(
      item.adjust_quantity(5),
      Some(InventoryItemPatch::quantity(5))
    );
  }

  #[test]
  fn test_quantity_adjustment_saturates_at_max() {
    let mut item = InventoryItem::new("Rivets");
    item.quantity = i64::MAX;
    assert_eq!(item.adjust_quantity(1), None);
    assert_eq!(
      item.adjust_quantity(-1),
      Some(InventoryItemPatch::quantity(i64::MAX - 1))
    );
  }

  #[test]
  fn test_requisition_quantity_floor_is_one() {
    let requisition = PurchaseRequisition {
      id: 9,
      item_id: 1,
      item_name: Some("Gloves".to_string()),
      quantity: 1,
      status: RequisitionStatus::Pending,
      requested_by: Some("dock".to_string()),
      notes: None,
      created_at: None,
    };
    assert_eq!(requisition.adjust_quantity(-1), None);
    let bulk = PurchaseRequisition {
      quantity: i64::MAX,
      ..requisition.clone()
    };
    assert_eq!(bulk.adjust_quantity(1), None);
    assert!(requisition.matches("glov"));
    assert!(requisition.matches("pending"));
    assert!(!requisition.matches("approved"));
  }

  #[test]
  fn test_matches_is_case_insensitive_on_record_side() {
    let mut item = InventoryItem::new("Cable Ties");
    item.sku = "CT-200".to_string();
    assert!(item.matches("ties"));
    assert!(item.matches("ct-2"));
    assert!(!item.matches("bolt"));
  }

  #[test]
  fn test_read_only_collections_have_no_form() {
    assert!(Unit::FORM.is_none());
    assert!(Supplier::FORM.is_none());
    assert!(Unit::from_form(&FormFields::new()).is_err());
  }
}
