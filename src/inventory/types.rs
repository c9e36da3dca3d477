//! Domain types matching the inventory API's JSON.
//!
//! Each entity comes with a `*Patch` type listing the fields an update may
//! change. Patches serialize only the fields that are set, so they double as
//! the body of a PUT request.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

use crate::optimistic::Record;

/// An entity exposed as a REST collection, e.g. `/api/items`.
pub trait Resource: Record + Serialize + DeserializeOwned + Sync {
  /// Collection path segment under `/api/`
  const PATH: &'static str;
  /// Human readable collection name
  const LABEL: &'static str;
}

/// Sets `self.$field` for every `Some` field of a patch.
macro_rules! apply_fields {
  ($target:expr, $patch:expr, $($field:ident),+ $(,)?) => {
    $(
      if let Some(value) = &$patch.$field {
        $target.$field = value.clone();
      }
    )+
  };
}

// ============================================================================
// Inventory items
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
  #[serde(default)]
  pub id: i64,
  pub name: String,
  #[serde(default)]
  pub sku: String,
  pub category_id: Option<i64>,
  pub unit_id: Option<i64>,
  pub location_id: Option<i64>,
  pub supplier_id: Option<i64>,
  #[serde(default)]
  pub quantity: i64,
  #[serde(default)]
  pub min_quantity: i64,
  pub description: Option<String>,
  pub updated_at: Option<String>,
}

impl InventoryItem {
  /// A blank item ready to be filled in and created.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      id: 0,
      name: name.into(),
      sku: String::new(),
      category_id: None,
      unit_id: None,
      location_id: None,
      supplier_id: None,
      quantity: 0,
      min_quantity: 0,
      description: None,
      updated_at: None,
    }
  }

  /// At or below the reorder threshold
  pub fn is_low_stock(&self) -> bool {
    self.quantity <= self.min_quantity
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryItemPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sku: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category_id: Option<Option<i64>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub unit_id: Option<Option<i64>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub location_id: Option<Option<i64>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub supplier_id: Option<Option<i64>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub quantity: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub min_quantity: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<Option<String>>,
}

impl InventoryItemPatch {
  pub fn quantity(quantity: i64) -> Self {
    Self {
      quantity: Some(quantity),
      ..Default::default()
    }
  }
}

impl Record for InventoryItem {
  type Patch = InventoryItemPatch;

  fn id(&self) -> i64 {
    self.id
  }

  fn apply(&mut self, patch: &InventoryItemPatch) {
    apply_fields!(
      self,
      patch,
      name,
      sku,
      category_id,
      unit_id,
      location_id,
      supplier_id,
      quantity,
      min_quantity,
      description,
    );
  }
}

impl Resource for InventoryItem {
  const PATH: &'static str = "items";
  const LABEL: &'static str = "Items";
}

// ============================================================================
// Reference data: categories, units, locations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  #[serde(default)]
  pub id: i64,
  pub name: String,
  pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<Option<String>>,
}

impl Record for Category {
  type Patch = CategoryPatch;

  fn id(&self) -> i64 {
    self.id
  }

  fn apply(&mut self, patch: &CategoryPatch) {
    apply_fields!(self, patch, name, description);
  }
}

impl Resource for Category {
  const PATH: &'static str = "categories";
  const LABEL: &'static str = "Categories";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
  #[serde(default)]
  pub id: i64,
  pub name: String,
  #[serde(default)]
  pub abbreviation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnitPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub abbreviation: Option<String>,
}

impl Record for Unit {
  type Patch = UnitPatch;

  fn id(&self) -> i64 {
    self.id
  }

  fn apply(&mut self, patch: &UnitPatch) {
    apply_fields!(self, patch, name, abbreviation);
  }
}

impl Resource for Unit {
  const PATH: &'static str = "units";
  const LABEL: &'static str = "Units";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
  #[serde(default)]
  pub id: i64,
  pub name: String,
  pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LocationPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<Option<String>>,
}

impl Record for Location {
  type Patch = LocationPatch;

  fn id(&self) -> i64 {
    self.id
  }

  fn apply(&mut self, patch: &LocationPatch) {
    apply_fields!(self, patch, name, description);
  }
}

impl Resource for Location {
  const PATH: &'static str = "locations";
  const LABEL: &'static str = "Locations";
}

// ============================================================================
// Suppliers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
  #[serde(default)]
  pub id: i64,
  pub name: String,
  pub contact_person: Option<String>,
  pub phone: Option<String>,
  pub email: Option<String>,
  pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SupplierPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub contact_person: Option<Option<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<Option<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<Option<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub address: Option<Option<String>>,
}

impl Record for Supplier {
  type Patch = SupplierPatch;

  fn id(&self) -> i64 {
    self.id
  }

  fn apply(&mut self, patch: &SupplierPatch) {
    apply_fields!(self, patch, name, contact_person, phone, email, address);
  }
}

impl Resource for Supplier {
  const PATH: &'static str = "suppliers";
  const LABEL: &'static str = "Suppliers";
}

// ============================================================================
// Purchase requisitions
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequisitionStatus {
  #[default]
  Pending,
  Approved,
  Rejected,
  Ordered,
}

impl fmt::Display for RequisitionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      RequisitionStatus::Pending => "Pending",
      RequisitionStatus::Approved => "Approved",
      RequisitionStatus::Rejected => "Rejected",
      RequisitionStatus::Ordered => "Ordered",
    };
    f.write_str(label)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequisition {
  #[serde(default)]
  pub id: i64,
  pub item_id: i64,
  /// Denormalized by the API for display
  pub item_name: Option<String>,
  pub quantity: i64,
  #[serde(default)]
  pub status: RequisitionStatus,
  pub requested_by: Option<String>,
  pub notes: Option<String>,
  pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PurchaseRequisitionPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub quantity: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<RequisitionStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<Option<String>>,
}

impl Record for PurchaseRequisition {
  type Patch = PurchaseRequisitionPatch;

  fn id(&self) -> i64 {
    self.id
  }

  fn apply(&mut self, patch: &PurchaseRequisitionPatch) {
    apply_fields!(self, patch, quantity, status, notes);
  }
}

impl Resource for PurchaseRequisition {
  const PATH: &'static str = "requisitions";
  const LABEL: &'static str = "Requisitions";
}

// ============================================================================
// Dashboard
// ============================================================================

/// Counters shown on the dashboard header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardStats {
  pub total_items: u64,
  pub low_stock_items: u64,
  pub total_categories: u64,
  pub total_suppliers: u64,
  pub pending_requisitions: u64,
}
