//! Optimistic mutations over an in-memory list of records.
//!
//! Every operation changes the local list immediately and then runs the real
//! server call on a spawned task. Outcomes come back over a channel and are
//! applied by `poll()`, which either accepts the optimistic state or rolls it
//! back. Nothing is applied off the caller's thread.

use chrono::Utc;
use color_eyre::Result;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A domain entity that can live in an `OptimisticStore`.
///
/// The associated `Patch` type is the set of field changes an update may
/// carry, so merges are checked at compile time.
pub trait Record: Clone + Send + 'static {
  type Patch: Clone + Send + 'static;

  /// Server-assigned identifier
  fn id(&self) -> i64;

  /// Merge a patch into this record
  fn apply(&mut self, patch: &Self::Patch);
}

/// Identity of a record inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKey {
  /// Known to the server
  Persisted(i64),
  /// Added locally, waiting for the server to assign an id
  Temporary(u64),
}

impl RecordKey {
  pub fn is_temporary(&self) -> bool {
    matches!(self, RecordKey::Temporary(_))
  }
}

impl fmt::Display for RecordKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RecordKey::Persisted(id) => write!(f, "{}", id),
      RecordKey::Temporary(stamp) => write!(f, "temp_{}", stamp),
    }
  }
}

/// A record in the store plus whether it is still waiting on the server.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticRecord<T> {
  pub key: RecordKey,
  pub record: T,
  pub is_optimistic: bool,
}

impl<T: Record> OptimisticRecord<T> {
  fn confirmed(record: T) -> Self {
    Self {
      key: RecordKey::Persisted(record.id()),
      record,
      is_optimistic: false,
    }
  }
}

/// One outstanding patch, in the order it was issued.
#[derive(Debug, Clone)]
pub struct QueuedPatch<P> {
  pub op: u64,
  pub patch: P,
  pub confirmed: bool,
}

/// Rollback ledger entry for a record with updates in flight.
///
/// `original` is the last state the server is known to have accepted.
/// Confirmed patches are folded into it from the front of `updates`, so the
/// visible record is always `original` with every remaining patch replayed.
#[derive(Debug, Clone)]
pub struct PendingUpdate<T: Record> {
  pub key: RecordKey,
  pub updates: Vec<QueuedPatch<T::Patch>>,
  pub original: T,
}

impl<T: Record> PendingUpdate<T> {
  fn replay(&self) -> T {
    let mut record = self.original.clone();
    for queued in &self.updates {
      record.apply(&queued.patch);
    }
    record
  }

  fn fold_confirmed(&mut self) {
    while self.updates.first().is_some_and(|q| q.confirmed) {
      let queued = self.updates.remove(0);
      self.original.apply(&queued.patch);
    }
  }
}

#[derive(Debug)]
struct PendingDelete<T> {
  removed: OptimisticRecord<T>,
  index: usize,
}

/// Which kind of optimistic operation settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
  Update,
  Add,
  Delete,
}

impl fmt::Display for OperationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OperationKind::Update => write!(f, "update"),
      OperationKind::Add => write!(f, "add"),
      OperationKind::Delete => write!(f, "delete"),
    }
  }
}

/// Outcome of a server action, reported by `poll()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
  /// The server accepted the change. For adds, `key` is the new server key.
  Committed { kind: OperationKind, key: RecordKey },
  /// The server rejected the change and local state was restored.
  RolledBack {
    kind: OperationKind,
    key: RecordKey,
    error: String,
  },
}

enum Outcome<T> {
  Update(Result<(), String>),
  Add(Result<T, String>),
  Delete(Result<(), String>),
}

struct Completion<T> {
  op: u64,
  key: RecordKey,
  outcome: Outcome<T>,
}

/// Ordered list of records with optimistic update/add/delete.
///
/// Overlapping updates on the same record stack: a failure removes only the
/// failed patch and replays the rest. Server actions are never cancelled.
pub struct OptimisticStore<T: Record> {
  records: Vec<OptimisticRecord<T>>,
  pending: HashMap<RecordKey, PendingUpdate<T>>,
  deletes: HashMap<u64, PendingDelete<T>>,
  next_op: u64,
  last_temp: u64,
  tx: mpsc::UnboundedSender<Completion<T>>,
  rx: mpsc::UnboundedReceiver<Completion<T>>,
}

impl<T: Record> Default for OptimisticStore<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Record> OptimisticStore<T> {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      records: Vec::new(),
      pending: HashMap::new(),
      deletes: HashMap::new(),
      next_op: 0,
      last_temp: 0,
      tx,
      rx,
    }
  }

  pub fn with_records(records: Vec<T>) -> Self {
    let mut store = Self::new();
    store.records = records.into_iter().map(OptimisticRecord::confirmed).collect();
    store
  }

  pub fn records(&self) -> &[OptimisticRecord<T>] {
    &self.records
  }

  pub fn get(&self, key: RecordKey) -> Option<&OptimisticRecord<T>> {
    self.records.iter().find(|r| r.key == key)
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn pending_update(&self, key: RecordKey) -> Option<&PendingUpdate<T>> {
    self.pending.get(&key)
  }

  /// Number of server actions that have not settled yet.
  pub fn pending_count(&self) -> usize {
    let updates: usize = self.pending.values().map(|p| p.updates.len()).sum();
    let adds = self.records.iter().filter(|r| r.key.is_temporary()).count();
    updates + adds + self.deletes.len()
  }

  pub fn has_pending(&self) -> bool {
    self.pending_count() > 0
  }

  /// Replace the list with fresh server data.
  ///
  /// Unsettled work is carried over: outstanding patches are replayed on the
  /// new copies, temporary records stay at the end and records awaiting
  /// deletion stay hidden.
  pub fn replace_all(&mut self, fresh: Vec<T>) {
    let mut records: Vec<OptimisticRecord<T>> = Vec::with_capacity(fresh.len());

    for record in fresh {
      let mut entry = OptimisticRecord::confirmed(record);
      if self.deletes.values().any(|d| d.removed.key == entry.key) {
        continue;
      }
      if let Some(pending) = self.pending.get_mut(&entry.key) {
        pending.original = entry.record.clone();
        entry.record = pending.replay();
      }
      records.push(entry);
    }

    records.extend(self.records.drain(..).filter(|r| r.key.is_temporary()));
    self.records = records;
  }

  /// Merge `patch` into the record now and confirm it with `action`.
  ///
  /// Returns `false` (and does not run `action`) if no record has `key`.
  pub fn optimistic_update<F, Fut>(&mut self, key: RecordKey, patch: T::Patch, action: F) -> bool
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
  {
    let Some(index) = self.records.iter().position(|r| r.key == key) else {
      warn!(%key, "optimistic update for unknown record");
      return false;
    };

    let op = self.next_op();
    let entry = &mut self.records[index];
    let pending = self.pending.entry(key).or_insert_with(|| PendingUpdate {
      key,
      updates: Vec::new(),
      original: entry.record.clone(),
    });
    pending.updates.push(QueuedPatch {
      op,
      patch: patch.clone(),
      confirmed: false,
    });
    entry.record.apply(&patch);

    debug!(%key, op, "optimistic update applied");
    self.spawn(op, key, action(), Outcome::Update);
    true
  }

  /// Append `record` under a temporary key and create it with `action`.
  ///
  /// `action` must resolve to the server's copy, carrying its permanent id.
  pub fn optimistic_add<F, Fut>(&mut self, record: T, action: F) -> RecordKey
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let key = self.next_temp_key();
    let op = self.next_op();
    self.records.push(OptimisticRecord {
      key,
      record,
      is_optimistic: true,
    });

    debug!(%key, op, "optimistic add applied");
    self.spawn(op, key, action(), Outcome::Add);
    key
  }

  /// Remove the record now and delete it on the server with `action`.
  ///
  /// Returns `false` (and does not run `action`) if no record has `key`.
  pub fn optimistic_delete<F, Fut>(&mut self, key: RecordKey, action: F) -> bool
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
  {
    let Some(index) = self.records.iter().position(|r| r.key == key) else {
      warn!(%key, "optimistic delete for unknown record");
      return false;
    };

    let op = self.next_op();
    let removed = self.records.remove(index);
    self.deletes.insert(op, PendingDelete { removed, index });

    debug!(%key, op, "optimistic delete applied");
    self.spawn(op, key, action(), Outcome::Delete);
    true
  }

  /// Apply every server action that finished since the last call.
  pub fn poll(&mut self) -> Vec<Settlement> {
    let mut settled = Vec::new();
    while let Ok(completion) = self.rx.try_recv() {
      settled.push(self.settle(completion));
    }
    settled
  }

  fn settle(&mut self, completion: Completion<T>) -> Settlement {
    let Completion { op, key, outcome } = completion;
    match outcome {
      Outcome::Update(result) => self.settle_update(op, key, result),
      Outcome::Add(result) => self.settle_add(key, result),
      Outcome::Delete(result) => self.settle_delete(op, key, result),
    }
  }

  fn settle_update(&mut self, op: u64, key: RecordKey, result: Result<(), String>) -> Settlement {
    let kind = OperationKind::Update;
    let Some(pending) = self.pending.get_mut(&key) else {
      return match result {
        Ok(()) => Settlement::Committed { kind, key },
        Err(error) => Settlement::RolledBack { kind, key, error },
      };
    };

    let settlement = match result {
      Ok(()) => {
        if let Some(queued) = pending.updates.iter_mut().find(|q| q.op == op) {
          queued.confirmed = true;
        }
        pending.fold_confirmed();
        debug!(%key, op, "optimistic update committed");
        Settlement::Committed { kind, key }
      }
      Err(error) => {
        pending.updates.retain(|q| q.op != op);
        pending.fold_confirmed();
        let restored = pending.replay();
        if let Some(entry) = self.records.iter_mut().find(|r| r.key == key) {
          entry.record = restored;
        }
        warn!(%key, op, error = %error, "optimistic update rolled back");
        Settlement::RolledBack { kind, key, error }
      }
    };

    if self.pending.get(&key).is_some_and(|p| p.updates.is_empty()) {
      self.pending.remove(&key);
    }
    settlement
  }

  fn settle_add(&mut self, temp_key: RecordKey, result: Result<T, String>) -> Settlement {
    let kind = OperationKind::Add;
    let index = self.records.iter().position(|r| r.key == temp_key);
    match result {
      Ok(server) => {
        let confirmed = OptimisticRecord::confirmed(server);
        let key = confirmed.key;
        let refreshed = self.records.iter().any(|r| r.key == key);
        match index {
          // A refetch already delivered the server copy
          Some(i) if refreshed => {
            self.records.remove(i);
          }
          Some(i) => self.records[i] = confirmed,
          None => debug!(%temp_key, "added record no longer in list"),
        }
        debug!(%temp_key, %key, "optimistic add committed");
        Settlement::Committed { kind, key }
      }
      Err(error) => {
        if let Some(i) = index {
          self.records.remove(i);
        }
        warn!(key = %temp_key, error = %error, "optimistic add rolled back");
        Settlement::RolledBack {
          kind,
          key: temp_key,
          error,
        }
      }
    }
  }

  fn settle_delete(&mut self, op: u64, key: RecordKey, result: Result<(), String>) -> Settlement {
    let kind = OperationKind::Delete;
    let pending = self.deletes.remove(&op);
    match result {
      Ok(()) => {
        debug!(%key, op, "optimistic delete committed");
        Settlement::Committed { kind, key }
      }
      Err(error) => {
        if let Some(PendingDelete { removed, index }) = pending {
          let index = index.min(self.records.len());
          self.records.insert(index, removed);
        }
        warn!(%key, op, error = %error, "optimistic delete rolled back");
        Settlement::RolledBack { kind, key, error }
      }
    }
  }

  fn spawn<R, Fut>(
    &self,
    op: u64,
    key: RecordKey,
    action: Fut,
    wrap: fn(Result<R, String>) -> Outcome<T>,
  ) where
    R: Send + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
  {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let outcome = wrap(action.await.map_err(|e| e.to_string()));
      let _ = tx.send(Completion { op, key, outcome });
    });
  }

  fn next_op(&mut self) -> u64 {
    self.next_op += 1;
    self.next_op
  }

  /// `temp_<millis>`, bumped so two adds in the same millisecond differ.
  fn next_temp_key(&mut self) -> RecordKey {
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    self.last_temp = now.max(self.last_temp + 1);
    RecordKey::Temporary(self.last_temp)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use color_eyre::eyre::eyre;
  use std::time::Duration;

  #[derive(Debug, Clone, PartialEq)]
  struct Stock {
    id: i64,
    name: String,
    qty: i64,
  }

  #[derive(Debug, Clone, Default)]
  struct StockPatch {
    name: Option<String>,
    qty: Option<i64>,
  }

  impl Record for Stock {
    type Patch = StockPatch;

    fn id(&self) -> i64 {
      self.id
    }

    fn apply(&mut self, patch: &StockPatch) {
      if let Some(name) = &patch.name {
        self.name = name.clone();
      }
      if let Some(qty) = patch.qty {
        self.qty = qty;
      }
    }
  }

  fn stock(id: i64, qty: i64) -> Stock {
    Stock {
      id,
      name: format!("item-{}", id),
      qty,
    }
  }

  fn qty(value: i64) -> StockPatch {
    StockPatch {
      qty: Some(value),
      ..Default::default()
    }
  }

  fn ids(store: &OptimisticStore<Stock>) -> Vec<RecordKey> {
    store.records().iter().map(|r| r.key).collect()
  }

  async fn settle(store: &mut OptimisticStore<Stock>) -> Vec<Settlement> {
    tokio::time::sleep(Duration::from_millis(20)).await;
    store.poll()
  }

  #[tokio::test]
  async fn test_update_applies_immediately_and_commits() {
    let key = RecordKey::Persisted(1);
    let mut store = OptimisticStore::with_records(vec![stock(1, 5)]);

    assert!(store.optimistic_update(key, qty(10), || async { Ok(()) }));
    assert_eq!(store.get(key).map(|r| r.record.qty), Some(10));
    assert!(store.pending_update(key).is_some());

    let settled = settle(&mut store).await;
    assert_eq!(
      settled,
      vec![Settlement::Committed {
        kind: OperationKind::Update,
        key
      }]
    );
    assert_eq!(store.get(key).map(|r| r.record.qty), Some(10));
    assert!(store.pending_update(key).is_none());
  }

  #[tokio::test]
  async fn test_update_rolls_back_on_failure() {
    let key = RecordKey::Persisted(1);
    let mut store = OptimisticStore::with_records(vec![stock(1, 5)]);

    store.optimistic_update(key, qty(10), || async { Err(eyre!("conflict")) });
    assert_eq!(store.get(key).map(|r| r.record.qty), Some(10));

    let settled = settle(&mut store).await;
    assert!(matches!(
      &settled[..],
      [Settlement::RolledBack { error, .. }] if error == "conflict"
    ));
    assert_eq!(store.get(key).map(|r| r.record.qty), Some(5));
    assert!(!store.has_pending());
  }

  #[tokio::test]
  async fn test_update_unknown_key_does_not_run_action() {
    let mut store: OptimisticStore<Stock> = OptimisticStore::new();
    let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = ran.clone();

    let applied = store.optimistic_update(RecordKey::Persisted(3), qty(1), move || {
      flag.store(true, std::sync::atomic::Ordering::SeqCst);
      async { Ok(()) }
    });

    assert!(!applied);
    assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
  }

  #[tokio::test]
  async fn test_overlapping_updates_stack_rollbacks() {
    let key = RecordKey::Persisted(1);
    let mut store = OptimisticStore::with_records(vec![stock(1, 5)]);

    // First change fails late, second succeeds right away
    store.optimistic_update(key, qty(10), || async {
      tokio::time::sleep(Duration::from_millis(10)).await;
      Err(eyre!("rejected"))
    });
    store.optimistic_update(
      key,
      StockPatch {
        name: Some("Hex nuts".to_string()),
        ..Default::default()
      },
      || async { Ok(()) },
    );
    assert_eq!(store.pending_update(key).map(|p| p.updates.len()), Some(2));

    settle(&mut store).await;

    assert_eq!(
      store.get(key).map(|r| r.record.clone()),
      Some(Stock {
        id: 1,
        name: "Hex nuts".to_string(),
        qty: 5,
      })
    );
    assert!(store.pending_update(key).is_none());
  }

  #[tokio::test]
  async fn test_add_replaces_temporary_record() {
    let mut store = OptimisticStore::with_records(vec![stock(1, 5)]);

    let temp = store.optimistic_add(
      Stock {
        id: 0,
        name: "X".to_string(),
        qty: 1,
      },
      || async {
        Ok(Stock {
          id: 42,
          name: "X".to_string(),
          qty: 1,
        })
      },
    );

    assert!(temp.is_temporary());
    assert!(temp.to_string().starts_with("temp_"));
    assert!(store.get(temp).is_some_and(|r| r.is_optimistic));

    settle(&mut store).await;

    assert!(store.get(temp).is_none());
    let added = store.get(RecordKey::Persisted(42));
    assert!(added.is_some_and(|r| !r.is_optimistic && r.record.name == "X"));
    assert_eq!(ids(&store), vec![RecordKey::Persisted(1), RecordKey::Persisted(42)]);
  }

  #[tokio::test]
  async fn test_add_settling_after_refetch_keeps_one_copy() {
    let mut store = OptimisticStore::with_records(vec![stock(1, 5)]);
    store.optimistic_add(stock(0, 3), || async { Ok(stock(42, 3)) });

    // The refetch already contains the new record when the add settles
    tokio::time::sleep(Duration::from_millis(20)).await;
    store.replace_all(vec![stock(1, 5), stock(42, 3)]);
    let settled = store.poll();

    assert_eq!(ids(&store), vec![RecordKey::Persisted(1), RecordKey::Persisted(42)]);
    assert!(store.records().iter().all(|r| !r.is_optimistic));
    assert!(matches!(
      &settled[..],
      [Settlement::Committed { kind: OperationKind::Add, key }] if *key == RecordKey::Persisted(42)
    ));
  }

  #[tokio::test]
  async fn test_add_removed_on_failure() {
    let mut store = OptimisticStore::with_records(vec![stock(1, 5)]);

    let temp = store.optimistic_add(stock(0, 1), || async { Err(eyre!("invalid sku")) });
    assert_eq!(store.len(), 2);

    let settled = settle(&mut store).await;

    assert_eq!(ids(&store), vec![RecordKey::Persisted(1)]);
    assert!(matches!(
      &settled[..],
      [Settlement::RolledBack { kind: OperationKind::Add, key, .. }] if *key == temp
    ));
  }

  #[tokio::test]
  async fn test_temporary_keys_are_unique() {
    let mut store: OptimisticStore<Stock> = OptimisticStore::new();
    let a = store.optimistic_add(stock(0, 1), || async { Ok(stock(1, 1)) });
    let b = store.optimistic_add(stock(0, 1), || async { Ok(stock(2, 1)) });
    assert_ne!(a, b);
  }

  #[tokio::test]
  async fn test_delete_removes_immediately_and_commits() {
    let key = RecordKey::Persisted(7);
    let mut store = OptimisticStore::with_records(vec![stock(1, 1), stock(7, 2)]);

    assert!(store.optimistic_delete(key, || async { Ok(()) }));
    assert!(store.get(key).is_none());

    settle(&mut store).await;
    assert!(store.get(key).is_none());
    assert!(!store.has_pending());
  }

  #[tokio::test]
  async fn test_failed_delete_restores_original_position() {
    let mut store = OptimisticStore::with_records(vec![stock(1, 1), stock(7, 2), stock(9, 3)]);

    store.optimistic_delete(RecordKey::Persisted(7), || async { Err(eyre!("in use")) });
    assert_eq!(ids(&store), vec![RecordKey::Persisted(1), RecordKey::Persisted(9)]);

    settle(&mut store).await;
    assert_eq!(
      ids(&store),
      vec![
        RecordKey::Persisted(1),
        RecordKey::Persisted(7),
        RecordKey::Persisted(9)
      ]
    );
  }

  #[tokio::test]
  async fn test_replace_all_keeps_unsettled_work() {
    let mut store = OptimisticStore::with_records(vec![stock(1, 5), stock(2, 5)]);

    store.optimistic_update(RecordKey::Persisted(1), qty(8), || async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      Ok(())
    });
    store.optimistic_delete(RecordKey::Persisted(2), || async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      Ok(())
    });
    let temp = store.optimistic_add(stock(0, 1), || async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      Ok(stock(3, 1))
    });

    store.replace_all(vec![stock(1, 6), stock(2, 5)]);

    assert_eq!(ids(&store), vec![RecordKey::Persisted(1), temp]);
    assert_eq!(store.get(RecordKey::Persisted(1)).map(|r| r.record.qty), Some(8));
    assert_eq!(
      store.pending_update(RecordKey::Persisted(1)).map(|p| p.original.qty),
      Some(6)
    );
  }

  #[test]
  fn test_record_key_display() {
    assert_eq!(RecordKey::Persisted(42).to_string(), "42");
    assert_eq!(RecordKey::Temporary(1700000000000).to_string(), "temp_1700000000000");
  }
}
