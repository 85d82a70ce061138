//! Core cuckoo engine.
//!
//! Two [`Slots`] tables, one candidate cell per key in each. Writers never
//! lock: every state change is a single compare-and-swap on a slot's entry
//! pointer, and a slot whose occupant is being moved is sealed so that any
//! thread running into it can finish (or abort) the move on the owner's
//! behalf.
//!
//! Memory is reclaimed through [`sdd`]; see [`Slots`] for the slot format.
//!
//! [`sdd`]: https://docs.rs/sdd

use core::borrow::Borrow;
use core::fmt::Debug;
use core::fmt::DebugMap;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;

use sdd::Guard;
use sdd::Ptr;
use sdd::Shared;

use crate::error::Error;
use crate::flag::Flag;
use crate::index::Side;
use crate::index::Slot;
use crate::params::Params;
use crate::params::ParamsExt;
use crate::slots::Entry;
use crate::slots::Slots;
use crate::slots::Snapshot;
use crate::sync::atomic::AtomicUsize;
use crate::sync::atomic::Ordering::Relaxed;

// -----------------------------------------------------------------------------
// Table State
// -----------------------------------------------------------------------------

pub(crate) struct Table<K, V, P>
where
  P: Params + ?Sized,
{
  /// Approximate number of live records.
  entries: AtomicUsize,
  tables: [Slots<K, V, P>; 2],
}

impl<K, V, P> Table<K, V, P>
where
  P: Params + ?Sized,
{
  #[track_caller]
  #[inline]
  pub(crate) fn new() -> Self {
    Self {
      entries: AtomicUsize::new(0),
      tables: [Slots::new(), Slots::new()],
    }
  }

  #[inline]
  pub(crate) const fn cap(&self) -> usize {
    P::SLOTS
  }

  /// Returns the live record count, clamped at zero while a remove is
  /// accounted ahead of the insert it raced with.
  #[inline]
  pub(crate) fn len(&self) -> usize {
    let count: usize = self.entries.load(Relaxed);

    if count > isize::MAX as usize { 0 } else { count }
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.len() == 0
  }

  #[inline]
  pub(crate) fn slots(&self, side: Side) -> &Slots<K, V, P> {
    &self.tables[side.as_usize()]
  }

  #[inline]
  fn read<'guard>(&self, slot: Slot<P>, guard: &'guard Guard) -> Snapshot<'guard, K, V> {
    self.slots(slot.side()).read(slot.index(), guard)
  }
}

// -----------------------------------------------------------------------------
// Map Operations
// -----------------------------------------------------------------------------

impl<K, V, P> Table<K, V, P>
where
  K: Eq,
  P: Params + ?Sized,
{
  /// Inserts or replaces `key`, returning the value it replaced.
  pub(crate) fn insert(&self, hash: u64, key: K, value: V) -> Result<Option<V>, Error>
  where
    K: 'static,
    V: Clone + 'static,
  {
    let guard: Guard = Guard::new();
    let mut record: Shared<Entry<K, V>> = Shared::new(Entry::new(hash, key, value));

    loop {
      let lookup: Lookup<'_, K, V, P> = self.find(hash, &record.key, &guard);

      if let Some(side) = lookup.found {
        let (slot, snapshot) = lookup.get(side);

        match self.slots(side).install(slot.index(), snapshot.ptr(), record, &guard) {
          Ok(()) => return Ok(snapshot.entry().map(|entry| entry.value.clone())),
          Err(returned) => record = returned,
        }

        continue;
      }

      if let Some((slot, snapshot)) = lookup.vacant() {
        match self.slots(slot.side()).install(slot.index(), snapshot.ptr(), record, &guard) {
          Ok(()) => {
            self.entries.fetch_add(1, Relaxed);
            self.settle(lookup.slots, &guard);
            return Ok(None);
          }
          Err(returned) => record = returned,
        }

        continue;
      }

      if self.relocate(lookup.slots[0], &guard) {
        continue;
      }

      // A racing writer may have stored the key or opened a candidate while
      // the route was searched.
      if !self.find(hash, &record.key, &guard).same_as(&lookup) {
        continue;
      }

      log::debug!(
        "no free slot within {} hops of {:?}, table is full",
        P::MAX_ROUTE,
        lookup.slots[0],
      );

      return Err(Error::TableFull);
    }
  }

  /// Applies `f` to the current record for `key`.
  ///
  /// Read-only: marked slots are read through, never helped.
  pub(crate) fn with<Q, F, R>(&self, hash: u64, key: &Q, f: F) -> Option<R>
  where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
    F: FnOnce(&K, &V) -> R,
  {
    let guard: Guard = Guard::new();
    let slots: [Slot<P>; 2] = Slot::pair(hash);
    let mut previous: Option<[Flag; 2]> = None;

    loop {
      let first: Snapshot<'_, K, V> = self.read(slots[0], &guard);

      if let Some(entry) = first.entry().filter(|entry| entry.matches(hash, key)) {
        return Some(f(&entry.key, &entry.value));
      }

      let second: Snapshot<'_, K, V> = self.read(slots[1], &guard);

      if let Some(entry) = second.entry().filter(|entry| entry.matches(hash, key)) {
        return Some(f(&entry.key, &entry.value));
      }

      let current: [Flag; 2] = [first.flag(), second.flag()];

      if previous == Some(current) {
        return None;
      }

      previous = Some(current);
    }
  }

  /// Removes `key`, returning the value it held.
  pub(crate) fn remove<Q>(&self, hash: u64, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
    V: Clone,
  {
    let guard: Guard = Guard::new();

    loop {
      let lookup: Lookup<'_, K, V, P> = self.find(hash, key, &guard);
      let side: Side = lookup.found?;
      let (slot, snapshot) = lookup.get(side);

      // A relocation may have carried the key into table 0 since the lookup.
      if side == Side::One && !self.read(lookup.slots[0], &guard).same_as(&lookup.snapshots[0]) {
        continue;
      }

      if self.slots(side).clear(slot.index(), snapshot.ptr(), &guard) {
        self.entries.fetch_sub(1, Relaxed);
        return snapshot.entry().map(|entry| entry.value.clone());
      }
    }
  }

  // ---------------------------------------------------------------------------
  // Find
  // ---------------------------------------------------------------------------

  /// Locates `key` in its two candidate slots.
  ///
  /// Marked slots are driven to completion before they are looked at, and a
  /// key seen in both tables loses its table 1 copy. A key is reported absent
  /// only after two consecutive passes saw identical flag words in both slots.
  fn find<'guard, Q>(&self, hash: u64, key: &Q, guard: &'guard Guard) -> Lookup<'guard, K, V, P>
  where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
  {
    let slots: [Slot<P>; 2] = Slot::pair(hash);
    let mut previous: Option<[Flag; 2]> = None;

    loop {
      let first: Snapshot<'guard, K, V> = self.read(slots[0], guard);

      if first.is_marked() {
        self.relocate_slot(slots[0], false, guard);
        continue;
      }

      let second: Snapshot<'guard, K, V> = self.read(slots[1], guard);

      if second.is_marked() {
        self.relocate_slot(slots[1], false, guard);
        continue;
      }

      let in_first: bool = first.entry().is_some_and(|entry| entry.matches(hash, key));
      let in_second: bool = second.entry().is_some_and(|entry| entry.matches(hash, key));

      let found: Option<Side> = match (in_first, in_second) {
        (true, true) => {
          self.collapse(slots[1], &first, &second, guard);
          continue;
        }
        (true, false) => Some(Side::Zero),
        (false, true) => Some(Side::One),
        (false, false) => {
          let current: [Flag; 2] = [first.flag(), second.flag()];

          if previous != Some(current) {
            previous = Some(current);
            continue;
          }

          None
        }
      };

      return Lookup {
        slots,
        snapshots: [first, second],
        found,
      };
    }
  }

  /// Deletes the table 1 half of a key found in both candidate slots.
  fn collapse(
    &self,
    stale_slot: Slot<P>,
    keep: &Snapshot<'_, K, V>,
    stale: &Snapshot<'_, K, V>,
    guard: &Guard,
  ) {
    debug_assert_eq!(stale_slot.side(), Side::One);

    if self.slots(Side::One).clear(stale_slot.index(), stale.ptr(), guard) {
      if !keep.same_record(stale) {
        self.entries.fetch_sub(1, Relaxed);
      }

      log::trace!("collapsed duplicate key at {stale_slot:?}");
    }
  }

  /// Collapses a duplicate created by two racing first-time inserts of the
  /// same key into different tables.
  fn settle(&self, slots: [Slot<P>; 2], guard: &Guard) {
    let first: Snapshot<'_, K, V> = self.read(slots[0], guard);
    let second: Snapshot<'_, K, V> = self.read(slots[1], guard);

    if first.is_marked() || second.is_marked() {
      return;
    }

    if let (Some(a), Some(b)) = (first.entry(), second.entry())
      && a.same_key(b)
    {
      self.collapse(slots[1], &first, &second, guard);
    }
  }

  // ---------------------------------------------------------------------------
  // Helping
  // ---------------------------------------------------------------------------

  /// Moves the occupant of `source` to its slot in the other table.
  ///
  /// An `initiator` seals an unsealed occupant first; anyone else only drains
  /// a move that is already sealed. Returns `false` if the destination holds
  /// an unrelated record or is sealed itself, in which case the seal on
  /// `source` is lifted again.
  pub(crate) fn relocate_slot(&self, source: Slot<P>, initiator: bool, guard: &Guard) -> bool {
    let cells: &Slots<K, V, P> = self.slots(source.side());

    loop {
      let current: Snapshot<'_, K, V> = self.read(source, guard);

      let Some(entry) = current.entry() else {
        return true;
      };

      if !current.is_marked() {
        if !initiator {
          return true;
        }

        cells.seal(source.index(), current.ptr());
        continue;
      }

      let target: Slot<P> = source.alternate(entry.hash);
      let occupant: Snapshot<'_, K, V> = self.read(target, guard);

      match occupant.entry() {
        // Two sealed cells must never settle against each other: each would
        // see the other as the surviving copy and both would be emptied.
        Some(_) if occupant.is_marked() => {
          if cells.unseal(source.index(), current.ptr()) {
            return false;
          }
        }
        None => {
          // The seal holds a reference, so the record cannot be retiring.
          let Some(record) = current.ptr().get_shared() else {
            continue;
          };

          let target_cells: &Slots<K, V, P> = self.slots(target.side());

          if target_cells
            .install(target.index(), occupant.ptr(), record, guard)
            .is_err()
          {
            continue;
          }

          target_cells.bump(target.index());
          self.finish(source, current.ptr(), false, guard);

          return true;
        }
        Some(_) if current.same_record(&occupant) => {
          self.finish(source, current.ptr(), false, guard);
          return true;
        }
        Some(other) if other.same_key(entry) => {
          // The key was replaced (or inserted twice) on the far side; this
          // copy is stale.
          self.finish(source, current.ptr(), true, guard);
          return true;
        }
        Some(_) => {
          if cells.unseal(source.index(), current.ptr()) {
            return false;
          }
        }
      }
    }
  }

  /// Empties a sealed source once its record is safe elsewhere.
  ///
  /// Does nothing if the seal was lifted in the meantime.
  pub(crate) fn finish(
    &self,
    source: Slot<P>,
    sealed: Ptr<'_, Entry<K, V>>,
    distinct: bool,
    guard: &Guard,
  ) {
    let cells: &Slots<K, V, P> = self.slots(source.side());

    if cells.clear(source.index(), sealed, guard) {
      cells.bump(source.index());

      if distinct {
        self.entries.fetch_sub(1, Relaxed);
      }
    }
  }

  // ---------------------------------------------------------------------------
  // Relocation
  // ---------------------------------------------------------------------------

  /// Frees `origin` by shifting a chain of at most `P::MAX_ROUTE` records one
  /// step each toward an empty slot.
  ///
  /// The bound applies to each route, not to the sum of all attempts. A hop
  /// that loses its destination to a concurrent writer keeps the hops behind
  /// it and searches on from the conflict; every restart follows a write by
  /// another thread, so the loop stays lock-free.
  ///
  /// Returns `false` only if no empty slot is reachable within the bound.
  fn relocate(&self, origin: Slot<P>, guard: &Guard) -> bool {
    let mut route: Vec<Hop<'_, K, V, P>> = Vec::with_capacity(P::MAX_ROUTE);
    let mut cursor: Slot<P> = origin;

    loop {
      // Search: follow occupants until an empty slot turns up.
      loop {
        let snapshot: Snapshot<'_, K, V> = self.read(cursor, guard);

        if snapshot.is_marked() {
          self.relocate_slot(cursor, false, guard);
          continue;
        }

        let Some(entry) = snapshot.entry() else {
          break;
        };

        if let Some(last) = route.last()
          && let Some(previous) = last.snapshot.entry()
          && previous.same_key(entry)
        {
          let (prior_slot, prior_snapshot) = (last.slot, last.snapshot);

          if cursor.side() == Side::One {
            self.collapse(cursor, &prior_snapshot, &snapshot, guard);
          } else {
            self.collapse(prior_slot, &snapshot, &prior_snapshot, guard);
          }

          route.pop();
          cursor = prior_slot;
          continue;
        }

        if route.len() == P::MAX_ROUTE {
          return false;
        }

        route.push(Hop {
          slot: cursor,
          snapshot,
        });

        cursor = cursor.alternate(entry.hash);
      }

      log::trace!("relocating {:?} over {} hops", origin, route.len());

      // Execute: move the far end first so every hop lands in a hole.
      let conflict: Option<usize> = route
        .iter()
        .rposition(|hop| !self.relocate_slot(hop.slot, true, guard));

      let Some(position) = conflict else {
        return true;
      };

      cursor = match route.get(position + 1) {
        Some(hop) => hop.slot,
        None => cursor,
      };

      route.truncate(position + 1);

      log::trace!("relocation of {origin:?} blocked at hop {position}, searching from {cursor:?}");
    }
  }
}

// -----------------------------------------------------------------------------
// Debug
// -----------------------------------------------------------------------------

impl<K, V, P> Debug for Table<K, V, P>
where
  K: Debug,
  V: Debug,
  P: Params + ?Sized,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    let mut debug: DebugMap<'_, '_> = f.debug_map();
    let guard: Guard = Guard::new();

    for side in Side::BOTH {
      self.slots(side).for_each(&guard, |index, entry, _| {
        debug.entry(&format_args!("{}:{index}", side.as_usize()), &(&entry.key, &entry.value));
      });
    }

    debug.finish()
  }
}

// -----------------------------------------------------------------------------
// Test Introspection
// -----------------------------------------------------------------------------

#[cfg(test)]
impl<K, V, P> Table<K, V, P>
where
  P: Params + ?Sized,
{
  /// Every occupied cell as `(side, index, key, marked)`.
  pub(crate) fn occupants(&self) -> Vec<(Side, usize, K, bool)>
  where
    K: Clone,
  {
    let guard: Guard = Guard::new();
    let mut output: Vec<(Side, usize, K, bool)> = Vec::new();

    for side in Side::BOTH {
      self.slots(side).for_each(&guard, |index, entry, marked| {
        output.push((side, index, entry.key.clone(), marked));
      });
    }

    output
  }
}

// -----------------------------------------------------------------------------
// Lookup
// -----------------------------------------------------------------------------

/// What [`Table::find`] saw: both candidate slots, their glued snapshots, and
/// which of them (if any) holds the key.
struct Lookup<'guard, K, V, P>
where
  P: ?Sized,
{
  slots: [Slot<P>; 2],
  snapshots: [Snapshot<'guard, K, V>; 2],
  found: Option<Side>,
}

impl<'guard, K, V, P> Lookup<'guard, K, V, P>
where
  P: Params + ?Sized,
{
  #[inline]
  fn get(&self, side: Side) -> (Slot<P>, Snapshot<'guard, K, V>) {
    (self.slots[side.as_usize()], self.snapshots[side.as_usize()])
  }

  /// Returns `true` if both lookups saw the same candidate cells unchanged.
  #[inline]
  fn same_as(&self, other: &Self) -> bool {
    self.found == other.found
      && self.snapshots[0].same_as(&other.snapshots[0])
      && self.snapshots[1].same_as(&other.snapshots[1])
  }

  /// The first empty candidate, table 0 preferred.
  #[inline]
  fn vacant(&self) -> Option<(Slot<P>, Snapshot<'guard, K, V>)> {
    Side::BOTH
      .into_iter()
      .map(|side| self.get(side))
      .find(|(_, snapshot)| snapshot.is_empty())
  }
}

/// One step of a relocation route: the slot whose occupant must move.
struct Hop<'guard, K, V, P>
where
  P: ?Sized,
{
  slot: Slot<P>,
  snapshot: Snapshot<'guard, K, V>,
}
