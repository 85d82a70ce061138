//! One table: a slot array paired with a flag array.
//!
//! Slots hold [`Entry`] records through [`sdd::AtomicShared`]. An empty slot is
//! a null pointer. A slot whose occupant is being relocated carries
//! [`Tag::First`] on its pointer (the seal); every other writer compares
//! against an untagged pointer and therefore cannot touch a sealed slot.
//!
//! All reads go through [`Slots::read`], which glues the entry pointer to the
//! flag word and retries until both were observed without an intervening
//! timestamp change.

use core::borrow::Borrow;
use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;
use core::hint;
use core::mem;

use sdd::AtomicShared;
use sdd::Guard;
use sdd::Ptr;
use sdd::Shared;
use sdd::Tag;

use crate::array::Array;
use crate::flag::AtomicFlag;
use crate::flag::Flag;
use crate::flag::SlotState;
use crate::index::Index;
use crate::params::Params;
use crate::sync::atomic::Ordering::AcqRel;
use crate::sync::atomic::Ordering::Acquire;
use crate::sync::atomic::Ordering::Relaxed;

// -----------------------------------------------------------------------------
// Entry
// -----------------------------------------------------------------------------

/// An immutable `(key, value)` record.
///
/// Replacing a value publishes a fresh record; a published record is never
/// written to again. The key hash is cached so relocation never needs the
/// map's hasher.
pub(crate) struct Entry<K, V> {
  pub(crate) hash: u64,
  pub(crate) key: K,
  pub(crate) value: V,
}

impl<K, V> Entry<K, V> {
  #[inline]
  pub(crate) const fn new(hash: u64, key: K, value: V) -> Self {
    Self { hash, key, value }
  }

  /// Returns `true` if this record belongs to `key`.
  #[inline]
  pub(crate) fn matches<Q>(&self, hash: u64, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
  {
    self.hash == hash && self.key.borrow() == key
  }

  /// Returns `true` if both records carry the same key.
  #[inline]
  pub(crate) fn same_key(&self, other: &Self) -> bool
  where
    K: Eq,
  {
    self.hash == other.hash && self.key == other.key
  }
}

// -----------------------------------------------------------------------------
// Snapshot
// -----------------------------------------------------------------------------

/// The result of a glued read of one slot.
pub(crate) struct Snapshot<'guard, K, V> {
  ptr: Ptr<'guard, Entry<K, V>>,
  flag: Flag,
}

impl<'guard, K, V> Snapshot<'guard, K, V> {
  #[inline]
  pub(crate) fn ptr(&self) -> Ptr<'guard, Entry<K, V>> {
    self.ptr
  }

  #[inline]
  pub(crate) const fn flag(&self) -> Flag {
    self.flag
  }

  #[inline]
  pub(crate) fn entry(&self) -> Option<&'guard Entry<K, V>> {
    self.ptr.as_ref()
  }

  #[inline]
  pub(crate) fn state(&self) -> SlotState {
    self.flag.state(!self.ptr.is_null())
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.ptr.is_null()
  }

  #[inline]
  pub(crate) const fn is_marked(&self) -> bool {
    self.flag.is_marked()
  }

  /// Returns `true` if both snapshots saw the same record and the same flag.
  #[inline]
  pub(crate) fn same_as(&self, other: &Self) -> bool {
    self.ptr == other.ptr && self.flag == other.flag
  }

  /// Returns `true` if both snapshots reference the same record, ignoring
  /// marks.
  #[inline]
  pub(crate) fn same_record(&self, other: &Self) -> bool {
    self.ptr.as_ptr() == other.ptr.as_ptr()
  }
}

impl<K, V> Clone for Snapshot<'_, K, V> {
  #[inline]
  fn clone(&self) -> Self {
    *self
  }
}

impl<K, V> Copy for Snapshot<'_, K, V> {}

impl<K, V> Debug for Snapshot<'_, K, V> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("Snapshot")
      .field("ptr", &self.ptr.as_ptr())
      .field("state", &self.state())
      .field("flag", &self.flag)
      .finish()
  }
}

// -----------------------------------------------------------------------------
// Slots
// -----------------------------------------------------------------------------

/// A single table of `P::LENGTH` cells.
pub(crate) struct Slots<K, V, P>
where
  P: Params + ?Sized,
{
  entries: Array<AtomicShared<Entry<K, V>>, P>,
  flags: Array<AtomicFlag, P>,
}

impl<K, V, P> Slots<K, V, P>
where
  P: Params + ?Sized,
{
  #[inline]
  pub(crate) fn new() -> Self {
    Self {
      entries: Self::new_entry_array(),
      flags: Self::new_flag_array(),
    }
  }

  #[cfg(not(any(loom, feature = "loom")))]
  #[inline]
  fn new_entry_array() -> Array<AtomicShared<Entry<K, V>>, P> {
    // SAFETY: All-zeros is a valid null, untagged `AtomicShared`.
    unsafe { Array::new_zeroed().assume_init() }
  }

  // `sdd` swaps in loom atomics under its `loom` feature; those are not
  // zero-initializable.
  #[cfg(any(loom, feature = "loom"))]
  #[inline]
  fn new_entry_array() -> Array<AtomicShared<Entry<K, V>>, P> {
    Array::new(|_| AtomicShared::null())
  }

  #[cfg(not(loom))]
  #[inline]
  fn new_flag_array() -> Array<AtomicFlag, P> {
    // SAFETY: All-zeros is an unmarked flag word with timestamp zero.
    unsafe { Array::<AtomicFlag, P>::new_zeroed().assume_init() }
  }

  #[cfg(loom)]
  #[inline]
  fn new_flag_array() -> Array<AtomicFlag, P> {
    Array::new(|_| AtomicFlag::new())
  }

  /// Glued read of the entry and flag word at `index`.
  pub(crate) fn read<'guard>(
    &self,
    index: Index<P>,
    guard: &'guard Guard,
  ) -> Snapshot<'guard, K, V> {
    let entry: &AtomicShared<Entry<K, V>> = self.entries.get(index);
    let flags: &AtomicFlag = self.flags.get(index);

    loop {
      let before: Flag = flags.load(Acquire);
      let ptr: Ptr<'guard, Entry<K, V>> = entry.load(Acquire, guard);
      let after: Flag = flags.load(Acquire);

      if before == after {
        return Snapshot {
          ptr,
          flag: before.with_mark(ptr.tag() != Tag::None),
        };
      }

      hint::spin_loop();
    }
  }

  /// Publishes `new` in place of the unsealed `current` occupant, or in an
  /// empty slot when `current` is null.
  ///
  /// Hands `new` back if the slot changed.
  pub(crate) fn install(
    &self,
    index: Index<P>,
    current: Ptr<'_, Entry<K, V>>,
    new: Shared<Entry<K, V>>,
    guard: &Guard,
  ) -> Result<(), Shared<Entry<K, V>>> {
    debug_assert!(current.tag() == Tag::None, "install over a sealed slot");

    match self
      .entries
      .get(index)
      .compare_exchange(current, (Some(new), Tag::None), AcqRel, Acquire, guard)
    {
      Ok(_) => Ok(()),
      Err((new, _)) => {
        debug_assert!(new.is_some(), "compare_exchange dropped the rejected value");

        // SAFETY: A failed exchange returns the value it was given.
        Err(unsafe { new.unwrap_unchecked() })
      }
    }
  }

  /// Empties the slot if it still holds exactly `current` (mark included).
  pub(crate) fn clear(&self, index: Index<P>, current: Ptr<'_, Entry<K, V>>, guard: &Guard) -> bool {
    self
      .entries
      .get(index)
      .compare_exchange(current, (None, Tag::None), AcqRel, Acquire, guard)
      .is_ok()
  }

  /// Seals the unsealed occupant `current` for relocation.
  pub(crate) fn seal(&self, index: Index<P>, current: Ptr<'_, Entry<K, V>>) -> bool {
    debug_assert!(current.tag() == Tag::None, "seal of a sealed pointer");

    let sealed: bool = self
      .entries
      .get(index)
      .update_tag_if(Tag::First, |ptr| ptr == current, AcqRel, Acquire);

    if sealed {
      self.bump(index);
    }

    sealed
  }

  /// Removes the seal from `current`, leaving the occupant in place.
  pub(crate) fn unseal(&self, index: Index<P>, current: Ptr<'_, Entry<K, V>>) -> bool {
    debug_assert!(current.tag() == Tag::First, "unseal of an unsealed pointer");

    let unsealed: bool = self
      .entries
      .get(index)
      .update_tag_if(Tag::None, |ptr| ptr == current, AcqRel, Acquire);

    if unsealed {
      self.bump(index);
    }

    unsealed
  }

  /// Advances the timestamp at `index`.
  #[inline]
  pub(crate) fn bump(&self, index: Index<P>) -> Flag {
    self.flags.get(index).bump(AcqRel)
  }

  /// Calls `f` with every occupied position.
  ///
  /// Not a snapshot; concurrent writers may be observed partially.
  pub(crate) fn for_each<'guard, F>(&self, guard: &'guard Guard, mut f: F)
  where
    F: FnMut(usize, &'guard Entry<K, V>, bool),
    K: 'guard,
    V: 'guard,
  {
    for (index, entry) in self.entries.as_slice().iter().enumerate() {
      let ptr: Ptr<'guard, Entry<K, V>> = entry.load(Acquire, guard);

      if let Some(record) = ptr.as_ref() {
        f(index, record, ptr.tag() != Tag::None);
      }
    }
  }

  #[cold]
  #[inline(never)]
  fn drop_slow(&mut self) {
    for entry in self.entries.as_mut_slice() {
      let item: AtomicShared<Entry<K, V>> = mem::take(entry);

      if let Some(record) = item.into_shared(Relaxed) {
        // SAFETY: `Drop` provides exclusive access, so no `Ptr` to the record
        // can outlive this call. A record still referenced by the other table
        // is only released here and dropped when that slot is emptied.
        let _last: bool = unsafe { record.drop_in_place() };
      }
    }
  }
}

impl<K, V, P> Drop for Slots<K, V, P>
where
  P: Params + ?Sized,
{
  #[inline]
  fn drop(&mut self) {
    self.drop_slow();
  }
}
