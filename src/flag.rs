//! Per-slot flag words.
//!
//! A [`Flag`] packs the relocation mark into bit 0 and the slot's timestamp
//! into the remaining bits. The flag array stores the timestamp, bumped on
//! every mark, unmark and completed move. The mark itself is carried by the
//! tag of the slot's entry pointer so that it changes atomically with the
//! occupant; a glued read joins the two into one value.

use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result;

use crate::sync::atomic::AtomicUsize;
use crate::sync::atomic::Ordering;

/// A packed `{mark, timestamp}` pair.
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct Flag {
  bits: usize,
}

impl Flag {
  const MARK: usize = 0b1;
  const SHIFT: u32 = 1;
  const STEP: usize = 1 << Self::SHIFT;

  #[cfg_attr(not(loom), allow(dead_code, reason = "only used with loom tests"))]
  #[inline]
  pub(crate) const fn new(marked: bool, stamp: usize) -> Self {
    Self {
      bits: (stamp << Self::SHIFT) | marked as usize,
    }
  }

  #[inline]
  pub(crate) const fn from_bits(bits: usize) -> Self {
    Self { bits }
  }

  #[cfg_attr(not(loom), allow(dead_code, reason = "only used with loom tests"))]
  #[inline]
  pub(crate) const fn into_bits(self) -> usize {
    self.bits
  }

  #[inline]
  pub(crate) const fn is_marked(self) -> bool {
    self.bits & Self::MARK != 0
  }

  /// The timestamp, truncated to the bits left over by the mark.
  #[inline]
  pub(crate) const fn stamp(self) -> usize {
    self.bits >> Self::SHIFT
  }

  /// The same mark with the timestamp advanced by one, wrapping.
  #[inline]
  pub(crate) const fn bumped(self) -> Self {
    Self {
      bits: self.bits.wrapping_add(Self::STEP),
    }
  }

  #[inline]
  pub(crate) const fn with_mark(self, marked: bool) -> Self {
    Self {
      bits: (self.bits & !Self::MARK) | marked as usize,
    }
  }

  /// Classifies a slot holding this flag and an occupant (or not).
  #[inline]
  pub(crate) const fn state(self, occupied: bool) -> SlotState {
    match (occupied, self.is_marked()) {
      (false, _) => SlotState::Empty,
      (true, false) => SlotState::Occupied,
      (true, true) => SlotState::Marked,
    }
  }
}

impl Debug for Flag {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    f.debug_struct("Flag")
      .field("marked", &self.is_marked())
      .field("stamp", &self.stamp())
      .finish()
  }
}

/// What a glued read found in a slot.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub(crate) enum SlotState {
  Empty,
  Occupied,
  /// Occupied, and a relocation of the occupant is in flight.
  Marked,
}

/// A slot's stored flag word.
///
/// The mark bit is never set in storage; see the module docs.
#[repr(transparent)]
pub(crate) struct AtomicFlag {
  inner: AtomicUsize,
}

impl AtomicFlag {
  #[cfg_attr(not(loom), allow(dead_code, reason = "only used with loom tests"))]
  #[inline]
  pub(crate) fn new() -> Self {
    Self {
      inner: AtomicUsize::new(Flag::new(false, 0).into_bits()),
    }
  }

  #[inline]
  pub(crate) fn load(&self, order: Ordering) -> Flag {
    Flag::from_bits(self.inner.load(order))
  }

  /// Advances the timestamp by one and returns the new flag.
  #[inline]
  pub(crate) fn bump(&self, order: Ordering) -> Flag {
    Flag::from_bits(self.inner.fetch_add(Flag::STEP, order)).bumped()
  }
}
