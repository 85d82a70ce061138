//! Slot addressing.
//!
//! Every key has exactly two candidate slots, one per table. [`Slot`] names a
//! single cell as a ([`Side`], [`Index`]) pair; [`Index`] is only ever built
//! by masking, so it is always in bounds for the table it addresses.

use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result;
use core::marker::PhantomData;

use crate::hash;
use crate::params::Params;
use crate::params::ParamsExt;

// -----------------------------------------------------------------------------
// Side
// -----------------------------------------------------------------------------

/// One of the two tables.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub(crate) enum Side {
  /// Table 0, addressed by `h1`. Wins when a key is found in both tables.
  Zero = 0,
  /// Table 1, addressed by `h2`.
  One = 1,
}

impl Side {
  pub(crate) const BOTH: [Self; 2] = [Self::Zero, Self::One];

  #[inline]
  pub(crate) const fn other(self) -> Self {
    match self {
      Self::Zero => Self::One,
      Self::One => Self::Zero,
    }
  }

  #[inline]
  pub(crate) const fn as_usize(self) -> usize {
    self as usize
  }
}

// -----------------------------------------------------------------------------
// Index
// -----------------------------------------------------------------------------

/// A position inside one table, always less than `P::LENGTH`.
#[repr(transparent)]
pub(crate) struct Index<P>
where
  P: ?Sized,
{
  source: usize,
  marker: PhantomData<fn(P)>,
}

impl<P> Index<P>
where
  P: Params + ?Sized,
{
  /// Masks `value` into the valid range.
  #[inline]
  pub(crate) const fn new(value: usize) -> Self {
    Self {
      source: value & P::INDEX_MASK,
      marker: PhantomData,
    }
  }

  #[inline]
  pub(crate) const fn get(self) -> usize {
    self.source
  }
}

impl<P> Clone for Index<P>
where
  P: ?Sized,
{
  #[inline]
  fn clone(&self) -> Self {
    *self
  }
}

impl<P> Copy for Index<P> where P: ?Sized {}

impl<P> PartialEq for Index<P>
where
  P: ?Sized,
{
  #[inline]
  fn eq(&self, other: &Self) -> bool {
    self.source == other.source
  }
}

impl<P> Eq for Index<P> where P: ?Sized {}

impl<P> Debug for Index<P>
where
  P: ?Sized,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    Debug::fmt(&self.source, f)
  }
}

// -----------------------------------------------------------------------------
// Slot
// -----------------------------------------------------------------------------

/// A single cell: a table and a position within it.
pub(crate) struct Slot<P>
where
  P: ?Sized,
{
  side: Side,
  index: Index<P>,
}

impl<P> Slot<P>
where
  P: Params + ?Sized,
{
  #[inline]
  pub(crate) const fn new(side: Side, index: Index<P>) -> Self {
    Self { side, index }
  }

  /// Returns the candidate slot on `side` for a key with the given hash.
  #[inline]
  pub(crate) fn candidate(side: Side, hash: u64) -> Self {
    Self::new(side, hash::index_for::<P>(side, hash))
  }

  /// Returns both candidate slots for a key with the given hash, table 0
  /// first.
  #[inline]
  pub(crate) fn pair(hash: u64) -> [Self; 2] {
    Side::BOTH.map(|side| Self::candidate(side, hash))
  }

  /// Returns the slot a key with the given hash moves to when evicted from
  /// this slot.
  #[inline]
  pub(crate) fn alternate(self, hash: u64) -> Self {
    Self::candidate(self.side.other(), hash)
  }

  #[inline]
  pub(crate) const fn side(self) -> Side {
    self.side
  }

  #[inline]
  pub(crate) const fn index(self) -> Index<P> {
    self.index
  }
}

impl<P> Clone for Slot<P>
where
  P: ?Sized,
{
  #[inline]
  fn clone(&self) -> Self {
    *self
  }
}

impl<P> Copy for Slot<P> where P: ?Sized {}

impl<P> PartialEq for Slot<P>
where
  P: ?Sized,
{
  #[inline]
  fn eq(&self, other: &Self) -> bool {
    self.side == other.side && self.index == other.index
  }
}

impl<P> Eq for Slot<P> where P: ?Sized {}

impl<P> Debug for Slot<P>
where
  P: ?Sized,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    write!(f, "{}:{:?}", self.side as u8, self.index)
  }
}
