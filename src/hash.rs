//! The two table hash functions.
//!
//! Both mixers start from the same 64-bit key hash produced by the map's
//! [`BuildHasher`] and scramble it with unrelated constants, so a collision in
//! one table says nothing about the other.
//!
//! [`BuildHasher`]: core::hash::BuildHasher

use crate::index::Index;
use crate::index::Side;
use crate::params::Params;

/// Mixer for table 0.
#[inline]
pub(crate) const fn h1(hash: u64) -> u64 {
  let mut h: u64 = hash;

  h ^= h >> 33;
  h = h.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
  h ^= h >> 33;
  h = h.wrapping_mul(0xC4CE_B9FE_1A85_EC53);
  h ^= h >> 33;
  h
}

/// Mixer for table 1.
#[inline]
pub(crate) const fn h2(hash: u64) -> u64 {
  let mut h: u64 = hash ^ 0x9E37_79B9_7F4A_7C15;

  h ^= h >> 30;
  h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
  h ^= h >> 27;
  h = h.wrapping_mul(0x94D0_49BB_1331_11EB);
  h ^= h >> 31;
  h
}

/// Maps a key hash to its candidate position in the table on `side`.
#[inline]
pub(crate) const fn index_for<P>(side: Side, hash: u64) -> Index<P>
where
  P: Params + ?Sized,
{
  let mixed: u64 = match side {
    Side::Zero => h1(hash),
    Side::One => h2(hash),
  };

  Index::new(mixed as usize)
}
