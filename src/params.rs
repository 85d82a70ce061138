use core::alloc::Layout;
use core::any;
use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;
use core::marker::PhantomData;
use core::mem;
use core::num::NonZeroUsize;

use crate::sync::atomic::AtomicUsize;

// -----------------------------------------------------------------------------
// SDD Sanity Check
// -----------------------------------------------------------------------------

const _: () = assert!(
  align_of::<sdd::AtomicShared<()>>() == align_of::<usize>(),
  "invalid system: atomic shared align != usize align",
);

const _: () = assert!(
  size_of::<sdd::AtomicShared<()>>() == size_of::<usize>(),
  "invalid system: atomic shared width != usize width",
);

// -----------------------------------------------------------------------------
// Cache-line Properties
// -----------------------------------------------------------------------------

/// The size of a cache line in bytes.
///
/// Every slot array and flag array is aligned to this boundary, so the two
/// tables never share a cache line with each other or with the allocator's
/// bookkeeping.
pub const CACHE_LINE: usize = if cfg!(any(
  target_arch = "x86_64",
  target_arch = "aarch64",
  target_arch = "powerpc64",
)) {
  128
} else if cfg!(target_arch = "s390x") {
  256
} else if cfg!(any(
  target_arch = "arm",
  target_arch = "mips",
  target_arch = "mips64",
  target_arch = "riscv32",
  target_arch = "riscv64",
  target_arch = "sparc",
  target_arch = "hexagon",
)) {
  32
} else {
  64
};

const _: () = assert!(
  CACHE_LINE.is_multiple_of(size_of::<usize>()),
  "invalid params: `CACHE_LINE` must be a multiple of pointer width",
);

const _: () = assert!(
  CACHE_LINE.is_power_of_two(),
  "invalid params: `CACHE_LINE` must be a power of two",
);

// -----------------------------------------------------------------------------
// Configurable Params
// -----------------------------------------------------------------------------

/// Configuration parameters for a [`CuckooMap`].
///
/// Allows customizing the table geometry at compile time. The simplest
/// approach is [`ConstParams`]:
///
/// ```no_run
/// use cuckoo_tab::{CuckooMap, ConstParams};
///
/// type MyMap<K, V> = CuckooMap<K, V, ConstParams<1024>>;
/// ```
///
/// # Implementing `Params`
///
/// For advanced use cases, implement directly:
///
/// ```no_run
/// use cuckoo_tab::{Capacity, CuckooMap, Params};
///
/// struct DeepParams;
///
/// impl Params for DeepParams {
///   const LENGTH: Capacity = Capacity::new(1 << 12);
///   const MAX_ROUTE: usize = 32;
/// }
///
/// let map: CuckooMap<u64, u64, DeepParams> = CuckooMap::new();
/// ```
///
/// [`Capacity::new`] clamps values to the valid range and rounds up to the
/// nearest power of two.
///
/// [`CuckooMap`]: crate::public::CuckooMap
pub trait Params {
  /// The number of slots in *each* of the two tables.
  ///
  /// This value is rounded up to the nearest power of two and clamped to
  /// <code>[Capacity::MIN]..=[Capacity::MAX]</code>. The map holds at most
  /// twice this many entries.
  const LENGTH: Capacity = DefaultParams::LENGTH;

  /// The maximum number of displacements a single relocation may chain
  /// together before an insert gives up and reports a full table.
  const MAX_ROUTE: usize = DefaultParams::MAX_ROUTE;
}

// -----------------------------------------------------------------------------
// Configurable Params - Extensions
// -----------------------------------------------------------------------------

/// Derived parameters computed from [`Params`].
///
/// Automatically implemented for all [`Params`] types. Provides computed
/// constants used internally.
///
/// # Example
///
/// ```no_run
/// use cuckoo_tab::config::{ConstParams, ParamsExt};
///
/// println!("{:#?}", <ConstParams<1024> as ParamsExt>::debug());
/// ```
pub trait ParamsExt: Params + Sealed {
  /// Total number of slots across both tables.
  const SLOTS: usize = Self::LENGTH.as_usize().strict_mul(2);

  /// Mask applied to a mixed hash to produce a table index.
  const INDEX_MASK: usize = Self::LENGTH.as_usize().strict_sub(1);

  /// Number of hash bits consumed by [`INDEX_MASK`](Self::INDEX_MASK).
  const INDEX_BITS: u32 = Self::LENGTH.log2();

  /// Cache lines occupied by one pointer-wide array.
  const BLOCKS: NonZeroUsize = derive_blocks::<AtomicUsize, Self>();

  /// Allocation layout of one pointer-wide array.
  const LAYOUT: Layout = derive_layout::<AtomicUsize, Self>();

  /// Bytes allocated for both slot arrays and both flag arrays.
  const MEMORY: usize = Self::BLOCKS.get().strict_mul(CACHE_LINE).strict_mul(4);

  fn validate() {
    assert_ne!(Self::LAYOUT.size(), 0, "invalid params: layout size is `0`");
    assert_ne!(Self::MAX_ROUTE, 0, "invalid params: `MAX_ROUTE` is `0`");
  }

  #[inline]
  fn debug() -> DebugParams<Self> {
    DebugParams {
      marker: PhantomData,
    }
  }
}

// -----------------------------------------------------------------------------
// Debug Params
// -----------------------------------------------------------------------------

/// A helper type for displaying [`Params`] configuration.
///
/// Returned by [`ParamsExt::debug`]; implements [`Debug`] to show all derived
/// configuration values.
#[derive(Clone, Copy)]
pub struct DebugParams<P>
where
  P: ?Sized,
{
  marker: PhantomData<fn(P)>,
}

impl<P> Debug for DebugParams<P>
where
  P: Params + ?Sized,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct(any::type_name::<P>())
      .field("LENGTH", &P::LENGTH)
      .field("MAX_ROUTE", &P::MAX_ROUTE)
      .field("SLOTS", &P::SLOTS)
      .field("INDEX_MASK", &format_args!("{:0>32b}", P::INDEX_MASK))
      .field("INDEX_BITS", &P::INDEX_BITS)
      .field("BLOCKS", &P::BLOCKS)
      .field("LAYOUT", &P::LAYOUT)
      .field("MEMORY", &P::MEMORY)
      .finish()
  }
}

// -----------------------------------------------------------------------------
// Default Params
// -----------------------------------------------------------------------------

/// The default map configuration: two tables of [`Capacity::DEF`] slots and a
/// relocation bound of ten hops.
///
/// Used when creating a [`CuckooMap`] without specifying a custom [`Params`]
/// type.
///
/// # Example
///
/// ```no_run
/// use cuckoo_tab::{CuckooMap, DefaultParams};
///
/// // These are equivalent:
/// let map1: CuckooMap<u64, u64> = CuckooMap::new();
/// let map2: CuckooMap<u64, u64, DefaultParams> = CuckooMap::new();
/// ```
///
/// [`CuckooMap`]: crate::public::CuckooMap
#[derive(Clone, Copy)]
#[non_exhaustive]
pub struct DefaultParams;

impl Debug for DefaultParams {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Debug::fmt(&<Self as ParamsExt>::debug(), f)
  }
}

impl Params for DefaultParams {
  const LENGTH: Capacity = Capacity::DEF;
  const MAX_ROUTE: usize = 10;
}

// -----------------------------------------------------------------------------
// Const-Generic Params
// -----------------------------------------------------------------------------

/// A [`Params`] implementation with compile-time configurable table width.
///
/// The width `N` is rounded up to the nearest power of two and clamped to
/// <code>[Capacity::MIN]..=[Capacity::MAX]</code>. The relocation bound is
/// left at its default.
///
/// # Examples
///
/// ```no_run
/// use cuckoo_tab::{CuckooMap, ConstParams};
///
/// let map: CuckooMap<u32, String, ConstParams<512>> = CuckooMap::new();
/// assert_eq!(map.capacity(), 1024);
/// ```
///
/// ```no_run
/// use cuckoo_tab::{CuckooMap, ConstParams};
///
/// // Values are rounded up to powers of two
/// let map: CuckooMap<u32, String, ConstParams<1000>> = CuckooMap::new();
/// assert_eq!(map.capacity(), 2048);
/// ```
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub struct ConstParams<const N: usize>;

impl<const N: usize> Params for ConstParams<N> {
  const LENGTH: Capacity = Capacity::new(N);
}

// -----------------------------------------------------------------------------
// Auto-implement Derive
// -----------------------------------------------------------------------------

mod private {
  pub trait Sealed {}
}

use private::Sealed;

impl<P> Sealed for P where P: Params + ?Sized {}
impl<P> ParamsExt for P where P: Params + ?Sized {}

// -----------------------------------------------------------------------------
// Capacity
// -----------------------------------------------------------------------------

/// A validated table width.
///
/// Represents a power-of-two value in the range <code>[MIN]..=[MAX]</code>.
/// Used by [`Params::LENGTH`] to specify the slot count of each table.
///
/// # Construction
///
/// Use [`new()`] to create from an arbitrary value; it rounds up to the nearest
/// power of two and clamps to the valid range.
///
/// ```no_run
/// use cuckoo_tab::Capacity;
///
/// // Exact power of two
/// let cap = Capacity::new(256);
/// assert_eq!(cap.as_usize(), 256);
///
/// // Rounded up
/// let cap = Capacity::new(100);
/// assert_eq!(cap.as_usize(), 128);
///
/// // Clamped to minimum
/// let cap = Capacity::new(1);
/// assert_eq!(cap, Capacity::MIN);
///
/// // Clamped to maximum
/// let cap = Capacity::new(usize::MAX);
/// assert_eq!(cap, Capacity::MAX);
/// ```
///
/// [MIN]: Self::MIN
/// [MAX]: Self::MAX
/// [`new()`]: Self::new
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct Capacity(CapacityEnum);

impl Capacity {
  /// The minimum supported width (2² slots per table).
  pub const MIN: Self = Self(CapacityEnum::_Capacity1Shl2);

  /// The maximum supported width (2²⁷ slots per table).
  pub const MAX: Self = Self(CapacityEnum::_Capacity1Shl27);

  /// The default width (2⁴ slots per table).
  pub const DEF: Self = Self(CapacityEnum::_Capacity1Shl4);

  /// Creates a new [`Capacity`] from an arbitrary value.
  ///
  /// Rounds up to the nearest power of two and clamps to
  /// <code>[MIN]..=[MAX]</code>.
  ///
  /// # Examples
  ///
  /// ```no_run
  /// use cuckoo_tab::Capacity;
  ///
  /// assert_eq!(Capacity::new(100).as_usize(), 128);
  /// assert_eq!(Capacity::new(0), Capacity::MIN);
  /// ```
  ///
  /// [MIN]: Self::MIN
  /// [MAX]: Self::MAX
  #[inline]
  pub const fn new(value: usize) -> Self {
    let Some(capacity) = value.checked_next_power_of_two() else {
      return Self::MAX;
    };

    if capacity < Self::MIN.as_usize() {
      Self::MIN
    } else if capacity > Self::MAX.as_usize() {
      Self::MAX
    } else {
      // SAFETY: `capacity` is a power of two inside `MIN..=MAX`.
      unsafe { Self::new_unchecked(capacity) }
    }
  }

  /// Creates a new [`Capacity`] without validation.
  ///
  /// # Safety
  ///
  /// `value` must be a power of two in <code>[MIN]..=[MAX]</code>.
  ///
  /// [MIN]: Self::MIN
  /// [MAX]: Self::MAX
  #[inline]
  pub const unsafe fn new_unchecked(value: usize) -> Self {
    // SAFETY: Caller guarantees `value` is a valid `Capacity`.
    unsafe { mem::transmute::<usize, Self>(value) }
  }

  /// Returns the width as a [`usize`].
  #[inline]
  pub const fn as_usize(self) -> usize {
    self.0 as usize
  }

  /// Returns the width as a [`NonZeroUsize`].
  #[inline]
  pub const fn as_nonzero(self) -> NonZeroUsize {
    // SAFETY: All `Capacity` values are non-zero by construction.
    unsafe { mem::transmute::<Self, NonZeroUsize>(self) }
  }

  /// Returns the base-2 logarithm of the width.
  ///
  /// # Examples
  ///
  /// ```no_run
  /// use cuckoo_tab::Capacity;
  ///
  /// assert_eq!(Capacity::new(1024).log2(), 10);
  /// ```
  #[inline]
  pub const fn log2(self) -> u32 {
    self.as_nonzero().trailing_zeros()
  }
}

impl Debug for Capacity {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "{:?} (1 << {:?})", self.as_nonzero(), self.log2())
  }
}

impl Default for Capacity {
  #[inline]
  fn default() -> Self {
    Self::DEF
  }
}

impl From<Capacity> for NonZeroUsize {
  #[inline]
  fn from(other: Capacity) -> Self {
    other.as_nonzero()
  }
}

impl From<Capacity> for usize {
  #[inline]
  fn from(other: Capacity) -> Self {
    other.as_usize()
  }
}

#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(usize)]
enum CapacityEnum {
  _Capacity1Shl2 = 1 << 2,
  _Capacity1Shl3 = 1 << 3,
  _Capacity1Shl4 = 1 << 4,
  _Capacity1Shl5 = 1 << 5,
  _Capacity1Shl6 = 1 << 6,
  _Capacity1Shl7 = 1 << 7,
  _Capacity1Shl8 = 1 << 8,
  _Capacity1Shl9 = 1 << 9,
  _Capacity1Shl10 = 1 << 10,
  _Capacity1Shl11 = 1 << 11,
  _Capacity1Shl12 = 1 << 12,
  _Capacity1Shl13 = 1 << 13,
  _Capacity1Shl14 = 1 << 14,
  _Capacity1Shl15 = 1 << 15,
  _Capacity1Shl16 = 1 << 16,
  _Capacity1Shl17 = 1 << 17,
  _Capacity1Shl18 = 1 << 18,
  _Capacity1Shl19 = 1 << 19,
  _Capacity1Shl20 = 1 << 20,
  _Capacity1Shl21 = 1 << 21,
  _Capacity1Shl22 = 1 << 22,
  _Capacity1Shl23 = 1 << 23,
  _Capacity1Shl24 = 1 << 24,
  _Capacity1Shl25 = 1 << 25,
  _Capacity1Shl26 = 1 << 26,
  _Capacity1Shl27 = 1 << 27,
}

// -----------------------------------------------------------------------------
// Misc. Utilities
// -----------------------------------------------------------------------------

/// Number of cache lines needed to hold `P::LENGTH` values of `T`.
pub(crate) const fn derive_blocks<T, P>() -> NonZeroUsize
where
  P: Params + ?Sized,
{
  let Some(mem_bytes) = P::LENGTH.as_usize().checked_mul(size_of::<T>()) else {
    panic!("invalid params: `BLOCKS` must be representable");
  };

  // Round up so every array ends on a cache line boundary.
  let Some(mem_align) = mem_bytes.checked_next_multiple_of(CACHE_LINE) else {
    panic!("invalid params: `BLOCKS` must be representable");
  };

  assert!(
    mem_align <= isize::MAX as usize,
    "invalid params: `BLOCKS` must be representable",
  );

  let Some(blocks) = NonZeroUsize::new(mem_align / CACHE_LINE) else {
    panic!("invalid params: `BLOCKS` must be representable");
  };

  blocks
}

/// Cache-line aligned layout for an array of `P::LENGTH` values of `T`.
pub(crate) const fn derive_layout<T, P>() -> Layout
where
  P: Params + ?Sized,
{
  let size: usize = derive_blocks::<T, P>().get() * CACHE_LINE;

  // SAFETY: `CACHE_LINE` is a power of two and `derive_blocks` verified that
  // the size does not overflow `isize::MAX`.
  unsafe { Layout::from_size_align_unchecked(size, CACHE_LINE) }
}
