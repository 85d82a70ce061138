use core::borrow::Borrow;
use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::panic::RefUnwindSafe;
use core::panic::UnwindSafe;
use std::collections::hash_map::RandomState;

use crate::error::Error;
use crate::params::DefaultParams;
use crate::params::Params;
use crate::params::ParamsExt;
use crate::table::Table;

/// A fixed-capacity, lock-free concurrent hash map.
///
/// `CuckooMap` stores each key in one of two candidate slots, one per table.
/// When both are taken, an insert shifts a short chain of existing entries to
/// their alternate slots to make room. The geometry is configured at compile
/// time through `P`; the map never grows.
///
/// See the [crate-level documentation][crate] for an overview and examples.
///
/// # Type Parameters
///
/// - `K`: The key type. Must be [`Hash`] + [`Eq`] and `'static`.
/// - `V`: The value type. Must be `'static`; most accessors also need
///   [`Clone`].
/// - `P`: Configuration parameters implementing [`Params`]. Defaults to
///   [`DefaultParams`] (two tables of 16 slots).
/// - `S`: The [`BuildHasher`] used to hash keys. Defaults to [`RandomState`].
///
/// # Examples
///
/// ```
/// use cuckoo_tab::CuckooMap;
///
/// let map: CuckooMap<&str, i32> = CuckooMap::new();
///
/// assert_eq!(map.insert("a", 1), Ok(None));
/// assert_eq!(map.get("a"), Some(1));
/// ```
///
/// Custom capacity using [`ConstParams`]:
///
/// ```
/// use cuckoo_tab::{CuckooMap, ConstParams};
///
/// let map: CuckooMap<u64, u64, ConstParams<256>> = CuckooMap::new();
/// assert_eq!(map.capacity(), 512);
/// ```
///
/// [`ConstParams`]: crate::ConstParams
pub struct CuckooMap<K, V, P = DefaultParams, S = RandomState>
where
  P: Params + ?Sized,
{
  hasher: S,
  inner: Table<K, V, P>,
}

impl<K, V, P> CuckooMap<K, V, P>
where
  P: Params + ?Sized,
{
  /// Creates a new, empty map.
  ///
  /// # Examples
  ///
  /// ```
  /// use cuckoo_tab::CuckooMap;
  ///
  /// let map: CuckooMap<u32, String> = CuckooMap::new();
  /// assert!(map.is_empty());
  /// ```
  #[inline]
  pub fn new() -> Self {
    Self::with_hasher(RandomState::new())
  }
}

impl<K, V, P, S> CuckooMap<K, V, P, S>
where
  P: Params + ?Sized,
{
  /// Creates a new, empty map that hashes keys with `hasher`.
  ///
  /// # Examples
  ///
  /// ```
  /// use std::hash::BuildHasherDefault;
  /// use std::hash::DefaultHasher;
  ///
  /// use cuckoo_tab::{CuckooMap, DefaultParams};
  ///
  /// type Hasher = BuildHasherDefault<DefaultHasher>;
  ///
  /// let map: CuckooMap<u32, u32, DefaultParams, Hasher> =
  ///   CuckooMap::with_hasher(Hasher::default());
  ///
  /// map.insert(1, 2).unwrap();
  /// assert_eq!(map.get(&1), Some(2));
  /// ```
  #[inline]
  pub fn with_hasher(hasher: S) -> Self {
    Self {
      hasher,
      inner: Table::new(),
    }
  }

  /// Returns a reference to the map's [`BuildHasher`].
  #[inline]
  pub const fn hasher(&self) -> &S {
    &self.hasher
  }

  /// Returns the total number of slots across both tables.
  ///
  /// This is an upper bound on the number of entries; inserts usually start
  /// failing somewhat before it is reached.
  ///
  /// # Examples
  ///
  /// ```
  /// use cuckoo_tab::{CuckooMap, ConstParams};
  ///
  /// let map: CuckooMap<u64, u64, ConstParams<512>> = CuckooMap::new();
  /// assert_eq!(map.capacity(), 1024);
  /// ```
  #[inline]
  pub const fn capacity(&self) -> usize {
    self.inner.cap()
  }

  /// Returns the number of entries currently in the map.
  ///
  /// This value may change immediately after reading due to concurrent
  /// operations in other threads.
  ///
  /// # Examples
  ///
  /// ```
  /// use cuckoo_tab::CuckooMap;
  ///
  /// let map: CuckooMap<i32, i32> = CuckooMap::new();
  /// assert_eq!(map.len(), 0);
  ///
  /// map.insert(1, 10).unwrap();
  /// map.insert(2, 20).unwrap();
  /// assert_eq!(map.len(), 2);
  /// ```
  #[inline]
  pub fn len(&self) -> usize {
    self.inner.len()
  }

  /// Returns `true` if the map contains no entries.
  ///
  /// # Examples
  ///
  /// ```
  /// use cuckoo_tab::CuckooMap;
  ///
  /// let map: CuckooMap<i32, i32> = CuckooMap::new();
  /// assert!(map.is_empty());
  ///
  /// map.insert(42, 0).unwrap();
  /// assert!(!map.is_empty());
  /// ```
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.inner.is_empty()
  }
}

impl<K, V, P, S> CuckooMap<K, V, P, S>
where
  K: Hash + Eq + 'static,
  V: 'static,
  P: Params + ?Sized,
  S: BuildHasher,
{
  /// Inserts a key-value pair, returning the value previously stored for the
  /// key.
  ///
  /// If the key is present its entry is swapped for a new one carrying
  /// `value`. Otherwise the key takes a free candidate slot, displacing up to
  /// [`Params::MAX_ROUTE`] other entries if necessary.
  ///
  /// # Errors
  ///
  /// Returns [`Error::TableFull`] if no free slot is reachable. The map is
  /// left unchanged by the failed call.
  ///
  /// # Examples
  ///
  /// ```
  /// use cuckoo_tab::CuckooMap;
  ///
  /// let map: CuckooMap<&str, u32> = CuckooMap::new();
  ///
  /// assert_eq!(map.insert("k", 1), Ok(None));
  /// assert_eq!(map.insert("k", 2), Ok(Some(1)));
  /// assert_eq!(map.get("k"), Some(2));
  /// ```
  #[inline]
  pub fn insert(&self, key: K, value: V) -> core::result::Result<Option<V>, Error>
  where
    V: Clone,
  {
    self.inner.insert(self.hasher.hash_one(&key), key, value)
  }

  /// Returns a clone of the value stored for `key`.
  ///
  /// The key may be any borrowed form of the map's key type, but [`Hash`] and
  /// [`Eq`] on the borrowed form must match those for the key type.
  ///
  /// # Examples
  ///
  /// ```
  /// use cuckoo_tab::CuckooMap;
  ///
  /// let map: CuckooMap<String, u32> = CuckooMap::new();
  /// map.insert("hello".to_string(), 5).unwrap();
  ///
  /// assert_eq!(map.get("hello"), Some(5));
  /// assert_eq!(map.get("world"), None);
  /// ```
  #[inline]
  pub fn get<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    self.with(key, |value| value.clone())
  }

  /// Accesses the value stored for `key`, applying a function to it.
  ///
  /// The reference passed to `f` stays valid for the duration of the call even
  /// if another thread replaces or removes the entry concurrently.
  ///
  /// # Examples
  ///
  /// ```
  /// use cuckoo_tab::CuckooMap;
  ///
  /// let map: CuckooMap<u32, String> = CuckooMap::new();
  /// map.insert(1, "hello".to_string()).unwrap();
  ///
  /// assert_eq!(map.with(&1, |s| s.len()), Some(5));
  /// ```
  #[inline]
  pub fn with<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    F: FnOnce(&V) -> R,
  {
    self
      .inner
      .with(self.hasher.hash_one(key), key, |_, value| f(value))
  }

  /// Returns `true` if the map holds an entry for `key`.
  ///
  /// The result may become stale immediately due to concurrent operations.
  ///
  /// # Examples
  ///
  /// ```
  /// use cuckoo_tab::CuckooMap;
  ///
  /// let map: CuckooMap<u32, ()> = CuckooMap::new();
  /// map.insert(7, ()).unwrap();
  ///
  /// assert!(map.contains_key(&7));
  /// assert!(!map.contains_key(&8));
  /// ```
  #[inline]
  pub fn contains_key<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.with(key, |_| ()).is_some()
  }

  /// Removes the entry for `key`, returning its value.
  ///
  /// Memory is reclaimed once all concurrent readers have finished accessing
  /// the entry.
  ///
  /// # Examples
  ///
  /// ```
  /// use cuckoo_tab::CuckooMap;
  ///
  /// let map: CuckooMap<u32, u32> = CuckooMap::new();
  /// map.insert(1, 100).unwrap();
  ///
  /// assert_eq!(map.remove(&1), Some(100)); // Entry removed
  /// assert_eq!(map.remove(&1), None);      // Already gone
  /// ```
  #[inline]
  pub fn remove<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    self.inner.remove(self.hasher.hash_one(key), key)
  }
}

#[cfg(test)]
impl<K, V, P, S> CuckooMap<K, V, P, S>
where
  P: Params + ?Sized,
{
  pub(crate) const fn table(&self) -> &Table<K, V, P> {
    &self.inner
  }
}

impl<K, V, P, S> Debug for CuckooMap<K, V, P, S>
where
  K: Debug,
  V: Debug,
  P: Params + ?Sized,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    f.debug_struct("CuckooMap")
      .field("params", &P::debug())
      .field("len", &self.inner.len())
      .field("entries", &self.inner)
      .finish()
  }
}

impl<K, V, P, S> Default for CuckooMap<K, V, P, S>
where
  P: Params + ?Sized,
  S: Default,
{
  #[inline]
  fn default() -> Self {
    Self::with_hasher(S::default())
  }
}

// SAFETY: All internal state uses atomic operations and epoch-based
// reclamation. Records may be dropped on whichever thread retires them, so
// both `K` and `V` must be `Send`.
unsafe impl<K, V, P, S> Send for CuckooMap<K, V, P, S>
where
  K: Send + Sync,
  V: Send + Sync,
  P: Params + ?Sized,
  S: Send,
{
}

// SAFETY: Shared access hands out `&K`/`&V` to any thread and lets any
// thread drop records, so both must be `Send + Sync`.
unsafe impl<K, V, P, S> Sync for CuckooMap<K, V, P, S>
where
  K: Send + Sync,
  V: Send + Sync,
  P: Params + ?Sized,
  S: Sync,
{
}

// Records are immutable once published, so a panic cannot leave one
// half-written, and epoch-based reclamation is unwind-safe.
impl<K, V, P, S> RefUnwindSafe for CuckooMap<K, V, P, S>
where
  P: Params + ?Sized,
  S: RefUnwindSafe,
{
}

impl<K, V, P, S> UnwindSafe for CuckooMap<K, V, P, S>
where
  P: Params + ?Sized,
  S: UnwindSafe,
{
}
