//! A fixed-capacity, lock-free concurrent cuckoo hash map.
//!
//! `cuckoo_tab` provides [`CuckooMap`], a key-value map that many threads can
//! read and write at once without taking any locks. Every key lives in one of
//! two candidate slots, so lookups touch at most two cells.
//!
//! # Overview
//!
//! The map is two equally sized tables. A key hashes to one slot in each; an
//! insert claims whichever is free. When both are occupied the insert
//! *relocates*: it finds a short chain of entries, each of which can step over
//! to its own alternate slot, and shifts the chain along until the key's slot
//! in table 0 is free. Each step seals the entry being moved; any thread that
//! runs into a sealed slot finishes the step itself before carrying on, so a
//! stalled thread never blocks anyone else.
//!
//! # Usage
//!
//! ```
//! use cuckoo_tab::CuckooMap;
//!
//! // Create a map with default capacity
//! let map: CuckooMap<String, u32> = CuckooMap::new();
//!
//! // Insert an entry
//! assert_eq!(map.insert("apples".to_string(), 3), Ok(None));
//!
//! // Replace it; the old value comes back
//! assert_eq!(map.insert("apples".to_string(), 5), Ok(Some(3)));
//!
//! // Read it
//! assert_eq!(map.get("apples"), Some(5));
//! assert_eq!(map.with("apples", |count| count * 2), Some(10));
//!
//! // Remove it
//! assert_eq!(map.remove("apples"), Some(5));
//! assert!(!map.contains_key("apples"));
//! ```
//!
//! # Configuration
//!
//! Table geometry is configured at compile time through the [`Params`] trait.
//! The default configuration ([`DefaultParams`]) provides two tables of
//! [`Capacity::DEF`] slots and allows relocation chains of up to ten hops:
//!
//! ```
//! use cuckoo_tab::{CuckooMap, DefaultParams};
//!
//! // These are equivalent:
//! let map1: CuckooMap<u64, u64> = CuckooMap::new();
//! let map2: CuckooMap<u64, u64, DefaultParams> = CuckooMap::new();
//! ```
//!
//! For custom capacities, use [`ConstParams`]:
//!
//! ```
//! use cuckoo_tab::{CuckooMap, ConstParams};
//!
//! let map: CuckooMap<u64, u64, ConstParams<512>> = CuckooMap::new();
//! assert_eq!(map.capacity(), 1024);
//! ```
//!
//! Table width is always rounded up to the nearest power of two and clamped
//! to the range <code>[Capacity::MIN]..=[Capacity::MAX]</code>.
//!
//! Keys are hashed with [`RandomState`] unless another [`BuildHasher`] is
//! supplied through [`CuckooMap::with_hasher()`].
//!
//! # Concurrency
//!
//! All operations on [`CuckooMap`] are thread-safe and lock-free. Multiple
//! threads can concurrently insert, remove, and read entries without
//! blocking.
//!
//! ```no_run
//! use cuckoo_tab::{CuckooMap, ConstParams};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let map: Arc<CuckooMap<u64, u64, ConstParams<1024>>> = Arc::new(CuckooMap::new());
//!
//! let handles: Vec<_> = (0..4)
//!   .map(|thread_id| {
//!     let map = Arc::clone(&map);
//!     thread::spawn(move || {
//!       for i in 0..100 {
//!         let key: u64 = thread_id * 1000 + i;
//!         map.insert(key, i).unwrap();
//!         assert_eq!(map.get(&key), Some(i));
//!       }
//!     })
//!   })
//!   .collect();
//!
//! for handle in handles {
//!   handle.join().unwrap();
//! }
//! ```
//!
//! No total order is imposed across operations. A lookup that reports a key
//! absent has read both candidate slots twice and seen neither change in
//! between.
//!
//! ## Memory Reclamation
//!
//! Entries are immutable and reclaimed using epoch-based memory management via
//! [`sdd`]. Replacing a value publishes a new entry; readers holding the old
//! one keep a valid reference until they finish.
//!
//! # Capacity Limits
//!
//! The map never grows. When no free slot can be reached within
//! [`Params::MAX_ROUTE`] displacements, [`CuckooMap::insert()`] returns
//! [`Error::TableFull`] and leaves the map untouched. Size the tables with
//! headroom: cuckoo tables with two candidates per key typically fill to
//! around half of [`CuckooMap::capacity()`] before inserts begin to fail.
//!
//! # Logging
//!
//! Relocation activity is reported through the [`log`] facade: restarts and
//! duplicate cleanup at `trace`, exhausted searches at `debug`.
//!
//! [Capacity::MAX]: crate::config::Capacity::MAX
//! [Capacity::MIN]: crate::config::Capacity::MIN
//! [`Capacity::DEF`]: crate::config::Capacity::DEF
//! [`ConstParams`]: crate::config::ConstParams
//! [`DefaultParams`]: crate::config::DefaultParams
//! [`Params`]: crate::config::Params
//! [`Params::MAX_ROUTE`]: crate::config::Params::MAX_ROUTE
//! [`CuckooMap::insert()`]: crate::CuckooMap::insert
//! [`CuckooMap::capacity()`]: crate::CuckooMap::capacity
//! [`CuckooMap::with_hasher()`]: crate::CuckooMap::with_hasher
//! [`RandomState`]: std::collections::hash_map::RandomState
//! [`BuildHasher`]: core::hash::BuildHasher
//!
//! [`sdd`]: https://docs.rs/sdd
//! [`log`]: https://docs.rs/log
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod array;
mod error;
mod flag;
mod hash;
mod index;
mod params;
mod public;
mod slots;
mod table;
mod utils;


pub(crate) use crate::utils::alloc;
pub(crate) use crate::utils::sync;

pub mod implementation {
  #![doc = include_str!("../IMPLEMENTATION.md")]
}

pub mod config {
  //! Configuration parameters which can be used to override the default map
  //! settings.

  pub use crate::params::CACHE_LINE;
  pub use crate::params::Capacity;
  pub use crate::params::ConstParams;
  pub use crate::params::DebugParams;
  pub use crate::params::DefaultParams;
  pub use crate::params::Params;
  pub use crate::params::ParamsExt;
}

#[doc(inline)]
pub use self::config::Capacity;

#[doc(inline)]
pub use self::config::ConstParams;

#[doc(inline)]
pub use self::config::DefaultParams;

#[doc(inline)]
pub use self::config::Params;

pub use self::error::Error;

pub use self::public::CuckooMap;
