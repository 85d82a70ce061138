#![cfg(loom)]

use loom::sync::Arc;
use loom::thread;
use loom::thread::JoinHandle;
use std::hash::BuildHasherDefault;
use std::hash::DefaultHasher;
use std::ops::Deref;

use cuckoo_tab::Capacity;
use cuckoo_tab::ConstParams;
use cuckoo_tab::CuckooMap;
use cuckoo_tab::Error;

type Insert = JoinHandle<Result<Option<usize>, Error>>;
type Remove = JoinHandle<Option<usize>>;
type Lookup = JoinHandle<Option<usize>>;
type Exists = JoinHandle<bool>;
type Reader<T = usize> = JoinHandle<Option<T>>;

// Loom replays every interleaving, so placement must not depend on a random
// seed.
type Hasher = BuildHasherDefault<DefaultHasher>;
type Params = ConstParams<{ Capacity::MIN.as_usize() }>;
type ArcMap = Arc<CuckooMap<usize, usize, Params, Hasher>>;

struct LoomMap {
  inner: ArcMap,
}

impl LoomMap {
  fn new() -> Self {
    Self {
      inner: Arc::new(CuckooMap::default()),
    }
  }

  fn spawn_insert(&self, key: usize, value: usize) -> Insert {
    let map: ArcMap = ArcMap::clone(&self.inner);
    thread::spawn(move || map.insert(key, value))
  }

  fn spawn_remove(&self, key: usize) -> Remove {
    let map: ArcMap = ArcMap::clone(&self.inner);
    thread::spawn(move || map.remove(&key))
  }

  fn spawn_lookup(&self, key: usize) -> Lookup {
    let map: ArcMap = ArcMap::clone(&self.inner);
    thread::spawn(move || map.get(&key))
  }

  fn spawn_exists(&self, key: usize) -> Exists {
    let map: ArcMap = ArcMap::clone(&self.inner);
    thread::spawn(move || map.contains_key(&key))
  }

  fn spawn_reader<T, F>(&self, key: usize, f: F) -> Reader<T>
  where
    T: 'static,
    F: Fn(&usize) -> T + 'static,
  {
    let map: ArcMap = ArcMap::clone(&self.inner);
    thread::spawn(move || map.with(&key, f))
  }
}

impl Deref for LoomMap {
  type Target = ArcMap;

  #[inline]
  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

#[test]
fn test_insert() {
  loom::model(|| {
    let map: LoomMap = LoomMap::new();

    let thread_a: Insert = map.spawn_insert(1, 10);
    let thread_b: Insert = map.spawn_insert(2, 20);

    assert_eq!(thread_a.join().unwrap(), Ok(None));
    assert_eq!(thread_b.join().unwrap(), Ok(None));

    assert_eq!(map.get(&1), Some(10));
    assert_eq!(map.get(&2), Some(20));
    assert_eq!(map.len(), 2);
  });
}

#[test]
fn test_insert_same_key() {
  loom::model(|| {
    let map: LoomMap = LoomMap::new();

    let thread_a: Insert = map.spawn_insert(1, 10);
    let thread_b: Insert = map.spawn_insert(1, 20);

    let result_a: Option<usize> = thread_a.join().unwrap().unwrap();
    let result_b: Option<usize> = thread_b.join().unwrap().unwrap();

    // Exactly one of them created the entry.
    assert!(result_a.is_none() != result_b.is_none());

    let value: usize = map.get(&1).unwrap();

    assert!(value == 10 || value == 20);
    assert!(map.remove(&1).is_some());
    assert_eq!(map.get(&1), None);
  });
}

#[test]
fn test_insert_read() {
  loom::model(|| {
    let map: LoomMap = LoomMap::new();

    map.insert(1, 123).unwrap();

    let insert: Insert = map.spawn_insert(2, 100);
    let lookup: Lookup = map.spawn_lookup(1);

    assert_eq!(insert.join().unwrap(), Ok(None));
    assert_eq!(lookup.join().unwrap(), Some(123));
  });
}

#[test]
fn test_replace_read() {
  loom::model(|| {
    let map: LoomMap = LoomMap::new();

    map.insert(1, 123).unwrap();

    let insert: Insert = map.spawn_insert(1, 456);
    let lookup: Lookup = map.spawn_lookup(1);

    assert_eq!(insert.join().unwrap(), Ok(Some(123)));

    let value: Option<usize> = lookup.join().unwrap();

    assert!(value == Some(123) || value == Some(456));
    assert_eq!(map.len(), 1);
  });
}

#[test]
fn test_insert_remove() {
  loom::model(|| {
    let map: LoomMap = LoomMap::new();

    map.insert(1, 10).unwrap();

    let insert: Insert = map.spawn_insert(2, 20);
    let remove: Remove = map.spawn_remove(1);

    assert_eq!(insert.join().unwrap(), Ok(None));
    assert_eq!(remove.join().unwrap(), Some(10));

    assert!(!map.contains_key(&1));
    assert_eq!(map.len(), 1);
  });
}

#[test]
fn test_remove_race() {
  loom::model(|| {
    let map: LoomMap = LoomMap::new();

    map.insert(1, 123).unwrap();

    let remove_a: Remove = map.spawn_remove(1);
    let remove_b: Remove = map.spawn_remove(1);

    let removed_a: Option<usize> = remove_a.join().unwrap();
    let removed_b: Option<usize> = remove_b.join().unwrap();

    assert!(removed_a.is_some() != removed_b.is_some(), "exactly one remove should succeed");

    assert!(!map.contains_key(&1));
    assert_eq!(map.len(), 0);
  });
}

#[test]
fn test_remove_race_read() {
  loom::model(|| {
    let map: LoomMap = LoomMap::new();

    map.insert(1, 123).unwrap();

    let lookup: Lookup = map.spawn_lookup(1);
    let remove: Remove = map.spawn_remove(1);

    assert_eq!(remove.join().unwrap(), Some(123));

    if let Some(value) = lookup.join().unwrap() {
      assert_eq!(value, 123);
    }
  });
}

#[test]
fn test_remove_race_exists() {
  loom::model(|| {
    let map: LoomMap = LoomMap::new();

    map.insert(1, 123).unwrap();

    let exists: Exists = map.spawn_exists(1);
    let remove: Remove = map.spawn_remove(1);

    // non-deterministic
    let _exists: bool = exists.join().unwrap();

    assert_eq!(remove.join().unwrap(), Some(123));
  });
}

#[test]
fn test_remove_race_with() {
  loom::model(|| {
    let map: LoomMap = LoomMap::new();

    map.insert(1, 123).unwrap();

    let reader: Reader = map.spawn_reader(1, |value| *value * 2);
    let remove: Remove = map.spawn_remove(1);

    assert_eq!(remove.join().unwrap(), Some(123));

    if let Some(value) = reader.join().unwrap() {
      assert_eq!(value, 246);
    }
  });
}

#[test]
fn test_read_unaffected_by_other_remove() {
  loom::model(|| {
    let map: LoomMap = LoomMap::new();

    map.insert(1, 111).unwrap();
    map.insert(2, 222).unwrap();

    let lookup: Lookup = map.spawn_lookup(2);
    let remove: Remove = map.spawn_remove(1);

    assert_eq!(remove.join().unwrap(), Some(111));
    assert_eq!(lookup.join().unwrap(), Some(222));
  });
}

#[test]
fn test_length_consistency() {
  loom::model(|| {
    let map: LoomMap = LoomMap::new();

    let thread_a: JoinHandle<()> = {
      let map: ArcMap = ArcMap::clone(&map.inner);

      thread::spawn(move || {
        map.insert(1, 1).unwrap();
        map.insert(2, 2).unwrap();
      })
    };

    let thread_b: Insert = map.spawn_insert(3, 3);

    thread_a.join().unwrap();
    thread_b.join().unwrap().unwrap();

    assert_eq!(map.len(), 3);
  });
}
