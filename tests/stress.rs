#![cfg(not(loom))]

use std::collections::HashSet;
use std::hash::BuildHasherDefault;
use std::hash::DefaultHasher;
use std::sync::Barrier;
use std::thread;

use cuckoo_tab::ConstParams;
use cuckoo_tab::CuckooMap;
use cuckoo_tab::Error;

type Map<V = u64> = CuckooMap<u64, V, ConstParams<2048>>;

const THREADS: u64 = 20;
const KEYS: u64 = 50;

fn key(thread: u64, index: u64) -> u64 {
  thread * 1_000 + index
}

#[test]
fn test_disjoint_inserts() {
  let map: Map = Map::new();
  let barrier: Barrier = Barrier::new(THREADS as usize);

  thread::scope(|scope| {
    for thread in 0..THREADS {
      let map: &Map = &map;
      let barrier: &Barrier = &barrier;

      scope.spawn(move || {
        barrier.wait();

        for index in 0..KEYS {
          assert_eq!(map.insert(key(thread, index), index), Ok(None));
        }
      });
    }
  });

  assert_eq!(map.len(), (THREADS * KEYS) as usize);

  for thread in 0..THREADS {
    for index in 0..KEYS {
      assert_eq!(map.get(&key(thread, index)), Some(index));
    }
  }
}

#[test]
fn test_disjoint_insert_remove() {
  let map: Map = Map::new();
  let barrier: Barrier = Barrier::new(THREADS as usize);

  thread::scope(|scope| {
    for thread in 0..THREADS {
      let map: &Map = &map;
      let barrier: &Barrier = &barrier;

      scope.spawn(move || {
        barrier.wait();

        for index in 0..KEYS {
          map.insert(key(thread, index), index).unwrap();
        }

        for index in (0..KEYS).filter(|index| index % 2 == 0) {
          assert_eq!(map.remove(&key(thread, index)), Some(index));
        }

        for index in 0..KEYS {
          let expected: Option<u64> = (index % 2 == 1).then_some(index);
          assert_eq!(map.get(&key(thread, index)), expected);
        }
      });
    }
  });

  assert_eq!(map.len(), (THREADS * KEYS / 2) as usize);
}

#[test]
fn test_shared_keys_converge() {
  let map: Map = Map::new();
  let barrier: Barrier = Barrier::new(THREADS as usize);

  // Every thread writes the same keys; exactly one copy of each may survive.
  thread::scope(|scope| {
    for thread in 0..THREADS {
      let map: &Map = &map;
      let barrier: &Barrier = &barrier;

      scope.spawn(move || {
        barrier.wait();

        for index in 0..KEYS {
          map.insert(index, thread).unwrap();
        }
      });
    }
  });

  for index in 0..KEYS {
    assert!(map.get(&index).is_some_and(|thread| thread < THREADS));
  }

  for index in 0..KEYS {
    assert!(map.remove(&index).is_some());
    assert_eq!(map.remove(&index), None, "key {index} had a second copy");
  }

  assert!(map.is_empty());
}

#[test]
fn test_concurrent_replace_counts() {
  let map: Map = Map::new();
  let barrier: Barrier = Barrier::new(THREADS as usize);

  for index in 0..KEYS {
    map.insert(index, 0).unwrap();
  }

  // Each replace hands back exactly one prior value, so the total of all
  // returned values plus the survivors equals the total written.
  let returned: u64 = thread::scope(|scope| {
    let handles: Vec<_> = (0..THREADS)
      .map(|_| {
        let map: &Map = &map;
        let barrier: &Barrier = &barrier;

        scope.spawn(move || {
          barrier.wait();

          (0..KEYS)
            .map(|index| map.insert(index, 1).unwrap().unwrap())
            .sum::<u64>()
        })
      })
      .collect();

    handles.into_iter().map(|handle| handle.join().unwrap()).sum()
  });

  let surviving: u64 = (0..KEYS).map(|index| map.get(&index).unwrap()).sum();

  assert_eq!(returned + surviving, THREADS * KEYS);
  assert_eq!(map.len(), KEYS as usize);
}

#[test]
fn test_readers_during_churn() {
  let map: Map = Map::new();
  let barrier: Barrier = Barrier::new(THREADS as usize);

  for index in 0..KEYS {
    map.insert(index, index).unwrap();
  }

  thread::scope(|scope| {
    for thread in 0..THREADS {
      let map: &Map = &map;
      let barrier: &Barrier = &barrier;

      scope.spawn(move || {
        barrier.wait();

        if thread % 2 == 0 {
          // Stable keys must stay visible while others churn around them.
          for _ in 0..20 {
            for index in 0..KEYS {
              assert_eq!(map.get(&index), Some(index));
            }
          }
        } else {
          for round in 0..20 {
            for index in 0..KEYS {
              let churn: u64 = key(thread, index);

              map.insert(churn, round).unwrap();
              assert_eq!(map.remove(&churn), Some(round));
            }
          }
        }
      });
    }
  });

  assert_eq!(map.len(), KEYS as usize);
}

#[test]
fn test_values_not_lost() {
  let map: Map<String> = Map::new();
  let barrier: Barrier = Barrier::new(THREADS as usize);

  thread::scope(|scope| {
    for thread in 0..THREADS {
      let map: &Map<String> = &map;
      let barrier: &Barrier = &barrier;

      scope.spawn(move || {
        barrier.wait();

        for index in 0..KEYS {
          map.insert(key(thread, index), format!("{thread}/{index}")).unwrap();
        }
      });
    }
  });

  let values: HashSet<String> = (0..THREADS)
    .flat_map(|thread| (0..KEYS).map(move |index| key(thread, index)))
    .filter_map(|key| map.get(&key))
    .collect();

  assert_eq!(values.len(), (THREADS * KEYS) as usize);
}

#[test]
fn test_stable_keys_survive_crowded_churn() {
  type Crowded = CuckooMap<u64, u64, ConstParams<64>, BuildHasherDefault<DefaultHasher>>;

  const STABLE: u64 = 40;
  const CHURNERS: u64 = 8;
  const READERS: u64 = 4;

  let map: Crowded = Crowded::default();
  let barrier: Barrier = Barrier::new((CHURNERS + READERS) as usize);

  for index in 0..STABLE {
    map.insert(index, index).unwrap();
  }

  // Churn keys displace stable ones, so readers race relocations throughout.
  thread::scope(|scope| {
    for thread in 0..CHURNERS {
      let map: &Crowded = &map;
      let barrier: &Barrier = &barrier;

      scope.spawn(move || {
        barrier.wait();

        for round in 0..200 {
          for index in 0..4 {
            let churn: u64 = key(thread + 1, index);

            match map.insert(churn, round) {
              Ok(None) => assert_eq!(map.remove(&churn), Some(round)),
              Ok(Some(_)) => panic!("churn key {churn} was never left behind"),
              Err(Error::TableFull) => {}
              Err(error) => panic!("unexpected error: {error}"),
            }
          }
        }
      });
    }

    for _ in 0..READERS {
      let map: &Crowded = &map;
      let barrier: &Barrier = &barrier;

      scope.spawn(move || {
        barrier.wait();

        for _ in 0..200 {
          for index in 0..STABLE {
            assert_eq!(map.get(&index), Some(index), "stable key {index} went missing");
          }
        }
      });
    }
  });

  for index in 0..STABLE {
    assert_eq!(map.get(&index), Some(index));
  }

  assert_eq!(map.len(), STABLE as usize);
}
