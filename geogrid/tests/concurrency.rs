use geogrid::cache::TREE_FILE;
use geogrid::*;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tempdir::TempDir;

fn blob(n: usize) -> CachedArtifact {
    CachedArtifact::Bytes(Arc::new(vec![1u8; n]))
}

#[test]
fn caches_come_and_go_while_totals_run() {
    let registry = CacheRegistry::new();
    let done = Arc::new(AtomicBool::new(false));

    let walkers: Vec<_> = (0..2)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    if i == 0 {
                        registry.total_footprint();
                        registry.report();
                    } else {
                        registry.total_purge().unwrap();
                    }
                }
            })
        })
        .collect();

    let makers: Vec<_> = (0..4)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let mut kept = Vec::new();
                for i in 0..200 {
                    let cache = MemoryCache::new(&registry, format!("cache-{}-{}", t, i), None);
                    cache.insert(Fingerprint::of_bytes(format!("{}-{}", t, i).as_bytes()), blob(16));
                    if i % 4 == 0 {
                        kept.push(cache);
                    }
                }
                kept
            })
        })
        .collect();

    let kept: Vec<Arc<MemoryCache>> = makers
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    done.store(true, Ordering::Relaxed);
    for h in walkers {
        h.join().unwrap();
    }

    assert_eq!(registry.len(), kept.len());
    let held: usize = kept.iter().map(|c| c.footprint()).sum();
    assert_eq!(registry.total_footprint(), held);
    registry.total_purge().unwrap();
    assert_eq!(registry.total_footprint(), 0);
}

#[test]
fn inserts_race_total_purge() {
    let registry = CacheRegistry::new();
    let cache = MemoryCache::new(&registry, "shared", None);

    let inserter = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            for i in 0..2000u32 {
                cache.insert(Fingerprint::of_bytes(&i.to_le_bytes()), blob(8));
            }
        })
    };
    let purger = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            for _ in 0..200 {
                registry.total_purge().unwrap();
            }
        })
    };
    inserter.join().unwrap();
    purger.join().unwrap();

    assert_eq!(cache.footprint(), 8 * cache.len());
    assert_eq!(registry.total_footprint(), cache.footprint());
    registry.total_purge().unwrap();
    assert!(cache.is_empty());
    assert_eq!(cache.footprint(), 0);
}

#[test]
fn concurrent_stores_of_one_key() {
    let dir = TempDir::new("stores").unwrap();
    let registry = CacheRegistry::new();
    let first = DiskCache::new(&registry, "first", dir.path()).unwrap();
    let second = DiskCache::new(&registry, "second", dir.path()).unwrap();
    let key = Fingerprint::of_bytes(b"shared tree");
    let tree = Arc::new(SphericalTree::from_points(
        (0..500).map(|i| ([i as f64, (i % 7) as f64, 1.0], i)),
    ));

    let handles: Vec<_> = vec![first, second]
        .into_iter()
        .map(|disk| {
            let key = key.clone();
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                for _ in 0..100 {
                    disk.store_tree(&key, tree.as_ref()).unwrap();
                }
                disk
            })
        })
        .collect();
    let disks: Vec<Arc<DiskCache>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let loaded: SphericalTree = disks[0].load_tree(&key).unwrap().unwrap();
    assert_eq!(loaded.len(), 500);
    assert_eq!(
        loaded.nearest_neighbour([42.2, 0.0, 1.0]).unwrap(),
        tree.nearest_neighbour([42.2, 0.0, 1.0]).unwrap()
    );
    let leftovers: Vec<_> = fs::read_dir(disks[1].entry_dir(&key))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from(TREE_FILE)]);
}
