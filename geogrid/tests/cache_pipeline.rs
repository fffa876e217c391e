use geogrid::utils::{tree_config_from_yaml, tree_from_yaml, TreeCache, TreeSource};
use geogrid::*;
use std::fs;
use std::sync::Arc;
use tempdir::TempDir;

#[test]
fn registry_totals_follow_purges() {
    let registry = CacheRegistry::new();
    let a = MemoryCache::new(&registry, "a", None);
    let b = MemoryCache::new(&registry, "b", None);
    a.insert(Fingerprint::of_bytes(b"a"), CachedArtifact::Bytes(Arc::new(vec![0; 100])));
    b.insert(Fingerprint::of_bytes(b"b"), CachedArtifact::Bytes(Arc::new(vec![0; 200])));
    assert_eq!(registry.total_footprint(), 300);

    a.purge();
    assert_eq!(registry.total_footprint(), 200);
    registry.total_purge().unwrap();
    assert_eq!(registry.total_footprint(), 0);
    assert_eq!(registry.len(), 2);
}

#[test]
fn memory_then_disk_then_build() {
    let dir = TempDir::new("pipeline").unwrap();
    let registry = CacheRegistry::new();
    let disk = DiskCache::new(&registry, "disk", dir.path().join("trees")).unwrap();
    let spec = GridSpec::octahedral(8);

    let first = TreeCache::new(SearchTreeBuilder::new())
        .with_memory(MemoryCache::new(&registry, "first", None))
        .with_disk(Arc::clone(&disk));
    let built = first.get_or_build(&spec).unwrap();
    assert_eq!(built.source, TreeSource::Built);
    assert!(disk.contains(&built.fingerprint));
    assert_eq!(first.get_or_build(&spec).unwrap().source, TreeSource::Memory);

    let second = TreeCache::new(SearchTreeBuilder::new())
        .with_memory(MemoryCache::new(&registry, "second", None))
        .with_disk(Arc::clone(&disk));
    let loaded = second.get_or_build(&spec).unwrap();
    assert_eq!(loaded.source, TreeSource::Disk);
    assert_eq!(loaded.fingerprint, built.fingerprint);
    assert_eq!(loaded.tree.len(), built.tree.len());

    let grid = Grid::from_spec(&spec).unwrap();
    let builder = second.builder();
    for (i, p) in grid.points().enumerate().step_by(7) {
        assert_eq!(builder.nearest_grid_point(&loaded.tree, &p).unwrap(), i);
    }

    // A different leaf size is a different tree.
    let mut other = SearchTreeBuilder::new();
    other.set_leaf_size(4);
    let third = TreeCache::new(other).with_disk(Arc::clone(&disk));
    let rebuilt = third.get_or_build(&spec).unwrap();
    assert_eq!(rebuilt.source, TreeSource::Built);
    assert_ne!(rebuilt.fingerprint, built.fingerprint);
}

#[test]
fn corrupt_disk_entries_are_rebuilt() {
    let dir = TempDir::new("corrupt").unwrap();
    let registry = CacheRegistry::new();
    let disk = DiskCache::new(&registry, "disk", dir.path()).unwrap();
    let spec = GridSpec::regular(16, 8);
    let cache = TreeCache::new(SearchTreeBuilder::new()).with_disk(Arc::clone(&disk));
    let key = cache.fingerprint(&spec).unwrap();

    fs::create_dir_all(disk.entry_dir(&key)).unwrap();
    fs::write(disk.tree_path(&key), b"not a tree").unwrap();
    let tree = cache.get_or_build(&spec).unwrap();
    assert_eq!(tree.source, TreeSource::Built);
    assert_eq!(cache.get_or_build(&spec).unwrap().source, TreeSource::Disk);
}

#[test]
fn trees_map_into_regions() {
    let dir = TempDir::new("regions").unwrap();
    let registry = CacheRegistry::new();
    let region = MappedCache::file_backed(&registry, "region", dir.path().join("tree.bin")).unwrap();
    assert!(!region.is_mapped());

    let spec = GridSpec::octahedral(4);
    let cache = TreeCache::new(SearchTreeBuilder::new());
    cache.map_into(&spec, &region).unwrap();
    assert!(region.is_mapped());

    let mapped: MappedSearchTree<3> = region.map_tree().unwrap();
    let owned = SearchTreeBuilder::new().build_spherical(Grid::from_spec(&spec).unwrap().points());
    assert_eq!(mapped.len(), owned.len());
    let q = [1.0e6, 2.0e6, 6.0e6];
    assert_eq!(
        mapped.nearest_neighbour(q).unwrap(),
        owned.nearest_neighbour(q).unwrap()
    );
    assert_eq!(registry.total_footprint(), region.footprint());

    region.purge();
    assert!(!region.is_mapped());
    assert!(region.map_tree::<3, usize>().is_ok());
}

#[test]
fn yaml_description_builds_a_tree() {
    let dir = TempDir::new("yaml").unwrap();
    let path = dir.path().join("tree.yml");
    fs::write(
        &path,
        "---\nleaf_size: 8\nembedding: planar\ngrid:\n  grid_type: regular_ll\n  ni: 12\n  nj: 7\n",
    )
    .unwrap();

    let (spec, builder) = tree_config_from_yaml(&path).unwrap();
    assert_eq!(builder.leaf_size(), 8);
    assert_eq!(builder.embedding(), Embedding::Planar);
    assert_eq!(Grid::from_spec(&spec).unwrap().size(), 84);

    let tree = tree_from_yaml(&path).unwrap();
    assert_eq!(tree.dimension(), 2);
    assert_eq!(tree.len(), 84);

    fs::write(&path, "---\nleaf_size: 8\n").unwrap();
    assert!(tree_from_yaml(&path).is_err());
    assert!(tree_from_yaml(dir.path().join("missing.yml")).unwrap_err().is_io_error());
}
