/*
* Licensed to Elasticsearch B.V. under one or more contributor
* license agreements. See the NOTICE file distributed with
* this work for additional information regarding copyright
* ownership. Elasticsearch B.V. licenses this file to you under
* the Apache License, Version 2.0 (the "License"); you may
* not use this file except in compliance with the License.
* You may obtain a copy of the License at
*
*  http://www.apache.org/licenses/LICENSE-2.0
*
* Unless required by applicable law or agreed to in writing,
* software distributed under the License is distributed on an
* "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
* KIND, either express or implied.  See the License for the
* specific language governing permissions and limitations
* under the License.
*/

//! Serialised trees in a directory tree, one subdirectory per fingerprint:
//! `<root>/<fingerprint>/search-tree.bin`.

use super::mapped::{write_atomically, MappedBytes, MappedSearchTree};
use super::registry::{CacheRegistry, RegisteredCache};
use super::Fingerprint;
use crate::errors::{GeogridError, GeogridResult};
use crate::format;
use crate::searchtree::{Payload, SearchTree};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// File name of a serialised tree inside its entry directory
pub const TREE_FILE: &str = "search-tree.bin";

/// A cache rooted at a directory the caller picks. The root is created if needed and is
/// never removed by the cache itself.
#[derive(Debug)]
pub struct DiskCache {
    name: String,
    root: PathBuf,
    lock: Mutex<()>,
}

impl DiskCache {
    /// Creates the root directory if needed and registers the cache.
    pub fn new<S: Into<String>, Q: AsRef<Path>>(
        registry: &CacheRegistry,
        name: S,
        root: Q,
    ) -> GeogridResult<Arc<DiskCache>> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let cache = Arc::new(DiskCache {
            name: name.into(),
            root,
            lock: Mutex::new(()),
        });
        registry.register(RegisteredCache::Disk(Arc::clone(&cache)));
        Ok(cache)
    }

    ///
    pub fn name(&self) -> &str {
        &self.name
    }

    ///
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding everything stored under `key`
    pub fn entry_dir(&self, key: &Fingerprint) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Where the tree stored under `key` lives
    pub fn tree_path(&self, key: &Fingerprint) -> PathBuf {
        self.entry_dir(key).join(TREE_FILE)
    }

    ///
    pub fn contains(&self, key: &Fingerprint) -> bool {
        let _guard = self.lock.lock();
        self.tree_path(key).is_file()
    }

    /// Serialises `tree` under `key`, replacing any previous tree atomically.
    pub fn store_tree<const D: usize, P: Payload>(
        &self,
        key: &Fingerprint,
        tree: &SearchTree<D, P>,
    ) -> GeogridResult<PathBuf> {
        let bytes = format::encode(tree);
        let _guard = self.lock.lock();
        fs::create_dir_all(self.entry_dir(key))?;
        let path = self.tree_path(key);
        write_atomically(&path, &bytes)?;
        info!(
            "disk cache '{}' stored {} ({} bytes)",
            self.name,
            key,
            bytes.len()
        );
        Ok(path)
    }

    /// Reads and decodes the tree stored under `key`, `None` if there is none. A stored
    /// tree that fails validation is an error, not a miss.
    pub fn load_tree<const D: usize, P: Payload>(
        &self,
        key: &Fingerprint,
    ) -> GeogridResult<Option<SearchTree<D, P>>> {
        let _guard = self.lock.lock();
        let path = self.tree_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let tree = format::decode(&bytes).map_err(|e| {
            warn!("disk cache '{}' has a bad tree at {}", self.name, path.display());
            e
        })?;
        debug!("disk cache '{}' hit {}", self.name, key);
        Ok(Some(tree))
    }

    /// Maps the tree stored under `key` without decoding it, `None` if there is none.
    pub fn map_tree<const D: usize, P: Payload>(
        &self,
        key: &Fingerprint,
    ) -> GeogridResult<Option<MappedSearchTree<D, P>>> {
        let _guard = self.lock.lock();
        let path = self.tree_path(key);
        if !path.is_file() {
            return Ok(None);
        }
        let tree = MappedSearchTree::new(MappedBytes::from_file(&path)?)?;
        debug!("disk cache '{}' mapped {}", self.name, key);
        Ok(Some(tree))
    }

    /// Deletes everything stored under `key`. False if there was nothing.
    pub fn remove(&self, key: &Fingerprint) -> GeogridResult<bool> {
        let _guard = self.lock.lock();
        let dir = self.entry_dir(key);
        if !dir.exists() {
            return Ok(false);
        }
        remove_depth_first(&dir)?;
        Ok(true)
    }

    /// Bytes of every file under the root.
    pub fn footprint(&self) -> usize {
        let _guard = self.lock.lock();
        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len() as usize)
            .sum()
    }

    /// Removes everything under the root, children before parents. The root stays.
    pub fn purge(&self) -> GeogridResult<()> {
        let _guard = self.lock.lock();
        let mut removed = 0;
        for entry in fs::read_dir(&self.root)? {
            remove_depth_first(&entry?.path())?;
            removed += 1;
        }
        info!("disk cache '{}' purged {} entries", self.name, removed);
        Ok(())
    }

    /// Removes `path`, which has to be inside the root, and everything below it. Children
    /// go before their parents and the whole walk happens under the cache lock.
    pub fn rmdir<Q: AsRef<Path>>(&self, path: Q) -> GeogridResult<()> {
        let path = path.as_ref();
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir));
        if escapes || !path.starts_with(&self.root) || path == self.root {
            return Err(GeogridError::IoError(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{} is not below the cache root {}",
                    path.display(),
                    self.root.display()
                ),
            )));
        }
        let _guard = self.lock.lock();
        remove_depth_first(path)
    }
}

fn remove_depth_first(path: &Path) -> GeogridResult<()> {
    for entry in WalkDir::new(path).contents_first(true) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            fs::remove_dir(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searchtree::PlanarTree;
    use tempdir::TempDir;

    fn tree() -> PlanarTree {
        PlanarTree::from_points((0..30).map(|i| ([i as f64, (i * i % 11) as f64], i)))
    }

    #[test]
    fn store_load_and_map() {
        let dir = TempDir::new("disk").unwrap();
        let registry = CacheRegistry::new();
        let cache = DiskCache::new(&registry, "trees", dir.path().join("cache")).unwrap();
        let key = Fingerprint::of_bytes(b"tree");
        assert!(!cache.contains(&key));
        assert!(cache.load_tree::<2, usize>(&key).unwrap().is_none());
        assert!(cache.map_tree::<2, usize>(&key).unwrap().is_none());

        let original = tree();
        let path = cache.store_tree(&key, &original).unwrap();
        assert_eq!(path, dir.path().join("cache").join(key.as_str()).join(TREE_FILE));
        assert!(cache.contains(&key));

        let loaded: PlanarTree = cache.load_tree(&key).unwrap().unwrap();
        let mapped: MappedSearchTree<2> = cache.map_tree(&key).unwrap().unwrap();
        for q in [[3.2, 4.0], [29.0, 0.0], [-1.0, -1.0]].iter() {
            let expected = original.nearest_neighbour(*q).unwrap();
            assert_eq!(loaded.nearest_neighbour(*q).unwrap(), expected);
            assert_eq!(mapped.nearest_neighbour(*q).unwrap(), expected);
        }
        assert_eq!(cache.footprint(), fs::metadata(&path).unwrap().len() as usize);
        assert_eq!(registry.total_footprint(), cache.footprint());

        assert!(cache.remove(&key).unwrap());
        assert!(!cache.remove(&key).unwrap());
        assert!(!cache.entry_dir(&key).exists());
    }

    #[test]
    fn corrupt_entries_are_errors() {
        let dir = TempDir::new("disk").unwrap();
        let registry = CacheRegistry::new();
        let cache = DiskCache::new(&registry, "trees", dir.path()).unwrap();
        let key = Fingerprint::of_bytes(b"bad");
        fs::create_dir_all(cache.entry_dir(&key)).unwrap();
        fs::write(cache.tree_path(&key), b"definitely not a tree").unwrap();
        assert!(cache
            .load_tree::<2, usize>(&key)
            .unwrap_err()
            .is_format_error());
        assert!(cache.map_tree::<2, usize>(&key).is_err());
    }

    #[test]
    fn rmdir_removes_children_first() {
        let dir = TempDir::new("disk").unwrap();
        let registry = CacheRegistry::new();
        let cache = DiskCache::new(&registry, "scratch", dir.path()).unwrap();
        let nested = dir.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("leaf.bin"), [1u8; 10]).unwrap();
        fs::write(dir.path().join("a").join("top.bin"), [1u8; 5]).unwrap();
        assert_eq!(cache.footprint(), 15);

        cache.rmdir(dir.path().join("a").join("b")).unwrap();
        assert!(!dir.path().join("a").join("b").exists());
        assert!(dir.path().join("a").join("top.bin").exists());

        assert!(cache.rmdir(dir.path()).is_err());
        assert!(cache.rmdir(dir.path().join("..")).is_err());
        assert!(cache.rmdir("/tmp").is_err());
    }

    #[test]
    fn purge_keeps_the_root() {
        let dir = TempDir::new("disk").unwrap();
        let registry = CacheRegistry::new();
        let cache = DiskCache::new(&registry, "trees", dir.path().join("root")).unwrap();
        for i in 0..3u8 {
            cache
                .store_tree(&Fingerprint::of_bytes(&[i]), &tree())
                .unwrap();
        }
        fs::write(cache.root().join("stray.txt"), b"x").unwrap();
        assert!(cache.footprint() > 0);
        cache.purge().unwrap();
        assert_eq!(cache.footprint(), 0);
        assert!(cache.root().is_dir());
        assert_eq!(fs::read_dir(cache.root()).unwrap().count(), 0);
    }
}
