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

//! Artifacts kept in process memory, keyed by fingerprint.

use super::registry::{CacheRegistry, RegisteredCache};
use super::Fingerprint;
use crate::searchtree::{GridTree, PlanarTree, SphericalTree};
use hashbrown::HashMap;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Something worth keeping. Trees are shared, a hit hands out another reference.
#[derive(Clone, Debug)]
pub enum CachedArtifact {
    ///
    Planar(Arc<PlanarTree>),
    ///
    Spherical(Arc<SphericalTree>),
    /// An opaque grid product, a serialised tree for example
    Bytes(Arc<Vec<u8>>),
}

impl CachedArtifact {
    /// Bytes held by the artifact itself
    pub fn footprint(&self) -> usize {
        match self {
            CachedArtifact::Planar(t) => t.footprint(),
            CachedArtifact::Spherical(t) => t.footprint(),
            CachedArtifact::Bytes(b) => b.len(),
        }
    }

    /// The tree inside, if this is one.
    pub fn into_grid_tree(self) -> Option<GridTree> {
        match self {
            CachedArtifact::Planar(t) => Some(GridTree::Planar(t)),
            CachedArtifact::Spherical(t) => Some(GridTree::Spherical(t)),
            CachedArtifact::Bytes(_) => None,
        }
    }
}

impl From<GridTree> for CachedArtifact {
    fn from(tree: GridTree) -> CachedArtifact {
        match tree {
            GridTree::Planar(t) => CachedArtifact::Planar(t),
            GridTree::Spherical(t) => CachedArtifact::Spherical(t),
        }
    }
}

#[derive(Debug)]
struct Entry {
    artifact: CachedArtifact,
    footprint: usize,
    last_access: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<Fingerprint, Entry>,
    tick: u64,
    bytes: usize,
}

impl MemoryState {
    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// An in-process cache. With a capacity, the least recently used entries are evicted once
/// the total footprint goes over it; an entry larger than the capacity on its own is kept.
#[derive(Debug)]
pub struct MemoryCache {
    name: String,
    capacity: Option<usize>,
    state: Mutex<MemoryState>,
}

impl MemoryCache {
    /// Creates the cache and registers it.
    pub fn new<S: Into<String>>(
        registry: &CacheRegistry,
        name: S,
        capacity: Option<usize>,
    ) -> Arc<MemoryCache> {
        let cache = Arc::new(MemoryCache {
            name: name.into(),
            capacity,
            state: Mutex::new(MemoryState::default()),
        });
        registry.register(RegisteredCache::Memory(Arc::clone(&cache)));
        cache
    }

    ///
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte budget, if any
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Stores `artifact`, replacing whatever had the same key. Returns how many other
    /// entries were evicted to make room.
    pub fn insert(&self, key: Fingerprint, artifact: CachedArtifact) -> usize {
        let footprint = artifact.footprint();
        let mut state = self.state.lock();
        let last_access = state.touch();
        if let Some(old) = state.entries.insert(
            key.clone(),
            Entry {
                artifact,
                footprint,
                last_access,
            },
        ) {
            state.bytes -= old.footprint;
        }
        state.bytes += footprint;
        info!(
            "memory cache '{}' stored {} ({} bytes)",
            self.name, key, footprint
        );

        let mut evicted = 0;
        if let Some(capacity) = self.capacity {
            while state.bytes > capacity {
                let oldest = state
                    .entries
                    .iter()
                    .filter(|(k, _)| **k != key)
                    .min_by_key(|(_, e)| e.last_access)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        if let Some(e) = state.entries.remove(&k) {
                            state.bytes -= e.footprint;
                            evicted += 1;
                            warn!(
                                "memory cache '{}' over its {} bytes, evicted {}",
                                self.name, capacity, k
                            );
                        }
                    }
                    None => {
                        warn!(
                            "memory cache '{}' holds {} which alone is over its {} bytes",
                            self.name, key, capacity
                        );
                        break;
                    }
                }
            }
        }
        evicted
    }

    /// The artifact stored under `key`, marking it as recently used.
    pub fn get(&self, key: &Fingerprint) -> Option<CachedArtifact> {
        let mut state = self.state.lock();
        let now = state.touch();
        let entry = state.entries.get_mut(key)?;
        entry.last_access = now;
        debug!("memory cache '{}' hit {}", self.name, key);
        Some(entry.artifact.clone())
    }

    ///
    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Takes an entry out.
    pub fn remove(&self, key: &Fingerprint) -> Option<CachedArtifact> {
        let mut state = self.state.lock();
        let entry = state.entries.remove(key)?;
        state.bytes -= entry.footprint;
        Some(entry.artifact)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    ///
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the footprints of the stored artifacts
    pub fn footprint(&self) -> usize {
        self.state.lock().bytes
    }

    /// Drops every entry.
    pub fn purge(&self) {
        let mut state = self.state.lock();
        let n = state.entries.len();
        state.entries.clear();
        state.bytes = 0;
        info!("memory cache '{}' purged {} entries", self.name, n);
    }
}
