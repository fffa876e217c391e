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

//! The process-side list of live caches.
//!
//! Every cache registers itself once it is fully built. The registry only keeps weak
//! references, so it never keeps a cache alive; entries whose cache has been dropped are
//! skipped while walking and pruned on the next registration.

use super::{DiskCache, MappedCache, MemoryCache};
use crate::errors::GeogridResult;
use log::{debug, info, warn};
use parking_lot::ReentrantMutex;
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

/// The closed set of cache kinds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// Artifacts held in process memory
    Memory,
    /// Serialised trees in a directory tree
    Disk,
    /// A memory-mapped region
    Mapped,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            CacheKind::Memory => "memory",
            CacheKind::Disk => "disk",
            CacheKind::Mapped => "mapped",
        })
    }
}

/// A live cache, as handed out by the registry.
#[derive(Clone, Debug)]
pub enum RegisteredCache {
    ///
    Memory(Arc<MemoryCache>),
    ///
    Disk(Arc<DiskCache>),
    ///
    Mapped(Arc<MappedCache>),
}

impl RegisteredCache {
    ///
    pub fn kind(&self) -> CacheKind {
        match self {
            RegisteredCache::Memory(_) => CacheKind::Memory,
            RegisteredCache::Disk(_) => CacheKind::Disk,
            RegisteredCache::Mapped(_) => CacheKind::Mapped,
        }
    }

    /// The name the cache was created with
    pub fn name(&self) -> &str {
        match self {
            RegisteredCache::Memory(c) => c.name(),
            RegisteredCache::Disk(c) => c.name(),
            RegisteredCache::Mapped(c) => c.name(),
        }
    }

    /// Bytes the cache currently holds, in memory or on disk depending on its kind.
    pub fn footprint(&self) -> usize {
        match self {
            RegisteredCache::Memory(c) => c.footprint(),
            RegisteredCache::Disk(c) => c.footprint(),
            RegisteredCache::Mapped(c) => c.footprint(),
        }
    }

    /// Drops everything the cache holds.
    pub fn purge(&self) -> GeogridResult<()> {
        match self {
            RegisteredCache::Memory(c) => {
                c.purge();
                Ok(())
            }
            RegisteredCache::Disk(c) => c.purge(),
            RegisteredCache::Mapped(c) => {
                c.purge();
                Ok(())
            }
        }
    }

    fn downgrade(&self) -> WeakCache {
        match self {
            RegisteredCache::Memory(c) => WeakCache::Memory(Arc::downgrade(c)),
            RegisteredCache::Disk(c) => WeakCache::Disk(Arc::downgrade(c)),
            RegisteredCache::Mapped(c) => WeakCache::Mapped(Arc::downgrade(c)),
        }
    }
}

#[derive(Debug)]
enum WeakCache {
    Memory(Weak<MemoryCache>),
    Disk(Weak<DiskCache>),
    Mapped(Weak<MappedCache>),
}

impl WeakCache {
    fn upgrade(&self) -> Option<RegisteredCache> {
        match self {
            WeakCache::Memory(c) => c.upgrade().map(RegisteredCache::Memory),
            WeakCache::Disk(c) => c.upgrade().map(RegisteredCache::Disk),
            WeakCache::Mapped(c) => c.upgrade().map(RegisteredCache::Mapped),
        }
    }

    fn is_dead(&self) -> bool {
        match self {
            WeakCache::Memory(c) => c.strong_count() == 0,
            WeakCache::Disk(c) => c.strong_count() == 0,
            WeakCache::Mapped(c) => c.strong_count() == 0,
        }
    }
}

/// One line of [`CacheRegistry::report`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CacheReport {
    ///
    pub kind: CacheKind,
    ///
    pub name: String,
    ///
    pub footprint: usize,
}

/// Weak list of every cache built against it.
///
/// The list sits behind a re-entrant lock, so a walk holds the lock from start to finish
/// and a cache may still register from inside one (for example while being built by a purge
/// callback) without deadlocking. Each cache has its own lock for its contents; the
/// registry lock only protects the list.
#[derive(Debug, Default)]
pub struct CacheRegistry {
    caches: ReentrantMutex<RefCell<Vec<WeakCache>>>,
}

impl CacheRegistry {
    /// A new, empty registry to hand to cache constructors.
    pub fn new() -> Arc<CacheRegistry> {
        Arc::new(CacheRegistry::default())
    }

    pub(crate) fn register(&self, cache: RegisteredCache) {
        let guard = self.caches.lock();
        let mut caches = guard.borrow_mut();
        caches.retain(|c| !c.is_dead());
        debug!(
            "registering {} cache '{}', {} live",
            cache.kind(),
            cache.name(),
            caches.len() + 1
        );
        caches.push(cache.downgrade());
    }

    /// Runs `f` over every live cache with the registry locked. The list is copied out first,
    /// so `f` may register new caches; those are not visited.
    fn walk<F: FnMut(&RegisteredCache)>(&self, mut f: F) {
        let guard = self.caches.lock();
        let live: Vec<RegisteredCache> = guard.borrow().iter().filter_map(WeakCache::upgrade).collect();
        for cache in live.iter() {
            f(cache);
        }
        drop(live);
        drop(guard);
    }

    /// Every cache still alive, in registration order.
    pub fn live_caches(&self) -> Vec<RegisteredCache> {
        let mut live = Vec::new();
        self.walk(|c| live.push(c.clone()));
        live
    }

    /// Number of caches still alive
    pub fn len(&self) -> usize {
        let mut n = 0;
        self.walk(|_| n += 1);
        n
    }

    ///
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the footprints of every live cache.
    pub fn total_footprint(&self) -> usize {
        let mut total = 0;
        self.walk(|c| total += c.footprint());
        total
    }

    /// Purges every live cache. All of them are attempted; the first failure is returned.
    pub fn total_purge(&self) -> GeogridResult<()> {
        let mut first_error = None;
        let mut purged = 0;
        self.walk(|c| {
            purged += 1;
            if let Err(e) = c.purge() {
                warn!("unable to purge {} cache '{}': {}", c.kind(), c.name(), e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        });
        info!("purged {} caches", purged);
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Kind, name and footprint of every live cache.
    pub fn report(&self) -> Vec<CacheReport> {
        let mut lines = Vec::new();
        self.walk(|c| {
            lines.push(CacheReport {
                kind: c.kind(),
                name: c.name().to_string(),
                footprint: c.footprint(),
            })
        });
        lines
    }
}
