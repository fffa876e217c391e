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

//! Memory-mapped regions, and search trees read straight out of them.
//!
//! A [`MappedCache`] owns one region. Anonymous regions are zero-filled private maps that
//! never touch durable storage; file-backed regions map a file that every write replaces
//! atomically. Readers get a [`MappedBytes`] handle that keeps its map alive, so a write or
//! purge never pulls memory out from under a reader.

use super::registry::{CacheRegistry, RegisteredCache};
use crate::errors::{GeogridError, GeogridResult};
use crate::format::{self, Header, Layout};
use crate::searchtree::{k_nearest, nearest, within, Candidate, Neighbour, Payload, SearchTree};
use gridcloud::memmap::{Mmap, MmapMut};
use log::{debug, info};
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::marker::PhantomData;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A shared, read-only view of the first `len` bytes of a map.
#[derive(Clone)]
pub struct MappedBytes {
    map: Arc<Mmap>,
    len: usize,
}

impl MappedBytes {
    fn new(map: Mmap, len: usize) -> MappedBytes {
        let len = len.min(map.len());
        MappedBytes {
            map: Arc::new(map),
            len,
        }
    }

    /// Maps a whole file read-only.
    pub(crate) fn from_file(path: &Path) -> GeogridResult<MappedBytes> {
        let file = File::open(path)?;
        // Cache files are only ever replaced by rename, never rewritten in place, so the
        // mapped inode does not change underneath us.
        let map = unsafe { Mmap::map(&file)? };
        let len = map.len();
        debug!("mapped {} ({} bytes)", path.display(), len);
        Ok(MappedBytes::new(map, len))
    }

    /// Length of the underlying map, which can be longer than the contents.
    pub fn mapped_len(&self) -> usize {
        self.map.len()
    }
}

impl Deref for MappedBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map[..self.len]
    }
}

impl AsRef<[u8]> for MappedBytes {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl fmt::Debug for MappedBytes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MappedBytes")
            .field("len", &self.len)
            .field("mapped_len", &self.map.len())
            .finish()
    }
}

/// A serialised search tree answering queries in place, without being decoded.
pub struct MappedSearchTree<const D: usize, P: Payload = usize> {
    bytes: MappedBytes,
    layout: Layout,
    payload: PhantomData<fn() -> P>,
}

impl<const D: usize, P: Payload> fmt::Debug for MappedSearchTree<D, P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MappedSearchTree")
            .field("dimension", &D)
            .field("header", &self.layout.header)
            .finish()
    }
}

impl<const D: usize, P: Payload> MappedSearchTree<D, P> {
    /// Validates `bytes` completely, once. Queries afterwards trust the layout.
    pub fn new(bytes: MappedBytes) -> GeogridResult<Self> {
        let layout = format::validate::<D>(&bytes)?;
        Ok(MappedSearchTree {
            bytes,
            layout,
            payload: PhantomData,
        })
    }

    ///
    pub fn header(&self) -> Header {
        self.layout.header
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.layout.header.point_count as usize
    }

    ///
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes mapped
    pub fn footprint(&self) -> usize {
        self.bytes.len()
    }

    fn answer(&self, parts: &format::Sections<'_, D>, c: Candidate) -> Neighbour<D, P> {
        Neighbour {
            point: parts.view.coords[c.slot],
            payload: P::from_bits(parts.payloads[c.slot]),
            distance: c.dist2.sqrt(),
        }
    }

    /// See [`SearchTree::nearest_neighbour`].
    pub fn nearest_neighbour<Q: Into<[f64; D]>>(&self, point: Q) -> GeogridResult<Neighbour<D, P>> {
        let parts = format::sections::<D>(&self.bytes, &self.layout)?;
        let query = point.into();
        nearest(&[parts.view], &query)
            .map(|c| self.answer(&parts, c))
            .ok_or(GeogridError::EmptyIndex)
    }

    /// See [`SearchTree::k_nearest_neighbours`].
    pub fn k_nearest_neighbours<Q: Into<[f64; D]>>(
        &self,
        point: Q,
        k: usize,
    ) -> GeogridResult<Vec<Neighbour<D, P>>> {
        if self.is_empty() {
            return Err(GeogridError::EmptyIndex);
        }
        let parts = format::sections::<D>(&self.bytes, &self.layout)?;
        let query = point.into();
        Ok(k_nearest(&[parts.view], &query, k)
            .into_iter()
            .map(|c| self.answer(&parts, c))
            .collect())
    }

    /// See [`SearchTree::find_in_sphere`].
    pub fn find_in_sphere<Q: Into<[f64; D]>>(
        &self,
        point: Q,
        radius: f64,
    ) -> GeogridResult<Vec<Neighbour<D, P>>> {
        let parts = format::sections::<D>(&self.bytes, &self.layout)?;
        let query = point.into();
        Ok(within(&[parts.view], &query, radius)
            .into_iter()
            .map(|c| self.answer(&parts, c))
            .collect())
    }

    /// Decodes into an owned tree that can take inserts.
    pub fn to_search_tree(&self) -> GeogridResult<SearchTree<D, P>> {
        format::decode(&self.bytes)
    }
}

#[derive(Debug)]
enum Backing {
    Anonymous { capacity: usize },
    File { path: PathBuf },
}

/// One memory-mapped region, anonymous or backed by a file.
#[derive(Debug)]
pub struct MappedCache {
    name: String,
    backing: Backing,
    region: Mutex<Option<MappedBytes>>,
}

fn zeroed(capacity: usize) -> GeogridResult<Mmap> {
    Ok(MmapMut::map_anon(capacity)?.make_read_only()?)
}

impl MappedCache {
    /// A zero-filled private region of `capacity` bytes. Mapped straight away.
    pub fn anonymous<S: Into<String>>(
        registry: &CacheRegistry,
        name: S,
        capacity: usize,
    ) -> GeogridResult<Arc<MappedCache>> {
        let region = MappedBytes::new(zeroed(capacity)?, capacity);
        let cache = Arc::new(MappedCache {
            name: name.into(),
            backing: Backing::Anonymous { capacity },
            region: Mutex::new(Some(region)),
        });
        registry.register(RegisteredCache::Mapped(Arc::clone(&cache)));
        Ok(cache)
    }

    /// A region backed by the file at `path`. An existing file is mapped straight away, a
    /// missing one is created by the first write.
    pub fn file_backed<S: Into<String>, Q: AsRef<Path>>(
        registry: &CacheRegistry,
        name: S,
        path: Q,
    ) -> GeogridResult<Arc<MappedCache>> {
        let path = path.as_ref().to_path_buf();
        let region = if path.is_file() {
            Some(MappedBytes::from_file(&path)?)
        } else {
            None
        };
        let cache = Arc::new(MappedCache {
            name: name.into(),
            backing: Backing::File { path },
            region: Mutex::new(region),
        });
        registry.register(RegisteredCache::Mapped(Arc::clone(&cache)));
        Ok(cache)
    }

    ///
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backing file, `None` for anonymous regions
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File { path } => Some(path),
            Backing::Anonymous { .. } => None,
        }
    }

    /// Size of an anonymous region, `None` for files
    pub fn capacity(&self) -> Option<usize> {
        match self.backing {
            Backing::Anonymous { capacity } => Some(capacity),
            Backing::File { .. } => None,
        }
    }

    /// True while a region is mapped
    pub fn is_mapped(&self) -> bool {
        self.region.lock().is_some()
    }

    /// Replaces the contents with `bytes`. Readers holding the previous contents keep them.
    pub fn write(&self, bytes: &[u8]) -> GeogridResult<()> {
        let mut region = self.region.lock();
        let fresh = match &self.backing {
            Backing::Anonymous { capacity } => {
                if bytes.len() > *capacity {
                    return Err(GeogridError::IoError(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!(
                            "{} bytes do not fit in the {} byte region '{}'",
                            bytes.len(),
                            capacity,
                            self.name
                        ),
                    )));
                }
                let mut map = MmapMut::map_anon(*capacity)?;
                map[..bytes.len()].copy_from_slice(bytes);
                MappedBytes::new(map.make_read_only()?, bytes.len())
            }
            Backing::File { path } => {
                write_atomically(path, bytes)?;
                MappedBytes::from_file(path)?
            }
        };
        info!("mapped cache '{}' holds {} bytes", self.name, bytes.len());
        *region = Some(fresh);
        Ok(())
    }

    /// The current contents. Re-maps after a purge: zeros for anonymous regions, the file
    /// for file-backed ones (which must exist).
    pub fn read(&self) -> GeogridResult<MappedBytes> {
        let mut region = self.region.lock();
        if let Some(bytes) = region.as_ref() {
            return Ok(bytes.clone());
        }
        let bytes = match &self.backing {
            Backing::Anonymous { capacity } => MappedBytes::new(zeroed(*capacity)?, *capacity),
            Backing::File { path } => MappedBytes::from_file(path)?,
        };
        *region = Some(bytes.clone());
        Ok(bytes)
    }

    /// Serialises `tree` into the region.
    pub fn store_tree<const D: usize, P: Payload>(&self, tree: &SearchTree<D, P>) -> GeogridResult<()> {
        self.write(&format::encode(tree))
    }

    /// The stored tree, queried in place.
    pub fn map_tree<const D: usize, P: Payload>(&self) -> GeogridResult<MappedSearchTree<D, P>> {
        MappedSearchTree::new(self.read()?)
    }

    /// Length of the current map, zero when unmapped.
    pub fn footprint(&self) -> usize {
        self.region
            .lock()
            .as_ref()
            .map_or(0, MappedBytes::mapped_len)
    }

    /// Unmaps the region. Outstanding [`MappedBytes`] keep their map until dropped; a file
    /// backing the region stays on disk.
    pub fn purge(&self) {
        if self.region.lock().take().is_some() {
            info!("mapped cache '{}' unmapped", self.name);
        }
    }
}

/// Numbers the temp files of this process, so concurrent writers never share one.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes `bytes` next to `path` and renames over it, so readers see the old file or the
/// new one and nothing in between.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> GeogridResult<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(format!(
        ".tmp-{}-{}",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let tmp = path.with_file_name(tmp_name);
    let result = File::create(&tmp).and_then(|mut f| {
        f.write_all(bytes)?;
        f.sync_all()
    });
    if let Err(e) = result.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
