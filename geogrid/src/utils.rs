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

//! Utility functions for i/o, and the build-or-reuse pipeline.

use crate::cache::{
    write_atomically, CachedArtifact, DiskCache, Fingerprint, MappedCache, MemoryCache,
};
use crate::errors::{GeogridError, GeogridResult};
use crate::format;
use crate::searchtree::{Embedding, GridTree, Payload, SearchTree, SearchTreeBuilder};
use gridcloud::errors::ParsingError;
use gridcloud::loaders::grid_spec_from_yaml_doc;
use gridcloud::GridSpec;
use log::{info, warn};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use yaml_rust::{Yaml, YamlLoader};

/// Helper function that handles the file I/O and encoding for you. The file is replaced
/// atomically.
pub fn save_tree<const D: usize, P: Payload, Q: AsRef<Path>>(
    tree_path: Q,
    tree: &SearchTree<D, P>,
) -> GeogridResult<()> {
    let tree_path = tree_path.as_ref();
    info!("saving tree to {}", tree_path.display());
    let bytes = format::encode(tree);
    write_atomically(tree_path, &bytes)
}

/// Helper function that handles the file I/O and decoding for you.
pub fn load_tree<const D: usize, P: Payload, Q: AsRef<Path>>(
    tree_path: Q,
) -> GeogridResult<SearchTree<D, P>> {
    let tree_path = tree_path.as_ref();
    info!("loading tree from {}", tree_path.display());
    format::decode(&fs::read(tree_path)?)
}

/// Reads the grid and tree parameters out of one yaml file: builder keys at the top level,
/// the grid description under `grid`.
///
/// ```yaml
/// ---
/// leaf_size: 16
/// embedding: sphere
/// radius: 6371229.0
/// grid:
///   grid_type: octahedral
///   n: 320
/// ```
pub fn tree_config_from_yaml<Q: AsRef<Path>>(path: Q) -> GeogridResult<(GridSpec, SearchTreeBuilder)> {
    let config = fs::read_to_string(&path)?;
    let file_name = path.as_ref().to_string_lossy().to_string();
    let docs = YamlLoader::load_from_str(&config).map_err(|_| ParsingError::MalformedYamlError {
        file_name: file_name.clone(),
        field: "document".to_string(),
    })?;
    let doc = docs.get(0).ok_or_else(|| ParsingError::MissingYamlError {
        file_name: file_name.clone(),
        field: "document".to_string(),
    })?;
    let grid = match &doc["grid"] {
        Yaml::Hash(_) => &doc["grid"],
        Yaml::BadValue | Yaml::Null => {
            return Err(ParsingError::MissingYamlError {
                file_name,
                field: "grid".to_string(),
            }
            .into())
        }
        _ => {
            return Err(ParsingError::MalformedYamlError {
                file_name,
                field: "grid".to_string(),
            }
            .into())
        }
    };
    let spec = grid_spec_from_yaml_doc(grid, &file_name)?;
    let builder = SearchTreeBuilder::from_yaml_doc(doc, &file_name)?;
    Ok((spec, builder))
}

/// Given a yaml file on disk, it lays out the grid and builds a search tree over it. See
/// [`tree_config_from_yaml`] for the format.
pub fn tree_from_yaml<Q: AsRef<Path>>(path: Q) -> GeogridResult<GridTree> {
    let (spec, builder) = tree_config_from_yaml(&path)?;
    info!(
        "loaded {} grid description, building a tree with leaf size {} and {:?}",
        spec.grid_type,
        builder.leaf_size(),
        builder.embedding()
    );
    builder.build_from_spec(&spec)
}

/// Where [`TreeCache::get_or_build`] found its tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TreeSource {
    /// Already in the memory cache
    Memory,
    /// Decoded from the disk cache
    Disk,
    /// Built from the grid
    Built,
}

/// A tree handed out by a [`TreeCache`].
#[derive(Clone, Debug)]
pub struct CachedTree {
    ///
    pub tree: GridTree,
    /// The key it is stored under
    pub fingerprint: Fingerprint,
    ///
    pub source: TreeSource,
}

/// Looks a grid's tree up in memory, then on disk, and builds it only when both miss.
/// Whatever is found or built is stored into every layer that did not have it.
#[derive(Clone, Debug)]
pub struct TreeCache {
    builder: SearchTreeBuilder,
    memory: Option<Arc<MemoryCache>>,
    disk: Option<Arc<DiskCache>>,
}

impl TreeCache {
    /// A pipeline with no cache layers yet, every call builds.
    pub fn new(builder: SearchTreeBuilder) -> TreeCache {
        TreeCache {
            builder,
            memory: None,
            disk: None,
        }
    }

    ///
    pub fn with_memory(mut self, memory: Arc<MemoryCache>) -> Self {
        self.memory = Some(memory);
        self
    }

    ///
    pub fn with_disk(mut self, disk: Arc<DiskCache>) -> Self {
        self.disk = Some(disk);
        self
    }

    ///
    pub fn builder(&self) -> &SearchTreeBuilder {
        &self.builder
    }

    /// Key the tree for `spec` is stored under.
    pub fn fingerprint(&self, spec: &GridSpec) -> GeogridResult<Fingerprint> {
        Fingerprint::of_tree(spec, &self.builder)
    }

    fn from_disk(&self, disk: &DiskCache, key: &Fingerprint) -> GeogridResult<Option<GridTree>> {
        let loaded = match self.builder.embedding() {
            Embedding::Planar => disk
                .load_tree::<2, usize>(key)
                .map(|t| t.map(|t| GridTree::Planar(Arc::new(t)))),
            _ => disk
                .load_tree::<3, usize>(key)
                .map(|t| t.map(|t| GridTree::Spherical(Arc::new(t)))),
        };
        match loaded {
            Err(GeogridError::FormatError { message }) => {
                warn!("discarding cached tree {}: {}", key, message);
                Ok(None)
            }
            other => other,
        }
    }

    fn to_disk(disk: &DiskCache, key: &Fingerprint, tree: &GridTree) -> GeogridResult<()> {
        match tree {
            GridTree::Planar(t) => disk.store_tree(key, t.as_ref())?,
            GridTree::Spherical(t) => disk.store_tree(key, t.as_ref())?,
        };
        Ok(())
    }

    /// The tree for `spec`, from the cheapest layer that has it.
    pub fn get_or_build(&self, spec: &GridSpec) -> GeogridResult<CachedTree> {
        let fingerprint = self.fingerprint(spec)?;
        if let Some(memory) = &self.memory {
            if let Some(tree) = memory.get(&fingerprint).and_then(CachedArtifact::into_grid_tree) {
                return Ok(CachedTree {
                    tree,
                    fingerprint,
                    source: TreeSource::Memory,
                });
            }
        }

        let mut source = TreeSource::Built;
        let mut found = None;
        if let Some(disk) = &self.disk {
            found = self.from_disk(disk, &fingerprint)?;
            if found.is_some() {
                source = TreeSource::Disk;
            }
        }
        let tree = match found {
            Some(tree) => tree,
            None => {
                info!("building tree {} for a {} grid", fingerprint, spec.grid_type);
                let tree = self.builder.build_from_spec(spec)?;
                if let Some(disk) = &self.disk {
                    TreeCache::to_disk(disk, &fingerprint, &tree)?;
                }
                tree
            }
        };
        if let Some(memory) = &self.memory {
            memory.insert(fingerprint.clone(), tree.clone().into());
        }
        Ok(CachedTree {
            tree,
            fingerprint,
            source,
        })
    }

    /// Serialises the tree for `spec` into a mapped region, building it if needed.
    pub fn map_into(&self, spec: &GridSpec, region: &MappedCache) -> GeogridResult<Fingerprint> {
        let cached = self.get_or_build(spec)?;
        match &cached.tree {
            GridTree::Planar(t) => region.store_tree(t.as_ref())?,
            GridTree::Spherical(t) => region.store_tree(t.as_ref())?,
        }
        Ok(cached.fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searchtree::SphericalTree;
    use tempdir::TempDir;

    #[test]
    fn save_and_load() {
        let dir = TempDir::new("utils").unwrap();
        let path = dir.path().join("tree.bin");
        let tree = SphericalTree::from_points((0..20).map(|i| ([i as f64, 0.0, 1.0], i)));
        save_tree(&path, &tree).unwrap();
        let back: SphericalTree = load_tree(&path).unwrap();
        assert_eq!(back.len(), 20);
        assert_eq!(back.nearest_neighbour([7.2, 0.0, 1.0]).unwrap().payload, 7);
        assert!(load_tree::<2, usize, _>(&path).unwrap_err().is_format_error());
        assert!(load_tree::<3, usize, _>(dir.path().join("missing.bin"))
            .unwrap_err()
            .is_io_error());
    }
}
