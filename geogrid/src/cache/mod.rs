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

//! Build once, reuse across runs.
//!
//! Three kinds of cache share one [`CacheRegistry`]: [`MemoryCache`] holds artifacts in
//! process memory, [`DiskCache`] keeps serialised trees under fingerprint-keyed directories
//! and [`MappedCache`] owns one memory-mapped region. Entries are keyed by [`Fingerprint`].

mod fingerprint;
pub use fingerprint::Fingerprint;

mod registry;
pub use registry::{CacheKind, CacheRegistry, CacheReport, RegisteredCache};

mod memory;
pub use memory::{CachedArtifact, MemoryCache};

mod disk;
pub use disk::{DiskCache, TREE_FILE};

mod mapped;
pub(crate) use mapped::write_atomically;
pub use mapped::{MappedBytes, MappedCache, MappedSearchTree};
