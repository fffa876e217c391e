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

//! Cache keys. A fingerprint is the hex SHA-256 of everything that decides what gets built.

use crate::errors::{GeogridError, GeogridResult};
use crate::format::FORMAT_VERSION;
use crate::searchtree::SearchTreeBuilder;
use gridcloud::errors::ParsingError;
use gridcloud::{GridSpec, GridType, PixelOrdering};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

const HEX_LEN: usize = 64;

/// Key of a cache entry: 64 lowercase hex digits, safe to use as a directory name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest of raw bytes.
    pub fn of_bytes(data: &[u8]) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Fingerprint(hex::encode(hasher.finalize()))
    }

    /// Key of a grid product, from the JSON form of its spec.
    pub fn of_spec(spec: &GridSpec) -> GeogridResult<Fingerprint> {
        let mut hasher = Sha256::new();
        hasher.update(b"grid:");
        hasher.update(canonical_json(spec)?.as_bytes());
        Ok(Fingerprint(hex::encode(hasher.finalize())))
    }

    /// Key of the search tree `builder` makes over the grid `spec` describes. Covers the
    /// spec, the tree parameters and the serialisation format version.
    pub fn of_tree(spec: &GridSpec, builder: &SearchTreeBuilder) -> GeogridResult<Fingerprint> {
        let mut hasher = Sha256::new();
        hasher.update(b"grid:");
        hasher.update(canonical_json(spec)?.as_bytes());
        hasher.update(b"\ntree:");
        hasher.update(builder.parameters_json()?.as_bytes());
        hasher.update(b"\nformat:");
        hasher.update(FORMAT_VERSION.to_string().as_bytes());
        Ok(Fingerprint(hex::encode(hasher.finalize())))
    }

    ///
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// JSON of `spec` with the pixel ordering spelled out, so specs that lay out the same grid
/// share a key. Only HEALPix grids read the ordering, ring when unset.
fn canonical_json(spec: &GridSpec) -> GeogridResult<String> {
    let mut spec = spec.clone();
    if spec.grid_type == GridType::Healpix {
        spec.ordering.get_or_insert(PixelOrdering::Ring);
    } else {
        spec.ordering = None;
    }
    Ok(spec.to_json()?)
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = GeogridError;

    fn from_str(s: &str) -> GeogridResult<Fingerprint> {
        if s.len() == HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            Ok(Fingerprint(s.to_string()))
        } else {
            Err(GeogridError::ParsingError(ParsingError::RegularParsingError(
                "a fingerprint is 64 lowercase hex digits",
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searchtree::Embedding;
    use gridcloud::{BoundingBox, PixelOrdering};

    #[test]
    fn known_digest() {
        assert_eq!(
            Fingerprint::of_bytes(b"abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn equal_inputs_equal_keys() {
        let builder = SearchTreeBuilder::new();
        let a = Fingerprint::of_tree(&GridSpec::octahedral(32), &builder).unwrap();
        let b = Fingerprint::of_tree(&GridSpec::octahedral(32), &builder).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert_eq!(a.to_string().parse::<Fingerprint>().unwrap(), a);
    }

    #[test]
    fn every_parameter_counts() {
        let builder = SearchTreeBuilder::new();
        let base = Fingerprint::of_tree(&GridSpec::healpix(8, PixelOrdering::Ring), &builder).unwrap();
        let specs = vec![
            GridSpec::healpix(16, PixelOrdering::Ring),
            GridSpec::healpix(8, PixelOrdering::Nest),
            GridSpec::healpix(8, PixelOrdering::Ring).with_precision(4),
            GridSpec::healpix(8, PixelOrdering::Ring).with_rotation(-40.0, 10.0, 0.0),
            GridSpec::healpix(8, PixelOrdering::Ring)
                .with_bbox(BoundingBox::new(60.0, 0.0, 0.0, 90.0).unwrap()),
        ];
        for spec in specs.iter() {
            assert_ne!(Fingerprint::of_tree(spec, &builder).unwrap(), base);
        }

        let mut other = SearchTreeBuilder::new();
        other.set_embedding(Embedding::Planar);
        let spec = GridSpec::healpix(8, PixelOrdering::Ring);
        assert_ne!(Fingerprint::of_tree(&spec, &other).unwrap(), base);
        other.set_embedding(Embedding::default()).set_leaf_size(3);
        assert_ne!(Fingerprint::of_tree(&spec, &other).unwrap(), base);
        assert_ne!(Fingerprint::of_spec(&spec).unwrap(), base);
    }

    #[test]
    fn default_ordering_shares_a_key() {
        let builder = SearchTreeBuilder::new();
        let mut unset = GridSpec::healpix(8, PixelOrdering::Ring);
        unset.ordering = None;
        let ring = GridSpec::healpix(8, PixelOrdering::Ring);
        let nest = GridSpec::healpix(8, PixelOrdering::Nest);
        assert_eq!(Fingerprint::of_spec(&unset).unwrap(), Fingerprint::of_spec(&ring).unwrap());
        assert_eq!(
            Fingerprint::of_tree(&unset, &builder).unwrap(),
            Fingerprint::of_tree(&ring, &builder).unwrap()
        );
        assert_ne!(Fingerprint::of_spec(&unset).unwrap(), Fingerprint::of_spec(&nest).unwrap());

        let mut stray = GridSpec::octahedral(8);
        stray.ordering = Some(PixelOrdering::Nest);
        assert_eq!(
            Fingerprint::of_spec(&stray).unwrap(),
            Fingerprint::of_spec(&GridSpec::octahedral(8)).unwrap()
        );
    }

    #[test]
    fn parse_rejects_paths() {
        assert!("../etc".parse::<Fingerprint>().is_err());
        assert!("A".repeat(64).parse::<Fingerprint>().is_err());
        assert!("a".repeat(64).parse::<Fingerprint>().is_ok());
    }
}
