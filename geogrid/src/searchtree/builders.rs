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

//! Turning grids into search trees.

use super::tree::{PlanarTree, SphericalTree, DEFAULT_LEAF_SIZE};
use crate::errors::{GeogridError, GeogridResult};
use gridcloud::errors::ParsingError;
use gridcloud::{Grid, GridSpec, LatLon, EARTH_RADIUS};
use log::info;
use pbr::ProgressBar;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fs::read_to_string;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use yaml_rust::{Yaml, YamlLoader};

/// How geographic points are placed in the space the tree searches.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Embedding {
    /// `(lon, lat)` in degrees, searched with the plane metric. Cheap but wrong near the
    /// poles and across the date line.
    Planar,
    /// Points on a sphere, searched by chord length.
    Sphere {
        /// In whatever unit distances should come back in
        radius: f64,
    },
    /// Points on an ellipsoid of revolution, searched by chord length.
    Ellipsoid {
        /// Semi-major axis
        a: f64,
        /// Semi-minor axis
        b: f64,
    },
}

impl Default for Embedding {
    fn default() -> Embedding {
        Embedding::Sphere {
            radius: EARTH_RADIUS,
        }
    }
}

impl Embedding {
    /// 2 for planar, 3 otherwise
    pub fn dimension(&self) -> usize {
        match self {
            Embedding::Planar => 2,
            _ => 3,
        }
    }

    /// Coordinates in 3D. A planar embedding falls back to the earth sphere here.
    pub fn spatial(&self, p: &LatLon) -> [f64; 3] {
        match *self {
            Embedding::Planar => p.to_point3(EARTH_RADIUS).into(),
            Embedding::Sphere { radius } => p.to_point3(radius).into(),
            Embedding::Ellipsoid { a, b } => p.to_point3_ellipsoid(a, b).into(),
        }
    }

    /// Coordinates in the plane, `[lon, lat]`.
    pub fn planar(&self, p: &LatLon) -> [f64; 2] {
        p.to_point2().into()
    }
}

/// A tree built over a grid, in whichever space the builder's embedding asked for. The
/// payload of every point is its index in the grid.
#[derive(Clone, Debug)]
pub enum GridTree {
    /// Built with [`Embedding::Planar`]
    Planar(Arc<PlanarTree>),
    /// Built with a sphere or ellipsoid
    Spherical(Arc<SphericalTree>),
}

impl GridTree {
    ///
    pub fn len(&self) -> usize {
        match self {
            GridTree::Planar(t) => t.len(),
            GridTree::Spherical(t) => t.len(),
        }
    }

    ///
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held by the tree
    pub fn footprint(&self) -> usize {
        match self {
            GridTree::Planar(t) => t.footprint(),
            GridTree::Spherical(t) => t.footprint(),
        }
    }

    ///
    pub fn dimension(&self) -> usize {
        match self {
            GridTree::Planar(_) => 2,
            GridTree::Spherical(_) => 3,
        }
    }
}

#[derive(Serialize)]
struct TreeParameters<'a> {
    leaf_size: usize,
    embedding: &'a Embedding,
}

/// A construction object for search trees over grids.
///
/// ```yaml
/// ---
/// leaf_size: 16
/// embedding: ellipsoid
/// semi_major: 6378137.0
/// semi_minor: 6356752.314245
/// verbosity: 2
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SearchTreeBuilder {
    pub(crate) leaf_size: usize,
    pub(crate) embedding: Embedding,
    pub(crate) verbosity: u32,
}

impl Default for SearchTreeBuilder {
    fn default() -> SearchTreeBuilder {
        SearchTreeBuilder {
            leaf_size: DEFAULT_LEAF_SIZE,
            embedding: Embedding::default(),
            verbosity: 0,
        }
    }
}

impl SearchTreeBuilder {
    /// Creates a new builder with sensible defaults: leaves of 16 points on the earth sphere.
    pub fn new() -> SearchTreeBuilder {
        SearchTreeBuilder::default()
    }

    /// Creates a builder from a yaml file. Keys that are absent keep their defaults.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> GeogridResult<SearchTreeBuilder> {
        let config = read_to_string(&path)?;
        let file_name = path.as_ref().to_string_lossy();
        let docs = YamlLoader::load_from_str(&config).map_err(|_| {
            GeogridError::ParsingError(ParsingError::MalformedYamlError {
                file_name: file_name.to_string(),
                field: "document".to_string(),
            })
        })?;
        match docs.get(0) {
            Some(doc) => SearchTreeBuilder::from_yaml_doc(doc, &file_name),
            None => Ok(SearchTreeBuilder::default()),
        }
    }

    /// Reads the builder keys out of an already parsed yaml node.
    pub fn from_yaml_doc(params: &Yaml, file_name: &str) -> GeogridResult<SearchTreeBuilder> {
        let malformed = |field: &str| {
            GeogridError::ParsingError(ParsingError::MalformedYamlError {
                file_name: file_name.to_string(),
                field: field.to_string(),
            })
        };
        let missing = |field: &str| {
            GeogridError::ParsingError(ParsingError::MissingYamlError {
                file_name: file_name.to_string(),
                field: field.to_string(),
            })
        };
        let leaf_size = match params["leaf_size"].as_i64() {
            Some(x) if x > 0 => x as usize,
            Some(_) => return Err(malformed("leaf_size")),
            None => DEFAULT_LEAF_SIZE,
        };
        let number = |field: &str| -> GeogridResult<f64> {
            match &params[field] {
                Yaml::Real(_) => params[field].as_f64().ok_or_else(|| malformed(field)),
                Yaml::Integer(i) => Ok(*i as f64),
                Yaml::BadValue | Yaml::Null => Err(missing(field)),
                _ => Err(malformed(field)),
            }
        };
        let embedding = match params["embedding"].as_str().unwrap_or("sphere") {
            "planar" => Embedding::Planar,
            "sphere" => Embedding::Sphere {
                radius: number("radius").or_else(|e| match e {
                    GeogridError::ParsingError(ParsingError::MissingYamlError { .. }) => {
                        Ok(EARTH_RADIUS)
                    }
                    e => Err(e),
                })?,
            },
            "ellipsoid" => Embedding::Ellipsoid {
                a: number("semi_major")?,
                b: number("semi_minor")?,
            },
            _ => return Err(malformed("embedding")),
        };
        let verbosity = match &params["verbosity"] {
            Yaml::Integer(x) => u32::try_from(*x).map_err(|_| malformed("verbosity"))?,
            Yaml::BadValue | Yaml::Null => 0,
            _ => return Err(malformed("verbosity")),
        };
        Ok(SearchTreeBuilder {
            leaf_size,
            embedding,
            verbosity,
        })
    }

    /// Points per leaf, at least one.
    pub fn set_leaf_size(&mut self, x: usize) -> &mut Self {
        self.leaf_size = x.max(1);
        self
    }
    /// See [`Embedding`]
    pub fn set_embedding(&mut self, x: Embedding) -> &mut Self {
        self.embedding = x;
        self
    }
    /// Above 1 a progress bar is drawn while points are gathered.
    pub fn set_verbosity(&mut self, x: u32) -> &mut Self {
        self.verbosity = x;
        self
    }

    ///
    pub fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    ///
    pub fn embedding(&self) -> Embedding {
        self.embedding
    }

    ///
    pub fn verbosity(&self) -> u32 {
        self.verbosity
    }

    /// The parameters that change the tree that gets built, as JSON. Verbosity is left out.
    pub fn parameters_json(&self) -> GeogridResult<String> {
        serde_json::to_string(&TreeParameters {
            leaf_size: self.leaf_size,
            embedding: &self.embedding,
        })
        .map_err(|_| {
            GeogridError::ParsingError(ParsingError::RegularParsingError(
                "unable to serialise tree parameters",
            ))
        })
    }

    fn gather<T, I, F>(&self, points: I, embed: F) -> Vec<(T, usize)>
    where
        I: IntoIterator<Item = LatLon>,
        F: Fn(&LatLon) -> T,
    {
        let points = points.into_iter();
        let mut gathered = Vec::with_capacity(points.size_hint().0);
        if self.verbosity > 1 {
            let mut pb = ProgressBar::new(points.size_hint().0 as u64);
            pb.format("╢▌▌░╟");
            for (i, p) in points.enumerate() {
                gathered.push((embed(&p), i));
                if i % 4096 == 4095 {
                    pb.add(4096);
                }
            }
            pb.finish();
        } else {
            gathered.extend(points.enumerate().map(|(i, p)| (embed(&p), i)));
        }
        gathered
    }

    /// A planar tree over `points`, payloads counting up from zero.
    pub fn build_planar<I: IntoIterator<Item = LatLon>>(&self, points: I) -> PlanarTree {
        let now = Instant::now();
        let embedding = self.embedding;
        let gathered = self.gather(points, |p| embedding.planar(p));
        let mut tree = PlanarTree::with_leaf_size(self.leaf_size);
        tree.build(gathered);
        info!(
            "built planar tree over {} points in {:?}",
            tree.len(),
            now.elapsed()
        );
        tree
    }

    /// A 3D tree over `points`, payloads counting up from zero.
    pub fn build_spherical<I: IntoIterator<Item = LatLon>>(&self, points: I) -> SphericalTree {
        let now = Instant::now();
        let embedding = self.embedding;
        let gathered = self.gather(points, |p| embedding.spatial(p));
        let mut tree = SphericalTree::with_leaf_size(self.leaf_size);
        tree.build(gathered);
        info!(
            "built spherical tree over {} points in {:?}",
            tree.len(),
            now.elapsed()
        );
        tree
    }

    /// Points through the builder's embedding, into the matching kind of tree.
    pub fn build_from_points<I: IntoIterator<Item = LatLon>>(&self, points: I) -> GridTree {
        match self.embedding {
            Embedding::Planar => GridTree::Planar(Arc::new(self.build_planar(points))),
            _ => GridTree::Spherical(Arc::new(self.build_spherical(points))),
        }
    }

    /// A tree over every point of `grid`, in grid order.
    pub fn build_from_grid(&self, grid: &Grid) -> GridTree {
        self.build_from_points(grid.points())
    }

    /// Lays out the grid a spec describes and indexes its points after the spec's
    /// projections (rotation, precision, ...) have been applied.
    pub fn build_from_spec(&self, spec: &GridSpec) -> GeogridResult<GridTree> {
        let grid = Grid::from_spec(spec)?;
        let points = spec.iter(&grid)?;
        Ok(self.build_from_points(points))
    }

    /// Grid index of the point closest to `p` in a tree this builder made.
    pub fn nearest_grid_point(&self, tree: &GridTree, p: &LatLon) -> GeogridResult<usize> {
        match tree {
            GridTree::Planar(t) => Ok(t.nearest_neighbour(self.embedding.planar(p))?.payload),
            GridTree::Spherical(t) => Ok(t.nearest_neighbour(self.embedding.spatial(p))?.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcloud::{BoundingBox, PixelOrdering};

    #[test]
    fn yaml_parameters() {
        let docs = YamlLoader::load_from_str(
            "leaf_size: 4\nembedding: ellipsoid\nsemi_major: 6378137.0\nsemi_minor: 6356752\nverbosity: 1\n",
        )
        .unwrap();
        let builder = SearchTreeBuilder::from_yaml_doc(&docs[0], "tree.yml").unwrap();
        assert_eq!(builder.leaf_size(), 4);
        assert_eq!(builder.verbosity(), 1);
        assert_eq!(
            builder.embedding(),
            Embedding::Ellipsoid {
                a: 6378137.0,
                b: 6356752.0
            }
        );

        let docs = YamlLoader::load_from_str("embedding: ellipsoid\nsemi_major: 1.0\n").unwrap();
        let err = SearchTreeBuilder::from_yaml_doc(&docs[0], "tree.yml").unwrap_err();
        assert_eq!(err.to_string(), "missing field 'semi_minor' in tree.yml");

        let docs = YamlLoader::load_from_str("embedding: mercator\n").unwrap();
        assert!(SearchTreeBuilder::from_yaml_doc(&docs[0], "tree.yml").is_err());

        let docs = YamlLoader::load_from_str("verbosity: 0\n").unwrap();
        assert_eq!(
            SearchTreeBuilder::from_yaml_doc(&docs[0], "tree.yml").unwrap(),
            SearchTreeBuilder::new()
        );
    }

    #[test]
    fn verbosity_must_fit_a_counter() {
        for doc in ["verbosity: -1\n", "verbosity: 5000000000\n", "verbosity: loud\n"].iter() {
            let docs = YamlLoader::load_from_str(doc).unwrap();
            let err = SearchTreeBuilder::from_yaml_doc(&docs[0], "tree.yml").unwrap_err();
            assert_eq!(err.to_string(), "malformed field 'verbosity' in tree.yml");
        }
        let docs = YamlLoader::load_from_str("leaf_size: 8\n").unwrap();
        let builder = SearchTreeBuilder::from_yaml_doc(&docs[0], "tree.yml").unwrap();
        assert_eq!(builder.verbosity(), 0);
    }

    #[test]
    fn parameters_ignore_verbosity() {
        let mut loud = SearchTreeBuilder::new();
        loud.set_verbosity(3);
        assert_eq!(
            loud.parameters_json().unwrap(),
            SearchTreeBuilder::new().parameters_json().unwrap()
        );
        loud.set_leaf_size(3);
        assert_ne!(
            loud.parameters_json().unwrap(),
            SearchTreeBuilder::new().parameters_json().unwrap()
        );
    }

    #[test]
    fn grid_points_find_themselves() {
        let grid = Grid::from_spec(&GridSpec::healpix(4, PixelOrdering::Nest)).unwrap();
        let mut builder = SearchTreeBuilder::new();
        builder.set_leaf_size(3);
        let tree = builder.build_from_grid(&grid);
        assert_eq!(tree.len(), 192);
        assert_eq!(tree.dimension(), 3);
        for (i, p) in grid.points().enumerate() {
            assert_eq!(builder.nearest_grid_point(&tree, &p).unwrap(), i);
        }

        builder.set_embedding(Embedding::Planar);
        let grid = Grid::from_spec(&GridSpec::regular(8, 4)).unwrap();
        let tree = builder.build_from_grid(&grid);
        assert_eq!(tree.dimension(), 2);
        for (i, p) in grid.points().enumerate() {
            assert_eq!(builder.nearest_grid_point(&tree, &p).unwrap(), i);
        }
    }

    #[test]
    fn specs_are_projected_before_indexing() {
        // Poles left out, every rotated point is a distinct place on the sphere.
        let spec = GridSpec::regular(8, 4)
            .with_bbox(BoundingBox::new(60.0, 0.0, -60.0, 360.0).unwrap())
            .with_rotation(-40.0, 10.0, 0.0);
        let grid = Grid::from_spec(&spec).unwrap();
        let builder = SearchTreeBuilder::new();
        let tree = builder.build_from_spec(&spec).unwrap();
        let rotated: Vec<LatLon> = spec.iter(&grid).unwrap().collect();
        for (i, p) in rotated.iter().enumerate() {
            assert_eq!(builder.nearest_grid_point(&tree, p).unwrap(), i);
        }
    }
}
