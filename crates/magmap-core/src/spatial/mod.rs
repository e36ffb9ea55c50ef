//! Spatial indexing for scattered samples
//!
//! Provides a kd-tree and a Delaunay triangulation for:
//! - Nearest-sample search (nearest-neighbour gridding, distance masking)
//! - Triangle location (linear and cubic gridding, profiles)

pub mod delaunay;
pub mod kdtree;

pub use delaunay::{Location, Triangulation};
pub use kdtree::{BoundingBox, KdTree, KdTreeConfig};
