//! # Static Geometry
//!
//! Batch downloads of the map data the live side depends on: intersection
//! locations, app trigger lines and the lane map that [`crate::lanes::LaneIndex`]
//! reads. Everything is kept as raw GeoJSON features and written back out as
//! `FeatureCollection` files.

/// Map-data endpoint client.
pub mod spatmap;
/// GeoJSON file output.
pub mod writer;

pub use spatmap::{spatbox_id, ApiError, SpatMapApi};
pub use writer::{feature_collection, write_feature_collection};
