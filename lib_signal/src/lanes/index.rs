//! # Lane Metadata Index
//!
//! Reads the lane map written by `get-lane-map` (a GeoJSON `FeatureCollection`)
//! and derives, for every lane of one lane group, the directions it serves and
//! what kind of lane it is. The live renderer uses this to drop lanes it cannot
//! classify and to label the rest.

#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A turn direction a lane connects to.
///
/// Ordered `Left < Right < Straight` so direction sets always print the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LaneDirection {
    /// Maneuver names containing `LEFT`.
    Left,
    /// Maneuver names containing `RIGHT`.
    Right,
    /// Maneuver names containing `STRAIGHT`.
    Straight,
}

impl LaneDirection {
    /// Upper-case name as used by the service.
    pub fn as_str(&self) -> &'static str {
        match self {
            LaneDirection::Left => "LEFT",
            LaneDirection::Right => "RIGHT",
            LaneDirection::Straight => "STRAIGHT",
        }
    }

    /// Direction implied by a maneuver string. `LEFT` is tested first, then
    /// `RIGHT`, then `STRAIGHT`; the first hit wins.
    pub fn from_maneuver(maneuver: &str) -> Option<Self> {
        [LaneDirection::Left, LaneDirection::Right, LaneDirection::Straight]
            .into_iter()
            .find(|direction| maneuver.contains(direction.as_str()))
    }
}

impl fmt::Display for LaneDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of lane kinds the service reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LaneType {
    /// Regular car lane.
    Vehicle,
    /// Pedestrian crossing.
    Crosswalk,
    /// Bicycle lane.
    BikeLane,
    /// Tram / light rail lane.
    TrackedVehicle,
}

impl LaneType {
    /// Upper-case name as used by the service.
    pub fn as_str(&self) -> &'static str {
        match self {
            LaneType::Vehicle => "VEHICLE",
            LaneType::Crosswalk => "CROSSWALK",
            LaneType::BikeLane => "BIKE_LANE",
            LaneType::TrackedVehicle => "TRACKED_VEHICLE",
        }
    }
}

impl fmt::Display for LaneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lane type string outside the known enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized lane type '{value}'")]
pub struct ClassificationError {
    /// The value as found in the lane map.
    pub value: String,
}

impl FromStr for LaneType {
    type Err = ClassificationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "VEHICLE" => Ok(LaneType::Vehicle),
            "CROSSWALK" => Ok(LaneType::Crosswalk),
            "BIKE_LANE" => Ok(LaneType::BikeLane),
            "TRACKED_VEHICLE" => Ok(LaneType::TrackedVehicle),
            other => Err(ClassificationError { value: other.to_string() }),
        }
    }
}

/// Failure to read the persisted lane map at all.
#[derive(Debug, Error)]
pub enum LaneIndexError {
    /// The file could not be read.
    #[error("failed to read lane map {path}: {source}")]
    Io {
        /// Path that was tried.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a feature collection.
    #[error("failed to parse lane map {path}: {source}")]
    Parse {
        /// Path that was tried.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Static properties of one classified lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaneProperties {
    /// Lane id as used in live events.
    pub lane_id: String,
    /// Distinct directions reachable from this lane.
    pub directions: BTreeSet<LaneDirection>,
    /// What kind of lane this is.
    pub lane_type: LaneType,
}

impl LaneProperties {
    /// Direction column text: `N/A` for crosswalks, otherwise the directions
    /// joined with `", "`.
    pub fn direction_label(&self) -> String {
        match self.lane_type {
            LaneType::Crosswalk => "N/A".to_string(),
            LaneType::Vehicle | LaneType::TrackedVehicle | LaneType::BikeLane => self
                .directions
                .iter()
                .map(LaneDirection::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LaneMapFile {
    #[serde(default)]
    features: Vec<LaneFeature>,
}

#[derive(Debug, Deserialize)]
struct LaneFeature {
    #[serde(default)]
    properties: Option<LaneFeatureProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LaneFeatureProperties {
    lane_id: Option<String>,
    lane_group_id: Option<String>,
    lane_type: Option<String>,
    #[serde(default)]
    connections: Vec<LaneConnection>,
}

#[derive(Debug, Deserialize)]
struct LaneConnection {
    #[serde(default)]
    maneuvers: Vec<String>,
}

/// Handle on the persisted lane map. Every [`LaneIndex::load`] re-reads the file.
#[derive(Debug, Clone)]
pub struct LaneIndex {
    path: PathBuf,
}

impl LaneIndex {
    /// Points the index at a lane map file (usually `static/lanes.json`).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the lane map.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the properties of every classifiable lane in `lane_group_id`.
    ///
    /// Lanes with an unknown type are logged and left out; only an unreadable
    /// or malformed file fails the whole load.
    pub fn load(&self, lane_group_id: &str) -> Result<HashMap<String, LaneProperties>, LaneIndexError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| LaneIndexError::Io {
            path: self.path.clone(),
            source,
        })?;
        Self::parse(&raw, lane_group_id).map_err(|source| LaneIndexError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Same as [`LaneIndex::load`] but on an in-memory document.
    pub fn parse(raw: &str, lane_group_id: &str) -> Result<HashMap<String, LaneProperties>, serde_json::Error> {
        let lane_map: LaneMapFile = serde_json::from_str(raw)?;
        let mut lanes = HashMap::new();

        for properties in lane_map.features.into_iter().filter_map(|feature| feature.properties) {
            if properties.lane_group_id.as_deref() != Some(lane_group_id) {
                continue;
            }
            let Some(lane_id) = properties.lane_id else {
                log::debug!("Skipping feature without laneId in lane group {}", lane_group_id);
                continue;
            };

            let lane_type = match properties.lane_type.as_deref().unwrap_or_default().parse::<LaneType>() {
                Ok(lane_type) => lane_type,
                Err(e) => {
                    log::warn!("Lane {} excluded from index: {}", lane_id, e);
                    continue;
                }
            };

            let directions = properties
                .connections
                .iter()
                .flat_map(|connection| connection.maneuvers.iter())
                .filter_map(|maneuver| LaneDirection::from_maneuver(maneuver))
                .collect();

            lanes.insert(
                lane_id.clone(),
                LaneProperties {
                    lane_id,
                    directions,
                    lane_type,
                },
            );
        }

        Ok(lanes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lane_feature(lane_id: &str, group: &str, lane_type: &str, maneuvers: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": [[8.65, 49.87], [8.66, 49.88]] },
            "properties": {
                "laneId": lane_id,
                "laneGroupId": group,
                "laneType": lane_type,
                "trafficTypes": ["CAR"],
                "connections": [{ "maneuvers": maneuvers }]
            }
        })
    }

    fn collection(features: Vec<serde_json::Value>) -> String {
        serde_json::json!({ "type": "FeatureCollection", "features": features }).to_string()
    }

    #[test]
    fn maneuver_maps_to_first_matching_direction() {
        assert_eq!(LaneDirection::from_maneuver("LEFT_TURN"), Some(LaneDirection::Left));
        assert_eq!(LaneDirection::from_maneuver("RIGHT_TURN_ON_RED"), Some(LaneDirection::Right));
        assert_eq!(LaneDirection::from_maneuver("STRAIGHT"), Some(LaneDirection::Straight));
        assert_eq!(LaneDirection::from_maneuver("STRAIGHT_OR_LEFT"), Some(LaneDirection::Left));
        assert_eq!(LaneDirection::from_maneuver("U_TURN"), None);
    }

    #[test]
    fn only_requested_group_is_indexed() {
        let raw = collection(vec![
            lane_feature("A_1", "A_g1", "VEHICLE", &["LEFT_TURN"]),
            lane_feature("A_2", "A_g2", "VEHICLE", &["STRAIGHT"]),
        ]);
        let lanes = LaneIndex::parse(&raw, "A_g1").unwrap();

        assert_eq!(lanes.len(), 1);
        let lane = &lanes["A_1"];
        assert_eq!(lane.lane_type, LaneType::Vehicle);
        assert_eq!(lane.direction_label(), "LEFT");
    }

    #[test]
    fn duplicate_directions_collapse() {
        let raw = collection(vec![lane_feature(
            "A_1",
            "A_g1",
            "VEHICLE",
            &["LEFT_TURN", "LEFT_TURN_ON_RED", "STRAIGHT"],
        )]);
        let lane = &LaneIndex::parse(&raw, "A_g1").unwrap()["A_1"];

        assert_eq!(lane.directions.len(), 2);
        assert_eq!(lane.direction_label(), "LEFT, STRAIGHT");
    }

    #[test]
    fn unknown_lane_type_skips_only_that_lane() {
        let raw = collection(vec![
            lane_feature("A_1", "A_g1", "HOVERCRAFT", &["LEFT_TURN"]),
            lane_feature("A_2", "A_g1", "CROSSWALK", &[]),
        ]);
        let lanes = LaneIndex::parse(&raw, "A_g1").unwrap();

        assert!(!lanes.contains_key("A_1"));
        assert_eq!(lanes["A_2"].lane_type, LaneType::Crosswalk);
        assert_eq!(lanes["A_2"].direction_label(), "N/A");
    }

    #[test]
    fn lane_type_parse_reports_the_value() {
        let err = "MONORAIL".parse::<LaneType>().unwrap_err();
        assert_eq!(err.value, "MONORAIL");
        assert_eq!("BIKE_LANE".parse::<LaneType>().unwrap(), LaneType::BikeLane);
        assert_eq!("TRACKED_VEHICLE".parse::<LaneType>().unwrap(), LaneType::TrackedVehicle);
    }

    #[test]
    fn load_reads_file_and_reports_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", collection(vec![lane_feature("B_3", "B_g", "BIKE_LANE", &["RIGHT_TURN"])])).unwrap();

        let lanes = LaneIndex::new(file.path()).load("B_g").unwrap();
        assert_eq!(lanes["B_3"].direction_label(), "RIGHT");

        let missing_path = file.path().with_extension("missing");
        let index = LaneIndex::new(&missing_path);
        assert_eq!(index.path(), missing_path.as_path());
        let missing = index.load("B_g");
        assert!(matches!(missing, Err(LaneIndexError::Io { ref path, .. }) if path == &missing_path));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let result = LaneIndex::new(file.path()).load("B_g");
        assert!(matches!(result, Err(LaneIndexError::Parse { .. })));
    }
}
