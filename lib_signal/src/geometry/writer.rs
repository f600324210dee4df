use serde_json::{json, Value};
use std::fs;
use std::path::Path;

use super::spatmap::ApiError;

/// Wraps features into a GeoJSON `FeatureCollection`.
pub fn feature_collection(features: Vec<Value>) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

/// Writes `features` as a pretty-printed `FeatureCollection`, creating
/// parent directories as needed.
pub fn write_feature_collection(path: &Path, features: Vec<Value>) -> Result<(), ApiError> {
    let io_err = |source| ApiError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let count = features.len();
    let body = serde_json::to_string_pretty(&feature_collection(features))?;
    fs::write(path, body).map_err(io_err)?;

    log::info!("Wrote {} features to {}", count, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanes::LaneIndex;

    #[test]
    fn written_lane_map_is_readable_by_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("static").join("lanes.json");
        let lane = json!({
            "type": "Feature",
            "properties": {
                "laneId": "A_1",
                "laneGroupId": "A_g",
                "laneType": "VEHICLE",
                "trafficTypes": ["VEHICLE"],
                "connections": [{"maneuvers": ["LEFT_TURN"]}]
            }
        });

        write_feature_collection(&path, vec![lane]).unwrap();

        let lanes = LaneIndex::new(&path).load("A_g").unwrap();
        assert_eq!(lanes["A_1"].direction_label(), "LEFT");
    }
}
