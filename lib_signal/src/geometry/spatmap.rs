use reqwest::Method;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

use crate::retrieve::{ApiClient, ConnectionError, Credentials};

const SPATBOXES_PATH: &str = "/spatmap/spat-ui-backend/v1/map-data/spatBoxes";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Map data request failed: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Unexpected map data from {path}: {reason}")]
    Shape { path: String, reason: String },
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to encode feature collection: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Intersection id of a `spatBoxes` feature (`properties.spatboxId`).
pub fn spatbox_id(feature: &Value) -> Option<&str> {
    feature["properties"]["spatboxId"].as_str()
}

fn is_point(feature: &Value) -> bool {
    feature["geometry"]["type"].as_str() == Some("Point")
}

fn is_lane(feature: &Value) -> bool {
    feature["properties"].get("trafficTypes").is_some()
}

/// Authenticated client for the map-data endpoints.
pub struct SpatMapApi {
    client: ApiClient,
}

impl SpatMapApi {
    /// Fetches one token up front and reuses it for every call.
    pub async fn connect(api: &ApiClient, credentials: &Credentials) -> Result<Self, ApiError> {
        let token = credentials.bearer(api).await?;
        Ok(Self {
            client: api.with_auth_token(token),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        log::debug!("GET {}", path);
        let response = self
            .client
            .request::<Value, ()>(Method::GET, path, query, None, None)
            .await?;
        Ok(response.into_data()?)
    }

    /// Intersections inside `bbox`. The endpoint mixes intersection points
    /// with trigger areas; only the `Point` features are kept.
    pub async fn get_intersections(&self, bbox: &str) -> Result<Vec<Value>, ApiError> {
        let body = self.get_json(SPATBOXES_PATH, &[("bbox", bbox)]).await?;
        let collections = body.as_array().ok_or_else(|| ApiError::Shape {
            path: SPATBOXES_PATH.to_string(),
            reason: "expected an array of feature collections".to_string(),
        })?;

        let intersections: Vec<Value> = collections
            .iter()
            .filter_map(|collection| collection["features"].as_array())
            .flatten()
            .filter(|feature| is_point(feature))
            .cloned()
            .collect();
        log::info!("Found {} intersections", intersections.len());
        Ok(intersections)
    }

    /// Trigger lines of one intersection, as returned.
    pub async fn get_trigger_lines(&self, box_id: &str) -> Result<Vec<Value>, ApiError> {
        let path = format!("{}/{}/triggerline", SPATBOXES_PATH, box_id);
        match self.get_json(&path, &[]).await? {
            Value::Array(features) => Ok(features),
            _ => Err(ApiError::Shape {
                path,
                reason: "expected an array of features".to_string(),
            }),
        }
    }

    /// Lane features of one intersection: those of the first returned
    /// collection whose properties carry `trafficTypes`.
    pub async fn get_lane_map(&self, box_id: &str) -> Result<Vec<Value>, ApiError> {
        let path = format!("{}/{}/signalizedIntersectionMap", SPATBOXES_PATH, box_id);
        let body = self.get_json(&path, &[]).await?;
        let features = body[0]["features"].as_array().ok_or_else(|| ApiError::Shape {
            path: path.clone(),
            reason: "expected [FeatureCollection, ...]".to_string(),
        })?;

        Ok(features.iter().filter(|feature| is_lane(feature)).cloned().collect())
    }
}
