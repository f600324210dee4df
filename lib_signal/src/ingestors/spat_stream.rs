//! # SPaT Live Stream Ingestor
//!
//! Opens the `broadcast` endpoint for one lane group and turns its
//! server-sent events into [`LaneGroupBatch`]es. The service multiplexes
//! several event types on the same connection; only
//! `SignalizedLaneGroupState` carries lane states, everything else is skipped.

use std::fmt;

use futures_util::future;
use futures_util::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::de::Error as _;

use super::sse::{frames, SseFrame};
use super::{BatchStream, EventSource};
use crate::lanes::{LaneEvent, LaneGroupBatch};
use crate::retrieve::{ApiClient, ConnectionError, Credentials};

/// The only event type that carries lane states.
pub const LANE_GROUP_STATE_EVENT: &str = "SignalizedLaneGroupState";

/// Intersection ("spat box") id embedded as the prefix of a lane group id.
pub fn intersection_id(lane_group_id: &str) -> &str {
    lane_group_id.split('_').next().unwrap_or(lane_group_id)
}

/// Path of the live broadcast endpoint for a lane group.
pub fn stream_path(lane_group_id: &str) -> String {
    format!(
        "/spatmap/spat-ui-backend/v1/live-data/spatBoxes/{}/laneGroups/{}/broadcast",
        intersection_id(lane_group_id),
        lane_group_id
    )
}

/// Decodes a frame into a batch. Frames of other event types give `Ok(None)`.
///
/// The payload is a JSON array; only its first element (the list of lane
/// event tuples) is used.
pub fn decode_batch(lane_group_id: &str, frame: &SseFrame) -> Result<Option<LaneGroupBatch>, serde_json::Error> {
    if frame.event_type() != LANE_GROUP_STATE_EVENT {
        return Ok(None);
    }

    let payload: Vec<serde_json::Value> = serde_json::from_str(&frame.data)?;
    let first = payload
        .into_iter()
        .next()
        .ok_or_else(|| serde_json::Error::custom("empty SignalizedLaneGroupState payload"))?;
    let events: Vec<LaneEvent> = serde_json::from_value(first)?;

    Ok(Some(LaneGroupBatch::new(lane_group_id, events)))
}

/// Decodes an already-open SSE body into batches.
///
/// Frames that fail to decode are logged and skipped. A transport error ends
/// the stream the same way a remote close does.
pub fn batches<S, B, E>(lane_group_id: String, bytes: S) -> BatchStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    frames(Box::pin(bytes))
        .filter_map(move |item| {
            let batch: Option<Result<LaneGroupBatch, ConnectionError>> = match item {
                Ok(frame) => match decode_batch(&lane_group_id, &frame) {
                    Ok(Some(batch)) => Some(Ok(batch)),
                    Ok(None) => {
                        log::trace!("Skipping '{}' event on {}", frame.event_type(), lane_group_id);
                        None
                    }
                    Err(e) => {
                        log::warn!("Undecodable lane group state on {}: {}", lane_group_id, e);
                        None
                    }
                },
                Err(e) => {
                    log::warn!("Live stream for {} interrupted: {}", lane_group_id, e);
                    None
                }
            };
            future::ready(batch)
        })
        .boxed()
}

/// [`EventSource`] backed by the real SPaT service.
#[derive(Debug, Clone)]
pub struct SpatStreamClient {
    api: ApiClient,
    credentials: Credentials,
}

impl SpatStreamClient {
    /// Creates a client; a token is fetched each time a stream is opened.
    pub fn new(api: ApiClient, credentials: Credentials) -> Self {
        Self { api, credentials }
    }
}

impl EventSource for SpatStreamClient {
    fn open(&self, lane_group_id: &str) -> BatchStream {
        let api = self.api.clone();
        let credentials = self.credentials.clone();
        let lane_group_id = lane_group_id.to_string();

        let connect = async move {
            let token = credentials.bearer(&api).await?;
            log::info!("Opening live stream for lane group {} on {}", lane_group_id, api.base_url());
            let response = api
                .with_auth_token(token)
                .open_stream(&stream_path(&lane_group_id))
                .await?;
            log::debug!("Live stream for {} established ({})", lane_group_id, response.status());
            Ok::<_, ConnectionError>(batches(lane_group_id, response.bytes_stream()))
        };

        stream::once(connect).try_flatten().boxed()
    }
}
