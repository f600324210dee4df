//! # Terminal Renderer
//!
//! Prints each batch as a small table, one section per lane type, leftmost
//! lane first. Lanes the static lane map does not know about (typically
//! pedestrian-only signals on a vehicle lane group) are left out.

use std::collections::HashMap;
use std::io::{self, Write};

use chrono::{DateTime, Local};
use colored::Colorize;

use super::HandlerError;
use crate::lanes::{lane_sort_key, LaneEvent, LaneGroupBatch, LaneIndex, LaneProperties, LaneType};

/// A lane event joined with its static properties. `time_left` is normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    /// The event with `time_left` normalized.
    pub event: LaneEvent,
    /// Static properties of the event's lane.
    pub properties: LaneProperties,
}

/// Events of one lane type, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneTypeGroup {
    /// Shared lane type.
    pub lane_type: LaneType,
    /// Events sorted leftmost lane first.
    pub events: Vec<ClassifiedEvent>,
}

/// Joins a batch with the lane index.
///
/// Events are sorted by the numeric lane id suffix, descending (ids without
/// one go last, in arrival order), then grouped by lane type in order of
/// first appearance. Unknown lanes are dropped.
pub fn classify(batch: &LaneGroupBatch, lanes: &HashMap<String, LaneProperties>) -> Vec<LaneTypeGroup> {
    let mut events: Vec<&LaneEvent> = batch.events.iter().collect();
    events.sort_by(|a, b| lane_sort_key(&b.lane_id).cmp(&lane_sort_key(&a.lane_id)));

    let mut groups: Vec<LaneTypeGroup> = Vec::new();
    for event in events {
        let Some(properties) = lanes.get(&event.lane_id) else {
            continue;
        };
        let classified = ClassifiedEvent {
            event: event.normalized(),
            properties: properties.clone(),
        };
        match groups.iter_mut().find(|group| group.lane_type == properties.lane_type) {
            Some(group) => group.events.push(classified),
            None => groups.push(LaneTypeGroup {
                lane_type: properties.lane_type,
                events: vec![classified],
            }),
        }
    }
    groups
}

fn paint_state(state: &str, colorize: bool) -> String {
    if !colorize {
        return state.to_string();
    }
    let upper = state.to_ascii_uppercase();
    if upper.contains("RED") || upper.contains("STOP") {
        state.red().to_string()
    } else if upper.contains("YELLOW") || upper.contains("AMBER") || upper.contains("CLEARANCE") || upper.contains("PRE_MOVEMENT") {
        state.yellow().to_string()
    } else if upper.contains("GREEN") || upper.contains("MOVEMENT_ALLOWED") {
        state.green().to_string()
    } else {
        state.to_string()
    }
}

/// One table row: time left, lane type, signal state, directions, lane id.
pub fn format_row(row: &ClassifiedEvent, colorize: bool) -> String {
    format!(
        "{} \t {} \t {} \t {} \t {}",
        row.event.time_left,
        row.properties.lane_type,
        paint_state(&row.event.signal_state, colorize),
        row.properties.direction_label(),
        row.event.lane_id
    )
}

/// Full screen for one batch, starting with a clear-screen escape and a
/// `dd.mm.YYYY HH:MM:SS` banner and ending with an empty line.
pub fn format_screen(groups: &[LaneTypeGroup], now: DateTime<Local>, colorize: bool) -> String {
    let mut screen = String::from("\x1B[2J\x1B[H");
    screen.push_str(&format!("=== {} ===\n", now.format("%d.%m.%Y %H:%M:%S")));
    for group in groups {
        screen.push_str(&format!("--- {} ---\n", group.lane_type));
        for row in &group.events {
            screen.push_str(&format_row(row, colorize));
            screen.push('\n');
        }
    }
    screen.push('\n');
    screen
}

/// Handler that redraws the terminal on every batch.
pub struct TerminalRenderer {
    index: LaneIndex,
    out: Box<dyn Write + Send>,
    colorize: bool,
}

impl TerminalRenderer {
    /// Renderer writing colored output to stdout.
    pub fn stdout(index: LaneIndex) -> Self {
        Self::new(index, Box::new(io::stdout()), true)
    }

    /// Renderer writing to an arbitrary sink.
    pub fn new(index: LaneIndex, out: Box<dyn Write + Send>, colorize: bool) -> Self {
        Self { index, out, colorize }
    }

    /// Reloads the lane index for the group and redraws.
    pub fn render(&mut self, lane_group_id: &str, batch: &LaneGroupBatch) -> Result<(), HandlerError> {
        let lanes = self.index.load(lane_group_id)?;
        let groups = classify(batch, &lanes);
        let shown: usize = groups.iter().map(|group| group.events.len()).sum();
        log::trace!("Rendering {} of {} lane events for {}", shown, batch.len(), lane_group_id);

        self.out
            .write_all(format_screen(&groups, Local::now(), self.colorize).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanes::LaneDirection;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn lane(lane_id: &str, lane_type: LaneType, directions: &[LaneDirection]) -> (String, LaneProperties) {
        (
            lane_id.to_string(),
            LaneProperties {
                lane_id: lane_id.to_string(),
                directions: directions.iter().copied().collect::<BTreeSet<_>>(),
                lane_type,
            },
        )
    }

    #[test]
    fn single_vehicle_lane_scenario() {
        let lanes: HashMap<_, _> = [lane("A_1", LaneType::Vehicle, &[LaneDirection::Left])].into();
        let batch = LaneGroupBatch::new("A_g", vec![LaneEvent::new("A_1", "RED", 30, "t")]);

        let groups = classify(&batch, &lanes);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].lane_type, LaneType::Vehicle);
        assert_eq!(format_row(&groups[0].events[0], false), "30 \t VEHICLE \t RED \t LEFT \t A_1");
    }

    #[test]
    fn sentinel_time_left_is_shown_as_minus_one() {
        let lanes: HashMap<_, _> = [lane("A_1", LaneType::Vehicle, &[LaneDirection::Straight])].into();
        let batch = LaneGroupBatch::new("A_g", vec![LaneEvent::new("A_1", "DARK", 255, "t")]);

        let groups = classify(&batch, &lanes);
        assert_eq!(groups[0].events[0].event.time_left, -1);
    }

    #[test]
    fn unknown_lanes_are_dropped_but_not_from_the_batch() {
        let lanes: HashMap<_, _> = [lane("A_1", LaneType::Vehicle, &[LaneDirection::Left])].into();
        let batch = LaneGroupBatch::new(
            "A_g",
            vec![LaneEvent::new("A_1", "RED", 30, "t"), LaneEvent::new("A_9", "GREEN", 4, "t")],
        );

        let groups = classify(&batch, &lanes);
        let shown: usize = groups.iter().map(|g| g.events.len()).sum();
        assert_eq!(shown, 1);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn sorted_leftmost_first_and_grouped_by_first_seen_type() {
        let lanes: HashMap<_, _> = [
            lane("A_2", LaneType::Vehicle, &[LaneDirection::Straight]),
            lane("A_10", LaneType::Vehicle, &[LaneDirection::Left]),
            lane("A_5", LaneType::Crosswalk, &[]),
            lane("A_1", LaneType::BikeLane, &[LaneDirection::Right, LaneDirection::Straight]),
        ]
        .into();
        let batch = LaneGroupBatch::new(
            "A_g",
            vec![
                LaneEvent::new("A_1", "GREEN", 10, "t"),
                LaneEvent::new("A_2", "RED", 20, "t"),
                LaneEvent::new("A_5", "RED", 7, "t"),
                LaneEvent::new("A_10", "RED", 40, "t"),
            ],
        );

        let groups = classify(&batch, &lanes);
        let order: Vec<(LaneType, Vec<&str>)> = groups
            .iter()
            .map(|g| (g.lane_type, g.events.iter().map(|e| e.event.lane_id.as_str()).collect()))
            .collect();

        assert_eq!(
            order,
            vec![
                (LaneType::Vehicle, vec!["A_10", "A_2"]),
                (LaneType::Crosswalk, vec!["A_5"]),
                (LaneType::BikeLane, vec!["A_1"]),
            ]
        );
        assert_eq!(format_row(&groups[1].events[0], false), "7 \t CROSSWALK \t RED \t N/A \t A_5");
        assert_eq!(format_row(&groups[2].events[0], false), "10 \t BIKE_LANE \t GREEN \t RIGHT, STRAIGHT \t A_1");
    }

    #[test]
    fn screen_has_banner_headers_and_trailing_blank_line() {
        let lanes: HashMap<_, _> = [lane("A_1", LaneType::Vehicle, &[LaneDirection::Left])].into();
        let batch = LaneGroupBatch::new("A_g", vec![LaneEvent::new("A_1", "RED", 30, "t")]);
        let now = Local.with_ymd_and_hms(2024, 5, 1, 8, 15, 0).unwrap();

        let screen = format_screen(&classify(&batch, &lanes), now, false);
        let lines: Vec<&str> = screen.trim_start_matches("\x1B[2J\x1B[H").lines().collect();

        assert_eq!(lines, vec!["=== 01.05.2024 08:15:00 ===", "--- VEHICLE ---", "30 \t VEHICLE \t RED \t LEFT \t A_1", ""]);
    }
}
