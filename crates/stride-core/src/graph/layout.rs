//! Deterministic node placement for the plan diagram.
//!
//! Weeks are spread horizontally around the root; workouts stack
//! vertically under their week.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

pub const ROOT_X: f64 = 0.0;
pub const ROOT_Y: f64 = -200.0;
pub const WEEK_SPACING: f64 = 600.0;
pub const NODE_SPACING: f64 = 300.0;
pub const WEEK_ROW_OFFSET: f64 = 150.0;
pub const WORKOUT_ROW_OFFSET: f64 = 400.0;

/// Horizontal center of a four-week layout, in week numbers.
const WEEK_CENTER: f64 = 2.5;

pub const ROOT_POSITION: Position = Position {
    x: ROOT_X,
    y: ROOT_Y,
};

/// Which row of a week column a node sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Week,
    /// 0-based index within the week.
    Workout(usize),
}

pub fn node_position(week_number: i32, slot: Slot) -> Position {
    let x = ROOT_X + (f64::from(week_number) - WEEK_CENTER) * WEEK_SPACING;
    let y = match slot {
        Slot::Week => ROOT_Y + WEEK_ROW_OFFSET,
        Slot::Workout(index) => ROOT_Y + WORKOUT_ROW_OFFSET + index as f64 * NODE_SPACING,
    };
    Position { x, y }
}
