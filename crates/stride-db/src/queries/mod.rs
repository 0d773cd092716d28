//! Query functions grouped by table.

pub mod selections;
pub mod users;
pub mod workouts;
