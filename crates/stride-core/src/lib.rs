//! Plan generation, plan graph construction, and the plan service and
//! action layers built on top of `stride-db`.

pub mod actions;
pub mod budget;
pub mod error;
pub mod graph;
pub mod plan;
pub mod rng;
