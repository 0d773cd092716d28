//! Plan graph construction.
//!
//! Turns a user's live selections into the node/edge structure the plan
//! diagram renders: a root node, one node per week, and a chain of workout
//! nodes under each week. The graph is never stored; it is rebuilt from the
//! selections on every read.

pub mod layout;

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use stride_db::models::{FitnessLevel, PlannedWorkout, WorkoutType};

use crate::budget::UserConstraints;
use layout::{Position, ROOT_POSITION, Slot, node_position};

pub const ROOT_NODE_ID: &str = "root";

/// Stroke for root-to-week edges.
pub const ROOT_EDGE_COLOR: &str = "black";
/// Stroke for workout edges in a week at or over its session cap.
pub const FULL_WEEK_COLOR: &str = "#ef4444";
/// Stroke for workout edges in a week with room left.
pub const OPEN_WEEK_COLOR: &str = "#262626";
pub const EDGE_WIDTH: u32 = 4;
pub const EDGE_TYPE: &str = "smoothstep";

/// Root-node output handles, one per week column.
const ROOT_HANDLES: [&str; 4] = ["a", "b", "c", "d"];

/// Payload carried by a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeData {
    Root {
        fitness_level: FitnessLevel,
        stress_budget: i32,
        sessions_per_week: i32,
    },
    Week {
        week_number: i32,
        weekly_total_stress: i32,
        session_count: usize,
        sessions_per_week: i32,
        week_full: bool,
    },
    Workout {
        selected_id: Uuid,
        user_id: Uuid,
        workout_id: String,
        name: String,
        description: String,
        workout_type: WorkoutType,
        duration: i32,
        stress: i32,
    },
}

impl NodeData {
    /// Renderer key: `parent`, `week`, or the workout type.
    pub fn node_type(&self) -> &'static str {
        match self {
            Self::Root { .. } => "parent",
            Self::Week { .. } => "week",
            Self::Workout { workout_type, .. } => workout_type.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: &'static str,
    pub data: NodeData,
    pub position: Position,
}

impl Node {
    pub fn new(id: impl Into<String>, data: NodeData, position: Position) -> Self {
        Self {
            id: id.into(),
            node_type: data.node_type(),
            data,
            position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    pub stroke_width: u32,
    pub stroke: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<&'static str>,
    #[serde(rename = "type")]
    pub edge_type: &'static str,
    pub style: EdgeStyle,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl PlanGraph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }
}

pub fn week_node_id(week_number: i32) -> String {
    format!("week-{week_number}")
}

pub fn workout_node_id(week_number: i32, index: usize) -> String {
    format!("node-{week_number}-{index}")
}

/// Build the plan graph from live selections.
///
/// Weeks are emitted in ascending order. Within a week, workouts keep their
/// input order after a stable sort on position. A week is full when it holds
/// at least `sessions_per_week` workouts; its workout edges are then drawn
/// in [`FULL_WEEK_COLOR`].
pub fn build_graph(selections: &[PlannedWorkout], constraints: &UserConstraints) -> PlanGraph {
    let mut graph = PlanGraph::default();

    graph.nodes.push(Node::new(
        ROOT_NODE_ID,
        NodeData::Root {
            fitness_level: constraints.fitness_level,
            stress_budget: constraints.stress_budget,
            sessions_per_week: constraints.sessions_per_week,
        },
        ROOT_POSITION,
    ));

    let mut by_week: BTreeMap<i32, Vec<&PlannedWorkout>> = BTreeMap::new();
    for selection in selections {
        by_week.entry(selection.week_number).or_default().push(selection);
    }

    for (week_index, (week_number, mut workouts)) in by_week.into_iter().enumerate() {
        workouts.sort_by_key(|w| w.position_in_week);

        let weekly_total_stress: i32 = workouts.iter().map(|w| w.stress).sum();
        let week_full = workouts.len() as i64 >= i64::from(constraints.sessions_per_week);
        let week_id = week_node_id(week_number);

        graph.nodes.push(Node::new(
            week_id.clone(),
            NodeData::Week {
                week_number,
                weekly_total_stress,
                session_count: workouts.len(),
                sessions_per_week: constraints.sessions_per_week,
                week_full,
            },
            node_position(week_number, Slot::Week),
        ));

        graph.edges.push(Edge {
            id: format!("edge-{ROOT_NODE_ID}-{week_id}"),
            source: ROOT_NODE_ID.to_owned(),
            target: week_id.clone(),
            source_handle: ROOT_HANDLES.get(week_index).copied(),
            target_handle: Some("in"),
            edge_type: EDGE_TYPE,
            style: EdgeStyle {
                stroke_width: EDGE_WIDTH,
                stroke: ROOT_EDGE_COLOR,
            },
        });

        let stroke = if week_full {
            FULL_WEEK_COLOR
        } else {
            OPEN_WEEK_COLOR
        };

        let mut previous = week_id;
        for (index, workout) in workouts.into_iter().enumerate() {
            let node_id = workout_node_id(week_number, index);

            graph.nodes.push(Node::new(
                node_id.clone(),
                NodeData::Workout {
                    selected_id: workout.selected_id,
                    user_id: workout.user_id,
                    workout_id: workout.workout_id.clone(),
                    name: workout.name.clone(),
                    description: workout.description.clone(),
                    workout_type: workout.workout_type,
                    duration: workout.duration,
                    stress: workout.stress,
                },
                node_position(week_number, Slot::Workout(index)),
            ));

            graph.edges.push(Edge {
                id: format!("edge-{week_number}-{index}"),
                source: previous,
                target: node_id.clone(),
                source_handle: None,
                target_handle: None,
                edge_type: EDGE_TYPE,
                style: EdgeStyle {
                    stroke_width: EDGE_WIDTH,
                    stroke,
                },
            });

            previous = node_id;
        }
    }

    graph
}
