//! PostgreSQL persistence for stride: schema migrations, row models, and
//! query functions for the workout catalog, users, and plan selections.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
