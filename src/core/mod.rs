//! Core types: task records, identifiers and the plan graph.

pub mod dag;
pub mod task;
pub mod types;
