//! Scenario-based tests for elastic-pipes

#[path = "../helpers.rs"]
mod helpers;

mod contexts;
mod import_export;
mod indirection;
mod timestamp_rewrite;
