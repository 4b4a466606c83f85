pub mod geometry;
pub mod units;
pub mod element;
pub mod spec_table;
pub mod config;
pub mod planner;
pub mod rod;
pub mod orientation;
pub mod scene;
pub mod coordinator;

pub fn version() -> &'static str {
    "0.1.0"
}
