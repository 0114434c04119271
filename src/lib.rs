//! Attendance, conduct-score and risk aggregation for school early-warning
//! tracking. The aggregators are pure functions over fetched records; `db`
//! and `cache` supply those records from Postgres.

pub mod attendance;
pub mod bands;
pub mod cache;
pub mod config;
pub mod db;
pub mod discipline;
pub mod error;
pub mod models;
pub mod report;
pub mod risk;
