pub mod api;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod metrics;
pub mod models;
pub mod scoring;
pub mod store;
