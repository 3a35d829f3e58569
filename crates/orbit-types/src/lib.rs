pub mod api;
pub mod graph;
pub mod models;
