pub mod config;
pub mod data;
pub mod dataset;
pub mod filter;
pub mod join;
pub mod logging;
pub mod metrics;
pub mod render;
pub mod sample;
pub mod views;
