//! Silver price dashboard: price calculator, price-history charts and a
//! state-wise purchase choropleth over Indian state boundaries.

pub mod choropleth;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod processing;
pub mod render;
pub mod server;
pub mod types;
