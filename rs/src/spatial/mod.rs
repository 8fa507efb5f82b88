pub mod geometry;

pub use geometry::{external_map_url, haversine_distance};
