pub mod geo;
pub mod provider;

pub use geo::*;
