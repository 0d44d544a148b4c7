// Frameworks: configuration, runtime setup and dependency wiring.

pub mod config;
pub mod context;
