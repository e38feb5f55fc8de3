pub mod actor;
pub mod critic;
pub mod mlp;
pub mod params;
