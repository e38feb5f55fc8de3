// detailed implementation
pub mod algorithms;
pub mod config;
pub mod environments;
pub mod networks;
pub mod policies;
pub mod replay_buffer;
pub mod snapshot;
pub mod utils;

// Traits
pub mod agent;
pub mod environment;
pub mod policy; // deterministic policy trait
