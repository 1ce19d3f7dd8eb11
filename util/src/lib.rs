pub mod config;
pub mod rotation;
pub mod state;
