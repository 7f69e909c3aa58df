// ABOUTME: Library root for container-wait - readiness strategies for containers.
// ABOUTME: The CLI binary is in main.rs.

pub mod config;
pub mod error;
pub mod target;
pub mod types;
pub mod wait;
