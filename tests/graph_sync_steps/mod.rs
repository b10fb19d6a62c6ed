//! Step definitions for task graph synchronisation scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
