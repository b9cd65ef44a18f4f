//! Scans image files for NSFW content through a NudeNet-style inference server.

// Declare all modules as public so they can be used by the binary and tests.
pub mod app;
pub mod config;
pub mod core;
pub mod utils;
