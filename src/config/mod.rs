//! Configuration Management
//!
//! This module handles loading viewer settings from the environment.

pub mod viewer;

// Re-export
pub use viewer::{ConfigError, FetchOrdering, ViewerConfig};
