//! Render, merge and health services plus their subprocess plumbing.

pub mod envelope;
pub mod error;
pub mod fetch;
pub mod health;
pub mod merge;
pub mod process;
pub mod render;
pub mod workspace;
