//! scenecast: renders scripted animations and merges the resulting clips.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
