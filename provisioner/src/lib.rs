pub mod client;
pub mod config;
pub mod context;
pub mod definitions;
pub mod pipeline;
pub mod step;

#[cfg(test)]
mod testutils;

pub use client::{ApiError, HttpPlatform, Platform};
pub use context::RunContext;
pub use pipeline::{Pipeline, PipelineReport};
