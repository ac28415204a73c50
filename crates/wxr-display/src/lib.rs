//! wgpu display pipeline for the radar core.
//!
//! The pipeline runs entirely on the foreground/graphics thread and never
//! blocks on GPU completion: texture uploads are fenced and poll-only, and
//! a stale-but-bound texture is always available to draw. The host owns
//! the device, queue and render pass; per frame it calls
//! [`pipeline::DisplayPipeline::prepare`] (buffer writes, outside any
//! pass) and then [`pipeline::DisplayPipeline::draw`] inside its pass.

pub mod geometry;
pub mod pipeline;
pub mod upload;

pub use geometry::{DrawRect, Projection};
pub use pipeline::{DisplayPipeline, FrameParams};
pub use upload::{Fence, UploadError};

/// How long a completed upload stays fresh before the next one is issued
/// (25 fps screen refresh, decoupled from both the worker and the render
/// frame rate).
pub const TEX_FRESH_INTERVAL: std::time::Duration = std::time::Duration::from_micros(40_000);
