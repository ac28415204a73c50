//! Airborne weather radar simulation core.
//!
//! A radar instance pairs a background worker thread with a shared,
//! deliberately unsynchronized sample grid:
//!
//! - The worker periodically snapshots the shared [`state::RadarState`]
//!   under its mutex, releases it, then advances the antenna, probes the
//!   atmosphere and terrain collaborators, runs the energy model and writes
//!   one quantized scan line at a time into the [`grid::SampleGrid`].
//! - The foreground side (host avionics glue + display pipeline) mutates
//!   the state through [`radar::Radar`]'s setters and reads the grid
//!   whenever it uploads a texture.
//!
//! The grid is relaxed-consistency by design: a reader may observe a
//! half-written scan line, which is visually indistinguishable from a
//! normal scan artifact. See [`grid::SampleGrid`] for the invariant.

pub mod colors;
pub mod config;
pub mod energy;
pub mod grid;
pub mod probe;
pub mod radar;
pub mod scanner;
pub mod state;
pub mod worker;

pub use colors::{Color, ColorTable};
pub use config::{ConfigError, DisplayType, RadarConfig};
pub use grid::SampleGrid;
pub use probe::{Atmosphere, GeoPoint, ScanLine, Terrain, TerrainBatch};
pub use radar::Radar;
pub use state::{Attitude, RadarState};

/// Wall-clock interval between worker invocations (30 Hz).
pub const WORKER_INTERVAL: std::time::Duration = std::time::Duration::from_micros(33_333);

/// Per-line beam energy budget, log scale (matches the probe contract).
pub const MAX_BEAM_ENERGY: f64 = 1.0;
