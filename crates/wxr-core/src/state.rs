use std::sync::Arc;

use crate::colors::ColorTable;
use crate::config::RadarConfig;
use crate::probe::GeoPoint;

/// Aircraft attitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Attitude {
    pub pitch: f64,
    pub heading: f64,
    pub roll: f64,
}

/// Mutable radar state shared between the control surface (foreground) and
/// the worker thread. All access goes through one `parking_lot::Mutex`;
/// the worker's critical section is snapshot-and-release, so the lock is
/// never held across probe calls or grid writes.
#[derive(Debug, Clone)]
pub struct RadarState {
    pub standby: bool,
    pub acf_pos: GeoPoint,
    pub acf_orient: Attitude,
    /// Index into the config's range-scale table.
    pub range_idx: usize,
    pub gain: f64,
    /// Commanded antenna pitch, degrees.
    pub ant_pitch_req: f64,
    /// Azimuth sweep limits as grid columns, inclusive.
    pub azi_lim_left: u32,
    pub azi_lim_right: u32,
    /// Attitude ranges (degrees) the antenna counter-compensates.
    pub pitch_stab: f64,
    pub roll_stab: f64,
    pub vert_mode: bool,
    /// Fixed azimuth (degrees from straight ahead) while in vertical mode.
    pub vert_azimuth: f64,
    pub gnd_sense: bool,
    pub beam_shadow: bool,
    /// Active quantization table, swapped whole on mode changes.
    pub colors: Arc<ColorTable>,
}

impl RadarState {
    pub fn new(conf: &RadarConfig) -> Self {
        Self {
            standby: false,
            acf_pos: GeoPoint::default(),
            acf_orient: Attitude::default(),
            range_idx: 0,
            gain: 1.0,
            ant_pitch_req: 0.0,
            azi_lim_left: 0,
            azi_lim_right: conf.res_x - 1,
            pitch_stab: 0.0,
            roll_stab: 0.0,
            vert_mode: false,
            vert_azimuth: 0.0,
            gnd_sense: false,
            beam_shadow: false,
            colors: Arc::new(ColorTable::standard()),
        }
    }
}
