use glam::DVec2;
use thiserror::Error;

/// Minimum sampling resolution along either grid axis.
pub const MIN_RES: u32 = 32;
/// Maximum number of selectable range scales.
pub const MAX_RANGES: usize = 32;

/// Which screen-space projection the display pipeline should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayType {
    /// PPI fan: angle = azimuth, distance from origin = range.
    Arc,
    /// B-scope: x = azimuth, y = range.
    Square,
}

/// Immutable per-instance radar configuration.
///
/// Built once by the aircraft integration and validated at instance
/// creation; never mutated afterwards. Resolution is *sampling* resolution,
/// not screen resolution: `res_x` is the number of radial lines the antenna
/// sends out across a sweep, `res_y` the number of samples along one line.
#[derive(Debug, Clone)]
pub struct RadarConfig {
    /// Selectable range scales in meters, ascending, 1..=MAX_RANGES entries.
    pub ranges: Vec<f64>,
    /// Radial (azimuth) sample count per sweep.
    pub res_x: u32,
    /// Samples along one scan line.
    pub res_y: u32,
    /// Beam cone shape in degrees: x = side-to-side, y = up-down. This is
    /// the size of one pulse, not the antenna's swing limit.
    pub beam_shape: DVec2,
    pub disp_type: DisplayType,
    /// Seconds for one full side-to-side antenna swing.
    pub scan_time: f64,
    /// Degrees between full lateral deflections.
    pub scan_angle: f64,
    /// Degrees between full vertical deflections (vertical-scan mode).
    pub scan_angle_vert: f64,
    /// Azimuth the antenna parks at when reset to neutral, in degrees
    /// relative to straight ahead.
    pub parked_azimuth: f64,
    /// Display smear factors fed to the smear shader (x = along azimuth,
    /// y = along range).
    pub smear: DVec2,
    /// Fraction of the beam energy budget that terrain must absorb before
    /// samples behind it are flagged as radar shadow. Empirical constant
    /// from the original instrument, kept configurable.
    pub shadow_energy_thresh: f64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("range table must have 1..={MAX_RANGES} ascending positive entries")]
    BadRanges,
    #[error("resolution {0}x{1} below minimum {MIN_RES}x{MIN_RES}")]
    ResolutionTooLow(u32, u32),
    #[error("beam shape must be positive in both axes")]
    BadBeamShape,
    #[error("scan time must be positive")]
    BadScanTime,
    #[error("scan angle must be positive")]
    BadScanAngle,
}

impl RadarConfig {
    /// Validates the creation-time contract. A config that fails here is a
    /// caller bug and the radar instance refuses to construct.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ranges.is_empty()
            || self.ranges.len() > MAX_RANGES
            || self.ranges[0] <= 0.0
            || self.ranges.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(ConfigError::BadRanges);
        }
        if self.res_x < MIN_RES || self.res_y < MIN_RES {
            return Err(ConfigError::ResolutionTooLow(self.res_x, self.res_y));
        }
        if self.beam_shape.x <= 0.0 || self.beam_shape.y <= 0.0 {
            return Err(ConfigError::BadBeamShape);
        }
        if self.scan_time <= 0.0 {
            return Err(ConfigError::BadScanTime);
        }
        if self.scan_angle <= 0.0 || self.scan_angle_vert <= 0.0 {
            return Err(ConfigError::BadScanAngle);
        }
        Ok(())
    }

    /// Azimuth index of the parked (neutral) antenna position, kept one
    /// step away from either edge so the next advance cannot immediately
    /// reverse direction.
    pub fn parked_index(&self) -> u32 {
        let fract = (self.parked_azimuth / self.scan_angle) + 0.5;
        let idx = (fract * self.res_x as f64).round() as i64;
        idx.clamp(1, self.res_x as i64 - 2) as u32
    }

    /// Converts an azimuth in degrees relative to straight ahead into a
    /// grid column, clamped to the beam-scan range.
    pub fn azimuth_to_index(&self, azimuth: f64) -> u32 {
        let fract = (azimuth / self.scan_angle) + 0.5;
        let idx = (fract * self.res_x as f64).round() as i64;
        idx.clamp(0, self.res_x as i64 - 1) as u32
    }

    /// Inverse of [`azimuth_to_index`](Self::azimuth_to_index), for the
    /// antenna-azimuth getter and beam-direction math.
    pub fn index_to_azimuth(&self, idx: u32) -> f64 {
        ((idx as f64 / self.res_x as f64) - 0.5) * self.scan_angle
    }

    /// Elevation in degrees for a vertical-sector index.
    pub fn index_to_elevation(&self, idx: u32) -> f64 {
        ((idx as f64 / self.res_x as f64) - 0.5) * self.scan_angle_vert
    }

    /// Elevation-request degrees snapped to the nearest vertical sector.
    pub fn elevation_to_index(&self, pitch: f64) -> u32 {
        let fract = (pitch / self.scan_angle_vert) + 0.5;
        let idx = (fract * self.res_x as f64).round() as i64;
        idx.clamp(0, self.res_x as i64 - 1) as u32
    }
}

impl Default for RadarConfig {
    /// A typical 60-degree, four-range weather radar. Integrations are
    /// expected to override most of this.
    fn default() -> Self {
        Self {
            ranges: vec![18_520.0, 37_040.0, 74_080.0, 148_160.0],
            res_x: 256,
            res_y: 256,
            beam_shape: DVec2::new(3.0, 3.5),
            disp_type: DisplayType::Arc,
            scan_time: 4.0,
            scan_angle: 60.0,
            scan_angle_vert: 30.0,
            parked_azimuth: 0.0,
            smear: DVec2::new(1.0, 1.0),
            shadow_energy_thresh: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RadarConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_empty_ranges() {
        let conf = RadarConfig {
            ranges: vec![],
            ..RadarConfig::default()
        };
        assert!(matches!(conf.validate(), Err(ConfigError::BadRanges)));
    }

    #[test]
    fn rejects_descending_ranges() {
        let conf = RadarConfig {
            ranges: vec![20_000.0, 10_000.0],
            ..RadarConfig::default()
        };
        assert!(matches!(conf.validate(), Err(ConfigError::BadRanges)));
    }

    #[test]
    fn rejects_low_resolution() {
        let conf = RadarConfig {
            res_x: 16,
            ..RadarConfig::default()
        };
        assert!(matches!(
            conf.validate(),
            Err(ConfigError::ResolutionTooLow(16, 256))
        ));
    }

    #[test]
    fn rejects_non_positive_scan_time() {
        let conf = RadarConfig {
            scan_time: 0.0,
            ..RadarConfig::default()
        };
        assert!(matches!(conf.validate(), Err(ConfigError::BadScanTime)));
    }

    #[test]
    fn parked_index_keeps_edge_margin() {
        let conf = RadarConfig {
            parked_azimuth: -30.0, // hard left
            ..RadarConfig::default()
        };
        assert_eq!(conf.parked_index(), 1);
        let conf = RadarConfig {
            parked_azimuth: 30.0, // hard right
            ..RadarConfig::default()
        };
        assert_eq!(conf.parked_index(), conf.res_x - 2);
        let conf = RadarConfig::default();
        assert_eq!(conf.parked_index(), conf.res_x / 2);
    }

    #[test]
    fn azimuth_round_trips_through_index() {
        let conf = RadarConfig::default();
        let idx = conf.azimuth_to_index(15.0);
        assert!((conf.index_to_azimuth(idx) - 15.0).abs() < conf.scan_angle / conf.res_x as f64);
    }
}
