use glam::{DVec2, DVec3};

/// Geographic position: latitude/longitude in degrees, elevation in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub elev: f64,
}

/// One beam line's worth of atmosphere-probe transaction state.
///
/// The output buffers are owned by the caller and reused across probe calls
/// so steady-state scanning performs no per-line allocation.
#[derive(Debug, Clone)]
pub struct ScanLine {
    /// Beam origin point.
    pub origin: GeoPoint,
    /// x = true heading degrees, y = pitch degrees up.
    pub dir: DVec2,
    /// Beam cone shape: x = horizontal degrees, y = vertical degrees.
    pub shape: DVec2,
    /// Beam energy budget, log scale, no units.
    pub energy: f64,
    /// Sampling range in meters.
    pub range: f64,
    /// Longest configured range scale, for probes that pre-sample.
    pub max_range: f64,
    /// Number of samples the probe must fill.
    pub num_samples: usize,
    /// Per-sample deposited (reflected) energy, log scale.
    pub energy_out: Vec<f64>,
    /// Per-sample Doppler shift, m/s of relative motion.
    pub doppler_out: Vec<f64>,
}

impl ScanLine {
    pub fn new(num_samples: usize) -> Self {
        Self {
            origin: GeoPoint::default(),
            dir: DVec2::ZERO,
            shape: DVec2::ZERO,
            energy: 0.0,
            range: 0.0,
            max_range: 0.0,
            num_samples,
            energy_out: vec![0.0; num_samples],
            doppler_out: vec![0.0; num_samples],
        }
    }

    /// Meters covered by one range sample.
    pub fn sample_len(&self) -> f64 {
        self.range / self.num_samples as f64
    }
}

/// Batched terrain-probe transaction: one input point and one output slot
/// per range sample. Lazily allocated on first use and reused for the life
/// of the radar instance.
#[derive(Debug, Clone, Default)]
pub struct TerrainBatch {
    pub points: Vec<GeoPoint>,
    /// Ground elevation in meters at each point.
    pub elev: Vec<f64>,
    /// Surface normal at each point (unit vector, z up).
    pub normal: Vec<DVec3>,
    /// Fraction of the sample footprint covered by water, 0..=1.
    pub water: Vec<f64>,
}

impl TerrainBatch {
    pub fn with_samples(num_samples: usize) -> Self {
        Self {
            points: vec![GeoPoint::default(); num_samples],
            elev: vec![0.0; num_samples],
            normal: vec![DVec3::Z; num_samples],
            water: vec![0.0; num_samples],
        }
    }
}

/// The simulated atmosphere collaborator. Its internal weather model is
/// external to the radar core.
pub trait Atmosphere: Send + Sync {
    /// Announces the active range scale so the probe can adapt its
    /// internal sampling density.
    fn set_range(&self, range: f64);

    /// Fills `sl.energy_out` and `sl.doppler_out` for the line's geometry.
    fn probe(&self, sl: &mut ScanLine);
}

/// The terrain database collaborator. Optional: without one, ground-return
/// and shadow contributions are omitted and atmosphere-only returns still
/// render.
pub trait Terrain: Send + Sync {
    /// Fills `batch.elev`, `batch.normal` and `batch.water` for
    /// `batch.points`.
    fn probe(&self, batch: &mut TerrainBatch);
}
