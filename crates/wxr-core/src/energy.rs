use glam::DVec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::probe::{ScanLine, TerrainBatch};

/// Vertical micro-sectors the beam cone is subdivided into so ground
/// intercept is resolved per-sector rather than all-or-nothing.
pub const NUM_SECTORS: usize = 10;

/// Fraction of a sector's remaining energy the ground absorbs on a full
/// hit. Empirical, like the rest of the ground-return tuning.
pub const GROUND_ABSORPTION: f64 = 0.5;

/// Peak magnitude (meters) of the terrain-elevation perturbation at full
/// range. Breaks up unnaturally smooth ground-clutter edges.
pub const TERRAIN_NOISE_M: f64 = 40.0;

/// Minimum height of the beam's vertical interval. Avoids a degenerate
/// zero-width sector span when range or beam shape collapse it.
const MIN_SPAN_M: f64 = 0.1;

/// Per-line energy-model results. Buffers are reused across lines.
#[derive(Debug, Clone, Default)]
pub struct EnergyLine {
    /// Total absorbed (displayable) energy per sample, already clamped to
    /// `[0, beam budget]`. Instrument gain is applied downstream.
    pub energy: Vec<f64>,
    /// Raised once terrain has soaked up enough of the beam that samples
    /// behind it sit in radar shadow.
    pub blocked: Vec<bool>,
}

impl EnergyLine {
    pub fn with_samples(num_samples: usize) -> Self {
        Self {
            energy: vec![0.0; num_samples],
            blocked: vec![false; num_samples],
        }
    }
}

/// Orders a vertical interval regardless of beam-geometry inversion at
/// extreme pitch and enforces the minimum span.
fn vertical_span(a: f64, b: f64) -> (f64, f64) {
    let lo = a.min(b);
    let hi = a.max(b).max(lo + MIN_SPAN_M);
    (lo, hi)
}

/// Sector hit test. Terrain below the sector's lower edge is a clean
/// miss; terrain rising into the sector hits it with a fraction equal to
/// the buried part of the span, saturating to 1 once the whole sector is
/// at or below ground level. A buried sector keeps being hit every sample,
/// which is what starves the beam behind high terrain.
fn sector_hit(s_lo: f64, s_hi: f64, terrain_elev: f64) -> Option<f64> {
    if terrain_elev < s_lo {
        return None;
    }
    Some(((terrain_elev - s_lo) / (s_hi - s_lo)).min(1.0))
}

/// Unit pointing vector for a heading/pitch pair in degrees, z up.
fn beam_dir(heading: f64, pitch: f64) -> DVec3 {
    let (h, p) = (heading.to_radians(), pitch.to_radians());
    DVec3::new(h.sin() * p.cos(), h.cos() * p.cos(), p.sin())
}

/// Computes the absorbed-energy profile of one scan line.
///
/// The atmosphere probe has deposited per-sample reflected energy into
/// `sl.energy_out`; the terrain batch (if a terrain collaborator exists)
/// holds elevation/normal/water for the same samples. The beam cone is
/// split into [`NUM_SECTORS`] vertical micro-sectors that each carry an
/// equal share of the energy budget outward. A sector intersecting the
/// (noise-perturbed) terrain loses part of its remaining energy to the
/// ground; the portion aligned with the reverse beam direction and not
/// swallowed by water comes back as ground return.
///
/// `seed` keys the terrain-noise generator and should be stable per
/// antenna index so clutter edges don't boil between sweeps.
pub fn absorb_line(
    sl: &ScanLine,
    terrain: Option<&TerrainBatch>,
    gnd_sense: bool,
    shadow_thresh: f64,
    seed: u64,
    out: &mut EnergyLine,
) {
    let n = sl.num_samples;
    debug_assert_eq!(sl.energy_out.len(), n);
    out.energy.resize(n, 0.0);
    out.blocked.resize(n, false);

    // A zero-energy line would otherwise NaN the normalizations below.
    let budget = sl.energy.max(f64::EPSILON);
    let sample_len = sl.sample_len();
    // Matches the original display normalization: energy per km of sample.
    let sample_len_rat = sample_len / 1000.0;
    let mut rng = SmallRng::seed_from_u64(seed);

    let mut sectors = [budget / NUM_SECTORS as f64; NUM_SECTORS];
    let mut terrain_absorbed = 0.0;
    let rev_dir = -beam_dir(sl.dir.x, sl.dir.y);
    let pitch_tan = sl.dir.y.to_radians().tan();
    let half_tan = (sl.shape.y / 2.0).to_radians().tan();

    for j in 0..n {
        let dist = (j as f64 + 0.5) * sample_len;
        let mut ground_return = 0.0;

        if let Some(terr) = terrain {
            debug_assert_eq!(terr.elev.len(), n);
            let center = sl.origin.elev + dist * pitch_tan;
            let (lo, hi) = vertical_span(center - dist * half_tan, center + dist * half_tan);
            let sector_h = (hi - lo) / NUM_SECTORS as f64;

            // Bounded noise, growing with range.
            let noise = rng.gen_range(-1.0..=1.0) * TERRAIN_NOISE_M * (dist / sl.range);
            let terr_elev = terr.elev[j] + noise;

            for (s, energy) in sectors.iter_mut().enumerate() {
                let s_lo = lo + s as f64 * sector_h;
                let Some(fract_hit) = sector_hit(s_lo, s_lo + sector_h, terr_elev) else {
                    continue;
                };
                let absorbed = (*energy * GROUND_ABSORPTION * fract_hit).min(*energy);
                *energy = (*energy - absorbed).max(0.0);
                terrain_absorbed += absorbed;

                let align = terr.normal[j].dot(rev_dir).max(0.0);
                ground_return += absorbed * align * (1.0 - terr.water[j]);
            }
        }

        let remaining: f64 = sectors.iter().sum();
        let atmo = sl.energy_out[j] * (remaining / budget) / sample_len_rat;
        let total = atmo + if gnd_sense { ground_return } else { 0.0 };

        // No energy creation: a sample can never return more than the beam
        // carried, and never a negative amount.
        out.energy[j] = total.clamp(0.0, budget);
        out.blocked[j] = terrain_absorbed / budget > shadow_thresh;
    }
}
