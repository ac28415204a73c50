use crate::config::RadarConfig;

/// Tagged antenna pointing state. Normal mode sweeps azimuth columns;
/// vertical-sector mode sweeps elevation rows at a fixed azimuth. Keeping
/// the two counters as distinct variants means a mode mix-up fails loudly
/// instead of silently reading the wrong counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    Azimuth(u32),
    Elevation(u32),
}

impl Scan {
    pub fn index(self) -> u32 {
        match self {
            Scan::Azimuth(i) | Scan::Elevation(i) => i,
        }
    }
}

/// The antenna-scan state machine. Owned exclusively by the worker; no
/// other component mutates it, so it carries no locking.
///
/// Invariant: the reversal logic always moves first and tests for a limit
/// after, so the scanner must never be *placed* on an edge index. Both
/// `new` and `reset` position it with one step of margin from each edge.
#[derive(Debug, Clone)]
pub struct AntennaScanner {
    pos: Scan,
    /// Sweeping toward higher indices.
    upward: bool,
}

impl AntennaScanner {
    pub fn new(conf: &RadarConfig) -> Self {
        Self {
            pos: Scan::Azimuth(conf.parked_index()),
            upward: true,
        }
    }

    pub fn pos(&self) -> Scan {
        self.pos
    }

    pub fn is_vertical(&self) -> bool {
        matches!(self.pos, Scan::Elevation(_))
    }

    /// Returns the antenna to the parked azimuth (normal mode), one step
    /// clear of either sweep edge.
    pub fn reset(&mut self, conf: &RadarConfig) {
        self.pos = Scan::Azimuth(conf.parked_index());
        self.upward = true;
    }

    /// Enters vertical-sector mode: the azimuth is frozen by the caller
    /// (kept in the shared state) and the elevation counter snaps to the
    /// current pitch request.
    pub fn enter_vertical(&mut self, conf: &RadarConfig, pitch_req: f64) {
        let idx = conf.elevation_to_index(pitch_req);
        // Keep the reversal margin here too.
        self.pos = Scan::Elevation(idx.clamp(1, conf.res_x - 2));
        self.upward = true;
    }

    /// Leaves vertical-sector mode back to the parked azimuth.
    pub fn leave_vertical(&mut self, conf: &RadarConfig) {
        self.reset(conf);
    }

    /// Moves the antenna by exactly one step within `[lim_lo, lim_hi]`,
    /// reversing direction at either limit. Normal mode passes the
    /// configured azimuth limits; vertical mode passes the full sector.
    /// Pure state transition, no error conditions.
    pub fn advance(&mut self, lim_lo: u32, lim_hi: u32) -> u32 {
        debug_assert!(lim_lo < lim_hi);
        let idx = match &mut self.pos {
            Scan::Azimuth(i) | Scan::Elevation(i) => i,
        };
        if self.upward {
            *idx += 1;
            if *idx >= lim_hi {
                *idx = lim_hi;
                self.upward = false;
            }
        } else {
            *idx = idx.saturating_sub(1);
            if *idx <= lim_lo {
                *idx = lim_lo;
                self.upward = true;
            }
        }
        *idx
    }
}
