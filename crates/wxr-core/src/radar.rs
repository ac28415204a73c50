use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::colors::ColorTable;
use crate::config::{ConfigError, RadarConfig};
use crate::grid::SampleGrid;
use crate::probe::{Atmosphere, GeoPoint, Terrain};
use crate::scanner::Scan;
use crate::state::{Attitude, RadarState};
use crate::worker::{run_invocation, Worker, WorkerCtx};
use crate::WORKER_INTERVAL;

/// Everything shared between the control surface and the worker thread.
pub struct RadarCore {
    conf: RadarConfig,
    state: Mutex<RadarState>,
    grid: SampleGrid,
    /// Held by the worker for the duration of each invocation; the
    /// foreground side takes it (plus the state lock) when it needs the
    /// worker provably quiescent, e.g. for a full-grid clear.
    invocation_lock: Mutex<()>,
    /// Antenna position as last published by the worker. Written only by
    /// the worker, read by the azimuth getter; relaxed is plenty.
    ant_index: AtomicU32,
    ant_vertical: AtomicBool,
    atmo: Arc<dyn Atmosphere>,
    terrain: Option<Arc<dyn Terrain>>,
}

impl RadarCore {
    pub fn conf(&self) -> &RadarConfig {
        &self.conf
    }

    pub fn state(&self) -> &Mutex<RadarState> {
        &self.state
    }

    pub fn grid(&self) -> &SampleGrid {
        &self.grid
    }

    pub fn atmo(&self) -> &dyn Atmosphere {
        &*self.atmo
    }

    pub fn terrain(&self) -> Option<&dyn Terrain> {
        self.terrain.as_deref()
    }

    pub fn publish_antenna(&self, pos: Scan) {
        self.ant_index.store(pos.index(), Ordering::Relaxed);
        self.ant_vertical
            .store(matches!(pos, Scan::Elevation(_)), Ordering::Relaxed);
    }
}

/// One radar instance: the public control surface consumed by the host
/// avionics glue.
///
/// Creating an instance validates the configuration and starts the
/// background worker; dropping it (or entering standby) stops the worker
/// cooperatively. All setters are foreground-side and guard the shared
/// state with a single mutex; none of them blocks on the worker except the
/// explicitly quiescing operations (`set_standby`, `clear_screen`).
pub struct Radar {
    core: Arc<RadarCore>,
    worker: Option<Worker>,
}

impl Radar {
    pub fn new(
        conf: RadarConfig,
        atmo: Arc<dyn Atmosphere>,
        terrain: Option<Arc<dyn Terrain>>,
    ) -> Result<Self, ConfigError> {
        conf.validate()?;
        atmo.set_range(conf.ranges[0]);

        let state = RadarState::new(&conf);
        let grid = SampleGrid::new(conf.res_x, conf.res_y);
        let core = Arc::new(RadarCore {
            ant_index: AtomicU32::new(conf.parked_index()),
            ant_vertical: AtomicBool::new(false),
            state: Mutex::new(state),
            grid,
            invocation_lock: Mutex::new(()),
            atmo,
            terrain,
            conf,
        });

        let mut radar = Self { core, worker: None };
        radar.start_worker();
        Ok(radar)
    }

    fn start_worker(&mut self) {
        let core = Arc::clone(&self.core);
        let mut ctx = WorkerCtx::new(core.conf());
        self.worker = Some(Worker::spawn("wxr-worker", WORKER_INTERVAL, move || {
            let _guard = core.invocation_lock.lock();
            run_invocation(&core, &mut ctx, WORKER_INTERVAL);
        }));
        info!("radar worker started");
    }

    pub fn config(&self) -> &RadarConfig {
        self.core.conf()
    }

    /// The shared sample grid, for the display pipeline's texture uploads.
    pub fn grid(&self) -> &SampleGrid {
        self.core.grid()
    }

    pub fn set_acf_pos(&self, pos: GeoPoint, orient: Attitude) {
        let mut st = self.core.state.lock();
        st.acf_pos = pos;
        st.acf_orient = orient;
    }

    /// Selects a range scale by index into the configured range table.
    /// An out-of-table index is a caller bug.
    pub fn set_scale(&self, range_idx: usize) {
        assert!(range_idx < self.core.conf.ranges.len());
        let range = self.core.conf.ranges[range_idx];
        self.core.state.lock().range_idx = range_idx;
        self.core.atmo.set_range(range);
    }

    pub fn scale(&self) -> usize {
        self.core.state.lock().range_idx
    }

    /// Azimuth sweep limits in degrees from straight ahead.
    pub fn set_azimuth_limits(&self, left: f64, right: f64) {
        let conf = &self.core.conf;
        debug_assert!(left >= -conf.scan_angle / 2.0 && right <= conf.scan_angle / 2.0);
        let mut st = self.core.state.lock();
        st.azi_lim_left = conf.azimuth_to_index(left);
        st.azi_lim_right = conf.azimuth_to_index(right);
    }

    /// Current antenna azimuth in degrees relative to straight ahead, from
    /// the worker's last published position. In vertical mode this is the
    /// frozen scan azimuth.
    pub fn ant_azimuth(&self) -> f64 {
        if self.core.ant_vertical.load(Ordering::Relaxed) {
            self.core.state.lock().vert_azimuth
        } else {
            self.core
                .conf
                .index_to_azimuth(self.core.ant_index.load(Ordering::Relaxed))
        }
    }

    pub fn set_ant_pitch(&self, angle: f64) {
        debug_assert!((-90.0..=90.0).contains(&angle));
        self.core.state.lock().ant_pitch_req = angle;
    }

    /// The commanded antenna pitch. Deliberately mode-independent: the
    /// original recomputed this from the vertical-sector counter while in
    /// vertical mode and flagged that as broken; here the getter always
    /// mirrors the request.
    pub fn ant_pitch(&self) -> f64 {
        self.core.state.lock().ant_pitch_req
    }

    pub fn set_gain(&self, gain: f64) {
        debug_assert!(gain >= 0.0);
        self.core.state.lock().gain = gain;
    }

    pub fn gain(&self) -> f64 {
        self.core.state.lock().gain
    }

    /// Degrees of aircraft pitch/roll the antenna counter-compensates.
    /// Zero disables stabilization for that axis.
    pub fn set_stab(&self, pitch: f64, roll: f64) {
        debug_assert!((0.0..=90.0).contains(&pitch) && (0.0..=90.0).contains(&roll));
        let mut st = self.core.state.lock();
        st.pitch_stab = pitch;
        st.roll_stab = roll;
    }

    pub fn stab(&self) -> (f64, f64) {
        let st = self.core.state.lock();
        (st.pitch_stab, st.roll_stab)
    }

    pub fn set_beam_shadow(&self, flag: bool) {
        self.core.state.lock().beam_shadow = flag;
    }

    pub fn beam_shadow(&self) -> bool {
        self.core.state.lock().beam_shadow
    }

    pub fn set_gnd_sense(&self, flag: bool) {
        self.core.state.lock().gnd_sense = flag;
    }

    pub fn gnd_sense(&self) -> bool {
        self.core.state.lock().gnd_sense
    }

    /// Enters or leaves vertical-scan mode. The azimuth is clamped to the
    /// beam-scan range and frozen for the duration of vertical mode; the
    /// worker snaps its elevation counter from the current pitch request
    /// on the next invocation.
    pub fn set_vert_mode(&self, flag: bool, azimuth: f64) {
        let half = self.core.conf.scan_angle / 2.0;
        let mut st = self.core.state.lock();
        st.vert_mode = flag;
        if flag {
            st.vert_azimuth = azimuth.clamp(-half, half);
        }
    }

    pub fn vert_mode(&self) -> bool {
        self.core.state.lock().vert_mode
    }

    /// Hot-swaps the active color table. The worker picks the new table up
    /// with its next state snapshot; lines already quantized stay as they
    /// are until rescanned.
    pub fn set_colors(&self, colors: Arc<ColorTable>) {
        self.core.state.lock().colors = colors;
    }

    /// Standby stops the worker (cooperatively, after its current
    /// invocation), resets the antenna to neutral and blanks the display.
    /// Leaving standby restarts the worker from the neutral position.
    pub fn set_standby(&mut self, flag: bool) {
        {
            let mut st = self.core.state.lock();
            if st.standby == flag {
                return;
            }
            st.standby = flag;
        }
        if flag {
            if let Some(worker) = self.worker.take() {
                worker.stop();
            }
            // Worker is joined, so nobody else can touch the grid.
            self.core.publish_antenna(Scan::Azimuth(self.core.conf.parked_index()));
            self.core.grid.clear();
            info!("radar entering standby");
        } else {
            self.start_worker();
            info!("radar leaving standby");
        }
    }

    pub fn standby(&self) -> bool {
        self.core.state.lock().standby
    }

    /// Blanks both grids with the worker quiesced, so a fresh scan line
    /// can't land in the middle of the wipe.
    pub fn clear_screen(&self) {
        let _wk = self.core.invocation_lock.lock();
        let _st = self.core.state.lock();
        self.core.grid.clear();
    }
}

impl Drop for Radar {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::Color;
    use crate::probe::{ScanLine, TerrainBatch};
    use std::time::Duration;

    /// Uniform precipitation strong enough to light up every sample.
    struct SolidAtmo;

    impl Atmosphere for SolidAtmo {
        fn set_range(&self, _range: f64) {}

        fn probe(&self, sl: &mut ScanLine) {
            let cell = 0.05 * sl.sample_len() / 1000.0;
            for e in &mut sl.energy_out {
                *e = cell;
            }
        }
    }

    /// Flat sea-level terrain, far below the test aircraft.
    struct FlatTerrain;

    impl Terrain for FlatTerrain {
        fn probe(&self, batch: &mut TerrainBatch) {
            for e in &mut batch.elev {
                *e = 0.0;
            }
        }
    }

    fn test_radar() -> Radar {
        let conf = RadarConfig {
            res_x: 64,
            res_y: 64,
            scan_time: 0.1, // fast sweeps so tests settle quickly
            ..RadarConfig::default()
        };
        let radar = Radar::new(conf, Arc::new(SolidAtmo), Some(Arc::new(FlatTerrain))).unwrap();
        radar.set_acf_pos(
            GeoPoint { lat: 47.0, lon: 8.0, elev: 3000.0 },
            Attitude::default(),
        );
        radar
    }

    fn grid_lit_cells(radar: &Radar) -> usize {
        let grid = radar.grid();
        let mut lit = 0;
        for x in 0..grid.res_x() {
            for y in 0..grid.res_y() {
                if radar.grid().sample(x, y) != Color::TRANSPARENT {
                    lit += 1;
                }
            }
        }
        lit
    }

    #[test]
    fn rejects_invalid_config() {
        let conf = RadarConfig {
            ranges: vec![],
            ..RadarConfig::default()
        };
        assert!(Radar::new(conf, Arc::new(SolidAtmo), None).is_err());
    }

    #[test]
    fn worker_fills_grid_while_active() {
        let radar = test_radar();
        std::thread::sleep(Duration::from_millis(300));
        assert!(grid_lit_cells(&radar) > 0, "worker should have painted scan lines");
    }

    #[test]
    fn standby_stops_worker_and_blanks_grid() {
        let mut radar = test_radar();
        std::thread::sleep(Duration::from_millis(300));
        assert!(grid_lit_cells(&radar) > 0);

        radar.set_standby(true);
        assert!(radar.standby());
        assert_eq!(grid_lit_cells(&radar), 0, "standby must blank the display");
        // Antenna is back at neutral.
        assert_eq!(radar.ant_azimuth(), radar.config().index_to_azimuth(radar.config().parked_index()));
        // Grid stays blank while in standby.
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(grid_lit_cells(&radar), 0);

        radar.set_standby(false);
        std::thread::sleep(Duration::from_millis(300));
        assert!(grid_lit_cells(&radar) > 0, "worker should resume after standby");
    }

    #[test]
    fn clear_screen_blanks_but_keeps_scanning() {
        let radar = test_radar();
        std::thread::sleep(Duration::from_millis(300));
        radar.clear_screen();
        // Worker keeps running, so the grid repaints.
        std::thread::sleep(Duration::from_millis(300));
        assert!(grid_lit_cells(&radar) > 0);
    }

    #[test]
    fn setters_round_trip() {
        let mut radar = test_radar();
        radar.set_gain(2.5);
        assert_eq!(radar.gain(), 2.5);
        radar.set_ant_pitch(-5.0);
        assert_eq!(radar.ant_pitch(), -5.0);
        radar.set_stab(10.0, 20.0);
        assert_eq!(radar.stab(), (10.0, 20.0));
        radar.set_scale(1);
        assert_eq!(radar.scale(), 1);
        radar.set_gnd_sense(true);
        assert!(radar.gnd_sense());
        radar.set_beam_shadow(true);
        assert!(radar.beam_shadow());
        radar.set_vert_mode(true, 90.0); // clamps to +30
        assert!(radar.vert_mode());
        assert_eq!(radar.core.state.lock().vert_azimuth, 30.0);
        radar.set_standby(true);
        radar.set_standby(true); // idempotent
        assert!(radar.standby());
    }

    #[test]
    fn ant_pitch_getter_is_mode_independent() {
        let radar = test_radar();
        radar.set_ant_pitch(7.5);
        radar.set_vert_mode(true, 0.0);
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(radar.ant_pitch(), 7.5);
    }
}
