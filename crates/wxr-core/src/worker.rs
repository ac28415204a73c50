use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::colors::Color;
use crate::config::RadarConfig;
use crate::energy::{self, EnergyLine};
use crate::probe::{GeoPoint, ScanLine, TerrainBatch};
use crate::radar::RadarCore;
use crate::scanner::{AntennaScanner, Scan};
use crate::state::{Attitude, RadarState};

/// Meters per degree of latitude, for the flat-earth ground track under a
/// scan line. Fine at radar ranges.
const M_PER_DEG: f64 = 111_111.0;

/// Gray overlay cell marking a beam-shadowed sample.
const SHADOW_COLOR: Color = Color::rgba(0x50, 0x50, 0x50, 0xff);

/// Number of antenna steps one invocation must perform so that a full
/// sweep takes exactly the configured scan period in wall-clock time,
/// regardless of how often the worker actually gets scheduled. Vertical
/// mode rescales the period to the vertical sector's angular span so the
/// antenna keeps the same degrees-per-second rate.
pub fn steps_per_invocation(conf: &RadarConfig, interval: Duration, vertical: bool) -> u32 {
    let mut period = conf.scan_time;
    if vertical {
        period *= conf.scan_angle_vert / conf.scan_angle;
    }
    (conf.res_x as f64 * (interval.as_secs_f64() / period)).ceil() as u32
}

/// Worker-thread-private scratch: the antenna state machine plus every
/// buffer reused across scan lines so steady-state scanning allocates
/// nothing.
pub struct WorkerCtx {
    pub scanner: AntennaScanner,
    sl: ScanLine,
    /// Lazily allocated on the first line that has a terrain collaborator.
    terrain: Option<TerrainBatch>,
    energy: EnergyLine,
    line: Vec<Color>,
    shadow: Vec<Color>,
}

impl WorkerCtx {
    pub fn new(conf: &RadarConfig) -> Self {
        let res_y = conf.res_y as usize;
        Self {
            scanner: AntennaScanner::new(conf),
            sl: ScanLine::new(res_y),
            terrain: None,
            energy: EnergyLine::with_samples(res_y),
            line: vec![Color::TRANSPARENT; res_y],
            shadow: vec![Color::TRANSPARENT; res_y],
        }
    }
}

/// One worker invocation: snapshot the shared state, then run the
/// scanner/probe/energy/quantize chain for this interval's batch of
/// antenna steps, writing finished lines straight into the sample grid.
pub fn run_invocation(core: &RadarCore, ctx: &mut WorkerCtx, interval: Duration) {
    let conf = core.conf();
    let snap: RadarState = core.state().lock().clone();

    // Late standby flip: the radar is being quiesced, don't touch the grid.
    if snap.standby {
        return;
    }

    // Mode transitions are detected here rather than pushed from the
    // control side, since the scanner is worker-private.
    if snap.vert_mode && !ctx.scanner.is_vertical() {
        ctx.scanner.enter_vertical(conf, snap.ant_pitch_req);
    } else if !snap.vert_mode && ctx.scanner.is_vertical() {
        ctx.scanner.leave_vertical(conf);
    }

    let vertical = ctx.scanner.is_vertical();
    let (lim_lo, lim_hi) = if vertical {
        (0, conf.res_x - 1)
    } else {
        // Sanitize: the limits came through the control surface, but a
        // degenerate window would wedge the reversal logic.
        let hi = snap.azi_lim_right.min(conf.res_x - 1).max(1);
        let lo = snap.azi_lim_left.min(hi - 1);
        (lo, hi)
    };

    for _ in 0..steps_per_invocation(conf, interval, vertical) {
        let idx = ctx.scanner.advance(lim_lo, lim_hi);
        core.publish_antenna(ctx.scanner.pos());
        scan_one_line(core, ctx, &snap, idx);
    }
}

fn scan_one_line(core: &RadarCore, ctx: &mut WorkerCtx, snap: &RadarState, idx: u32) {
    let conf = core.conf();

    let (rel_az, pitch) = match ctx.scanner.pos() {
        Scan::Azimuth(i) => (conf.index_to_azimuth(i), snap.ant_pitch_req),
        Scan::Elevation(i) => {
            let half = conf.scan_angle / 2.0;
            (snap.vert_azimuth.clamp(-half, half), conf.index_to_elevation(i))
        }
    };

    let att = snap.acf_orient;
    let world_pitch = stabilized_pitch(pitch, att, snap.pitch_stab, snap.roll_stab, rel_az);
    let heading = att.heading + rel_az;

    let sl = &mut ctx.sl;
    sl.origin = snap.acf_pos;
    sl.dir = glam::DVec2::new(heading, world_pitch);
    sl.shape = conf.beam_shape;
    sl.energy = crate::MAX_BEAM_ENERGY;
    sl.range = conf.ranges[snap.range_idx.min(conf.ranges.len() - 1)];
    sl.max_range = *conf.ranges.last().unwrap();
    sl.num_samples = conf.res_y as usize;

    core.atmo().probe(sl);

    let terrain: Option<&TerrainBatch> = match core.terrain() {
        Some(terr) => {
            let batch = ctx
                .terrain
                .get_or_insert_with(|| TerrainBatch::with_samples(conf.res_y as usize));
            ground_track(sl, world_pitch, &mut batch.points);
            terr.probe(batch);
            Some(batch)
        }
        None => None,
    };

    energy::absorb_line(
        sl,
        terrain,
        snap.gnd_sense,
        conf.shadow_energy_thresh,
        idx as u64,
        &mut ctx.energy,
    );

    for j in 0..conf.res_y as usize {
        ctx.line[j] = snap.colors.classify(snap.gain * ctx.energy.energy[j]);
        ctx.shadow[j] = if snap.beam_shadow && ctx.energy.blocked[j] {
            SHADOW_COLOR
        } else {
            Color::TRANSPARENT
        };
    }

    // Plain relaxed stores; see SampleGrid for the consistency model.
    core.grid().store_line(idx, &ctx.line, &ctx.shadow);
}

/// World-frame beam pitch after attitude stabilization. Attitude
/// excursions beyond the stabilization limits leak through as extra
/// pitch, with the roll residual rotated in by the line's relative
/// azimuth; within the limits the antenna counter-compensates fully. A
/// limit of zero disables stabilization for that axis, so the whole
/// attitude leaks.
fn stabilized_pitch(
    pitch: f64,
    att: Attitude,
    pitch_stab: f64,
    roll_stab: f64,
    rel_az: f64,
) -> f64 {
    let extra_pitch = att.pitch - att.pitch.clamp(-pitch_stab, pitch_stab);
    let extra_roll = att.roll - att.roll.clamp(-roll_stab, roll_stab);
    (pitch + extra_pitch + extra_roll * rel_az.to_radians().sin()).clamp(-90.0, 90.0)
}

/// Geographic points under the beam, one per range sample. The point
/// elevation carries the beam-center altitude so terrain collaborators can
/// do their own line-of-sight refinement if they want.
fn ground_track(sl: &ScanLine, world_pitch: f64, points: &mut [GeoPoint]) {
    let hdg = sl.dir.x.to_radians();
    let pitch_tan = world_pitch.to_radians().tan();
    let sample_len = sl.sample_len();
    let lat_rad = sl.origin.lat.to_radians();

    for (j, pt) in points.iter_mut().enumerate() {
        let dist = (j as f64 + 0.5) * sample_len;
        pt.lat = sl.origin.lat + (dist * hdg.cos()) / M_PER_DEG;
        pt.lon = sl.origin.lon + (dist * hdg.sin()) / (M_PER_DEG * lat_rad.cos().max(1e-6));
        pt.elev = sl.origin.elev + dist * pitch_tan;
    }
}

/// Fixed-interval background worker thread.
///
/// Stopping is cooperative: `stop` flips the flag, wakes the sleeper and
/// joins, so the current invocation always finishes and the thread is
/// provably gone when `stop` returns. Callers that need the worker merely
/// quiescent (not stopped) take the radar's invocation lock instead.
pub struct Worker {
    sync: Arc<WorkerSync>,
    handle: Option<JoinHandle<()>>,
}

struct WorkerSync {
    stop: Mutex<bool>,
    cv: Condvar,
}

impl Worker {
    pub fn spawn<F>(name: &str, interval: Duration, mut body: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let sync = Arc::new(WorkerSync {
            stop: Mutex::new(false),
            cv: Condvar::new(),
        });
        let thread_sync = Arc::clone(&sync);
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(worker = %std::thread::current().name().unwrap_or(""), "worker started");
                loop {
                    let started = Instant::now();
                    body();

                    let mut stop = thread_sync.stop.lock();
                    if *stop {
                        break;
                    }
                    let elapsed = started.elapsed();
                    if elapsed < interval {
                        thread_sync.cv.wait_for(&mut stop, interval - elapsed);
                    }
                    if *stop {
                        break;
                    }
                }
                debug!("worker stopped");
            })
            .expect("failed to spawn radar worker thread");
        Self {
            sync,
            handle: Some(handle),
        }
    }

    /// Cooperative stop: finish the current invocation, then join.
    pub fn stop(mut self) {
        *self.sync.stop.lock() = true;
        self.sync.cv.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        *self.sync.stop.lock() = true;
        self.sync.cv.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacing_normalizes_to_wall_clock() {
        let conf = RadarConfig {
            res_x: 64,
            res_y: 64,
            scan_time: 4.0,
            scan_angle: 60.0,
            ..RadarConfig::default()
        };
        // 64 columns over a 4 s sweep at a 33 ms cadence: one step each.
        assert_eq!(
            steps_per_invocation(&conf, Duration::from_millis(33), false),
            1
        );
        // A starved worker running at 250 ms catches up in bigger batches.
        assert_eq!(
            steps_per_invocation(&conf, Duration::from_millis(250), false),
            4
        );
    }

    #[test]
    fn vertical_pacing_preserves_angular_rate() {
        let conf = RadarConfig {
            res_x: 64,
            res_y: 64,
            scan_time: 4.0,
            scan_angle: 60.0,
            scan_angle_vert: 30.0,
            ..RadarConfig::default()
        };
        // Half the angular span means half the period, so double the steps
        // per invocation at the same wall-clock cadence.
        let normal = steps_per_invocation(&conf, Duration::from_millis(125), false);
        let vertical = steps_per_invocation(&conf, Duration::from_millis(125), true);
        assert_eq!(normal, 2);
        assert_eq!(vertical, 4);
    }

    #[test]
    fn full_sweep_takes_one_scan_period() {
        let conf = RadarConfig {
            res_x: 64,
            res_y: 64,
            scan_time: 4.0,
            scan_angle: 60.0,
            ..RadarConfig::default()
        };
        let interval = Duration::from_millis(33);
        let mut sc = AntennaScanner::new(&conf);
        let invocations = (conf.scan_time / interval.as_secs_f64()).round() as u32;

        let mut dir_changes = 0;
        let mut prev = sc.pos().index();
        let mut prev_delta = 0i64;
        for _ in 0..invocations {
            for _ in 0..steps_per_invocation(&conf, interval, false) {
                let idx = sc.advance(0, conf.res_x - 1);
                assert!(idx < conf.res_x);
                let delta = idx as i64 - prev as i64;
                if delta != 0 && prev_delta != 0 && delta.signum() != prev_delta.signum() {
                    dir_changes += 1;
                }
                if delta != 0 {
                    prev_delta = delta;
                }
                prev = idx;
            }
        }
        // One scan period's worth of invocations carries the antenna
        // through a full sweep: it must have turned around, but not be
        // ping-ponging faster than the geometry allows.
        assert!((1..=2).contains(&dir_changes), "direction changed {dir_changes} times");
    }

    #[test]
    fn stabilization_absorbs_attitude_within_limits() {
        let att = Attitude {
            pitch: 10.0,
            heading: 0.0,
            roll: -8.0,
        };
        // Both excursions inside the limits: the antenna holds the
        // commanded pitch exactly.
        assert_eq!(stabilized_pitch(2.0, att, 15.0, 15.0, 30.0), 2.0);
    }

    #[test]
    fn stabilization_leaks_residual_beyond_limit() {
        let att = Attitude {
            pitch: 20.0,
            heading: 0.0,
            roll: 0.0,
        };
        // 20 degrees of aircraft pitch against a 15 degree limit leaks
        // the 5 degree residual into the beam.
        assert!((stabilized_pitch(0.0, att, 15.0, 15.0, 0.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn zero_limit_disables_stabilization() {
        let att = Attitude {
            pitch: 20.0,
            heading: 0.0,
            roll: 0.0,
        };
        assert!((stabilized_pitch(0.0, att, 0.0, 0.0, 0.0) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn roll_residual_rotates_with_azimuth() {
        let att = Attitude {
            pitch: 0.0,
            heading: 0.0,
            roll: 30.0,
        };
        // 20 degrees of residual roll: fully in-beam at 90 degrees off
        // the nose, absent straight ahead.
        assert!((stabilized_pitch(0.0, att, 0.0, 10.0, 90.0) - 20.0).abs() < 1e-9);
        assert!(stabilized_pitch(0.0, att, 0.0, 10.0, 0.0).abs() < 1e-12);
    }

    #[test]
    fn world_pitch_clamps_to_vertical() {
        let att = Attitude {
            pitch: 40.0,
            heading: 0.0,
            roll: 0.0,
        };
        assert_eq!(stabilized_pitch(80.0, att, 0.0, 0.0, 0.0), 90.0);
        let att = Attitude { pitch: -40.0, ..att };
        assert_eq!(stabilized_pitch(-80.0, att, 0.0, 0.0, 0.0), -90.0);
    }

    #[test]
    fn worker_thread_stops_cooperatively() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        let wk = Worker::spawn("test-wk", Duration::from_millis(1), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(20));
        wk.stop();
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop > 0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }
}
