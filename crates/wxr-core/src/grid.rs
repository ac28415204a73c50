use std::sync::atomic::{AtomicU32, Ordering};

use crate::colors::Color;

/// The shared azimuth-index × range-index buffer of quantized display
/// colors, plus a parallel "beam blocked by terrain" shadow buffer.
///
/// Deliberately not lock-protected: the worker stores whole scan lines
/// while the display pipeline concurrently snapshots the grid for texture
/// upload. A reader may see a torn, half-updated line; that is accepted
/// (last writer wins) because a partial line is visually indistinguishable
/// from a normal scan artifact. Relaxed atomics keep the race well-defined
/// without introducing any blocking between simulation and rendering.
pub struct SampleGrid {
    res_x: u32,
    res_y: u32,
    samples: Vec<AtomicU32>,
    shadow: Vec<AtomicU32>,
}

impl SampleGrid {
    pub fn new(res_x: u32, res_y: u32) -> Self {
        let n = res_x as usize * res_y as usize;
        Self {
            res_x,
            res_y,
            samples: (0..n).map(|_| AtomicU32::new(0)).collect(),
            shadow: (0..n).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub fn res_x(&self) -> u32 {
        self.res_x
    }

    pub fn res_y(&self) -> u32 {
        self.res_y
    }

    /// Stores one antenna line of colors at the given azimuth (or vertical
    /// sector) index. `line` and `shadow` must each hold `res_y` cells.
    pub fn store_line(&self, index: u32, line: &[Color], shadow: &[Color]) {
        assert!(index < self.res_x);
        assert_eq!(line.len(), self.res_y as usize);
        assert_eq!(shadow.len(), self.res_y as usize);

        let off = index as usize * self.res_y as usize;
        for (j, (&c, &s)) in line.iter().zip(shadow).enumerate() {
            self.samples[off + j].store(c.0, Ordering::Relaxed);
            self.shadow[off + j].store(s.0, Ordering::Relaxed);
        }
    }

    /// Reads one cell back. Test/debug aid; the display path uses the bulk
    /// snapshot methods.
    pub fn sample(&self, x: u32, y: u32) -> Color {
        Color(self.samples[x as usize * self.res_y as usize + y as usize].load(Ordering::Relaxed))
    }

    pub fn shadow_sample(&self, x: u32, y: u32) -> Color {
        Color(self.shadow[x as usize * self.res_y as usize + y as usize].load(Ordering::Relaxed))
    }

    /// Copies the color cells into `out` as `Rgba8Unorm` texel bytes,
    /// resizing it to `res_x * res_y * 4`.
    pub fn snapshot_colors(&self, out: &mut Vec<u8>) {
        Self::snapshot(&self.samples, out);
    }

    /// Same as [`snapshot_colors`](Self::snapshot_colors) for the shadow
    /// overlay buffer.
    pub fn snapshot_shadow(&self, out: &mut Vec<u8>) {
        Self::snapshot(&self.shadow, out);
    }

    fn snapshot(cells: &[AtomicU32], out: &mut Vec<u8>) {
        out.clear();
        out.reserve(cells.len() * 4);
        for cell in cells {
            out.extend_from_slice(&Color(cell.load(Ordering::Relaxed)).to_bytes());
        }
    }

    /// Zeroes both buffers. Callers that need a consistent blank picture
    /// (standby entry, explicit screen clear) must quiesce the worker
    /// first; see `Radar::clear_screen`.
    pub fn clear(&self) {
        for cell in self.samples.iter().chain(&self.shadow) {
            cell.store(0, Ordering::Relaxed);
        }
    }
}
