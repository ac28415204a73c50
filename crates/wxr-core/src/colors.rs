/// One display color, stored as big-endian packed RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u32);

impl Color {
    pub const TRANSPARENT: Color = Color(0x0000_0000);
    /// Opaque black, the "no return" cell value.
    pub const BLACK: Color = Color(0x0000_00ff);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color(u32::from_be_bytes([r, g, b, a]))
    }

    /// Byte order matches an `Rgba8Unorm` texel.
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

/// One threshold rung of a color table: energies at or above `min_energy`
/// (after gain and scaling) map to `color`, unless a higher rung matched
/// first.
#[derive(Debug, Clone, Copy)]
pub struct ColorEntry {
    pub min_energy: f64,
    pub color: Color,
}

/// Ordered energy-to-color quantization table.
///
/// Entries are held in descending threshold order; `classify` returns the
/// first entry whose threshold the scaled energy meets. Tables are
/// immutable once built and hot-swapped whole (behind an `Arc`) when the
/// avionics selects a new mode, so the worker can never observe a
/// half-replaced table.
#[derive(Debug, Clone)]
pub struct ColorTable {
    entries: Vec<ColorEntry>,
    /// Empirical energy-to-color scale of the original instrument. Applied
    /// before threshold comparison; not a physically derived value.
    scale: f64,
}

/// Default energy-to-color scale (display gain of the reference ladder).
pub const DEFAULT_COLOR_SCALE: f64 = 0.6;

impl ColorTable {
    /// Builds a table from entries given in descending threshold order.
    /// Out-of-order input is a caller bug; the table is sorted anyway so
    /// classification stays monotonic.
    pub fn new(mut entries: Vec<ColorEntry>, scale: f64) -> Self {
        debug_assert!(scale > 0.0);
        entries.sort_by(|a, b| b.min_energy.total_cmp(&a.min_energy));
        Self { entries, scale }
    }

    /// The reference four-color ladder (green/yellow/red/magenta) with the
    /// original's empirically tuned thresholds.
    pub fn standard() -> Self {
        Self::new(
            vec![
                ColorEntry { min_energy: 0.020, color: Color::rgba(0xd8, 0x64, 0xa5, 0xff) },
                ColorEntry { min_energy: 0.015, color: Color::rgba(0xed, 0x20, 0x24, 0xff) },
                ColorEntry { min_energy: 0.010, color: Color::rgba(0xff, 0xf2, 0x00, 0xff) },
                ColorEntry { min_energy: 0.0075, color: Color::rgba(0x78, 0xc2, 0x55, 0xff) },
            ],
            DEFAULT_COLOR_SCALE,
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Quantizes one energy sample. Negative energies are treated as zero;
    /// below all thresholds yields the "no return" black cell.
    pub fn classify(&self, energy: f64) -> Color {
        let e = energy.max(0.0) * self.scale;
        for entry in &self.entries {
            if e >= entry.min_energy {
                return entry.color;
            }
        }
        Color::BLACK
    }
}
