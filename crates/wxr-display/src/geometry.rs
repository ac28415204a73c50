//! Screen-space scan geometry: the PPI arc fan or the B-scope rectangle.
//!
//! The mesh lives in screen pixels (y up, like the original instrument)
//! and is recomputed only when position, size or projection change; the
//! vertex shader applies the viewport transform.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ScanVertex {
    pub pos: [f32; 2],
    /// u = range fraction (0 at the beam origin, 1 at the rim),
    /// v = azimuth/elevation fraction across the sweep.
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// PPI fan of 1°-wide quads.
    Arc,
    /// Single rectangle (B-scope, and always used in vertical-scan mode).
    Rect,
}

/// Where on screen to draw, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRect {
    pub pos: Vec2,
    pub size: Vec2,
}

/// Caches the tessellated mesh between frames.
pub struct MeshCache {
    key: Option<(DrawRect, Projection)>,
    vertices: Vec<ScanVertex>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self {
            key: None,
            vertices: Vec::new(),
        }
    }

    pub fn vertices(&self) -> &[ScanVertex] {
        &self.vertices
    }

    /// Worst-case vertex count for a given scan angle, for sizing the GPU
    /// vertex buffer once.
    pub fn max_vertices(scan_angle: f64) -> usize {
        (scan_angle.ceil() as usize).max(1) * 6
    }

    /// Rebuilds the mesh if `rect` or `projection` changed since the last
    /// call. Returns true when the cached vertices were replaced and the
    /// GPU buffer needs a rewrite.
    pub fn update(&mut self, rect: DrawRect, projection: Projection, scan_angle: f64) -> bool {
        if self.key == Some((rect, projection)) {
            return false;
        }
        self.vertices.clear();
        match projection {
            Projection::Arc => self.build_arc(rect, scan_angle),
            Projection::Rect => self.build_rect(rect),
        }
        self.key = Some((rect, projection));
        true
    }

    /// Fan of 1-degree quads around the apex at the bottom-center of the
    /// rect. Two triangles per quad; the two apex vertices coincide in
    /// space but differ in sweep fraction so the texture fans out evenly.
    fn build_arc(&mut self, rect: DrawRect, scan_angle: f64) {
        let slices = (scan_angle.ceil() as usize).max(1);
        let apex = Vec2::new(rect.pos.x + rect.size.x / 2.0, rect.pos.y);

        for j in 0..slices {
            let fract1 = j as f32 / slices as f32;
            let fract2 = (j + 1) as f32 / slices as f32;
            let angle1 = ((fract1 as f64 - 0.5) * scan_angle).to_radians() as f32;
            let angle2 = ((fract2 as f64 - 0.5) * scan_angle).to_radians() as f32;

            let rim = |angle: f32| {
                Vec2::new(
                    apex.x + angle.sin() * (rect.size.x / 2.0),
                    rect.pos.y + angle.cos() * rect.size.y,
                )
            };
            let apex1 = ScanVertex { pos: apex.into(), uv: [0.0, fract1] };
            let apex2 = ScanVertex { pos: apex.into(), uv: [0.0, fract2] };
            let rim1 = ScanVertex { pos: rim(angle1).into(), uv: [1.0, fract1] };
            let rim2 = ScanVertex { pos: rim(angle2).into(), uv: [1.0, fract2] };

            self.vertices.extend_from_slice(&[apex1, rim1, rim2, apex1, rim2, apex2]);
        }
    }

    /// B-scope: sweep runs left-to-right, range bottom-to-top.
    fn build_rect(&mut self, rect: DrawRect) {
        let (p, s) = (rect.pos, rect.size);
        let v = |x: f32, y: f32, u: f32, t: f32| ScanVertex { pos: [x, y], uv: [u, t] };
        let bl = v(p.x, p.y, 0.0, 0.0);
        let tl = v(p.x, p.y + s.y, 1.0, 0.0);
        let tr = v(p.x + s.x, p.y + s.y, 1.0, 1.0);
        let br = v(p.x + s.x, p.y, 0.0, 1.0);
        self.vertices.extend_from_slice(&[bl, tl, tr, bl, tr, br]);
    }
}

impl Default for MeshCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f32, y: f32, w: f32, h: f32) -> DrawRect {
        DrawRect {
            pos: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[test]
    fn arc_mesh_has_one_quad_per_degree() {
        let mut mesh = MeshCache::new();
        assert!(mesh.update(rect(0.0, 0.0, 200.0, 100.0), Projection::Arc, 60.0));
        assert_eq!(mesh.vertices().len(), 60 * 6);
        assert!(mesh.vertices().len() <= MeshCache::max_vertices(60.0));
    }

    #[test]
    fn rect_mesh_is_two_triangles() {
        let mut mesh = MeshCache::new();
        assert!(mesh.update(rect(10.0, 20.0, 100.0, 50.0), Projection::Rect, 60.0));
        assert_eq!(mesh.vertices().len(), 6);
        // Corners span the draw rect.
        let xs: Vec<f32> = mesh.vertices().iter().map(|v| v.pos[0]).collect();
        let ys: Vec<f32> = mesh.vertices().iter().map(|v| v.pos[1]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), 10.0);
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 110.0);
        assert_eq!(ys.iter().cloned().fold(f32::MAX, f32::min), 20.0);
        assert_eq!(ys.iter().cloned().fold(f32::MIN, f32::max), 70.0);
    }

    #[test]
    fn cache_hits_until_key_changes() {
        let mut mesh = MeshCache::new();
        let r = rect(0.0, 0.0, 200.0, 100.0);
        assert!(mesh.update(r, Projection::Arc, 60.0));
        assert!(!mesh.update(r, Projection::Arc, 60.0));
        // Moving the instrument invalidates.
        assert!(mesh.update(rect(5.0, 0.0, 200.0, 100.0), Projection::Arc, 60.0));
        // So does switching projection (vertical-mode entry).
        assert!(mesh.update(rect(5.0, 0.0, 200.0, 100.0), Projection::Rect, 60.0));
    }

    #[test]
    fn arc_uv_covers_full_sweep() {
        let mut mesh = MeshCache::new();
        mesh.update(rect(0.0, 0.0, 200.0, 100.0), Projection::Arc, 60.0);
        let sweeps: Vec<f32> = mesh.vertices().iter().map(|v| v.uv[1]).collect();
        assert_eq!(sweeps.iter().cloned().fold(f32::MAX, f32::min), 0.0);
        assert_eq!(sweeps.iter().cloned().fold(f32::MIN, f32::max), 1.0);
        // Range fraction stays within [0, 1].
        assert!(mesh.vertices().iter().all(|v| (0.0..=1.0).contains(&v.uv[0])));
    }

    #[test]
    fn arc_fan_is_symmetric_about_apex() {
        let mut mesh = MeshCache::new();
        mesh.update(rect(0.0, 0.0, 200.0, 100.0), Projection::Arc, 60.0);
        let apex_x = 100.0;
        let min_x = mesh.vertices().iter().map(|v| v.pos[0]).fold(f32::MAX, f32::min);
        let max_x = mesh.vertices().iter().map(|v| v.pos[0]).fold(f32::MIN, f32::max);
        assert!((apex_x - min_x - (max_x - apex_x)).abs() < 1e-3);
    }
}
