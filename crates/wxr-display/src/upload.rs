//! Asynchronous ping-pong texture upload.
//!
//! Two textures alternate roles: one is bound and drawn while the other
//! receives the next sample-grid snapshot. Completion is signalled through
//! a pollable fence that is never waited on synchronously, so rendering
//! frame rate stays independent of GPU transfer latency.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

/// Pollable upload-completion signal.
pub trait Fence {
    fn signaled(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum UploadError {
    /// The GPU transfer buffer could not be staged. Recoverable: the frame
    /// is skipped and the previously bound texture stays on screen.
    #[error("GPU transfer buffer could not be mapped")]
    MapFailed,
}

/// The upload decision machine, independent of any particular GPU API.
///
/// Per call, exactly one of three things happens:
/// - nothing, because no upload is in flight and the bound texture is
///   still within its freshness interval;
/// - the in-flight fence has signaled, so the texture roles swap;
/// - the freshness interval has lapsed with nothing in flight, so a new
///   upload is started on the back texture and its fence recorded.
///
/// A failed upload start skips the frame (old texture stays bound) and is
/// reported once, not retried synchronously.
pub struct UploadClock<F: Fence> {
    current: usize,
    in_flight: Option<F>,
    last_upload: Option<Instant>,
    fresh_interval: Duration,
    fail_reported: bool,
}

impl<F: Fence> UploadClock<F> {
    pub fn new(fresh_interval: Duration) -> Self {
        Self {
            current: 0,
            in_flight: None,
            last_upload: None,
            fresh_interval,
            fail_reported: false,
        }
    }

    /// Index of the texture that should be bound this frame.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn upload_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Advances the machine; `begin` starts an asynchronous upload into
    /// the given texture slot and returns its fence. Returns the slot to
    /// bind for drawing.
    pub fn refresh(&mut self, begin: impl FnOnce(usize) -> Result<F, UploadError>) -> usize {
        self.refresh_at(Instant::now(), begin)
    }

    /// Clock-explicit variant of [`refresh`](Self::refresh) so tests can
    /// drive the freshness interval deterministically.
    pub fn refresh_at(
        &mut self,
        now: Instant,
        begin: impl FnOnce(usize) -> Result<F, UploadError>,
    ) -> usize {
        if self.in_flight.is_none() {
            if let Some(last) = self.last_upload {
                if now.duration_since(last) < self.fresh_interval {
                    // Previous upload still fresh and nothing in flight.
                    return self.current;
                }
            }
        }

        if let Some(fence) = &self.in_flight {
            if fence.signaled() {
                self.in_flight = None;
                self.current ^= 1;
            }
        } else {
            match begin(self.current ^ 1) {
                Ok(fence) => {
                    self.in_flight = Some(fence);
                    self.fail_reported = false;
                }
                Err(err) => {
                    if !self.fail_reported {
                        warn!(error = %err, "scan texture upload failed, frame skipped");
                        self.fail_reported = true;
                    }
                }
            }
            // Memorize the attempt time either way so a failing upload
            // path doesn't busy-retry every frame.
            self.last_upload = Some(now);
        }

        self.current
    }
}

/// Completion fence backed by `Queue::on_submitted_work_done`. The GPU
/// flips the flag once all work submitted before the fence was recorded
/// has executed; `signaled` is a single atomic load.
pub struct GpuFence(Arc<AtomicBool>);

impl GpuFence {
    pub fn record(queue: &wgpu::Queue) -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&flag);
        queue.on_submitted_work_done(move || done.store(true, Ordering::Release));
        GpuFence(flag)
    }
}

impl Fence for GpuFence {
    fn signaled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A ping-pong texture pair fed from sample-grid snapshots.
///
/// Texel layout: one texture row per scan line, i.e. x = range sample,
/// y = azimuth (or vertical-sector) index, `Rgba8Unorm`.
pub struct ScanTextures {
    textures: [wgpu::Texture; 2],
    views: [wgpu::TextureView; 2],
    extent: wgpu::Extent3d,
    clock: UploadClock<GpuFence>,
    staging: Vec<u8>,
}

impl ScanTextures {
    pub fn new(
        device: &wgpu::Device,
        res_x: u32,
        res_y: u32,
        fresh_interval: Duration,
        label: &str,
    ) -> Self {
        let extent = wgpu::Extent3d {
            width: res_y,
            height: res_x,
            depth_or_array_layers: 1,
        };
        let make = |n: usize| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("{label} #{n}")),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        };
        // wgpu zero-initializes textures, so there is no separate initial
        // synchronous upload; the pair starts out blank.
        let textures = [make(0), make(1)];
        let views = [
            textures[0].create_view(&wgpu::TextureViewDescriptor::default()),
            textures[1].create_view(&wgpu::TextureViewDescriptor::default()),
        ];
        Self {
            textures,
            views,
            extent,
            clock: UploadClock::new(fresh_interval),
            staging: Vec::new(),
        }
    }

    pub fn view(&self, slot: usize) -> &wgpu::TextureView {
        &self.views[slot]
    }

    /// Runs one upload-clock step, snapshotting the grid through `fill`
    /// only when an upload actually starts. Returns the slot to bind.
    pub fn refresh(
        &mut self,
        queue: &wgpu::Queue,
        fill: impl FnOnce(&mut Vec<u8>),
    ) -> usize {
        let textures = &self.textures;
        let extent = self.extent;
        let staging = &mut self.staging;
        self.clock.refresh(|slot| {
            fill(staging);
            queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &textures[slot],
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                staging,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(extent.width * 4),
                    rows_per_image: Some(extent.height),
                },
                extent,
            );
            // Flush the staged write so the fence covers it.
            queue.submit(std::iter::empty());
            Ok(GpuFence::record(queue))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use wxr_core::{Color, SampleGrid};

    #[derive(Clone)]
    struct MockFence(Arc<AtomicBool>);

    impl MockFence {
        fn pending() -> Self {
            MockFence(Arc::new(AtomicBool::new(false)))
        }

        fn complete(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    impl Fence for MockFence {
        fn signaled(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    const FRESH: Duration = Duration::from_millis(40);

    #[test]
    fn fresh_texture_suppresses_upload() {
        let mut clock = UploadClock::<MockFence>::new(FRESH);
        let t0 = Instant::now();

        let fence = MockFence::pending();
        fence.complete();
        let f = fence.clone();
        assert_eq!(clock.refresh_at(t0, move |_| Ok(f)), 0);
        assert!(clock.upload_in_flight());

        // Fence signaled: next refresh swaps.
        assert_eq!(clock.refresh_at(t0 + Duration::from_millis(1), |_| unreachable!()), 1);

        // Within the freshness window nothing new is started.
        let slot = clock.refresh_at(t0 + Duration::from_millis(20), |_| -> Result<MockFence, _> {
            panic!("upload must not start while fresh")
        });
        assert_eq!(slot, 1);
        assert!(!clock.upload_in_flight());
    }

    #[test]
    fn stale_texture_triggers_upload_into_back_slot() {
        let mut clock = UploadClock::<MockFence>::new(FRESH);
        let t0 = Instant::now();
        let uploaded_slot = RefCell::new(None);

        clock.refresh_at(t0, |slot| {
            *uploaded_slot.borrow_mut() = Some(slot);
            Ok(MockFence::pending())
        });
        // First upload goes into the non-bound slot.
        assert_eq!(*uploaded_slot.borrow(), Some(1));

        // Pending fence: no swap, no second upload even when stale.
        let slot = clock.refresh_at(t0 + FRESH * 2, |_| unreachable!());
        assert_eq!(slot, 0);
    }

    #[test]
    fn failed_upload_skips_frame_and_keeps_old_texture() {
        let mut clock = UploadClock::<MockFence>::new(FRESH);
        let t0 = Instant::now();

        let slot = clock.refresh_at(t0, |_| Err(UploadError::MapFailed));
        assert_eq!(slot, 0, "old texture stays bound");
        assert!(!clock.upload_in_flight());

        // Not retried until the freshness interval lapses again.
        let slot = clock.refresh_at(t0 + Duration::from_millis(10), |_| -> Result<MockFence, _> {
            panic!("no synchronous retry after a failed upload")
        });
        assert_eq!(slot, 0);

        // After the interval, a recovered path takes over.
        let fence = MockFence::pending();
        fence.complete();
        clock.refresh_at(t0 + FRESH * 2, move |_| Ok(fence));
        assert_eq!(clock.refresh_at(t0 + FRESH * 3, |_| unreachable!()), 1);
    }

    /// Round trip: a known grid pattern, pushed through the upload state
    /// machine into mock texture slots, reads back identically once the
    /// fence signals.
    #[test]
    fn grid_round_trips_through_upload() {
        let grid = SampleGrid::new(32, 32);
        let pattern: Vec<Color> = (0..32).map(|j| Color::rgba(j as u8, 0x40, 0x80, 0xff)).collect();
        let shadow = vec![Color::TRANSPARENT; 32];
        for x in 0..32 {
            grid.store_line(x, &pattern, &shadow);
        }

        let mut slots: [Vec<u8>; 2] = [Vec::new(), Vec::new()];
        let mut clock = UploadClock::<MockFence>::new(FRESH);
        let t0 = Instant::now();

        let fence = MockFence::pending();
        {
            let f = fence.clone();
            let slots = &mut slots;
            clock.refresh_at(t0, |slot| {
                grid.snapshot_colors(&mut slots[slot]);
                Ok(f)
            });
        }

        // Fence completes immediately, so the next refresh binds the
        // freshly filled slot.
        fence.complete();
        let bound = clock.refresh_at(t0 + Duration::from_millis(1), |_| unreachable!());

        let mut expect = Vec::new();
        grid.snapshot_colors(&mut expect);
        assert_eq!(slots[bound], expect);
        assert_eq!(&slots[bound][..4], &[0, 0x40, 0x80, 0xff]);
    }
}
