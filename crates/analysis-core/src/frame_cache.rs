//! Bounded cache of decoded frames at analysis resolution.
//!
//! Frames are decoded on demand from a [`FrameSource`], downscaled to the
//! analysis resolution, and kept until evicted in insertion order. The cache
//! is shared by the evaluation workers of one session:
//! - hits only take the state lock briefly
//! - at most one decode per frame index is in flight; other requests for the
//!   same index wait for it instead of decoding again
//! - decodes of different indices run concurrently, outside the lock
//! - a decoder that fails or panics releases its waiters with
//!   [`FrameUnavailable::DecodeFailed`]

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use adsight_common::config::CacheConfig;
use adsight_common::error::AdsightError;
use adsight_detection_model::bbox::{BoundingBox, BoxScaler};
use adsight_detection_model::detection::FrameIndex;
use image::imageops::{self, FilterType};
use image::RgbImage;

/// The external decoder: produces an RGB8 pixel buffer for a frame index.
pub trait FrameSource: Send + Sync {
    /// Number of decodable frames.
    fn frame_count(&self) -> u64;

    /// Native `(width, height)` of decoded frames.
    fn dimensions(&self) -> (u32, u32);

    /// Decode one frame at native resolution.
    fn decode(&self, frame_index: FrameIndex) -> anyhow::Result<RgbImage>;
}

/// Why a frame could not be served. Callers skip the owning track.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameUnavailable {
    #[error("frame {index} is past the end of the video ({count} frames)")]
    OutOfRange { index: FrameIndex, count: u64 },

    #[error("decoder failed on frame {index}: {reason}")]
    DecodeFailed { index: FrameIndex, reason: String },
}

impl From<FrameUnavailable> for AdsightError {
    fn from(err: FrameUnavailable) -> Self {
        let index = match &err {
            FrameUnavailable::OutOfRange { index, .. } => *index,
            FrameUnavailable::DecodeFailed { index, .. } => *index,
        };
        AdsightError::frame_unavailable(index, err.to_string())
    }
}

#[derive(Default)]
struct CacheState {
    frames: HashMap<FrameIndex, Arc<RgbImage>>,
    /// Resident keys, oldest first.
    order: VecDeque<FrameIndex>,
    /// Indices currently being decoded by some worker.
    pending: HashSet<FrameIndex>,
    decodes: u64,
}

pub struct FrameCache {
    source: Arc<dyn FrameSource>,
    capacity: usize,
    analysis_size: (u32, u32),
    scaler: BoxScaler,
    state: Mutex<CacheState>,
    decoded: Condvar,
}

impl FrameCache {
    /// `detection_size` is the `(width, height)` detection boxes are expressed
    /// in. It may differ from the source's native size; both span the whole
    /// frame.
    pub fn new(
        source: Arc<dyn FrameSource>,
        detection_size: (u32, u32),
        config: &CacheConfig,
    ) -> Self {
        let analysis_size = (config.analysis_width.max(1), config.analysis_height.max(1));
        let scaler = BoxScaler::new(detection_size, analysis_size);
        Self {
            source,
            capacity: config.capacity.max(1),
            analysis_size,
            scaler,
            state: Mutex::new(CacheState::default()),
            decoded: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `(width, height)` of every cached frame.
    pub fn analysis_resolution(&self) -> (u32, u32) {
        self.analysis_size
    }

    pub fn frame_count(&self) -> u64 {
        self.source.frame_count()
    }

    /// Map a detection-resolution box into analysis resolution.
    pub fn scale_bbox(&self, bbox: &BoundingBox) -> BoundingBox {
        self.scaler.scale(bbox)
    }

    /// Number of resident frames.
    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, frame_index: FrameIndex) -> bool {
        self.lock().frames.contains_key(&frame_index)
    }

    /// Resident indices, oldest first.
    pub fn resident(&self) -> Vec<FrameIndex> {
        self.lock().order.iter().copied().collect()
    }

    /// Total decoder calls so far.
    pub fn decode_count(&self) -> u64 {
        self.lock().decodes
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // The state stays consistent even if a holder panicked mid-way.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch a frame at analysis resolution, decoding it on a miss.
    pub fn get_frame(&self, frame_index: FrameIndex) -> Result<Arc<RgbImage>, FrameUnavailable> {
        let count = self.source.frame_count();
        if frame_index >= count {
            return Err(FrameUnavailable::OutOfRange {
                index: frame_index,
                count,
            });
        }

        let mut state = self.lock();
        loop {
            if let Some(frame) = state.frames.get(&frame_index) {
                return Ok(Arc::clone(frame));
            }
            if !state.pending.contains(&frame_index) {
                break;
            }
            state = self
                .decoded
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.pending.insert(frame_index);
        state.decodes += 1;
        drop(state);

        let result = self.decode_scaled(frame_index);

        let mut state = self.lock();
        state.pending.remove(&frame_index);
        let outcome = match result {
            Ok(frame) => {
                let frame = Arc::new(frame);
                self.insert(&mut state, frame_index, Arc::clone(&frame));
                Ok(frame)
            }
            Err(err) => {
                tracing::warn!("Frame {} unavailable: {}", frame_index, err);
                Err(err)
            }
        };
        drop(state);
        self.decoded.notify_all();
        outcome
    }

    fn decode_scaled(&self, frame_index: FrameIndex) -> Result<RgbImage, FrameUnavailable> {
        // A panic here must not leave `frame_index` pending forever.
        panic::catch_unwind(AssertUnwindSafe(|| self.decode_and_resize(frame_index)))
            .unwrap_or_else(|payload| {
                Err(FrameUnavailable::DecodeFailed {
                    index: frame_index,
                    reason: format!("decoder panicked: {}", panic_message(payload.as_ref())),
                })
            })
    }

    fn decode_and_resize(&self, frame_index: FrameIndex) -> Result<RgbImage, FrameUnavailable> {
        let frame = self
            .source
            .decode(frame_index)
            .map_err(|e| FrameUnavailable::DecodeFailed {
                index: frame_index,
                reason: format!("{e:#}"),
            })?;

        let (width, height) = self.analysis_size;
        if frame.dimensions() == (width, height) {
            return Ok(frame);
        }
        Ok(imageops::resize(&frame, width, height, FilterType::Triangle))
    }

    fn insert(&self, state: &mut CacheState, frame_index: FrameIndex, frame: Arc<RgbImage>) {
        if state.frames.contains_key(&frame_index) {
            return;
        }
        while state.frames.len() >= self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.frames.remove(&oldest);
            tracing::trace!("Evicted frame {}", oldest);
        }
        state.frames.insert(frame_index, frame);
        state.order.push_back(frame_index);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Solid frames whose red channel encodes the frame index.
    struct SolidSource {
        count: u64,
        size: (u32, u32),
        delay: Duration,
        fail_on: Option<FrameIndex>,
    }

    impl SolidSource {
        fn new(count: u64, size: (u32, u32)) -> Self {
            Self {
                count,
                size,
                delay: Duration::ZERO,
                fail_on: None,
            }
        }
    }

    impl FrameSource for SolidSource {
        fn frame_count(&self) -> u64 {
            self.count
        }

        fn dimensions(&self) -> (u32, u32) {
            self.size
        }

        fn decode(&self, frame_index: FrameIndex) -> anyhow::Result<RgbImage> {
            if self.fail_on == Some(frame_index) {
                anyhow::bail!("corrupt packet");
            }
            std::thread::sleep(self.delay);
            let value = (frame_index % 256) as u8;
            Ok(RgbImage::from_pixel(self.size.0, self.size.1, Rgb([value, 0, 0])))
        }
    }

    fn config(capacity: usize) -> CacheConfig {
        CacheConfig {
            capacity,
            analysis_width: 64,
            analysis_height: 36,
        }
    }

    #[test]
    fn test_rescales_to_analysis_resolution() {
        let source = Arc::new(SolidSource::new(10, (192, 108)));
        let cache = FrameCache::new(source, (192, 108), &config(4));
        let frame = cache.get_frame(3).unwrap();
        assert_eq!(frame.dimensions(), (64, 36));
        assert_eq!(frame.get_pixel(10, 10).0[0], 3);
        assert_eq!(cache.analysis_resolution(), (64, 36));
    }

    #[test]
    fn test_scale_bbox_uses_resolution_ratio() {
        let source = Arc::new(SolidSource::new(10, (192, 108)));
        let cache = FrameCache::new(source, (192, 108), &config(4));
        let scaled = cache.scale_bbox(&BoundingBox::new(30, 15, 60, 30));
        assert_eq!(scaled, BoundingBox::new(10, 5, 20, 10));
    }

    #[test]
    fn test_scale_bbox_follows_detection_size_not_source_size() {
        // Detections at 192x108, frames decoded at 96x54.
        let source = Arc::new(SolidSource::new(10, (96, 54)));
        let cache = FrameCache::new(source, (192, 108), &config(4));
        let scaled = cache.scale_bbox(&BoundingBox::new(30, 15, 60, 30));
        assert_eq!(scaled, BoundingBox::new(10, 5, 20, 10));
        assert_eq!(cache.get_frame(0).unwrap().dimensions(), (64, 36));
    }

    #[test]
    fn test_hits_do_not_decode_again() {
        let cache = FrameCache::new(Arc::new(SolidSource::new(10, (64, 36))), (64, 36), &config(4));
        cache.get_frame(1).unwrap();
        cache.get_frame(1).unwrap();
        assert_eq!(cache.decode_count(), 1);
        assert!(cache.contains(1));
    }

    #[test]
    fn test_evicts_first_inserted() {
        let capacity = 3;
        let cache = FrameCache::new(
            Arc::new(SolidSource::new(100, (64, 36))),
            (64, 36),
            &config(capacity),
        );
        for index in [10, 20, 30] {
            cache.get_frame(index).unwrap();
        }
        // Re-reading the oldest does not refresh its position.
        cache.get_frame(10).unwrap();
        cache.get_frame(40).unwrap();

        assert_eq!(cache.len(), capacity);
        assert!(!cache.contains(10));
        assert_eq!(cache.resident(), vec![20, 30, 40]);
    }

    #[test]
    fn test_out_of_range_is_returned_not_raised() {
        let cache = FrameCache::new(Arc::new(SolidSource::new(5, (64, 36))), (64, 36), &config(4));
        let err = cache.get_frame(5).unwrap_err();
        assert_eq!(err, FrameUnavailable::OutOfRange { index: 5, count: 5 });
        assert_eq!(cache.decode_count(), 0);
    }

    #[test]
    fn test_decode_failure_is_not_cached() {
        let source = SolidSource {
            fail_on: Some(2),
            ..SolidSource::new(5, (64, 36))
        };
        let cache = FrameCache::new(Arc::new(source), (64, 36), &config(4));
        let err = cache.get_frame(2).unwrap_err();
        assert!(matches!(err, FrameUnavailable::DecodeFailed { index: 2, .. }));
        assert!(cache.is_empty());

        let converted: AdsightError = err.into();
        assert!(!converted.is_session_fatal());
    }

    #[test]
    fn test_concurrent_misses_decode_once() {
        let source = SolidSource {
            delay: Duration::from_millis(30),
            ..SolidSource::new(10, (64, 36))
        };
        let cache = FrameCache::new(Arc::new(source), (64, 36), &config(4));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let frame = cache.get_frame(7).unwrap();
                    assert_eq!(frame.get_pixel(0, 0).0[0], 7);
                });
            }
        });

        assert_eq!(cache.decode_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    /// Panics on its first decode, after a delay that lets a waiter queue up.
    struct PanicOnceSource {
        panicked: AtomicBool,
    }

    impl FrameSource for PanicOnceSource {
        fn frame_count(&self) -> u64 {
            4
        }

        fn dimensions(&self) -> (u32, u32) {
            (64, 36)
        }

        fn decode(&self, frame_index: FrameIndex) -> anyhow::Result<RgbImage> {
            std::thread::sleep(Duration::from_millis(100));
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("codec crashed on frame {frame_index}");
            }
            Ok(RgbImage::new(64, 36))
        }
    }

    #[test]
    fn test_decoder_panic_releases_waiters() {
        let source = Arc::new(PanicOnceSource {
            panicked: AtomicBool::new(false),
        });
        let cache = Arc::new(FrameCache::new(source, (64, 36), &config(4)));

        let (tx, rx) = mpsc::channel();
        let first = {
            let cache = Arc::clone(&cache);
            let tx = tx.clone();
            std::thread::spawn(move || tx.send(("first", cache.get_frame(0))).unwrap())
        };
        std::thread::sleep(Duration::from_millis(20));
        let waiter = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || tx.send(("waiter", cache.get_frame(0))).unwrap())
        };

        let mut results = HashMap::new();
        for _ in 0..2 {
            let (who, result) = rx
                .recv_timeout(Duration::from_secs(5))
                .expect("both requests should finish");
            results.insert(who, result);
        }
        first.join().unwrap();
        waiter.join().unwrap();

        match &results["first"] {
            Err(FrameUnavailable::DecodeFailed { index: 0, reason }) => {
                assert!(reason.contains("codec crashed"), "{reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // The waiter retries the decode itself once the failed attempt is released.
        assert!(results["waiter"].is_ok());
        assert_eq!(cache.decode_count(), 2);
    }
}
