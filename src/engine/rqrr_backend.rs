use super::{CodeDecoder, DecodeResult, Reply};
use crate::error::PipelineError;
use crate::models::{PixelRect, RawDetection};
use crate::normalize::NormalizedImage;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rqrr::PreparedImage;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

/// QR decoder running `rqrr` on a private worker pool
///
/// Grids are decoded in the order `rqrr` reports them. A grid that is located
/// but fails to decode is still reported, with geometry and no payload.
/// Boxes are in the pixel space of the image as handed over; `rqrr` reads
/// codes in any orientation, so the rotation tag is not applied.
pub struct RqrrDecoder {
    pool: RwLock<Option<Arc<ThreadPool>>>,
}

impl RqrrDecoder {
    /// Decoder with rayon's default worker count
    pub fn new() -> Result<Self, PipelineError> {
        Self::with_threads(0)
    }

    /// Decoder with `threads` workers (0 lets rayon pick)
    pub fn with_threads(threads: usize) -> Result<Self, PipelineError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("qr-decode-{}", i))
            .build()
            .map_err(|e| {
                PipelineError::DetectionError(format!("cannot start decoder workers: {}", e))
            })?;
        Ok(Self {
            pool: RwLock::new(Some(Arc::new(pool))),
        })
    }

    /// Decode synchronously on the calling thread
    pub fn decode_now(image: &NormalizedImage) -> DecodeResult {
        let luma = image
            .luma()
            .ok_or_else(|| "image has no luma plane".to_string())?;
        let (width, height) = (image.width as usize, image.height as usize);
        if luma.len() < width * height {
            return Err(format!(
                "luma plane holds {} bytes, {}x{} needs {}",
                luma.len(),
                width,
                height,
                width * height
            ));
        }

        let mut prepared = PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            luma[y * width + x]
        });
        let grids = prepared.detect_grids();

        let detections = grids
            .iter()
            .map(|grid| {
                let bounds = PixelRect::hull(grid.bounds.iter().map(|p| (p.x, p.y)));
                let mut detection = RawDetection {
                    bounding_box: bounds,
                    ..RawDetection::default()
                };
                match grid.decode() {
                    Ok((_meta, content)) => detection.raw_value = Some(content),
                    Err(e) => log::debug!("located a grid but could not decode it: {:?}", e),
                }
                detection
            })
            .collect();
        Ok(detections)
    }

    fn pool(&self) -> Option<Arc<ThreadPool>> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CodeDecoder for RqrrDecoder {
    fn process(&self, image: NormalizedImage, reply: Reply) {
        let Some(pool) = self.pool() else {
            reply.fail("decoder workers have been released");
            return;
        };

        pool.spawn(move || {
            match catch_unwind(AssertUnwindSafe(|| Self::decode_now(&image))) {
                Ok(Ok(detections)) => {
                    reply.succeed(detections);
                }
                Ok(Err(message)) => {
                    reply.fail(message);
                }
                Err(_) => {
                    log::error!(
                        "rqrr panicked while decoding a {}x{} image",
                        image.width,
                        image.height
                    );
                    reply.fail("decoder panicked");
                }
            }
        });
    }

    fn close(&self) {
        if self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            log::debug!("released rqrr decoder workers");
        }
    }
}
