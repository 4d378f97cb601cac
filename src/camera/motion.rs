use std::time::Duration;

use tracing::info;

use super::device::{CameraError, FrameSource};
use super::frame::{ColorMode, Frame, Resolution};
use crate::config::ConfigDetection;

/// Detects motion by comparing two temporally separated grayscale captures.
///
/// The differenced image goes through two binary thresholds with a box blur
/// in between, so isolated sensor noise is averaged away while coherent
/// movement survives as contiguous lit regions. The score is the fraction of
/// pixels still lit at the end; it is computed identically regardless of
/// image content.
pub struct MotionDetector {
    interval: Duration,
    resolution: Resolution,
    threshold_first: u8,
    blur_radius: u32,
    threshold_second: u8,
    diff_threshold: f64,
}

impl MotionDetector {
    pub fn new(config: &ConfigDetection) -> MotionDetector {
        MotionDetector {
            interval: Duration::from_millis(config.motion_interval_ms),
            resolution: config.motion_resolution,
            threshold_first: config.threshold_first,
            blur_radius: config.blur_radius,
            threshold_second: config.threshold_second,
            diff_threshold: config.diff_threshold,
        }
    }

    /// Samples the camera twice, `interval` apart, and scores the difference.
    /// Returns `Some(score)` when the score clears the trigger threshold.
    pub async fn sample<S: FrameSource>(
        &self,
        camera: &mut S,
    ) -> Result<Option<f64>, CameraError> {
        let first = camera
            .capture(self.resolution, ColorMode::Grayscale)
            .await?;
        tokio::time::sleep(self.interval).await;
        let second = camera
            .capture(self.resolution, ColorMode::Grayscale)
            .await?;

        let score = self.score(&first, &second);
        if score > self.diff_threshold {
            info!(score, "motion detected");
            Ok(Some(score))
        } else {
            Ok(None)
        }
    }

    /// Fraction of pixels in [0, 1] that differ between the two frames after
    /// thresholding and denoising.
    ///
    /// Both frames must be grayscale and pixel aligned; anything else is a
    /// bug in the caller and panics.
    pub fn score(&self, first: &Frame, second: &Frame) -> f64 {
        assert!(
            first.mode() == ColorMode::Grayscale && second.mode() == ColorMode::Grayscale,
            "motion frames must be grayscale"
        );
        assert!(
            first.width() == second.width() && first.height() == second.height(),
            "motion frames must be pixel aligned"
        );
        // Safe, the mode was just asserted
        let a = first.as_luma8().unwrap();
        let b = second.as_luma8().unwrap();

        let width = first.width() as usize;
        let height = first.height() as usize;

        let mask: Vec<u8> = a
            .as_raw()
            .iter()
            .zip(b.as_raw().iter())
            .map(|(x, y)| {
                if x.abs_diff(*y) > self.threshold_first {
                    255
                } else {
                    0
                }
            })
            .collect();

        let blurred = box_blur(&mask, width, height, self.blur_radius as usize);

        let lit = blurred
            .iter()
            .filter(|&&v| v > self.threshold_second)
            .count();
        lit as f64 / (width * height) as f64
    }
}

/// Mean filter with a (2r+1)-wide square kernel, run as two separable
/// passes. Samples beyond the border repeat the edge pixel.
fn box_blur(pixels: &[u8], width: usize, height: usize, radius: usize) -> Vec<u8> {
    if radius == 0 {
        return pixels.to_vec();
    }
    let kernel = (2 * radius + 1) as u32;

    let mut rows = vec![0u8; pixels.len()];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0u32;
            for k in 0..kernel as usize {
                let sx = (x + k).saturating_sub(radius).min(width - 1);
                sum += pixels[y * width + sx] as u32;
            }
            rows[y * width + x] = ((sum + kernel / 2) / kernel) as u8;
        }
    }

    let mut out = vec![0u8; pixels.len()];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0u32;
            for k in 0..kernel as usize {
                let sy = (y + k).saturating_sub(radius).min(height - 1);
                sum += rows[sy * width + x] as u32;
            }
            out[y * width + x] = ((sum + kernel / 2) / kernel) as u8;
        }
    }
    out
}
