use super::tensor::TensorBuffer;
use crate::config::AdaptiveConfig;
use std::time::Duration;

pub const MIN_RATIO: f32 = 0.1;
pub const MAX_RATIO: f32 = 1.0;

/// Internal processing scale handed to the model, always within [0.1, 1.0]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownsampleRatio(f32);

impl DownsampleRatio {
    /// Clamp `ratio` into range; NaN means full resolution
    pub fn new(ratio: f32) -> Self {
        if ratio.is_nan() {
            return Self(MAX_RATIO);
        }
        Self(ratio.clamp(MIN_RATIO, MAX_RATIO))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn to_tensor(self) -> TensorBuffer {
        TensorBuffer::scalar(self.0)
    }
}

impl Default for DownsampleRatio {
    fn default() -> Self {
        Self(0.25)
    }
}

/// Starting ratio that keeps the longer side near 512 internal pixels
pub fn suggested_downsample_ratio(width: u32, height: u32) -> f32 {
    let longer = width.max(height);
    if longer >= 512 {
        DownsampleRatio::new(512.0 / (longer as f32 * 1.06)).value()
    } else {
        MAX_RATIO
    }
}

/// Steers the downsample ratio toward a frame-time budget
///
/// Keeps an exponentially smoothed latency; lowers the ratio when frames run
/// more than 10% over budget and raises it once they run under 75%.
#[derive(Debug)]
pub struct AdaptiveRatio {
    config: AdaptiveConfig,
    current: f32,
    smoothed: Option<f32>,
}

impl AdaptiveRatio {
    pub fn new(config: AdaptiveConfig, initial: f32) -> Self {
        let current = Self::bounded(&config, initial);
        Self {
            config,
            current,
            smoothed: None,
        }
    }

    pub fn ratio(&self) -> f32 {
        self.current
    }

    /// Feed one frame's latency; returns the new ratio when it changes
    pub fn observe(&mut self, latency: Duration) -> Option<f32> {
        let sample = latency.as_secs_f32();
        let a = self.config.smoothing.clamp(0.0, 0.99);
        let smoothed = match self.smoothed {
            Some(prev) => prev * a + sample * (1.0 - a),
            None => sample,
        };
        self.smoothed = Some(smoothed);

        let budget = self.config.target_frame_time.as_secs_f32();
        let proposed = if smoothed > budget * 1.1 {
            self.current - self.config.step
        } else if smoothed < budget * 0.75 {
            self.current + self.config.step
        } else {
            return None;
        };

        let next = Self::bounded(&self.config, proposed);
        if (next - self.current).abs() < f32::EPSILON {
            return None;
        }

        tracing::debug!(
            "Adaptive ratio {:.2} -> {:.2} (smoothed {:.1}ms, budget {:.1}ms)",
            self.current,
            next,
            smoothed * 1000.0,
            budget * 1000.0
        );
        self.current = next;
        Some(next)
    }

    fn bounded(config: &AdaptiveConfig, ratio: f32) -> f32 {
        let low = DownsampleRatio::new(config.min_ratio).value();
        let high = DownsampleRatio::new(config.max_ratio).value().max(low);
        DownsampleRatio::new(ratio).value().clamp(low, high)
    }
}
