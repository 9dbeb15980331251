use crate::error::{MattingError, Result};
use std::str::FromStr;
use std::time::Duration;

/// Model-facing settings consumed by the matting pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Width the model receives frames at
    pub input_width: u32,
    /// Height the model receives frames at
    pub input_height: u32,
    /// Initial downsample ratio, clamped to [0.1, 1.0] when applied
    pub downsample_ratio: f32,
}

impl Default for PipelineConfig {
    /// 512x512 is a good balance of quality and performance; hidden states
    /// run at a quarter of that.
    fn default() -> Self {
        Self {
            input_width: 512,
            input_height: 512,
            downsample_ratio: 0.25,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(MattingError::InvalidConfig(format!(
                "model input size must be non-zero, got {}x{}",
                self.input_width, self.input_height
            )));
        }
        Ok(())
    }
}

/// Tuning for the adaptive downsample-ratio controller
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveConfig {
    pub target_frame_time: Duration,
    pub min_ratio: f32,
    pub max_ratio: f32,
    /// Ratio change applied per adjustment
    pub step: f32,
    /// Weight of the previous smoothed latency, in [0, 0.99]
    pub smoothing: f32,
}

impl AdaptiveConfig {
    pub fn for_fps(fps: u32) -> Self {
        Self {
            target_frame_time: Duration::from_secs_f32(1.0 / fps.max(1) as f32),
            ..Default::default()
        }
    }
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            target_frame_time: Duration::from_millis(33),
            min_ratio: 0.1,
            max_ratio: 1.0,
            step: 0.05,
            smoothing: 0.8,
        }
    }
}

/// What shows through where the matte is transparent
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    Color([u8; 3]),
    /// Gaussian blur of the original frame with this sigma
    Blur(f32),
}

#[derive(Debug, thiserror::Error)]
#[error("invalid background `{0}`: expected a colour name, #rrggbb or blur:<sigma>")]
pub struct ParseBackgroundError(String);

impl FromStr for Background {
    type Err = ParseBackgroundError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ParseBackgroundError(s.to_string());
        let s = s.trim().to_ascii_lowercase();

        match s.as_str() {
            "green" => return Ok(Background::Color([0, 177, 64])),
            "blue" => return Ok(Background::Color([0, 71, 187])),
            "black" => return Ok(Background::Color([0, 0, 0])),
            "white" => return Ok(Background::Color([255, 255, 255])),
            _ => {}
        }

        if let Some(sigma) = s.strip_prefix("blur:") {
            let sigma: f32 = sigma.parse().map_err(|_| invalid())?;
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(invalid());
            }
            return Ok(Background::Blur(sigma));
        }

        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Background::Color([channel(0)?, channel(2)?, channel(4)?]))
    }
}
