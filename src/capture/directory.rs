use super::CaptureSource;
use anyhow::{Context, Result};
use matte_stream::FramePixels;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Reads an image sequence from a directory in file-name order
///
/// One directory is one temporally-related sequence.
pub struct ImageDirectory {
    frames: Vec<PathBuf>,
    next: usize,
}

impl ImageDirectory {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();

        let mut frames = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read image directory {}", dir.display()))?
        {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image {
                frames.push(path);
            }
        }
        frames.sort();

        tracing::info!("Found {} frames in {}", frames.len(), dir.display());

        Ok(Self { frames, next: 0 })
    }
}

impl CaptureSource for ImageDirectory {
    fn capture_frame(&mut self) -> Result<Option<FramePixels>> {
        let Some(path) = self.frames.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let image = image::open(path)
            .with_context(|| format!("Failed to decode {}", path.display()))?;

        Ok(Some(FramePixels::from(image.to_rgb8())))
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        None
    }
}
