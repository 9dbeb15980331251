use super::OutputSink;
use anyhow::{Context, Result};
use matte_stream::FramePixels;
use std::path::{Path, PathBuf};

/// Writes numbered PNG files, keeping the alpha channel
pub struct PngSequence {
    dir: PathBuf,
    written: u64,
}

impl PngSequence {
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        tracing::info!("Writing PNG frames to {}", dir.display());

        Ok(Self { dir, written: 0 })
    }
}

impl OutputSink for PngSequence {
    fn write_frame(&mut self, frame: &FramePixels) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        frame
            .to_dynamic_image()?
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn keeps_alpha(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_numbered_rgba_pngs() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PngSequence::create(dir.path().join("out")).unwrap();
        let frame = FramePixels::new(2, 1, 4, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        sink.write_frame(&frame).unwrap();
        sink.write_frame(&frame).unwrap();

        let second = image::open(dir.path().join("out/frame_000001.png"))
            .unwrap()
            .to_rgba8();
        assert_eq!(second.into_raw(), frame.data);
    }
}
