use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::common::Frame;
use crate::dataset::{line_error, parse_label};
use crate::error::{AppError, Result};

/// Supplies screenshots, one per loop iteration. `None` ends the capture.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Reports whether the user acted during the current sample window.
#[async_trait]
pub trait LabelSource: Send {
    async fn next_label(&mut self, window: Duration) -> Result<bool>;
}

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

/// Replays screenshots stored in a directory, in file-name order.
pub struct DirectoryFrameSource {
    paths: VecDeque<PathBuf>,
}

impl DirectoryFrameSource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if path.is_file() && is_image {
                paths.push(path);
            }
        }
        paths.sort();
        info!("Replaying {} frames from {}", paths.len(), dir.display());
        Ok(Self {
            paths: paths.into(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }

    pub fn peek_path(&self) -> Option<&Path> {
        self.paths.front().map(PathBuf::as_path)
    }
}

impl FrameSource for DirectoryFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        debug!("Loading frame {}", path.display());
        let image = image::open(&path)?;
        Ok(Some(Frame::captured(image)))
    }
}

/// Frames already in memory.
pub struct MemoryFrameSource {
    frames: VecDeque<Frame>,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameSource for MemoryFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}

/// Labels recorded ahead of time, one per frame. Running out is an error.
pub struct RecordedLabels {
    labels: VecDeque<bool>,
}

impl RecordedLabels {
    pub fn new(labels: Vec<bool>) -> Self {
        Self {
            labels: labels.into(),
        }
    }

    /// One `1`/`0` per line; blank lines are skipped.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let labels = std::fs::read_to_string(path)?
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| parse_label(line).map_err(|e| line_error(path, n, e)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(labels))
    }
}

#[async_trait]
impl LabelSource for RecordedLabels {
    async fn next_label(&mut self, _window: Duration) -> Result<bool> {
        self.labels
            .pop_front()
            .ok_or_else(|| AppError::Dataset("ran out of recorded labels".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};

    #[test]
    fn test_directory_source_replays_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, width) in [("b.png", 20), ("a.png", 10), ("c.png", 30)] {
            let image: RgbImage = ImageBuffer::from_pixel(width, 5, Rgb([1, 2, 3]));
            image.save(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut source = DirectoryFrameSource::open(dir.path()).unwrap();
        assert_eq!(source.remaining(), 3);
        let widths: Vec<u32> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|frame| frame.width())
            .collect();
        assert_eq!(widths, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_recorded_labels_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.csv");
        std::fs::write(&path, "1\n0\n\ntrue\n").unwrap();

        let mut labels = RecordedLabels::from_file(&path).unwrap();
        let window = Duration::from_millis(30);
        assert!(labels.next_label(window).await.unwrap());
        assert!(!labels.next_label(window).await.unwrap());
        assert!(labels.next_label(window).await.unwrap());
        assert!(labels.next_label(window).await.is_err());
    }

    #[test]
    fn test_recorded_labels_reject_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.csv");
        std::fs::write(&path, "1\n\nclick\n").unwrap();
        let err = RecordedLabels::from_file(&path).err().unwrap();
        assert!(matches!(err, AppError::Dataset(ref m) if m.contains(":3:") && m.contains("click")));
    }
}
