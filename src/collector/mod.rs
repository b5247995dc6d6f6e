mod capture_loop;
mod sources;

pub use capture_loop::{CaptureLoop, CaptureLoopBuilder, CaptureStats};
pub use sources::{DirectoryFrameSource, FrameSource, LabelSource, MemoryFrameSource, RecordedLabels};
