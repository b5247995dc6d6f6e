use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::pipeline::FeatureVector;

/// Destination for labelled feature vectors.
pub trait SampleSink: Send {
    fn write_sample(&mut self, features: &FeatureVector, label: bool) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Writes samples as two line-aligned files: comma-joined features in one,
/// `1`/`0` labels in the other.
pub struct DatasetWriter {
    features: BufWriter<File>,
    labels: BufWriter<File>,
    features_path: PathBuf,
    written: usize,
}

impl DatasetWriter {
    /// Truncates both files if they exist.
    pub fn create(features_path: impl AsRef<Path>, labels_path: impl AsRef<Path>) -> Result<Self> {
        let features_path = features_path.as_ref().to_path_buf();
        let labels_path = labels_path.as_ref();
        info!(
            "Writing dataset to {} / {}",
            features_path.display(),
            labels_path.display()
        );
        Ok(Self {
            features: BufWriter::new(File::create(&features_path)?),
            labels: BufWriter::new(File::create(labels_path)?),
            features_path,
            written: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl SampleSink for DatasetWriter {
    fn write_sample(&mut self, features: &FeatureVector, label: bool) -> Result<()> {
        writeln!(self.features, "{}", features.to_csv_line())?;
        writeln!(self.labels, "{}", u8::from(label))?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.features.flush()?;
        self.labels.flush()?;
        debug!(
            "Flushed {} samples to {}",
            self.written,
            self.features_path.display()
        );
        Ok(())
    }
}

/// Keeps samples in memory (for testing and dry runs).
#[derive(Debug, Default)]
pub struct InMemorySink {
    samples: Vec<(FeatureVector, bool)>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[(FeatureVector, bool)] {
        &self.samples
    }
}

impl SampleSink for InMemorySink {
    fn write_sample(&mut self, features: &FeatureVector, label: bool) -> Result<()> {
        self.samples.push((features.clone(), label));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
