//! Training samples on disk: writing them during collection and reading them
//! back for offline use.

mod writer;

pub use writer::{DatasetWriter, InMemorySink, SampleSink};

use rand::Rng;
use rand::seq::SliceRandom;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::pipeline::FeatureVector;

/// Share of samples a single class may hold before [`Dataset::balance`]
/// thins it out.
pub const BALANCE_TRIGGER: f64 = 0.75;
/// Fraction of the majority class kept when balancing.
pub const MAJORITY_KEEP: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub features: FeatureVector,
    pub label: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Reads the two files written by [`DatasetWriter`].
    pub fn load(features_path: impl AsRef<Path>, labels_path: impl AsRef<Path>) -> Result<Self> {
        let features_path = features_path.as_ref();
        let features_text = fs::read_to_string(features_path)?;
        let labels_text = fs::read_to_string(labels_path.as_ref())?;

        let features = features_text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| parse_features(line).map_err(|e| line_error(features_path, n, e)))
            .collect::<Result<Vec<_>>>()?;
        let labels = labels_text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| parse_label(line).map_err(|e| line_error(labels_path.as_ref(), n, e)))
            .collect::<Result<Vec<_>>>()?;

        if features.len() != labels.len() {
            return Err(AppError::Dataset(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }

        let samples: Vec<Sample> = features
            .into_iter()
            .zip(labels)
            .map(|(features, label)| Sample { features, label })
            .collect();
        info!("Loaded {} samples from {}", samples.len(), features_path.display());
        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn positives(&self) -> usize {
        self.samples.iter().filter(|s| s.label).count()
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.samples.shuffle(rng);
    }

    /// Shuffles, then moves `round(len * fraction)` samples into the second
    /// (validation) set.
    pub fn split<R: Rng + ?Sized>(mut self, fraction: f64, rng: &mut R) -> (Dataset, Dataset) {
        self.shuffle(rng);
        let validation_len =
            ((self.samples.len() as f64 * fraction.clamp(0.0, 1.0)).round() as usize).min(self.samples.len());
        let train = self.samples.split_off(validation_len);
        (Dataset::new(train), Dataset::new(self.samples))
    }

    /// Thins out a class holding more than [`BALANCE_TRIGGER`] of the samples
    /// down to [`MAJORITY_KEEP`] of its size. Unchanged when balanced or when
    /// either class is empty.
    pub fn balance<R: Rng + ?Sized>(mut self, rng: &mut R) -> Dataset {
        let total = self.samples.len();
        let positives = self.positives();
        let negatives = total - positives;
        if positives == 0 || negatives == 0 {
            return self;
        }

        let majority = if positives as f64 / total as f64 > BALANCE_TRIGGER {
            true
        } else if negatives as f64 / total as f64 > BALANCE_TRIGGER {
            false
        } else {
            return self;
        };

        self.shuffle(rng);
        let majority_count = if majority { positives } else { negatives };
        let mut keep = (majority_count as f64 * MAJORITY_KEEP).round() as usize;
        self.samples.retain(|sample| {
            if sample.label != majority {
                return true;
            }
            if keep > 0 {
                keep -= 1;
                true
            } else {
                false
            }
        });
        debug!(
            "Balanced dataset from {} to {} samples ({} positives)",
            total,
            self.samples.len(),
            self.positives()
        );
        self
    }
}

fn parse_features(line: &str) -> std::result::Result<FeatureVector, String> {
    line.split(',')
        .map(|value| value.trim().parse::<u32>().map_err(|e| format!("'{value}': {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(FeatureVector::new)
}

pub(crate) fn parse_label(line: &str) -> std::result::Result<bool, String> {
    match line.trim() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(format!("'{other}' is not a label")),
    }
}

pub(crate) fn line_error(path: &Path, index: usize, message: String) -> AppError {
    AppError::Dataset(format!("{}:{}: {}", path.display(), index + 1, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample(value: u32, label: bool) -> Sample {
        Sample {
            features: FeatureVector::new(vec![value, value + 1, value + 2]),
            label,
        }
    }

    fn dataset(positives: u32, negatives: u32) -> Dataset {
        let mut samples: Vec<Sample> = (0..positives).map(|i| sample(i, true)).collect();
        samples.extend((0..negatives).map(|i| sample(1000 + i, false)));
        Dataset::new(samples)
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let features_path = dir.path().join("data.csv");
        let labels_path = dir.path().join("data_label.csv");

        let mut writer = DatasetWriter::create(&features_path, &labels_path).unwrap();
        writer
            .write_sample(&FeatureVector::new(vec![0, 1600, 3]), true)
            .unwrap();
        writer
            .write_sample(&FeatureVector::new(vec![4, 5, 6]), false)
            .unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.written(), 2);

        assert_eq!(
            std::fs::read_to_string(&features_path).unwrap(),
            "0,1600,3\n4,5,6\n"
        );
        assert_eq!(std::fs::read_to_string(&labels_path).unwrap(), "1\n0\n");

        let loaded = Dataset::load(&features_path, &labels_path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.samples()[0].features.as_slice(), &[0, 1600, 3]);
        assert!(loaded.samples()[0].label);
        assert!(!loaded.samples()[1].label);
    }

    #[test]
    fn test_load_rejects_mismatched_files() {
        let dir = tempfile::tempdir().unwrap();
        let features_path = dir.path().join("data.csv");
        let labels_path = dir.path().join("labels.csv");
        std::fs::write(&features_path, "1,2\n3,4\n").unwrap();
        std::fs::write(&labels_path, "1\n").unwrap();
        assert!(matches!(
            Dataset::load(&features_path, &labels_path),
            Err(AppError::Dataset(_))
        ));

        std::fs::write(&labels_path, "1\n0\n").unwrap();
        std::fs::write(&features_path, "1,2\n3,x\n").unwrap();
        let err = Dataset::load(&features_path, &labels_path).unwrap_err();
        assert!(matches!(err, AppError::Dataset(ref m) if m.contains(":2:")));
    }

    #[test]
    fn test_split_sizes() {
        let mut rng = StdRng::seed_from_u64(7);
        let (train, validation) = dataset(6, 4).split(0.25, &mut rng);
        assert_eq!(validation.len(), 3);
        assert_eq!(train.len(), 7);
    }

    #[test]
    fn test_balance_thins_majority() {
        let mut rng = StdRng::seed_from_u64(11);
        let balanced = dataset(90, 10).balance(&mut rng);
        assert_eq!(balanced.positives(), 63);
        assert_eq!(balanced.len(), 73);

        let balanced = dataset(5, 40).balance(&mut rng);
        assert_eq!(balanced.positives(), 5);
        assert_eq!(balanced.len(), 5 + 28);
    }

    #[test]
    fn test_balance_leaves_balanced_or_single_class_alone() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(dataset(50, 50).balance(&mut rng).len(), 100);
        assert_eq!(dataset(0, 40).balance(&mut rng).len(), 40);
        assert_eq!(dataset(75, 25).balance(&mut rng).len(), 100);
    }
}
