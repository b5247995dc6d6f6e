use serde::Serialize;
use std::ops::Deref;

/// Per-cell foreground pixel counts: pathway counts for every grid cell
/// followed by player counts for every grid cell, both in grid order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureVector(Vec<u32>);

impl FeatureVector {
    pub fn new(values: Vec<u32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn pathway(&self) -> &[u32] {
        &self.0[..self.0.len() / 2]
    }

    pub fn player(&self) -> &[u32] {
        &self.0[self.0.len() / 2..]
    }

    pub fn to_csv_line(&self) -> String {
        self.0
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Deref for FeatureVector {
    type Target = [u32];

    fn deref(&self) -> &[u32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halves_and_csv() {
        let features = FeatureVector::new(vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(features.pathway(), &[1, 2, 3]);
        assert_eq!(features.player(), &[4, 5, 6]);
        assert_eq!(features.to_csv_line(), "1,2,3,4,5,6");
        assert_eq!(features.len(), 6);
    }
}
