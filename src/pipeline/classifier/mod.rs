pub mod feature;
pub mod grid;
pub mod mask;
pub mod morphology;
pub mod region_grid;

pub use feature::FeatureVector;
pub use grid::{CellOrigin, GridLayout};
pub use region_grid::{FrameClassifier, RegionGridClassifier};
