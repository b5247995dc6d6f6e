pub mod frame;

pub use frame::{CropRect, Frame};
