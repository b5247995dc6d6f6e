mod executor;
mod future;
mod state;

pub use executor::FeatureExtractionExecutor;
pub use future::FeatureFuture;
pub use state::ExecutorState;
