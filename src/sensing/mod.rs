pub mod controller;
mod loop_worker;
pub mod sampler;

pub use controller::{LoopState, SamplingController, DEFAULT_SAMPLE_TIMEOUT, DEFAULT_STOP_TIMEOUT};
pub use sampler::{CapturePlan, Reading, SampleError, Sampler};

/// Runs a single sample on a blocking worker with a caller-owned `Sampler`,
/// independent of any running loop.
pub async fn sample_detached(mut sampler: Sampler, plan: CapturePlan) -> Result<Reading, SampleError> {
    tokio::task::spawn_blocking(move || sampler.sample(&plan))
        .await
        .map_err(|err| SampleError::Worker(err.to_string()))?
}
