//! Composes the kernel, executor, sensor, and optional tuner into a single
//! `run(input, shape)` contract. Adds the leading batch dimension on the way
//! in and strips it on the way out; the executor's outer future becomes the
//! engine's outer future, preserving the admission/execution split upward
//! into the detection and recognition stages.

use std::sync::Arc;
use std::time::Instant;

use speedreader_common::{Result, SpeedReaderError, TensorBuffer};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::TunerConfig;
use crate::executor::{AdmittedJob, ManagedExecutor};
use crate::kernel::Kernel;
use crate::metrics::{MetricsSink, NoopMetricsSink};
use crate::sensor::ThroughputSensor;
use crate::tuner::AdaptiveTuner;

pub struct InferenceEngine {
    kernel: Arc<dyn Kernel>,
    executor: Arc<ManagedExecutor>,
    sensor: Arc<ThroughputSensor>,
    metrics: Arc<dyn MetricsSink>,
    sensor_retention_multiple: f64,
    _tuner_handle: Option<Arc<JoinHandle<()>>>,
}

impl InferenceEngine {
    pub fn new(
        kernel: Arc<dyn Kernel>,
        initial_parallelism: usize,
        tuner_config: Option<TunerConfig>,
        sensor_retention_multiple: f64,
        metrics: Arc<dyn MetricsSink>,
        cancellation: CancellationToken,
    ) -> Self {
        let executor = Arc::new(ManagedExecutor::new(initial_parallelism, cancellation.clone()));
        let sensor = Arc::new(ThroughputSensor::new());

        let tuner_handle = tuner_config.map(|cfg| {
            let tuner = AdaptiveTuner::new(
                executor.clone(),
                sensor.clone(),
                cfg,
                sensor_retention_multiple,
                cancellation.clone(),
            );
            Arc::new(tokio::spawn(async move { tuner.run().await }))
        });

        Self {
            kernel,
            executor,
            sensor,
            metrics,
            sensor_retention_multiple,
            _tuner_handle: tuner_handle,
        }
    }

    /// Constructs an engine with no metrics sink wired in.
    pub fn without_metrics(
        kernel: Arc<dyn Kernel>,
        initial_parallelism: usize,
        tuner_config: Option<TunerConfig>,
        sensor_retention_multiple: f64,
        cancellation: CancellationToken,
    ) -> Self {
        Self::new(
            kernel,
            initial_parallelism,
            tuner_config,
            sensor_retention_multiple,
            Arc::new(NoopMetricsSink),
            cancellation,
        )
    }

    pub fn executor(&self) -> &Arc<ManagedExecutor> {
        &self.executor
    }

    pub fn sensor(&self) -> &Arc<ThroughputSensor> {
        &self.sensor
    }

    /// Submits `input` for inference. The outer await (this call) resolves
    /// once the job is admitted to the executor; the returned `AdmittedJob`
    /// resolves once the kernel call has actually run.
    pub async fn run(&self, input: TensorBuffer) -> Result<AdmittedJob<Result<TensorBuffer>>> {
        let kernel = self.kernel.clone();
        let sensor = self.sensor.clone();
        let metrics = self.metrics.clone();

        let admission_start = Instant::now();
        let (data, shape) = input.with_leading_batch_dim().into_parts();

        let inner = self
            .executor
            .execute_single(move || async move {
                let start = Instant::now();
                let joined = tokio::task::spawn_blocking(move || kernel.execute(&data, &shape)).await;
                let end = Instant::now();
                sensor.record_completion(start, end);
                metrics.record_inference_duration(end.saturating_duration_since(start));

                match joined {
                    Ok(Ok((out_data, out_shape))) => TensorBuffer::new(out_data, out_shape)
                        .map(TensorBuffer::without_leading_batch_dim),
                    Ok(Err(fault)) => Err(fault),
                    Err(join_err) => Err(SpeedReaderError::inference(format!(
                        "kernel task panicked: {join_err}"
                    ))),
                }
            })
            .await?;

        self.metrics.record_queue_wait(admission_start.elapsed());
        self.metrics
            .record_parallelism(self.executor.in_flight(), self.executor.max_parallelism());

        Ok(inner)
    }

    pub fn sensor_retention_multiple(&self) -> f64 {
        self.sensor_retention_multiple
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{EchoKernel, FailingKernel};

    #[tokio::test]
    async fn run_preserves_data_and_strips_batch_dimension() {
        let engine = InferenceEngine::without_metrics(
            Arc::new(EchoKernel),
            2,
            None,
            4.0,
            CancellationToken::new(),
        );
        let input = TensorBuffer::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        let inner = engine.run(input).await.unwrap();
        let output = inner.await.unwrap().unwrap();
        assert_eq!(output.shape(), &[2, 2]);
        assert_eq!(output.data(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn run_surfaces_kernel_faults_in_the_inner_future() {
        let engine = InferenceEngine::without_metrics(
            Arc::new(FailingKernel),
            1,
            None,
            4.0,
            CancellationToken::new(),
        );
        let input = TensorBuffer::new(vec![1.0], vec![1]).unwrap();
        let inner = engine.run(input).await.unwrap();
        let result = inner.await.unwrap();
        assert!(matches!(result, Err(SpeedReaderError::InferenceFault(_))));
    }
}
