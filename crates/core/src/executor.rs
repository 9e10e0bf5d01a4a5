//! A bounded worker pool with dynamically-resizable parallelism and
//! single-point job submission, realizing the `Future<Future<T>>` handoff:
//! the outer future resolves on admission, the inner future on execution.
//! This split is load-bearing — it lets callers measure queue wait
//! separately from execution time and apply backpressure at admission
//! without blocking the submitter's event loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use speedreader_common::{Result, SpeedReaderError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The inner future: resolves when the admitted job's body has run.
pub struct AdmittedJob<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> Future for AdmittedJob<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(value)) => Poll::Ready(Ok(value)),
            Poll::Ready(Err(join_err)) if join_err.is_cancelled() => {
                Poll::Ready(Err(SpeedReaderError::Cancelled))
            }
            Poll::Ready(Err(join_err)) => Poll::Ready(Err(SpeedReaderError::inference(format!(
                "worker task failed: {join_err}"
            )))),
        }
    }
}

/// Bounded worker pool. A single internal semaphore doubles as the slot
/// counter and the FIFO admission queue: `tokio::sync::Semaphore` serves
/// waiters in arrival order, which is exactly submission-order admission.
pub struct ManagedExecutor {
    semaphore: Arc<Semaphore>,
    max_parallelism: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    cancellation: CancellationToken,
}

impl ManagedExecutor {
    pub fn new(initial_parallelism: usize, cancellation: CancellationToken) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(initial_parallelism)),
            max_parallelism: Arc::new(AtomicUsize::new(initial_parallelism)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            cancellation,
        }
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Admits `job` once a slot is available (the outer future), then hands
    /// back the inner future tracking its execution. `job` runs on the
    /// tokio runtime's worker threads; callers that wrap a blocking native
    /// call should do so with `tokio::task::spawn_blocking` inside `job`.
    pub async fn execute_single<F, Fut, T>(&self, job: F) -> Result<AdmittedJob<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = tokio::select! {
            _ = self.cancellation.cancelled() => return Err(SpeedReaderError::Cancelled),
            res = self.semaphore.clone().acquire_owned() => {
                res.map_err(|_| SpeedReaderError::Cancelled)?
            }
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.clone();

        let handle = tokio::spawn(async move {
            let result = job().await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
            result
        });

        Ok(AdmittedJob { handle })
    }

    /// Raises the slot count immediately; may start a queued job.
    pub fn increment_parallelism(&self, by: usize) {
        self.semaphore.add_permits(by);
        self.max_parallelism.fetch_add(by, Ordering::SeqCst);
    }

    /// Lowers the slot count by `by`. Each step acquires a permit before
    /// dropping it permanently, which naturally waits for an in-flight job
    /// to free one if none are currently idle.
    pub async fn decrement_parallelism(&self, by: usize) -> Result<()> {
        for _ in 0..by {
            if self.max_parallelism.load(Ordering::SeqCst) == 0 {
                break;
            }
            let permit = tokio::select! {
                _ = self.cancellation.cancelled() => return Err(SpeedReaderError::Cancelled),
                res = self.semaphore.clone().acquire_owned() => {
                    res.map_err(|_| SpeedReaderError::Cancelled)?
                }
            };
            permit.forget();
            self.max_parallelism.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn admits_and_completes_a_job() {
        let executor = ManagedExecutor::new(2, CancellationToken::new());
        let inner = executor.execute_single(|| async { 42 }).await.unwrap();
        assert_eq!(inner.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_max_parallelism() {
        let executor = Arc::new(ManagedExecutor::new(2, CancellationToken::new()));
        let mut inners = Vec::new();
        for _ in 0..5 {
            let inner = executor
                .execute_single(|| async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    1
                })
                .await
                .unwrap();
            inners.push(inner);
            assert!(executor.in_flight() <= executor.max_parallelism());
        }
        for inner in inners {
            inner.await.unwrap();
        }
        assert_eq!(executor.in_flight(), 0);
    }

    #[tokio::test]
    async fn increment_then_decrement_round_trips_max_parallelism() {
        let executor = ManagedExecutor::new(2, CancellationToken::new());
        executor.increment_parallelism(3);
        assert_eq!(executor.max_parallelism(), 5);
        executor.decrement_parallelism(3).await.unwrap();
        assert_eq!(executor.max_parallelism(), 2);
    }

    #[tokio::test]
    async fn decrement_waits_for_in_flight_job_to_free_a_slot() {
        let executor = Arc::new(ManagedExecutor::new(1, CancellationToken::new()));
        let inner = executor
            .execute_single(|| async {
                tokio::time::sleep(Duration::from_millis(30)).await;
            })
            .await
            .unwrap();

        let exec_clone = executor.clone();
        let decrement = tokio::spawn(async move { exec_clone.decrement_parallelism(1).await });

        inner.await.unwrap();
        decrement.await.unwrap().unwrap();
        assert_eq!(executor.max_parallelism(), 0);
    }

    #[tokio::test]
    async fn cancellation_aborts_admission() {
        let token = CancellationToken::new();
        let executor = ManagedExecutor::new(0, token.clone());
        token.cancel();
        let result = executor.execute_single(|| async { 1 }).await;
        assert!(matches!(result, Err(SpeedReaderError::Cancelled)));
    }
}
