//! Dispatcher execution logic

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::config::effective_concurrency;
use crate::error::{BenchError, BenchResult};
use crate::logging::RunLogger;
use crate::request::RunRequest;
use crate::response::RunOutcome;
use crate::traits::VendorClient;

use super::stats::DispatchStats;

/// How a launched run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// Clonable handle that stops a running dispatcher
///
/// Queued runs are not launched and in-flight runs are abandoned at their
/// next suspension point. Cancelled runs emit no outcome.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

/// In-flight gauge shared by all run tasks
#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Bounded fan-out of runs with a single fan-in result channel
///
/// One tokio task per run. A run holds its admission permit for its whole
/// lifecycle, so at most `min(concurrency, runs)` runs are ever in flight.
/// The result channel closes once `run` returns, which happens only after
/// every launched task has finished.
pub struct Dispatcher {
    /// Vendor client (shared across run tasks)
    pub(crate) client: Arc<dyn VendorClient>,

    /// Run event sink
    pub(crate) logger: Arc<dyn RunLogger>,

    /// Result sender (cloned for each run task)
    pub(crate) results_tx: mpsc::Sender<RunOutcome>,

    /// Requested concurrency (0 = all runs at once)
    pub(crate) concurrency: usize,

    /// Shutdown signal sender
    pub(crate) shutdown_tx: broadcast::Sender<()>,

    /// Admission loop's view of the shutdown signal, subscribed at
    /// construction so a signal sent before `run` is not lost
    pub(crate) shutdown_rx: broadcast::Receiver<()>,
}

impl Dispatcher {
    /// Create a new dispatcher
    ///
    /// Use `DispatcherBuilder` for a more ergonomic construction.
    pub fn new(
        client: Arc<dyn VendorClient>,
        logger: Arc<dyn RunLogger>,
        results_tx: mpsc::Sender<RunOutcome>,
        concurrency: usize,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            client,
            logger,
            results_tx,
            concurrency,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Get a handle that can stop this dispatcher from another task
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Trigger shutdown of all runs
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Dispatch every request and wait for all of them to finish
    ///
    /// Consumes the dispatcher so the result channel closes on return.
    pub async fn run(mut self, requests: Vec<RunRequest>) -> BenchResult<DispatchStats> {
        let concurrency = effective_concurrency(self.concurrency, requests.len());
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let in_flight = Arc::new(InFlight::default());

        let mut stats = DispatchStats::new(requests.len(), concurrency);
        stats.start();

        tracing::info!(
            runs = requests.len(),
            concurrency,
            style = %self.client.style(),
            model = self.client.model_name(),
            "Starting dispatch"
        );

        let mut handles: Vec<JoinHandle<RunStatus>> = Vec::with_capacity(requests.len());

        for request in requests {
            // Subscribe before admission so the task sees any later signal
            let task_shutdown = self.shutdown_tx.subscribe();

            let permit = tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    tracing::info!(
                        dispatched = handles.len(),
                        "Shutdown received, no further runs will be dispatched"
                    );
                    break;
                }

                permit = Arc::clone(&semaphore).acquire_owned() => {
                    permit.map_err(|_| BenchError::Shutdown)?
                }
            };

            let client = Arc::clone(&self.client);
            let logger = Arc::clone(&self.logger);
            let results_tx = self.results_tx.clone();
            let in_flight = Arc::clone(&in_flight);

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                in_flight.enter();
                let status =
                    execute_run(client, logger, results_tx, request, task_shutdown).await;
                in_flight.exit();
                status
            }));
        }

        stats.dispatched = handles.len();

        // Completion barrier
        for handle in handles {
            match handle.await {
                Ok(RunStatus::Succeeded) => stats.succeeded += 1,
                Ok(RunStatus::Failed) => stats.failed += 1,
                Ok(RunStatus::Cancelled) => stats.cancelled += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!(error = %e, "Run task panicked");
                }
            }
        }

        stats.peak_in_flight = in_flight.peak();
        stats.stop();

        tracing::info!(
            elapsed_secs = stats.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.0),
            succeeded = stats.succeeded,
            failed = stats.failed,
            cancelled = stats.cancelled,
            not_started = stats.not_started(),
            completed = stats.completed(),
            runs_per_sec = stats.runs_per_second(),
            peak_in_flight = stats.peak_in_flight,
            "Dispatch completed"
        );

        Ok(stats)
    }

    /// Run with Ctrl+C signal handling
    ///
    /// Automatically triggers shutdown on Ctrl+C.
    pub async fn run_with_signal_handling(
        self,
        requests: Vec<RunRequest>,
    ) -> BenchResult<DispatchStats> {
        let shutdown = self.shutdown_handle();

        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl+C, cancelling in-flight runs...");
                    shutdown.shutdown();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        });

        let result = self.run(requests).await;

        signal_handle.abort();

        result
    }
}

/// One run's lifecycle: execute, report, release
async fn execute_run(
    client: Arc<dyn VendorClient>,
    logger: Arc<dyn RunLogger>,
    results_tx: mpsc::Sender<RunOutcome>,
    request: RunRequest,
    mut shutdown: broadcast::Receiver<()>,
) -> RunStatus {
    let run_id = request.id;

    let outcome: RunOutcome = tokio::select! {
        biased;

        _ = shutdown.recv() => {
            logger.event(run_id, "cancelled", &[]);
            return RunStatus::Cancelled;
        }

        result = client.execute(&request) => result.into(),
    };

    let status = if outcome.is_success() {
        RunStatus::Succeeded
    } else {
        RunStatus::Failed
    };

    if results_tx.send(outcome).await.is_err() {
        tracing::debug!(run = run_id.0, "Result channel closed, outcome dropped");
    }

    status
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("style", &self.client.style())
            .field("model", &self.client.model_name())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}
