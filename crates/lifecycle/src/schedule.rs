//! Fixed-delay scheduling of sweeps.

use crate::clock::ClockHandle;
use crate::sweep::{Stage, SweepOutcome, Sweeper};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Tracks when a periodic job is next due.
///
/// The next run is due one interval after the previous run *completed*, so
/// a slow run pushes the following one back instead of overlapping it.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    last_completion: Option<Instant>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_completion: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the next run is due; `None` means right away.
    pub fn next_run(&self) -> Option<Instant> {
        self.last_completion.map(|at| at + self.interval)
    }

    pub fn mark_completed(&mut self, at: Instant) {
        self.last_completion = Some(at);
    }

    /// Sleep until the next run is due.
    pub async fn wait(&self) {
        if let Some(at) = self.next_run() {
            tokio::time::sleep_until(at).await;
        }
    }
}

/// Run `job` on a fixed delay until `shutdown` is cancelled.
///
/// A run that has already started is always allowed to finish.
pub async fn run_periodically<F, Fut>(name: &'static str, interval: Duration, shutdown: CancellationToken, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = Ticker::new(interval);
    tracing::info!(job = name, interval = ?ticker.interval(), "Starting periodic job");
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.wait() => {},
        }
        job().await;
        ticker.mark_completed(Instant::now());
    }
    tracing::info!(job = name, "Stopped periodic job");
}

/// Spawn a task that sweeps with `sweeper` every `interval`.
pub fn spawn_sweeper<S>(
    sweeper: Arc<Sweeper<S>>,
    clock: ClockHandle,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    S: Stage + 'static,
{
    let name = sweeper.stage().name();
    tokio::spawn(run_periodically(name, interval, shutdown, move || {
        let sweeper = Arc::clone(&sweeper);
        let clock = Arc::clone(&clock);
        async move {
            let report = sweeper.sweep(clock.now()).await;
            match report.outcome {
                SweepOutcome::Gated { .. } => {},
                outcome => tracing::info!(
                    stage = name,
                    outcome = ?outcome,
                    pages = report.pages,
                    examined = report.examined,
                    transitioned = report.transitioned,
                    "Sweep finished"
                ),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type BoxedRun = Pin<Box<dyn Future<Output = ()> + Send>>;

    #[test]
    fn test_ticker() {
        let mut ticker = Ticker::new(Duration::from_secs(10));
        assert_eq!(ticker.next_run(), None);
        let now = Instant::now();
        ticker.mark_completed(now);
        assert_eq!(ticker.next_run(), Some(now + Duration::from_secs(10)));
    }

    fn counting_job(runs: &Arc<AtomicUsize>, takes: Duration) -> impl FnMut() -> BoxedRun + Send + 'static {
        let runs = Arc::clone(runs);
        move || {
            let runs = Arc::clone(&runs);
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(takes).await;
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_interval() {
        let runs = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_periodically(
            "test",
            Duration::from_secs(10),
            shutdown.clone(),
            counting_job(&runs, Duration::ZERO),
        ));

        // Runs at 0s, 10s and 20s.
        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_starts_after_completion() {
        let runs = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_periodically(
            "test",
            Duration::from_secs(10),
            shutdown.clone(),
            counting_job(&runs, Duration::from_secs(5)),
        ));

        // Starts at 0s and 15s; the next would be at 30s.
        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_job_finishes_before_shutdown() {
        let runs = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let job = {
            let runs = Arc::clone(&runs);
            let finished = Arc::clone(&finished);
            move || {
                let runs = Arc::clone(&runs);
                let finished = Arc::clone(&finished);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                }
            }
        };
        let handle = tokio::spawn(run_periodically("test", Duration::from_secs(10), shutdown.clone(), job));

        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
