use super::{Action, SWEEP_PAGE_SIZE, Stage};
use crate::backoff::BackoffGate;
use std::ops::Deref;
use std::sync::Arc;
use time::UtcDateTime;
use timekeeper_model::PageRequest;
use timekeeper_store::StoreHandle;
use tracing::instrument;

/// How a sweep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Every page was visited.
    Completed,
    /// Skipped entirely; the backoff gate is closed until the given time.
    Gated { until: UtcDateTime },
    /// Stopped early after the provider throttled us.
    Throttled { until: UtcDateTime },
    /// Stopped early because a page could not be read.
    StoreUnavailable,
}

/// What a single sweep did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub outcome: SweepOutcome,
    pub pages: u32,
    pub examined: usize,
    pub transitioned: usize,
}
impl SweepReport {
    fn new() -> Self {
        Self {
            outcome: SweepOutcome::Completed,
            pages: 0,
            examined: 0,
            transitioned: 0,
        }
    }
}

/// Pages through the results a [`Stage`] is interested in, oldest first, and
/// applies whatever the stage decides.
///
/// Page counts are taken from each page as it is fetched. Results that change
/// status during the sweep shift the later pages, so a result may be skipped
/// until the next sweep or seen twice; nothing is ever processed in a sweep
/// after a throttle signal.
#[derive(Debug)]
pub struct Sweeper<S> {
    store: StoreHandle,
    gate: Arc<BackoffGate>,
    stage: S,
}

impl<S: Stage> Sweeper<S> {
    pub fn new(store: StoreHandle, gate: Arc<BackoffGate>, stage: S) -> Self {
        Self { store, gate, stage }
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn gate(&self) -> &Arc<BackoffGate> {
        &self.gate
    }

    /// Run one sweep. Never fails; problems are logged and reported.
    #[instrument(name = "sweep", skip(self), fields(stage = self.stage.name()))]
    pub async fn sweep(&self, now: UtcDateTime) -> SweepReport {
        let mut report = SweepReport::new();
        if let Some(until) = self.gate.get().filter(|until| *until > now) {
            tracing::debug!(until = %until, "Backing off, skipping sweep");
            report.outcome = SweepOutcome::Gated { until };
            return report;
        }

        // Page 0 with SWEEP_PAGE_SIZE items.
        let mut request = PageRequest::default();
        loop {
            let page = match self.store.list_scan_results(self.stage.status(), request).await {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(page = request.page(), error = ?err, "Could not list scan results");
                    report.outcome = SweepOutcome::StoreUnavailable;
                    return report;
                },
            };
            debug_assert_eq!(page.page_size, SWEEP_PAGE_SIZE);
            report.pages += 1;

            for result in &page.items {
                report.examined += 1;
                match self.stage.process(result, now).await {
                    Action::Defer => {},
                    Action::Throttle(until) => {
                        self.gate.advance_to(until);
                        tracing::info!(result_id = %result.id(), until = %until, "Throttled by provider, ending sweep");
                        report.outcome = SweepOutcome::Throttled { until };
                        return report;
                    },
                    Action::Transition(transition) => {
                        match self.store.update_scan_result(result.id(), &transition, now).await {
                            Ok(updated) => {
                                report.transitioned += 1;
                                tracing::info!(
                                    result_id = %updated.id(),
                                    from = %result.status(),
                                    to = %updated.status(),
                                    "Updated scan result"
                                );
                            },
                            Err(err) if err.deref().is_not_found() => {
                                tracing::warn!(result_id = %result.id(), "Scan result disappeared during sweep");
                            },
                            Err(err) => {
                                tracing::warn!(result_id = %result.id(), error = ?err, "Could not update scan result");
                            },
                        }
                    },
                }
            }

            // Page count as of this read; results that left the status since
            // shift later ones forward and are picked up next sweep.
            if !page.has_next() {
                break;
            }
            request = request.next();
        }
        tracing::debug!(
            pages = report.pages,
            examined = report.examined,
            transitioned = report.transitioned,
            "Sweep completed"
        );
        report
    }
}
