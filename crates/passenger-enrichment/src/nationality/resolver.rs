//! Cache-first, bounded, concurrent surname resolution.

use super::{NationalityProvider, SurnameTable};
use crate::error::{LookupError, Result};
use crate::pipeline::progress::{CancellationToken, PipelineStage, ProgressReporter, ProgressUpdate};
use crate::types::ResolutionReport;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

type LookupOutcome = std::result::Result<Option<String>, LookupError>;

/// Resolves surnames through a [`NationalityProvider`] into a [`SurnameTable`].
///
/// Only surnames missing from the table are queried. At most
/// `max_surnames` lookups are issued per run, taken from the sorted list of
/// missing surnames; the rest stay unresolved until a later run. Up to
/// `concurrency` lookups are in flight at once and the table is updated only
/// after every lookup has settled.
pub struct NationalityResolver {
    provider: Arc<dyn NationalityProvider>,
    max_surnames: usize,
    concurrency: usize,
    cancellation_token: CancellationToken,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl NationalityResolver {
    pub fn new(provider: Arc<dyn NationalityProvider>, max_surnames: usize, concurrency: usize) -> Self {
        Self {
            provider,
            max_surnames,
            concurrency: concurrency.max(1),
            cancellation_token: CancellationToken::new(),
            progress_reporter: None,
        }
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Resolve `surnames` not yet present in `table` and insert the results.
    ///
    /// Failed lookups are logged and skipped; they never produce an entry
    /// and never fail the call. Existing entries are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`](crate::error::EnrichmentError::Cancelled) if the token is cancelled while
    /// lookups are running. The table is left unchanged in that case.
    pub fn resolve(&self, surnames: &[String], table: &mut SurnameTable) -> Result<ResolutionReport> {
        let start = Instant::now();

        let mut distinct: Vec<&str> = surnames
            .iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        distinct.sort_unstable();
        distinct.dedup();

        let mut pending: Vec<&str> = distinct
            .iter()
            .copied()
            .filter(|s| !table.contains(s))
            .collect();

        let mut report = ResolutionReport {
            distinct_surnames: distinct.len(),
            cached: distinct.len() - pending.len(),
            ..Default::default()
        };

        if pending.len() > self.max_surnames {
            report.skipped_by_bound = pending.len() - self.max_surnames;
            pending.truncate(self.max_surnames);
            info!(
                "Lookup bound {} reached: {} surnames left unresolved this run",
                self.max_surnames, report.skipped_by_bound
            );
        }
        report.requested = pending.len();

        info!(
            "Resolving {} surnames via {} ({} cached, {} workers)",
            pending.len(),
            self.provider.name(),
            report.cached,
            self.concurrency.min(pending.len().max(1))
        );

        let outcomes = self.lookup_all(&pending)?;

        for (surname, outcome) in pending.iter().zip(outcomes) {
            match outcome {
                Ok(Some(country)) => {
                    debug!("'{}' -> {}", surname, country);
                    report.resolved += 1;
                    table.insert_if_absent(*surname, Some(country));
                }
                Ok(None) => {
                    debug!("'{}' -> no country", surname);
                    report.unmatched += 1;
                    table.insert_if_absent(*surname, None);
                }
                Err(e) => {
                    warn!("Lookup failed for '{}' ({}): {}", surname, e.error_code(), e);
                    report.failed += 1;
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Resolution finished: {} resolved, {} unmatched, {} failed in {} ms",
            report.resolved, report.unmatched, report.failed, report.duration_ms
        );
        Ok(report)
    }

    /// Run every lookup on a bounded pool of scoped worker threads.
    ///
    /// Outcomes are returned in the order of `pending`.
    fn lookup_all(&self, pending: &[&str]) -> Result<Vec<LookupOutcome>> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let total = pending.len();
        let next = AtomicUsize::new(0);
        let settled = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<LookupOutcome>>> =
            Mutex::new((0..total).map(|_| None).collect());
        let workers = self.concurrency.min(total);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        if self.cancellation_token.is_cancelled() {
                            break;
                        }
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(surname) = pending.get(index) else {
                            break;
                        };

                        let outcome = self.provider.lookup(surname);
                        slots.lock()[index] = Some(outcome);

                        let done = settled.fetch_add(1, Ordering::SeqCst) + 1;
                        self.report_progress(ProgressUpdate::with_items(
                            PipelineStage::Resolution,
                            done,
                            total,
                            format!("Resolved {} of {} surnames", done, total),
                        ));
                    }
                });
            }
        });

        if let Err(e) = self.cancellation_token.check() {
            warn!("Resolution cancelled after {} lookups", settled.load(Ordering::SeqCst));
            return Err(e);
        }

        Ok(slots
            .into_inner()
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(LookupError::Transport("lookup never ran".to_string())))
            })
            .collect())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }
}
