//! Sequential, paced batch execution.
//!
//! Every screen that pushes a list of rows to a remote service (case upload,
//! Slack forwarding, bulk translation, translation save) goes through
//! [`BatchPipeline::run`]:
//! - exactly one remote call is in flight at a time
//! - a row is marked in-flight before its call starts and resolved after it returns
//! - a failing row never stops the run
//! - consecutive calls are separated by the configured pacing interval
//! - a run dropped mid-call leaves the in-flight row retryable, never stuck
//!
//! The downstream APIs enforce low per-second limits, so the loop must stay
//! sequential.

use crate::domain::error::Result;
use crate::domain::pipeline::{ItemOutcome, PipelineEvent, PipelineRunResult, PipelineTally};
use crate::domain::test_case::{ItemStatus, StagedItem};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A row the pipeline can drive through its status lifecycle.
pub trait PipelineItem: Clone {
    /// Value produced by a successful remote call, written back on success.
    type Output;

    fn label(&self) -> String;

    /// Rows that already reached a good terminal state are passed over.
    fn is_actionable(&self) -> bool;

    fn begin(&mut self) -> Result<()>;

    fn succeed(&mut self, output: Self::Output) -> Result<()>;

    fn fail(&mut self, message: &str) -> Result<()>;

    /// The run was dropped while this row's call was in flight. The outcome
    /// is unknown, so the row is put back where a rerun picks it up.
    fn interrupt(&mut self) {
        if let Err(err) = self.fail(INTERRUPTED) {
            warn!(no = %self.label(), error = %err, "Interrupted row not reset");
        }
    }
}

pub const INTERRUPTED: &str = "interrupted before the call resolved";

/// Holds the row whose call is awaited; resets it if the run is dropped.
struct InFlight<'a, T: PipelineItem> {
    item: &'a mut T,
    armed: bool,
}

impl<T: PipelineItem> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.item.interrupt();
        }
    }
}

/// Receives run progress. The UI log and the HTTP log buffer implement this.
pub trait PipelineSink: Send + Sync {
    fn publish(&self, event: &PipelineEvent);
}

impl<F> PipelineSink for F
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    fn publish(&self, event: &PipelineEvent) {
        self(event)
    }
}

/// Sink that only forwards to tracing.
pub struct TracingSink;

impl PipelineSink for TracingSink {
    fn publish(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::ItemFailed {
                index,
                label,
                message,
            } => warn!(index, no = %label, error = %message, "Pipeline item failed"),
            other => debug!(event = ?other, "Pipeline event"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchPipeline {
    pace: Duration,
}

impl BatchPipeline {
    pub fn new(pace: Duration) -> Self {
        Self { pace }
    }

    pub fn pace(&self) -> Duration {
        self.pace
    }

    /// Runs `operation` over every actionable row of `items`, in order.
    ///
    /// Each row is handed to the operation as a snapshot taken right after it
    /// was marked in-flight. The returned tally tells the caller whether the
    /// staged list can be cleared (`failed == 0`).
    pub async fn run<T, F, Fut>(
        &self,
        items: &mut [T],
        sink: &dyn PipelineSink,
        mut operation: F,
    ) -> PipelineRunResult
    where
        T: PipelineItem,
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<T::Output>>,
    {
        let run_id = Uuid::new_v4().to_string();
        let started_at = chrono::Utc::now().timestamp_millis();
        let actionable = items.iter().filter(|item| item.is_actionable()).count();

        info!(run_id = %run_id, total = actionable, pace_ms = self.pace.as_millis() as u64, "Pipeline run started");
        sink.publish(&PipelineEvent::Started {
            run_id: run_id.clone(),
            total: actionable,
        });

        let mut outcomes = Vec::with_capacity(actionable);
        let mut tally = PipelineTally::default();
        let mut skipped = 0;
        let mut first = true;

        for (index, item) in items.iter_mut().enumerate() {
            if !item.is_actionable() {
                skipped += 1;
                continue;
            }

            if !first && !self.pace.is_zero() {
                tokio::time::sleep(self.pace).await;
            }
            first = false;

            let label = item.label();
            if let Err(err) = item.begin() {
                warn!(index, no = %label, error = %err, "Row refused to enter flight");
                skipped += 1;
                continue;
            }
            sink.publish(&PipelineEvent::ItemStarted {
                index,
                label: label.clone(),
            });

            let mut flight = InFlight { item, armed: true };
            let called = operation(flight.item.clone()).await;
            flight.armed = false;
            let item = &mut *flight.item;

            let outcome = match called {
                Ok(output) => {
                    if let Err(err) = item.succeed(output) {
                        warn!(index, no = %label, error = %err, "Row status not updated");
                    }
                    tally.succeeded += 1;
                    sink.publish(&PipelineEvent::ItemSucceeded {
                        index,
                        label: label.clone(),
                    });
                    ItemOutcome {
                        index,
                        label,
                        succeeded: true,
                        message: None,
                    }
                }
                Err(err) => {
                    let message = err.to_string();
                    if let Err(mark_err) = item.fail(&message) {
                        warn!(index, no = %label, error = %mark_err, "Row status not updated");
                    }
                    tally.failed += 1;
                    sink.publish(&PipelineEvent::ItemFailed {
                        index,
                        label: label.clone(),
                        message: message.clone(),
                    });
                    ItemOutcome {
                        index,
                        label,
                        succeeded: false,
                        message: Some(message),
                    }
                }
            };
            outcomes.push(outcome);
        }

        info!(
            run_id = %run_id,
            succeeded = tally.succeeded,
            failed = tally.failed,
            "Pipeline run finished"
        );
        sink.publish(&PipelineEvent::Finished {
            run_id: run_id.clone(),
            tally,
        });

        PipelineRunResult {
            run_id,
            outcomes,
            tally,
            skipped,
            started_at,
            finished_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl PipelineItem for StagedItem {
    type Output = ();

    fn label(&self) -> String {
        self.no.clone()
    }

    fn is_actionable(&self) -> bool {
        matches!(self.status, ItemStatus::Ready | ItemStatus::Error)
    }

    fn begin(&mut self) -> Result<()> {
        self.transition(ItemStatus::Uploading, None)
    }

    fn succeed(&mut self, _: ()) -> Result<()> {
        self.transition(ItemStatus::Success, None)
    }

    fn fail(&mut self, message: &str) -> Result<()> {
        self.transition(ItemStatus::Error, Some(message.to_string()))
    }
}
