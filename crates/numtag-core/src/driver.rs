//! Fan-out of per-page labeler calls.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::labeler::{LabelerError, PageRequest, SemanticLabeler};
use crate::response::{parse_labeler_response, reconcile};
use crate::{Config, GroupedRecords, PageOutcome, PageStatus, ProgressEvent};

type Progress = dyn Fn(ProgressEvent) + Send + Sync;

/// Label every page in `grouped` that has at least one record.
///
/// One task is spawned per page; a semaphore of `config.concurrency` permits
/// bounds how many labeler calls are in flight. Outcomes are returned in
/// completion order unless `config.sort_by_page` is set. A failing page never
/// affects the others.
pub async fn label_pages(
    pages: &BTreeMap<u32, String>,
    grouped: GroupedRecords,
    labeler: Arc<dyn SemanticLabeler>,
    config: &Config,
    progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> Vec<PageOutcome> {
    let grouped: Vec<_> = grouped
        .into_iter()
        .filter(|(_, records)| !records.is_empty())
        .collect();
    let total = grouped.len();
    if total == 0 {
        return vec![];
    }

    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let progress: Arc<Progress> = Arc::new(progress);
    let timeout = Duration::from_secs(config.timeout_secs);

    tracing::info!(
        pages = total,
        concurrency = config.concurrency.max(1),
        labeler = labeler.name(),
        model = %config.model_id,
        "labeling pages"
    );

    let mut pending = BTreeSet::new();
    let mut join_set = JoinSet::new();
    for (page_number, records) in grouped {
        pending.insert(page_number);
        let request = PageRequest {
            page_number,
            page_text: pages.get(&page_number).cloned().unwrap_or_default(),
            records,
            model_id: config.model_id.clone(),
        };
        let labeler = Arc::clone(&labeler);
        let semaphore = Arc::clone(&semaphore);
        let progress = Arc::clone(&progress);
        let cancel = cancel.clone();

        join_set.spawn(async move {
            let (result, elapsed) = call_labeler(
                labeler.as_ref(),
                &request,
                &semaphore,
                timeout,
                &cancel,
                progress.as_ref(),
            )
            .await;
            (request, result, elapsed)
        });
    }

    let mut outcomes = Vec::with_capacity(total);
    while let Some(joined) = join_set.join_next().await {
        let (request, result, elapsed) = match joined {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "labeling task failed");
                continue;
            }
        };
        pending.remove(&request.page_number);

        let (outcome, message) = settle(&request, result, progress.as_ref());
        let status = outcome.status();
        outcomes.push(outcome);
        progress(ProgressEvent::PageCompleted {
            page_number: request.page_number,
            completed: outcomes.len(),
            total,
            status,
            elapsed,
            message,
        });
    }

    // Pages whose task panicked or was aborted.
    for page_number in pending {
        let error = "labeling task did not complete".to_string();
        outcomes.push(PageOutcome::Failed {
            page_number,
            error: error.clone(),
        });
        progress(ProgressEvent::PageCompleted {
            page_number,
            completed: outcomes.len(),
            total,
            status: PageStatus::Failed,
            elapsed: Duration::ZERO,
            message: Some(error),
        });
    }

    if config.sort_by_page {
        outcomes.sort_by_key(PageOutcome::page_number);
    }
    outcomes
}

/// Wait for a permit, then call the labeler under the timeout.
///
/// The returned duration covers the labeler call only, not the wait.
async fn call_labeler(
    labeler: &dyn SemanticLabeler,
    request: &PageRequest,
    semaphore: &Semaphore,
    timeout: Duration,
    cancel: &CancellationToken,
    progress: &Progress,
) -> (Result<String, LabelerError>, Duration) {
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return (Err(LabelerError::Cancelled), Duration::ZERO),
        permit = semaphore.acquire() => match permit {
            Ok(p) => p,
            Err(_) => return (Err(LabelerError::Cancelled), Duration::ZERO),
        },
    };

    progress(ProgressEvent::PageStarted {
        page_number: request.page_number,
        tokens: request.records.len(),
    });
    tracing::debug!(
        page = request.page_number,
        tokens = request.records.len(),
        "calling labeler"
    );

    let start = Instant::now();
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LabelerError::Cancelled),
        r = tokio::time::timeout(timeout, labeler.label(request)) => {
            r.unwrap_or(Err(LabelerError::Timeout(timeout)))
        }
    };
    (result, start.elapsed())
}

/// Turn a labeler result into a page outcome, reporting reconciliation gaps.
///
/// Also returns the message to attach to the completion event.
fn settle(
    request: &PageRequest,
    result: Result<String, LabelerError>,
    progress: &Progress,
) -> (PageOutcome, Option<String>) {
    let page_number = request.page_number;
    let raw = match result {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(page = page_number, error = %e, "labeling failed");
            let error = e.to_string();
            return (
                PageOutcome::Failed {
                    page_number,
                    error: error.clone(),
                },
                Some(error),
            );
        }
    };

    let parsed = match parse_labeler_response(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(page = page_number, error = %e, "keeping raw model response");
            return (
                PageOutcome::Unparsed { page_number, raw },
                Some(e.to_string()),
            );
        }
    };

    let reconciliation = reconcile(&request.records, &parsed.results);
    if !reconciliation.is_complete() {
        tracing::warn!(
            page = page_number,
            expected = reconciliation.expected,
            returned = reconciliation.returned,
            missing = ?reconciliation.missing,
            "model did not return every value"
        );
        progress(ProgressEvent::Reconciliation {
            page_number,
            expected: reconciliation.expected,
            returned: reconciliation.returned,
            missing: reconciliation.missing.clone(),
        });
    }

    (
        PageOutcome::Labeled {
            page_number,
            response: parsed.object,
            results: parsed.results,
            reconciliation,
        },
        None,
    )
}
