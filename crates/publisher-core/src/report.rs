//! Failure report formatting and persistence.

use std::cmp::Ordering;

use tracing::{debug, error};

use publisher_common::CollectionStore;

/// Join failed token ids into a comma-separated report, numerically sorted.
/// Ids that do not parse as integers sort after the numeric ones.
pub fn failure_report(ids: &[String]) -> String {
    let mut sorted: Vec<&str> = ids.iter().map(String::as_str).collect();
    sorted.sort_by(|a, b| match (a.parse::<u128>(), b.parse::<u128>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
    sorted.join(",")
}

/// Persist the report for a finished job. Nothing is written when the job
/// had no failures.
pub async fn persist_failure_report(
    store: &dyn CollectionStore,
    collection_id: &str,
    ids: &[String],
) {
    if ids.is_empty() {
        return;
    }
    let report = failure_report(ids);
    debug!(
        target: "publisher_core::report",
        collection_id = %collection_id,
        failed = ids.len(),
        report = %report,
        "list of failed token ids"
    );
    if let Err(e) = store.store_failed_ids(collection_id, &report).await {
        error!(
            target: "publisher_core::report",
            collection_id = %collection_id,
            error = format!("{e:#}"),
            "failed to persist failure report"
        );
    }
}
