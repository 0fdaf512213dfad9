//! Fan-out of per-law work
//!
//! Laws are independent, so each one runs as its own blocking task and a
//! failing law is recorded without stopping the rest.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info};

use crate::progress::{EntryStatus, ProgressReporter};

/// Outcome of a batch over laws.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    /// `(law_id, message)`
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} succeeded, {} failed", self.succeeded.len(), self.failed.len())?;
        for (law_id, message) in &self.failed {
            write!(f, "\n  {law_id}: {message}")?;
        }
        Ok(())
    }
}

/// Run `job` for every law on the blocking pool, at most `concurrency` at a
/// time. Outputs of successful laws come back in input order.
pub async fn for_each_law<T, F>(
    laws: Vec<String>,
    concurrency: usize,
    reporter: Arc<dyn ProgressReporter>,
    job: F,
) -> (BatchReport, Vec<(String, T)>)
where
    T: Send + 'static,
    F: Fn(&str) -> Result<T, crate::Error> + Send + Sync + 'static,
{
    let job = Arc::new(job);
    reporter.register_entries(laws.clone());

    let mut results = stream::iter(laws.into_iter().enumerate())
        .map(|(index, law_id)| {
            let job = job.clone();
            let reporter = reporter.clone();
            async move {
                reporter.update_entry(&law_id, EntryStatus::Processing);
                let task_law = law_id.clone();
                let result = match tokio::task::spawn_blocking(move || job(&task_law)).await {
                    Ok(Ok(output)) => Ok(output),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(e) => Err(format!("worker panicked: {e}")),
                };
                match &result {
                    Ok(_) => reporter.update_entry(&law_id, EntryStatus::Done),
                    Err(message) => {
                        error!(%law_id, %message, "law failed");
                        reporter.update_entry(&law_id, EntryStatus::Failed(message.clone()));
                    }
                }
                (index, law_id, result)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;
    results.sort_by_key(|(index, _, _)| *index);

    let mut report = BatchReport::default();
    let mut outputs = Vec::new();
    for (_, law_id, result) in results {
        match result {
            Ok(output) => {
                report.succeeded.push(law_id.clone());
                outputs.push((law_id, output));
            }
            Err(message) => report.failed.push((law_id, message)),
        }
    }
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "batch finished"
    );
    (report, outputs)
}
