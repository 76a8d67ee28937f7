//! Fan-out/fan-in aggregation across all configured source adapters, with
//! cross-source dedup and stable ordering.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use jobmesh_adapters::SourceAdapter;
use jobmesh_core::{Job, JobSearchQuery, JobSource};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

pub const CRATE_NAME: &str = "jobmesh-aggregate";

/// One adapter's failure, preserved alongside the successful payload so a
/// caller can tell "no matches" apart from "all sources failed".
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub jobs: Vec<Job>,
    /// Deduplicated count actually returned, not the raw pre-dedup count.
    pub total: usize,
    /// Sources that contributed successfully.
    pub sources: Vec<String>,
    pub failures: Vec<SourceFailure>,
}

/// Dispatches one query to every adapter concurrently, tolerates
/// per-adapter failure, dedups across sources and orders the merged set.
pub struct Aggregator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl Aggregator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn sources(&self) -> Vec<JobSource> {
        self.adapters.iter().map(|a| a.source()).collect()
    }

    /// The sole search entry point. Fails only when zero adapters are
    /// configured; individual adapter failures become `failures` entries.
    pub async fn search(&self, query: &JobSearchQuery) -> Result<SearchOutcome> {
        if self.adapters.is_empty() {
            bail!("no source adapters configured");
        }
        let query = query.normalized();

        // Settle-all fan-out: every adapter runs to completion; a failure
        // or panic in one never cancels its siblings.
        let mut handles = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let task_query = query.clone();
            let source = adapter.source();
            handles.push((
                source,
                tokio::spawn(async move { adapter.search(&task_query).await }),
            ));
        }

        let mut collected = Vec::new();
        let mut sources = Vec::new();
        let mut failures = Vec::new();
        for (source, handle) in handles {
            match handle.await {
                Ok(Ok(jobs)) => {
                    debug!(source = %source, count = jobs.len(), "adapter search succeeded");
                    sources.push(source.as_str().to_string());
                    collected.extend(jobs);
                }
                Ok(Err(err)) => {
                    warn!(source = %source, %err, "adapter search failed");
                    failures.push(SourceFailure {
                        source: source.as_str().to_string(),
                        message: err.to_string(),
                    });
                }
                Err(join_err) => {
                    warn!(source = %source, %join_err, "adapter task aborted");
                    failures.push(SourceFailure {
                        source: source.as_str().to_string(),
                        message: format!("adapter task aborted: {join_err}"),
                    });
                }
            }
        }

        let mut jobs = dedup_jobs(collected);
        // Stable sort keeps insertion order for equal timestamps.
        jobs.sort_by(|a, b| b.posted_date.cmp(&a.posted_date));
        let total = jobs.len();

        Ok(SearchOutcome {
            jobs,
            total,
            sources,
            failures,
        })
    }

    /// Route a detail lookup to the adapter owning `source`; `Ok(None)`
    /// when that source is not configured.
    pub async fn get_job_details(
        &self,
        source: JobSource,
        external_id: &str,
    ) -> Result<Option<Job>> {
        let Some(adapter) = self.adapters.iter().find(|a| a.source() == source) else {
            warn!(source = %source, "detail lookup for an unconfigured source");
            return Ok(None);
        };
        Ok(adapter.get_job_details(external_id).await?)
    }
}

/// First-seen wins, first on the exact `(source, external_id)` natural key,
/// then on the normalized title/company/location fingerprint to catch the
/// same posting re-listed on two boards.
fn dedup_jobs(jobs: Vec<Job>) -> Vec<Job> {
    let mut seen_keys: HashSet<(JobSource, String)> = HashSet::new();
    let mut seen_fingerprints: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(jobs.len());
    for job in jobs {
        if !seen_keys.insert((job.source, job.external_id.clone())) {
            continue;
        }
        if !seen_fingerprints.insert(fingerprint_hash(&job)) {
            continue;
        }
        out.push(job);
    }
    out
}

fn fingerprint_hash(job: &Job) -> String {
    let mut hasher = Sha256::new();
    hasher.update(job.fingerprint().as_bytes());
    hex::encode(hasher.finalize())
}
