//! Bulk QID → Freebase MID conversion.
//!
//! Every QID is looked up once (`limit = 1`). Hits are folded into a
//! `MID → QID` dictionary in input order, so when two QIDs resolve to the
//! same MID the later QID wins. Lookup failures are counted, never raised.

use anyhow::{Context, Result};
use fbwd_sparql::{EntityConverter, SparqlEndpoint};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Worker threads; `1` runs on the calling thread.
    pub jobs: usize,
    /// Log progress every this many lookups (`0` disables).
    pub progress_every: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            progress_every: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// MID → QID.
    pub mapping: BTreeMap<String, String>,
    /// Lookups that returned a MID.
    pub successes: usize,
    /// Lookups that returned nothing (not found or failed).
    pub failures: usize,
    pub total: usize,
}

impl BatchReport {
    pub fn failure_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failures as f64 / self.total as f64
        }
    }
}

/// Run the batch with an arbitrary lookup function.
pub fn convert_qids<F>(qids: &[String], lookup: F, options: &BatchOptions) -> Result<BatchReport>
where
    F: Fn(&str) -> Option<String> + Sync,
{
    let total = qids.len();
    let done = AtomicUsize::new(0);
    let step = |qid: &String| {
        let mid = lookup(qid);
        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        if options.progress_every > 0 && n % options.progress_every == 0 {
            tracing::info!(done = n, total, "freebase id lookups");
        }
        mid
    };

    let mids: Vec<Option<String>> = if options.jobs <= 1 {
        qids.iter().map(step).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs)
            .build()
            .context("failed to build lookup thread pool")?;
        // `collect` on an indexed parallel iterator keeps input order.
        pool.install(|| qids.par_iter().map(step).collect())
    };

    Ok(fold_lookups(qids, mids))
}

/// Run the batch against a SPARQL-backed [`EntityConverter`].
pub fn convert_qids_with<E>(
    converter: &EntityConverter<E>,
    qids: &[String],
    options: &BatchOptions,
) -> Result<BatchReport>
where
    E: SparqlEndpoint + Sync,
{
    convert_qids(
        qids,
        |qid| {
            converter
                .freebase_id(qid, 1)
                .and_then(|found| found.first().map(str::to_string))
        },
        options,
    )
}

fn fold_lookups(qids: &[String], mids: Vec<Option<String>>) -> BatchReport {
    let total = qids.len();
    let mut mapping = BTreeMap::new();
    let mut successes = 0;
    for (qid, mid) in qids.iter().zip(mids) {
        if let Some(mid) = mid {
            successes += 1;
            mapping.insert(mid, qid.clone());
        }
    }
    BatchReport {
        mapping,
        successes,
        failures: total - successes,
        total,
    }
}
