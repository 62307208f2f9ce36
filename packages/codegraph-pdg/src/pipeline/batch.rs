//! Batch analysis
//!
//! Procedures are analyzed in parallel on a rayon pool. Outcomes land in a
//! `DashMap` keyed by procedure id together with their discovery index; the
//! final [`BatchResult`] is ordered by that index, so the output does not
//! depend on scheduling. A failing procedure only records its error.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{info, warn};

use super::orchestrator::{PdgPipeline, ProcedureAnalysis};
use crate::config::PdgConfig;
use crate::features::syntax::Procedure;
use crate::shared::models::{PdgError, Result};

/// Outcome of one procedure, in discovery order
#[derive(Debug)]
pub struct BatchEntry {
    pub index: usize,
    /// Unique key; a repeated procedure id gets a `#<n>` suffix
    pub key: String,
    pub outcome: Result<ProcedureAnalysis>,
}

impl BatchEntry {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct BatchResult {
    entries: Vec<BatchEntry>,
    pub elapsed: Duration,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<BatchEntry> {
        self.entries
    }

    pub fn get(&self, key: &str) -> Option<&BatchEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn successes(&self) -> impl Iterator<Item = &ProcedureAnalysis> {
        self.entries.iter().filter_map(|e| e.outcome.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &PdgError)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.as_ref().err().map(|err| (e.key.as_str(), err)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(BatchEntry::is_ok)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchAnalyzer {
    pipeline: PdgPipeline,
    threads: Option<usize>,
}

impl BatchAnalyzer {
    pub fn new(config: &PdgConfig) -> Self {
        Self {
            pipeline: PdgPipeline::new(config.analysis.clone()),
            threads: config.batch.threads,
        }
    }

    pub fn pipeline(&self) -> &PdgPipeline {
        &self.pipeline
    }

    pub fn analyze(&self, procedures: &[Procedure]) -> BatchResult {
        let start = Instant::now();
        let keys = unique_keys(procedures);
        let store: DashMap<String, (usize, Result<ProcedureAnalysis>)> =
            DashMap::with_capacity(procedures.len());

        let run = || {
            procedures
                .par_iter()
                .zip(keys.par_iter())
                .enumerate()
                .for_each(|(index, (procedure, key))| {
                    let outcome = self.pipeline.analyze_procedure(procedure);
                    if let Err(e) = &outcome {
                        warn!(procedure = %key, error = %e, "procedure analysis failed");
                    }
                    store.insert(key.clone(), (index, outcome));
                });
        };

        match self.threads {
            Some(threads) => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => pool.install(run),
                Err(e) => {
                    warn!(threads, error = %e, "dedicated pool unavailable, using the global pool");
                    run();
                }
            },
            None => run(),
        }

        let mut entries: Vec<BatchEntry> = store
            .into_iter()
            .map(|(key, (index, outcome))| BatchEntry {
                index,
                key,
                outcome,
            })
            .collect();
        entries.sort_by_key(|e| e.index);

        let result = BatchResult {
            entries,
            elapsed: start.elapsed(),
        };
        info!(
            procedures = result.len(),
            failed = result.failures().count(),
            elapsed_ms = result.elapsed.as_millis() as u64,
            "batch analyzed"
        );
        result
    }
}

fn unique_keys(procedures: &[Procedure]) -> Vec<String> {
    let mut seen: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    procedures
        .iter()
        .map(|p| {
            let count = seen.entry(p.id.as_str()).or_insert(0);
            *count += 1;
            if *count == 1 {
                p.id.clone()
            } else {
                format!("{}#{}", p.id, count)
            }
        })
        .collect()
}
