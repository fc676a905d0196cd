//! Per-entity score aggregation.
//!
//! This module rolls the detailed run records up into one summary per
//! submitter and computes a few run-level statistics.

use crate::models::{EntitySummary, FailurePolicy, RunRecord};
use std::collections::BTreeMap;

/// Group records by entity id (exact string match), ordered by id.
pub fn group_by_entity(records: &[RunRecord]) -> BTreeMap<&str, Vec<&RunRecord>> {
    let mut grouped: BTreeMap<&str, Vec<&RunRecord>> = BTreeMap::new();

    for record in records {
        grouped
            .entry(record.entity_id.as_str())
            .or_default()
            .push(record);
    }

    grouped
}

/// Compute the average score for every entity, sorted by entity id.
pub fn summarize(records: &[RunRecord], policy: FailurePolicy) -> Vec<EntitySummary> {
    group_by_entity(records)
        .into_iter()
        .map(|(entity_id, group)| {
            let failures = group.iter().filter(|r| !r.succeeded).count();

            let scores: Vec<f64> = group
                .iter()
                .filter(|r| policy == FailurePolicy::Include || r.succeeded)
                .map(|r| r.score as f64)
                .collect();

            EntitySummary {
                entity_id: entity_id.to_string(),
                average_score: mean(&scores),
                submissions: group.len(),
                failures,
            }
        })
        .collect()
}

/// Count of records whose classification failed.
pub fn failure_count(records: &[RunRecord]) -> usize {
    records.iter().filter(|r| !r.succeeded).count()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
