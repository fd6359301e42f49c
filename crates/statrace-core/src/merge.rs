//! Cross-source batch merging with value-based duplicate resolution.
//!
//! The same entity can show up twice inside one period: upstream pages
//! sometimes list a partial-appearance row next to the full-match row, and
//! two sources can both cover the same fixture. The higher-valued record is
//! definitionally the more complete one, so duplicates resolve by value,
//! not by arrival order.

use std::collections::{BTreeMap, HashMap};

use crate::record::{PeriodBatch, RawRecord};

/// Merge record batches from any number of sources into one deduplicated
/// record list per period.
///
/// Within a period, records sharing the same `key_field` value collapse to
/// the record with the strictly higher `value_fn`; ties keep the
/// first-encountered record, so the result is deterministic for a given
/// input order. Records missing `key_field` cannot be attributed to an
/// entity and are dropped with a warning.
pub fn merge_sources<F>(
    batches: &[PeriodBatch],
    key_field: &str,
    value_fn: F,
) -> BTreeMap<u32, Vec<RawRecord>>
where
    F: Fn(&RawRecord) -> f64,
{
    let mut merged: BTreeMap<u32, Vec<RawRecord>> = BTreeMap::new();
    for batch in batches {
        merged
            .entry(batch.period)
            .or_default()
            .extend(batch.records.iter().cloned());
    }

    for (period, records) in &mut merged {
        let before = records.len();
        *records = dedupe(std::mem::take(records), key_field, &value_fn);
        if records.len() != before {
            tracing::info!(
                period,
                removed = before - records.len(),
                kept = records.len(),
                "Removed duplicate entities"
            );
        }
    }

    merged
}

fn dedupe<F>(records: Vec<RawRecord>, key_field: &str, value_fn: &F) -> Vec<RawRecord>
where
    F: Fn(&RawRecord) -> f64,
{
    let mut kept: Vec<RawRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let Some(key) = record.text(key_field).map(str::to_owned) else {
            tracing::warn!(key_field, "Dropping record without an entity key");
            continue;
        };

        match index.get(&key) {
            Some(&i) => {
                if value_fn(&record) > value_fn(&kept[i]) {
                    kept[i] = record;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(record);
            }
        }
    }

    kept
}
