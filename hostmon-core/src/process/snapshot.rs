use super::query::ProcessQuery;
use super::record::{ProcessRecord, ProjectedRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Every process visible at one sampling instant.
///
/// Published snapshots are immutable; a refresh builds a new one and swaps it
/// in whole.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessTableSnapshot {
    generation: u64,
    taken_at: Option<DateTime<Utc>>,
    records: Vec<ProcessRecord>,
}

impl ProcessTableSnapshot {
    pub fn new(generation: u64, taken_at: DateTime<Utc>, records: Vec<ProcessRecord>) -> Self {
        Self {
            generation,
            taken_at: Some(taken_at),
            records,
        }
    }

    /// Zero until the first refresh has been published.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        self.taken_at
    }

    pub fn records(&self) -> &[ProcessRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessRecord> {
        self.records.iter().find(|r| r.pid() == pid)
    }

    pub fn query(&self, query: &ProcessQuery) -> Vec<ProjectedRecord> {
        query.run(&self.records)
    }
}
