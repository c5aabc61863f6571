//! Bulk sample state. Per-task-owned: built and written only by the
//! orchestrator task that owns a given sample.
use std::collections::HashMap;

use crate::interval_map::CnIntervalMap;

/// One simulated bulk sample: a clone mixture plus the per-chromosome CN
/// profile and per-variant VAFs derived from it.
#[derive(Debug, Clone, Default)]
pub struct BulkSample {
    pub id: String,
    /// Clone id → mixing weight; weights for a sample sum to 1.
    pub clone_weights: HashMap<String, f64>,
    pub chr_cn: HashMap<String, CnIntervalMap>,
    /// Somatic mutation id → expected variant allele fraction.
    pub snv_vaf: HashMap<i32, f64>,
    pub genome_len_abs: u64,
}

impl BulkSample {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}
