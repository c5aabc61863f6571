//! # Per-sample copy-number engine
//!
//! Folds per-clone allele-specific copy number into per-sample profiles
//! weighted by clone fractions. The interval additive-merge machinery
//! itself lives in [`crate::interval_map`].
use std::collections::HashMap;

use crate::interval_map::{AlleleSpecificCn, CnIntervalMap};
use crate::reference::GenomeReference;
use crate::sample::BulkSample;

/// One clone's pre-computed, unweighted per-chromosome CN state, as
/// produced by [`crate::genome::GenomeInstance::get_copy_number_state_by_chr`].
pub struct CloneCn<'a> {
    pub clone_id: &'a str,
    pub chr_cn: &'a HashMap<String, CnIntervalMap>,
}

/// Fill `sample.chr_cn` and `sample.genome_len_abs` for every sample by
/// additively merging each clone's CN map scaled by the sample's clone
/// weight. Clones with zero weight for a sample are skipped.
pub fn calculate_bulk_copy_number(clones: &[CloneCn], samples: &mut [BulkSample], reference: &dyn GenomeReference) {
    for sample in samples.iter_mut() {
        sample.chr_cn.clear();

        for clone in clones {
            let Some(&weight) = sample.clone_weights.get(clone.clone_id) else {
                continue;
            };
            if weight == 0.0 {
                continue;
            }
            for (chr, cn_map) in clone.chr_cn {
                let scaled = scale_map(cn_map, weight);
                sample.chr_cn.entry(chr.clone()).or_default().merge_from(&scaled);
            }
        }

        sample.genome_len_abs = genome_length_abs(&sample.chr_cn, reference);
    }
}

fn scale_map(map: &CnIntervalMap, weight: f64) -> CnIntervalMap {
    let mut out = CnIntervalMap::new();
    for (start, end, cn) in map.iter() {
        out.insert(start, end, cn.scaled(weight));
    }
    out
}

fn genome_length_abs(chr_cn: &HashMap<String, CnIntervalMap>, reference: &dyn GenomeReference) -> u64 {
    let mut total = 0.0f64;
    for (chr, _) in reference.chr_lengths() {
        let Some(map) = chr_cn.get(chr) else {
            continue;
        };
        for (start, end, cn) in map.iter() {
            total += (end - start) as f64 * cn.total();
        }
    }
    total.round() as u64
}

/// Total physical copy number covering `(chr, pos)` in a clone's CN map,
/// i.e. `count_a + count_b` at that locus.
pub fn total_cn_at(chr_cn: &HashMap<String, CnIntervalMap>, chr: &str, pos: u64) -> f64 {
    chr_cn.get(chr).map(|m| m.value_at(pos).total()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::InMemoryReference;

    fn reference() -> InMemoryReference {
        InMemoryReference::from_sequences(vec![("chr1".into(), "A".repeat(100))])
    }

    #[test]
    fn weighted_merge_matches_spec_scenario_s2() {
        let mut a = CnIntervalMap::new();
        a.insert(0, 100, AlleleSpecificCn::new(1.0, 1.0));
        let mut b = CnIntervalMap::new();
        b.insert(0, 100, AlleleSpecificCn::new(2.0, 0.0));

        let clone_a_cn = HashMap::from([("chr1".to_string(), a)]);
        let clone_b_cn = HashMap::from([("chr1".to_string(), b)]);
        let clones = vec![
            CloneCn { clone_id: "A", chr_cn: &clone_a_cn },
            CloneCn { clone_id: "B", chr_cn: &clone_b_cn },
        ];

        let mut sample = BulkSample::new("s1");
        sample.clone_weights.insert("A".into(), 0.7);
        sample.clone_weights.insert("B".into(), 0.3);

        let reference = reference();
        calculate_bulk_copy_number(&clones, std::slice::from_mut(&mut sample), &reference);

        let cn = sample.chr_cn["chr1"].value_at(50);
        assert!((cn.count_a - 1.3).abs() < 1e-9);
        assert!((cn.count_b - 0.7).abs() < 1e-9);
    }

    #[test]
    fn genome_length_abs_sums_weighted_total() {
        let mut a = CnIntervalMap::new();
        a.insert(0, 100, AlleleSpecificCn::new(1.0, 1.0));
        let clone_a_cn = HashMap::from([("chr1".to_string(), a)]);
        let clones = vec![CloneCn { clone_id: "A", chr_cn: &clone_a_cn }];

        let mut sample = BulkSample::new("s1");
        sample.clone_weights.insert("A".into(), 1.0);

        let reference = reference();
        calculate_bulk_copy_number(&clones, std::slice::from_mut(&mut sample), &reference);

        assert_eq!(sample.genome_len_abs, 200);
    }
}
