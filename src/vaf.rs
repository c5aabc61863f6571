//! # Allele-frequency engine
//!
//! Computes, per sample and somatic SNV, the expected variant allele
//! fraction by mixing clone fractions restricted to clones that carry the
//! SNV on an overlapping segment copy.
use std::collections::HashMap;

use log::debug;

use crate::genome::GenomeInstance;
use crate::sample::BulkSample;
use crate::variant::VariantStore;

/// One clone's genome, keyed by clone id, as needed to count overlapping
/// segment copies and which of them carry a given mutation.
pub struct CloneGenome<'a> {
    pub clone_id: &'a str,
    pub genome: &'a GenomeInstance,
}

/// Fill `sample.snv_vaf` for every somatic SNV in `store`, for every sample.
pub fn calculate_vaf(clones: &[CloneGenome], samples: &mut [BulkSample], store: &VariantStore) {
    let somatic: Vec<(i32, String, u64)> = store
        .somatic_snvs()
        .into_iter()
        .map(|(&id, snv)| (id, snv.chr.clone(), snv.pos))
        .collect();

    for sample in samples.iter_mut() {
        for (mutation_id, chr, pos) in &somatic {
            let vaf = vaf_for_locus(clones, sample, store, chr, *pos, *mutation_id);
            sample.snv_vaf.insert(*mutation_id, vaf);
        }
    }
}

fn vaf_for_locus(
    clones: &[CloneGenome],
    sample: &BulkSample,
    store: &VariantStore,
    chr: &str,
    pos: u64,
    mutation_id: i32,
) -> f64 {
    let mut mut_copies = 0.0;
    let mut total_copies = 0.0;

    for clone in clones {
        let Some(&weight) = sample.clone_weights.get(clone.clone_id) else {
            continue;
        };
        if weight == 0.0 {
            continue;
        }
        let segments = clone.genome.get_segment_copies_at(chr, pos);
        total_copies += weight * segments.len() as f64;
        let carriers = segments
            .iter()
            .filter(|seg| store.segment_vars.get(&seg.id).map(|v| v.contains(&mutation_id)).unwrap_or(false))
            .count();
        mut_copies += weight * carriers as f64;
    }

    if total_copies == 0.0 {
        debug!("mutation {mutation_id} at {chr}:{pos} has no overlapping segment copy in any clone for sample {}, vaf=0", sample.id);
        return 0.0;
    }
    mut_copies / total_copies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::SegmentIdAllocator;
    use crate::reference::InMemoryReference;

    #[test]
    fn vaf_reflects_carrier_fraction() {
        let reference = InMemoryReference::from_sequences(vec![("chr1".into(), "A".repeat(1000))]);
        let alloc = SegmentIdAllocator::new();
        let genome = GenomeInstance::new_diploid(&reference, &alloc);

        let mut store = VariantStore::new();
        let seg_id = genome.get_segment_copies_at("chr1", 500)[0].id;
        store.snv_by_id.insert(
            7,
            crate::variant::Snv {
                id_str: "s7".into(),
                chr: "chr1".into(),
                pos: 500,
                ref_allele: "A".into(),
                alt_allele: "T".into(),
                is_somatic: true,
                is_het: true,
                idx_mutation: 7,
            },
        );
        store.segment_vars.insert(seg_id, vec![7]);

        let clones = vec![CloneGenome { clone_id: "clone1", genome: &genome }];
        let mut sample = BulkSample::new("s1");
        sample.clone_weights.insert("clone1".into(), 1.0);

        calculate_vaf(&clones, std::slice::from_mut(&mut sample), &store);

        assert!((sample.snv_vaf[&7] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn vaf_is_zero_when_no_clone_covers_locus() {
        let store = VariantStore::new();
        let clones: Vec<CloneGenome> = vec![];
        let mut sample = BulkSample::new("s1");
        let vaf = vaf_for_locus(&clones, &sample, &store, "chr1", 1, 0);
        assert_eq!(vaf, 0.0);
        sample.snv_vaf.insert(0, vaf);
        assert_eq!(sample.snv_vaf[&0], 0.0);
    }
}
