//! # Genome instance
//!
//! Per-clone genome representation. The original keeps owning raw pointers
//! between `ChromosomeInstance`s and `SegmentCopy`s; here chromosome
//! instances own their segment copies by value in an ordered `Vec`, and
//! every external reference to a segment copy goes through its opaque
//! `id` (an arena index, see [`SegmentIdAllocator`]) rather than a pointer,
//! per the arena+index redesign in the design notes.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use log::warn;

use crate::reference::GenomeReference;

/// Issues process-unique segment-copy ids. Shared (by reference) across all
/// clone genomes built in a run so ids never collide between clones.
#[derive(Debug, Default)]
pub struct SegmentIdAllocator(AtomicU64);

impl SegmentIdAllocator {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// One physical realization of a reference interval. `id` is stable across
/// the copy's lifetime and is never reused; two copies with an identical
/// reference interval but different `id` are distinct and may carry
/// different mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentCopy {
    pub id: u64,
    pub ref_chr: String,
    pub ref_start: u64,
    pub ref_end: u64,
}

impl SegmentCopy {
    pub fn new(id: u64, ref_chr: impl Into<String>, ref_start: u64, ref_end: u64) -> Self {
        debug_assert!(ref_start < ref_end, "segment copy must span a non-empty interval");
        Self {
            id,
            ref_chr: ref_chr.into(),
            ref_start,
            ref_end,
        }
    }

    pub fn len(&self) -> u64 {
        self.ref_end - self.ref_start
    }

    pub fn contains(&self, pos: u64) -> bool {
        self.ref_start <= pos && pos < self.ref_end
    }
}

/// A modification record emitted by CNV operations: segment `new_id` is a
/// copy of `src_id` over `[src_start, src_end)`, and every SNV carried by
/// `src_id` within that range must be transferred onto `new_id` (see
/// `VariantStore::transfer_mutations`).
#[derive(Debug, Clone, Copy)]
pub struct SegMod {
    pub new_id: u64,
    pub src_id: u64,
    pub src_start: u64,
    pub src_end: u64,
}

/// Ordered list of segment copies tiling one physical chromosome instance.
/// No gaps or overlaps between consecutive entries.
#[derive(Debug, Clone, Default)]
pub struct ChromosomeInstance {
    pub segments: Vec<SegmentCopy>,
}

impl ChromosomeInstance {
    pub fn length(&self) -> u64 {
        self.segments.iter().map(SegmentCopy::len).sum()
    }

    /// Split the segment covering instance-local offset `at` into two
    /// fresh segment copies, if `at` does not already fall on a boundary.
    /// Returns the resulting modification records (empty if no split was
    /// necessary).
    fn split_at(&mut self, at: u64, alloc: &SegmentIdAllocator) -> Vec<SegMod> {
        if at == 0 || at >= self.length() {
            return vec![];
        }
        let mut cum = 0u64;
        for i in 0..self.segments.len() {
            let seg_len = self.segments[i].len();
            if at == cum {
                return vec![];
            }
            if at > cum && at < cum + seg_len {
                let orig = self.segments[i].clone();
                let offset = at - cum;
                let split_point = orig.ref_start + offset;
                let left = SegmentCopy::new(alloc.next(), orig.ref_chr.clone(), orig.ref_start, split_point);
                let right = SegmentCopy::new(alloc.next(), orig.ref_chr.clone(), split_point, orig.ref_end);
                let mods = vec![
                    SegMod {
                        new_id: left.id,
                        src_id: orig.id,
                        src_start: orig.ref_start,
                        src_end: split_point,
                    },
                    SegMod {
                        new_id: right.id,
                        src_id: orig.id,
                        src_start: split_point,
                        src_end: orig.ref_end,
                    },
                ];
                self.segments.splice(i..=i, [left, right]);
                return mods;
            }
            cum += seg_len;
        }
        vec![]
    }

    /// Index range `[i_start, i_end)` of segments exactly covering
    /// instance-local `[local_start, local_end)`. Callers must have already
    /// split at both boundaries so the range lines up with segment edges.
    fn index_range_for(&self, local_start: u64, local_end: u64) -> (usize, usize) {
        let mut cum = 0u64;
        let mut i_start = 0;
        let mut i_end = self.segments.len();
        for (i, seg) in self.segments.iter().enumerate() {
            if cum == local_start {
                i_start = i;
            }
            cum += seg.len();
            if cum == local_end {
                i_end = i + 1;
                break;
            }
        }
        (i_start, i_end)
    }

    /// Duplicate instance-local `[local_start, local_end)`, inserting the
    /// copy downstream (`is_forward = true`) or upstream of the original.
    pub fn amplify_region(&mut self, local_start: u64, local_end: u64, is_forward: bool, alloc: &SegmentIdAllocator) -> Vec<SegMod> {
        let mut mods = self.split_at(local_start, alloc);
        mods.extend(self.split_at(local_end, alloc));
        let (i_start, i_end) = self.index_range_for(local_start, local_end);
        let region: Vec<SegmentCopy> = self.segments[i_start..i_end].to_vec();
        let mut dup = Vec::with_capacity(region.len());
        for seg in &region {
            let new_seg = SegmentCopy::new(alloc.next(), seg.ref_chr.clone(), seg.ref_start, seg.ref_end);
            mods.push(SegMod {
                new_id: new_seg.id,
                src_id: seg.id,
                src_start: seg.ref_start,
                src_end: seg.ref_end,
            });
            dup.push(new_seg);
        }
        let insert_at = if is_forward { i_end } else { i_start };
        self.segments.splice(insert_at..insert_at, dup);
        mods
    }

    /// Remove instance-local `[local_start, local_end)` from this instance.
    pub fn delete_region(&mut self, local_start: u64, local_end: u64, alloc: &SegmentIdAllocator) -> Vec<SegMod> {
        let mut mods = self.split_at(local_start, alloc);
        mods.extend(self.split_at(local_end, alloc));
        let (i_start, i_end) = self.index_range_for(local_start, local_end);
        self.segments.drain(i_start..i_end);
        mods
    }
}

/// Per-clone genome: every chromosome maps to an ordered list of physical
/// instances (2 at diploid baseline). Every segment copy is owned by
/// exactly one chromosome instance.
#[derive(Debug, Clone, Default)]
pub struct GenomeInstance {
    pub chromosomes: HashMap<String, Vec<ChromosomeInstance>>,
}

impl GenomeInstance {
    /// Build the initial diploid genome: two instances per chromosome, each
    /// a single segment copy spanning the whole reference chromosome.
    pub fn new_diploid(reference: &dyn GenomeReference, alloc: &SegmentIdAllocator) -> Self {
        let mut chromosomes = HashMap::new();
        for (chr, len) in reference.chr_lengths() {
            let instances = (0..2)
                .map(|_| ChromosomeInstance {
                    segments: vec![SegmentCopy::new(alloc.next(), chr.clone(), 0, *len)],
                })
                .collect();
            chromosomes.insert(chr.clone(), instances);
        }
        Self { chromosomes }
    }

    /// Whole-genome duplication: every chromosome instance is copied,
    /// doubling the instance count for every chromosome. Used by WGD.
    pub fn duplicate(&mut self, alloc: &SegmentIdAllocator) -> Vec<SegMod> {
        let mut mods = Vec::new();
        for instances in self.chromosomes.values_mut() {
            let mut doubled = Vec::with_capacity(instances.len());
            for inst in instances.iter() {
                let mut new_segments = Vec::with_capacity(inst.segments.len());
                for seg in &inst.segments {
                    let new_seg = SegmentCopy::new(alloc.next(), seg.ref_chr.clone(), seg.ref_start, seg.ref_end);
                    mods.push(SegMod {
                        new_id: new_seg.id,
                        src_id: seg.id,
                        src_start: seg.ref_start,
                        src_end: seg.ref_end,
                    });
                    new_segments.push(new_seg);
                }
                doubled.push(ChromosomeInstance { segments: new_segments });
            }
            instances.extend(doubled);
        }
        mods
    }

    /// Duplicate a single chromosome instance in place (used by chromosome-wide CNV gain).
    pub fn duplicate_chromosome_instance(&mut self, chr: &str, instance_idx: usize, alloc: &SegmentIdAllocator) -> Result<Vec<SegMod>> {
        let instances = self.chromosomes.get_mut(chr).context("CNV references unknown chromosome")?;
        let inst = instances
            .get(instance_idx)
            .context("CNV references unknown chromosome instance")?;
        let mut mods = Vec::with_capacity(inst.segments.len());
        let mut new_segments = Vec::with_capacity(inst.segments.len());
        for seg in &inst.segments {
            let new_seg = SegmentCopy::new(alloc.next(), seg.ref_chr.clone(), seg.ref_start, seg.ref_end);
            mods.push(SegMod {
                new_id: new_seg.id,
                src_id: seg.id,
                src_start: seg.ref_start,
                src_end: seg.ref_end,
            });
            new_segments.push(new_seg);
        }
        instances.push(ChromosomeInstance { segments: new_segments });
        Ok(mods)
    }

    /// Drop chromosome instance `instance_idx` of `chr`. No-op with a
    /// warning if the chromosome has no such instance, or if it would be
    /// the last remaining instance and `forbid_full_loss` is set (see
    /// DESIGN.md).
    pub fn delete_chromosome(&mut self, chr: &str, instance_idx: usize, forbid_full_loss: bool) -> Result<()> {
        let instances = self.chromosomes.get_mut(chr).context("CNV references unknown chromosome")?;
        if instances.is_empty() {
            warn!("chromosome {chr} has zero instances, deletion is a no-op");
            return Ok(());
        }
        if instance_idx >= instances.len() {
            warn!("chromosome {chr} has no instance {instance_idx}, deletion is a no-op");
            return Ok(());
        }
        if instances.len() <= 1 && forbid_full_loss {
            warn!("refusing to delete the last instance of {chr}: would cause full loss of heterozygosity");
            return Ok(());
        }
        instances.remove(instance_idx);
        Ok(())
    }

    /// Map `start_rel`/`len_rel` fractions of `instance_len` to absolute
    /// instance-local coordinates. `is_telomeric` anchors the region at
    /// whichever chromosome terminus `start_rel` is closest to, rather than
    /// at the literal fractional offset.
    fn resolve_region(instance_len: u64, start_rel: f64, len_rel: f64, is_telomeric: bool) -> (u64, u64) {
        let region_len = ((instance_len as f64) * len_rel).round() as u64;
        if region_len == 0 {
            return (0, 0);
        }
        let start = if is_telomeric {
            if start_rel < 0.5 {
                0
            } else {
                instance_len.saturating_sub(region_len)
            }
        } else {
            ((instance_len as f64) * start_rel).round() as u64
        };
        let end = (start + region_len).min(instance_len);
        (start, end)
    }

    pub fn amplify_region(
        &mut self,
        chr: &str,
        instance_idx: usize,
        start_rel: f64,
        len_rel: f64,
        is_forward: bool,
        is_telomeric: bool,
        alloc: &SegmentIdAllocator,
    ) -> Result<Vec<SegMod>> {
        let instances = self.chromosomes.get_mut(chr).context("CNV references unknown chromosome")?;
        let inst = instances
            .get_mut(instance_idx)
            .context("CNV references unknown chromosome instance")?;
        let len_before = inst.length();
        let (local_start, local_end) = Self::resolve_region(len_before, start_rel, len_rel, is_telomeric);
        if local_start >= local_end {
            return Ok(vec![]);
        }
        let mods = inst.amplify_region(local_start, local_end, is_forward, alloc);
        debug_assert_eq!(inst.length(), len_before + (local_end - local_start));
        Ok(mods)
    }

    pub fn delete_region(
        &mut self,
        chr: &str,
        instance_idx: usize,
        start_rel: f64,
        len_rel: f64,
        is_telomeric: bool,
        alloc: &SegmentIdAllocator,
    ) -> Result<Vec<SegMod>> {
        let instances = self.chromosomes.get_mut(chr).context("CNV references unknown chromosome")?;
        let inst = instances
            .get_mut(instance_idx)
            .context("CNV references unknown chromosome instance")?;
        let len_before = inst.length();
        let (local_start, local_end) = Self::resolve_region(len_before, start_rel, len_rel, is_telomeric);
        if local_start >= local_end {
            return Ok(vec![]);
        }
        let mods = inst.delete_region(local_start, local_end, alloc);
        debug_assert_eq!(inst.length(), len_before - (local_end - local_start));
        Ok(mods)
    }

    /// Lengths of each instance of `chr`, in instance order. Used to pick an
    /// instance weighted by physical length (e.g. for CNV region targeting).
    pub fn instance_lengths(&self, chr: &str) -> Vec<u64> {
        self.chromosomes
            .get(chr)
            .map(|instances| instances.iter().map(ChromosomeInstance::length).collect())
            .unwrap_or_default()
    }

    pub fn get_segment_copies_at(&self, chr: &str, ref_pos: u64) -> Vec<&SegmentCopy> {
        self.chromosomes
            .get(chr)
            .map(|instances| {
                instances
                    .iter()
                    .flat_map(|inst| inst.segments.iter())
                    .filter(|seg| seg.contains(ref_pos))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Per-chromosome interval map from reference position to the set of
    /// live segment-copy ids covering it, across all instances of that
    /// chromosome. Used by the alignment transformer's segment-mode
    /// spike-in to find candidate segment copies for a pair span.
    pub fn get_segment_id_map_by_chr(&self) -> HashMap<String, crate::interval_map::IntervalSegmentMap> {
        use crate::interval_map::IntervalSegmentMap;
        use std::collections::BTreeSet;

        let mut out = HashMap::new();
        for (chr, instances) in &self.chromosomes {
            let mut map = IntervalSegmentMap::new();
            for inst in instances {
                for seg in &inst.segments {
                    let mut ids = BTreeSet::new();
                    ids.insert(seg.id);
                    map.insert(seg.ref_start, seg.ref_end, ids);
                }
            }
            out.insert(chr.clone(), map);
        }
        out
    }

    /// Per-chromosome interval map of allele-specific copy number, scaled
    /// by `weight`. Instances at even index contribute to `count_a`, odd
    /// index to `count_b` — the Rust redesign's explicit stand-in for the
    /// original's maternal/paternal instance bookkeeping (see DESIGN.md).
    pub fn get_copy_number_state_by_chr(&self, weight: f64) -> HashMap<String, crate::interval_map::CnIntervalMap> {
        use crate::interval_map::{AlleleSpecificCn, CnIntervalMap};

        let mut out = HashMap::new();
        for (chr, instances) in &self.chromosomes {
            let mut map = CnIntervalMap::new();
            for (idx, inst) in instances.iter().enumerate() {
                let cn = if idx % 2 == 0 {
                    AlleleSpecificCn::new(weight, 0.0)
                } else {
                    AlleleSpecificCn::new(0.0, weight)
                };
                for seg in &inst.segments {
                    map.insert(seg.ref_start, seg.ref_end, cn);
                }
            }
            out.insert(chr.clone(), map);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::InMemoryReference;

    fn reference() -> InMemoryReference {
        InMemoryReference::from_sequences(vec![("chr1".into(), "A".repeat(1000))])
    }

    #[test]
    fn diploid_genome_has_two_instances_per_chr() {
        let alloc = SegmentIdAllocator::new();
        let genome = GenomeInstance::new_diploid(&reference(), &alloc);
        assert_eq!(genome.chromosomes["chr1"].len(), 2);
        assert_eq!(genome.chromosomes["chr1"][0].length(), 1000);
    }

    #[test]
    fn duplicate_doubles_every_instance() {
        let alloc = SegmentIdAllocator::new();
        let mut genome = GenomeInstance::new_diploid(&reference(), &alloc);
        let mods = genome.duplicate(&alloc);

        assert_eq!(genome.chromosomes["chr1"].len(), 4);
        assert_eq!(mods.len(), 2);
        for m in &mods {
            assert_eq!(m.src_start, 0);
            assert_eq!(m.src_end, 1000);
        }
    }

    #[test]
    fn amplify_region_inserts_downstream_copy() {
        let alloc = SegmentIdAllocator::new();
        let mut genome = GenomeInstance::new_diploid(&reference(), &alloc);
        let mods = genome
            .amplify_region("chr1", 0, 0.2, 0.1, true, false, &alloc)
            .unwrap();

        assert_eq!(genome.chromosomes["chr1"][0].length(), 1100);
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].src_start, 200);
        assert_eq!(mods[0].src_end, 300);
    }

    #[test]
    fn delete_region_shrinks_instance_and_removes_segments() {
        let alloc = SegmentIdAllocator::new();
        let mut genome = GenomeInstance::new_diploid(&reference(), &alloc);
        genome
            .delete_region("chr1", 0, 0.2, 0.1, false, &alloc)
            .unwrap();

        assert_eq!(genome.chromosomes["chr1"][0].length(), 900);
        assert!(genome.get_segment_copies_at("chr1", 250).is_empty());
    }

    #[test]
    fn delete_chromosome_refuses_last_instance_when_forbidden() {
        let alloc = SegmentIdAllocator::new();
        let mut genome = GenomeInstance::new_diploid(&reference(), &alloc);
        genome.delete_chromosome("chr1", 0, false).unwrap();
        assert_eq!(genome.chromosomes["chr1"].len(), 1);

        genome.delete_chromosome("chr1", 0, true).unwrap();
        assert_eq!(genome.chromosomes["chr1"].len(), 1, "forbidden deletion must be a no-op");
    }

    #[test]
    fn copy_number_state_reflects_instance_count() {
        let alloc = SegmentIdAllocator::new();
        let genome = GenomeInstance::new_diploid(&reference(), &alloc);
        let cn = genome.get_copy_number_state_by_chr(1.0);
        let map = &cn["chr1"];
        assert_eq!(map.value_at(500).total(), 2.0);
    }
}
