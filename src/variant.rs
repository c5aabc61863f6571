//! # Variant model & store
//!
//! `Snv`/`Cnv`/`Mutation` value types plus `VariantStore`, the keyed store
//! that maps mutation ids to variants and tracks which SNVs live on which
//! segment copy. See DESIGN.md for the grounding notes.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use log::{debug, warn};
use ndarray::Array2;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_distr::Pareto;

use crate::config::RunConfig;
use crate::genome::{GenomeInstance, SegMod, SegmentIdAllocator};
use crate::nucleotide::Nuc;
use crate::reference::GenomeReference;

/// A variable site. Germline ids are negative, somatic ids are non-negative
/// (the ids themselves live on the enclosing [`Mutation`]/map key, not here).
#[derive(Debug, Clone)]
pub struct Snv {
    pub id_str: String,
    pub chr: String,
    pub pos: u64,
    pub ref_allele: String,
    pub alt_allele: String,
    pub is_somatic: bool,
    pub is_het: bool,
    pub idx_mutation: i32,
}

/// A somatic copy-number event. `start_rel`/`len_rel` are fractions of the
/// targeted chromosome instance's length, already resolved by
/// [`VariantStore::generate_somatic_variants`]'s class-specific logic.
#[derive(Debug, Clone)]
pub struct Cnv {
    pub is_wgd: bool,
    pub is_chr_wide: bool,
    pub is_deletion: bool,
    pub is_telomeric: bool,
    pub is_forward: bool,
    pub start_rel: f64,
    pub len_rel: f64,
    pub ref_chr: String,
}

/// A mutation event slated to be applied to a clone genome. Exactly one of
/// `is_snv`/`is_cnv` is set; the id is the shared key into `snv_by_id` or
/// `cnv_by_id`.
#[derive(Debug, Clone, Copy)]
pub struct Mutation {
    pub id: i32,
    pub is_snv: bool,
    pub is_cnv: bool,
}

impl Mutation {
    pub fn snv(id: i32) -> Self {
        Self { id, is_snv: true, is_cnv: false }
    }

    pub fn cnv(id: i32) -> Self {
        Self { id, is_snv: false, is_cnv: true }
    }
}

/// Row-major 4x4 nucleotide substitution matrix (A,C,G,T order); row `i`
/// gives the relative rates of mutating away from nucleotide `i`.
#[derive(Debug, Clone)]
pub struct SubstitutionMatrix(pub Array2<f64>);

impl SubstitutionMatrix {
    pub fn row_weights(&self) -> [f64; 4] {
        let mut w = [0.0; 4];
        for i in 0..4 {
            w[i] = self.0.row(i).sum();
        }
        w
    }

    pub fn row(&self, i: usize) -> [f64; 4] {
        let mut w = [0.0; 4];
        for j in 0..4 {
            w[j] = self.0[[i, j]];
        }
        w
    }
}

/// Somatic SNV signature: a set of trinucleotide contexts, each with a
/// selection weight and per-alt-nucleotide substitution weights.
#[derive(Debug, Clone)]
pub struct SomaticSnvModel {
    pub contexts: Vec<String>,
    pub context_weights: Vec<f64>,
    pub alt_weights: HashMap<String, [f64; 4]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CnvClass {
    Wgd,
    Chr,
    Arm,
    Tel,
    Foc,
}

/// Somatic CNV generation parameters.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct CnvModel {
    /// Selection weights for `[wgd, chr, arm, tel, foc]`.
    pub class_weights: [f64; 5],
    pub gain_prob: f64,
    pub len_exp: f64,
    pub len_min: u64,
}

/// Keeps somatic and germline variants as well as their association to
/// genomic segment copies.
#[derive(Debug, Clone, Default)]
pub struct VariantStore {
    pub snv_by_id: HashMap<i32, Snv>,
    pub cnv_by_id: HashMap<i32, Cnv>,
    pub segment_vars: HashMap<u64, Vec<i32>>,
    pub snvs_by_chr_pos: HashMap<String, BTreeMap<u64, Vec<i32>>>,
}

const MAX_REROLL_ATTEMPTS: usize = 1000;

fn flatten_positions(reference: &dyn GenomeReference, nuc: Nuc) -> Vec<(String, u64)> {
    let mut out = Vec::new();
    for (chr, _) in reference.chr_lengths() {
        out.extend(reference.nucleotide_positions(chr, nuc).iter().map(|&p| (chr.clone(), p)));
    }
    out
}

fn flatten_trinucleotide_positions(reference: &dyn GenomeReference, context: &str) -> Vec<(String, u64)> {
    let mut out = Vec::new();
    for (chr, _) in reference.chr_lengths() {
        out.extend(
            reference
                .trinucleotide_positions(chr, context)
                .iter()
                .map(|&p| (chr.clone(), p)),
        );
    }
    out
}

impl VariantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild `snvs_by_chr_pos` from `snv_by_id`. Returns the number of SNVs indexed.
    pub fn index_snvs(&mut self) -> usize {
        self.snvs_by_chr_pos.clear();
        for (&id, snv) in &self.snv_by_id {
            self.snvs_by_chr_pos
                .entry(snv.chr.clone())
                .or_default()
                .entry(snv.pos)
                .or_default()
                .push(id);
        }
        self.snv_by_id.len()
    }

    pub fn germline_snvs(&self) -> Vec<(&i32, &Snv)> {
        self.snv_by_id.iter().filter(|(_, s)| !s.is_somatic).collect()
    }

    pub fn somatic_snvs(&self) -> Vec<(&i32, &Snv)> {
        self.snv_by_id.iter().filter(|(_, s)| s.is_somatic).collect()
    }

    /// SNVs carried by segment copy `seg_id`, optionally restricted to
    /// `[pos_start, pos_end)`, ordered by position.
    pub fn get_snvs_for_segment_copy(&self, seg_id: u64, range: Option<(u64, u64)>) -> Vec<(u64, &Snv)> {
        let Some(ids) = self.segment_vars.get(&seg_id) else {
            return vec![];
        };
        let mut out: Vec<(u64, &Snv)> = ids
            .iter()
            .filter_map(|id| self.snv_by_id.get(id))
            .filter(|snv| match range {
                Some((start, end)) => snv.pos >= start && snv.pos < end,
                None => true,
            })
            .map(|snv| (snv.pos, snv))
            .collect();
        out.sort_by_key(|(pos, _)| *pos);
        out
    }

    /// Create `n` germline SNVs; germline ids are `-n, -n+1, ..., -1`.
    pub fn generate_germline_variants(
        &mut self,
        n: usize,
        reference: &dyn GenomeReference,
        subst: &SubstitutionMatrix,
        hom_rate: f64,
        rng: &mut impl Rng,
        infinite_sites: bool,
    ) -> Result<()> {
        let row_weights = subst.row_weights();
        let bucket_dist = WeightedIndex::new(row_weights).context("substitution matrix has no usable rows")?;
        let mut used: HashSet<(String, u64)> = HashSet::new();

        for i in 0..n {
            let id = -(n as i32) + i as i32;
            let mut attempts = 0;
            let (chr, pos, from_nuc) = loop {
                let from_idx = bucket_dist.sample(rng);
                let from_nuc = Nuc::from_index(from_idx);
                let candidates = flatten_positions(reference, from_nuc);
                ensure!(!candidates.is_empty(), "reference has no positions for nucleotide {from_nuc}");
                let (chr, pos) = candidates[rng.gen_range(0..candidates.len())].clone();

                if !infinite_sites || used.insert((chr.clone(), pos)) {
                    break (chr, pos, from_nuc);
                }
                attempts += 1;
                if attempts >= MAX_REROLL_ATTEMPTS {
                    warn!("infinite-sites reroll exceeded {MAX_REROLL_ATTEMPTS} attempts, relaxing for germline variant {id}");
                    used.insert((chr.clone(), pos));
                    break (chr, pos, from_nuc);
                }
            };

            let alt_row = subst.row(from_nuc.index().unwrap_or(0));
            let alt_dist = WeightedIndex::new(alt_row).context("substitution matrix row has no usable weights")?;
            let alt_nuc = Nuc::from_index(alt_dist.sample(rng));
            let is_het = rng.gen::<f64>() < (1.0 - hom_rate);

            self.snv_by_id.insert(
                id,
                Snv {
                    id_str: format!("germline_{}", -id),
                    chr,
                    pos,
                    ref_allele: from_nuc.to_string(),
                    alt_allele: alt_nuc.to_string(),
                    is_somatic: false,
                    is_het,
                    idx_mutation: id,
                },
            );
        }
        Ok(())
    }

    fn pick_cnv_class(weights: [f64; 5], rng: &mut impl Rng) -> Result<CnvClass> {
        let dist = WeightedIndex::new(weights).context("CNV class weights are all zero")?;
        Ok(match dist.sample(rng) {
            0 => CnvClass::Wgd,
            1 => CnvClass::Chr,
            2 => CnvClass::Arm,
            3 => CnvClass::Tel,
            _ => CnvClass::Foc,
        })
    }

    /// Generate somatic SNV and CNV events for the given (pre-typed)
    /// mutations. SNVs use a trinucleotide context model; CNVs pick an
    /// event class, a chromosome, and a bounded-Pareto length.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_somatic_variants(
        &mut self,
        mutations: &[Mutation],
        reference: &dyn GenomeReference,
        snv_model: &SomaticSnvModel,
        cnv_model: &CnvModel,
        rng: &mut impl Rng,
        infinite_sites: bool,
    ) -> Result<()> {
        ensure!(
            mutations.iter().all(|m| m.is_snv ^ m.is_cnv),
            "mutations must be exactly one of is_snv/is_cnv"
        );

        let context_dist =
            WeightedIndex::new(&snv_model.context_weights).context("somatic SNV model has no usable contexts")?;
        let chr_lengths: Vec<(String, u64)> = reference.chr_lengths().to_vec();
        let chr_dist = WeightedIndex::new(chr_lengths.iter().map(|(_, l)| *l as f64))
            .context("reference has no chromosomes to target with CNVs")?;

        let mut used_snv_pos: HashSet<(String, u64)> = HashSet::new();

        for m in mutations {
            if m.is_snv {
                let mut attempts = 0;
                let (chr, pos) = loop {
                    let ctx_idx = context_dist.sample(rng);
                    let context = &snv_model.contexts[ctx_idx];
                    let candidates = flatten_trinucleotide_positions(reference, context);
                    ensure!(!candidates.is_empty(), "reference has no sites for context {context}");
                    let (chr, site) = candidates[rng.gen_range(0..candidates.len())].clone();
                    let pos = site + 1;

                    if !infinite_sites || used_snv_pos.insert((chr.clone(), pos)) {
                        break (chr, pos);
                    }
                    attempts += 1;
                    if attempts >= MAX_REROLL_ATTEMPTS {
                        warn!("infinite-sites reroll exceeded {MAX_REROLL_ATTEMPTS} attempts, relaxing for somatic SNV {}", m.id);
                        used_snv_pos.insert((chr.clone(), pos));
                        break (chr, pos);
                    }
                };

                let site = reference.get_sequence(&chr, pos.saturating_sub(1), pos + 2);
                let ref_base = site.as_bytes().get(1).copied().unwrap_or(b'N');
                let from_nuc = Nuc::from_base(ref_base);
                let context_key = snv_model.contexts.iter().find(|c| {
                    flatten_trinucleotide_positions(reference, c).iter().any(|(c2, p2)| *c2 == chr && *p2 + 1 == pos)
                });
                let alt_weights = context_key
                    .and_then(|c| snv_model.alt_weights.get(c))
                    .copied()
                    .unwrap_or([1.0; 4]);
                let alt_dist = WeightedIndex::new(alt_weights).context("somatic SNV alt weights are all zero")?;
                let alt_nuc = Nuc::from_index(alt_dist.sample(rng));

                self.snv_by_id.insert(
                    m.id,
                    Snv {
                        id_str: format!("somatic_{}", m.id),
                        chr,
                        pos,
                        ref_allele: from_nuc.to_string(),
                        alt_allele: alt_nuc.to_string(),
                        is_somatic: true,
                        is_het: true,
                        idx_mutation: m.id,
                    },
                );
            } else {
                let class = Self::pick_cnv_class(cnv_model.class_weights, rng)?;
                let (chr, chr_len) = chr_lengths[chr_dist.sample(rng)].clone();
                let is_deletion = rng.gen::<f64>() >= cnv_model.gain_prob;
                let is_forward = rng.gen_bool(0.5);

                let (start_rel, len_rel, is_telomeric) = match class {
                    CnvClass::Wgd => (0.0, 1.0, false),
                    CnvClass::Chr => (0.0, 1.0, false),
                    CnvClass::Arm => (0.5, 0.5, false),
                    CnvClass::Tel => {
                        let floor = (cnv_model.len_min as f64 / chr_len as f64).clamp(1e-6, 1.0);
                        let len_rel = Pareto::new(floor, cnv_model.len_exp)
                            .context("invalid Pareto parameters for CNV length")?
                            .sample(rng)
                            .min(1.0);
                        let start_rel = if is_forward { 0.0 } else { 1.0 - len_rel };
                        (start_rel, len_rel, true)
                    }
                    CnvClass::Foc => {
                        let floor = (cnv_model.len_min as f64 / chr_len as f64).clamp(1e-6, 1.0);
                        let len_rel = Pareto::new(floor, cnv_model.len_exp)
                            .context("invalid Pareto parameters for CNV length")?
                            .sample(rng)
                            .min(1.0);
                        let raw_start: f64 = rng.gen();
                        let start_rel = raw_start.min(1.0 - len_rel).max(0.0);
                        (start_rel, len_rel, false)
                    }
                };

                self.cnv_by_id.insert(
                    m.id,
                    Cnv {
                        is_wgd: class == CnvClass::Wgd,
                        is_chr_wide: class == CnvClass::Chr,
                        is_deletion,
                        is_telomeric,
                        is_forward,
                        start_rel,
                        len_rel,
                        ref_chr: chr,
                    },
                );
            }
        }
        Ok(())
    }

    /// Apply every germline SNV to `genome`: heterozygous variants mutate
    /// one uniformly-chosen overlapping segment copy, homozygous variants
    /// mutate all of them.
    pub fn apply_germline_variants(&mut self, genome: &GenomeInstance, rng: &mut impl Rng) -> Result<()> {
        let germline: Vec<(i32, Snv)> = self
            .snv_by_id
            .iter()
            .filter(|(_, s)| !s.is_somatic)
            .map(|(&id, s)| (id, s.clone()))
            .collect();

        for (id, snv) in germline {
            let segments = genome.get_segment_copies_at(&snv.chr, snv.pos);
            if segments.is_empty() {
                debug!("germline SNV {id} at {}:{} has no overlapping segment copy, skipping", snv.chr, snv.pos);
                continue;
            }
            if snv.is_het {
                let chosen = segments[rng.gen_range(0..segments.len())];
                self.segment_vars.entry(chosen.id).or_default().push(id);
            } else {
                for seg in segments {
                    self.segment_vars.entry(seg.id).or_default().push(id);
                }
            }
        }
        Ok(())
    }

    /// Apply one mutation to `genome`, routing to SNV or CNV handling and
    /// feeding every resulting modification through [`Self::transfer_mutations`].
    pub fn apply_mutation(
        &mut self,
        m: Mutation,
        genome: &mut GenomeInstance,
        alloc: &SegmentIdAllocator,
        rng: &mut impl Rng,
        config: &RunConfig,
    ) -> Result<()> {
        ensure!(m.is_snv ^ m.is_cnv, "mutation {} has malformed is_snv/is_cnv flags", m.id);

        if m.is_snv {
            let snv = self
                .snv_by_id
                .get(&m.id)
                .with_context(|| format!("mutation {} marked is_snv but has no Snv entry", m.id))?
                .clone();
            let segments = genome.get_segment_copies_at(&snv.chr, snv.pos);
            if segments.is_empty() {
                debug!("somatic SNV {} at {}:{} has no overlapping segment copy, skipping", m.id, snv.chr, snv.pos);
                return Ok(());
            }
            let chosen = segments[rng.gen_range(0..segments.len())];
            self.segment_vars.entry(chosen.id).or_default().push(m.id);
            return Ok(());
        }

        let cnv = self
            .cnv_by_id
            .get(&m.id)
            .with_context(|| format!("mutation {} marked is_cnv but has no Cnv entry", m.id))?
            .clone();

        let mods: Vec<SegMod> = if cnv.is_wgd {
            genome.duplicate(alloc)
        } else if cnv.is_chr_wide {
            let lengths = genome.instance_lengths(&cnv.ref_chr);
            if lengths.is_empty() {
                bail!("chromosome-wide CNV {} references unknown chromosome {}", m.id, cnv.ref_chr);
            }
            let dist = WeightedIndex::new(lengths.iter().map(|&l| l as f64))
                .context("chromosome has no instances to target")?;
            let idx = dist.sample(rng);
            if cnv.is_deletion {
                genome.delete_chromosome(&cnv.ref_chr, idx, config.forbid_full_chromosome_loss)?;
                vec![]
            } else {
                genome.duplicate_chromosome_instance(&cnv.ref_chr, idx, alloc)?
            }
        } else {
            let lengths = genome.instance_lengths(&cnv.ref_chr);
            if lengths.is_empty() {
                bail!("region CNV {} references unknown chromosome {}", m.id, cnv.ref_chr);
            }
            let dist = WeightedIndex::new(lengths.iter().map(|&l| l as f64))
                .context("chromosome has no instances to target")?;
            let idx = dist.sample(rng);
            if cnv.is_deletion {
                genome.delete_region(&cnv.ref_chr, idx, cnv.start_rel, cnv.len_rel, cnv.is_telomeric, alloc)?
            } else {
                genome.amplify_region(&cnv.ref_chr, idx, cnv.start_rel, cnv.len_rel, cnv.is_forward, cnv.is_telomeric, alloc)?
            }
        };

        self.transfer_mutations(&mods);
        Ok(())
    }

    /// For each `(new_id, src_id, src_start, src_end)`, copy every SNV in
    /// `segment_vars[src_id]` within `[src_start, src_end)` onto `new_id`.
    pub fn transfer_mutations(&mut self, mods: &[SegMod]) {
        for m in mods {
            let Some(src_vars) = self.segment_vars.get(&m.src_id) else {
                continue;
            };
            let transferred: Vec<i32> = src_vars
                .iter()
                .filter(|&&id| {
                    self.snv_by_id
                        .get(&id)
                        .map(|snv| snv.pos >= m.src_start && snv.pos < m.src_end)
                        .unwrap_or(false)
                })
                .copied()
                .collect();
            if !transferred.is_empty() {
                self.segment_vars.entry(m.new_id).or_default().extend(transferred);
            }
        }
    }

    /// Write germline SNVs as plain VCFv4.1 text (no FORMAT/GT column,
    /// single implicit sample).
    pub fn write_germline_snvs_vcf(&self, path: impl AsRef<Path>, reference: &dyn GenomeReference) -> Result<usize> {
        let file = File::create(&path).with_context(|| format!("could not create {}", path.as_ref().display()))?;
        let mut w = BufWriter::new(file);

        writeln!(w, "##fileformat=VCFv4.1")?;
        for (chr, len) in reference.chr_lengths() {
            writeln!(w, "##contig=<ID={chr},length={len}>")?;
        }
        writeln!(w, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO")?;

        let mut germline: Vec<&Snv> = self.snv_by_id.values().filter(|s| !s.is_somatic).collect();
        germline.sort_by(|a, b| (a.chr.clone(), a.pos).cmp(&(b.chr.clone(), b.pos)));
        for snv in &germline {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}\t.\t.\t.",
                snv.chr,
                snv.pos + 1,
                snv.id_str,
                snv.ref_allele,
                snv.alt_allele
            )?;
        }
        Ok(germline.len())
    }

    /// Write the somatic CNV event log as BED: `chr start end id type`.
    pub fn write_cnvs_bed(&self, path: impl AsRef<Path>) -> Result<usize> {
        let file = File::create(&path).with_context(|| format!("could not create {}", path.as_ref().display()))?;
        let mut w = BufWriter::new(file);

        let mut ids: Vec<&i32> = self.cnv_by_id.keys().collect();
        ids.sort();
        for id in &ids {
            let cnv = &self.cnv_by_id[*id];
            let kind = if cnv.is_wgd {
                "WGD"
            } else if cnv.is_chr_wide {
                "CHR"
            } else if cnv.is_telomeric {
                "TEL"
            } else if cnv.start_rel == 0.5 && cnv.len_rel == 0.5 {
                "ARM"
            } else {
                "FOC"
            };
            writeln!(w, "{}\t{}\t{}\t{}\t{}", cnv.ref_chr, cnv.start_rel, cnv.start_rel + cnv.len_rel, id, kind)?;
        }
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::InMemoryReference;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn reference() -> InMemoryReference {
        InMemoryReference::from_sequences(vec![("chr1".into(), "ACGTACGTACGTACGTACGT".repeat(20))])
    }

    #[test]
    fn index_snvs_groups_by_chr_and_pos() {
        let mut store = VariantStore::new();
        store.snv_by_id.insert(
            0,
            Snv {
                id_str: "s0".into(),
                chr: "chr1".into(),
                pos: 100,
                ref_allele: "A".into(),
                alt_allele: "T".into(),
                is_somatic: true,
                is_het: true,
                idx_mutation: 0,
            },
        );
        let n = store.index_snvs();
        assert_eq!(n, 1);
        assert_eq!(store.snvs_by_chr_pos["chr1"][&100], vec![0]);
    }

    #[test]
    fn transfer_mutations_clips_to_range() {
        let mut store = VariantStore::new();
        store.snv_by_id.insert(
            1,
            Snv {
                id_str: "s1".into(),
                chr: "chr1".into(),
                pos: 50,
                ref_allele: "A".into(),
                alt_allele: "T".into(),
                is_somatic: true,
                is_het: true,
                idx_mutation: 1,
            },
        );
        store.snv_by_id.insert(
            2,
            Snv {
                id_str: "s2".into(),
                chr: "chr1".into(),
                pos: 150,
                ref_allele: "A".into(),
                alt_allele: "T".into(),
                is_somatic: true,
                is_het: true,
                idx_mutation: 2,
            },
        );
        store.segment_vars.insert(10, vec![1, 2]);

        store.transfer_mutations(&[SegMod { new_id: 20, src_id: 10, src_start: 0, src_end: 100 }]);

        assert_eq!(store.segment_vars[&20], vec![1]);
    }

    #[test]
    fn apply_mutation_rejects_mismatched_flags() {
        let mut store = VariantStore::new();
        let alloc = SegmentIdAllocator::new();
        let mut genome = GenomeInstance::new_diploid(&reference(), &alloc);
        let mut rng = StdRng::seed_from_u64(1);
        let config = RunConfig::default();

        let err = store
            .apply_mutation(Mutation::snv(7), &mut genome, &alloc, &mut rng, &config)
            .unwrap_err();
        assert!(format!("{err:#}").contains("marked is_snv"));
    }

    #[test]
    fn wgd_duplicates_genome_and_transfers_variants() {
        let mut store = VariantStore::new();
        let alloc = SegmentIdAllocator::new();
        let mut genome = GenomeInstance::new_diploid(&reference(), &alloc);
        let mut rng = StdRng::seed_from_u64(1);
        let config = RunConfig::default();

        let seg_id = genome.get_segment_copies_at("chr1", 100)[0].id;
        store.snv_by_id.insert(
            5,
            Snv {
                id_str: "s5".into(),
                chr: "chr1".into(),
                pos: 100,
                ref_allele: "A".into(),
                alt_allele: "T".into(),
                is_somatic: true,
                is_het: true,
                idx_mutation: 5,
            },
        );
        store.segment_vars.insert(seg_id, vec![5]);

        store.cnv_by_id.insert(
            9,
            Cnv {
                is_wgd: true,
                is_chr_wide: false,
                is_deletion: false,
                is_telomeric: false,
                is_forward: true,
                start_rel: 0.0,
                len_rel: 1.0,
                ref_chr: "chr1".into(),
            },
        );
        store.apply_mutation(Mutation::cnv(9), &mut genome, &alloc, &mut rng, &config).unwrap();

        let covering = genome.get_segment_copies_at("chr1", 100);
        assert_eq!(covering.len(), 2);
        for seg in covering {
            assert!(store.segment_vars.get(&seg.id).map(|v| v.contains(&5)).unwrap_or(false));
        }
    }
}
