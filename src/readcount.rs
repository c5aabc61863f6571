//! # Read-count simulator (direct path)
//!
//! Samples total/alt depth per somatic SNV from negative-binomial and
//! binomial models, then spikes sequencing-error sites. The negative-binomial
//! mean/dispersion parameterization is built directly on `rand_distr`.
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use rand::prelude::*;
use rand_distr::{Binomial, NegativeBinomial, Poisson};

use crate::config::RunConfig;
use crate::nucleotide::{shift_nucleotide, Nuc};
use crate::reference::GenomeReference;
use crate::sample::BulkSample;
use crate::variant::VariantStore;

/// Per-locus accumulated read counts, keyed by `(chr, pos)` (0-based).
/// `counts` buckets every observed allele (including the reference allele)
/// by its base string, so a locus with more than one distinct alt (multiple
/// colliding somatic SNVs, or an error-spiked base layered on top of a real
/// alt) keeps each bucket separate instead of collapsing to one alt count.
#[derive(Debug, Clone, Default)]
struct LocusCounts {
    ref_allele: String,
    counts: HashMap<String, u64>,
    mutation_ids: Vec<i32>,
}

impl LocusCounts {
    fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    fn ref_count(&self) -> u64 {
        self.counts.get(&self.ref_allele).copied().unwrap_or(0)
    }

    /// Non-ref allele/count pairs, sorted by allele for deterministic output.
    fn alt_buckets(&self) -> Vec<(&str, u64)> {
        let mut alts: Vec<(&str, u64)> = self.counts.iter().filter(|(allele, _)| allele.as_str() != self.ref_allele).map(|(a, &c)| (a.as_str(), c)).collect();
        alts.sort_by(|a, b| a.0.cmp(b.0));
        alts
    }
}

/// Draw `mean`-centered depth from a negative binomial with the given
/// dispersion (variance = mean + mean² × dispersion). `dispersion <= 0`
/// degrades to a Poisson draw, the negative binomial's zero-dispersion limit.
fn sample_depth(mean: f64, dispersion: f64, rng: &mut impl Rng) -> Result<u64> {
    if mean <= 0.0 {
        return Ok(0);
    }
    if dispersion <= 0.0 {
        let dist = Poisson::new(mean).context("invalid Poisson mean for read depth")?;
        return Ok(dist.sample(rng).round() as u64);
    }
    let r = 1.0 / dispersion;
    let p = r / (r + mean);
    let dist = NegativeBinomial::new(r, p).context("invalid negative-binomial parameters for read depth")?;
    Ok(dist.sample(rng))
}

fn sample_alt_depth(total: u64, vaf: f64, rng: &mut impl Rng) -> Result<u64> {
    if total == 0 {
        return Ok(0);
    }
    let vaf = vaf.clamp(0.0, 1.0);
    let dist = Binomial::new(total, vaf).context("invalid binomial parameters for alt depth")?;
    Ok(dist.sample(rng))
}

/// Run the direct read-count path for one sample: per-SNV depth/alt-depth
/// draws plus sequencing-error spiking. Returns the per-locus table, ready
/// for [`write_read_count_vcf`].
pub fn simulate_read_counts(
    sample: &BulkSample,
    store: &VariantStore,
    reference: &dyn GenomeReference,
    config: &RunConfig,
    rng: &mut impl Rng,
) -> Result<Vec<((String, u64), LocusRecord)>> {
    let ref_len = reference.length();
    if sample.genome_len_abs == 0 {
        warn!("sample {} has zero genome_len_abs, skipping read-count simulation", sample.id);
        return Ok(vec![]);
    }
    let cvg_per_copy = config.target_cvg * ref_len as f64 / sample.genome_len_abs as f64;

    let mut loci: HashMap<(String, u64), LocusCounts> = HashMap::new();
    let mut warned_collision = false;

    for (&mutation_id, snv) in store.somatic_snvs() {
        let vaf = *sample.snv_vaf.get(&mutation_id).unwrap_or(&0.0);
        let cn_seg = crate::cn::total_cn_at(&sample.chr_cn, &snv.chr, snv.pos);
        let expected_cvg = cn_seg * cvg_per_copy;

        let rc_total = sample_depth(expected_cvg, config.seq_disp, rng)?;
        let rc_alt = sample_alt_depth(rc_total, vaf, rng)?;
        let rc_ref = rc_total.saturating_sub(rc_alt);

        let key = (snv.chr.clone(), snv.pos);
        let entry = loci.entry(key).or_default();
        let collision = !entry.mutation_ids.is_empty();

        if collision && !config.allow_locus_collision_overwrite {
            *entry.counts.entry(snv.ref_allele.clone()).or_insert(0) += rc_ref;
            *entry.counts.entry(snv.alt_allele.clone()).or_insert(0) += rc_alt;
            entry.mutation_ids.push(mutation_id);
            if !warned_collision {
                warn!(
                    "sample {} has colliding somatic SNVs at {}:{}, summing counts per RunConfig::allow_locus_collision_overwrite=false",
                    sample.id, snv.chr, snv.pos
                );
                warned_collision = true;
            }
        } else {
            if collision && config.allow_locus_collision_overwrite {
                warn!("sample {} has colliding somatic SNVs at {}:{}, overwriting prior counts", sample.id, snv.chr, snv.pos);
            }
            entry.ref_allele = snv.ref_allele.clone();
            entry.counts.clear();
            entry.counts.insert(snv.ref_allele.clone(), rc_ref);
            entry.counts.insert(snv.alt_allele.clone(), rc_alt);
            entry.mutation_ids = vec![mutation_id];
        }
    }

    spike_sequencing_errors(&mut loci, sample, reference, cvg_per_copy, config, rng)?;

    let mut out: Vec<((String, u64), LocusRecord)> = loci
        .into_iter()
        .map(|(key, c)| {
            (
                key,
                LocusRecord {
                    ref_allele: c.ref_allele,
                    counts: c.counts,
                    mutation_ids: c.mutation_ids,
                },
            )
        })
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct LocusRecord {
    pub ref_allele: String,
    pub counts: HashMap<String, u64>,
    pub mutation_ids: Vec<i32>,
}

impl LocusRecord {
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn ref_count(&self) -> u64 {
        self.counts.get(&self.ref_allele).copied().unwrap_or(0)
    }

    pub fn alt_count(&self) -> u64 {
        self.total() - self.ref_count()
    }

    /// Non-ref allele/count pairs, sorted by allele for deterministic output.
    pub fn alt_buckets(&self) -> Vec<(&str, u64)> {
        let mut alts: Vec<(&str, u64)> = self.counts.iter().filter(|(allele, _)| allele.as_str() != self.ref_allele).map(|(a, &c)| (a.as_str(), c)).collect();
        alts.sort_by(|a, b| a.0.cmp(b.0));
        alts
    }
}

fn spike_sequencing_errors(
    loci: &mut HashMap<(String, u64), LocusCounts>,
    sample: &BulkSample,
    reference: &dyn GenomeReference,
    cvg_per_copy: f64,
    config: &RunConfig,
    rng: &mut impl Rng,
) -> Result<()> {
    let ref_len = reference.length();
    let lambda = ref_len as f64 * config.seq_err * config.target_cvg;
    if lambda <= 0.0 {
        return Ok(());
    }
    let dist = Poisson::new(lambda).context("invalid Poisson mean for sequencing errors")?;
    let n_err = dist.sample(rng).round() as u64;

    let chr_lengths = reference.chr_lengths();
    let chr_dist = rand::distributions::WeightedIndex::new(chr_lengths.iter().map(|(_, l)| *l as f64))
        .context("reference has no chromosomes for sequencing-error placement")?;

    for _ in 0..n_err {
        let (chr, chr_len) = &chr_lengths[chr_dist.sample(rng)];
        let pos = rng.gen_range(0..*chr_len);
        let key = (chr.clone(), pos);

        let entry = loci.entry(key.clone()).or_insert_with(|| {
            let base = reference.get_sequence(chr, pos, pos + 1);
            let ref_allele = if base.is_empty() { "N".to_string() } else { base };
            let mut counts = HashMap::new();
            counts.insert(ref_allele.clone(), 0);
            LocusCounts {
                ref_allele,
                counts,
                mutation_ids: vec![],
            }
        });
        if entry.total() == 0 && entry.mutation_ids.is_empty() {
            let cn_seg = crate::cn::total_cn_at(&sample.chr_cn, chr, pos);
            let depth = sample_depth(cn_seg * cvg_per_copy, config.seq_disp, rng)?;
            entry.counts.insert(entry.ref_allele.clone(), depth);
        }

        let total = entry.total();
        if total == 0 {
            continue;
        }

        // Pick the bucket to decrement weighted by its current read count —
        // this may be the ref allele, an existing somatic alt, or a base
        // from a previous error spike at this locus — then shift an error
        // base from that bucket's own nucleotide, not unconditionally ref.
        let mut buckets: Vec<(String, u64)> = entry.counts.iter().map(|(a, &c)| (a.clone(), c)).collect();
        let weights: Vec<f64> = buckets.iter().map(|(_, c)| *c as f64).collect();
        let bucket_dist = rand::distributions::WeightedIndex::new(&weights).context("no reads available to shift for a sequencing error")?;
        let (old_allele, _) = buckets.swap_remove(bucket_dist.sample(rng));

        *entry.counts.get_mut(&old_allele).unwrap() -= 1;
        let old_nuc = Nuc::from_base(old_allele.as_bytes().first().copied().unwrap_or(b'N'));
        let shift = rng.gen_range(1..=3);
        let err_base = shift_nucleotide(old_nuc.as_base(), shift);
        let err_allele = (err_base as char).to_string();
        *entry.counts.entry(err_allele).or_insert(0) += 1;
    }
    Ok(())
}

/// Write the read-count table as VCFv4.1-like text, 1-based positions,
/// restricted to loci whose alt count meets `min_rc`.
pub fn write_read_count_vcf(path: impl AsRef<Path>, records: &[((String, u64), LocusRecord)], min_rc: u32) -> Result<usize> {
    let file = File::create(&path).with_context(|| format!("could not create {}", path.as_ref().display()))?;
    let mut w = BufWriter::new(file);

    writeln!(w, "##fileformat=VCFv4.1")?;
    writeln!(w, "##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total read depth\">")?;
    writeln!(w, "##INFO=<ID=AC,Number=A,Type=Integer,Description=\"Alt allele read counts\">")?;
    writeln!(w, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO")?;

    let mut written = 0usize;
    for ((chr, pos), rec) in records {
        let alt_buckets = rec.alt_buckets();
        if !alt_buckets.iter().any(|(_, c)| *c as u32 >= min_rc) {
            continue;
        }
        let dp = rec.total();
        let id = rec.mutation_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");
        let alt = alt_buckets.iter().map(|(a, _)| a.to_string()).collect::<Vec<_>>().join(",");
        let ac = alt_buckets.iter().map(|(_, c)| c.to_string()).collect::<Vec<_>>().join(",");
        writeln!(w, "{chr}\t{}\t{id}\t{}\t{alt}\t.\t.\tDP={dp};AC={ac}", pos + 1, rec.ref_allele)?;
        written += 1;
    }
    Ok(written)
}
