//! # Sample orchestrator
//!
//! Builds the read-only [`BulkContext`] shared across samples, then drives
//! each sample's pipeline independently on a rayon worker pool, with each
//! task's RNG seeded deterministically from its index.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rust_htslib::bam;

use crate::align::{self, TransformCounters};
use crate::cn::{self, CloneCn};
use crate::config::RunConfig;
use crate::genome::GenomeInstance;
use crate::interval_map::{CnIntervalMap, IntervalSegmentMap};
use crate::reference::GenomeReference;
use crate::reference_writer;
use crate::sample::BulkSample;
use crate::vaf::{self, CloneGenome};
use crate::variant::VariantStore;

/// One clone's fully-built genome, immutable for the rest of the run.
pub struct Clone {
    pub id: String,
    pub genome: GenomeInstance,
}

/// The read-only bundle every sample task reads from: reference, variant
/// store, per-clone genomes and their derived CN/segment maps. Built once
/// before the parallel phase and shared read-only across every sample task.
pub struct BulkContext<'a> {
    pub reference: &'a dyn GenomeReference,
    pub store: VariantStore,
    pub clones: Vec<Clone>,
    pub chr_cn_by_clone: HashMap<String, HashMap<String, CnIntervalMap>>,
    pub segment_map_by_clone: HashMap<String, HashMap<String, IntervalSegmentMap>>,
}

impl<'a> BulkContext<'a> {
    pub fn build(reference: &'a dyn GenomeReference, clones: Vec<Clone>, store: VariantStore) -> Self {
        let mut chr_cn_by_clone = HashMap::new();
        let mut segment_map_by_clone = HashMap::new();
        for clone in &clones {
            chr_cn_by_clone.insert(clone.id.clone(), clone.genome.get_copy_number_state_by_chr(1.0));
            segment_map_by_clone.insert(clone.id.clone(), clone.genome.get_segment_id_map_by_chr());
        }
        Self {
            reference,
            store,
            clones,
            chr_cn_by_clone,
            segment_map_by_clone,
        }
    }

    fn clone_cn_refs(&self) -> Vec<CloneCn> {
        self.clones
            .iter()
            .map(|c| CloneCn {
                clone_id: &c.id,
                chr_cn: &self.chr_cn_by_clone[&c.id],
            })
            .collect()
    }

    fn clone_genome_refs(&self) -> Vec<CloneGenome> {
        self.clones
            .iter()
            .map(|c| CloneGenome {
                clone_id: &c.id,
                genome: &c.genome,
            })
            .collect()
    }
}

/// Deterministically derive a per-sample seed from the run's master seed so
/// concurrent sample tasks never share an RNG.
fn seed_for_sample(master_seed: u64, sample_idx: usize) -> u64 {
    let mut x = master_seed ^ (sample_idx as u64).wrapping_mul(0x9E3779B97F4A7C15);
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58476D1CE4E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D049BB133111EB);
    x ^= x >> 31;
    x
}

/// Per-sample write-up of reference tiles for every clone with non-zero
/// weight in `sample`, used only when `generate_reads` is set. Returns the
/// tile paths expected for the alignment transformer, grouped by clone.
fn expected_tile_paths(sample: &BulkSample, ctx: &BulkContext, out_dir: &Path) -> Vec<(PathBuf, String)> {
    let mut out = Vec::new();
    for clone in &ctx.clones {
        if sample.clone_weights.get(&clone.id).copied().unwrap_or(0.0) == 0.0 {
            continue;
        }
        let Some(chr_cn) = ctx.chr_cn_by_clone.get(&clone.id) else {
            continue;
        };
        let mut cns: Vec<u32> = chr_cn
            .values()
            .flat_map(|m| m.iter().map(|(_, _, cn)| cn.total().round() as u32))
            .collect();
        cns.sort_unstable();
        cns.dedup();
        for n in cns {
            out.push((out_dir.join(format!("{}.{}.{}.sam", sample.id, clone.id, n)), clone.id.clone()));
        }
    }
    out
}

/// Run VAF and copy-number calculation for every sample; this is the
/// sequential, read-only-building part of the pipeline that must complete
/// before the parallel per-sample phase starts.
pub fn prepare_samples(ctx: &BulkContext, samples: &mut [BulkSample]) {
    let clone_cn = ctx.clone_cn_refs();
    cn::calculate_bulk_copy_number(&clone_cn, samples, ctx.reference);

    let clone_genomes = ctx.clone_genome_refs();
    vaf::calculate_vaf(&clone_genomes, samples, &ctx.store);
}

/// Drive every sample's pipeline in parallel. `generate_reads` selects
/// between the alignment-transformer path and the direct read-count path.
pub fn run_samples(ctx: &BulkContext, samples: &mut [BulkSample], config: &RunConfig, out_dir: &Path, generate_reads: bool, global_tid: &HashMap<String, i32>) -> Result<()> {
    prepare_samples(ctx, samples);

    samples
        .par_iter()
        .enumerate()
        .try_for_each(|(idx, sample)| -> Result<()> {
            trace!("starting sample {}", sample.id);
            let seed = seed_for_sample(config.seed, idx);
            let mut rng = StdRng::seed_from_u64(seed);

            write_vaf_bed(sample, &ctx.store, out_dir)?;
            write_sample_cn_bed(sample, out_dir)?;

            if generate_reads {
                let header = build_sample_header(ctx, &sample.id);
                let sam_path = out_dir.join(format!("{}.sam", sample.id));
                let mut writer = bam::Writer::from_path(&sam_path, &header, bam::Format::Sam)
                    .with_context(|| format!("could not open sample alignment output {}", sam_path.display()))?;

                let tiles = expected_tile_paths(sample, ctx, out_dir);
                let counters = align::transform_sample_tiles(
                    &sample.id,
                    &tiles,
                    &ctx.segment_map_by_clone,
                    &ctx.store,
                    &sample.snv_vaf,
                    &ctx.store.snvs_by_chr_pos,
                    config,
                    true,
                    &mut writer,
                    global_tid,
                    &mut rng,
                )?;
                write_counters_tsv(sample, &ctx.store, &counters, out_dir)?;
            } else {
                let records = crate::readcount::simulate_read_counts(sample, &ctx.store, ctx.reference, config, &mut rng)?;
                let vcf_path = out_dir.join(format!("{}.rc.vcf", sample.id));
                let n = crate::readcount::write_read_count_vcf(&vcf_path, &records, config.min_rc)?;
                info!("wrote {n} read-count loci for sample {}", sample.id);
            }

            trace!("finished sample {}", sample.id);
            Ok(())
        })
}

/// Build this sample's own SAM header: one `@SQ` per reference contig, in
/// `tid` order, plus one `@RG` per clone carrying `LB=<sample>` so per-sample
/// library provenance survives into the SAM output.
fn build_sample_header(ctx: &BulkContext, sample_id: &str) -> bam::Header {
    let mut header = bam::Header::new();

    for (chr, len) in ctx.reference.chr_lengths() {
        let mut record = bam::header::HeaderRecord::new(b"SQ");
        record.push_tag(b"SN", chr);
        record.push_tag(b"LN", *len as i32);
        header.push_record(&record);
    }

    for clone in &ctx.clones {
        let mut record = bam::header::HeaderRecord::new(b"RG");
        record.push_tag(b"ID", &clone.id);
        record.push_tag(b"SM", &clone.id);
        record.push_tag(b"LB", sample_id);
        record.push_tag(b"PL", "Illumina");
        record.push_tag(b"PU", "HiSeq2500");
        header.push_record(&record);
    }

    header
}

fn write_vaf_bed(sample: &BulkSample, store: &VariantStore, out_dir: &Path) -> Result<()> {
    use std::io::Write;
    let path = out_dir.join(format!("{}.vaf.bed", sample.id));
    let mut w = std::io::BufWriter::new(
        std::fs::File::create(&path).with_context(|| format!("could not create {}", path.display()))?,
    );
    writeln!(w, "# id\tchr\tpos\tvaf")?;
    let mut ids: Vec<&i32> = sample.snv_vaf.keys().collect();
    ids.sort();
    for id in ids {
        let vaf = sample.snv_vaf[id];
        match store.snv_by_id.get(id) {
            Some(snv) => writeln!(w, "{id}\t{}\t{}\t{vaf}", snv.chr, snv.pos)?,
            None => {
                warn!("sample {} has a vaf recorded for unknown mutation {id}, writing with blank chr/pos", sample.id);
                writeln!(w, "{id}\t\t\t{vaf}")?;
            }
        }
    }
    Ok(())
}

fn write_sample_cn_bed(sample: &BulkSample, out_dir: &Path) -> Result<()> {
    use std::io::Write;
    let path = out_dir.join(format!("{}.cn.bed", sample.id));
    let mut w = std::io::BufWriter::new(
        std::fs::File::create(&path).with_context(|| format!("could not create {}", path.display()))?,
    );
    let mut chrs: Vec<&String> = sample.chr_cn.keys().collect();
    chrs.sort();
    for chr in chrs {
        for (start, end, cn) in sample.chr_cn[chr].iter() {
            writeln!(w, "{chr}\t{start}\t{end}\t{}\t{}", cn.count_a, cn.count_b)?;
        }
    }
    Ok(())
}

fn write_counters_tsv(sample: &BulkSample, store: &VariantStore, counters: &TransformCounters, out_dir: &Path) -> Result<()> {
    let path = out_dir.join(format!("{}.vars.csv", sample.id));
    align::write_coverage_tsv(&path, store, counters)?;
    Ok(())
}

/// Write per-clone ambient outputs (`<clone>.cn.bed`, `<clone>.<n>.fa`,
/// `<clone>.germline.vcf`, `<clone>.cnv.bed`) that do not depend on sample
/// mixing; called once, before the parallel sample phase.
pub fn write_clone_outputs(ctx: &BulkContext, config: &RunConfig, out_dir: &Path) -> Result<()> {
    use std::io::Write;

    for clone in &ctx.clones {
        let chr_cn = &ctx.chr_cn_by_clone[&clone.id];

        let cn_path = out_dir.join(format!("{}.cn.bed", clone.id));
        let mut w = std::io::BufWriter::new(
            std::fs::File::create(&cn_path).with_context(|| format!("could not create {}", cn_path.display()))?,
        );
        let mut chrs: Vec<&String> = chr_cn.keys().collect();
        chrs.sort();
        for chr in chrs {
            for (start, end, cn) in chr_cn[chr].iter() {
                writeln!(w, "{chr}\t{start}\t{end}\t{}\t{}", cn.count_a, cn.count_b)?;
            }
        }

        let (stats, _weight) = reference_writer::write_tiles(&clone.id, chr_cn, ctx.reference, out_dir, config.padding, config.min_len)?;
        info!("wrote {} tile group(s) for clone {}", stats.len(), clone.id);

        let germline_path = out_dir.join(format!("{}.germline.vcf", clone.id));
        ctx.store.write_germline_snvs_vcf(&germline_path, ctx.reference)?;

        let cnv_path = out_dir.join(format!("{}.cnv.bed", clone.id));
        ctx.store.write_cnvs_bed(&cnv_path)?;
    }

    if ctx.clones.is_empty() {
        warn!("no clones in context, skipping clone-level outputs");
    }
    Ok(())
}
