//! # Alignment transformer
//!
//! Consumes per-tile paired-read alignment files, rewrites coordinates from
//! tile-local to genome-global, and spikes in variants. Uses the safe
//! `rust_htslib::bam` record API; tiles are always plain SAM so no raw-FFI
//! CRAM handling is needed.
use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use rand::prelude::*;
use rust_htslib::bam::record::Aux;
use rust_htslib::bam::{self, Read as BamRead};

use crate::config::RunConfig;
use crate::interval_map::IntervalSegmentMap;
use crate::variant::VariantStore;

/// Resolved from an input tile's `<chr>_<start>_<end>_<padding>` reference id.
#[derive(Debug, Clone)]
struct TileRefInfo {
    global_chr: String,
    loc_min: i64,
    loc_max: i64,
    offset: i64,
}

fn parse_tile_ref_id(id: &str) -> Option<(String, u64, u64, u64)> {
    let mut parts = id.rsplitn(4, '_');
    let padding: u64 = parts.next()?.parse().ok()?;
    let end: u64 = parts.next()?.parse().ok()?;
    let start: u64 = parts.next()?.parse().ok()?;
    let chr = parts.next()?.to_string();
    Some((chr, start, end, padding))
}

fn build_tile_ref_map(header: &bam::HeaderView) -> Result<HashMap<i32, TileRefInfo>> {
    let mut out = HashMap::new();
    for tid in 0..header.target_count() {
        let name = std::str::from_utf8(header.tid2name(tid)).context("tile reference id is not valid UTF-8")?;
        let Some((chr, start, end, padding)) = parse_tile_ref_id(name) else {
            warn!("tile reference id {name} does not match <chr>_<start>_<end>_<padding>, skipping");
            continue;
        };
        out.insert(
            tid as i32,
            TileRefInfo {
                global_chr: chr,
                loc_min: padding as i64,
                loc_max: end as i64 - start as i64 + padding as i64,
                offset: start as i64 - padding as i64,
            },
        );
    }
    Ok(out)
}

/// Per-mutation coverage/alt counters accumulated across every tile of a sample.
#[derive(Debug, Clone, Default)]
pub struct TransformCounters {
    pub cvg: HashMap<i32, u64>,
    pub alt: HashMap<i32, u64>,
}

impl TransformCounters {
    fn bump_cvg(&mut self, id: i32) {
        *self.cvg.entry(id).or_insert(0) += 1;
    }
    fn bump_alt(&mut self, id: i32) {
        *self.alt.entry(id).or_insert(0) += 1;
    }
}

fn overwrite_base(record: &mut bam::Record, offset: usize, new_base: u8) -> Result<()> {
    let mut seq = record.seq().as_bytes();
    if offset >= seq.len() {
        bail!("spike-in offset {offset} is outside read of length {}", seq.len());
    }
    seq[offset] = new_base;
    let qual = record.qual().to_vec();
    let cigar = record.cigar().take();
    let qname = record.qname().to_vec();
    record.set(&qname, Some(&cigar), &seq, &qual);
    Ok(())
}

fn translate_record(record: &mut bam::Record, tile_refs: &HashMap<i32, TileRefInfo>, global_tid: &HashMap<String, i32>) -> Result<Option<(i64, i64)>> {
    let info = tile_refs.get(&record.tid()).context("record references unmapped tile contig")?;
    let local_pos = record.pos();
    if local_pos < info.loc_min || local_pos >= info.loc_max {
        return Ok(None);
    }
    let end = local_pos + record.seq_len() as i64;

    let &global = global_tid.get(&info.global_chr).context("tile contig has no matching global contig")?;
    record.set_tid(global);
    record.set_pos(local_pos + info.offset);
    if let Some(mate_info) = tile_refs.get(&record.mtid()) {
        record.set_mtid(global);
        record.set_mpos(record.mpos() + mate_info.offset);
    }

    Ok(Some((local_pos + info.offset, end + info.offset)))
}

#[allow(clippy::too_many_arguments)]
fn transform_one_tile(
    tile_path: &Path,
    clone_id: &str,
    segment_map: &HashMap<String, IntervalSegmentMap>,
    store: &VariantStore,
    sample_snv_vaf: &HashMap<i32, f64>,
    sample_snvs_by_chr_pos: &HashMap<String, std::collections::BTreeMap<u64, Vec<i32>>>,
    config: &RunConfig,
    segment_mode: bool,
    writer: &mut bam::Writer,
    global_tid: &HashMap<String, i32>,
    counters: &mut TransformCounters,
    rng: &mut impl Rng,
) -> Result<usize> {
    let mut reader = bam::Reader::from_path(tile_path).with_context(|| format!("could not open tile {}", tile_path.display()))?;
    let tile_refs = build_tile_ref_map(reader.header())?;

    let mut pairs_written = 0usize;
    let mut pending: Option<bam::Record> = None;

    for result in reader.records() {
        let mut record = result.context("error reading tile record")?;
        let Some(span) = translate_record(&mut record, &tile_refs, global_tid)? else {
            debug!("rejecting pair in {} with a mate outside padded tile range", tile_path.display());
            pending = None;
            continue;
        };
        record.push_aux(b"RG", Aux::String(clone_id)).context("could not push RG tag")?;

        match pending.take() {
            None => pending = Some(record),
            Some(mate1) => {
                let (span1, span2) = span_union(&mate1, span);
                let global_chr = tile_refs
                    .values()
                    .find(|i| global_tid.get(&i.global_chr) == Some(&mate1.tid()))
                    .map(|i| i.global_chr.clone());

                let mut mate1 = mate1;
                let mut mate2 = record;

                if let Some(chr) = global_chr {
                    if segment_mode {
                        spike_segment_mode(&chr, span1, span2, segment_map, store, &mut mate1, &mut mate2, counters, rng)?;
                    } else {
                        spike_vaf_mode(&chr, span1, span2, store, sample_snv_vaf, sample_snvs_by_chr_pos, config, &mut mate1, &mut mate2, counters, rng)?;
                    }
                }

                writer.write(&mate1).context("could not write transformed mate 1")?;
                writer.write(&mate2).context("could not write transformed mate 2")?;
                pairs_written += 1;
            }
        }
    }

    Ok(pairs_written)
}

fn span_union(mate1: &bam::Record, mate2_span: (i64, i64)) -> ((i64, i64), (i64, i64)) {
    let span1 = (mate1.pos(), mate1.pos() + mate1.seq_len() as i64);
    (span1, mate2_span)
}

#[allow(clippy::too_many_arguments)]
fn spike_segment_mode(
    chr: &str,
    span1: (i64, i64),
    span2: (i64, i64),
    segment_map: &HashMap<String, IntervalSegmentMap>,
    store: &VariantStore,
    mate1: &mut bam::Record,
    mate2: &mut bam::Record,
    counters: &mut TransformCounters,
    rng: &mut impl Rng,
) -> Result<()> {
    let pair_start = span1.0.min(span2.0).max(0) as u64;
    let pair_end = span1.1.max(span2.1).max(0) as u64;

    let Some(map) = segment_map.get(chr) else {
        debug!("no segment map for {chr}, emitting pair without spike-in");
        return Ok(());
    };
    let candidates: Vec<u64> = map
        .intersection(pair_start, pair_end)
        .into_iter()
        .flat_map(|(_, _, ids)| ids.into_iter())
        .collect();
    if candidates.is_empty() {
        debug!("no segment copy overlaps pair span {chr}:{pair_start}-{pair_end}, skipping spike-in");
        return Ok(());
    }
    let seg_id = candidates[rng.gen_range(0..candidates.len())];

    for (pos, snv) in store.get_snvs_for_segment_copy(seg_id, Some((pair_start, pair_end))) {
        if pos_in_span(pos, span1) || pos_in_span(pos, span2) {
            counters.bump_cvg(snv.idx_mutation);
        }
        apply_variant_to_pair(mate1, mate2, pos, snv.alt_allele.as_bytes()[0], counters, snv.idx_mutation, true)?;
    }
    Ok(())
}

/// Whether reference position `pos` falls within a mate's actual read span
/// `[start, end)`, as opposed to merely the insert gap between mates.
fn pos_in_span(pos: u64, span: (i64, i64)) -> bool {
    let (start, end) = span;
    if start < 0 || end < 0 {
        return false;
    }
    pos >= start as u64 && pos < end as u64
}

#[allow(clippy::too_many_arguments)]
fn spike_vaf_mode(
    chr: &str,
    span1: (i64, i64),
    span2: (i64, i64),
    store: &VariantStore,
    snv_vaf: &HashMap<i32, f64>,
    snvs_by_chr_pos: &HashMap<String, std::collections::BTreeMap<u64, Vec<i32>>>,
    config: &RunConfig,
    mate1: &mut bam::Record,
    mate2: &mut bam::Record,
    counters: &mut TransformCounters,
    rng: &mut impl Rng,
) -> Result<()> {
    let pair_start = span1.0.min(span2.0).max(0) as u64;
    let pair_end = span1.1.max(span2.1).max(0) as u64;

    let Some(by_pos) = snvs_by_chr_pos.get(chr) else {
        return Ok(());
    };

    let mut counted_pair = false;
    for (&pos, ids) in by_pos.range(pair_start..pair_end) {
        for &mutation_id in ids {
            let vaf = *snv_vaf.get(&mutation_id).unwrap_or(&0.0);

            if config.vaf_mode_counts_coverage_once {
                if !counted_pair {
                    counters.bump_cvg(mutation_id);
                    counted_pair = true;
                }
            } else {
                counters.bump_cvg(mutation_id);
            }

            if rng.gen::<f64>() <= vaf {
                let Some(snv) = store.snv_by_id.get(&mutation_id) else {
                    debug!("vaf-mode spike-in references unknown mutation {mutation_id}, skipping");
                    continue;
                };
                apply_variant_to_pair(mate1, mate2, pos, snv.alt_allele.as_bytes()[0], counters, mutation_id, true)?;
            }
        }
    }
    Ok(())
}

fn apply_variant_to_pair(mate1: &mut bam::Record, mate2: &mut bam::Record, pos: u64, alt_base: u8, counters: &mut TransformCounters, mutation_id: i32, count_alt: bool) -> Result<()> {
    for mate in [&mut *mate1, &mut *mate2] {
        let begin = mate.pos();
        if begin < 0 {
            continue;
        }
        let offset = pos as i64 - begin;
        if offset < 0 || offset as usize >= mate.seq_len() {
            continue;
        }
        overwrite_base(mate, offset as usize, alt_base)?;
        if count_alt {
            counters.bump_alt(mutation_id);
        }
        return Ok(());
    }
    Ok(())
}

/// Transform every `<sample>.<clone>.<cn>.sam` tile for `sample_id`, writing
/// to `writer` and accumulating per-mutation coverage counters. Deletes
/// each tile after it is consumed.
#[allow(clippy::too_many_arguments)]
pub fn transform_sample_tiles(
    sample_id: &str,
    tile_paths: &[(std::path::PathBuf, String)],
    segment_maps: &HashMap<String, HashMap<String, IntervalSegmentMap>>,
    store: &VariantStore,
    sample_snv_vaf: &HashMap<i32, f64>,
    sample_snvs_by_chr_pos: &HashMap<String, std::collections::BTreeMap<u64, Vec<i32>>>,
    config: &RunConfig,
    segment_mode: bool,
    writer: &mut bam::Writer,
    global_tid: &HashMap<String, i32>,
    rng: &mut impl Rng,
) -> Result<TransformCounters> {
    let mut counters = TransformCounters::default();

    for (tile_path, clone_id) in tile_paths {
        let empty_map = HashMap::new();
        let segment_map = segment_maps.get(clone_id).unwrap_or(&empty_map);

        let pairs = transform_one_tile(
            tile_path,
            clone_id,
            segment_map,
            store,
            sample_snv_vaf,
            sample_snvs_by_chr_pos,
            config,
            segment_mode,
            writer,
            global_tid,
            &mut counters,
            rng,
        )?;
        info!("transformed {pairs} pairs from {}", tile_path.display());

        std::fs::remove_file(tile_path).with_context(|| format!("could not delete consumed tile {}", tile_path.display()))?;
    }

    Ok(counters)
}

/// Write the per-sample coverage/alt TSV: `mutation_id\tcvg\talt`, zero
/// counts included for every somatic SNV the store knows.
pub fn write_coverage_tsv(path: impl AsRef<Path>, store: &VariantStore, counters: &TransformCounters) -> Result<usize> {
    let mut w = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(&path)
        .with_context(|| format!("could not create {}", path.as_ref().display()))?;

    let mut ids: Vec<&i32> = store.snv_by_id.iter().filter(|(_, s)| s.is_somatic).map(|(id, _)| id).collect();
    ids.sort();
    for id in &ids {
        let cvg = counters.cvg.get(id).copied().unwrap_or(0);
        let alt = counters.alt.get(id).copied().unwrap_or(0);
        w.write_record(&[id.to_string(), cvg.to_string(), alt.to_string()])?;
    }
    w.flush()?;
    Ok(ids.len())
}
