//! # Tiled reference writer
//!
//! Emits per-clone FASTA tiles grouped by total copy number, padded for
//! consumption by an external read simulator.
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::interval_map::CnIntervalMap;
use crate::reference::GenomeReference;

const FASTA_LINE_WIDTH: usize = 70;
const PAD_BASE: u8 = b'A';

/// Summary statistics for one written `<clone>.<n>.fa` tile file.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileFileStats {
    pub seq_count: usize,
    pub total_len: u64,
}

/// Write one FASTA file per `(clone, total copy number)` group, skipping
/// intervals shorter than `min_len`. Returns per-group stats keyed by
/// integer copy number, plus the clone's total `Σ n × seq_len` sampling
/// weight denominator.
pub fn write_tiles(
    clone_id: &str,
    chr_cn: &HashMap<String, CnIntervalMap>,
    reference: &dyn GenomeReference,
    out_dir: impl AsRef<Path>,
    padding: u64,
    min_len: u64,
) -> Result<(HashMap<u32, TileFileStats>, f64)> {
    let mut groups: HashMap<u32, Vec<(String, u64, u64)>> = HashMap::new();

    for (chr, _) in reference.chr_lengths() {
        let Some(map) = chr_cn.get(chr) else {
            continue;
        };
        for (start, end, cn) in map.iter() {
            if end - start < min_len {
                continue;
            }
            let n = cn.total().round() as u32;
            if n == 0 {
                continue;
            }
            groups.entry(n).or_default().push((chr.clone(), start, end));
        }
    }

    let mut stats = HashMap::new();
    let mut weight_denom = 0.0f64;

    for (n, intervals) in &groups {
        let path = out_dir.as_ref().join(format!("{clone_id}.{n}.fa"));
        let file = File::create(&path).with_context(|| format!("could not create {}", path.display()))?;
        let mut w = BufWriter::new(file);

        let mut seq_count = 0usize;
        let mut total_len = 0u64;
        for (chr, start, end) in intervals {
            let padded_start = start.saturating_sub(padding);
            let padded_end = end + padding;
            let body = reference.get_sequence(chr, *start, *end);
            let pad = String::from_utf8(vec![PAD_BASE; padding as usize]).expect("ASCII padding is valid UTF-8");
            let record_seq = format!("{pad}{body}{pad}");

            writeln!(w, ">{chr}_{start}_{end}_{padding}")?;
            for chunk in record_seq.as_bytes().chunks(FASTA_LINE_WIDTH) {
                writeln!(w, "{}", std::str::from_utf8(chunk).expect("FASTA body is ASCII"))?;
            }

            seq_count += 1;
            total_len += padded_end - padded_start;
            weight_denom += (*n as f64) * (end - start) as f64;
        }

        info!("wrote tile {} ({seq_count} sequences, {total_len} bp)", path.display());
        stats.insert(*n, TileFileStats { seq_count, total_len });
    }

    Ok((stats, weight_denom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval_map::AlleleSpecificCn;
    use crate::reference::InMemoryReference;

    #[test]
    fn skips_intervals_shorter_than_min_len() {
        let reference = InMemoryReference::from_sequences(vec![("chr1".into(), "A".repeat(1000))]);
        let mut map = CnIntervalMap::new();
        map.insert(0, 50, AlleleSpecificCn::new(1.0, 1.0));
        let chr_cn = HashMap::from([("chr1".to_string(), map)]);
        let dir = std::env::temp_dir().join("bulksim_test_tiles_short");
        std::fs::create_dir_all(&dir).unwrap();

        let (stats, weight) = write_tiles("cloneA", &chr_cn, &reference, &dir, 10, 100).unwrap();
        assert!(stats.is_empty());
        assert_eq!(weight, 0.0);
    }

    #[test]
    fn groups_by_total_copy_number() {
        let reference = InMemoryReference::from_sequences(vec![("chr1".into(), "A".repeat(1000))]);
        let mut map = CnIntervalMap::new();
        map.insert(0, 500, AlleleSpecificCn::new(1.0, 1.0));
        map.insert(500, 1000, AlleleSpecificCn::new(1.0, 0.0));
        let chr_cn = HashMap::from([("chr1".to_string(), map)]);
        let dir = std::env::temp_dir().join("bulksim_test_tiles_grouped");
        std::fs::create_dir_all(&dir).unwrap();

        let (stats, weight) = write_tiles("cloneA", &chr_cn, &reference, &dir, 5, 100).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[&2].seq_count, 1);
        assert_eq!(stats[&1].seq_count, 1);
        assert!((weight - (2.0 * 500.0 + 1.0 * 500.0)).abs() < 1e-9);
    }
}
