//! The reference-genome reader is an external collaborator: this module
//! only defines the interface the core consumes from it, plus a small
//! in-memory implementation usable in tests and for small references.
use std::collections::HashMap;

use crate::nucleotide::Nuc;

/// What the core needs from a loaded reference genome. A real FASTA reader
/// lives outside this crate and would implement this trait; [`InMemoryReference`]
/// is a minimal implementation used by unit/integration tests.
pub trait GenomeReference {
    /// Total reference length across all chromosomes.
    fn length(&self) -> u64;
    /// Chromosome ids in traversal order, paired with their lengths.
    fn chr_lengths(&self) -> &[(String, u64)];
    /// Nucleotide sequence of `[start, end)` on `chr`, upper-case.
    fn get_sequence(&self, chr: &str, start: u64, end: u64) -> String;
    /// Pre-indexed reference positions whose base is `nuc`, per chromosome.
    fn nucleotide_positions(&self, chr: &str, nuc: Nuc) -> &[u64];
    /// Pre-indexed reference positions whose surrounding 3-mer equals `context`
    /// (context is the 3 bases centered so that `position + 1` is the middle base).
    fn trinucleotide_positions(&self, chr: &str, context: &str) -> &[u64];
}

/// A reference genome held fully in memory, with nucleotide- and
/// trinucleotide-position indices built eagerly at load time.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReference {
    chr_lengths: Vec<(String, u64)>,
    sequences: HashMap<String, Vec<u8>>,
    nuc_index: HashMap<(String, Nuc), Vec<u64>>,
    trinuc_index: HashMap<(String, String), Vec<u64>>,
}

impl InMemoryReference {
    pub fn from_sequences(records: Vec<(String, String)>) -> Self {
        let mut r = Self::default();
        for (id, seq) in records {
            let seq = seq.to_ascii_uppercase();
            let bytes = seq.into_bytes();
            r.chr_lengths.push((id.clone(), bytes.len() as u64));

            for (pos, &b) in bytes.iter().enumerate() {
                let nuc = Nuc::from_base(b);
                r.nuc_index
                    .entry((id.clone(), nuc))
                    .or_default()
                    .push(pos as u64);
            }
            for window_start in 0..bytes.len().saturating_sub(2) {
                let context: String = bytes[window_start..window_start + 3]
                    .iter()
                    .map(|&b| b as char)
                    .collect();
                r.trinuc_index
                    .entry((id.clone(), context))
                    .or_default()
                    .push(window_start as u64);
            }
            r.sequences.insert(id, bytes);
        }
        r
    }
}

impl GenomeReference for InMemoryReference {
    fn length(&self) -> u64 {
        self.chr_lengths.iter().map(|(_, l)| l).sum()
    }

    fn chr_lengths(&self) -> &[(String, u64)] {
        &self.chr_lengths
    }

    fn get_sequence(&self, chr: &str, start: u64, end: u64) -> String {
        let Some(seq) = self.sequences.get(chr) else {
            return String::new();
        };
        let start = start as usize;
        let end = (end as usize).min(seq.len());
        if start >= end {
            return String::new();
        }
        seq[start..end].iter().map(|&b| b as char).collect()
    }

    fn nucleotide_positions(&self, chr: &str, nuc: Nuc) -> &[u64] {
        self.nuc_index
            .get(&(chr.to_string(), nuc))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn trinucleotide_positions(&self, chr: &str, context: &str) -> &[u64] {
        self.trinuc_index
            .get(&(chr.to_string(), context.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_nucleotide_positions() {
        let reference = InMemoryReference::from_sequences(vec![("chr1".into(), "ACGTACGT".into())]);
        assert_eq!(reference.nucleotide_positions("chr1", Nuc::A), &[0, 4]);
        assert_eq!(reference.nucleotide_positions("chr1", Nuc::T), &[3, 7]);
    }

    #[test]
    fn indexes_trinucleotide_positions() {
        let reference = InMemoryReference::from_sequences(vec![("chr1".into(), "ACGTACGT".into())]);
        assert_eq!(reference.trinucleotide_positions("chr1", "ACG"), &[0, 4]);
    }

    #[test]
    fn get_sequence_slices_half_open() {
        let reference = InMemoryReference::from_sequences(vec![("chr1".into(), "ACGTACGT".into())]);
        assert_eq!(reference.get_sequence("chr1", 2, 5), "GTA");
    }
}
