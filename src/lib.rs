//! # bulksim
//!
//! Simulates bulk tumor DNA sequencing data from a clonal population model:
//! per-clone segmented genomes carrying somatic SNVs/CNVs, mixed into bulk
//! samples with copy-number-aware expected coverage and allele frequencies,
//! either sampled directly or spiked into pre-simulated read alignments.
pub mod align;
pub mod cli;
pub mod cn;
pub mod config;
pub mod genome;
pub mod interval_map;
pub mod io;
pub mod karyotype;
pub mod nucleotide;
pub mod orchestrator;
pub mod readcount;
pub mod reference;
pub mod reference_writer;
pub mod sample;
pub mod vaf;
pub mod variant;
