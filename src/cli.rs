//! # Command line interface for `bulk-sample-gen`
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bulk-sample-gen",
    author,
    version,
    about = "Bulk tumor sequencing sample generator",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transform pre-simulated per-tile alignments into merged per-sample SAM
    Reads(GenerateArgs),
    /// Sample read counts directly, without an external read simulator
    Counts(GenerateArgs),
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Reference genome. Expected format is FASTA (not gzipped)
    #[arg(short, long)]
    pub reference: String,

    /// File containing chromosome names and their base ploidies. Expected format is JSON
    #[arg(short, long)]
    pub karyotype: String,

    /// Clone definitions: id plus ordered mutation stream. Expected format is JSON
    #[arg(long)]
    pub clones: String,

    /// Sample-to-clone mixing weights. Expected format is JSON
    #[arg(long)]
    pub samples: String,

    /// Germline substitution matrix. Expected format is JSON
    #[arg(long)]
    pub substitution_matrix: String,

    /// Somatic SNV trinucleotide-context model. Expected format is JSON
    #[arg(long)]
    pub somatic_snv_model: String,

    /// Somatic CNV class-weight/length-shape model. Expected format is JSON
    #[arg(long)]
    pub somatic_cnv_model: String,

    /// Run configuration overrides. Expected format is JSON; falls back to defaults for any unset field
    #[arg(long)]
    pub config: Option<String>,

    /// Directory that output files are written into
    #[arg(short, long, default_value = "out")]
    pub out_dir: String,

    /// Number of germline SNVs to generate
    #[arg(long, default_value_t = 0)]
    pub n_germline: usize,

    /// Fraction of germline SNVs marked homozygous
    #[arg(long, default_value_t = 0.33)]
    pub hom_rate: f64,

    /// Re-draw a variant's position if it collides with an existing one
    #[arg(long, default_value_t = true)]
    pub infinite_sites: bool,

    /// Number of threads to use for the parallel sample phase
    #[arg(long, default_value_t = 1, value_parser = threads_in_range)]
    pub threads: usize,

    /// Master RNG seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

fn threads_in_range(s: &str) -> Result<usize> {
    let threads: usize = s.parse().map_err(|_| anyhow::anyhow!("could not parse --threads value"))?;
    if threads < 1 {
        bail!("--threads must be at least 1");
    }
    Ok(threads)
}
