//! Run-wide configuration. External to the core algorithms, but every
//! sample-generation function threads a `&RunConfig` through, the same way
//! CLI-derived parameters get threaded into the rest of a run.
use serde::{Deserialize, Serialize};

/// Resolves three previously-ambiguous behaviors to an explicit flag
/// apiece. See DESIGN.md for the decision record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Target per-haploid-copy sequencing coverage.
    pub target_cvg: f64,
    /// Dispersion parameter for the negative-binomial depth model.
    pub seq_disp: f64,
    /// Per-base sequencing error rate.
    pub seq_err: f64,
    /// Tile padding (bp) flanking each FASTA record in the tiled reference writer.
    pub padding: u64,
    /// Minimum CN-interval length eligible for tiling.
    pub min_len: u64,
    /// Minimum alt read count for a locus to appear in the read-count VCF.
    pub min_rc: u32,
    /// Worker threads for the per-sample parallel phase.
    pub threads: usize,
    /// Master RNG seed; per-sample seeds are derived from this.
    pub seed: u64,
    /// When true (default), a second somatic SNV at an already-occupied
    /// `(chr,pos)` overwrites the first's read counts. When false, counts
    /// are summed across colliding SNVs instead.
    pub allow_locus_collision_overwrite: bool,
    /// When true, whole-chromosome deletion refuses to remove the last
    /// remaining instance of a chromosome. Default false allows
    /// unconditional deletion, including of the last instance.
    pub forbid_full_chromosome_loss: bool,
    /// When true, the VAF-mode alignment transformer increments a pair's
    /// coverage counter once per pair regardless of how many variants it
    /// overlaps. Default false counts it once per overlapping variant,
    /// double-counting pairs that straddle more than one.
    pub vaf_mode_counts_coverage_once: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_cvg: 30.0,
            seq_disp: 0.5,
            seq_err: 0.001,
            padding: 500,
            min_len: 100,
            min_rc: 1,
            threads: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            seed: 0,
            allow_locus_collision_overwrite: true,
            forbid_full_chromosome_loss: false,
            vaf_mode_counts_coverage_once: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reproduce_original_ambiguous_behavior() {
        let cfg = RunConfig::default();
        assert!(cfg.allow_locus_collision_overwrite);
        assert!(!cfg.forbid_full_chromosome_loss);
        assert!(!cfg.vaf_mode_counts_coverage_once);
    }
}
