use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::ThreadPoolBuilder;

use bulksim::cli::{Cli, Commands, GenerateArgs};
use bulksim::config::RunConfig;
use bulksim::genome::SegmentIdAllocator;
use bulksim::karyotype::Karyotype;
use bulksim::orchestrator::{self, BulkContext};
use bulksim::reference::GenomeReference;
use bulksim::variant::VariantStore;
use bulksim::io;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let (args, generate_reads) = match &cli.command {
        Commands::Reads(args) => (args, true),
        Commands::Counts(args) => (args, false),
    };

    run(args, generate_reads)
}

fn run(args: &GenerateArgs, generate_reads: bool) -> Result<()> {
    ThreadPoolBuilder::new().num_threads(args.threads).build_global().context("could not start rayon thread pool")?;
    info!("launching {} thread(s)", args.threads);

    let reference = io::load_fasta(&args.reference)?;
    info!("loaded reference of {} bp across {} contig(s)", reference.length(), reference.chr_lengths().len());

    let karyotype = Karyotype::from_json(&args.karyotype)?;
    for (chr, _) in reference.chr_lengths() {
        if karyotype.get_ploidy(chr).is_none() {
            log::warn!("reference contig {chr} has no karyotype entry, assuming diploid baseline");
        }
    }

    let config = match &args.config {
        Some(path) => io::read_run_config(path)?,
        None => RunConfig::default(),
    };
    let config = RunConfig {
        seed: args.seed,
        threads: args.threads,
        ..config
    };

    let substitution_matrix = io::load_substitution_matrix(&args.substitution_matrix)?;
    let somatic_snv_model = io::load_somatic_snv_model(&args.somatic_snv_model)?;
    let somatic_cnv_model = io::load_cnv_model(&args.somatic_cnv_model)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let alloc = SegmentIdAllocator::new();
    let mut store = VariantStore::new();

    store.generate_germline_variants(args.n_germline, &reference, &substitution_matrix, args.hom_rate, &mut rng, args.infinite_sites)?;

    let mutations = io::collect_mutations(&args.clones)?;
    store.generate_somatic_variants(&mutations, &reference, &somatic_snv_model, &somatic_cnv_model, &mut rng, args.infinite_sites)?;
    store.index_snvs();

    let clones = io::build_clones(&args.clones, &reference, &alloc, &mut store, &config, &mut rng)?;
    info!("built {} clone genome(s)", clones.len());

    let mut samples = io::load_samples(&args.samples)?;
    info!("loaded {} sample(s)", samples.len());

    std::fs::create_dir_all(&args.out_dir).with_context(|| format!("could not create output directory {}", args.out_dir))?;
    let out_dir = Path::new(&args.out_dir);

    let ctx = BulkContext::build(&reference, clones, store);
    orchestrator::write_clone_outputs(&ctx, &config, out_dir)?;

    let global_tid = if generate_reads {
        build_global_tid(&reference)
    } else {
        HashMap::new()
    };

    orchestrator::run_samples(&ctx, &mut samples, &config, out_dir, generate_reads, &global_tid)?;

    info!("done");
    Ok(())
}

/// Map every reference contig to its global SAM `tid`, in `@SQ` order. Each
/// sample's SAM header is built separately since its `@RG` carries a
/// per-sample `LB` tag, but the `tid` numbering must stay the same across
/// every sample's header.
fn build_global_tid(reference: &dyn GenomeReference) -> HashMap<String, i32> {
    reference
        .chr_lengths()
        .iter()
        .enumerate()
        .map(|(tid, (chr, _))| (chr.clone(), tid as i32))
        .collect()
}
