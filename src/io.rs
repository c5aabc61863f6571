//! # Run setup I/O
//!
//! JSON loaders that assemble a run: the clone-mutation streams, the
//! sample-clone weight matrix, and the germline/somatic variant models.
//! The reference FASTA reader and the clone-tree builder proper stay
//! external collaborators; this module only builds what a runnable binary
//! needs from flattened, already-decided inputs.
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;
use serde::Deserialize;

use crate::genome::{GenomeInstance, SegmentIdAllocator};
use crate::orchestrator::Clone;
use crate::reference::GenomeReference;
use crate::sample::BulkSample;
use crate::variant::{CnvModel, Mutation, SomaticSnvModel, SubstitutionMatrix, VariantStore};

#[derive(Debug, Deserialize)]
struct MutationRecord {
    id: i32,
    is_snv: bool,
}

#[derive(Debug, Deserialize)]
struct CloneRecord {
    id: String,
    mutations: Vec<MutationRecord>,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &str) -> Result<T> {
    let file = File::open(path).with_context(|| format!("could not open {path}"))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).with_context(|| format!("could not parse JSON {path}"))
}

/// Flatten every clone's mutation stream into the distinct set of
/// [`Mutation`]s the run needs `VariantStore::generate_somatic_variants` to
/// populate, deduplicated by id (several clones may share an inherited
/// mutation id from an ancestor branch).
pub fn collect_mutations(path: &str) -> Result<Vec<Mutation>> {
    let records: Vec<CloneRecord> = read_json(path)?;
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for record in &records {
        for m in &record.mutations {
            if seen.insert(m.id) {
                out.push(if m.is_snv { Mutation::snv(m.id) } else { Mutation::cnv(m.id) });
            }
        }
    }
    Ok(out)
}

/// Build every clone's genome: start diploid, apply the run's germline
/// variants, then apply the clone's own ordered somatic mutation stream.
/// `store` must already hold every `Snv`/`Cnv` referenced, including
/// germline entries from [`crate::variant::VariantStore::generate_germline_variants`].
pub fn build_clones(
    path: &str,
    reference: &dyn GenomeReference,
    alloc: &SegmentIdAllocator,
    store: &mut VariantStore,
    config: &crate::config::RunConfig,
    rng: &mut impl rand::Rng,
) -> Result<Vec<Clone>> {
    let records: Vec<CloneRecord> = read_json(path)?;
    let mut clones = Vec::with_capacity(records.len());

    for record in records {
        let mut genome = GenomeInstance::new_diploid(reference, alloc);
        store.apply_germline_variants(&genome, rng)?;
        for m in &record.mutations {
            let mutation = if m.is_snv { Mutation::snv(m.id) } else { Mutation::cnv(m.id) };
            store.apply_mutation(mutation, &mut genome, alloc, rng, config)?;
        }
        clones.push(Clone { id: record.id, genome });
    }
    Ok(clones)
}

/// Load the sample-clone weight matrix (`{sample_id: {clone_id: weight}}`).
pub fn load_samples(path: &str) -> Result<Vec<BulkSample>> {
    let raw: HashMap<String, HashMap<String, f64>> = read_json(path)?;
    let mut samples: Vec<BulkSample> = raw
        .into_iter()
        .map(|(id, weights)| {
            let mut sample = BulkSample::new(id);
            sample.clone_weights = weights;
            sample
        })
        .collect();
    samples.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(samples)
}

#[derive(Debug, Deserialize)]
struct SubstitutionMatrixRecord {
    rows: [[f64; 4]; 4],
}

/// Load a 4x4 (row-major ACGT) substitution matrix from JSON.
pub fn load_substitution_matrix(path: &str) -> Result<SubstitutionMatrix> {
    let record: SubstitutionMatrixRecord = read_json(path)?;
    let flat: Vec<f64> = record.rows.iter().flatten().copied().collect();
    let array = Array2::from_shape_vec((4, 4), flat).context("substitution matrix must be 4x4")?;
    Ok(SubstitutionMatrix(array))
}

#[derive(Debug, Deserialize)]
struct SomaticSnvModelRecord {
    contexts: Vec<String>,
    context_weights: Vec<f64>,
    alt_weights: HashMap<String, [f64; 4]>,
}

pub fn load_somatic_snv_model(path: &str) -> Result<SomaticSnvModel> {
    let record: SomaticSnvModelRecord = read_json(path)?;
    Ok(SomaticSnvModel {
        contexts: record.contexts,
        context_weights: record.context_weights,
        alt_weights: record.alt_weights,
    })
}

pub fn load_cnv_model(path: &str) -> Result<CnvModel> {
    read_json(path)
}

/// Load a `RunConfig` override file, JSON, falling back to `RunConfig::default()`
/// values for any field left unset (via serde's `#[serde(default)]` on the
/// struct, see `config.rs`).
pub fn read_run_config(path: &str) -> Result<crate::config::RunConfig> {
    read_json(path)
}

/// Load a FASTA file into an in-memory reference. A thin, single-pass
/// reader; anything heavier (indexed random access, compressed FASTA)
/// is the external reader's job.
pub fn load_fasta(path: impl AsRef<Path>) -> Result<crate::reference::InMemoryReference> {
    let content = std::fs::read_to_string(&path).with_context(|| format!("could not read FASTA {}", path.as_ref().display()))?;
    let mut records = Vec::new();
    let mut current_id: Option<String> = None;
    let mut current_seq = String::new();

    for line in content.lines() {
        if let Some(id) = line.strip_prefix('>') {
            if let Some(prev_id) = current_id.take() {
                records.push((prev_id, std::mem::take(&mut current_seq)));
            }
            current_id = Some(id.split_whitespace().next().unwrap_or(id).to_string());
        } else {
            current_seq.push_str(line.trim());
        }
    }
    if let Some(prev_id) = current_id {
        records.push((prev_id, current_seq));
    }

    Ok(crate::reference::InMemoryReference::from_sequences(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_multi_record_fasta() -> Result<()> {
        let mut path = std::env::temp_dir();
        path.push("bulksim_test_reference.fa");
        let mut file = File::create(&path)?;
        writeln!(file, ">chr1\nACGT\nACGT\n>chr2\nTTTT")?;

        let reference = load_fasta(&path)?;
        assert_eq!(reference.length(), 12);
        assert_eq!(reference.get_sequence("chr1", 0, 8), "ACGTACGT");
        assert_eq!(reference.get_sequence("chr2", 0, 4), "TTTT");
        Ok(())
    }

    #[test]
    fn loads_sample_weight_matrix() -> Result<()> {
        let mut path = std::env::temp_dir();
        path.push("bulksim_test_samples.json");
        let mut file = File::create(&path)?;
        write!(file, r#"{{"s1": {{"cloneA": 0.7, "cloneB": 0.3}}}}"#)?;

        let samples = load_samples(path.to_str().unwrap())?;
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].id, "s1");
        assert_eq!(samples[0].clone_weights["cloneA"], 0.7);
        Ok(())
    }
}
