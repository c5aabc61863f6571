use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use bulksim::align;
use bulksim::cn::{self, CloneCn};
use bulksim::config::RunConfig;
use bulksim::genome::{GenomeInstance, SegmentIdAllocator};
use bulksim::reference::{GenomeReference, InMemoryReference};
use bulksim::sample::BulkSample;
use bulksim::variant::{Snv, VariantStore};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_htslib::bam::record::{Cigar, CigarString};
use rust_htslib::bam::{self, Read as BamRead};

/// Write a one-contig tile SAM file with `ref_id` as its `@SQ` name, one
/// record per `(local_pos, seq)` pair in file order. Alignment transform
/// tests pair up consecutive records the same way the real tile writer
/// emits mate1/mate2 pairs back to back.
fn write_tile_sam(path: &Path, ref_id: &str, ref_len: u32, records: &[(i64, &str)]) {
    let mut header = bam::Header::new();
    let mut sq = bam::header::HeaderRecord::new(b"SQ");
    sq.push_tag(b"SN", ref_id);
    sq.push_tag(b"LN", ref_len as i32);
    header.push_record(&sq);

    let mut writer = bam::Writer::from_path(path, &header, bam::Format::Sam).unwrap();
    for (pos, seq) in records {
        let mut record = bam::Record::new();
        let cigar = CigarString(vec![Cigar::Match(seq.len() as u32)]).into_view(0);
        record.set(b"r", Some(&cigar), seq.as_bytes(), &vec![30u8; seq.len()]);
        record.set_tid(0);
        record.set_pos(*pos);
        record.set_mtid(0);
        record.set_mpos(*pos);
        writer.write(&record).unwrap();
    }
}

fn reference() -> InMemoryReference {
    InMemoryReference::from_sequences(vec![("chr1".into(), "A".repeat(1_000_000))])
}

/// Single diploid clone, single sample at full weight, one somatic SNV at a
/// fixed VAF: CN conservation plus depth/alt-depth law across module
/// boundaries (genome -> cn -> readcount), corresponding to scenario S1.
#[test]
fn single_clone_single_sample_read_counts_follow_depth_law() {
    let reference = reference();
    let alloc = SegmentIdAllocator::new();
    let genome = GenomeInstance::new_diploid(&reference, &alloc);

    let mut store = VariantStore::new();
    store.snv_by_id.insert(
        0,
        Snv {
            id_str: "somatic_0".into(),
            chr: "chr1".into(),
            pos: 500,
            ref_allele: "A".into(),
            alt_allele: "T".into(),
            is_somatic: true,
            is_het: true,
            idx_mutation: 0,
        },
    );

    let clone_cn = genome.get_copy_number_state_by_chr(1.0);
    let clones = vec![CloneCn { clone_id: "clone1", chr_cn: &clone_cn }];

    let mut sample = BulkSample::new("sample1");
    sample.clone_weights.insert("clone1".into(), 1.0);
    sample.snv_vaf.insert(0, 0.5);

    cn::calculate_bulk_copy_number(&clones, std::slice::from_mut(&mut sample), &reference);
    assert_eq!(sample.genome_len_abs, reference.length() * 2);

    let config = RunConfig {
        target_cvg: 100.0,
        seq_disp: 0.0,
        seq_err: 0.0,
        min_rc: 1,
        ..RunConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(42);

    let records = bulksim::readcount::simulate_read_counts(&sample, &store, &reference, &config, &mut rng).unwrap();
    assert_eq!(records.len(), 1);
    let (key, rec) = &records[0];
    assert_eq!(*key, ("chr1".to_string(), 500));
    assert_eq!(rec.total(), 200, "diploid locus at full weight and 100x target coverage expects 200x raw depth under zero dispersion");
}

/// Weighted two-clone mixture: each clone's unweighted allele-specific CN is
/// merged additively, scaled by the sample's clone weights, corresponding to
/// scenario S2.
#[test]
fn two_clone_mixture_produces_weighted_copy_number() {
    let reference = InMemoryReference::from_sequences(vec![("chr1".into(), "A".repeat(1000))]);
    let alloc = SegmentIdAllocator::new();

    let mut clone_a = GenomeInstance::new_diploid(&reference, &alloc);
    clone_a.delete_chromosome("chr1", 1, false).unwrap();

    let mut clone_b = GenomeInstance::new_diploid(&reference, &alloc);
    clone_b.duplicate_chromosome_instance("chr1", 0, &alloc).unwrap();
    clone_b.delete_chromosome("chr1", 1, false).unwrap();

    let clone_a_cn = clone_a.get_copy_number_state_by_chr(1.0);
    let clone_b_cn = clone_b.get_copy_number_state_by_chr(1.0);
    let clones = vec![
        CloneCn { clone_id: "cloneA", chr_cn: &clone_a_cn },
        CloneCn { clone_id: "cloneB", chr_cn: &clone_b_cn },
    ];

    let mut sample = BulkSample::new("sample1");
    sample.clone_weights.insert("cloneA".into(), 0.7);
    sample.clone_weights.insert("cloneB".into(), 0.3);

    cn::calculate_bulk_copy_number(&clones, std::slice::from_mut(&mut sample), &reference);

    let cn = sample.chr_cn["chr1"].value_at(500);
    assert!((cn.total() - (0.7 * 1.0 + 0.3 * 2.0)).abs() < 1e-9);
}

/// Mutation transfer through whole-genome duplication, corresponding to
/// scenario S3: a somatic SNV carried on one segment copy must propagate
/// onto both halves of a WGD split.
#[test]
fn wgd_duplicates_segment_copies_and_transfers_variants() {
    let reference = reference();
    let alloc = SegmentIdAllocator::new();
    let mut genome = GenomeInstance::new_diploid(&reference, &alloc);

    let seg_id = genome.get_segment_copies_at("chr1", 100)[0].id;
    let mut store = VariantStore::new();
    store.snv_by_id.insert(
        1,
        Snv {
            id_str: "somatic_1".into(),
            chr: "chr1".into(),
            pos: 100,
            ref_allele: "A".into(),
            alt_allele: "C".into(),
            is_somatic: true,
            is_het: true,
            idx_mutation: 1,
        },
    );
    store.segment_vars.insert(seg_id, vec![1]);

    let mods = genome.duplicate(&alloc);
    store.transfer_mutations(&mods);

    let covering = genome.get_segment_copies_at("chr1", 100);
    assert_eq!(covering.len(), 2);
    for seg in covering {
        assert!(store.segment_vars[&seg.id].contains(&1));
    }
}

/// Focal deletion over a mutated region, corresponding to scenario S4: a
/// somatic SNV sitting entirely inside a deleted span must not be
/// transferred onto any segment copy that survives the deletion.
#[test]
fn focal_deletion_removes_mutation_from_surviving_segments() {
    let reference = InMemoryReference::from_sequences(vec![("chr1".into(), "A".repeat(1000))]);
    let alloc = SegmentIdAllocator::new();
    let mut genome = GenomeInstance::new_diploid(&reference, &alloc);

    let seg_id = genome.get_segment_copies_at("chr1", 250)[0].id;
    let mut store = VariantStore::new();
    store.snv_by_id.insert(
        2,
        Snv {
            id_str: "somatic_2".into(),
            chr: "chr1".into(),
            pos: 250,
            ref_allele: "A".into(),
            alt_allele: "G".into(),
            is_somatic: true,
            is_het: true,
            idx_mutation: 2,
        },
    );
    store.segment_vars.insert(seg_id, vec![2]);

    let mods = genome.delete_region("chr1", 0, 0.2, 0.1, false, &alloc).unwrap();
    store.transfer_mutations(&mods);

    assert!(genome.get_segment_copies_at("chr1", 250).is_empty(), "deleted span must no longer be covered by any segment copy");
    for vars in store.segment_vars.values() {
        assert!(!vars.contains(&2), "mutation inside a deleted region must not land on a surviving segment");
    }
}

/// Tile-local-to-global coordinate translation plus padding rejection,
/// corresponding to scenario S5: a pair whose mate1 falls outside the
/// tile's padded range must be dropped, while a pair fully inside it must
/// have its coordinates translated to the global reference frame.
#[test]
fn alignment_transform_translates_coordinates_and_rejects_out_of_padding_pairs() {
    let dir = std::env::temp_dir().join("bulksim_test_s5_translate");
    std::fs::create_dir_all(&dir).unwrap();
    let tile_path = dir.join("s1.cloneA.2.sam");

    // tile spans ref chr1:1000-2000 with 50bp padding, so local [0,1100)
    // maps to global chr1:950-2050; local < 50 or >= 1050 is padding-only.
    write_tile_sam(
        &tile_path,
        "chr1_1000_2000_50",
        1100,
        &[
            (10, "AAAAAAAAAA"),   // mate1 outside padded range, pair rejected
            (60, "AAAAAAAAAA"),   // mate1 of the surviving pair
            (80, "AAAAAAAAAA"),   // mate2 of the surviving pair
        ],
    );

    let out_path = dir.join("out.sam");
    let mut out_header = bam::Header::new();
    let mut sq = bam::header::HeaderRecord::new(b"SQ");
    sq.push_tag(b"SN", "chr1");
    sq.push_tag(b"LN", 1_000_000);
    out_header.push_record(&sq);
    let mut writer = bam::Writer::from_path(&out_path, &out_header, bam::Format::Sam).unwrap();

    let global_tid = HashMap::from([("chr1".to_string(), 0i32)]);
    let segment_maps = HashMap::new();
    let store = VariantStore::new();
    let snv_vaf = HashMap::new();
    let snvs_by_chr_pos: HashMap<String, BTreeMap<u64, Vec<i32>>> = HashMap::new();
    let config = RunConfig::default();
    let mut rng = StdRng::seed_from_u64(1);

    let counters = align::transform_sample_tiles(
        "s1",
        &[(tile_path, "cloneA".to_string())],
        &segment_maps,
        &store,
        &snv_vaf,
        &snvs_by_chr_pos,
        &config,
        false,
        &mut writer,
        &global_tid,
        &mut rng,
    )
    .unwrap();
    assert!(counters.cvg.is_empty());
    drop(writer);

    let mut reader = bam::Reader::from_path(&out_path).unwrap();
    let records: Vec<bam::Record> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2, "the out-of-padding mate1 must drop its whole pair, leaving only the surviving one");
    assert_eq!(records[0].pos(), 1010);
    assert_eq!(records[1].pos(), 1030);
}

/// VAF-mode spike-in with a real somatic SNV, corresponding to scenario S6:
/// after transformation, mate1's base at the variant's offset must be the
/// variant's actual alt allele, not a placeholder, and the alt counter must
/// increment for the overlapping pair.
#[test]
fn vaf_mode_spike_in_writes_the_variants_real_alt_base() {
    let dir = std::env::temp_dir().join("bulksim_test_s6_vaf_spike");
    std::fs::create_dir_all(&dir).unwrap();
    let tile_path = dir.join("s1.cloneA.2.sam");

    // offset = start - padding = 1000 - 50 = 950; mate1 local 60 -> global
    // 1010, so the variant at global 1020 sits at mate1's read offset 10.
    write_tile_sam(
        &tile_path,
        "chr1_1000_2000_50",
        1100,
        &[(60, "AAAAAAAAAAAAAAAAAAAA"), (90, "AAAAAAAAAAAAAAAAAAAA")],
    );

    let out_path = dir.join("out.sam");
    let mut out_header = bam::Header::new();
    let mut sq = bam::header::HeaderRecord::new(b"SQ");
    sq.push_tag(b"SN", "chr1");
    sq.push_tag(b"LN", 1_000_000);
    out_header.push_record(&sq);
    let mut writer = bam::Writer::from_path(&out_path, &out_header, bam::Format::Sam).unwrap();

    let global_tid = HashMap::from([("chr1".to_string(), 0i32)]);
    let segment_maps = HashMap::new();

    let mut store = VariantStore::new();
    store.snv_by_id.insert(
        5,
        Snv {
            id_str: "somatic_5".into(),
            chr: "chr1".into(),
            pos: 1020,
            ref_allele: "A".into(),
            alt_allele: "T".into(),
            is_somatic: true,
            is_het: true,
            idx_mutation: 5,
        },
    );
    let snv_vaf = HashMap::from([(5, 1.0)]);
    let snvs_by_chr_pos: HashMap<String, BTreeMap<u64, Vec<i32>>> = HashMap::from([("chr1".to_string(), BTreeMap::from([(1020u64, vec![5])]))]);
    let config = RunConfig::default();
    let mut rng = StdRng::seed_from_u64(1);

    let counters = align::transform_sample_tiles(
        "s1",
        &[(tile_path, "cloneA".to_string())],
        &segment_maps,
        &store,
        &snv_vaf,
        &snvs_by_chr_pos,
        &config,
        false,
        &mut writer,
        &global_tid,
        &mut rng,
    )
    .unwrap();
    assert_eq!(counters.cvg.get(&5), Some(&1));
    assert_eq!(counters.alt.get(&5), Some(&1), "the spiked-in base must count toward the alt counter");
    drop(writer);

    let mut reader = bam::Reader::from_path(&out_path).unwrap();
    let records: Vec<bam::Record> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);
    let mate1 = &records[0];
    assert_eq!(mate1.pos(), 1010);
    assert_eq!(mate1.seq().as_bytes()[10], b'T', "mate1's base at the variant's read offset must become its real alt allele");
}
