//! End-to-end exercises of the per-block pipeline: block reading against a
//! fake alignment source, candidate-variant generation, the variant
//! container/filter, and clustering, wired the way a region-level caller
//! (out of scope for this crate) would drive them.

use std::collections::HashMap;
use std::io::Write;

use germ_caller_core::cigar::Cigar;
use germ_caller_core::cluster::generate_variant_clusters;
use germ_caller_core::errors::{Error, Result};
use germ_caller_core::interval::{Interval, Region};
use germ_caller_core::reader::filter::ReadFilterConfig;
use germ_caller_core::reader::{AlignmentSource, BlockConfig, BlockReader, DecodedRecord};
use germ_caller_core::reference::{ReferenceSource, ReferenceStore};
use germ_caller_core::region_input::{self, RegionInput};
use germ_caller_core::variants::container::VariantContainer;
use germ_caller_core::variants::filter::{variant_passes_filters, VariantFilterConfig};

struct FastaSource {
    contigs: HashMap<String, Interval>,
    seq: Vec<u8>,
}

impl ReferenceSource for FastaSource {
    fn contigs(&self) -> Result<HashMap<String, Interval>> {
        Ok(self.contigs.clone())
    }

    fn read_bases(&self, _contig: &str, interval: &Interval) -> Result<Vec<u8>> {
        Ok(self.seq[interval.start() as usize..interval.end() as usize].to_vec())
    }
}

/// A fixed list of decoded records played back regardless of the
/// requested region, mimicking a tiny positional BAM iterator.
struct FixedAlignmentSource {
    records: Vec<DecodedRecord>,
    sample: String,
}

impl AlignmentSource for FixedAlignmentSource {
    fn fetch(&self, region: &Region) -> Result<Box<dyn Iterator<Item = Result<DecodedRecord>> + '_>> {
        let region = region.clone();
        Ok(Box::new(
            self.records
                .iter()
                .filter(move |r| r.contig == region.contig() && r.start < region.end())
                .cloned()
                .map(Ok),
        ))
    }

    fn default_sample_name(&self) -> &str {
        &self.sample
    }
}

fn init_logging() {
    let _ = env_logger::init();
}

fn decoded(contig: &str, start: i64, seq: &[u8], qual: &[u8], cigar: &str) -> DecodedRecord {
    DecodedRecord {
        contig: contig.to_string(),
        start,
        flags: 0,
        mapping_quality: 60,
        cigar: Cigar::parse(cigar).unwrap(),
        sequence: seq.to_vec(),
        qualities: qual.to_vec(),
        mate_contig: None,
        mate_start: None,
        insert_size: 0,
        read_group: None,
    }
}

/// One read carrying a single SNP survives the full block pipeline: it is
/// read, filtered, turned into a candidate variant, and passes the
/// container's min-reads/min-coverage filter once observed twice.
#[test]
fn block_pipeline_extracts_and_passes_a_recurring_snp() {
    init_logging();

    let mut contigs = HashMap::new();
    contigs.insert("1".to_string(), Interval::new(0, 20));
    let reference = ReferenceStore::new(FastaSource {
        contigs,
        seq: b"AAAAAAAAAAAAAAAAAAAA".to_vec(),
    });

    let records = vec![
        decoded("1", 1, b"TACG", &[30; 4], "4M"),
        decoded("1", 1, b"TACG", &[30; 4], "4M"),
    ];
    let source = FixedAlignmentSource {
        records,
        sample: "sample0".to_string(),
    };

    let reader = BlockReader::new(&reference, BlockConfig::default(), ReadFilterConfig::default());
    let region = Region::new("1", Interval::new(0, 20));
    let sample_reads = reader
        .read_block(&[("sample0".to_string(), &source as &dyn AlignmentSource)], &region, 1)
        .unwrap();

    let reads = sample_reads.reads.get("sample0").expect("sample present");
    assert_eq!(reads.len(), 2);

    let mut container = VariantContainer::new(20, 20);
    for read in reads {
        let variants = read.get_variants().unwrap();
        let breakpoints = read.get_breakpoints();
        container.add_variants_from_read(read, &variants, &breakpoints, "sample0");
    }
    container.compute_coverage(&region, &[("sample0".to_string(), reads.clone())]).unwrap();

    // three SNPs at 1:1-2, 1:3-4, 1:4-5, each seen on both reads.
    assert_eq!(container.len(), 3);
    let config = VariantFilterConfig {
        min_reads: 2,
        min_per_sample_percentage: 50,
    };
    for v in container.variants() {
        assert!(variant_passes_filters(v, &container, &config), "variant at {} should pass", v.start());
    }
}

/// A read entirely outside the requested region contributes nothing.
#[test]
fn read_outside_region_is_dropped() {
    let mut contigs = HashMap::new();
    contigs.insert("1".to_string(), Interval::new(0, 100));
    let reference = ReferenceStore::new(FastaSource {
        contigs,
        seq: vec![b'A'; 100],
    });

    let records = vec![decoded("1", 50, b"AAAA", &[30; 4], "4M")];
    let source = FixedAlignmentSource {
        records,
        sample: "sample0".to_string(),
    };

    let reader = BlockReader::new(&reference, BlockConfig::default(), ReadFilterConfig::default());
    let region = Region::new("1", Interval::new(0, 10));
    let sample_reads = reader
        .read_block(&[("sample0".to_string(), &source as &dyn AlignmentSource)], &region, 0)
        .unwrap();

    assert!(sample_reads.reads.get("sample0").map(|r| r.is_empty()).unwrap_or(true));
}

/// Clusters produced at a tighter distance threshold are always subsets of
/// clusters produced at a looser one (scenario-level check of §8's
/// stability property, run against the public cluster API).
#[test]
fn clustering_stability_holds_across_the_public_api() {
    let mut contigs = HashMap::new();
    contigs.insert("1".to_string(), Interval::new(0, 50));
    let reference = ReferenceStore::new(FastaSource {
        contigs,
        seq: vec![b'A'; 50],
    });
    let window = reference.get_sequence(&Region::new("1", Interval::new(0, 50))).unwrap();

    let variants = vec![
        germ_caller_core::variants::Variant::new(&window, Region::new("1", Interval::new(1, 2)), b"T".to_vec()).unwrap(),
        germ_caller_core::variants::Variant::new(&window, Region::new("1", Interval::new(5, 6)), b"T".to_vec()).unwrap(),
        germ_caller_core::variants::Variant::new(&window, Region::new("1", Interval::new(30, 31)), b"T".to_vec()).unwrap(),
    ];
    let block = Region::new("1", Interval::new(0, 50));

    let tight = generate_variant_clusters(&variants, 2, &block);
    let loose = generate_variant_clusters(&variants, 10, &block);

    for c in &tight {
        let starts: std::collections::HashSet<_> = c.variants().iter().map(|v| v.start()).collect();
        assert!(loose.iter().any(|lc| {
            let l_starts: std::collections::HashSet<_> = lc.variants().iter().map(|v| v.start()).collect();
            starts.is_subset(&l_starts)
        }));
    }
}

/// Region input: a BED file on disk resolves to the same regions as a
/// direct parse, and mixing a BED file with region strings is rejected.
#[test]
fn region_input_from_bed_file_and_rejects_mixing() {
    let mut bed_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(bed_file, "1\t10\t20").unwrap();
    writeln!(bed_file, "2\t0\t5").unwrap();
    let bed_text = std::fs::read_to_string(bed_file.path()).unwrap();

    let input = RegionInput::from_args(Some(bed_text.clone()), Vec::new()).unwrap();
    let mut known = HashMap::new();
    known.insert("1".to_string(), Interval::new(0, 100));
    known.insert("2".to_string(), Interval::new(0, 100));
    let regions = region_input::resolve_regions(&input, &known).unwrap();
    assert_eq!(regions.len(), 2);

    let mixed = RegionInput::from_args(Some(bed_text), vec!["1:0-5".to_string()]);
    assert!(matches!(mixed, Err(Error::InvalidArgument(_))));
}
