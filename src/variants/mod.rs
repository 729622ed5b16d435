//! Variant and breakpoint data model, candidate generation,
//! the variant container and the variant filter.

pub mod candidates;
pub mod container;
pub mod filter;

use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use strum_macros::{EnumString, IntoStaticStr};

use crate::errors::{Error, Result};
use crate::interval::{Interval, Region};
use crate::reference::ReferenceWindow;

/// Shape classification of a variant by ref/alt length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
pub enum VariantKind {
    #[strum(serialize = "SNP")]
    Snp,
    #[strum(serialize = "MNP")]
    Mnp,
    #[strum(serialize = "INS")]
    Insertion,
    #[strum(serialize = "DEL")]
    Deletion,
    #[strum(serialize = "COMPLEX")]
    Complex,
}

fn classify(reference: &[u8], alt: &[u8]) -> VariantKind {
    match (reference.len(), alt.len()) {
        (0, 0) => VariantKind::Complex,
        (0, _) => VariantKind::Insertion,
        (_, 0) => VariantKind::Deletion,
        (r, a) if r == a && r == 1 => VariantKind::Snp,
        (r, a) if r == a => VariantKind::Mnp,
        _ => VariantKind::Complex,
    }
}

/// A candidate variant: `(reference_window, region, alt_sequence)`.
#[derive(Debug, Clone)]
pub struct Variant {
    contig: String,
    region: Region,
    reference: Vec<u8>,
    alt: Vec<u8>,
    kind: VariantKind,
    /// Supporting reads, by opaque read id (the read model assigns these);
    /// kept as a plain `Vec` since reads may be recorded more than once is
    /// not expected, but order reflects insertion order.
    supporting_reads: Arc<Mutex<Vec<u64>>>,
    prior: f64,
    never_filter: bool,
    is_genotyping: bool,
    from_breakpoint: bool,
}

impl Variant {
    pub fn new(window: &ReferenceWindow, region: Region, alt: Vec<u8>) -> Result<Self> {
        let reference = window.subseq(&region)?.sequence().to_vec();
        Ok(Self::from_parts(region, reference, alt))
    }

    /// Builds a variant from an already-known `(region, reference, alt)`
    /// triple without consulting a reference window, trusting the caller
    /// (normalisation's join/split, which derive `reference` from already
    /// window-backed variants).
    pub(crate) fn from_parts(region: Region, reference: Vec<u8>, alt: Vec<u8>) -> Self {
        let kind = classify(&reference, &alt);
        Variant {
            contig: region.contig().to_string(),
            region,
            reference,
            alt,
            kind,
            supporting_reads: Arc::new(Mutex::new(Vec::new())),
            prior: 0.0,
            never_filter: false,
            is_genotyping: false,
            from_breakpoint: false,
        }
    }

    pub fn contig(&self) -> &str {
        &self.contig
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn start(&self) -> i64 {
        self.region.start()
    }

    pub fn end(&self) -> i64 {
        self.region.end()
    }

    pub fn reference(&self) -> &[u8] {
        &self.reference
    }

    pub fn alt(&self) -> &[u8] {
        &self.alt
    }

    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    pub fn is_pure_indel(&self) -> bool {
        matches!(self.kind, VariantKind::Insertion | VariantKind::Deletion)
    }

    /// VCF-position: `start - 1` for pure indels, else `start`.
    pub fn vcf_position(&self) -> i64 {
        if self.is_pure_indel() {
            self.start() - 1
        } else {
            self.start()
        }
    }

    pub fn set_prior(&mut self, prior: f64) {
        self.prior = prior;
    }

    pub fn prior(&self) -> f64 {
        self.prior
    }

    pub fn set_never_filter(&mut self, v: bool) {
        self.never_filter = v;
    }

    pub fn never_filter(&self) -> bool {
        self.never_filter
    }

    pub fn set_is_genotyping(&mut self, v: bool) {
        self.is_genotyping = v;
    }

    pub fn is_genotyping(&self) -> bool {
        self.is_genotyping
    }

    pub fn set_from_breakpoint(&mut self, v: bool) {
        self.from_breakpoint = v;
    }

    pub fn from_breakpoint(&self) -> bool {
        self.from_breakpoint
    }

    pub fn add_supporting_read(&self, read_id: u64) {
        self.supporting_reads.lock().unwrap().push(read_id);
    }

    pub fn supporting_read_count(&self) -> usize {
        self.supporting_reads.lock().unwrap().len()
    }

    pub fn supporting_reads(&self) -> Vec<u64> {
        self.supporting_reads.lock().unwrap().clone()
    }

    /// Ordering key used throughout: contig, then
    /// zero-indexed-vcf-pos, then end, then seq-length, then seq lex.
    fn sort_key(&self) -> (&str, i64, i64, usize, &[u8]) {
        (
            &self.contig,
            self.vcf_position(),
            self.end(),
            self.alt.len(),
            &self.alt[..],
        )
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.contig == other.contig && self.region == other.region && self.alt == other.alt
    }
}
impl Eq for Variant {}

impl PartialOrd for Variant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// A soft/hard-clip breakpoint observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Breakpoint {
    pub contig: String,
    pub position: i64,
    pub is_start: bool,
    pub clip_sequence: Vec<u8>,
}

/// Groups breakpoints sharing `(contig, position, is_start)`, accumulating
/// mate regions (via `SetRegions` merge-on-insert) and a support count.
#[derive(Debug, Clone)]
pub struct BreakpointLocus {
    pub contig: String,
    pub position: i64,
    pub is_start: bool,
    pub support: usize,
    pub mate_regions: crate::interval::SetRegions,
}

impl BreakpointLocus {
    pub fn new(contig: impl Into<String>, position: i64, is_start: bool) -> Self {
        BreakpointLocus {
            contig: contig.into(),
            position,
            is_start,
            support: 0,
            mate_regions: crate::interval::SetRegions::new(),
        }
    }

    pub fn add(&mut self, mate_region: Option<Region>) {
        self.support += 1;
        if let Some(r) = mate_region {
            self.mate_regions.insert(r);
        }
    }

    pub fn passes_min_support(&self, min_support: usize) -> bool {
        self.support >= min_support
    }
}

pub(crate) fn require_same_contig(a: &Variant, b: &Variant) -> Result<()> {
    if a.contig() != b.contig() {
        return Err(Error::Invariant(format!(
            "variants on different contigs cannot be combined: {} vs {}",
            a.contig(),
            b.contig()
        )));
    }
    Ok(())
}

pub(crate) fn region_from_interval(contig: &str, interval: Interval) -> Region {
    Region::new(contig, interval)
}
