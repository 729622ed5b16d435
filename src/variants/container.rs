//! Variant container: a canonicalised set of variants with
//! per-sample support counts, coverage, and breakpoint loci.

use std::collections::HashMap;

use crate::errors::Result;
use crate::interval::{Interval, Region};
use crate::read::Read;
use crate::variants::{Breakpoint, BreakpointLocus, Variant, VariantKind};

/// Sentinel representative-base-quality for pure deletions.
const DELETION_REPRESENTATIVE_QUAL: u32 = 1000;

#[derive(Debug, Clone, Default)]
pub struct SampleSupport {
    pub total_reads: usize,
    pub total_supporting_reads: usize,
}

pub struct VariantContainer {
    /// Keyed ordered map from variant to per-sample counts. Kept as a
    /// `Vec` of `(Variant, per-sample map)` sorted by the variant ordering
    ///; canonicalisation by normalisation before insertion keeps
    /// this key stable across re-insertion.
    entries: Vec<(Variant, HashMap<String, SampleSupport>)>,
    start_loci: HashMap<i64, BreakpointLocus>,
    end_loci: HashMap<i64, BreakpointLocus>,
    min_base_qual: u32,
    min_mapping_qual: u8,
}

impl VariantContainer {
    pub fn new(min_base_qual: u32, min_mapping_qual: u8) -> Self {
        VariantContainer {
            entries: Vec::new(),
            start_loci: HashMap::new(),
            end_loci: HashMap::new(),
            min_base_qual,
            min_mapping_qual,
        }
    }

    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        self.entries.iter().map(|(v, _)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn find_or_insert(&mut self, v: &Variant) -> usize {
        match self.entries.binary_search_by(|(existing, _)| existing.cmp(v)) {
            Ok(idx) => idx,
            Err(idx) => {
                self.entries.insert(idx, (v.clone(), HashMap::new()));
                idx
            }
        }
    }

    /// Records `v` with no supporting reads, disabling its filtering and
    /// setting its prior.
    pub fn add_candidate_variant(&mut self, mut v: Variant, prior: f64) {
        v.set_never_filter(true);
        v.set_prior(prior);
        self.find_or_insert(&v);
    }

    /// Records the variants and breakpoints observed on one read, updating
    /// per-sample supporting-read counts subject to the usual quality
    /// gates.
    pub fn add_variants_from_read(
        &mut self,
        read: &Read,
        variants: &[Variant],
        breakpoints: &[Breakpoint],
        sample: &str,
    ) {
        for v in variants {
            let rep_qual = representative_base_qual(read, v);
            let idx = self.find_or_insert(v);
            let (stored, supports) = &mut self.entries[idx];
            stored.add_supporting_read(read.id());
            if rep_qual >= self.min_base_qual && read.mapping_quality() as u32 >= self.min_mapping_qual as u32 {
                let entry = supports.entry(sample.to_string()).or_default();
                entry.total_supporting_reads += 1;
            }
        }
        for bp in breakpoints {
            let loci = if bp.is_start { &mut self.start_loci } else { &mut self.end_loci };
            let locus = loci
                .entry(bp.position)
                .or_insert_with(|| BreakpointLocus::new(bp.contig.clone(), bp.position, bp.is_start));
            locus.add(read.mate_region());
        }
    }

    /// Sets per-variant per-sample total-reads as the count of reads whose
    /// maximal-read-interval overlaps the variant's interval.
    pub fn compute_coverage(&mut self, block: &Region, reads: &[(String, Vec<Read>)]) -> Result<()> {
        for (variant, supports) in &mut self.entries {
            let variant_interval = Interval::new(variant.start(), variant.end());
            for (sample, sample_reads) in reads {
                let total = sample_reads
                    .iter()
                    .filter(|r| r.contig() == block.contig())
                    .filter(|r| {
                        r.maximal_read_interval()
                            .map(|iv| iv.overlaps(&variant_interval))
                            .unwrap_or(false)
                    })
                    .count();
                supports.entry(sample.clone()).or_default().total_reads = total;
            }
        }
        Ok(())
    }

    pub fn total_reads_supporting_variant(&self, v: &Variant) -> usize {
        self.entries
            .iter()
            .find(|(existing, _)| existing == v)
            .map(|(_, supports)| supports.values().map(|s| s.total_supporting_reads).sum())
            .unwrap_or(0)
    }

    /// Max over samples of `round(100 * supporting / total)`.
    pub fn max_read_percent_variant_coverage(&self, v: &Variant) -> u32 {
        self.entries
            .iter()
            .find(|(existing, _)| existing == v)
            .map(|(_, supports)| {
                supports
                    .values()
                    .map(|s| {
                        if s.total_reads == 0 {
                            0
                        } else {
                            ((100.0 * s.total_supporting_reads as f64 / s.total_reads as f64).round()) as u32
                        }
                    })
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    pub fn start_loci(&self) -> impl Iterator<Item = &BreakpointLocus> {
        self.start_loci.values()
    }

    pub fn end_loci(&self) -> impl Iterator<Item = &BreakpointLocus> {
        self.end_loci.values()
    }
}

fn representative_base_qual(read: &Read, v: &Variant) -> u32 {
    if matches!(v.kind(), VariantKind::Deletion) {
        return DELETION_REPRESENTATIVE_QUAL;
    }
    let interval = Interval::new(v.start(), v.end().max(v.start() + 1));
    match read.interval_in_read(&interval) {
        Ok(read_interval) if !read_interval.is_empty() => read
            .qualities()
            [read_interval.start() as usize..(read_interval.end() as usize).min(read.qualities().len())]
            .iter()
            .map(|q| *q as u32)
            .max()
            .unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceWindow;

    #[test]
    fn variants_are_stored_in_ordering_key() {
        let w = ReferenceWindow::new(Region::new("1", Interval::new(0, 10)), b"AAAAAAAAAA".to_vec()).unwrap();
        let mut container = VariantContainer::new(20, 20);
        let v1 = crate::variants::Variant::new(&w, Region::new("1", Interval::new(5, 6)), b"T".to_vec()).unwrap();
        let v2 = crate::variants::Variant::new(&w, Region::new("1", Interval::new(2, 3)), b"T".to_vec()).unwrap();
        container.add_candidate_variant(v1, 0.0);
        container.add_candidate_variant(v2, 0.0);
        let starts: Vec<_> = container.variants().map(|v| v.start()).collect();
        assert_eq!(starts, vec![2, 5]);
    }
}
