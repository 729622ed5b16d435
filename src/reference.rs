//! Cached contig sequence windows.
//!
//! The byte-level decoding of the reference FASTA/index is out of scope;
//! this module assumes a [`ReferenceSource`] that can already hand back
//! raw bases for a contig range, the way callers elsewhere wrap an
//! already-opened FASTA index reader.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::errors::{Error, Result};
use crate::interval::{Interval, Region};

pub const GAP_CHAR: u8 = b'N';

/// A backing store capable of returning upper-cased bases for a contig
/// range, padding positions outside `[0, contig_len)` with `N`.
pub trait ReferenceSource {
    /// Map of contig name to its `[0, length)` interval, used only to
    /// establish bounds — nothing is assumed about on-disk byte layout.
    fn contigs(&self) -> Result<HashMap<String, Interval>>;

    /// Raw upper-cased bases for `region`, clipped to the contig's bounds.
    /// The caller is responsible for padding the clipped portion with `N`.
    fn read_bases(&self, contig: &str, interval: &Interval) -> Result<Vec<u8>>;
}

/// `(region, sequence)` with `sequence.len() == region.size()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceWindow {
    region: Region,
    sequence: Vec<u8>,
}

impl ReferenceWindow {
    pub fn new(region: Region, sequence: Vec<u8>) -> Result<Self> {
        if sequence.len() as i64 != region.size() {
            return Err(Error::Invariant(format!(
                "reference window sequence length {} does not match region size {}",
                sequence.len(),
                region.size()
            )));
        }
        Ok(ReferenceWindow { region, sequence })
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Returns the bases of `sub`, which must be contained in this window.
    pub fn subseq(&self, sub: &Region) -> Result<ReferenceWindow> {
        if !self.region.contains_region(sub) {
            return Err(Error::Invariant(format!(
                "reference window {} does not cover requested sub-region {}",
                self.region, sub
            )));
        }
        let offset_start = (sub.start() - self.region.start()) as usize;
        let offset_end = (sub.end() - self.region.start()) as usize;
        ReferenceWindow::new(sub.clone(), self.sequence[offset_start..offset_end].to_vec())
    }

    /// Returns the sequence of `sub` padded by `pad` bases, using this
    /// window's bases wherever it covers them and `N` elsewhere.
    pub fn padded_subseq(&self, sub: &Region, pad: i64) -> Result<Vec<u8>> {
        let padded_region = sub.pad(pad)?;
        let mut out = vec![GAP_CHAR; padded_region.size() as usize];
        let overlap_start = padded_region.start().max(self.region.start());
        let overlap_end = padded_region.end().min(self.region.end());
        if overlap_start < overlap_end {
            let src_start = (overlap_start - self.region.start()) as usize;
            let src_end = (overlap_end - self.region.start()) as usize;
            let dst_start = (overlap_start - padded_region.start()) as usize;
            let dst_end = (overlap_end - padded_region.start()) as usize;
            out[dst_start..dst_end].copy_from_slice(&self.sequence[src_start..src_end]);
        }
        Ok(out)
    }
}

/// A single-window cache in front of a [`ReferenceSource`]: subsequent `get_sequence` calls contained by the
/// cached window are served from memory. Holds at most one window at a
/// time, keyed by the region it was fetched for.
pub struct ReferenceStore<S: ReferenceSource> {
    source: S,
    cache: Mutex<LruCache<Region, Arc<ReferenceWindow>>>,
}

impl<S: ReferenceSource> ReferenceStore<S> {
    pub fn new(source: S) -> Self {
        ReferenceStore {
            source,
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(1).unwrap())),
        }
    }

    pub fn contigs(&self) -> Result<HashMap<String, Interval>> {
        self.source.contigs()
    }

    pub fn contig_start(&self, name: &str) -> Result<i64> {
        Ok(self
            .contigs()?
            .get(name)
            .map(|i| i.start())
            .unwrap_or(0))
    }

    /// Primes the cache with `region`; a later `get_sequence` for a
    /// contained sub-region is served from this cached window.
    pub fn cache_sequence(&self, region: &Region) -> Result<()> {
        let window = self.fetch(region)?;
        self.cache.lock().unwrap().put(region.clone(), Arc::new(window));
        Ok(())
    }

    pub fn get_sequence(&self, region: &Region) -> Result<ReferenceWindow> {
        {
            let mut cache = self.cache.lock().unwrap();
            if let Some((cached_region, cached)) = cache.iter().next().map(|(r, w)| (r.clone(), w.clone())) {
                if cached_region.contains_region(region) {
                    let _ = cache.get(&cached_region);
                    return cached.subseq(region);
                }
            }
        }
        let window = self.fetch(region)?;
        self.cache.lock().unwrap().put(region.clone(), Arc::new(window.clone()));
        Ok(window)
    }

    fn fetch(&self, region: &Region) -> Result<ReferenceWindow> {
        let contigs = self.source.contigs()?;
        let bounds = contigs
            .get(region.contig())
            .cloned()
            .unwrap_or_else(|| Interval::new(0, 0));
        let clipped_start = region.start().max(bounds.start());
        let clipped_end = region.end().min(bounds.end().max(bounds.start()));
        let mut sequence = vec![GAP_CHAR; region.size() as usize];
        if clipped_start < clipped_end {
            let raw = self
                .source
                .read_bases(region.contig(), &Interval::new(clipped_start, clipped_end))?;
            let dst_start = (clipped_start - region.start()) as usize;
            let dst_end = (clipped_end - region.start()) as usize;
            for (dst, b) in sequence[dst_start..dst_end].iter_mut().zip(raw.iter()) {
                *dst = b.to_ascii_uppercase();
            }
        }
        ReferenceWindow::new(region.clone(), sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeSource {
        contigs: HashMap<String, Interval>,
        seqs: HashMap<String, Vec<u8>>,
    }

    impl ReferenceSource for FakeSource {
        fn contigs(&self) -> Result<HashMap<String, Interval>> {
            Ok(self.contigs.clone())
        }

        fn read_bases(&self, contig: &str, interval: &Interval) -> Result<Vec<u8>> {
            let seq = &self.seqs[contig];
            Ok(seq[interval.start() as usize..interval.end() as usize].to_vec())
        }
    }

    fn fake_store() -> ReferenceStore<FakeSource> {
        let mut contigs = HashMap::new();
        contigs.insert("chr1".to_string(), Interval::new(0, 10));
        let mut seqs = HashMap::new();
        seqs.insert("chr1".to_string(), b"AAAAAAAAAA".to_vec());
        ReferenceStore::new(FakeSource { contigs, seqs })
    }

    #[test]
    fn subseq_matches_direct_fetch() {
        let store = fake_store();
        let whole = Region::new("chr1", Interval::new(0, 10));
        let sub = Region::new("chr1", Interval::new(3, 6));
        let via_subseq = store.get_sequence(&whole).unwrap().subseq(&sub).unwrap();
        let direct = store.get_sequence(&sub).unwrap();
        assert_eq!(via_subseq.sequence(), direct.sequence());
    }

    #[test]
    fn out_of_contig_pads_with_n() {
        let store = fake_store();
        let region = Region::new("chr1", Interval::new(-2, 3));
        let window = store.get_sequence(&region).unwrap();
        assert_eq!(window.sequence(), b"NNAAA");
    }

    #[test]
    fn padded_subseq_uses_n_outside_window() {
        let store = fake_store();
        let window = store.get_sequence(&Region::new("chr1", Interval::new(2, 5))).unwrap();
        let padded = window
            .padded_subseq(&Region::new("chr1", Interval::new(2, 5)), 2)
            .unwrap();
        assert_eq!(padded, b"NNAAANN");
    }
}
