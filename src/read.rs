//! Read model.
//!
//! Carries sequence, qualities, CIGAR, flags, mate info and a shared
//! back-reference to its aligned reference window. Immutable after
//! construction except for the quality array, which trimming and
//! recalibration mutate in turn, never concurrently.

use std::sync::{Arc, RwLock};

use crate::cigar::Cigar;
use crate::errors::Result;
use crate::interval::{Interval, Region};
use crate::reference::ReferenceWindow;
use crate::variants::candidates::{generate_variants_from_cigar, normalise};
use crate::variants::{Breakpoint, Variant};

/// SAM-style flag bitset, matching the constants `rust_htslib::bam::record`
/// exposes as plain `u16`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadFlags(u16);

impl ReadFlags {
    pub const PAIRED: ReadFlags = ReadFlags(0x0001);
    pub const PROPER_PAIR: ReadFlags = ReadFlags(0x0002);
    pub const UNMAPPED: ReadFlags = ReadFlags(0x0004);
    pub const MATE_UNMAPPED: ReadFlags = ReadFlags(0x0008);
    pub const REVERSE: ReadFlags = ReadFlags(0x0010);
    pub const MATE_REVERSE: ReadFlags = ReadFlags(0x0020);
    pub const READ1: ReadFlags = ReadFlags(0x0040);
    pub const READ2: ReadFlags = ReadFlags(0x0080);
    pub const SECONDARY: ReadFlags = ReadFlags(0x0100);
    pub const DUPLICATE: ReadFlags = ReadFlags(0x0400);

    pub fn empty() -> Self {
        ReadFlags(0)
    }

    pub fn from_bits(bits: u16) -> Self {
        ReadFlags(bits)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn contains(&self, other: ReadFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ReadFlags {
    type Output = ReadFlags;
    fn bitor(self, rhs: ReadFlags) -> ReadFlags {
        ReadFlags(self.0 | rhs.0)
    }
}

/// The minimum allowed quality score bases are floored to by trimming and
/// recalibration.
pub const MIN_ALLOWED_QUALITY: u8 = 2;

#[derive(Debug, Clone)]
pub struct Read {
    id: u64,
    contig: String,
    start: i64,
    sequence: Arc<Vec<u8>>,
    qualities: Arc<RwLock<Vec<u8>>>,
    cigar: Cigar,
    flags: ReadFlags,
    mapping_quality: u8,
    insert_size: i64,
    mate_contig: Option<String>,
    mate_start: Option<i64>,
    sample: String,
    ref_window: Arc<ReferenceWindow>,
    is_reference: bool,
}

impl Read {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        contig: String,
        start: i64,
        sequence: Vec<u8>,
        qualities: Vec<u8>,
        cigar: Cigar,
        flags: ReadFlags,
        mapping_quality: u8,
        insert_size: i64,
        mate_contig: Option<String>,
        mate_start: Option<i64>,
        sample: String,
        ref_window: Arc<ReferenceWindow>,
    ) -> Result<Self> {
        debug_assert_eq!(sequence.len(), qualities.len());
        debug_assert_eq!(sequence.len() as i64, cigar.length_in_seq());

        let aligned_end = start + cigar.length_in_ref();
        let is_reference = aligned_end - start == sequence.len() as i64
            && ref_window.region().contains_region(&Region::new(contig.clone(), Interval::new(start, aligned_end)))
            && ref_window
                .subseq(&Region::new(contig.clone(), Interval::new(start, aligned_end)))
                .map(|w| w.sequence().eq_ignore_ascii_case(&sequence))
                .unwrap_or(false);

        Ok(Read {
            id,
            contig,
            start,
            sequence: Arc::new(sequence),
            qualities: Arc::new(RwLock::new(qualities)),
            cigar,
            flags,
            mapping_quality,
            insert_size,
            mate_contig,
            mate_start,
            sample,
            ref_window,
            is_reference,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn contig(&self) -> &str {
        &self.contig
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn aligned_end(&self) -> i64 {
        self.start + self.cigar.length_in_ref()
    }

    pub fn cigar(&self) -> &Cigar {
        &self.cigar
    }

    pub fn sequence(&self) -> Vec<u8> {
        if self.is_reference {
            let region = Region::new(self.contig.clone(), Interval::new(self.start, self.aligned_end()));
            self.ref_window
                .subseq(&region)
                .map(|w| w.sequence().to_vec())
                .unwrap_or_else(|_| (*self.sequence).clone())
        } else {
            (*self.sequence).clone()
        }
    }

    pub fn qualities(&self) -> Vec<u8> {
        self.qualities.read().unwrap().clone()
    }

    pub fn set_qualities(&self, new_qualities: Vec<u8>) {
        *self.qualities.write().unwrap() = new_qualities;
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn flags(&self) -> ReadFlags {
        self.flags
    }

    pub fn is_reference(&self) -> bool {
        self.is_reference
    }

    pub fn mapping_quality(&self) -> u8 {
        self.mapping_quality
    }

    pub fn insert_size(&self) -> i64 {
        self.insert_size
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn reference_window(&self) -> &Arc<ReferenceWindow> {
        &self.ref_window
    }

    pub fn is_read1(&self) -> bool {
        self.flags.contains(ReadFlags::READ1)
    }

    pub fn is_proper_pair(&self) -> bool {
        self.flags.contains(ReadFlags::PROPER_PAIR)
    }

    pub fn is_reverse(&self) -> bool {
        self.flags.contains(ReadFlags::REVERSE)
    }

    pub fn mate_region(&self) -> Option<Region> {
        match (&self.mate_contig, self.mate_start) {
            (Some(contig), Some(start)) => Some(Region::new(contig.clone(), Interval::new(start, start))),
            _ => None,
        }
    }

    /// The read's reach in reference space, accounting for soft-clips that
    /// could still represent supporting bases for a nearby variant (used by
    /// the container's coverage computation).
    pub fn maximal_read_interval(&self) -> Result<Interval> {
        Ok(Interval::new(self.start, self.aligned_end()))
    }

    /// Trims the overlapping mate segment: when the read is not read1, is a proper pair,
    /// and insert size != 0, floors qualities on the overlapping portion
    /// with its mate.
    pub fn trim_overlap(&self) {
        if self.is_read1() || !self.is_proper_pair() || self.insert_size == 0 {
            return;
        }
        let overlap = 2 * self.len() as i64 - self.insert_size.abs();
        if overlap <= 0 {
            return;
        }
        let overlap = overlap.min(self.len() as i64) as usize;
        let mut quals = self.qualities();
        if self.is_reverse() {
            for q in quals.iter_mut().take(overlap) {
                *q = MIN_ALLOWED_QUALITY;
            }
        } else {
            let n = quals.len();
            for q in quals.iter_mut().skip(n - overlap) {
                *q = MIN_ALLOWED_QUALITY;
            }
        }
        self.set_qualities(quals);
    }

    /// Trims past a short fragment: if proper pair and `|insert| <=
    /// |read|`, zeroes qualities beyond the insert.
    pub fn trim_read_of_short_fragment(&self) {
        if !self.is_proper_pair() {
            return;
        }
        let insert = self.insert_size.abs();
        if insert > self.len() as i64 {
            return;
        }
        let beyond = (self.len() as i64 - insert).max(0) as usize;
        if beyond == 0 {
            return;
        }
        let mut quals = self.qualities();
        if self.is_reverse() {
            for q in quals.iter_mut().take(beyond) {
                *q = 0;
            }
        } else {
            let n = quals.len();
            for q in quals.iter_mut().skip(n - beyond) {
                *q = 0;
            }
        }
        self.set_qualities(quals);
    }

    /// Non-reference reads only; walks the CIGAR driving per-op emission
    /// then normalises the result.
    pub fn get_variants(&self) -> Result<Vec<Variant>> {
        if self.is_reference {
            return Ok(Vec::new());
        }
        let raw = generate_variants_from_cigar(&self.cigar, self.start, &self.ref_window, &self.sequence())?;
        normalise(raw, &self.ref_window)
    }

    /// At most two loci, one per soft/hard-clip terminal op; none if the
    /// CIGAR has fewer than two ops.
    pub fn get_breakpoints(&self) -> Vec<Breakpoint> {
        let ops = self.cigar.ops();
        if ops.len() < 2 {
            return Vec::new();
        }
        let mut breakpoints = Vec::new();
        if let Some(first) = ops.first() {
            if first.is_soft_clip() || first.is_hard_clip() {
                breakpoints.push(Breakpoint {
                    contig: self.contig.clone(),
                    position: self.start,
                    is_start: true,
                    clip_sequence: clip_seq(&self.sequence(), 0, first.len() as usize),
                });
            }
        }
        if let Some(last) = ops.last() {
            if last.is_soft_clip() || last.is_hard_clip() {
                let seq = self.sequence();
                let n = seq.len();
                breakpoints.push(Breakpoint {
                    contig: self.contig.clone(),
                    position: self.aligned_end(),
                    is_start: false,
                    clip_sequence: clip_seq(&seq, n.saturating_sub(last.len() as usize), n),
                });
            }
        }
        breakpoints
    }

    /// Clamps `ref_interval` to the aligned-length
    /// window, then applies `Cigar::get_inverse_interval`.
    pub fn interval_in_read(&self, ref_interval: &Interval) -> Result<Interval> {
        let aligned = Interval::new(self.start, self.aligned_end());
        let clamped = ref_interval.intersect(&aligned).unwrap_or_else(|_| {
            if ref_interval.end() <= aligned.start() {
                Interval::new(aligned.start(), aligned.start())
            } else {
                Interval::new(aligned.end(), aligned.end())
            }
        });
        Ok(self.cigar.get_inverse_interval(self.start, &clamped))
    }
}

fn clip_seq(seq: &[u8], start: usize, end: usize) -> Vec<u8> {
    seq.get(start..end).map(|s| s.to_vec()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(contig: &str, start: i64, seq: &[u8]) -> Arc<ReferenceWindow> {
        Arc::new(ReferenceWindow::new(Region::new(contig, Interval::new(start, start + seq.len() as i64)), seq.to_vec()).unwrap())
    }

    fn read(seq: &[u8], quals: &[u8], cigar: &str, start: i64, ref_seq: &[u8], flags: ReadFlags, insert: i64) -> Read {
        let w = window("1", 0, ref_seq);
        Read::new(
            1,
            "1".to_string(),
            start,
            seq.to_vec(),
            quals.to_vec(),
            Cigar::parse(cigar).unwrap(),
            flags,
            60,
            insert,
            None,
            None,
            "sample0".to_string(),
            w,
        )
        .unwrap()
    }

    #[test]
    fn reference_read_sequence_recovered_from_window() {
        let r = read(b"AAAA", &[30; 4], "4M", 0, b"AAAAAAAAAA", ReadFlags::empty(), 0);
        assert!(r.is_reference());
        assert_eq!(r.sequence(), b"AAAA");
    }

    #[test]
    fn get_variants_from_read_scenario() {
        let r = read(b"TACG", &[30; 4], "4M", 1, b"AAAAA", ReadFlags::empty(), 0);
        let variants = r.get_variants().unwrap();
        assert_eq!(variants.len(), 3);
    }

    #[test]
    fn trim_overlap_floors_front_on_reverse_proper_pair() {
        let r = read(b"TACGA", &[30; 5], "5M", 0, b"TACGAAAAAA", ReadFlags::PAIRED | ReadFlags::PROPER_PAIR | ReadFlags::REVERSE, 3);
        r.trim_overlap();
        let q = r.qualities();
        assert_eq!(q[0], MIN_ALLOWED_QUALITY);
    }

    #[test]
    fn breakpoints_require_at_least_two_ops() {
        let r = read(b"AAAA", &[30; 4], "4M", 0, b"AAAAAAAAAA", ReadFlags::empty(), 0);
        assert!(r.get_breakpoints().is_empty());
    }

    #[test]
    fn breakpoints_emitted_for_soft_clips() {
        let r = read(b"TTAAAA", &[30; 6], "2S4M", 0, b"AAAAAAAAAA", ReadFlags::empty(), 0);
        let bps = r.get_breakpoints();
        assert_eq!(bps.len(), 1);
        assert!(bps[0].is_start);
    }
}
