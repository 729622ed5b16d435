//! Read-level quality gates applied as reads stream in.

use crate::read::{Read, ReadFlags};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReadFilterConfig {
    pub min_mapping_quality: u8,
    pub filter_mate_unmapped: bool,
    pub filter_improper_pair: bool,
    /// When set, short-fragment reads (`|insert| <= |read|`) are dropped
    /// entirely rather than adapter-trimmed by `Read::trim_read_of_short_fragment`.
    pub drop_short_fragments: bool,
    /// When set, a read judged too similar to an already-kept read at the
    /// same start position is dropped (PCR-duplicate-like collapse beyond
    /// the `DUPLICATE` flag).
    pub filter_similar_reads: bool,
}

impl Default for ReadFilterConfig {
    fn default() -> Self {
        ReadFilterConfig {
            min_mapping_quality: 20,
            filter_mate_unmapped: false,
            filter_improper_pair: false,
            drop_short_fragments: false,
            filter_similar_reads: false,
        }
    }
}

/// Per-block filtering state; `filter_similar_reads` needs to remember
/// what has already been kept at each start position.
pub struct ReadFilterState {
    config: ReadFilterConfig,
    seen_at_start: std::collections::HashMap<i64, Vec<Vec<u8>>>,
}

impl ReadFilterState {
    pub fn new(config: ReadFilterConfig) -> Self {
        ReadFilterState {
            config,
            seen_at_start: std::collections::HashMap::new(),
        }
    }

    /// Returns `true` if `read` survives every configured gate.
    pub fn accept(&mut self, read: &Read) -> bool {
        if read.flags().contains(ReadFlags::UNMAPPED) {
            return false;
        }
        if read.flags().contains(ReadFlags::SECONDARY) {
            return false;
        }
        if read.flags().contains(ReadFlags::DUPLICATE) {
            return false;
        }
        if read.mapping_quality() < self.config.min_mapping_quality {
            return false;
        }
        if self.config.filter_mate_unmapped && read.flags().contains(ReadFlags::MATE_UNMAPPED) {
            return false;
        }
        if self.config.filter_improper_pair
            && read.flags().contains(ReadFlags::PAIRED)
            && !read.is_proper_pair()
        {
            return false;
        }
        if self.config.drop_short_fragments
            && read.is_proper_pair()
            && read.insert_size() != 0
            && read.insert_size().abs() <= read.len() as i64
        {
            return false;
        }
        if self.config.filter_similar_reads {
            let seq = read.sequence();
            let bucket = self.seen_at_start.entry(read.start()).or_default();
            if bucket.contains(&seq) {
                return false;
            }
            bucket.push(seq);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cigar::Cigar;
    use crate::interval::{Interval, Region};
    use crate::reference::ReferenceWindow;
    use std::sync::Arc;

    fn sample_read(flags: ReadFlags, mapq: u8) -> Read {
        let w = Arc::new(ReferenceWindow::new(Region::new("1", Interval::new(0, 10)), b"AAAAAAAAAA".to_vec()).unwrap());
        Read::new(
            0,
            "1".to_string(),
            0,
            b"AAAA".to_vec(),
            vec![30; 4],
            Cigar::parse("4M").unwrap(),
            flags,
            mapq,
            0,
            None,
            None,
            "sample0".to_string(),
            w,
        )
        .unwrap()
    }

    #[test]
    fn drops_unmapped_and_low_mapq() {
        let mut state = ReadFilterState::new(ReadFilterConfig::default());
        assert!(!state.accept(&sample_read(ReadFlags::UNMAPPED, 60)));
        assert!(!state.accept(&sample_read(ReadFlags::empty(), 5)));
        assert!(state.accept(&sample_read(ReadFlags::empty(), 60)));
    }
}
