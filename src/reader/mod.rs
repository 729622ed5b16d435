//! Block/bite iteration over one or more backing alignment stores.

pub mod filter;

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;

use crate::errors::{Error, Result};
use crate::interval::{Interval, Region};
use crate::read::Read;
use crate::reader::filter::{ReadFilterConfig, ReadFilterState};
use crate::reference::{ReferenceSource, ReferenceStore};

/// A single decoded alignment record: contig id, start, flags, mapping
/// quality, CIGAR, sequence, qualities, mate info and an optional
/// read-group tag.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub contig: String,
    pub start: i64,
    pub flags: u16,
    pub mapping_quality: u8,
    pub cigar: crate::cigar::Cigar,
    pub sequence: Vec<u8>,
    pub qualities: Vec<u8>,
    pub mate_contig: Option<String>,
    pub mate_start: Option<i64>,
    pub insert_size: i64,
    pub read_group: Option<String>,
}

/// One backing alignment store's positional iterator. Out of scope: byte-level
/// decoding — implementors wrap an already-opened index (e.g.
/// `rust_htslib::bam::IndexedReader`).
pub trait AlignmentSource {
    fn fetch(&self, region: &Region) -> Result<Box<dyn Iterator<Item = Result<DecodedRecord>> + '_>>;

    /// Maps a read-group `ID` to a sample name; reads
    /// without a read group fall back to `default_sample`.
    fn sample_for_read_group(&self, rg: Option<&str>, default_sample: &str) -> String {
        rg.unwrap_or(default_sample).to_string()
    }

    fn default_sample_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct BlockConfig {
    /// Maximum bases advanced per bite.
    pub bite_size: i64,
    /// Rough per-read byte cost used for the memory ceiling (`2*readLen +
    /// overhead`).
    pub per_read_overhead_bytes: usize,
    pub memory_ceiling_bytes: usize,
}

impl Default for BlockConfig {
    fn default() -> Self {
        BlockConfig {
            bite_size: 1_000,
            per_read_overhead_bytes: 128,
            memory_ceiling_bytes: 256 * 1024 * 1024,
        }
    }
}

pub struct SampleReads {
    pub reads: HashMap<String, Vec<Read>>,
}

/// Streams reads from every backing store over `region` in `bite_size`-base
/// bites, applying the read filter/trimmer and grouping survivors by
/// sample.
pub struct BlockReader<'a, S: ReferenceSource> {
    reference: &'a ReferenceStore<S>,
    config: BlockConfig,
    filter_config: ReadFilterConfig,
}

impl<'a, S: ReferenceSource> BlockReader<'a, S> {
    pub fn new(reference: &'a ReferenceStore<S>, config: BlockConfig, filter_config: ReadFilterConfig) -> Self {
        BlockReader {
            reference,
            config,
            filter_config,
        }
    }

    /// Reads one block over `region`, padded by `pad` for reference-window
    /// purposes. Returns the per-sample reads surviving filtering.
    pub fn read_block(
        &self,
        sources: &[(String, &dyn AlignmentSource)],
        region: &Region,
        pad: i64,
    ) -> Result<SampleReads> {
        if region.size() == 0 && !region.is_no_range() {
            return Ok(SampleReads { reads: HashMap::new() });
        }

        let padded_region = region.pad(pad)?;
        let ref_window = Arc::new(self.reference.get_sequence(&padded_region)?);

        let mut by_sample: HashMap<String, Vec<Read>> = HashMap::new();
        let mut cursor = region.start();
        let mut any_bite_completed = false;
        let mut next_id: u64 = 0;
        let mut filter_state = ReadFilterState::new(self.filter_config.clone());

        while cursor < region.end() {
            let bite_end = (cursor + self.config.bite_size).min(region.end());
            let bite_region = Region::new(region.contig().to_string(), Interval::new(cursor, bite_end));

            let mut bite_reads: HashMap<String, Vec<Read>> = HashMap::new();
            let mut bite_bytes = 0usize;
            let mut overflowed = false;

            'sources: for (sample_name, source) in sources {
                let iter = source.fetch(&bite_region)?;
                for decoded in iter {
                    let decoded = decoded?;
                    if decoded.start > bite_region.end() {
                        continue;
                    }
                    bite_bytes += 2 * decoded.sequence.len() + self.config.per_read_overhead_bytes;
                    if bite_bytes > self.config.memory_ceiling_bytes {
                        overflowed = true;
                        break 'sources;
                    }

                    let sample = source.sample_for_read_group(decoded.read_group.as_deref(), sample_name);
                    let read = decode_to_read(next_id, &decoded, ref_window.clone(), sample.clone())?;
                    next_id += 1;
                    if filter_state.accept(&read) {
                        bite_reads.entry(sample).or_default().push(read);
                    }
                }
            }

            if overflowed {
                warn!(
                    "block {} discarded bite at {}-{}: memory ceiling exceeded",
                    region, cursor, bite_end
                );
            } else {
                for (sample, reads) in bite_reads {
                    by_sample.entry(sample).or_default().extend(reads);
                }
                any_bite_completed = true;
            }

            cursor = bite_end;
        }

        if !any_bite_completed {
            warn!("no bite completed in block {}; skipping {} bases", region, self.config.bite_size);
        }

        for reads in by_sample.values_mut() {
            for read in reads.iter() {
                read.trim_overlap();
                read.trim_read_of_short_fragment();
            }
        }

        Ok(SampleReads { reads: by_sample })
    }

    /// Trims the current block to end at `pos`, without losing
    /// already-accumulated reads.
    pub fn chop_current_block(region: &Region, pos: i64) -> Result<Region> {
        if pos < region.start() {
            return Err(Error::Invariant(format!(
                "cannot chop block {} at {}: before block start",
                region, pos
            )));
        }
        Ok(Region::new(region.contig().to_string(), Interval::new(region.start(), pos.min(region.end()))))
    }
}

fn decode_to_read(
    id: u64,
    decoded: &DecodedRecord,
    ref_window: Arc<crate::reference::ReferenceWindow>,
    sample: String,
) -> Result<Read> {
    use crate::read::ReadFlags;

    let flags = ReadFlags::from_bits(decoded.flags);
    Read::new(
        id,
        decoded.contig.clone(),
        decoded.start,
        decoded.sequence.clone(),
        decoded.qualities.clone(),
        decoded.cigar.clone(),
        flags,
        decoded.mapping_quality,
        decoded.insert_size,
        decoded.mate_contig.clone(),
        decoded.mate_start,
        sample,
        ref_window,
    )
}
