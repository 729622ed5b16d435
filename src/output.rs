//! Output adapter contract. Serialisation itself is out of
//! scope; this module only fixes the call-record shape the downstream
//! genotyper/writer consumes.

use std::collections::HashMap;
use std::io::Write;

use crate::read::Read;

/// A single emitted call: contig, 1-based position, ref/alt, quality,
/// filter set, info map and per-sample format map. Genotype assignment and
/// VCF serialisation happen downstream, beyond this crate's scope.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub contig: String,
    pub position_one_based: i64,
    pub reference: Vec<u8>,
    pub alt: Vec<u8>,
    pub quality: f64,
    pub filters: Vec<String>,
    pub info: HashMap<String, String>,
    pub sample_format: HashMap<String, HashMap<String, String>>,
}

/// Receives a stream of already-ordered [`CallRecord`]s. Implementors
/// (out of scope here) handle serialisation to a concrete tabular format.
pub trait OutputAdapter {
    fn emit(&mut self, call: CallRecord) -> crate::errors::Result<()>;

    /// Flushes any buffered state; called once the block's calls have all
    /// been passed to `emit`.
    fn finish(&mut self) -> crate::errors::Result<()> {
        Ok(())
    }
}

/// Writes a per-sample textual alignment dump of `reads` (after
/// recalibration) for debugging, keyed by the output file stem plus
/// sample name elsewhere by the caller; this only serialises one sample's
/// reads to `sink`.
pub fn dump_recalibrated_reads(sink: &mut dyn Write, sample: &str, reads: &[Read]) -> crate::errors::Result<()> {
    for read in reads {
        writeln!(
            sink,
            "{}\t{}\t{}\t{}\t{}",
            sample,
            read.contig(),
            read.start(),
            String::from_utf8_lossy(&read.sequence()),
            read.qualities().iter().map(|q| (q + 33) as char).collect::<String>()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cigar::Cigar;
    use crate::interval::{Interval, Region};
    use crate::read::ReadFlags;
    use crate::reference::ReferenceWindow;
    use std::sync::Arc;

    #[test]
    fn dump_writes_one_line_per_read() {
        let w = Arc::new(ReferenceWindow::new(Region::new("1", Interval::new(0, 4)), b"AAAA".to_vec()).unwrap());
        let read = Read::new(
            0,
            "1".to_string(),
            0,
            b"AAAA".to_vec(),
            vec![30; 4],
            Cigar::parse("4M").unwrap(),
            ReadFlags::empty(),
            60,
            0,
            None,
            None,
            "sample0".to_string(),
            w,
        )
        .unwrap();
        let mut buf = Vec::new();
        dump_recalibrated_reads(&mut buf, "sample0", &[read]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("sample0\t1\t0\tAAAA\t"));
    }
}
