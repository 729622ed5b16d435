//! Region input parsing: BED files or region strings, not both at once.

use std::collections::HashMap;

use crate::errors::{Error, Result};
use crate::interval::{Interval, Region};

/// Parses a three-column BED file (contig, start, end; 0-based half-open)
/// into regions. Any other column is ignored.
pub fn parse_bed(text: &str) -> Result<Vec<Region>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut regions = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::InvalidFormat(format!("malformed BED line: {}", e)))?;
        if record.len() < 3 {
            return Err(Error::InvalidFormat(format!(
                "malformed BED line: expected at least 3 columns, got {}",
                record.len()
            )));
        }
        let contig = record.get(0).unwrap();
        let start: i64 = record
            .get(1)
            .unwrap()
            .parse()
            .map_err(|_| Error::InvalidFormat(format!("malformed BED line: non-numeric start in {:?}", record)))?;
        let end: i64 = record
            .get(2)
            .unwrap()
            .parse()
            .map_err(|_| Error::InvalidFormat(format!("malformed BED line: non-numeric end in {:?}", record)))?;
        if start > end {
            return Err(Error::RegionEmpty(format!("{}:{}-{}", contig, start, end)));
        }
        regions.push(Region::new(contig, Interval::new(start, end)));
    }
    Ok(regions)
}

/// Parses a list of `contig`/`contig:start-end` region strings.
pub fn parse_region_strings(strings: &[String]) -> Result<Vec<Region>> {
    strings.iter().map(|s| Region::from_str(s)).collect()
}

/// One region input source: a BED file's contents, or a list of region
/// strings, never both.
pub enum RegionInput {
    Bed(String),
    Strings(Vec<String>),
}

/// Maximum number of distinct regions accepted from a single invocation.
pub const MAX_REGIONS: usize = 100_000;

impl RegionInput {
    /// Builds a [`RegionInput`] from the raw CLI-level arguments, rejecting
    /// the combination of a BED file and region strings given together.
    pub fn from_args(bed: Option<String>, region_strings: Vec<String>) -> Result<RegionInput> {
        match (bed, region_strings.is_empty()) {
            (Some(bed), true) => Ok(RegionInput::Bed(bed)),
            (None, false) => Ok(RegionInput::Strings(region_strings)),
            (None, true) => Ok(RegionInput::Strings(Vec::new())),
            (Some(_), false) => Err(Error::InvalidArgument(
                "BED files and region strings cannot be mixed in one invocation".to_string(),
            )),
        }
    }
}

/// Resolves a [`RegionInput`] into concrete regions, dropping any whose
/// contig is absent from `known_contigs` with a logged warning.
pub fn resolve_regions(input: &RegionInput, known_contigs: &HashMap<String, Interval>) -> Result<Vec<Region>> {
    let regions = match input {
        RegionInput::Bed(text) => parse_bed(text)?,
        RegionInput::Strings(strings) => parse_region_strings(strings)?,
    };
    if regions.len() > MAX_REGIONS {
        return Err(Error::InvalidArgument(format!(
            "too many regions: {} exceeds the limit of {}",
            regions.len(),
            MAX_REGIONS
        )));
    }
    let mut kept = Vec::with_capacity(regions.len());
    for region in regions {
        if known_contigs.contains_key(region.contig()) {
            kept.push(region);
        } else {
            log::warn!("dropping region {}: contig absent from reference index", region);
        }
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bed_lines() {
        let bed = "1\t10\t20\nchr2\t0\t5\n";
        let regions = parse_bed(bed).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0], Region::new("1", Interval::new(10, 20)));
        assert_eq!(regions[1], Region::new("chr2", Interval::new(0, 5)));
    }

    #[test]
    fn bed_with_reversed_range_is_region_empty() {
        let bed = "1\t20\t10\n";
        assert!(matches!(parse_bed(bed), Err(Error::RegionEmpty(_))));
    }

    #[test]
    fn parses_mixed_region_strings() {
        let strings = vec!["1".to_string(), "chr2:5-10".to_string()];
        let regions = parse_region_strings(&strings).unwrap();
        assert_eq!(regions[0], Region::whole_contig("1"));
        assert_eq!(regions[1], Region::new("chr2", Interval::new(5, 10)));
    }

    #[test]
    fn drops_regions_on_unknown_contigs() {
        let mut known = HashMap::new();
        known.insert("1".to_string(), Interval::new(0, 100));
        let input = RegionInput::Strings(vec!["1:0-10".to_string(), "2:0-10".to_string()]);
        let resolved = resolve_regions(&input, &known).unwrap();
        assert_eq!(resolved, vec![Region::new("1", Interval::new(0, 10))]);
    }

    #[test]
    fn mixing_bed_and_region_strings_is_invalid_argument() {
        let result = RegionInput::from_args(Some("1\t0\t10\n".to_string()), vec!["2:0-10".to_string()]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn from_args_picks_bed_when_only_bed_given() {
        let input = RegionInput::from_args(Some("1\t0\t10\n".to_string()), Vec::new()).unwrap();
        assert!(matches!(input, RegionInput::Bed(_)));
    }
}
