//! Variant filter: minimum supporting-read count and per-sample
//! percent-support thresholds.

use crate::variants::container::VariantContainer;
use crate::variants::Variant;

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct VariantFilterConfig {
    pub min_reads: usize,
    pub min_per_sample_percentage: u32,
}

impl Default for VariantFilterConfig {
    fn default() -> Self {
        VariantFilterConfig {
            min_reads: 2,
            min_per_sample_percentage: 10,
        }
    }
}

/// `true` if `v.never_filter()` is set, else requires both thresholds to
/// hold.
pub fn variant_passes_filters(v: &Variant, container: &VariantContainer, config: &VariantFilterConfig) -> bool {
    if v.never_filter() {
        return true;
    }
    container.total_reads_supporting_variant(v) >= config.min_reads
        && container.max_read_percent_variant_coverage(v) >= config.min_per_sample_percentage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::{Interval, Region};
    use crate::reference::ReferenceWindow;

    #[test]
    fn never_filter_variant_always_passes() {
        let w = ReferenceWindow::new(Region::new("1", Interval::new(0, 10)), b"AAAAAAAAAA".to_vec()).unwrap();
        let mut v = Variant::new(&w, Region::new("1", Interval::new(2, 3)), b"T".to_vec()).unwrap();
        v.set_never_filter(true);
        let container = VariantContainer::new(20, 20);
        assert!(variant_passes_filters(&v, &container, &VariantFilterConfig::default()));
    }
}
