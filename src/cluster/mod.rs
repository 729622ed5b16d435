//! Variant clustering into haplotype neighborhoods.

pub mod combinations;

use std::collections::HashMap;

use crate::cluster::combinations::compute_variant_combinations;
use crate::errors::Result;
use crate::interval::{Interval, Region, SetRegions};
use crate::read::Read;
use crate::variants::Variant;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClusterConfig {
    pub min_cluster_distance: i64,
    pub max_cluster_distance: i64,
    pub max_cluster_size: i64,
    pub max_dist_between_clusters: i64,
    pub max_variant_combinations: usize,
    pub min_reads_to_support_claim: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            min_cluster_distance: 1,
            max_cluster_distance: 100,
            max_cluster_size: 1000,
            max_dist_between_clusters: 20,
            max_variant_combinations: 256,
            min_reads_to_support_claim: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariantCluster {
    variants: Vec<Variant>,
    variant_regions: SetRegions,
    padded_region: Region,
    zero_indexed_vcf_start: i64,
    combinations: Vec<Vec<Variant>>,
    all_combinations_computed: bool,
}

impl VariantCluster {
    fn new(variants: Vec<Variant>) -> Self {
        let mut variant_regions = SetRegions::new();
        for v in &variants {
            variant_regions.insert(v.region().clone());
        }
        let span = variant_regions.span().expect("cluster is never built empty");
        let zero_indexed_vcf_start = variants.first().map(|v| v.vcf_position()).unwrap_or(span.start());
        VariantCluster {
            variants,
            variant_regions,
            padded_region: span.clone(),
            zero_indexed_vcf_start,
            combinations: Vec::new(),
            all_combinations_computed: false,
        }
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn variant_regions(&self) -> &SetRegions {
        &self.variant_regions
    }

    pub fn region(&self) -> Result<Region> {
        self.variant_regions.span()
    }

    pub fn padded_region(&self) -> &Region {
        &self.padded_region
    }

    pub fn set_padded_region(&mut self, region: Region) {
        self.padded_region = region;
    }

    pub fn zero_indexed_vcf_start(&self) -> i64 {
        self.zero_indexed_vcf_start
    }

    pub fn combinations(&self) -> &[Vec<Variant>] {
        &self.combinations
    }

    pub fn all_combinations_computed(&self) -> bool {
        self.all_combinations_computed
    }

    pub fn n_variant_combinations(&self) -> usize {
        self.combinations.len()
    }

    pub fn compute_variant_combinations(&mut self, reads_by_id: &HashMap<u64, Read>, config: &ClusterConfig) {
        let (combinations, computed) = compute_variant_combinations(
            &self.variants,
            reads_by_id,
            config.max_variant_combinations,
            config.max_cluster_distance,
            config.min_reads_to_support_claim,
        );
        self.combinations = combinations;
        self.all_combinations_computed = computed;
        if !computed {
            // budget exceeded: fall back to reference + one singleton
            // per variant.
            let mut fallback: Vec<Vec<Variant>> = self.variants.iter().map(|v| vec![v.clone()]).collect();
            fallback.push(Vec::new());
            self.combinations = fallback;
        }
    }

    /// Partitions this cluster into a "main" cluster of large variants
    /// (ref-length >= `2*cluster_distance`) plus small variants touching
    /// them, and a list of small-variant sub-clusters not touching any
    /// large variant.
    pub fn build_sub_clusters(&self, cluster_distance: i64) -> (VariantCluster, Vec<VariantCluster>) {
        let is_large = |v: &Variant| (v.end() - v.start()).max(v.alt().len() as i64) >= 2 * cluster_distance;

        let large: Vec<Variant> = self.variants.iter().filter(|v| is_large(v)).cloned().collect();
        if large.is_empty() {
            return (self.clone(), Vec::new());
        }

        let mut large_regions = SetRegions::new();
        for v in &large {
            if let Ok(padded) = v.region().pad(cluster_distance + 1) {
                large_regions.insert(padded);
            }
        }

        let mut main_variants = Vec::new();
        let mut remainder = Vec::new();
        for v in &self.variants {
            let touches_large = is_large(v) || large_regions.iter().any(|r| r.overlaps_or_touches(v.region()));
            if touches_large {
                main_variants.push(v.clone());
            } else {
                remainder.push(v.clone());
            }
        }

        let sub_clusters = group_into_clusters(remainder, cluster_distance);
        (VariantCluster::new(main_variants), sub_clusters)
    }
}

fn group_into_clusters(mut variants: Vec<Variant>, min_distance: i64) -> Vec<VariantCluster> {
    variants.sort();
    let mut clusters = Vec::new();
    let mut current: Vec<Variant> = Vec::new();

    for v in variants {
        if let Some(last) = current.last() {
            let gap = v.start() - last.end();
            if gap > min_distance {
                clusters.push(VariantCluster::new(std::mem::take(&mut current)));
            }
        }
        current.push(v);
    }
    if !current.is_empty() {
        clusters.push(VariantCluster::new(current));
    }
    clusters
}

/// Scans a sorted variant set, grouping variants within `min_distance` of
/// the current cluster's end into the same cluster.
pub fn generate_variant_clusters(variants: &[Variant], min_distance: i64, block_region: &Region) -> Vec<VariantCluster> {
    let mut clusters = group_into_clusters(variants.to_vec(), min_distance);
    let padding = compute_clusters_padding_regions(block_region, &clusters);
    for (cluster, region) in clusters.iter_mut().zip(padding.into_iter()) {
        cluster.set_padded_region(region);
    }
    clusters
}

/// Computes per-cluster padded regions bounded by their neighbours and by
/// the block region at the ends.
pub fn compute_clusters_padding_regions(block_region: &Region, clusters: &[VariantCluster]) -> Vec<Region> {
    let mut out = Vec::with_capacity(clusters.len());
    for (i, cluster) in clusters.iter().enumerate() {
        let span = cluster.region().unwrap_or_else(|_| block_region.clone());
        let left_bound = if i == 0 {
            block_region.start()
        } else {
            clusters[i - 1].region().map(|r| r.end()).unwrap_or(block_region.start())
        };
        let right_bound = if i + 1 < clusters.len() {
            clusters[i + 1].region().map(|r| r.start()).unwrap_or(block_region.end())
        } else {
            block_region.end()
        };
        out.push(Region::new(
            span.contig().to_string(),
            Interval::new(left_bound.min(span.start()).max(block_region.start()), right_bound.max(span.end()).min(block_region.end())),
        ));
    }
    out
}

/// Merges neighbouring clusters when their combined combination count
/// stays within budget, the gap and span stay within limits, and both had
/// fully computed combinations. Repeats at increasing distance
/// thresholds.
pub fn merge_clusters(
    clusters: Vec<VariantCluster>,
    reads_by_id: &HashMap<u64, Read>,
    config: &ClusterConfig,
) -> Vec<VariantCluster> {
    let mut current = clusters;
    for threshold in 1..=config.max_dist_between_clusters {
        current = merge_pass(current, reads_by_id, config, threshold);
    }
    current
}

fn merge_pass(clusters: Vec<VariantCluster>, reads_by_id: &HashMap<u64, Read>, config: &ClusterConfig, distance_threshold: i64) -> Vec<VariantCluster> {
    if clusters.len() < 2 {
        return clusters;
    }
    let mut merged = Vec::with_capacity(clusters.len());
    let mut iter = clusters.into_iter().peekable();

    while let Some(mut cluster) = iter.next() {
        while let Some(next) = iter.peek() {
            let can_merge = {
                let a_region = cluster.region();
                let b_region = next.region();
                match (a_region, b_region) {
                    (Ok(a), Ok(b)) if a.same_contig(&b) => {
                        let gap = b.start() - a.end();
                        let span = b.end() - a.start();
                        let combo_product = cluster.n_variant_combinations().max(1) * next.n_variant_combinations().max(1);
                        gap >= 0
                            && gap <= distance_threshold
                            && span <= config.max_cluster_size
                            && combo_product <= config.max_variant_combinations
                            && cluster.all_combinations_computed()
                            && next.all_combinations_computed()
                    }
                    _ => false,
                }
            };

            if can_merge {
                let next = iter.next().unwrap();
                let mut variants = cluster.variants.clone();
                variants.extend(next.variants.clone());
                variants.sort();
                cluster = VariantCluster::new(variants);
                cluster.compute_variant_combinations(reads_by_id, config);
            } else {
                break;
            }
        }
        merged.push(cluster);
    }
    merged
}
