//! Per-site kmer histograms and prior finalisation.

use std::collections::HashMap;

use ordered_float::OrderedFloat;

use crate::recalibration::RecalibrationConfig;

#[derive(Debug, Clone, Default)]
pub struct ErrorCountData {
    pub opportunity: f64,
    pub count: f64,
}

impl ErrorCountData {
    pub fn p_error(&self) -> f64 {
        if self.opportunity <= 0.0 {
            0.0
        } else {
            self.count / self.opportunity
        }
    }
}

/// Histogram and finalised priors for one reference site.
#[derive(Debug, Clone)]
pub struct SiteKmerDistribution {
    /// The padded reference kmer (`K + 2*PAD` bases) centred on this site.
    pub padded_ref_kmer: Vec<u8>,
    counts: HashMap<Vec<u8>, u32>,
    /// Finalised `(kmer, prior)` pairs surviving the minimum-prior prune.
    pub priors: Vec<(Vec<u8>, f64)>,
    pub error_forward: ErrorCountData,
    pub error_backward: ErrorCountData,
}

impl SiteKmerDistribution {
    pub fn new(padded_ref_kmer: Vec<u8>) -> Self {
        SiteKmerDistribution {
            padded_ref_kmer,
            counts: HashMap::new(),
            priors: Vec::new(),
            error_forward: ErrorCountData::default(),
            error_backward: ErrorCountData::default(),
        }
    }

    /// The reference kmer proper (the middle `K` bases of the padded kmer).
    pub fn ref_kmer(&self, pad: usize, k: usize) -> Vec<u8> {
        self.padded_ref_kmer[pad..pad + k].to_vec()
    }

    pub fn observe(&mut self, kmer: &[u8]) {
        *self.counts.entry(kmer.to_vec()).or_insert(0) += 1;
    }

    /// Finalises priors: weight each observed kmer (plus
    /// the reference kmer, always present) by `max(0, count + priorCount) *
    /// count`, normalise, then fold in a `pref`-weighted reference mass.
    /// Keeps only entries with prior above the minimum.
    pub fn finalize_priors(&mut self, pad: usize, k: usize, config: &RecalibrationConfig) {
        let ref_kmer = self.ref_kmer(pad, k);
        let mut weights: HashMap<Vec<u8>, f64> = HashMap::new();
        if !self.counts.contains_key(&ref_kmer) {
            weights.insert(ref_kmer.clone(), 0.0);
        }
        for (kmer, &count) in &self.counts {
            let prior_count = if *kmer == ref_kmer {
                1.0
            } else {
                let mismatches = hamming(kmer, &ref_kmer) as f64;
                (-mismatches).max(-2.0)
            };
            let w = (count as f64 + prior_count).max(0.0) * count as f64;
            weights.insert(kmer.clone(), w);
        }

        let total: f64 = weights.values().sum();
        let mut normalised: HashMap<Vec<u8>, f64> = if total > 0.0 {
            weights.iter().map(|(k, v)| (k.clone(), v / total)).collect()
        } else {
            weights.iter().map(|(k, _)| (k.clone(), 0.0)).collect()
        };

        let ref_prior = if total > 0.0 {
            total / (1.0 - config.pref)
        } else {
            1.0
        };
        *normalised.entry(ref_kmer.clone()).or_insert(0.0) += ref_prior * config.pref;

        let sum: f64 = normalised.values().sum();
        let mut priors: Vec<(Vec<u8>, f64)> = normalised
            .into_iter()
            .map(|(k, v)| (k, if sum > 0.0 { v / sum } else { v }))
            .filter(|(_, p)| *p > config.min_kmer_prior)
            .collect();
        priors.sort_by_key(|(_, p)| std::cmp::Reverse(OrderedFloat(*p)));
        self.priors = priors;
    }

    pub fn reset_error_counts(&mut self, config: &RecalibrationConfig) {
        self.error_forward = ErrorCountData {
            opportunity: 1.0,
            count: config.perr,
        };
        self.error_backward = ErrorCountData {
            opportunity: 1.0,
            count: config.perr,
        };
    }
}

fn hamming(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).filter(|(x, y)| !x.eq_ignore_ascii_case(y)).count()
}

/// Per-ref-position site distributions for one sample's reads in a block.
#[derive(Default)]
pub struct KmerDistribution {
    sites: HashMap<i64, SiteKmerDistribution>,
}

impl KmerDistribution {
    pub fn new() -> Self {
        KmerDistribution::default()
    }

    pub fn site(&self, ref_pos: i64) -> Option<&SiteKmerDistribution> {
        self.sites.get(&ref_pos)
    }

    pub fn site_mut(&mut self, ref_pos: i64) -> Option<&mut SiteKmerDistribution> {
        self.sites.get_mut(&ref_pos)
    }

    pub fn ensure_site(&mut self, ref_pos: i64, padded_ref_kmer: Vec<u8>) -> &mut SiteKmerDistribution {
        self.sites
            .entry(ref_pos)
            .or_insert_with(|| SiteKmerDistribution::new(padded_ref_kmer))
    }

    pub fn positions(&self) -> impl Iterator<Item = i64> + '_ {
        self.sites.keys().copied()
    }

    pub fn finalize_all(&mut self, pad: usize, k: usize, config: &RecalibrationConfig) {
        for site in self.sites.values_mut() {
            site.finalize_priors(pad, k, config);
        }
    }

    pub fn reset_all_error_counts(&mut self, config: &RecalibrationConfig) {
        for site in self.sites.values_mut() {
            site.reset_error_counts(config);
        }
    }
}
