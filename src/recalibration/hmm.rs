//! Per-site emission probabilities and the two-state forward–backward HMM.

use bio::stats::{PHREDProb, Prob};
use ndarray::Array1;

use crate::recalibration::kmer::SiteKmerDistribution;
use crate::recalibration::RecalibrationConfig;

/// One read's anchor data at a reference site.
#[derive(Debug, Clone)]
pub struct SiteReadData {
    pub read_kmer: Vec<u8>,
    pub quality_kmer: Vec<u8>,
    pub index_into_read: usize,
    pub ref_pos: i64,
}

fn phred_to_p(q: u8) -> f64 {
    let p: f64 = Prob::from(PHREDProb::from(q as f64)).into();
    p.min(0.75)
}

fn prob_mismatch_true(kmer: &[u8], read_kmer: &[u8], quality_kmer: &[u8]) -> f64 {
    let mut p = 1.0;
    for i in 0..kmer.len() {
        let q = phred_to_p(quality_kmer[i]);
        p *= if kmer[i].eq_ignore_ascii_case(&read_kmer[i]) {
            1.0 - q
        } else {
            q / 3.0
        };
    }
    p
}

fn prob_mismatch_error(kmer: &[u8], read_kmer: &[u8], padded_ref_kmer: &[u8], pad: usize, config: &RecalibrationConfig) -> f64 {
    let k = kmer.len();
    let mut ext_true = padded_ref_kmer.to_vec();
    ext_true[pad..pad + k].copy_from_slice(kmer);

    let mut p = 1.0;
    for i in 0..k {
        let mut prob_diff = 0.0;
        let is_match = kmer[i].eq_ignore_ascii_case(&read_kmer[i]);
        if is_match {
            prob_diff += config.pm;
        }
        for (&d, &weight) in &config.slippage_distances {
            let idx = i as i64 + pad as i64 + d;
            if idx >= 0 && (idx as usize) < ext_true.len() && ext_true[idx as usize].eq_ignore_ascii_case(&read_kmer[i]) {
                prob_diff += (1.0 - config.pm) * config.ps * weight;
            }
        }
        if !is_match {
            prob_diff += (1.0 - config.pm) * (1.0 - config.ps) / 3.0;
        }
        p *= prob_diff;
    }
    p
}

/// Per-site `(true^{1/K}, error^{1/K})` emissions for one read's anchor at
/// this site.
pub fn site_emission(site: &SiteKmerDistribution, read: &SiteReadData, pad: usize, config: &RecalibrationConfig) -> (f64, f64) {
    let k = read.read_kmer.len();
    let mut prob_true = 0.0;
    let mut prob_error = 0.0;
    for (kmer, prior) in &site.priors {
        let mismatch_true = prob_mismatch_true(kmer, &read.read_kmer, &read.quality_kmer);
        let mismatch_error = prob_mismatch_error(kmer, &read.read_kmer, &site.padded_ref_kmer, pad, config);
        prob_true += prior * mismatch_true;
        prob_error += prior * (config.ptrue * mismatch_true + (1.0 - config.ptrue) * mismatch_error);
    }
    let inv_k = 1.0 / k as f64;
    (prob_true.max(0.0).powf(inv_k), prob_error.max(0.0).powf(inv_k))
}

/// Two-state (`True`/`Error`) forward-backward pass over a read's
/// per-site emissions, walked in walk order (the caller has already
/// reversed `emissions`/`p_errors` for reverse-strand reads), transitioning
/// out of `True` with each site's current `p_error`. `Error` is absorbing.
/// The forward pass accumulates `(likelihoodTrue, likelihoodError)`; the
/// backward pass then walks back from the end, forming each site's
/// `errorPosterior` as `backwardLikelihoodError * forwardLikelihoodError`,
/// normalised by the total likelihood at the walk end.
pub fn forward_backward(emissions: &[(f64, f64)], p_errors: &[f64]) -> Vec<f64> {
    let n = emissions.len();
    if n == 0 {
        return Vec::new();
    }
    let mut like_true = Array1::<f64>::zeros(n);
    let mut like_error = Array1::<f64>::zeros(n);

    like_true[0] = emissions[0].0 * (1.0 - p_errors[0]);
    like_error[0] = emissions[0].1 * p_errors[0];

    for i in 1..n {
        like_true[i] = emissions[i].0 * like_true[i - 1] * (1.0 - p_errors[i]);
        like_error[i] = emissions[i].1 * (like_error[i - 1] + like_true[i - 1] * p_errors[i]);
    }

    let likelihood_sum = like_true[n - 1] + like_error[n - 1];
    let init = if likelihood_sum > 0.0 { 1.0 / likelihood_sum } else { 0.0 };
    let mut bwd_true = init;
    let mut bwd_error = init;

    let mut posteriors = vec![0.0; n];
    for i in (0..n).rev() {
        posteriors[i] = bwd_error * like_error[i];

        let new_bwd_true = emissions[i].0 * (1.0 - p_errors[i]) * bwd_true + emissions[i].1 * p_errors[i] * bwd_error;
        let new_bwd_error = emissions[i].1 * bwd_error;
        bwd_true = new_bwd_true;
        bwd_error = new_bwd_error;
    }

    posteriors.iter().map(|&p| if p.is_finite() { p } else { 0.0 }).collect()
}

/// Per-site `posterior(i) - posterior(i-1)` in walk order.
pub fn error_transition_probabilities(posteriors: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(posteriors.len());
    let mut prev = 0.0;
    for &p in posteriors {
        out.push((p - prev).max(0.0));
        prev = p;
    }
    out
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn phred_to_p_matches_phred_conversion() {
        assert_relative_eq!(phred_to_p(10), 0.1, epsilon = 1e-9);
        assert_relative_eq!(phred_to_p(20), 0.01, epsilon = 1e-9);
    }

    #[test]
    fn forward_backward_flags_a_run_of_high_error_emissions() {
        let emissions = vec![(0.9, 0.1), (0.9, 0.1), (0.1, 0.9), (0.1, 0.9)];
        let p_errors = vec![0.01, 0.01, 0.5, 0.5];
        let posteriors = forward_backward(&emissions, &p_errors);
        assert!(posteriors[3] > posteriors[0]);
    }

    #[test]
    fn error_transition_probabilities_are_nonnegative() {
        let posteriors = vec![0.1, 0.05, 0.6, 0.9];
        let transitions = error_transition_probabilities(&posteriors);
        assert!(transitions.iter().all(|&t| t >= 0.0));
    }
}
