//! Kmer-based per-base error recalibration: a two-state
//! forward–backward HMM over reads that floors qualities inside likely
//! dephasing errors.

pub mod hmm;
pub mod kmer;

use std::collections::HashMap;

use crate::cigar::EMPTY_POS;
use crate::read::{Read, MIN_ALLOWED_QUALITY};
use crate::recalibration::hmm::{error_transition_probabilities, forward_backward, site_emission, SiteReadData};
use crate::recalibration::kmer::KmerDistribution;
use crate::reference::ReferenceWindow;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RecalibrationConfig {
    pub k: usize,
    pub pad: usize,
    pub pm: f64,
    pub ps: f64,
    pub ptrue: f64,
    pub perr: f64,
    pub pref: f64,
    pub slippage_distances: HashMap<i64, f64>,
    pub quality_floor: u8,
    pub floor_to: u8,
    pub min_kmer_prior: f64,
}

impl Default for RecalibrationConfig {
    fn default() -> Self {
        let mut slippage_distances = HashMap::new();
        slippage_distances.insert(-1, 0.5);
        slippage_distances.insert(1, 0.5);
        RecalibrationConfig {
            k: 7,
            pad: 1,
            pm: 0.8,
            ps: 0.8,
            ptrue: 0.5,
            perr: 0.0005,
            pref: 0.95,
            slippage_distances,
            quality_floor: 5,
            floor_to: MIN_ALLOWED_QUALITY,
            min_kmer_prior: 2e-3,
        }
    }
}

/// Runs the full recalibration schedule over one
/// sample's reads in a block, mutating their quality arrays in place.
/// Single-threaded and touches only this sample's reads.
pub fn recalibrate_sample(reads: &[Read], ref_window: &ReferenceWindow, config: &RecalibrationConfig) {
    if reads.is_empty() {
        return;
    }

    let reads_start = reads.iter().map(|r| r.start()).min().unwrap();
    let reads_end = reads.iter().map(|r| r.aligned_end()).max().unwrap();

    let mut distribution = KmerDistribution::new();
    let padded_k = config.k + 2 * config.pad;

    for pos in reads_start..reads_end {
        if let Ok(kmer) = padded_ref_kmer(ref_window, pos, config.pad, config.k) {
            if kmer.len() == padded_k {
                distribution.ensure_site(pos, kmer);
            }
        }
    }

    for read in reads {
        let ref_positions = read.cigar().get_ref_positions(read.start());
        let sequence = read.sequence();
        for (idx, &ref_pos) in ref_positions.iter().enumerate() {
            if ref_pos == EMPTY_POS {
                continue;
            }
            if idx + config.k > sequence.len() {
                continue;
            }
            if let Some(site) = distribution.site_mut(ref_pos) {
                site.observe(&sequence[idx..idx + config.k]);
            }
        }
    }

    distribution.finalize_all(config.pad, config.k, config);
    distribution.reset_all_error_counts(config);

    let per_read_sites: Vec<Vec<SiteReadData>> = reads
        .iter()
        .map(|read| collect_site_read_data(read, &distribution, config))
        .collect();

    run_hmm_pass(reads, &per_read_sites, &mut distribution, config, true);
    run_hmm_pass(reads, &per_read_sites, &mut distribution, config, false);

    floor_qualities(reads, config);
}

fn padded_ref_kmer(ref_window: &ReferenceWindow, site_pos: i64, pad: usize, k: usize) -> crate::errors::Result<Vec<u8>> {
    use crate::interval::{Interval, Region};
    let contig = ref_window.region().contig().to_string();
    let start = site_pos - pad as i64;
    let end = site_pos + k as i64 + pad as i64;
    let region = Region::new(contig, Interval::new(start, end));
    Ok(ref_window.subseq(&region)?.sequence().to_vec())
}

fn collect_site_read_data(read: &Read, distribution: &KmerDistribution, config: &RecalibrationConfig) -> Vec<SiteReadData> {
    let ref_positions = read.cigar().get_ref_positions(read.start());
    let sequence = read.sequence();
    let qualities = read.qualities();
    let mut out = Vec::new();
    for (idx, &ref_pos) in ref_positions.iter().enumerate() {
        if ref_pos == EMPTY_POS {
            continue;
        }
        if idx + config.k > sequence.len() {
            continue;
        }
        if distribution.site(ref_pos).is_some() {
            out.push(SiteReadData {
                read_kmer: sequence[idx..idx + config.k].to_vec(),
                quality_kmer: qualities[idx..idx + config.k].to_vec(),
                index_into_read: idx,
                ref_pos,
            });
        }
    }
    out
}

fn run_hmm_pass(
    reads: &[Read],
    per_read_sites: &[Vec<SiteReadData>],
    distribution: &mut KmerDistribution,
    config: &RecalibrationConfig,
    is_first_pass: bool,
) {
    let mut accumulated: HashMap<i64, (f64, f64)> = HashMap::new();

    for (read, sites) in reads.iter().zip(per_read_sites.iter()) {
        if sites.is_empty() {
            continue;
        }
        let direction_forward = !read.is_reverse();
        let ordered: Vec<&SiteReadData> = if direction_forward {
            sites.iter().collect()
        } else {
            sites.iter().rev().collect()
        };

        let mut emissions = Vec::with_capacity(ordered.len());
        let mut p_errors = Vec::with_capacity(ordered.len());
        for site_data in &ordered {
            let site = distribution.site(site_data.ref_pos).expect("site must exist");
            emissions.push(site_emission(site, site_data, config.pad, config));
            let p_error = if direction_forward {
                site.error_forward.p_error()
            } else {
                site.error_backward.p_error()
            };
            p_errors.push(p_error);
        }

        let posteriors = forward_backward(&emissions, &p_errors);

        if is_first_pass {
            let transitions = error_transition_probabilities(&posteriors);
            for (site_data, transition) in ordered.iter().zip(transitions.iter()) {
                let entry = accumulated.entry(site_data.ref_pos).or_insert((0.0, 0.0));
                if direction_forward {
                    entry.0 += transition;
                } else {
                    entry.1 += transition;
                }
            }
        } else {
            recalibrate_read(read, &ordered, &posteriors, direction_forward, config);
        }
    }

    if is_first_pass {
        for (pos, (fwd, bwd)) in accumulated {
            if let Some(site) = distribution.site_mut(pos) {
                site.error_forward.opportunity += 1.0;
                site.error_forward.count += fwd;
                site.error_backward.opportunity += 1.0;
                site.error_backward.count += bwd;
            }
        }
    }
}

fn recalibrate_read(read: &Read, ordered: &[&SiteReadData], posteriors: &[f64], direction_forward: bool, config: &RecalibrationConfig) {
    let flagged = posteriors.iter().position(|&p| p > 0.5);
    let flagged = match flagged {
        Some(idx) => idx,
        None => return,
    };
    let anchor_site = ordered[flagged];
    let anchor_index = if direction_forward {
        anchor_site.index_into_read
    } else {
        anchor_site.index_into_read + config.k - 1
    };

    let mut quals = read.qualities();
    if direction_forward {
        for q in quals.iter_mut().skip(anchor_index) {
            *q = MIN_ALLOWED_QUALITY;
        }
    } else {
        for q in quals.iter_mut().take(anchor_index + 1) {
            *q = MIN_ALLOWED_QUALITY;
        }
    }
    read.set_qualities(quals);
}

fn floor_qualities(reads: &[Read], config: &RecalibrationConfig) {
    for read in reads {
        let mut quals = read.qualities();
        let mut changed = false;
        for q in quals.iter_mut() {
            if *q <= config.quality_floor {
                *q = config.floor_to;
                changed = true;
            }
        }
        if changed {
            read.set_qualities(quals);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cigar::Cigar;
    use crate::interval::{Interval, Region};
    use crate::read::ReadFlags;
    use std::sync::Arc;

    #[test]
    fn floor_sweep_scenario() {
        // Scenario 6: a three-base read 1:0 seq=TTT qual=[5,5,5] against
        // reference AAA, with qualityFloor=5, floorTo=2.
        let w = Arc::new(ReferenceWindow::new(Region::new("1", Interval::new(0, 3)), b"AAA".to_vec()).unwrap());
        let read = Read::new(
            0,
            "1".to_string(),
            0,
            b"TTT".to_vec(),
            vec![5, 5, 5],
            Cigar::parse("3M").unwrap(),
            ReadFlags::empty(),
            60,
            0,
            None,
            None,
            "sample0".to_string(),
            w.clone(),
        )
        .unwrap();
        let config = RecalibrationConfig::default();
        recalibrate_sample(&[read.clone()], &w, &config);
        assert_eq!(read.qualities(), vec![2, 2, 2]);
    }

    #[test]
    fn recalibration_of_too_short_read_is_noop() {
        let w = Arc::new(ReferenceWindow::new(Region::new("1", Interval::new(0, 3)), b"AAA".to_vec()).unwrap());
        let read = Read::new(
            0,
            "1".to_string(),
            0,
            b"TT".to_vec(),
            vec![30, 30],
            Cigar::parse("2M").unwrap(),
            ReadFlags::empty(),
            60,
            0,
            None,
            None,
            "sample0".to_string(),
            w.clone(),
        )
        .unwrap();
        let config = RecalibrationConfig::default();
        recalibrate_sample(&[read.clone()], &w, &config);
        assert_eq!(read.qualities(), vec![30, 30]);
    }
}
