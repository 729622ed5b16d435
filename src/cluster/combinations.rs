//! Pairwise co-occurrence states and bounded combination enumeration.

use std::collections::{HashMap, HashSet};

use crate::interval::Interval;
use crate::read::Read;
use crate::variants::Variant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    NeverTogether,
    AlwaysTogether,
    SecondImpliesFirst,
    FirstImpliesSecond,
    Uncertain,
}

/// Computes the pairwise co-occurrence state of `a` and `b` from their
/// supporting reads. Pairs farther apart than
/// `max_cluster_distance` are always `Uncertain`.
pub fn pairwise_state(
    a: &Variant,
    b: &Variant,
    reads_by_id: &HashMap<u64, Read>,
    max_cluster_distance: i64,
    min_reads_to_support_claim: usize,
) -> PairState {
    let span = Interval::new(a.start().min(b.start()), a.end().max(b.end()));
    if span.size() >= max_cluster_distance {
        return PairState::Uncertain;
    }

    let r_a = reads_containing_span(&a.supporting_reads(), reads_by_id, &span);
    let r_b = reads_containing_span(&b.supporting_reads(), reads_by_id, &span);
    let n_a = r_a.len();
    let n_b = r_b.len();
    let n = r_a.intersection(&r_b).count();
    let m = min_reads_to_support_claim;

    if n == 0 && n_a >= m && n_b >= m {
        PairState::NeverTogether
    } else if n == n_a && n == n_b && n >= m {
        PairState::AlwaysTogether
    } else if n == n_b && n_a > n_b && n_b >= m {
        PairState::SecondImpliesFirst
    } else if n == n_a && n_b > n_a && n_a >= m {
        PairState::FirstImpliesSecond
    } else {
        PairState::Uncertain
    }
}

fn reads_containing_span(read_ids: &[u64], reads_by_id: &HashMap<u64, Read>, span: &Interval) -> HashSet<u64> {
    read_ids
        .iter()
        .filter(|id| {
            reads_by_id
                .get(id)
                .and_then(|r| r.maximal_read_interval().ok())
                .map(|iv| iv.contains_interval(span))
                .unwrap_or(false)
        })
        .copied()
        .collect()
}

/// Enumerates compatible variant combinations for one cluster's variants,
/// up to `max_combinations`. Returns `(combinations,
/// all_combinations_computed)`; on budget overflow the combinations list
/// is cleared and the flag is `false`.
pub fn compute_variant_combinations(
    variants: &[Variant],
    reads_by_id: &HashMap<u64, Read>,
    max_combinations: usize,
    max_cluster_distance: i64,
    min_reads_to_support_claim: usize,
) -> (Vec<Vec<Variant>>, bool) {
    if variants.is_empty() {
        return (vec![Vec::new()], true);
    }

    let mut combinations: Vec<Vec<Variant>> = vec![vec![variants[0].clone()]];
    let mut always_together: HashSet<(usize, usize)> = HashSet::new();
    let mut never_together: HashSet<(usize, usize)> = HashSet::new();

    for (vi, v) in variants.iter().enumerate().skip(1) {
        if combinations.len() + 1 >= max_combinations {
            return (Vec::new(), false);
        }

        let mut new_combinations = Vec::new();
        let mut any_always_or_second = false;

        for combo in &combinations {
            let last = combo.last().expect("combination is never empty here");
            let last_idx = variants.iter().position(|x| x == last).unwrap_or(0);
            let state = pairwise_state(last, v, reads_by_id, max_cluster_distance, min_reads_to_support_claim);

            match state {
                PairState::AlwaysTogether => {
                    let mut extended = combo.clone();
                    extended.push(v.clone());
                    new_combinations.push(extended);
                    always_together.insert((last_idx, vi));
                    any_always_or_second = true;
                }
                PairState::NeverTogether => {
                    new_combinations.push(combo.clone());
                    never_together.insert((last_idx, vi));
                }
                PairState::FirstImpliesSecond => {
                    let mut extended = combo.clone();
                    extended.push(v.clone());
                    new_combinations.push(extended);
                }
                PairState::SecondImpliesFirst => {
                    new_combinations.push(combo.clone());
                    let mut extended = combo.clone();
                    extended.push(v.clone());
                    new_combinations.push(extended);
                    any_always_or_second = true;
                }
                PairState::Uncertain => {
                    new_combinations.push(combo.clone());
                    let mut extended = combo.clone();
                    extended.push(v.clone());
                    new_combinations.push(extended);
                }
            }
        }

        if !any_always_or_second {
            new_combinations.push(vec![v.clone()]);
        }

        new_combinations.retain(|c| {
            let contains_v = c.contains(v);
            for &(a_idx, b_idx) in &always_together {
                if b_idx != vi {
                    continue;
                }
                let a_var = &variants[a_idx];
                if c.contains(a_var) != contains_v {
                    return false;
                }
            }
            for &(a_idx, b_idx) in &never_together {
                if b_idx != vi {
                    continue;
                }
                let x_var = &variants[a_idx];
                if contains_v && c.contains(x_var) {
                    return false;
                }
            }
            true
        });

        combinations = new_combinations;
    }

    combinations.push(Vec::new());
    (combinations, true)
}
