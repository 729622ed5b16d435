//! Candidate-variant generation and normalisation.

use crate::cigar::{Cigar, CigarOp};
use crate::errors::{Error, Result};
use crate::interval::{Interval, Region};
use crate::reference::ReferenceWindow;
use crate::variants::{require_same_contig, Variant, VariantKind};

/// Walks `cigar` against `ref_window`, emitting SNPs for MATCH-family
/// mismatches and insertion/deletion variants for INS/DEL ops, subject to
/// the usual read-boundary guards.
pub fn generate_variants_from_cigar(
    cigar: &Cigar,
    read_start: i64,
    ref_window: &ReferenceWindow,
    read_seq: &[u8],
) -> Result<Vec<Variant>> {
    let contig = ref_window.region().contig().to_string();
    let mut variants = Vec::new();
    let mut read_off: i64 = 0;
    let mut ref_off: i64 = read_start;

    for op in cigar.ops() {
        match op {
            CigarOp::Match(l) | CigarOp::SeqMatch(l) | CigarOp::SeqMismatch(l) => {
                let l = *l as i64;
                let op_ref = ref_window.subseq(&Region::new(contig.clone(), Interval::new(ref_off, ref_off + l)))?;
                for i in 0..l {
                    let rpos = ref_off + i;
                    let qpos = (read_off + i) as usize;
                    let ref_base = op_ref.sequence()[i as usize];
                    let read_base = read_seq[qpos];
                    if !ref_base.eq_ignore_ascii_case(&read_base) {
                        variants.push(Variant::new(
                            ref_window,
                            Region::new(contig.clone(), Interval::new(rpos, rpos + 1)),
                            vec![read_base],
                        )?);
                    }
                }
                ref_off += l;
                read_off += l;
            }
            CigarOp::Ins(l) => {
                let l = *l as i64;
                if read_off > 0 && (read_off + l) as usize <= read_seq.len() {
                    let alt = read_seq[read_off as usize..(read_off + l) as usize].to_vec();
                    variants.push(Variant::new(
                        ref_window,
                        Region::new(contig.clone(), Interval::new(ref_off, ref_off)),
                        alt,
                    )?);
                }
                read_off += l;
            }
            CigarOp::Del(l) => {
                let l = *l as i64;
                if read_off > 0 && (read_off as usize) < read_seq.len() {
                    variants.push(Variant::new(
                        ref_window,
                        Region::new(contig.clone(), Interval::new(ref_off, ref_off + l)),
                        vec![],
                    )?);
                }
                ref_off += l;
            }
            CigarOp::SoftClip(l) => {
                read_off += *l as i64;
            }
            CigarOp::Skip(l) => {
                ref_off += *l as i64;
            }
            CigarOp::HardClip(_) | CigarOp::Pad(_) => {}
        }
    }
    Ok(variants)
}

/// Left-aligns a pure indel to the smallest possible start not below
/// `lower_bound`.
fn left_align(v: &Variant, ref_window: &ReferenceWindow, lower_bound: i64) -> Result<Variant> {
    match v.kind() {
        VariantKind::Insertion => {
            let mut alt = v.alt().to_vec();
            let mut s = v.start();
            while s > lower_bound {
                let prev = base_at(ref_window, v.contig(), s - 1)?;
                if alt.last().map(|b| b.eq_ignore_ascii_case(&prev)).unwrap_or(false) {
                    alt.pop();
                    alt.insert(0, prev);
                    s -= 1;
                } else {
                    break;
                }
            }
            Ok(Variant::from_parts(
                Region::new(v.contig(), Interval::new(s, s)),
                vec![],
                alt,
            ))
        }
        VariantKind::Deletion => {
            let mut s = v.start();
            let mut e = v.end();
            let len = e - s;
            while s > lower_bound {
                let prev = base_at(ref_window, v.contig(), s - 1)?;
                let last = base_at(ref_window, v.contig(), e - 1)?;
                if prev.eq_ignore_ascii_case(&last) {
                    s -= 1;
                    e -= 1;
                } else {
                    break;
                }
            }
            debug_assert_eq!(e - s, len);
            let reference = ref_window.subseq(&Region::new(v.contig(), Interval::new(s, e)))?.sequence().to_vec();
            Ok(Variant::from_parts(Region::new(v.contig(), Interval::new(s, e)), reference, vec![]))
        }
        _ => Ok(v.clone()),
    }
}

fn base_at(ref_window: &ReferenceWindow, contig: &str, pos: i64) -> Result<u8> {
    Ok(ref_window
        .subseq(&Region::new(contig, Interval::new(pos, pos + 1)))?
        .sequence()[0])
}

/// Concatenates two ref-touching variants into one (possibly complex) raw
/// variant.
fn join(a: &Variant, b: &Variant) -> Result<Variant> {
    require_same_contig(a, b)?;
    if a.end() != b.start() {
        return Err(Error::Invariant(format!(
            "cannot join non-adjacent variants at {} and {}",
            a.end(),
            b.start()
        )));
    }
    let mut reference = a.reference().to_vec();
    reference.extend_from_slice(b.reference());
    let mut alt = a.alt().to_vec();
    alt.extend_from_slice(b.alt());
    let region = Region::new(a.contig(), Interval::new(a.start(), b.end()));
    Ok(Variant::from_parts(region, reference, alt))
}

/// Splits a (possibly complex) variant into its canonical SNP | pure-indel
/// decomposition: peel matching right ends, then matching left ends, emit
/// SNPs for the remaining equal-length aligned columns, and leave at most
/// one residual pure indel.
fn split(v: &Variant) -> Vec<Variant> {
    let mut reference = v.reference().to_vec();
    let mut alt = v.alt().to_vec();
    let mut start = v.start();

    while !reference.is_empty() && !alt.is_empty() && reference.last() == alt.last() {
        reference.pop();
        alt.pop();
    }
    while !reference.is_empty() && !alt.is_empty() && reference[0] == alt[0] {
        reference.remove(0);
        alt.remove(0);
        start += 1;
    }

    let mut results = Vec::new();
    let min_len = reference.len().min(alt.len());
    for i in 0..min_len {
        if reference[i] != alt[i] {
            results.push(Variant::from_parts(
                Region::new(v.contig(), Interval::new(start + i as i64, start + i as i64 + 1)),
                vec![reference[i]],
                vec![alt[i]],
            ));
        }
    }
    let tail_start = start + min_len as i64;
    if reference.len() > alt.len() {
        results.push(Variant::from_parts(
            Region::new(v.contig(), Interval::new(tail_start, start + reference.len() as i64)),
            reference[min_len..].to_vec(),
            vec![],
        ));
    } else if alt.len() > reference.len() {
        results.push(Variant::from_parts(
            Region::new(v.contig(), Interval::new(tail_start, tail_start)),
            vec![],
            alt[min_len..].to_vec(),
        ));
    }
    results
}

/// Normalises a read's raw per-op variants into a canonical, left-aligned,
/// join-and-split-reduced list. SNPs pass through unchanged; every
/// indel is left-aligned past the previous output item's end (or the
/// reference window start, if none).
pub fn normalise(variants: Vec<Variant>, ref_window: &ReferenceWindow) -> Result<Vec<Variant>> {
    let mut out: Vec<Variant> = Vec::new();
    let mut pending: Vec<Variant> = variants.into_iter().rev().collect();

    while let Some(v) = pending.pop() {
        if !v.is_pure_indel() {
            out.push(v);
            continue;
        }

        let lower_bound = out.last().map(|last| last.end()).unwrap_or_else(|| ref_window.region().start());
        let aligned = left_align(&v, ref_window, lower_bound)?;

        if let Some(last) = out.last() {
            if last.end() == aligned.start() {
                let joined = join(last, &aligned)?;
                out.pop();
                for r in split(&joined).into_iter().rev() {
                    pending.push(r);
                }
                continue;
            }
        }
        out.push(aligned);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceWindow;

    fn window(contig: &str, start: i64, seq: &[u8]) -> ReferenceWindow {
        ReferenceWindow::new(Region::new(contig, Interval::new(start, start + seq.len() as i64)), seq.to_vec())
            .unwrap()
    }

    #[test]
    fn snp_extraction_scenario() {
        // Scenario 1: ref 1:0-5 = "AAAAA", read 1:1-5 seq="TACG" CIGAR=4M
        let w = window("1", 0, b"AAAAA");
        let cigar = Cigar::parse("4M").unwrap();
        let variants = generate_variants_from_cigar(&cigar, 1, &w, b"TACG").unwrap();
        assert_eq!(variants.len(), 3);
        assert_eq!((variants[0].start(), variants[0].end(), variants[0].alt()), (1, 2, b"T".as_ref()));
        assert_eq!((variants[1].start(), variants[1].end(), variants[1].alt()), (3, 4, b"C".as_ref()));
        assert_eq!((variants[2].start(), variants[2].end(), variants[2].alt()), (4, 5, b"G".as_ref()));
    }

    #[test]
    fn insertion_mid_read_scenario() {
        // Scenario 2: ref 1:0-10 all A, read 1:1 seq="AAAAAA" CIGAR=1M4I1M
        let w = window("1", 0, b"AAAAAAAAAA");
        let cigar = Cigar::parse("1M4I1M").unwrap();
        let variants = generate_variants_from_cigar(&cigar, 1, &w, b"AAAAAA").unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].start(), 2);
        assert_eq!(variants[0].end(), 2);
        assert_eq!(variants[0].alt(), b"AAAA");
    }

    #[test]
    fn insertion_at_read_start_is_suppressed() {
        let w = window("1", 0, b"AAAAAAAAAA");
        let cigar = Cigar::parse("4I6M").unwrap();
        let variants = generate_variants_from_cigar(&cigar, 0, &w, b"TTTTAAAAAA").unwrap();
        assert!(variants.is_empty());
    }

    #[test]
    fn normalisation_join_scenario() {
        // Scenario 3: ref 1:0-29, three INS normalise into a single INS "ATG" at 1:1-1.
        let seq = b"CATGATGATGATGATGATATATAAAAAAC";
        let w = window("1", 0, seq);
        let raw = vec![
            Variant::new(&w, Region::new("1", Interval::new(18, 18)), b"G".to_vec()).unwrap(),
            Variant::new(&w, Region::new("1", Interval::new(23, 23)), b"T".to_vec()).unwrap(),
            Variant::new(&w, Region::new("1", Interval::new(26, 26)), b"A".to_vec()).unwrap(),
        ];
        let normalised = normalise(raw, &w).unwrap();
        assert_eq!(normalised.len(), 1);
        assert_eq!(normalised[0].start(), 1);
        assert_eq!(normalised[0].end(), 1);
        assert_eq!(normalised[0].alt(), b"ATG");
    }

    #[test]
    fn normalisation_is_idempotent() {
        let seq = b"CATGATGATGATGATGATATATAAAAAAC";
        let w = window("1", 0, seq);
        let raw = vec![Variant::new(&w, Region::new("1", Interval::new(18, 18)), b"G".to_vec()).unwrap()];
        let once = normalise(raw, &w).unwrap();
        let twice = normalise(once.clone(), &w).unwrap();
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!((a.start(), a.end(), a.alt()), (b.start(), b.end(), b.alt()));
        }
    }
}
