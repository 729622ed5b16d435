//! CIGAR decoding and coordinate-walking engine.
//!
//! Ops are a tagged enum rather than a polymorphic per-op object: no
//! per-op heap allocation, and short op lists live inline in a
//! `Vec<CigarOp>`.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::{Error, Result};
use crate::interval::Interval;

pub const EMPTY_POS: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOp {
    Match(u32),
    Ins(u32),
    Del(u32),
    Skip(u32),
    SoftClip(u32),
    HardClip(u32),
    Pad(u32),
    SeqMatch(u32),
    SeqMismatch(u32),
}

impl CigarOp {
    pub fn len(&self) -> u32 {
        match *self {
            CigarOp::Match(l)
            | CigarOp::Ins(l)
            | CigarOp::Del(l)
            | CigarOp::Skip(l)
            | CigarOp::SoftClip(l)
            | CigarOp::HardClip(l)
            | CigarOp::Pad(l)
            | CigarOp::SeqMatch(l)
            | CigarOp::SeqMismatch(l) => l,
        }
    }

    pub fn length_in_ref(&self) -> u32 {
        match *self {
            CigarOp::Match(l) | CigarOp::SeqMatch(l) | CigarOp::SeqMismatch(l) => l,
            CigarOp::Del(l) | CigarOp::Skip(l) => l,
            _ => 0,
        }
    }

    pub fn length_in_seq(&self) -> u32 {
        match *self {
            CigarOp::Match(l) | CigarOp::SeqMatch(l) | CigarOp::SeqMismatch(l) => l,
            CigarOp::Ins(l) | CigarOp::SoftClip(l) => l,
            _ => 0,
        }
    }

    /// Ops that consume both read and reference positions in lockstep
    /// ("balanced", in the terminology `get_inverse_interval` relies on).
    pub fn is_ref_seq_balanced(&self) -> bool {
        matches!(self, CigarOp::Match(_) | CigarOp::SeqMatch(_) | CigarOp::SeqMismatch(_))
    }

    pub fn is_soft_clip(&self) -> bool {
        matches!(self, CigarOp::SoftClip(_))
    }

    pub fn is_hard_clip(&self) -> bool {
        matches!(self, CigarOp::HardClip(_))
    }

    pub fn is_insertion(&self) -> bool {
        matches!(self, CigarOp::Ins(_))
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, CigarOp::Del(_))
    }

    fn symbol(&self) -> char {
        match self {
            CigarOp::Match(_) => 'M',
            CigarOp::Ins(_) => 'I',
            CigarOp::Del(_) => 'D',
            CigarOp::Skip(_) => 'N',
            CigarOp::SoftClip(_) => 'S',
            CigarOp::HardClip(_) => 'H',
            CigarOp::Pad(_) => 'P',
            CigarOp::SeqMatch(_) => '=',
            CigarOp::SeqMismatch(_) => 'X',
        }
    }

    fn from_symbol(len: u32, c: char) -> Result<CigarOp> {
        Ok(match c {
            'M' => CigarOp::Match(len),
            'I' => CigarOp::Ins(len),
            'D' => CigarOp::Del(len),
            'N' => CigarOp::Skip(len),
            'S' => CigarOp::SoftClip(len),
            'H' => CigarOp::HardClip(len),
            'P' => CigarOp::Pad(len),
            '=' => CigarOp::SeqMatch(len),
            'X' => CigarOp::SeqMismatch(len),
            other => return Err(Error::InvalidFormat(format!("unknown CIGAR operation '{}'", other))),
        })
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len(), self.symbol())
    }
}

/// An ordered sequence of CIGAR operations. Equality is op-stream equality.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cigar(pub Vec<CigarOp>);

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"(\d+)([MIDNSHP=X])").unwrap();
}

impl Cigar {
    pub fn new(ops: Vec<CigarOp>) -> Self {
        Cigar(ops)
    }

    pub fn ops(&self) -> &[CigarOp] {
        &self.0
    }

    pub fn parse(text: &str) -> Result<Cigar> {
        let mut ops = Vec::new();
        let mut consumed = 0;
        for caps in TOKEN_RE.captures_iter(text) {
            consumed += caps.get(0).unwrap().as_str().len();
            let len: u32 = caps[1]
                .parse()
                .map_err(|_| Error::InvalidFormat(format!("malformed CIGAR token in '{}'", text)))?;
            let symbol = caps[2].chars().next().unwrap();
            ops.push(CigarOp::from_symbol(len, symbol)?);
        }
        if consumed != text.len() {
            return Err(Error::InvalidFormat(format!("malformed CIGAR string '{}'", text)));
        }
        Ok(Cigar(ops))
    }

    pub fn to_string(&self) -> String {
        self.0.iter().map(|op| op.to_string()).collect()
    }

    pub fn length(&self) -> usize {
        self.0.len()
    }

    pub fn length_in_ref(&self) -> i64 {
        self.0.iter().map(|op| op.length_in_ref() as i64).sum()
    }

    pub fn length_in_seq(&self) -> i64 {
        self.0.iter().map(|op| op.length_in_seq() as i64).sum()
    }

    pub fn length_in_seq_without_soft_clip(&self) -> i64 {
        self.0
            .iter()
            .filter(|op| !op.is_soft_clip())
            .map(|op| op.length_in_seq() as i64)
            .sum()
    }

    pub fn length_before_ref_start_pos(&self) -> i64 {
        let mut total = 0;
        for op in &self.0 {
            if op.length_in_ref() > 0 {
                break;
            }
            total += op.len() as i64;
        }
        total
    }

    pub fn length_after_ref_end_pos(&self) -> i64 {
        let mut total = 0;
        for op in self.0.iter().rev() {
            if op.length_in_ref() > 0 {
                break;
            }
            total += op.len() as i64;
        }
        total
    }

    /// For each MATCH-family position, yields `start_pos + i`; INS/SOFT_CLIP
    /// positions yield [`EMPTY_POS`]; DEL/SKIP/HARD_CLIP/PAD contribute
    /// nothing.
    pub fn get_ref_positions(&self, start_pos: i64) -> Vec<i64> {
        let mut out = Vec::with_capacity(self.length_in_seq() as usize);
        let mut ref_pos = start_pos;
        for op in &self.0 {
            if op.is_ref_seq_balanced() {
                for i in 0..op.len() as i64 {
                    out.push(ref_pos + i);
                }
                ref_pos += op.len() as i64;
            } else if op.is_insertion() || op.is_soft_clip() {
                for _ in 0..op.len() {
                    out.push(EMPTY_POS);
                }
            } else {
                ref_pos += op.length_in_ref() as i64;
            }
        }
        out
    }

    /// Drops a leading and/or trailing SOFT_CLIP (only the very first/last
    /// op is considered); returns the `(front, back)` clipped lengths.
    pub fn strip_soft_clipping(&self) -> (Cigar, usize, usize) {
        let mut ops = self.0.clone();
        let front = if let Some(CigarOp::SoftClip(l)) = ops.first() {
            let l = *l as usize;
            ops.remove(0);
            l
        } else {
            0
        };
        let back = if ops.len() > 0 {
            if let Some(CigarOp::SoftClip(l)) = ops.last() {
                let l = *l as usize;
                ops.pop();
                l
            } else {
                0
            }
        } else {
            0
        };
        (Cigar(ops), front, back)
    }

    /// Maps a reference-coordinate interval back into read coordinates
    ///. The sole routine permitted to do this.
    pub fn get_inverse_interval(&self, start_pos: i64, ref_interval: &Interval) -> Interval {
        let mut read_off: i64 = 0;
        let mut ref_off: i64 = start_pos;
        let mut start_read: Option<i64> = None;
        let mut end_read: Option<i64> = None;

        for op in &self.0 {
            let ref_len = op.length_in_ref() as i64;
            let seq_len = op.length_in_seq() as i64;
            let op_ref_end = ref_off + ref_len;

            if start_read.is_none() && ref_interval.start() < op_ref_end {
                start_read = Some(resolve_offset(op, read_off, ref_off, seq_len, ref_interval.start()));
            }
            if end_read.is_none() && ref_interval.end() <= op_ref_end {
                end_read = Some(resolve_offset(op, read_off, ref_off, seq_len, ref_interval.end()));
            }
            if start_read.is_some() && end_read.is_some() {
                break;
            }

            read_off += seq_len;
            ref_off += ref_len;
        }

        let total_seq_len = self.length_in_seq();
        let start_read = start_read.unwrap_or(total_seq_len);
        let end_read = end_read.unwrap_or(total_seq_len);
        let (lo, hi) = if start_read <= end_read {
            (start_read, end_read)
        } else {
            (end_read, start_read)
        };
        Interval::new(lo.max(0), hi.max(0))
    }
}

/// Resolves the read offset corresponding to `target_ref_pos` within a
/// single op spanning `[ref_off, ref_off+ref_len)` / `[read_off,
/// read_off+seq_len)`.
fn resolve_offset(op: &CigarOp, read_off: i64, ref_off: i64, seq_len: i64, target_ref_pos: i64) -> i64 {
    if op.is_ref_seq_balanced() {
        read_off + (target_ref_pos - ref_off)
    } else if op.is_insertion() || op.is_soft_clip() {
        // unbalanced op enclosing an empty ref interval: expand to the
        // full inserted span rather than collapsing to a point.
        if target_ref_pos <= ref_off {
            read_off
        } else {
            read_off + seq_len
        }
    } else {
        // DEL/SKIP (or HARD_CLIP/PAD, zero-length either way): collapse to
        // the interior point in read space.
        read_off
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips() {
        let text = "4M2I3D1S";
        let cigar = Cigar::parse(text).unwrap();
        assert_eq!(cigar.to_string(), text);
    }

    #[test]
    fn parse_rejects_unknown_token() {
        assert!(Cigar::parse("4Q").is_err());
    }

    #[test]
    fn ref_positions_mark_insertions_empty() {
        let cigar = Cigar::parse("2M1I2M").unwrap();
        assert_eq!(cigar.get_ref_positions(10), vec![10, 11, EMPTY_POS, 12, 13]);
    }

    #[test]
    fn strip_soft_clipping_drops_only_terminal_ops() {
        let cigar = Cigar::parse("3S4M2S").unwrap();
        let (stripped, front, back) = cigar.strip_soft_clipping();
        assert_eq!(stripped, Cigar::parse("4M").unwrap());
        assert_eq!((front, back), (3, 2));
    }

    #[test]
    fn inverse_interval_identity_for_pure_match() {
        let cigar = Cigar::parse("10M").unwrap();
        let inv = cigar.get_inverse_interval(100, &Interval::new(102, 105));
        assert_eq!(inv, Interval::new(2, 5));
    }

    #[test]
    fn inverse_interval_empty_in_empty_out_for_balanced_op() {
        let cigar = Cigar::parse("10M").unwrap();
        let inv = cigar.get_inverse_interval(100, &Interval::new(103, 103));
        assert_eq!(inv, Interval::new(3, 3));
    }

    #[test]
    fn inverse_interval_clamps_left_of_alignment() {
        let cigar = Cigar::parse("10M").unwrap();
        let inv = cigar.get_inverse_interval(100, &Interval::new(0, 50));
        assert_eq!(inv, Interval::new(0, 10));
    }

    #[test]
    fn inverse_interval_expands_over_insertion() {
        // 5M 3I 5M at ref_pos 0: ref interval [5,5) lands right at the
        // insertion; the empty ref span should expand to the full insert.
        let cigar = Cigar::parse("5M3I5M").unwrap();
        let inv = cigar.get_inverse_interval(0, &Interval::new(5, 5));
        assert_eq!(inv, Interval::new(5, 8));
    }
}
