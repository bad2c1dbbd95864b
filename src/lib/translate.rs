//! The coordinate translator: a pure function mapping a logical
//! `(base_offset, begin, end_exclusive)` range plus a sequence's line
//! geometry to a physical read plan.
//!
//! This module has no state and performs no I/O; it is exercised directly
//! by property tests comparing it against a reference implementation that
//! walks the unwrapped file one byte at a time.

use crate::error::{RaidxError, Result};

/// One physical chunk to read: `raw_len` bytes come off the decoder,
/// `payload_len` of those (always a prefix) are retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub raw_len: u64,
    pub payload_len: u64,
}

/// A read plan produced by [`plan`]. Sized independently of the requested
/// range: a multi-gigabase fetch still produces a handful of fields, not
/// one entry per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPlan {
    /// The physical (or virtual, for BGZF) offset of the first byte to
    /// read.
    pub first_byte: u64,
    /// The first chunk to read after seeking to `first_byte`.
    pub first_chunk: Chunk,
    /// How many full `(line_stride, line_payload)` chunks follow the first
    /// chunk.
    pub full_chunk_count: u64,
    /// The repeated full-line chunk (valid only when `full_chunk_count >
    /// 0`).
    pub full_chunk: Chunk,
    /// The trailing partial line, if any (`payload_len == 0` when the
    /// range ends exactly on a line boundary and `full_chunk_count`
    /// already accounted for every byte... in practice this plan always
    /// has a non-empty final chunk; see `plan`'s derivation).
    pub last_chunk: Chunk,
}

impl ReadPlan {
    /// Total payload bytes this plan reconstructs.
    pub fn total_payload(&self) -> u64 {
        self.first_chunk.payload_len
            + self.full_chunk_count * self.full_chunk.payload_len
            + self.last_chunk.payload_len
    }
}

/// Compute a [`ReadPlan`] for the half-open payload range `[begin,
/// end_exclusive)` of a sequence whose payload starts at `base_offset` and
/// is wrapped at `line_payload` bytes per line, `line_stride` bytes per
/// line on disk.
///
/// Preconditions: `end_exclusive > begin`. `line_payload == 0` and overflow
/// of `end_exclusive - begin` against the platform size type both yield
/// [`RaidxError::BadGeometry`].
pub fn plan(
    base_offset: u64,
    begin: u64,
    end_exclusive: u64,
    line_payload: u64,
    line_stride: u64,
) -> Result<ReadPlan> {
    if line_payload == 0 {
        return Err(RaidxError::BadGeometry("line_payload is zero".to_string()));
    }
    if end_exclusive <= begin {
        return Err(RaidxError::BadGeometry(
            "end_exclusive must be greater than begin".to_string(),
        ));
    }
    let total = end_exclusive
        .checked_sub(begin)
        .ok_or_else(|| RaidxError::BadGeometry("range underflow".to_string()))?;

    let line_index = begin / line_payload;
    let col = begin % line_payload;
    let first_byte = base_offset
        .checked_add(line_index.checked_mul(line_stride).ok_or_else(|| {
            RaidxError::BadGeometry("seek offset overflow".to_string())
        })?)
        .and_then(|v| v.checked_add(col))
        .ok_or_else(|| RaidxError::BadGeometry("seek offset overflow".to_string()))?;

    let rem_in_line = line_payload - col;

    // The whole range fits inside the current line: a single short read,
    // no terminator to strip.
    if total <= rem_in_line {
        let chunk = Chunk { raw_len: total, payload_len: total };
        return Ok(ReadPlan {
            first_byte,
            first_chunk: chunk,
            full_chunk_count: 0,
            full_chunk: Chunk { raw_len: 0, payload_len: 0 },
            last_chunk: Chunk { raw_len: 0, payload_len: 0 },
        });
    }

    let first_chunk =
        Chunk { raw_len: line_stride - col, payload_len: rem_in_line };

    let remaining_after_first = total - rem_in_line;
    let full_chunk_count = if remaining_after_first > line_payload {
        (remaining_after_first - 1) / line_payload
    } else {
        0
    };
    let last_payload = remaining_after_first - full_chunk_count * line_payload;

    Ok(ReadPlan {
        first_byte,
        first_chunk,
        full_chunk_count,
        full_chunk: Chunk { raw_len: line_stride, payload_len: line_payload },
        last_chunk: Chunk { raw_len: last_payload, payload_len: last_payload },
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    /// Reference implementation: walk the unwrapped mapping one byte at a
    /// time and record which physical byte each payload index maps to.
    fn naive_offsets(
        base_offset: u64,
        begin: u64,
        end_exclusive: u64,
        line_payload: u64,
        line_stride: u64,
    ) -> Vec<u64> {
        (begin..end_exclusive)
            .map(|k| base_offset + (k / line_payload) * line_stride + (k % line_payload))
            .collect()
    }

    /// Replays a `ReadPlan` into the sequence of physical byte offsets it
    /// would read, for comparison against `naive_offsets`.
    fn plan_offsets(p: &ReadPlan) -> Vec<u64> {
        let mut out = Vec::new();
        let mut phys = p.first_byte;
        for _ in 0..p.first_chunk.payload_len {
            out.push(phys);
            phys += 1;
        }
        phys += p.first_chunk.raw_len - p.first_chunk.payload_len;
        for _ in 0..p.full_chunk_count {
            for _ in 0..p.full_chunk.payload_len {
                out.push(phys);
                phys += 1;
            }
            phys += p.full_chunk.raw_len - p.full_chunk.payload_len;
        }
        for _ in 0..p.last_chunk.payload_len {
            out.push(phys);
            phys += 1;
        }
        out
    }

    #[rstest]
    #[case(0, 0, 59, 60, 61)]
    #[case(0, 59, 60, 60, 61)]
    #[case(0, 0, 179, 60, 61)]
    #[case(100, 0, 1, 60, 61)]
    #[case(0, 61, 121, 60, 61)]
    #[case(0, 0, 120, 60, 61)]
    #[case(0, 0, 60, 60, 61)]
    #[case(0, 5, 185, 60, 62)]
    fn matches_naive_walk(
        #[case] base_offset: u64,
        #[case] begin: u64,
        #[case] end_exclusive: u64,
        #[case] line_payload: u64,
        #[case] line_stride: u64,
    ) {
        let p = plan(base_offset, begin, end_exclusive, line_payload, line_stride).unwrap();
        assert_eq!(p.total_payload(), end_exclusive - begin);
        assert_eq!(
            plan_offsets(&p),
            naive_offsets(base_offset, begin, end_exclusive, line_payload, line_stride)
        );
    }

    #[test]
    fn random_tuples_match_naive_walk() {
        // A small deterministic PRNG; no external dependency needed for a
        // handful of fuzz-style cases.
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        for _ in 0..500 {
            let line_payload = 1 + next() % 200;
            let line_stride = line_payload + 1 + next() % 3;
            let base_offset = next() % 1000;
            let span = 1 + next() % 1000;
            let begin = next() % 2000;
            let end_exclusive = begin + span;

            let p = plan(base_offset, begin, end_exclusive, line_payload, line_stride).unwrap();
            assert_eq!(p.total_payload(), end_exclusive - begin);
            assert_eq!(
                plan_offsets(&p),
                naive_offsets(base_offset, begin, end_exclusive, line_payload, line_stride)
            );
        }
    }

    #[test]
    fn rejects_zero_line_payload() {
        assert!(matches::matches!(
            plan(0, 0, 10, 0, 1),
            Err(RaidxError::BadGeometry(_))
        ));
    }

    #[test]
    fn rejects_empty_range() {
        assert!(matches::matches!(
            plan(0, 5, 5, 60, 61),
            Err(RaidxError::BadGeometry(_))
        ));
    }
}
